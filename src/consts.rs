/// Minimum non-zero allocation kept by the repair operator.
pub const REPAIR_FLOOR: f64 = 1e-3;
/// Tolerance used when comparing floats that should be equal (sums, ranges).
pub const FLOAT_COMPARISON_EPSILON: f64 = 1e-9;
/// How negative `w'Σw` may get from rounding before we call the covariance malformed.
pub const QUADRATIC_FORM_TOLERANCE: f64 = 1e-12;
/// Return, risk, sentiment.
pub const NUMBER_OF_OPTIMIZATION_OBJECTIVES: usize = 3;
/// Half-width of the uniform perturbation applied by mutation.
pub const PERTURBATION: f64 = 0.05;
pub const DEFAULT_POPULATION_SIZE: usize = 100;
pub const DEFAULT_GENERATIONS: usize = 200;
/// Resample attempts before falling back to a uniform allocation.
pub const MAX_REPAIR_ATTEMPTS: usize = 16;
/// Prices needed per asset to get at least two returns (sample covariance).
pub const MIN_PRICE_HISTORY: usize = 3;
