pub mod objective;
pub mod portfolio_evolution;
pub mod repair;
pub mod selection;
