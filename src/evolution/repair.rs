use rand::distributions::Uniform;
use rand::Rng;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairError {
    #[error("Every component is below the repair floor, nothing is left to renormalize.")]
    Infeasible,
}

/// Weights of a repaired vector and whether it had to be redrawn to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    pub weights: Vec<f64>,
    pub resampled: bool,
}

/// Projects a raw vector onto the allocation simplex with a minimum holding size.
///
/// Components below `floor` (negative and non-finite ones included) are dropped to
/// exactly zero and the survivors renormalized. Renormalizing can push a survivor back
/// under the floor when the raw sum exceeds one, so the clamp is repeated until stable;
/// each pass removes at least one component, so this takes at most `raw.len()` passes.
pub fn repair(raw: &[f64], floor: f64) -> Result<Vec<f64>, RepairError> {
    let mut weights = raw
        .iter()
        .map(|&w| if w.is_finite() { w } else { 0. })
        .collect::<Vec<f64>>();

    loop {
        let mut clamped_any = false;
        for weight in weights.iter_mut() {
            if *weight != 0. && *weight < floor {
                *weight = 0.;
                clamped_any = true;
            }
        }

        let total: f64 = weights.iter().sum();
        if total <= 0. || !total.is_finite() {
            return Err(RepairError::Infeasible);
        }
        weights.iter_mut().for_each(|w| *w /= total);

        if !clamped_any && weights.iter().all(|&w| w == 0. || w >= floor) {
            return Ok(weights);
        }
    }
}

/// Repairs `raw`, redrawing from the initialization distribution when nothing survives.
///
/// After `max_attempts` failed redraws it falls back to [`fallback_allocation`].
pub fn repair_or_resample<R: Rng + ?Sized>(
    raw: &[f64],
    floor: f64,
    max_attempts: usize,
    rng: &mut R,
) -> RepairOutcome {
    if let Ok(weights) = repair(raw, floor) {
        return RepairOutcome {
            weights,
            resampled: false,
        };
    }

    let assets = raw.len();
    for _ in 0..max_attempts {
        if let Ok(weights) = repair(&sample_raw_weights(assets, rng), floor) {
            return RepairOutcome {
                weights,
                resampled: true,
            };
        }
    }

    let weights = fallback_allocation(assets, floor);
    warn!(
        assets,
        max_attempts,
        held = weights.iter().filter(|&&w| w > 0.).count(),
        "Repair kept failing after resampling, falling back to an equal split."
    );
    RepairOutcome {
        weights,
        resampled: true,
    }
}

/// Equal split over as many leading assets as the floor allows (all of them when
/// `1 / assets` clears the floor).
pub fn fallback_allocation(assets: usize, floor: f64) -> Vec<f64> {
    let mut held = if floor > 0. {
        ((1. / floor).floor() as usize).clamp(1, assets.max(1))
    } else {
        assets
    };
    while held > 1 && 1. / (held as f64) < floor {
        held -= 1;
    }

    let mut weights = vec![0.; assets];
    weights
        .iter_mut()
        .take(held)
        .for_each(|w| *w = 1. / held as f64);
    weights
}

/// The initialization distribution: independent `U(0, 1)` components.
pub fn sample_raw_weights<R: Rng + ?Sized>(assets: usize, rng: &mut R) -> Vec<f64> {
    let uniform = Uniform::new(0., 1.);
    (0..assets).map(|_| rng.sample(uniform)).collect()
}
