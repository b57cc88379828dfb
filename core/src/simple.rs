//! Simple randomization — the naive baseline.
//!
//! Each unit gets an independent weighted coin flip. The split is 50/50
//! only in expectation; a single realized sequence can drift far from
//! balance, especially at small n.

use crate::{
    error::{RandError, RandResult},
    rng::StratumRng,
    types::Treatment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_INTERVENTION_PROB: f64 = 0.5;

/// Flip `n` independent coins, each landing on Intervention with
/// probability `prob`.
pub fn simple_randomization(
    n: usize,
    prob: f64,
    rng: &mut StratumRng,
) -> RandResult<Vec<Treatment>> {
    if !(0.0..=1.0).contains(&prob) {
        return Err(RandError::InvalidProbability { prob });
    }
    let draws = (0..n)
        .map(|_| {
            if rng.chance(prob) {
                Treatment::Intervention
            } else {
                Treatment::Control
            }
        })
        .collect();
    Ok(draws)
}

/// Arm totals for a realized sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmCounts {
    pub intervention: usize,
    pub control:      usize,
}

impl ArmCounts {
    pub fn tally<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a Treatment>,
    {
        labels.into_iter().fold(Self::default(), |mut acc, t| {
            match t {
                Treatment::Intervention => acc.intervention += 1,
                Treatment::Control      => acc.control += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.intervention + self.control
    }

    /// |intervention - control|
    pub fn imbalance(&self) -> usize {
        self.intervention.abs_diff(self.control)
    }
}
