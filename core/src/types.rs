//! Shared primitive types used across the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A participant identifier, unique within an assignment table.
pub type ParticipantId = String;

/// A stratum label, e.g. `"site1_under50"`.
pub type StratumLabel = String;

/// The binary treatment label handed out to a participant.
///
/// Ordering matters: block catalogs are enumerated with
/// `Control < Intervention`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Treatment {
    Control = 0,
    Intervention = 1,
}

impl Treatment {
    /// The `treatment_assignment` column value (0 or 1).
    pub fn as_code(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Control      => "control",
            Self::Intervention => "intervention",
        }
    }
}

impl fmt::Display for Treatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
