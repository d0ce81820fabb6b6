//! The fixed set of price multipliers the policy chooses from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Two multipliers closer than this are treated as the same action.
const MULTIPLIER_TOLERANCE: f64 = 1e-9;

/// A candidate price multiplier.
///
/// Declaration order is the tie-break order of the policy: when several
/// actions share the maximum value, the first one listed here wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "0.8")]
    Discount20,
    #[serde(rename = "0.9")]
    Discount10,
    #[serde(rename = "1.0")]
    Hold,
    #[serde(rename = "1.1")]
    Markup10,
    #[serde(rename = "1.2")]
    Markup20,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Discount20,
        Action::Discount10,
        Action::Hold,
        Action::Markup10,
        Action::Markup20,
    ];

    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Action::Discount20 => 0.8,
            Action::Discount10 => 0.9,
            Action::Hold => 1.0,
            Action::Markup10 => 1.1,
            Action::Markup20 => 1.2,
        }
    }

    /// Signed percentage adjustment relative to the base price.
    #[must_use]
    pub fn percent_change(self) -> i32 {
        match self {
            Action::Discount20 => -20,
            Action::Discount10 => -10,
            Action::Hold => 0,
            Action::Markup10 => 10,
            Action::Markup20 => 20,
        }
    }

    /// Looks up the action for an applied multiplier; `None` if it is not one
    /// of the five known multipliers.
    #[must_use]
    pub fn from_multiplier(multiplier: f64) -> Option<Action> {
        Action::ALL
            .into_iter()
            .find(|a| (a.multiplier() - multiplier).abs() < MULTIPLIER_TOLERANCE)
    }

    #[must_use]
    pub fn from_index(idx: usize) -> Option<Action> {
        Action::ALL.get(idx).copied()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.multiplier())
    }
}
