//! Discretization of continuous retail signals into a small state space.
//!
//! A [`State`] is the key under which the pricing policy stores its value
//! estimates. It is derived from three signals: the current stock count, the
//! number of days until the product expires and the ratio between the
//! competitor's price and our base price. Each signal is mapped onto one of
//! three bins, giving 27 possible states.
//!
//! All bin boundaries are half-open (`lower <= x < upper`), so every input
//! lands in exactly one bin. Negative or zero inputs are valid and fall into
//! the lowest bin; validating them is the caller's job.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stock below this count is `low`.
pub const STOCK_LOW_BELOW: i64 = 20;
/// Stock below this count (and at least [`STOCK_LOW_BELOW`]) is `med`.
pub const STOCK_MED_BELOW: i64 = 50;
/// Fewer days to expiry than this is `urgent`.
pub const EXPIRY_URGENT_BELOW: i64 = 7;
/// Fewer days to expiry than this (and at least [`EXPIRY_URGENT_BELOW`]) is `soon`.
pub const EXPIRY_SOON_BELOW: i64 = 30;
/// Competitor ratio strictly below this is `cheaper`.
pub const COMP_CHEAPER_BELOW: f64 = 0.95;
/// Competitor ratio strictly above this is `expensive`.
pub const COMP_EXPENSIVE_ABOVE: f64 = 1.05;

/// How much stock is left on the shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockBin {
    Low,
    Med,
    High,
}

impl StockBin {
    #[must_use]
    pub fn from_level(stock_level: i64) -> Self {
        if stock_level < STOCK_LOW_BELOW {
            StockBin::Low
        } else if stock_level < STOCK_MED_BELOW {
            StockBin::Med
        } else {
            StockBin::High
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StockBin::Low => "low",
            StockBin::Med => "med",
            StockBin::High => "high",
        }
    }
}

/// How close the product is to its expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryBin {
    Urgent,
    Soon,
    Safe,
}

impl ExpiryBin {
    #[must_use]
    pub fn from_days(days_to_expiry: i64) -> Self {
        if days_to_expiry < EXPIRY_URGENT_BELOW {
            ExpiryBin::Urgent
        } else if days_to_expiry < EXPIRY_SOON_BELOW {
            ExpiryBin::Soon
        } else {
            ExpiryBin::Safe
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExpiryBin::Urgent => "urgent",
            ExpiryBin::Soon => "soon",
            ExpiryBin::Safe => "safe",
        }
    }
}

/// Where the competitor's price sits relative to our base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompBin {
    Cheaper,
    Expensive,
    Equal,
}

impl CompBin {
    /// Maps a competitor/base price ratio onto its bin.
    ///
    /// Exactly `0.95` and exactly `1.05` both count as `equal`.
    #[must_use]
    pub fn from_ratio(competitor_ratio: f64) -> Self {
        if competitor_ratio < COMP_CHEAPER_BELOW {
            CompBin::Cheaper
        } else if competitor_ratio > COMP_EXPENSIVE_ABOVE {
            CompBin::Expensive
        } else {
            CompBin::Equal
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompBin::Cheaper => "cheaper",
            CompBin::Expensive => "expensive",
            CompBin::Equal => "equal",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(StockBin, ExpiryBin, CompBin);

/// Discretized pricing situation; the key of the Q-table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct State {
    pub stock: StockBin,
    pub expiry: ExpiryBin,
    pub competition: CompBin,
}

impl State {
    #[must_use]
    pub fn new(stock: StockBin, expiry: ExpiryBin, competition: CompBin) -> Self {
        Self {
            stock,
            expiry,
            competition,
        }
    }

    /// Every state in the space, stock-major.
    #[must_use]
    pub fn all() -> Vec<State> {
        let mut states = Vec::with_capacity(27);
        for stock in [StockBin::Low, StockBin::Med, StockBin::High] {
            for expiry in [ExpiryBin::Urgent, ExpiryBin::Soon, ExpiryBin::Safe] {
                for competition in [CompBin::Cheaper, CompBin::Expensive, CompBin::Equal] {
                    states.push(State::new(stock, expiry, competition));
                }
            }
        }
        states
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.stock, self.expiry, self.competition)
    }
}

/// Maps raw retail signals onto a [`State`]. Pure and total.
#[must_use]
pub fn discretize(stock_level: i64, days_to_expiry: i64, competitor_ratio: f64) -> State {
    State {
        stock: StockBin::from_level(stock_level),
        expiry: ExpiryBin::from_days(days_to_expiry),
        competition: CompBin::from_ratio(competitor_ratio),
    }
}

/// Competitor price divided by base price.
///
/// A base price that is not strictly positive yields `1.0` (assume price parity)
/// instead of dividing by zero.
#[must_use]
pub fn competitor_ratio(base_price: f64, competitor_price: f64) -> f64 {
    if base_price > 0.0 {
        competitor_price / base_price
    } else {
        1.0
    }
}
