//! Core types for pricelearn: retail signals, discretized states, price
//! actions and the [`PricingPolicy`] trait implemented by learning agents.

pub mod action;
pub mod state;

pub use action::Action;
pub use state::{competitor_ratio, discretize, CompBin, ExpiryBin, State, StockBin};

use serde::{Deserialize, Serialize};

/// Raw signals for a pricing decision, as received from the request layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub base_price: f64,
    pub current_stock: i64,
    pub days_to_expiry: i64,
    pub competitor_price: f64,
}

impl PricingRequest {
    /// The discretized state these signals describe.
    #[must_use]
    pub fn state(&self) -> State {
        discretize(
            self.current_stock,
            self.days_to_expiry,
            competitor_ratio(self.base_price, self.competitor_price),
        )
    }

    /// Approximate successor state: same signals with one unit of stock sold.
    ///
    /// Stands in for the unobserved next state; expiry countdown and actual
    /// sales volume are not modelled.
    #[must_use]
    pub fn successor_state(&self) -> State {
        discretize(
            self.current_stock.saturating_sub(1).max(0),
            self.days_to_expiry,
            competitor_ratio(self.base_price, self.competitor_price),
        )
    }
}

/// Observed outcome of a previously applied price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingFeedback {
    #[serde(flatten)]
    pub request: PricingRequest,
    pub applied_multiplier: f64,
    /// Realized profit, used unscaled as the reward.
    #[serde(alias = "actual_profit_made")]
    pub realized_profit: f64,
}

/// Whether a multiplier was drawn at random or taken from the learned values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionMode {
    Explore,
    Exploit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub suggested_price: f64,
    pub multiplier: f64,
    pub explanation: String,
    pub state: State,
    pub mode: DecisionMode,
}

/// Acknowledgement returned after a learning update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackAck {
    pub status: String,
    pub reward: f64,
}

impl FeedbackAck {
    #[must_use]
    pub fn learned(reward: f64) -> Self {
        Self {
            status: "learned".into(),
            reward,
        }
    }
}

/// Rounds a price to whole cents.
#[must_use]
pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// A pricing policy that suggests prices and learns from feedback.
///
/// Implementations are shared between request handlers, so both operations
/// take `&self` and handle their own synchronization.
pub trait PricingPolicy {
    type Error: std::error::Error;

    fn optimize(&self, request: &PricingRequest) -> Result<Suggestion, Self::Error>;
    fn record_feedback(&self, feedback: &PricingFeedback) -> Result<FeedbackAck, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(stock: i64) -> PricingRequest {
        PricingRequest {
            product_name: None,
            base_price: 100.0,
            current_stock: stock,
            days_to_expiry: 3,
            competitor_price: 90.0,
        }
    }

    #[test]
    fn successor_state_decrements_stock_and_floors_at_zero() {
        assert_eq!(request(20).state().stock, StockBin::Med);
        assert_eq!(request(20).successor_state().stock, StockBin::Low);
        assert_eq!(request(0).successor_state(), request(0).state());
        assert_eq!(request(i64::MIN).successor_state().stock, StockBin::Low);
    }

    #[test]
    fn feedback_accepts_original_field_names() {
        let fb: PricingFeedback = serde_json::from_value(json!({
            "product_name": "Milk",
            "base_price": 2.5,
            "current_stock": 40,
            "days_to_expiry": 5,
            "competitor_price": 2.4,
            "applied_multiplier": 0.9,
            "actual_profit_made": 12.0
        }))
        .unwrap();
        assert_eq!(fb.request.product_name.as_deref(), Some("Milk"));
        assert!((fb.realized_profit - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn round_price_keeps_two_decimals() {
        assert!((round_price(80.0) - 80.0).abs() < f64::EPSILON);
        assert!((round_price(2.345_6) - 2.35).abs() < 1e-9);
        assert!((round_price(1.1 * 9.99) - 10.99).abs() < 1e-9);
    }
}
