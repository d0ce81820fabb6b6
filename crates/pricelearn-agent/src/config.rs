use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Hyperparameters and storage location of a [`PricingAgent`](crate::PricingAgent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Learning rate (alpha), in `(0, 1]`.
    pub alpha: f64,
    /// Discount factor (gamma), in `[0, 1]`.
    pub gamma: f64,
    /// Exploration probability (epsilon), in `[0, 1]`.
    pub epsilon: f64,
    /// File holding the serialized policy table.
    pub model_path: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.1,
            model_path: PathBuf::from("data/pricing_model.json"),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha.is_finite() && self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(AgentError::InvalidConfig(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(AgentError::InvalidConfig(format!(
                "gamma must be in [0, 1], got {}",
                self.gamma
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(AgentError::InvalidConfig(format!(
                "epsilon must be in [0, 1], got {}",
                self.epsilon
            )));
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(AgentError::InvalidConfig("model_path is empty".into()));
        }
        Ok(())
    }
}
