#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Tabular Q-learning agent for dynamic retail pricing.
//!
//! The [`PricingAgent`] maps a discretized retail [`State`](pricelearn_core::State)
//! to one of five price multipliers using an ε-greedy policy, and learns from
//! realized profit with a one-step temporal-difference update. Its
//! [`QTable`] is persisted to a single file after every update and reloaded
//! on construction; a missing or unreadable file means a cold start.

// Without `telemetry`, warnings go to stderr and info/debug events are dropped.
#[cfg(feature = "telemetry")]
macro_rules! log_warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) };
}
#[cfg(not(feature = "telemetry"))]
macro_rules! log_warn {
    ($($arg:tt)*) => { eprintln!($($arg)*) };
}
#[cfg(feature = "telemetry")]
macro_rules! log_info {
    ($($arg:tt)*) => { ::tracing::info!($($arg)*) };
}
#[cfg(not(feature = "telemetry"))]
macro_rules! log_info {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}
#[cfg(feature = "telemetry")]
macro_rules! log_debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) };
}
#[cfg(not(feature = "telemetry"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}

mod agent;
pub mod config;
pub mod error;
pub mod table;

pub use agent::{AgentStats, PricingAgent};
pub use config::AgentConfig;
pub use error::{AgentError, PersistError, Result};
pub use table::{PolicyReport, QTable};
