//! Rolling detection history + derived alerts.

pub mod analyzer;
pub mod store;

pub use analyzer::{derive_alerts, derive_alerts_at, Alert};
pub use store::{TrendSnapshot, TrendStore, TREND_WINDOW_DAYS};
