//! Progress tracking and throttling.
//!
//! This module rate-limits download notification events.

mod throttle;

pub use throttle::PercentWatermark;
