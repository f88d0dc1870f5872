//! Electricity offer comparison: prices every offer of a regulator feed
//! against a consumer profile and ranks them by projected annual savings.

pub mod config;
pub mod error;
pub mod tariffs;
pub mod telemetry;
