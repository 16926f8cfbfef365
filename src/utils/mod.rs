//! # Utility Modules
//!
//! Supporting utilities for logging, observability, and diagnostics.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters
//! - **Hexdump**: Wire-byte capture formatting for trace logs

pub mod hexdump;
pub mod logging;
pub mod metrics;

pub use metrics::Metrics;
