//! # ROI Watch
//!
//! Watches leveraged futures positions held by an automated trading engine,
//! reports their ROI against mode-dependent thresholds, and confirms from the
//! engine's structured log that an early profit booking actually closed them.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `source`: Position snapshot sources (engine HTTP API, scripted mock)
//! - `monitor`: ROI calculation, thresholds, closure evidence, the watcher state machine
//! - `error`: Error taxonomy for recoverable tick failures
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod error;
pub mod monitor;
pub mod source;
pub mod utils;

pub use config::Config;
pub use error::{WatchError, WatchResult};
