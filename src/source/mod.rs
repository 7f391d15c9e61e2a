//! Position snapshot sources.
//!
//! ## Engine API
//! Read-only REST access to the trading engine's open positions.
//!
//! ## Scripted
//! In-memory replay of canned snapshots for dry runs and tests.

mod client;
pub mod mock;
mod traits;
mod types;

pub use client::EngineClient;
pub use mock::{ScriptStep, ScriptedPositionSource};
pub use traits::PositionSnapshotSource;
pub use types::*;
