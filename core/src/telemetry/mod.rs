//! telemetry/mod.rs
//! Counters, stage timers and immutable snapshots for document passes.
//!
//! Every `encrypt_to` / `decrypt_to` returns a [`TelemetrySnapshot`].

pub mod counters;
pub mod timers;
pub mod snapshot;

pub use counters::*;
pub use timers::*;
pub use snapshot::*;
