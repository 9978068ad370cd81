//! compression/mod.rs
//! Streaming zlib compression for document payloads.
//!
//! Notes:
//! - One zlib stream spans the whole payload; chunks are sync-flushed, never
//!   independently framed.
//! - Registry resolves a suite's codec to an implementation.

pub mod types;
pub mod registry;
pub mod codecs;

pub use types::*;
pub use registry::*;
