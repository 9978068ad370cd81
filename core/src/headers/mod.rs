//! headers/mod.rs
//! Header block model shared by both document generations.
//!
//! Layout on the wire:
//! ```text
//! magic GUID (16) | Preamble | Version | ... header blocks ... | Data | data region
//! ```
//! Each block is `[type u8][payload length u32 LE][payload]`.

pub mod block;
pub mod crypto;
pub mod payload;
pub mod raw;
pub mod types;

pub use block::*;
pub use crypto::*;
pub use payload::*;
pub use raw::*;
pub use types::*;
