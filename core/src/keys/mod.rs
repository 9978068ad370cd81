//! keys/mod.rs
//! Passphrase to KEK, master key generation and wrapping, and purpose-bound
//! subkeys for both document generations.

pub mod hierarchy;
pub mod passphrase;

pub use hierarchy::*;
pub use passphrase::*;
