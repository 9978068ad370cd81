//! axcrypt-core
//!
//! Pure Rust versioned document encryption engine.
//! Reads and writes both container generations (V1 and V2): header blocks,
//! master key wrapping, subkey derivation and the streaming
//! compress + encrypt + HMAC pipeline.

#![forbid(unsafe_code)]

// Shared and top level
pub mod config;
pub mod constants;
pub mod types;
pub mod utils;

// Primitives and block model
pub mod compression;
pub mod crypto;
pub mod headers;
pub mod keys;
pub mod telemetry;

// Stream plumbing and documents
pub mod document;
pub mod stream;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::config::{CryptoSuite, DocumentConfig};
    pub use crate::document::{
        decrypt_file, detect_version, encrypt_file, open_document, Document, DocumentVersion,
        EncryptOptions, V1Document, V2Document,
    };
    pub use crate::headers::LoadState;
    pub use crate::keys::Passphrase;
    pub use crate::stream::{CancellationToken, InputSource, OutputSink, ProgressContext};
    pub use crate::telemetry::TelemetrySnapshot;
    pub use crate::types::{DocumentError, ErrorKind};
}
