pub mod types;
pub mod cipher;
pub mod kdf;
pub mod keywrap;
pub mod mac;

pub use types::*;
pub use cipher::*;
pub use kdf::*;
pub use keywrap::*;
pub use mac::*;
