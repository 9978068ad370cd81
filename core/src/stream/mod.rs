//! stream/mod.rs
//! I/O normalisation, progress/cancellation and the chunked
//! compress + encrypt pipeline shared by both document generations.

pub mod io;
pub mod pipeline;
pub mod progress;

pub use io::*;
pub use pipeline::*;
pub use progress::*;
