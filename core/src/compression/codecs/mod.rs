// ## src/compression/codecs/mod.rs

pub mod deflate;

pub use deflate::*;
