//! telemetry/counters.rs
//! Mutable counters used during a document pass.
//!
//! Converted into an immutable TelemetrySnapshot when the pass ends.
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryCounters {
    /// Pipeline steps (one per chunk read or data part).
    pub chunks: u64,
    /// Magic, header blocks and trailer bytes.
    pub bytes_header: u64,
    /// Bytes before compression (encrypt) or after decompression (decrypt).
    pub bytes_plaintext: u64,
    /// Bytes entering the cipher (equal to plaintext when uncompressed).
    pub bytes_compressed: u64,
    /// Ciphertext bytes, excluding block framing.
    pub bytes_ciphertext: u64,
}

impl TelemetryCounters {
    pub fn add_header(&mut self, len: usize) {
        self.bytes_header += len as u64;
    }

    /// Record one pipeline step.
    pub fn add_chunk(&mut self, pt_len: usize, comp_len: usize, ct_len: usize) {
        self.chunks += 1;
        self.bytes_plaintext += pt_len as u64;
        self.bytes_compressed += comp_len as u64;
        self.bytes_ciphertext += ct_len as u64;
    }

    /// Bytes emitted or consumed outside of a chunk (cipher padding, codec tail).
    pub fn add_tail(&mut self, pt_len: usize, comp_len: usize, ct_len: usize) {
        self.bytes_plaintext += pt_len as u64;
        self.bytes_compressed += comp_len as u64;
        self.bytes_ciphertext += ct_len as u64;
    }

    pub fn total_output_bytes(&self) -> u64 {
        self.bytes_header + self.bytes_ciphertext
    }
}

impl AddAssign for TelemetryCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.chunks           += rhs.chunks;
        self.bytes_header     += rhs.bytes_header;
        self.bytes_plaintext  += rhs.bytes_plaintext;
        self.bytes_compressed += rhs.bytes_compressed;
        self.bytes_ciphertext += rhs.bytes_ciphertext;
    }
}
