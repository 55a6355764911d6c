//! Utility functions and supporting infrastructure.
//!
//! Provides bitstream I/O, CRC validation, error handling and fixed-resolution
//! media time used by the framing and metadata layers.

pub mod bitstream_io;
pub mod crc;
pub mod errors;
#[cfg(test)]
pub(crate) mod synth;
pub mod timing;
