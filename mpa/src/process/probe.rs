use log::{debug, trace};

use crate::structs::header::{FrameHeader, HEADER_LEN, Layer, find_sync};
use crate::utils::errors::{HeaderError, StreamError};

/// Lowest bitrate accepted for a free format stream, in kb/s.
pub const FREE_BITRATE_MIN: u64 = 8;

/// Highest Layer III free format bitrate, in kb/s.
pub const FREE_BITRATE_MAX_LAYER3: u64 = 640;

/// Highest free format bitrate searched for, in kb/s. Bounds the distance
/// scanned for the next frame.
pub const fn free_bitrate_search_max(layer: Layer) -> u64 {
    match layer {
        Layer::I => 448,
        Layer::II => 384,
        Layer::III => FREE_BITRATE_MAX_LAYER3,
    }
}

/// Slack past the largest frame, one Layer I slot.
const SEARCH_SLACK: usize = 4;

/// Measures the bitrate of a free format frame.
///
/// Free format headers carry bitrate index 0, so the frame length is only
/// known once the next frame of the same stream has been found. The probe
/// scans forward from the frame start, peeks a header at every candidate
/// sync word and back-computes the bitrate from the distance to the first
/// candidate with the same layer and sample rate. The scan stops at the
/// size of a frame at [`free_bitrate_search_max`].
///
/// The probe only borrows the buffer; the owning cursor is left untouched
/// whatever the outcome.
#[derive(Debug, Clone, Copy)]
pub struct FreeBitrateProbe<'a> {
    buffer: &'a [u8],
    start: usize,
    finished: bool,
}

impl<'a> FreeBitrateProbe<'a> {
    /// `start` is the offset of the free format frame inside `buffer`.
    /// `finished` tells the probe that no bytes will follow `buffer`.
    pub fn new(buffer: &'a [u8], start: usize, finished: bool) -> Self {
        Self {
            buffer,
            start,
            finished,
        }
    }

    /// Returns the bitrate in bits per second.
    ///
    /// Fails with [`StreamError::NeedMoreData`] when the buffer ends before
    /// the search limit and more input may follow, and with
    /// [`StreamError::LostSync`] when no plausible bitrate can be derived.
    pub fn measure(&self, header: &FrameHeader) -> Result<u32, StreamError> {
        let sample_rate = header.sample_rate as u64;
        let padding = header.padding as u64;
        let slots = header.slots_per_frame() as u64;

        let max_rate = free_bitrate_search_max(header.layer) * 1000;
        let max_size = header.with_bitrate(max_rate as u32).frame_size();
        let limit = self.start + max_size + SEARCH_SLACK;

        let mut rate = 0u64;
        let mut pos = self.start + header.header_len();

        while let Some(candidate) = find_sync(self.buffer, pos).filter(|&c| c <= limit) {
            match FrameHeader::from_bytes(&self.buffer[candidate..]) {
                Ok(peek) if peek.is_compatible(header) => {
                    let distance = (candidate - self.start) as u64;
                    rate = match header.layer {
                        Layer::I => sample_rate * (distance - 4 * padding + 4) / 48 / 1000,
                        _ => sample_rate * (distance - padding + 1) / slots / 1000,
                    };
                    trace!("Free format candidate at +{distance}: {rate} kb/s");

                    if rate >= FREE_BITRATE_MIN {
                        break;
                    }
                }
                Err(HeaderError::Truncated) if !self.finished => {
                    return Err(StreamError::NeedMoreData);
                }
                _ => {}
            }

            pos = candidate + 1;
        }

        let searched_to_limit = self.buffer.len() >= limit + HEADER_LEN;
        if rate < FREE_BITRATE_MIN && !self.finished && !searched_to_limit {
            return Err(StreamError::NeedMoreData);
        }

        if rate < FREE_BITRATE_MIN
            || (header.layer == Layer::III && rate > FREE_BITRATE_MAX_LAYER3)
        {
            debug!("Rejected free format bitrate {rate} kb/s");
            return Err(StreamError::LostSync);
        }

        Ok((rate * 1000) as u32)
    }
}
