use crate::structs::header::FrameHeader;
use crate::utils::timing::MediaTime;

/// Frame synchronization over a growable byte buffer.
///
/// Provides the [`StreamCursor`](cursor::StreamCursor), which finds frame
/// boundaries, recovers from damaged data and yields [`Frame`] records.
pub mod cursor;

/// Bitrate measurement for free format streams.
pub mod probe;

/// Whole-track model: audio extent, duration and seeking.
///
/// Provides [`TrackModel`](track::TrackModel), built once from a complete
/// stream and read-only afterwards.
pub mod track;

/// A frame located in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Stream offset of the sync word.
    pub offset: u64,
    pub header: FrameHeader,
}

impl Frame {
    /// Stream offset one past the frame.
    pub fn end(&self) -> u64 {
        self.offset + self.header.frame_size() as u64
    }

    pub fn duration(&self) -> MediaTime {
        self.header.duration()
    }
}
