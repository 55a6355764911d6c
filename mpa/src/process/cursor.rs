use log::Level::Warn;
use log::{debug, trace, warn};

use crate::log_or_err;
use crate::process::Frame;
use crate::process::probe::FreeBitrateProbe;
use crate::structs::header::{FrameHeader, Layer, find_sync, is_sync};
use crate::utils::errors::{HeaderError, StreamError};

/// Bytes that must follow a frame before it is handed out while more input
/// may arrive. Covers the largest header plus the following sync word.
pub const BUFFER_GUARD: usize = 8;

/// Highest cached free format bitrate still trusted for Layer III, in bits/s.
const FREE_RATE_MAX_LAYER3: u32 = 640_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Unsynced,
    Synced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorStats {
    /// Frames handed out.
    pub frames: u64,
    /// Times synchronization was regained after frames had been decoded.
    pub resyncs: u64,
    /// Bytes stepped over while searching for a sync word, including
    /// explicit skips.
    pub bytes_skipped: u64,
}

/// Restorable value snapshot of a cursor's position and state.
///
/// Only valid for the cursor it was taken from, and only until the next
/// [`StreamCursor::compact`].
#[derive(Debug, Clone, Copy)]
pub struct CursorState {
    this_frame: usize,
    next_frame: usize,
    sync: SyncState,
    skip: usize,
    free_rate: u32,
    header: Option<FrameHeader>,
    error: Option<StreamError>,
    stats: CursorStats,
}

/// Frame synchronizer over an owned, growable byte buffer.
///
/// The cursor holds two indices into its buffer: `this_frame`, the start of
/// the last decoded frame, and `next_frame`, where the next search or frame
/// begins. While [`SyncState::Unsynced`] it scans for a sync word and only
/// accepts a candidate when another sync word sits right where the
/// candidate's computed frame ends. Once [`SyncState::Synced`] it expects
/// each frame to start exactly at `next_frame`.
///
/// Running out of buffer is never fatal: [`StreamError::NeedMoreData`] is
/// reported, the indices stay where they were, and the same call succeeds
/// after [`push_bytes`](Self::push_bytes). Bytes already proven not to hold
/// a sync word are not scanned again.
///
/// # Example
///
/// ```rust,no_run
/// use mpa::process::cursor::StreamCursor;
///
/// let mut cursor = StreamCursor::default();
/// cursor.push_bytes(&std::fs::read("track.mp3")?);
/// cursor.finish();
///
/// for frame in &mut cursor {
///     match frame {
///         Ok(frame) => println!("{:>10} {}", frame.offset, frame.header),
///         Err(e) => eprintln!("{e}"),
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct StreamCursor {
    buffer: Vec<u8>,
    /// Stream offset of `buffer[0]`.
    base: u64,
    this_frame: usize,
    next_frame: usize,
    sync: SyncState,
    skip: usize,
    finished: bool,
    /// Measured free format bitrate in bits/s, 0 when unknown.
    free_rate: u32,
    header: Option<FrameHeader>,
    error: Option<StreamError>,
    stats: CursorStats,
    pub fail_level: log::Level,
}

impl Default for StreamCursor {
    fn default() -> Self {
        Self {
            buffer: Vec::with_capacity(64 * 1024),
            base: 0,
            this_frame: 0,
            next_frame: 0,
            sync: SyncState::Unsynced,
            skip: 0,
            finished: false,
            free_rate: 0,
            header: None,
            error: None,
            stats: CursorStats::default(),
            fail_level: log::Level::Error,
        }
    }
}

impl StreamCursor {
    /// Creates a cursor over a complete stream.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut cursor = Self {
            buffer: data.to_vec(),
            ..Default::default()
        };
        cursor.finish();
        cursor
    }

    /// Appends input. Indices into the buffer stay valid.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Marks the end of input. The last frame may then end exactly at the
    /// end of the buffer.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Validation findings at or above `level` become errors.
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.fail_level = level;
    }

    /// Schedules `len` bytes to be skipped before the next sync attempt.
    pub fn skip_bytes(&mut self, len: usize) {
        self.skip += len;
    }

    /// Drops buffered bytes that precede the current frame.
    pub fn compact(&mut self) {
        let consumed = self.this_frame.min(self.next_frame);
        if consumed == 0 {
            return;
        }

        self.buffer.drain(..consumed);
        self.base += consumed as u64;
        self.this_frame -= consumed;
        self.next_frame -= consumed;
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync
    }

    pub fn is_synced(&self) -> bool {
        self.sync == SyncState::Synced
    }

    /// Header of the last frame handed out.
    pub fn header(&self) -> Option<&FrameHeader> {
        self.header.as_ref()
    }

    pub fn last_error(&self) -> Option<StreamError> {
        self.error
    }

    /// Measured free format bitrate in bits/s.
    pub fn free_bitrate(&self) -> Option<u32> {
        (self.free_rate != 0).then_some(self.free_rate)
    }

    pub fn stats(&self) -> &CursorStats {
        &self.stats
    }

    /// Stream offset of the last decoded frame, or of the position where
    /// sync was lost.
    pub fn frame_offset(&self) -> u64 {
        self.base + self.this_frame as u64
    }

    /// Stream offset where the next frame or search begins.
    pub fn next_offset(&self) -> u64 {
        self.base + self.next_frame as u64
    }

    /// Stream offset one past the last buffered byte.
    pub fn end_offset(&self) -> u64 {
        self.base + self.buffer.len() as u64
    }

    /// Bytes of the last decoded frame. Empty after a failed advance.
    pub fn frame_bytes(&self) -> &[u8] {
        match self.error {
            None if self.header.is_some() => &self.buffer[self.this_frame..self.next_frame],
            _ => &[],
        }
    }

    pub fn snapshot(&self) -> CursorState {
        CursorState {
            this_frame: self.this_frame,
            next_frame: self.next_frame,
            sync: self.sync,
            skip: self.skip,
            free_rate: self.free_rate,
            header: self.header,
            error: self.error,
            stats: self.stats,
        }
    }

    pub fn restore(&mut self, state: CursorState) {
        self.this_frame = state.this_frame.min(self.buffer.len());
        self.next_frame = state.next_frame.min(self.buffer.len());
        self.sync = state.sync;
        self.skip = state.skip;
        self.free_rate = state.free_rate;
        self.header = state.header;
        self.error = state.error;
        self.stats = state.stats;
    }

    /// Discards the last decoded frame and resumes the search one byte past
    /// its start.
    pub fn reject_frame(&mut self) {
        self.next_frame = (self.this_frame + 1).min(self.buffer.len());
        self.header = None;
        self.lose_sync();
    }

    /// Advances to the next frame.
    ///
    /// On success [`frame_bytes`](Self::frame_bytes) holds the frame.
    /// [`StreamError::NeedMoreData`] keeps the sync state and
    /// [`StreamError::BadCrc`] keeps the cursor synced past the damaged
    /// frame. Every other error leaves the cursor unsynced, and the next
    /// call searches again from one byte further.
    pub fn decode_next(&mut self) -> Result<FrameHeader, StreamError> {
        match self.advance() {
            Ok(header) => {
                trace!("Frame at {}: {header}", self.frame_offset());
                self.header = Some(header);
                self.error = None;
                self.stats.frames += 1;
                Ok(header)
            }
            Err(e) => {
                self.error = Some(e);
                Err(e)
            }
        }
    }

    fn guard(&self) -> usize {
        if self.finished { 0 } else { BUFFER_GUARD }
    }

    fn lose_sync(&mut self) {
        self.sync = SyncState::Unsynced;
        self.free_rate = 0;
    }

    fn need_more_data(&mut self, resume: usize) -> Result<FrameHeader, StreamError> {
        self.this_frame = self.this_frame.min(resume);
        self.next_frame = resume;
        Err(StreamError::NeedMoreData)
    }

    fn advance(&mut self) -> Result<FrameHeader, StreamError> {
        let end = self.buffer.len();
        let mut ptr = self.next_frame;

        if self.skip > 0 {
            let available = end - ptr;
            if self.skip > available {
                self.skip -= available;
                self.stats.bytes_skipped += available as u64;
                self.this_frame = end;
                return self.need_more_data(end);
            }

            ptr += self.skip;
            self.stats.bytes_skipped += self.skip as u64;
            self.skip = 0;
            self.this_frame = ptr;
            self.next_frame = ptr;
        }

        loop {
            if self.is_synced() {
                if end - ptr < self.guard().max(2) {
                    return self.need_more_data(ptr);
                }

                if !is_sync(self.buffer[ptr], self.buffer[ptr + 1]) {
                    self.this_frame = ptr;
                    self.next_frame = ptr + 1;
                    self.lose_sync();
                    warn!("Lost sync at offset {}", self.base + ptr as u64);
                    return Err(StreamError::LostSync);
                }
            } else {
                match find_sync(&self.buffer, ptr) {
                    Some(found) if end - found >= self.guard().max(2) => {
                        self.stats.bytes_skipped += (found - ptr) as u64;
                        ptr = found;
                    }
                    Some(found) => {
                        self.stats.bytes_skipped += (found - ptr) as u64;
                        return self.need_more_data(found);
                    }
                    None => {
                        // The last byte may still start a sync word
                        let resume = end.saturating_sub(1).max(ptr);
                        self.stats.bytes_skipped += (resume - ptr) as u64;
                        return self.need_more_data(resume);
                    }
                }
            }

            self.this_frame = ptr;
            self.next_frame = ptr + 1;

            let mut header = match FrameHeader::from_bytes(&self.buffer[ptr..]) {
                Ok(header) => header,
                Err(HeaderError::Truncated) => return self.need_more_data(ptr),
                Err(e) => {
                    self.lose_sync();
                    debug!("Bad header at offset {}: {e}", self.base + ptr as u64);
                    return Err(e.into());
                }
            };

            if header.bitrate == 0 {
                if self.free_rate == 0
                    || !self.is_synced()
                    || (header.layer == Layer::III && self.free_rate > FREE_RATE_MAX_LAYER3)
                {
                    match FreeBitrateProbe::new(&self.buffer, ptr, self.finished).measure(&header) {
                        Ok(rate) => {
                            debug!("Free format bitrate: {} kb/s", rate / 1000);
                            self.free_rate = rate;
                        }
                        Err(StreamError::NeedMoreData) => return self.need_more_data(ptr),
                        Err(e) => {
                            self.lose_sync();
                            return Err(e);
                        }
                    }
                }

                header = header.with_bitrate(self.free_rate);
            }

            let size = header.frame_size();
            if size + self.guard() > end - ptr {
                return self.need_more_data(ptr);
            }

            self.next_frame = ptr + size;

            if !self.is_synced() {
                let next = self.next_frame;
                let confirmed = match self.buffer.get(next..next + 2) {
                    Some(&[b0, b1]) => is_sync(b0, b1),
                    _ => self.finished,
                };

                if !confirmed {
                    trace!("No sync after candidate at {}", self.base + ptr as u64);
                    self.stats.bytes_skipped += 1;
                    ptr += 1;
                    self.next_frame = ptr;
                    continue;
                }

                if self.stats.frames > 0 {
                    self.stats.resyncs += 1;
                    debug!("Resynchronized at offset {}", self.base + ptr as u64);
                }
                self.sync = SyncState::Synced;
            }

            if header.verify_crc(&self.buffer[ptr..ptr + size]) == Some(false) {
                log_or_err!(self, Warn, StreamError::BadCrc);
            }

            return Ok(header);
        }
    }
}

impl Iterator for StreamCursor {
    type Item = Result<Frame, StreamError>;

    /// Yields frames until the buffer is exhausted. Push more bytes and
    /// iterate again to continue.
    fn next(&mut self) -> Option<Self::Item> {
        match self.decode_next() {
            Ok(header) => Some(Ok(Frame {
                offset: self.frame_offset(),
                header,
            })),
            Err(StreamError::NeedMoreData) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::header::MpegVersion;
    use crate::utils::synth;

    #[test]
    fn decodes_a_clean_stream() {
        let header = synth::mp3_header(9);
        let data = synth::frames(&header, 5);
        let mut cursor = StreamCursor::from_slice(&data);

        let offsets: Vec<u64> = (&mut cursor)
            .map(|frame| frame.map(|f| f.offset))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(offsets, vec![0, 417, 834, 1251, 1668]);
        assert_eq!(cursor.stats().frames, 5);
        assert_eq!(cursor.stats().resyncs, 0);
        assert_eq!(cursor.last_error(), Some(StreamError::NeedMoreData));
    }

    #[test]
    fn truncated_frame_needs_more_data_then_decodes_once() {
        let header = synth::mp3_header(9);
        let data = synth::frames(&header, 3);

        let mut cursor = StreamCursor::default();
        cursor.push_bytes(&data[..417 + 200]);

        assert_eq!(cursor.decode_next(), Ok(header));
        assert_eq!(cursor.frame_offset(), 0);
        assert_eq!(cursor.frame_bytes().len(), 417);

        assert_eq!(cursor.decode_next(), Err(StreamError::NeedMoreData));
        assert_eq!(cursor.next_offset(), 417);
        assert_eq!(cursor.decode_next(), Err(StreamError::NeedMoreData));
        assert!(cursor.frame_bytes().is_empty());

        cursor.push_bytes(&data[417 + 200..]);
        assert_eq!(cursor.decode_next(), Ok(header));
        assert_eq!(cursor.frame_offset(), 417);

        // the final frame is held back until the end of input is known
        assert_eq!(cursor.decode_next(), Err(StreamError::NeedMoreData));
        cursor.finish();
        assert_eq!(cursor.decode_next(), Ok(header));
        assert_eq!(cursor.frame_offset(), 834);
        assert_eq!(cursor.decode_next(), Err(StreamError::NeedMoreData));
        assert_eq!(cursor.stats().frames, 3);
    }

    #[test]
    fn byte_at_a_time() {
        let header = synth::mp3_header(5);
        let mut data = vec![0x00, 0xFF, 0x12];
        data.extend(synth::frames(&header, 4));

        let mut cursor = StreamCursor::default();
        let mut offsets = Vec::new();
        for byte in &data {
            cursor.push_bytes(std::slice::from_ref(byte));
            offsets.extend((&mut cursor).map(|frame| frame.unwrap().offset));
        }
        cursor.finish();
        offsets.extend((&mut cursor).map(|frame| frame.unwrap().offset));

        let size = header.frame_size() as u64;
        assert_eq!(offsets, (0..4).map(|i| 3 + i * size).collect::<Vec<_>>());
        assert_eq!(cursor.stats().bytes_skipped, 3);
    }

    #[test]
    fn resyncs_after_corrupted_sync() {
        let header = synth::mp3_header(9);
        let size = header.frame_size();
        let mut data = synth::frames(&header, 6);
        data[2 * size] = 0x00;

        let mut cursor = StreamCursor::from_slice(&data);
        assert!(cursor.decode_next().is_ok());
        assert!(cursor.decode_next().is_ok());
        assert_eq!(cursor.decode_next(), Err(StreamError::LostSync));
        assert_eq!(cursor.sync_state(), SyncState::Unsynced);
        assert_eq!(cursor.frame_offset(), 2 * size as u64);

        assert!(cursor.decode_next().is_ok());
        assert_eq!(cursor.frame_offset(), 3 * size as u64);
        assert!(cursor.is_synced());
        assert_eq!(cursor.stats().resyncs, 1);
        // the search stayed within one frame of the damage
        assert_eq!(cursor.stats().bytes_skipped, size as u64 - 1);
    }

    #[test]
    fn unsynced_candidate_needs_a_following_sync() {
        let header = synth::mp3_header(9);
        let mut data = vec![0xFF, 0xFB, 0x90, 0x00, 0x00];
        data.extend(synth::frames(&header, 2));

        let mut cursor = StreamCursor::from_slice(&data);
        assert_eq!(cursor.decode_next(), Ok(header));
        assert_eq!(cursor.frame_offset(), 5);
    }

    #[test]
    fn reserved_header_is_reported_and_skipped() {
        let header = synth::mp3_header(9);
        let mut data = vec![0xFF, 0xFB, 0xF0, 0x00];
        data.extend(synth::frames(&header, 2));

        let mut cursor = StreamCursor::from_slice(&data);
        assert_eq!(cursor.decode_next(), Err(StreamError::BadBitrate));
        assert_eq!(cursor.decode_next(), Ok(header));
        assert_eq!(cursor.frame_offset(), 4);
    }

    #[test]
    fn pending_skip_applies_once() {
        let header = synth::mp3_header(9);
        let mut data = vec![0xFF; 10];
        data.extend(synth::frames(&header, 2));

        let mut cursor = StreamCursor::default();
        cursor.skip_bytes(10);
        cursor.push_bytes(&data[..4]);
        assert_eq!(cursor.decode_next(), Err(StreamError::NeedMoreData));

        cursor.push_bytes(&data[4..]);
        cursor.finish();
        assert_eq!(cursor.decode_next(), Ok(header));
        assert_eq!(cursor.frame_offset(), 10);
        assert_eq!(cursor.decode_next(), Ok(header));
        assert_eq!(cursor.stats().bytes_skipped, 10);
    }

    #[test]
    fn free_format_rate_is_cached() {
        let header = FrameHeader::new(MpegVersion::Mpeg1, Layer::III, 0, 0).unwrap();
        let data: Vec<u8> = (0..4)
            .flat_map(|_| synth::sized_frame(&header, 1632))
            .collect();

        let mut cursor = StreamCursor::from_slice(&data);
        let first = cursor.decode_next().unwrap();
        assert_eq!(first.bitrate, 500_000);
        assert_eq!(cursor.free_bitrate(), Some(500_000));
        assert_eq!(cursor.frame_bytes().len(), 1632);

        for _ in 0..3 {
            assert_eq!(cursor.decode_next().map(|h| h.bitrate), Ok(500_000));
        }
    }

    #[test]
    fn snapshot_restores_position() {
        let header = synth::mp3_header(9);
        let data = synth::frames(&header, 3);
        let mut cursor = StreamCursor::from_slice(&data);

        cursor.decode_next().unwrap();
        let state = cursor.snapshot();
        cursor.decode_next().unwrap();
        assert_eq!(cursor.frame_offset(), 417);

        cursor.restore(state);
        assert_eq!(cursor.frame_offset(), 0);
        assert_eq!(cursor.frame_bytes().len(), 417);
        assert_eq!(cursor.stats().frames, 1);

        cursor.reject_frame();
        assert!(!cursor.is_synced());
        assert_eq!(cursor.decode_next(), Ok(header));
        assert_eq!(cursor.frame_offset(), 417);
    }

    #[test]
    fn compact_keeps_offsets() {
        let header = synth::mp3_header(9);
        let data = synth::frames(&header, 4);
        let mut cursor = StreamCursor::from_slice(&data);

        cursor.decode_next().unwrap();
        cursor.decode_next().unwrap();
        cursor.compact();
        assert_eq!(cursor.frame_offset(), 417);
        assert_eq!(cursor.frame_bytes().len(), 417);
        assert_eq!(cursor.end_offset(), 4 * 417);

        cursor.decode_next().unwrap();
        assert_eq!(cursor.frame_offset(), 834);
    }

    #[test]
    fn bad_frame_crc() {
        let mut header = synth::mp3_header(9);
        header.protected = true;
        let mut data = synth::frames(&header, 3);
        data[417 + 10] = 0x55;

        let mut cursor = StreamCursor::from_slice(&data);
        assert!(cursor.decode_next().is_ok());
        // logged only
        assert!(cursor.decode_next().is_ok());

        let mut cursor = StreamCursor::from_slice(&data);
        cursor.set_fail_level(log::Level::Warn);
        assert!(cursor.decode_next().is_ok());
        assert_eq!(cursor.decode_next(), Err(StreamError::BadCrc));
        assert!(cursor.is_synced());
        assert_eq!(cursor.decode_next().map(|_| cursor.frame_offset()), Ok(834));
    }

    #[test]
    fn stray_free_format_header_does_not_stall_streaming() {
        // free format at 48 kHz in front of a 44.1 kHz stream
        let mut data = vec![0xFF, 0xFB, 0x04, 0x00, 0x11, 0x22];
        data.extend(synth::frames(&synth::mp3_header(9), 200));

        let mut cursor = StreamCursor::default();
        let mut frames = 0;
        let mut errors = 0;
        for chunk in data.chunks(4096) {
            cursor.push_bytes(chunk);
            for frame in &mut cursor {
                match frame {
                    Ok(_) => frames += 1,
                    Err(_) => errors += 1,
                }
            }
            cursor.compact();
        }

        // everything but the final frame, without finish()
        assert_eq!(frames, 199);
        assert_eq!(errors, 1);

        cursor.finish();
        assert!(cursor.decode_next().is_ok());
        assert_eq!(cursor.frame_offset(), 6 + 199 * 417);
    }
}
