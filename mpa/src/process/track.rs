use std::fmt::{Display, Formatter};

use log::Level::Warn;
use log::{debug, info, trace};

use crate::log_or_err;
use crate::process::cursor::StreamCursor;
use crate::structs::header::{FrameHeader, is_sync};
use crate::structs::id3::{ID3V1_LEN, Id3v2Header, has_id3v1};
use crate::structs::seek::{SeekMetadata, TagParser, Toc};
use crate::utils::errors::{StreamError, TagError, TrackError};
use crate::utils::timing::MediaTime;

/// Frames inspected to estimate a stream without seek metadata.
pub const DEFAULT_SAMPLE_FRAMES: usize = 200;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Findings logged at or above this level abort the load.
    pub fail_level: log::Level,
    /// Frames sampled when the stream carries no usable frame count.
    pub sample_frames: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            fail_level: log::Level::Error,
            sample_frames: DEFAULT_SAMPLE_FRAMES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitrateMode {
    Constant,
    Variable,
}

impl Display for BitrateMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BitrateMode::Constant => write!(f, "CBR"),
            BitrateMode::Variable => write!(f, "VBR"),
        }
    }
}

/// Duration and seek model of a complete stream.
///
/// Built once by [`TrackModel::load`]; all queries take `&self`, so a
/// loaded model can be shared freely between threads.
///
/// # Example
///
/// ```rust,no_run
/// use mpa::process::track::{LoadOptions, TrackModel};
///
/// let data = std::fs::read("track.mp3")?;
/// let track = TrackModel::load(&data, &LoadOptions::default())?;
///
/// println!("{} frames, {} ms", track.frame_count, track.duration_ms);
/// println!("one minute in: byte {}", track.position_for(60_000));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct TrackModel {
    /// Offset of the first frame, metadata frame included.
    pub first_frame: u64,
    /// Offset of the first audio frame.
    pub audio_start: u64,
    /// Bytes from `audio_start` to the end of the audio.
    pub audio_bytes: u64,
    /// Header of the first frame.
    pub header: FrameHeader,
    pub sample_rate: u32,
    pub samples_per_frame: u32,
    pub bitrate_mode: BitrateMode,
    pub duration: MediaTime,
    pub duration_ms: u64,
    pub frame_count: u64,
    pub sample_count: u64,
    pub average_frame_size: u64,
    pub metadata: Option<SeekMetadata>,
    /// Bytes of the leading ID3v2 tag that were skipped.
    pub id3v2_len: usize,
    /// A trailing ID3v1 block was stripped.
    pub id3v1: bool,
}

#[derive(Debug, Default)]
struct FrameSample {
    frames: u64,
    bytes: u64,
    bitrate: u32,
    constant: bool,
}

impl FrameSample {
    fn record(&mut self, header: &FrameHeader) {
        if self.frames == 0 {
            self.bitrate = header.bitrate;
            self.constant = true;
        } else if header.bitrate != self.bitrate {
            self.constant = false;
        }

        self.frames += 1;
        self.bytes += header.frame_size() as u64;
    }
}

impl TrackModel {
    /// Builds the model from a complete stream.
    pub fn load(data: &[u8], options: &LoadOptions) -> Result<Self, TrackError> {
        let id3v1 = has_id3v1(data);
        let data = if id3v1 {
            &data[..data.len() - ID3V1_LEN]
        } else {
            data
        };

        let mut cursor = StreamCursor::from_slice(data);
        cursor.set_fail_level(options.fail_level);

        let id3v2_len = Self::leading_tag_len(data, options)?;
        cursor.skip_bytes(id3v2_len);

        let header = Self::find_first_frame(&mut cursor)?;
        let first_frame = cursor.frame_offset();

        let metadata = match TagParser::new(options.fail_level).parse(cursor.frame_bytes(), &header)
        {
            Ok(metadata) => {
                info!("Found {} tag in the first frame", metadata.name());
                Some(metadata)
            }
            Err(TagError::NotFound) => None,
            Err(e) => {
                log_or_err!(options, Warn, TrackError::Tag(e));
                None
            }
        };

        let audio_start = if metadata.is_some() {
            cursor.next_offset()
        } else {
            first_frame
        };
        let audio_bytes = data.len() as u64 - audio_start;
        let samples_per_frame = header.samples_per_frame();

        let declared_frames = metadata
            .as_ref()
            .and_then(|metadata| metadata.frames())
            .map(u64::from);

        let (bitrate_mode, frame_count, duration) = match (&metadata, declared_frames) {
            (Some(metadata), Some(frames)) => {
                let mode = if metadata.is_vbr() {
                    BitrateMode::Variable
                } else {
                    BitrateMode::Constant
                };
                let duration = MediaTime::from_samples(
                    frames * samples_per_frame as u64,
                    header.sample_rate,
                );
                (mode, frames, duration)
            }
            _ => {
                let sample = Self::sample_frames(&mut cursor, &header, metadata.is_none(), options);
                if sample.frames == 0 || sample.bytes == 0 {
                    return Err(TrackError::NoAudio);
                }

                let frames =
                    (sample.frames as u128 * audio_bytes as u128 / sample.bytes as u128) as u64;

                if sample.constant && sample.bitrate != 0 {
                    let duration = MediaTime::from_samples(audio_bytes * 8, sample.bitrate);
                    (BitrateMode::Constant, frames, duration)
                } else {
                    let duration = MediaTime::from_samples(
                        frames * samples_per_frame as u64,
                        header.sample_rate,
                    );
                    (BitrateMode::Variable, frames, duration)
                }
            }
        };

        let track = Self {
            first_frame,
            audio_start,
            audio_bytes,
            header,
            sample_rate: header.sample_rate,
            samples_per_frame,
            bitrate_mode,
            duration,
            duration_ms: duration.as_millis(),
            frame_count,
            sample_count: frame_count * samples_per_frame as u64,
            average_frame_size: if frame_count > 0 {
                audio_bytes / frame_count
            } else {
                0
            },
            metadata,
            id3v2_len,
            id3v1,
        };

        debug!(
            "Track: {} frames, {} ms, {}, audio at {}+{}",
            track.frame_count,
            track.duration_ms,
            track.bitrate_mode,
            track.audio_start,
            track.audio_bytes
        );

        Ok(track)
    }

    /// Length of a leading ID3v2 tag, or 0 when no frame follows it.
    fn leading_tag_len(data: &[u8], options: &LoadOptions) -> Result<usize, TrackError> {
        let Some(id3) = Id3v2Header::parse(data) else {
            return Ok(0);
        };

        let len = id3.tag_len();
        if len > data.len() {
            log_or_err!(
                options,
                Warn,
                TrackError::LeadingTagOverrun {
                    declared: len,
                    available: data.len(),
                }
            );
            return Ok(0);
        }

        match data.get(len..len + 2) {
            Some(&[b0, b1]) if is_sync(b0, b1) => {
                debug!("Skipping {len} bytes of ID3v2.{} tag", id3.major);
                Ok(len)
            }
            _ => {
                debug!("No frame after the {len} byte ID3v2 tag, searching from the start");
                Ok(0)
            }
        }
    }

    /// Advances to the first frame whose successor belongs to the same
    /// stream. A frame at the very end of the stream is accepted as is.
    fn find_first_frame(cursor: &mut StreamCursor) -> Result<FrameHeader, TrackError> {
        loop {
            let header = match cursor.decode_next() {
                Ok(header) => header,
                Err(StreamError::NeedMoreData) => return Err(TrackError::NoAudio),
                Err(e) => {
                    trace!("Searching for the first frame: {e}");
                    continue;
                }
            };

            let state = cursor.snapshot();
            let successor = cursor.decode_next();
            cursor.restore(state);

            match successor {
                Ok(next) if next.is_compatible(&header) => return Ok(header),
                Err(StreamError::NeedMoreData) => return Ok(header),
                _ => {
                    debug!(
                        "Frame at {} is not followed by a matching frame",
                        cursor.frame_offset()
                    );
                    cursor.reject_frame();
                }
            }
        }
    }

    fn sample_frames(
        cursor: &mut StreamCursor,
        first: &FrameHeader,
        include_first: bool,
        options: &LoadOptions,
    ) -> FrameSample {
        let mut sample = FrameSample::default();
        if include_first {
            sample.record(first);
        }

        while sample.frames < options.sample_frames as u64 {
            match cursor.decode_next() {
                Ok(header) if header.is_compatible(first) => sample.record(&header),
                Ok(_) => {}
                Err(StreamError::NeedMoreData) => break,
                Err(e) => trace!("Sampling frames: {e}"),
            }
        }

        sample
    }

    pub fn toc(&self) -> Option<&Toc> {
        self.metadata.as_ref().and_then(|metadata| metadata.toc())
    }

    /// Absolute byte offset to start decoding at for playback from `ms`.
    ///
    /// Uses the seek table when there is one and a linear estimate
    /// otherwise. Times past the end map to the end of the audio.
    pub fn position_for(&self, ms: u64) -> u64 {
        if self.duration_ms == 0 {
            return self.audio_start;
        }

        let ms = ms.min(self.duration_ms);
        let offset = match self.toc() {
            Some(toc) => toc.byte_offset(
                ms as f64 * 100.0 / self.duration_ms as f64,
                self.audio_bytes,
            ),
            None => (self.audio_bytes as u128 * ms as u128 / self.duration_ms as u128) as u64,
        };

        self.audio_start + offset
    }

    /// Playback time in ms at absolute byte `offset`. Inverse of
    /// [`position_for`](Self::position_for).
    pub fn time_for(&self, offset: u64) -> u64 {
        if self.audio_bytes == 0 {
            return 0;
        }

        let offset = offset.saturating_sub(self.audio_start).min(self.audio_bytes);
        let ms = match self.toc() {
            Some(toc) => {
                (toc.percent_at(offset, self.audio_bytes) * self.duration_ms as f64 / 100.0) as u64
            }
            None => (offset as u128 * self.duration_ms as u128 / self.audio_bytes as u128) as u64,
        };

        ms.min(self.duration_ms)
    }

    /// Sample count without the encoder delay and padding recorded by LAME.
    pub fn playable_sample_count(&self) -> u64 {
        match self.metadata.as_ref().and_then(|metadata| metadata.gapless()) {
            Some((delay, padding)) => self
                .sample_count
                .saturating_sub(delay as u64 + padding as u64),
            None => self.sample_count,
        }
    }

    /// Average bitrate over the whole audio in bits/s.
    pub fn average_bitrate(&self) -> u32 {
        if self.duration_ms == 0 {
            return 0;
        }

        (self.audio_bytes as u128 * 8000 / self.duration_ms as u128) as u32
    }

    pub fn encoder(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.encoder.as_deref())
    }
}
