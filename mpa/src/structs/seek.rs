//! Seek metadata carried by the first frame of a stream.
//!
//! Layer III encoders store a Xing, Info or bare LAME tag in the ancillary
//! data of the first frame, right after the side information. Fraunhofer
//! encoders store a VBRI tag at a fixed offset instead. Whichever tag is
//! found, the frame itself holds no audio.

use log::Level::Warn;
use log::debug;

use crate::log_or_err;
use crate::structs::header::FrameHeader;
use crate::structs::lame::{LAME_MAGIC, LAME_VERSION_LEN, LameTag};
use crate::structs::vbri::VbriTag;
use crate::structs::xing::{INFO_MAGIC, XING_MAGIC, XING_TAG_LEN, XingTag};
use crate::utils::bitstream_io::BitReader;
use crate::utils::errors::TagError;

/// Longest encoder string kept.
pub const ENCODER_MAX_LEN: usize = 20;

/// 100-entry seek table. Entry `i` is the byte position reached at `i`%
/// of the duration, scaled to 0..=255 of the audio length.
///
/// Tables are kept as written. Interpolation runs over the running maximum
/// of the entries, so a decreasing entry never moves a position backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toc {
    entries: [u8; 100],
    levels: [u8; 100],
}

impl Toc {
    pub fn new(entries: [u8; 100]) -> Self {
        let mut levels = entries;
        for i in 1..levels.len() {
            levels[i] = levels[i].max(levels[i - 1]);
        }

        Self { entries, levels }
    }

    pub fn entries(&self) -> &[u8; 100] {
        &self.entries
    }

    /// `true` when no entry is lower than the one before it.
    pub fn is_monotonic(&self) -> bool {
        self.entries == self.levels
    }

    fn bounds(&self, index: usize) -> (f64, f64) {
        let lower = self.levels[index] as f64;
        let upper = match self.levels.get(index + 1) {
            Some(&next) => next as f64,
            None => 256.0,
        };
        (lower, upper)
    }

    /// Byte offset reached at `percent` of the duration, for audio of
    /// `len` bytes.
    pub fn byte_offset(&self, percent: f64, len: u64) -> u64 {
        let percent = percent.clamp(0.0, 100.0);
        let index = (percent as usize).min(99);

        let (lower, upper) = self.bounds(index);
        let scaled = lower + (upper - lower) * (percent - index as f64);

        ((scaled / 256.0 * len as f64) as u64).min(len)
    }

    /// Inverse of [`byte_offset`](Self::byte_offset). Offsets on a flat
    /// stretch of the table map to its first percent.
    pub fn percent_at(&self, offset: u64, len: u64) -> f64 {
        if len == 0 {
            return 0.0;
        }

        let scaled = (offset.min(len) as f64 / len as f64) * 256.0;
        let index = match self.levels.iter().position(|&e| e as f64 >= scaled) {
            Some(i) if self.levels[i] as f64 == scaled => i,
            Some(i) => i.saturating_sub(1),
            None => 99,
        };

        let (lower, upper) = self.bounds(index);
        if upper <= lower {
            return index as f64;
        }

        (index as f64 + (scaled - lower) / (upper - lower)).clamp(0.0, 100.0)
    }
}

/// Which tag was found, with its tag-specific fields.
#[derive(Debug, Clone, PartialEq)]
pub enum SeekTag {
    /// Variable bitrate stream.
    Xing(XingTag),
    /// Constant bitrate stream.
    Info(XingTag),
    /// LAME block without Xing fields.
    Lame,
    Vbri(VbriTag),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeekMetadata {
    pub tag: SeekTag,
    pub encoder: Option<String>,
    pub lame: Option<LameTag>,
}

impl SeekMetadata {
    pub fn name(&self) -> &'static str {
        match self.tag {
            SeekTag::Xing(_) => "Xing",
            SeekTag::Info(_) => "Info",
            SeekTag::Lame => "LAME",
            SeekTag::Vbri(_) => "VBRI",
        }
    }

    /// Declared number of audio frames, the tag frame excluded.
    pub fn frames(&self) -> Option<u32> {
        match &self.tag {
            SeekTag::Xing(xing) | SeekTag::Info(xing) => xing.frames,
            SeekTag::Vbri(vbri) => Some(vbri.frames),
            SeekTag::Lame => None,
        }
        .filter(|&frames| frames > 0)
    }

    /// Declared stream length in bytes.
    pub fn bytes(&self) -> Option<u32> {
        match &self.tag {
            SeekTag::Xing(xing) | SeekTag::Info(xing) => xing.bytes,
            SeekTag::Vbri(vbri) => Some(vbri.bytes),
            SeekTag::Lame => None,
        }
        .filter(|&bytes| bytes > 0)
    }

    pub fn toc(&self) -> Option<&Toc> {
        match &self.tag {
            SeekTag::Xing(xing) | SeekTag::Info(xing) => xing.toc.as_ref(),
            SeekTag::Vbri(vbri) => vbri.toc.as_ref(),
            SeekTag::Lame => None,
        }
    }

    /// `true` for tags that only variable bitrate encoders write.
    pub fn is_vbr(&self) -> bool {
        match &self.tag {
            SeekTag::Xing(_) | SeekTag::Vbri(_) => true,
            SeekTag::Info(_) => false,
            SeekTag::Lame => self
                .lame
                .as_ref()
                .is_some_and(|lame| !lame.vbr_method.is_constant()),
        }
    }

    /// Encoder delay and padding in samples, when a LAME block was found.
    pub fn gapless(&self) -> Option<(u16, u16)> {
        self.lame
            .as_ref()
            .map(|lame| (lame.start_delay, lame.end_padding))
    }
}

/// Parses the seek metadata of a first frame.
#[derive(Debug, Clone)]
pub struct TagParser {
    /// A rejected LAME block is an error at or above this level instead of
    /// a warning.
    pub fail_level: log::Level,
}

impl Default for TagParser {
    fn default() -> Self {
        Self {
            fail_level: log::Level::Error,
        }
    }
}

impl TagParser {
    pub fn new(fail_level: log::Level) -> Self {
        Self { fail_level }
    }

    /// Looks for a Xing, Info or LAME tag at the ancillary position of a
    /// Layer III frame, then for a VBRI tag. `frame` starts at the sync
    /// word.
    pub fn parse(&self, frame: &[u8], header: &FrameHeader) -> Result<SeekMetadata, TagError> {
        if let Some(start) = header.ancillary_offset() {
            if let Some(metadata) = self.parse_xing(frame, start)? {
                return Ok(metadata);
            }
        }

        if VbriTag::is_present(frame) {
            return Ok(SeekMetadata {
                tag: SeekTag::Vbri(VbriTag::parse(frame)?),
                encoder: None,
                lame: None,
            });
        }

        Err(TagError::NotFound)
    }

    fn parse_xing(&self, frame: &[u8], start: usize) -> Result<Option<SeekMetadata>, TagError> {
        let Ok(mut reader) = BitReader::at(frame, start) else {
            return Ok(None);
        };
        let Ok(magic) = reader.read::<u32>(32) else {
            return Ok(None);
        };

        // Some encoders place the tag as if the CRC word were absent, two
        // bytes early.
        let (magic, start) = if start >= 2
            && (magic == XING_MAGIC << 16 || magic == INFO_MAGIC << 16)
        {
            let start = start - 2;
            reader
                .seek_to((start as u64) << 3)
                .map_err(TagError::truncated("Xing"))?;
            let magic = reader.read(32).map_err(TagError::truncated("Xing"))?;
            debug!("Xing tag found 2 bytes before the ancillary data");
            (magic, start)
        } else {
            (magic, start)
        };

        let (tag, lame_start) = match magic {
            XING_MAGIC => (SeekTag::Xing(XingTag::read(&mut reader)?), start + XING_TAG_LEN),
            INFO_MAGIC => (SeekTag::Info(XingTag::read(&mut reader)?), start + XING_TAG_LEN),
            LAME_MAGIC => (SeekTag::Lame, start),
            _ => return Ok(None),
        };

        let mut encoder = encoder_string(frame.get(lame_start..).unwrap_or_default());

        let lame = if frame.get(lame_start..lame_start + 4) == Some(b"LAME".as_slice()) {
            match LameTag::parse(frame, lame_start) {
                Ok(lame) => {
                    encoder = encoder.map(|e| e.chars().take(LAME_VERSION_LEN).collect());
                    Some(lame)
                }
                Err(e) => {
                    log_or_err!(self, Warn, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Some(SeekMetadata { tag, encoder, lame }))
    }
}

/// Leading printable ASCII of `bytes`, at most [`ENCODER_MAX_LEN`] long,
/// with `U` padding and trailing blanks removed.
fn encoder_string(bytes: &[u8]) -> Option<String> {
    let printable: String = bytes
        .iter()
        .take(ENCODER_MAX_LEN)
        .take_while(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|&b| b as char)
        .collect();

    let trimmed = printable.trim_end_matches('U').trim_end();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
