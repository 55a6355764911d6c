//! LAME extension of the Xing / Info tag.
//!
//! A 36-byte block following the Xing fields. It records the encoder
//! version, the encoding settings, ReplayGain values and the encoder
//! delay and padding needed for gapless playback. The last two bytes are a
//! CRC-16/ARC over every byte of the frame before them.

use std::fmt::{Display, Formatter};

use crate::utils::bitstream_io::BitReader;
use crate::utils::crc::{CRC_LAME_TAG_ALG, Crc16};
use crate::utils::errors::TagError;

pub const LAME_MAGIC: u32 = u32::from_be_bytes(*b"LAME");

/// Size of the LAME block, tag CRC included.
pub const LAME_TAG_LEN: usize = 36;

/// Offset of the tag CRC inside the LAME block.
pub const LAME_CRC_OFFSET: usize = 34;

/// Length of the encoder version string at the start of the block.
pub const LAME_VERSION_LEN: usize = 9;

static LAME_CRC: Crc16 = Crc16::new(&CRC_LAME_TAG_ALG);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VbrMethod {
    Unknown,
    Cbr,
    Abr,
    VbrOld,
    VbrMtrh,
    VbrMt,
    Cbr2Pass,
    Abr2Pass,
    Reserved(u8),
}

impl VbrMethod {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => VbrMethod::Unknown,
            1 => VbrMethod::Cbr,
            2 => VbrMethod::Abr,
            3 => VbrMethod::VbrOld,
            4 => VbrMethod::VbrMtrh,
            5 => VbrMethod::VbrMt,
            8 => VbrMethod::Cbr2Pass,
            9 => VbrMethod::Abr2Pass,
            n => VbrMethod::Reserved(n),
        }
    }

    pub fn is_constant(self) -> bool {
        matches!(self, VbrMethod::Cbr | VbrMethod::Cbr2Pass)
    }
}

impl Display for VbrMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VbrMethod::Unknown => write!(f, "unknown"),
            VbrMethod::Cbr => write!(f, "CBR"),
            VbrMethod::Abr => write!(f, "ABR"),
            VbrMethod::VbrOld => write!(f, "VBR (old)"),
            VbrMethod::VbrMtrh => write!(f, "VBR (mtrh)"),
            VbrMethod::VbrMt => write!(f, "VBR (mt)"),
            VbrMethod::Cbr2Pass => write!(f, "CBR (2 pass)"),
            VbrMethod::Abr2Pass => write!(f, "ABR (2 pass)"),
            VbrMethod::Reserved(n) => write!(f, "reserved ({n})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainName {
    Radio,
    Audiophile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainOriginator {
    Unspecified,
    Artist,
    User,
    Automatic,
    Reserved(u8),
}

/// One ReplayGain record: 3 bits name, 3 bits originator, sign bit and a
/// 9-bit magnitude in 0.1 dB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayGain {
    pub name: GainName,
    pub originator: GainOriginator,
    /// Adjustment in tenths of a dB.
    pub adjustment: i16,
}

impl ReplayGain {
    /// Returns `None` for an unset record.
    fn read(reader: &mut BitReader) -> Result<Option<Self>, TagError> {
        let truncated = TagError::truncated("LAME");
        let name: u8 = reader.read(3).map_err(&truncated)?;
        let originator: u8 = reader.read(3).map_err(&truncated)?;
        let negative = reader.read_bit().map_err(&truncated)?;
        let magnitude: u16 = reader.read(9).map_err(&truncated)?;

        let name = match name {
            1 => GainName::Radio,
            2 => GainName::Audiophile,
            _ => return Ok(None),
        };

        let originator = match originator {
            0 => GainOriginator::Unspecified,
            1 => GainOriginator::Artist,
            2 => GainOriginator::User,
            3 => GainOriginator::Automatic,
            n => GainOriginator::Reserved(n),
        };

        let magnitude = magnitude as i16;
        Ok(Some(Self {
            name,
            originator,
            adjustment: if negative { -magnitude } else { magnitude },
        }))
    }

    pub fn db(&self) -> f32 {
        self.adjustment as f32 / 10.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LameTag {
    /// Encoder version string, e.g. `LAME3.100`.
    pub encoder: String,
    pub revision: u8,
    pub vbr_method: VbrMethod,
    /// Lowpass filter frequency in Hz.
    pub lowpass: u32,
    /// Peak signal amplitude as a fixed-point value with 23 fractional bits.
    pub peak: u32,
    pub radio_gain: Option<ReplayGain>,
    pub audiophile_gain: Option<ReplayGain>,
    pub flags: u8,
    pub ath_type: u8,
    /// Target (ABR) or minimal (VBR) bitrate in kb/s, 255 meaning 255 or more.
    pub bitrate: u8,
    /// Encoder delay in samples.
    pub start_delay: u16,
    /// Samples of padding appended to the last frame.
    pub end_padding: u16,
    pub source_sample_rate: u8,
    pub unwise_settings: bool,
    pub stereo_mode: u8,
    pub noise_shaping: u8,
    /// MP3Gain adjustment in 1.5 dB steps.
    pub gain: i8,
    pub surround: u8,
    pub preset: u16,
    pub music_length: u32,
    pub music_crc: u16,
    pub tag_crc: u16,
}

impl LameTag {
    /// Parses the LAME block at `start` and validates its CRC against the
    /// frame bytes preceding the CRC field.
    pub fn parse(frame: &[u8], start: usize) -> Result<Self, TagError> {
        let block = frame
            .get(start..start + LAME_TAG_LEN)
            .ok_or(TagError::malformed("LAME", "truncated"))?;

        let mut reader = BitReader::from_slice(block);
        let tag = Self::read(&mut reader)?;

        let calculated = LAME_CRC.checksum(&frame[..start + LAME_CRC_OFFSET]);
        if calculated != tag.tag_crc {
            return Err(TagError::BadCrc {
                calculated,
                read: tag.tag_crc,
            });
        }

        Ok(tag)
    }

    fn read(reader: &mut BitReader) -> Result<Self, TagError> {
        let truncated = TagError::truncated("LAME");

        let mut version = [0u8; LAME_VERSION_LEN];
        for byte in version.iter_mut() {
            *byte = reader.read(8).map_err(&truncated)?;
        }
        if u32::from_be_bytes([version[0], version[1], version[2], version[3]]) != LAME_MAGIC {
            return Err(TagError::malformed("LAME", "missing magic"));
        }

        let revision: u8 = reader.read(4).map_err(&truncated)?;
        if revision == 15 {
            return Err(TagError::malformed("LAME", "unsupported revision"));
        }
        let vbr_method = VbrMethod::from_bits(reader.read(4).map_err(&truncated)?);
        let lowpass = reader.read::<u32>(8).map_err(&truncated)? * 100;
        let peak = reader.read(32).map_err(&truncated)?;

        let mut radio_gain = None;
        let mut audiophile_gain = None;
        for _ in 0..2 {
            match ReplayGain::read(reader)? {
                Some(gain) if gain.name == GainName::Radio => radio_gain = Some(gain),
                Some(gain) => audiophile_gain = Some(gain),
                None => {}
            }
        }

        let flags = reader.read(4).map_err(&truncated)?;
        let ath_type = reader.read(4).map_err(&truncated)?;
        let bitrate = reader.read(8).map_err(&truncated)?;
        let start_delay = reader.read(12).map_err(&truncated)?;
        let end_padding = reader.read(12).map_err(&truncated)?;
        let source_sample_rate = reader.read(2).map_err(&truncated)?;
        let unwise_settings = reader.read_bit().map_err(&truncated)?;
        let stereo_mode = reader.read(3).map_err(&truncated)?;
        let noise_shaping = reader.read(2).map_err(&truncated)?;
        let gain = reader.read::<u8>(8).map_err(&truncated)? as i8;
        reader.skip(2).map_err(&truncated)?;
        let surround = reader.read(3).map_err(&truncated)?;
        let preset = reader.read(11).map_err(&truncated)?;
        let music_length = reader.read(32).map_err(&truncated)?;
        let music_crc = reader.read(16).map_err(&truncated)?;
        let tag_crc = reader.read(16).map_err(&truncated)?;

        Ok(Self {
            encoder: String::from_utf8_lossy(&version).into_owned(),
            revision,
            vbr_method,
            lowpass,
            peak,
            radio_gain,
            audiophile_gain,
            flags,
            ath_type,
            bitrate,
            start_delay,
            end_padding,
            source_sample_rate,
            unwise_settings,
            stereo_mode,
            noise_shaping,
            gain,
            surround,
            preset,
            music_length,
            music_crc,
            tag_crc,
        })
    }

    /// Peak amplitude relative to full scale, `None` when not recorded.
    pub fn peak_amplitude(&self) -> Option<f32> {
        (self.peak != 0).then(|| self.peak as f32 / (1u32 << 23) as f32)
    }

    pub fn source_sample_rate_name(&self) -> &'static str {
        match self.source_sample_rate {
            0 => "32 kHz or less",
            1 => "44.1 kHz",
            2 => "48 kHz",
            _ => "above 48 kHz",
        }
    }
}
