//! MPEG audio frame header.
//!
//! ## Layout
//!
//! A frame starts with a 32-bit header, optionally followed by a 16-bit CRC
//! word when the protection bit is cleared:
//!
//! | Bits | Field                                       |
//! |------|---------------------------------------------|
//! | 11   | Sync word (all ones)                        |
//! | 1    | MPEG-2.5 flag (0 = MPEG-2.5)                |
//! | 1    | ID (0 = lower sampling frequencies)         |
//! | 2    | Layer (`4 - value`, 0 reserved)             |
//! | 1    | Protection (0 = CRC word follows)           |
//! | 4    | Bitrate index (15 reserved)                 |
//! | 2    | Sampling frequency index (3 reserved)       |
//! | 1    | Padding                                     |
//! | 1    | Private                                     |
//! | 2    | Channel mode                                |
//! | 2    | Mode extension                              |
//! | 1    | Copyright                                   |
//! | 1    | Original                                    |
//! | 2    | Emphasis                                    |
//!
//! Bitrate index 0 denotes free format: the bitrate is not coded and has to
//! be measured from the distance to the next frame
//! (see [`FreeBitrateProbe`](crate::process::probe::FreeBitrateProbe)).

use std::fmt::{Display, Formatter};

use crate::utils::bitstream_io::BitReader;
use crate::utils::crc::{CRC_FRAME_HEADER_ALG, Crc16};
use crate::utils::errors::HeaderError;
use crate::utils::timing::MediaTime;

/// 11-bit frame sync word.
pub const SYNC_WORD: u16 = 0x7FF;

/// Length of the fixed header in bytes.
pub const HEADER_LEN: usize = 4;

/// Length of the optional CRC word in bytes.
pub const CRC_LEN: usize = 2;

pub(crate) static FRAME_CRC: Crc16 = Crc16::new(&CRC_FRAME_HEADER_ALG);

/// Bitrates in kb/s. Rows: MPEG-1 Layer I, II, III, then LSF Layer I and
/// LSF Layers II/III.
const BITRATE_TABLE: [[u16; 15]; 5] = [
    [
        0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
    ],
    [
        0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384,
    ],
    [
        0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
    ],
    [
        0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256,
    ],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];

const SAMPLE_RATE_TABLE: [u32; 3] = [44100, 48000, 32000];

/// `true` when two bytes form a frame sync word: `0xFF` followed by a byte
/// with its three high bits set.
#[inline(always)]
pub const fn is_sync(b0: u8, b1: u8) -> bool {
    b0 == 0xFF && b1 & 0xE0 == 0xE0
}

/// Index of the first sync word at or after `from`.
pub fn find_sync(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| is_sync(w[0], w[1]))
        .map(|i| i + from)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

impl MpegVersion {
    /// Lower sampling frequency extension (MPEG-2 and MPEG-2.5).
    pub fn is_lsf(self) -> bool {
        self != MpegVersion::Mpeg1
    }

    fn bits(self) -> u32 {
        match self {
            MpegVersion::Mpeg1 => 0b11,
            MpegVersion::Mpeg2 => 0b10,
            MpegVersion::Mpeg25 => 0b00,
        }
    }
}

impl Display for MpegVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MpegVersion::Mpeg1 => write!(f, "MPEG-1"),
            MpegVersion::Mpeg2 => write!(f, "MPEG-2"),
            MpegVersion::Mpeg25 => write!(f, "MPEG-2.5"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    I = 1,
    II = 2,
    III = 3,
}

impl Layer {
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::I => write!(f, "Layer I"),
            Layer::II => write!(f, "Layer II"),
            Layer::III => write!(f, "Layer III"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

impl ChannelMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        }
    }

    fn bits(self) -> u32 {
        match self {
            ChannelMode::Stereo => 0,
            ChannelMode::JointStereo => 1,
            ChannelMode::DualChannel => 2,
            ChannelMode::Mono => 3,
        }
    }
}

impl Display for ChannelMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelMode::Stereo => write!(f, "Stereo"),
            ChannelMode::JointStereo => write!(f, "Joint stereo"),
            ChannelMode::DualChannel => write!(f, "Dual channel"),
            ChannelMode::Mono => write!(f, "Mono"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emphasis {
    None,
    FiftyFifteen,
    Reserved,
    CcittJ17,
}

impl Emphasis {
    fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Emphasis::None,
            1 => Emphasis::FiftyFifteen,
            2 => Emphasis::Reserved,
            _ => Emphasis::CcittJ17,
        }
    }

    fn bits(self) -> u32 {
        match self {
            Emphasis::None => 0,
            Emphasis::FiftyFifteen => 1,
            Emphasis::Reserved => 2,
            Emphasis::CcittJ17 => 3,
        }
    }
}

/// Decoded frame header.
///
/// `bitrate` is in bits per second and is 0 for a free format frame whose
/// rate has not been resolved yet. Frame size and duration are derived on
/// demand from the coded fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    pub bitrate_index: u8,
    pub bitrate: u32,
    pub sample_rate_index: u8,
    pub sample_rate: u32,
    pub padding: bool,
    pub private_bit: bool,
    pub channel_mode: ChannelMode,
    pub mode_extension: u8,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: Emphasis,
    pub protected: bool,
    /// CRC-16 over header bytes 2 and 3, seeded with 0xFFFF. Zero when
    /// the frame is unprotected.
    pub crc_check: u16,
    /// CRC word transmitted after the header.
    pub crc_target: u16,
}

impl FrameHeader {
    /// Builds an unprotected stereo header from coded indices.
    pub fn new(
        version: MpegVersion,
        layer: Layer,
        bitrate_index: u8,
        sample_rate_index: u8,
    ) -> Result<Self, HeaderError> {
        if bitrate_index >= 15 {
            return Err(HeaderError::BadBitrate);
        }
        if sample_rate_index >= 3 {
            return Err(HeaderError::BadSampleRate);
        }

        Ok(Self {
            version,
            layer,
            bitrate_index,
            bitrate: bitrate_for(version, layer, bitrate_index),
            sample_rate_index,
            sample_rate: sample_rate_for(version, sample_rate_index),
            padding: false,
            private_bit: false,
            channel_mode: ChannelMode::Stereo,
            mode_extension: 0,
            copyright: false,
            original: false,
            emphasis: Emphasis::None,
            protected: false,
            crc_check: 0,
            crc_target: 0,
        })
    }

    /// Decodes a header at the reader position, consuming the header and
    /// the CRC word if present.
    pub fn read(reader: &mut BitReader) -> Result<Self, HeaderError> {
        if reader.read::<u16>(11)? != SYNC_WORD {
            return Err(HeaderError::LostSync);
        }

        let mpeg25 = !reader.read_bit()?;
        let lsf = !reader.read_bit()?;
        let version = match (mpeg25, lsf) {
            (false, false) => MpegVersion::Mpeg1,
            (false, true) => MpegVersion::Mpeg2,
            (true, true) => MpegVersion::Mpeg25,
            (true, false) => return Err(HeaderError::BadLayer),
        };

        let layer = match reader.read::<u8>(2)? {
            3 => Layer::I,
            2 => Layer::II,
            1 => Layer::III,
            _ => return Err(HeaderError::BadLayer),
        };

        let protected = !reader.read_bit()?;
        let crc_check = if protected {
            reader.crc16(&FRAME_CRC, FRAME_CRC.init, 16)?
        } else {
            0
        };

        let bitrate_index: u8 = reader.read(4)?;
        if bitrate_index == 15 {
            return Err(HeaderError::BadBitrate);
        }

        let sample_rate_index: u8 = reader.read(2)?;
        if sample_rate_index == 3 {
            return Err(HeaderError::BadSampleRate);
        }

        let padding = reader.read_bit()?;
        let private_bit = reader.read_bit()?;
        let channel_mode = ChannelMode::from_bits(reader.read(2)?);
        let mode_extension = reader.read(2)?;
        let copyright = reader.read_bit()?;
        let original = reader.read_bit()?;
        let emphasis = Emphasis::from_bits(reader.read(2)?);

        let crc_target = if protected { reader.read(16)? } else { 0 };

        Ok(Self {
            version,
            layer,
            bitrate_index,
            bitrate: bitrate_for(version, layer, bitrate_index),
            sample_rate_index,
            sample_rate: sample_rate_for(version, sample_rate_index),
            padding,
            private_bit,
            channel_mode,
            mode_extension,
            copyright,
            original,
            emphasis,
            protected,
            crc_check,
            crc_target,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        Self::read(&mut BitReader::from_slice(bytes))
    }

    /// Serializes the 32-bit header. The CRC word is not included.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let word = (SYNC_WORD as u32) << 21
            | self.version.bits() << 19
            | (4 - self.layer.number() as u32) << 17
            | (!self.protected as u32) << 16
            | (self.bitrate_index as u32 & 0xF) << 12
            | (self.sample_rate_index as u32 & 3) << 10
            | (self.padding as u32) << 9
            | (self.private_bit as u32) << 8
            | self.channel_mode.bits() << 6
            | (self.mode_extension as u32 & 3) << 4
            | (self.copyright as u32) << 3
            | (self.original as u32) << 2
            | self.emphasis.bits();

        word.to_be_bytes()
    }

    /// Returns a copy carrying a measured free format bitrate.
    pub fn with_bitrate(self, bitrate: u32) -> Self {
        Self { bitrate, ..self }
    }

    pub fn is_free_format(&self) -> bool {
        self.bitrate_index == 0
    }

    pub fn is_lsf(&self) -> bool {
        self.version.is_lsf()
    }

    pub fn channel_count(&self) -> u8 {
        if self.channel_mode == ChannelMode::Mono {
            1
        } else {
            2
        }
    }

    pub fn samples_per_frame(&self) -> u32 {
        match self.layer {
            Layer::I => 384,
            Layer::III if self.is_lsf() => 576,
            _ => 1152,
        }
    }

    /// Slot multiplier of the Layer II/III frame size formula.
    pub fn slots_per_frame(&self) -> u32 {
        if self.layer == Layer::III && self.is_lsf() {
            72
        } else {
            144
        }
    }

    /// Frame length in bytes, header included. Zero while a free format
    /// bitrate is unresolved.
    pub fn frame_size(&self) -> usize {
        if self.bitrate == 0 || self.sample_rate == 0 {
            return 0;
        }

        let bitrate = self.bitrate as u64;
        let sample_rate = self.sample_rate as u64;
        let padding = self.padding as u64;

        let size = match self.layer {
            Layer::I => (12 * bitrate / sample_rate + padding) * 4,
            _ => self.slots_per_frame() as u64 * bitrate / sample_rate + padding,
        };

        size as usize
    }

    pub fn duration(&self) -> MediaTime {
        MediaTime::from_samples(self.samples_per_frame() as u64, self.sample_rate)
    }

    /// Header length in bytes including the CRC word.
    pub fn header_len(&self) -> usize {
        if self.protected {
            HEADER_LEN + CRC_LEN
        } else {
            HEADER_LEN
        }
    }

    /// Layer III side information length in bytes.
    pub fn side_info_len(&self) -> Option<usize> {
        if self.layer != Layer::III {
            return None;
        }

        let mono = self.channel_mode == ChannelMode::Mono;
        Some(match (self.is_lsf(), mono) {
            (false, true) => 17,
            (false, false) => 32,
            (true, true) => 9,
            (true, false) => 17,
        })
    }

    /// Offset of the first byte after the side information.
    pub fn ancillary_offset(&self) -> Option<usize> {
        self.side_info_len().map(|len| self.header_len() + len)
    }

    /// Checks the CRC word of a protected Layer III frame.
    ///
    /// `frame` starts at the sync word. Returns `None` when the frame is
    /// unprotected, is not Layer III, or is too short to hold the side
    /// information.
    pub fn verify_crc(&self, frame: &[u8]) -> Option<bool> {
        if !self.protected {
            return None;
        }

        let side_info = frame.get(HEADER_LEN + CRC_LEN..self.ancillary_offset()?)?;
        Some(FRAME_CRC.update(self.crc_check, side_info) == self.crc_target)
    }

    /// `true` when both headers describe the same elementary stream.
    pub fn is_compatible(&self, other: &FrameHeader) -> bool {
        self.layer == other.layer && self.sample_rate == other.sample_rate
    }
}

impl Display for FrameHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}, ", self.version, self.layer)?;
        if self.bitrate == 0 {
            write!(f, "free format")?;
        } else {
            write!(f, "{} kb/s", self.bitrate / 1000)?;
        }
        write!(f, ", {} Hz, {}", self.sample_rate, self.channel_mode)
    }
}

fn bitrate_for(version: MpegVersion, layer: Layer, index: u8) -> u32 {
    let row = if version.is_lsf() {
        3 + (layer.number() as usize >> 1)
    } else {
        layer.number() as usize - 1
    };

    BITRATE_TABLE[row][index as usize] as u32 * 1000
}

fn sample_rate_for(version: MpegVersion, index: u8) -> u32 {
    let rate = SAMPLE_RATE_TABLE[index as usize];
    match version {
        MpegVersion::Mpeg1 => rate,
        MpegVersion::Mpeg2 => rate >> 1,
        MpegVersion::Mpeg25 => rate >> 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_every_legal_header() -> Result<(), HeaderError> {
        for version_bits in [0b00u32, 0b10, 0b11] {
            for layer_bits in 1u32..=3 {
                for protection in 0u32..=1 {
                    for bitrate_index in 0u32..15 {
                        for sample_rate_index in 0u32..3 {
                            for low in 0u32..512 {
                                let word = (0x7FF << 21)
                                    | version_bits << 19
                                    | layer_bits << 17
                                    | protection << 16
                                    | bitrate_index << 12
                                    | sample_rate_index << 10
                                    | low;
                                let mut bytes = word.to_be_bytes().to_vec();
                                bytes.extend([0xAB, 0xCD]);

                                let header = FrameHeader::from_bytes(&bytes)?;
                                assert_eq!(header.to_bytes(), word.to_be_bytes());
                                assert_eq!(header.protected, protection == 0);
                                assert_eq!(header.layer.number() as u32, 4 - layer_bits);
                                assert_eq!(header.is_free_format(), bitrate_index == 0);
                                if header.protected {
                                    assert_eq!(header.crc_target, 0xABCD);
                                    assert_eq!(
                                        header.crc_check,
                                        FRAME_CRC.checksum(&bytes[2..4])
                                    );
                                }
                                if bitrate_index != 0 {
                                    assert!(header.frame_size() > header.header_len());
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn computed_fields() -> Result<(), HeaderError> {
        // MPEG-1 Layer III, 128 kb/s, 44.1 kHz
        let mut header = FrameHeader::from_bytes(&[0xFF, 0xFB, 0x90, 0x64])?;
        assert_eq!(header.version, MpegVersion::Mpeg1);
        assert_eq!(header.layer, Layer::III);
        assert_eq!(header.bitrate, 128_000);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.channel_mode, ChannelMode::JointStereo);
        assert_eq!(header.frame_size(), 417);
        assert_eq!(header.samples_per_frame(), 1152);
        assert_eq!(header.side_info_len(), Some(32));
        header.padding = true;
        assert_eq!(header.frame_size(), 418);

        // MPEG-2 Layer III, 64 kb/s, 22.05 kHz, mono
        let header = FrameHeader::from_bytes(&[0xFF, 0xF3, 0x80, 0xC0])?;
        assert_eq!(header.version, MpegVersion::Mpeg2);
        assert_eq!(header.bitrate, 64_000);
        assert_eq!(header.sample_rate, 22050);
        assert_eq!(header.channel_count(), 1);
        assert_eq!(header.frame_size(), 208);
        assert_eq!(header.samples_per_frame(), 576);
        assert_eq!(header.side_info_len(), Some(9));
        assert_eq!(header.duration().as_millis(), 26);

        // MPEG-2.5 Layer III, 8 kb/s, 8 kHz
        let header = FrameHeader::from_bytes(&[0xFF, 0xE3, 0x18, 0xC0])?;
        assert_eq!(header.version, MpegVersion::Mpeg25);
        assert_eq!(header.sample_rate, 8000);
        assert_eq!(header.bitrate, 8000);
        assert_eq!(header.frame_size(), 72);

        // MPEG-1 Layer I, 32 kb/s, 48 kHz
        let header = FrameHeader::from_bytes(&[0xFF, 0xFF, 0x14, 0x00])?;
        assert_eq!(header.layer, Layer::I);
        assert_eq!(header.frame_size(), 32);
        assert_eq!(header.samples_per_frame(), 384);
        assert_eq!(header.side_info_len(), None);

        // MPEG-1 Layer II, 192 kb/s, 48 kHz
        let header = FrameHeader::from_bytes(&[0xFF, 0xFD, 0xA4, 0x00])?;
        assert_eq!(header.layer, Layer::II);
        assert_eq!(header.bitrate, 192_000);
        assert_eq!(header.frame_size(), 576);
        Ok(())
    }

    #[test]
    fn reserved_values_fail_with_their_kind() {
        let cases: [(&[u8], HeaderError); 7] = [
            (&[0xFF, 0x7B, 0x90, 0x64], HeaderError::LostSync),
            (&[0xFE, 0xFB, 0x90, 0x64], HeaderError::LostSync),
            (&[0xFF, 0xEB, 0x90, 0x64], HeaderError::BadLayer),
            (&[0xFF, 0xF9, 0x90, 0x64], HeaderError::BadLayer),
            (&[0xFF, 0xFB, 0xF0, 0x64], HeaderError::BadBitrate),
            (&[0xFF, 0xFB, 0x9C, 0x64], HeaderError::BadSampleRate),
            (&[0xFF, 0xFB, 0x90], HeaderError::Truncated),
        ];

        for (bytes, expected) in cases {
            assert_eq!(FrameHeader::from_bytes(bytes), Err(expected), "{bytes:02X?}");
        }

        // protected header without its CRC word
        assert_eq!(
            FrameHeader::from_bytes(&[0xFF, 0xFA, 0x90, 0x64, 0x00]),
            Err(HeaderError::Truncated)
        );
    }

    #[test]
    fn layer3_crc() -> Result<(), HeaderError> {
        let mut header = FrameHeader::new(MpegVersion::Mpeg1, Layer::III, 9, 0)?;
        header.protected = true;
        header.channel_mode = ChannelMode::Mono;

        let bytes = header.to_bytes();
        let side_info: Vec<u8> = (0..17u8).map(|i| i.wrapping_mul(29)).collect();
        let crc = FRAME_CRC.update(FRAME_CRC.checksum(&bytes[2..4]), &side_info);

        let mut frame = bytes.to_vec();
        frame.extend(crc.to_be_bytes());
        frame.extend(&side_info);

        let decoded = FrameHeader::from_bytes(&frame)?;
        assert_eq!(decoded.ancillary_offset(), Some(23));
        assert_eq!(decoded.verify_crc(&frame), Some(true));

        frame[10] ^= 0x40;
        assert_eq!(decoded.verify_crc(&frame), Some(false));
        assert_eq!(decoded.verify_crc(&frame[..12]), None);
        Ok(())
    }
}
