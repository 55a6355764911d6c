//! Xing / Info VBR header.
//!
//! Written by encoders into the ancillary data of the first frame. `Xing`
//! marks a variable bitrate stream, `Info` the same structure in a
//! constant bitrate stream. After the magic comes a flags word and the
//! fields it announces, in this order:
//!
//! | Flag   | Field   | Size      |
//! |--------|---------|-----------|
//! | 0x0001 | frames  | 32 bits   |
//! | 0x0002 | bytes   | 32 bits   |
//! | 0x0004 | TOC     | 100 bytes |
//! | 0x0008 | quality | 32 bits   |

use log::debug;

use crate::structs::seek::Toc;
use crate::utils::bitstream_io::BitReader;
use crate::utils::errors::TagError;

pub const XING_MAGIC: u32 = u32::from_be_bytes(*b"Xing");
pub const INFO_MAGIC: u32 = u32::from_be_bytes(*b"Info");

pub const FLAG_FRAMES: u32 = 0x0001;
pub const FLAG_BYTES: u32 = 0x0002;
pub const FLAG_TOC: u32 = 0x0004;
pub const FLAG_QUALITY: u32 = 0x0008;

/// Size of a Xing tag with every field present, magic included.
pub const XING_TAG_LEN: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XingTag {
    pub flags: u32,
    pub frames: Option<u32>,
    pub bytes: Option<u32>,
    pub toc: Option<Toc>,
    /// Encoder quality indicator, 0 (best) to 100 (worst).
    pub quality: Option<u32>,
}

impl XingTag {
    /// Reads the fields following the magic.
    pub fn read(reader: &mut BitReader) -> Result<Self, TagError> {
        let truncated = TagError::truncated("Xing");
        let flags: u32 = reader.read(32).map_err(&truncated)?;

        let frames = if flags & FLAG_FRAMES != 0 {
            Some(reader.read(32).map_err(&truncated)?)
        } else {
            None
        };

        let bytes = if flags & FLAG_BYTES != 0 {
            Some(reader.read(32).map_err(&truncated)?)
        } else {
            None
        };

        let toc = if flags & FLAG_TOC != 0 {
            let mut entries = [0u8; 100];
            for entry in entries.iter_mut() {
                *entry = reader.read(8).map_err(&truncated)?;
            }
            let toc = Toc::new(entries);
            if !toc.is_monotonic() {
                debug!("Xing TOC decreases, interpolating over its running maximum");
            }
            Some(toc)
        } else {
            None
        };

        let quality = if flags & FLAG_QUALITY != 0 {
            Some(reader.read(32).map_err(&truncated)?)
        } else {
            None
        };

        Ok(Self {
            flags,
            frames,
            bytes,
            toc,
            quality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::synth::{XingSpec, linear_toc};

    #[test]
    fn reads_all_fields() {
        let body = XingSpec::vbr(1000, 400_000).encode();
        let mut reader = BitReader::at(&body, 4).unwrap();
        let tag = XingTag::read(&mut reader).unwrap();

        assert_eq!(tag.flags, 0x0F);
        assert_eq!(tag.frames, Some(1000));
        assert_eq!(tag.bytes, Some(400_000));
        assert_eq!(tag.toc, Some(Toc::new(linear_toc())));
        assert_eq!(tag.quality, Some(78));
        assert_eq!(reader.byte_position().unwrap(), XING_TAG_LEN);
    }

    #[test]
    fn reads_only_flagged_fields() {
        let spec = XingSpec {
            magic: *b"Info",
            frames: Some(77),
            bytes: None,
            toc: None,
            quality: Some(50),
        };
        let body = spec.encode();
        let mut reader = BitReader::at(&body, 4).unwrap();
        let tag = XingTag::read(&mut reader).unwrap();

        assert_eq!(tag.flags, FLAG_FRAMES | FLAG_QUALITY);
        assert_eq!(tag.frames, Some(77));
        assert_eq!(tag.bytes, None);
        assert_eq!(tag.toc, None);
        assert_eq!(tag.quality, Some(50));
    }

    #[test]
    fn truncated_toc_is_malformed() {
        let body = XingSpec::vbr(10, 10).encode();
        let mut reader = BitReader::at(&body[..60], 4).unwrap();
        assert_eq!(
            XingTag::read(&mut reader),
            Err(TagError::malformed("Xing", "truncated"))
        );
    }
}
