//! Fraunhofer VBRI header.
//!
//! Found 32 bytes after the frame header of the first frame regardless of
//! layer, channel mode or CRC protection. Its seek table lists the byte
//! size of successive groups of `frames_per_entry` frames, which is
//! converted into the 100-entry [`Toc`] used for every seek table.

use crate::structs::header::HEADER_LEN;
use crate::structs::seek::Toc;
use crate::utils::bitstream_io::BitReader;
use crate::utils::errors::TagError;

pub const VBRI_MAGIC: u32 = u32::from_be_bytes(*b"VBRI");

/// Offset of the magic from the frame start.
pub const VBRI_OFFSET: usize = HEADER_LEN + 32;

#[derive(Debug, Clone, PartialEq)]
pub struct VbriTag {
    pub version: u16,
    pub delay: u16,
    pub quality: u16,
    pub bytes: u32,
    pub frames: u32,
    pub scale: u16,
    pub entry_size: u16,
    pub frames_per_entry: u16,
    /// Byte size of each frame group, scale applied.
    pub entries: Vec<u32>,
    pub toc: Option<Toc>,
}

impl VbriTag {
    /// `true` when `frame` carries the VBRI magic at its fixed offset.
    pub fn is_present(frame: &[u8]) -> bool {
        frame.get(VBRI_OFFSET..VBRI_OFFSET + 4) == Some(b"VBRI".as_slice())
    }

    pub fn parse(frame: &[u8]) -> Result<Self, TagError> {
        if !Self::is_present(frame) {
            return Err(TagError::NotFound);
        }

        let truncated = TagError::truncated("VBRI");
        let mut reader = BitReader::at(frame, VBRI_OFFSET + 4).map_err(&truncated)?;

        let version = reader.read(16).map_err(&truncated)?;
        let delay = reader.read(16).map_err(&truncated)?;
        let quality = reader.read(16).map_err(&truncated)?;
        let bytes = reader.read(32).map_err(&truncated)?;
        let frames = reader.read(32).map_err(&truncated)?;
        let entry_count: u16 = reader.read(16).map_err(&truncated)?;
        let scale = reader.read(16).map_err(&truncated)?;
        let entry_size: u16 = reader.read(16).map_err(&truncated)?;
        let frames_per_entry = reader.read(16).map_err(&truncated)?;

        if !(1..=4).contains(&entry_size) {
            return Err(TagError::malformed("VBRI", "entry size out of range"));
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let entry: u32 = reader.read(entry_size as u32 * 8).map_err(&truncated)?;
            entries.push(entry.saturating_mul(scale as u32));
        }

        let mut tag = Self {
            version,
            delay,
            quality,
            bytes,
            frames,
            scale,
            entry_size,
            frames_per_entry,
            entries,
            toc: None,
        };
        tag.toc = tag.build_toc();

        Ok(tag)
    }

    /// Samples the table at every whole percent of the track duration,
    /// interpolating linearly inside a frame group.
    fn build_toc(&self) -> Option<Toc> {
        if self.entries.is_empty() || self.frames == 0 || self.frames_per_entry == 0 {
            return None;
        }

        let mut prefix = Vec::with_capacity(self.entries.len() + 1);
        let mut total = 0f64;
        prefix.push(total);
        for &entry in &self.entries {
            total += entry as f64;
            prefix.push(total);
        }
        if total <= 0.0 {
            return None;
        }

        let mut toc = [0u8; 100];
        for (percent, slot) in toc.iter_mut().enumerate() {
            let frame = self.frames as f64 * percent as f64 / 100.0;
            let group = frame / self.frames_per_entry as f64;
            let index = group.floor() as usize;

            let offset = match self.entries.get(index) {
                Some(&entry) => prefix[index] + entry as f64 * (group - index as f64),
                None => total,
            };

            *slot = (offset * 256.0 / total).min(255.0) as u8;
        }

        Some(Toc::new(toc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vbri_frame(frames: u32, frames_per_entry: u16, entries: &[u16]) -> Vec<u8> {
        let mut frame = vec![0u8; VBRI_OFFSET];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);
        frame.extend(b"VBRI");
        frame.extend(1u16.to_be_bytes());
        frame.extend(0x1234u16.to_be_bytes());
        frame.extend(75u16.to_be_bytes());
        frame.extend(entries.iter().map(|&e| e as u32 * 2).sum::<u32>().to_be_bytes());
        frame.extend(frames.to_be_bytes());
        frame.extend((entries.len() as u16).to_be_bytes());
        frame.extend(2u16.to_be_bytes());
        frame.extend(2u16.to_be_bytes());
        frame.extend(frames_per_entry.to_be_bytes());
        for entry in entries {
            frame.extend(entry.to_be_bytes());
        }
        frame
    }

    #[test]
    fn parses_header_and_table() {
        let frame = vbri_frame(100, 10, &[500; 10]);
        let tag = VbriTag::parse(&frame).unwrap();

        assert_eq!(tag.version, 1);
        assert_eq!(tag.delay, 0x1234);
        assert_eq!(tag.quality, 75);
        assert_eq!(tag.bytes, 10_000);
        assert_eq!(tag.frames, 100);
        assert_eq!(tag.entries, vec![1000; 10]);

        let toc = tag.toc.unwrap();
        assert_eq!(toc.entries()[0], 0);
        assert_eq!(toc.entries()[25], 64);
        assert_eq!(toc.entries()[50], 128);
        assert_eq!(toc.entries()[99], 253);
    }

    #[test]
    fn interpolates_uneven_groups() {
        let frame = vbri_frame(100, 50, &[1500, 500]);
        let toc = VbriTag::parse(&frame).unwrap().toc.unwrap();

        assert_eq!(toc.entries()[25], 96);
        assert_eq!(toc.entries()[50], 192);
        assert_eq!(toc.entries()[75], 224);
    }

    #[test]
    fn rejects_bad_entry_size() {
        let mut frame = vbri_frame(100, 10, &[500; 10]);
        frame[VBRI_OFFSET + 22..VBRI_OFFSET + 24].copy_from_slice(&7u16.to_be_bytes());
        assert_eq!(
            VbriTag::parse(&frame),
            Err(TagError::malformed("VBRI", "entry size out of range"))
        );
        assert_eq!(VbriTag::parse(&frame[..VBRI_OFFSET]), Err(TagError::NotFound));
    }
}
