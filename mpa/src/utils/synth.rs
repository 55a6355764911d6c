//! Synthetic stream builders for unit tests.

use crate::structs::header::{FRAME_CRC, FrameHeader, HEADER_LEN, Layer, MpegVersion};
use crate::utils::crc::{CRC_LAME_TAG_ALG, Crc16};

/// MPEG-1 Layer III, 44.1 kHz, stereo.
pub(crate) fn mp3_header(bitrate_index: u8) -> FrameHeader {
    FrameHeader::new(MpegVersion::Mpeg1, Layer::III, bitrate_index, 0)
        .unwrap_or_else(|e| panic!("bad test header: {e}"))
}

/// One frame with a zeroed payload. A protected header gets a CRC word
/// that matches the zeroed side information.
pub(crate) fn frame(header: &FrameHeader) -> Vec<u8> {
    let size = header.frame_size();
    assert!(size > 0, "free format frames need an explicit size");
    sized_frame(header, size)
}

pub(crate) fn sized_frame(header: &FrameHeader, size: usize) -> Vec<u8> {
    let bytes = header.to_bytes();
    let mut out = bytes.to_vec();
    if header.protected {
        let side_info = vec![0u8; header.side_info_len().unwrap_or(0)];
        let crc = FRAME_CRC.update(FRAME_CRC.checksum(&bytes[2..HEADER_LEN]), &side_info);
        out.extend(crc.to_be_bytes());
    }
    out.resize(size, 0);
    out
}

pub(crate) fn frames(header: &FrameHeader, count: usize) -> Vec<u8> {
    (0..count).flat_map(|_| frame(header)).collect()
}

/// Xing or Info tag body as written at the ancillary position.
pub(crate) struct XingSpec {
    pub magic: [u8; 4],
    pub frames: Option<u32>,
    pub bytes: Option<u32>,
    pub toc: Option<[u8; 100]>,
    pub quality: Option<u32>,
}

impl XingSpec {
    pub(crate) fn vbr(frames: u32, bytes: u32) -> Self {
        Self {
            magic: *b"Xing",
            frames: Some(frames),
            bytes: Some(bytes),
            toc: Some(linear_toc()),
            quality: Some(78),
        }
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let flags = self.frames.is_some() as u32
            | (self.bytes.is_some() as u32) << 1
            | (self.toc.is_some() as u32) << 2
            | (self.quality.is_some() as u32) << 3;

        let mut out = self.magic.to_vec();
        out.extend(flags.to_be_bytes());
        if let Some(frames) = self.frames {
            out.extend(frames.to_be_bytes());
        }
        if let Some(bytes) = self.bytes {
            out.extend(bytes.to_be_bytes());
        }
        if let Some(toc) = &self.toc {
            out.extend(toc);
        }
        if let Some(quality) = self.quality {
            out.extend(quality.to_be_bytes());
        }
        out
    }
}

pub(crate) fn linear_toc() -> [u8; 100] {
    std::array::from_fn(|i| (i * 256 / 100) as u8)
}

/// 36-byte LAME extension with a placeholder tag CRC.
pub(crate) fn lame_block() -> Vec<u8> {
    let mut out = b"LAME3.100".to_vec();
    out.push(0x04); // revision 0, VBR method 4
    out.push(195); // lowpass 19.5 kHz
    out.extend((1u32 << 23).to_be_bytes()); // peak 1.0
    out.extend(0x2C0Fu16.to_be_bytes()); // radio, automatic, +1.5 dB
    out.extend(0x0000u16.to_be_bytes()); // no audiophile gain
    out.push(0x13); // nspsytune, ATH type 3
    out.push(128);
    out.extend([0x24, 0x02, 0x40]); // delay 576, padding 576
    out.push(0b01_0_001_00); // 44.1 kHz source, stereo
    out.push(0);
    out.extend([0x00, 0x00]); // no surround, no preset
    out.extend(0u32.to_be_bytes()); // music length
    out.extend(0u16.to_be_bytes()); // music CRC
    out.extend(0u16.to_be_bytes()); // tag CRC
    out
}

/// A Layer III metadata frame: `tag` at the ancillary position, with
/// `lame` (if any) at tag + 120 and a valid LAME tag CRC.
pub(crate) fn tag_frame(header: &FrameHeader, tag: &[u8], lame: Option<&[u8]>) -> Vec<u8> {
    let mut out = frame(header);
    let start = header.ancillary_offset().unwrap_or(HEADER_LEN);
    out[start..start + tag.len()].copy_from_slice(tag);

    if let Some(lame) = lame {
        write_lame(&mut out, start + 120, lame);
    }

    out
}

/// A Layer III frame holding a LAME block right at the ancillary position.
pub(crate) fn lame_frame(header: &FrameHeader) -> Vec<u8> {
    let mut out = frame(header);
    let start = header.ancillary_offset().unwrap_or(HEADER_LEN);
    write_lame(&mut out, start, &lame_block());
    out
}

fn write_lame(frame: &mut [u8], start: usize, lame: &[u8]) {
    frame[start..start + lame.len()].copy_from_slice(lame);
    let crc_at = start + 34;
    let crc = Crc16::new(&CRC_LAME_TAG_ALG).checksum(&frame[..crc_at]);
    frame[crc_at..crc_at + 2].copy_from_slice(&crc.to_be_bytes());
}
