//! ID3 tag framing.
//!
//! Only the extent of ID3 tags matters here: a leading ID3v2 tag and a
//! trailing 128-byte ID3v1 block are stepped over to find the audio.

use crate::utils::bitstream_io::BitReader;

pub const ID3V1_LEN: usize = 128;
pub const ID3V2_HEADER_LEN: usize = 10;
pub const ID3V2_FOOTER_LEN: usize = 10;

const FLAG_FOOTER: u8 = 0x10;

/// `"ID3"`, 2 version bytes, flags and a 28-bit synchsafe size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id3v2Header {
    pub major: u8,
    pub revision: u8,
    pub flags: u8,
    /// Tag size excluding header and footer.
    pub size: u32,
}

impl Id3v2Header {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let header = data.get(..ID3V2_HEADER_LEN)?;
        if &header[..3] != b"ID3" || header[3] == 0xFF || header[4] == 0xFF {
            return None;
        }
        if header[6..].iter().any(|b| b & 0x80 != 0) {
            return None;
        }

        let mut reader = BitReader::at(header, 6).ok()?;
        let mut size = 0u32;
        for _ in 0..4 {
            reader.skip(1).ok()?;
            size = size << 7 | reader.read::<u32>(7).ok()?;
        }

        Some(Self {
            major: header[3],
            revision: header[4],
            flags: header[5],
            size,
        })
    }

    pub fn has_footer(&self) -> bool {
        self.flags & FLAG_FOOTER != 0
    }

    /// Total bytes occupied by the tag.
    pub fn tag_len(&self) -> usize {
        let footer = if self.has_footer() {
            ID3V2_FOOTER_LEN
        } else {
            0
        };
        ID3V2_HEADER_LEN + self.size as usize + footer
    }
}

/// `true` when `data` ends with an ID3v1 block.
pub fn has_id3v1(data: &[u8]) -> bool {
    data.len() >= ID3V1_LEN && data[data.len() - ID3V1_LEN..].starts_with(b"TAG")
}

#[test]
fn id3v2_sizes() {
    let header = Id3v2Header::parse(b"ID3\x04\x00\x00\x00\x00\x02\x01").unwrap();
    assert_eq!(header.major, 4);
    assert_eq!(header.size, 257);
    assert_eq!(header.tag_len(), 267);

    let header = Id3v2Header::parse(b"ID3\x04\x00\x10\x7F\x7F\x7F\x7F").unwrap();
    assert!(header.has_footer());
    assert_eq!(header.size, (1 << 28) - 1);
    assert_eq!(header.tag_len(), (1 << 28) - 1 + 20);

    assert!(Id3v2Header::parse(b"ID3\x04\x00\x00\x00\x00\x80\x00").is_none());
    assert!(Id3v2Header::parse(b"ID3\x04\x00").is_none());
    assert!(Id3v2Header::parse(b"TAG\x04\x00\x00\x00\x00\x02\x01").is_none());
}

#[test]
fn id3v1_block() {
    let mut data = vec![0u8; 300];
    assert!(!has_id3v1(&data));
    data[300 - 128..300 - 125].copy_from_slice(b"TAG");
    assert!(has_id3v1(&data));
    assert!(!has_id3v1(&data[..100]));
}
