//! Bitstream I/O utilities for MPEG audio parsing.
//!
//! Wraps a big-endian [`bitstream_io::BitReader`] over a byte slice and adds
//! the operations frame parsing needs: fixed-width reads, skips, bit position
//! bookkeeping and CRC-16 over a bit range without disturbing the cursor.
//!
//! Every read is bounds checked against the slice. Running off the end
//! yields [`io::ErrorKind::UnexpectedEof`], which the stream layer reports
//! as "need more data" and the tag layer reports as malformed.

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, UnsignedInteger};

use crate::utils::crc::Crc16;

const STACK_BUF_SIZE: usize = 256;

#[derive(Debug)]
pub struct BitReader<'a> {
    bs: bitstream_io::BitReader<io::Cursor<&'a [u8]>, BigEndian>,
    len: u64,
}

impl<'a> BitReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        Self {
            bs: bitstream_io::BitReader::new(io::Cursor::new(buf)),
            len: (buf.len() as u64) << 3,
        }
    }

    /// Creates a reader positioned `byte_offset` bytes into `buf`.
    pub fn at(buf: &'a [u8], byte_offset: usize) -> io::Result<Self> {
        let mut reader = Self::from_slice(buf);
        reader.seek_to((byte_offset as u64) << 3)?;
        Ok(reader)
    }

    #[inline(always)]
    pub fn read_bit(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    /// Reads `n` bits (at most 32), most significant bit first.
    #[inline(always)]
    pub fn read<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        debug_assert!(n <= 32);
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn skip(&mut self, n: u32) -> io::Result<()> {
        if n as u64 > self.available()? {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "skip: out of bounds bits",
            ));
        }

        self.bs.skip(n)
    }

    /// Current position in bits from the start of the slice.
    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }

    /// Index of the byte holding the next unread bit.
    #[inline(always)]
    pub fn byte_position(&mut self) -> io::Result<usize> {
        self.position().map(|pos| (pos >> 3) as usize)
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|pos| self.len - pos)
    }

    pub fn seek_to(&mut self, bit_position: u64) -> io::Result<()> {
        if bit_position > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("seek_to({bit_position}): beyond {} bits", self.len),
            ));
        }

        self.bs.seek_bits(SeekFrom::Start(bit_position))?;
        Ok(())
    }

    /// Bits between two positions previously returned by [`Self::position`].
    #[inline(always)]
    pub const fn distance(from: u64, to: u64) -> u64 {
        to.saturating_sub(from)
    }

    /// Computes a CRC over the next `len` bits, seeded with `seed`.
    ///
    /// The reader position is restored before returning.
    pub fn crc16(&mut self, crc: &Crc16, seed: u16, len: u64) -> io::Result<u16> {
        let position = self.position()?;

        if len > self.available()? {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "crc16: out of bounds bits",
            ));
        }

        let mut checksum = seed;
        let mut remaining = len;

        let mut stack_buf = [0u8; STACK_BUF_SIZE];
        while remaining >= 8 {
            let bytes_len = ((remaining >> 3) as usize).min(STACK_BUF_SIZE);
            let buf = &mut stack_buf[..bytes_len];
            self.bs.read_bytes(buf)?;
            checksum = crc.update(checksum, buf);
            remaining -= (bytes_len as u64) << 3;
        }

        if remaining != 0 {
            let suffix: u16 = self.bs.read_unsigned_var(remaining as u32)?;
            checksum = crc.update_bits(checksum, suffix, remaining as u32);
        }

        self.bs.seek_bits(SeekFrom::Start(position))?;

        Ok(checksum)
    }
}

impl Default for BitReader<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crc::CRC_FRAME_HEADER_ALG;

    #[test]
    fn reads_msb_first_across_bytes() -> io::Result<()> {
        let data = [0b1010_1100, 0b0101_0011, 0xFF];
        let mut reader = BitReader::from_slice(&data);

        assert_eq!(reader.read::<u8>(3)?, 0b101);
        assert_eq!(reader.read::<u16>(9)?, 0b0_1100_0101);
        assert_eq!(reader.position()?, 12);
        reader.skip(4)?;
        assert_eq!(reader.byte_position()?, 2);
        assert_eq!(reader.read::<u8>(8)?, 0xFF);
        assert_eq!(reader.available()?, 0);
        assert!(reader.read::<u8>(1).is_err());
        Ok(())
    }

    #[test]
    fn crc_does_not_move_cursor() -> io::Result<()> {
        let crc = Crc16::new(&CRC_FRAME_HEADER_ALG);
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut reader = BitReader::from_slice(&data);
        reader.skip(4)?;

        let value = reader.crc16(&crc, crc.init, 20)?;
        assert_eq!(reader.position()?, 4);

        // 20 bits starting at bit 4: 0x2345 then the nibble 0x6
        let expected = crc.update_bits(crc.update(crc.init, &[0x23, 0x45]), 0x6, 4);
        assert_eq!(value, expected);
        assert!(reader.crc16(&crc, crc.init, 64).is_err());
        Ok(())
    }

    #[test]
    fn distance_between_positions() -> io::Result<()> {
        let data = [0u8; 8];
        let mut reader = BitReader::at(&data, 2)?;
        let start = reader.position()?;
        reader.skip(13)?;
        let end = reader.position()?;
        assert_eq!(BitReader::distance(start, end), 13);
        assert_eq!(BitReader::distance(end, start), 0);
        Ok(())
    }
}
