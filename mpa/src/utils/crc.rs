//! CRC validation utilities for MPEG audio streams.
//!
//! Two CRC-16 flavours appear in MPEG audio files:
//!
//! - The frame header CRC (ISO/IEC 11172-3, polynomial 0x8005, initial
//!   value 0xFFFF, processed MSB first). It may cover bit ranges that do not
//!   end on a byte boundary, so bit-granular updates are supported.
//! - The LAME info tag CRC, which is CRC-16/ARC (reflected polynomial
//!   0xA001, initial value 0x0000) over whole bytes.

/// CRC algorithm specification with polynomial, initial value and bit order.
pub struct Algorithm<T> {
    poly: T,
    init: T,
    reflected: bool,
}

/// CRC-16 protecting frame headers and Layer III side information.
pub const CRC_FRAME_HEADER_ALG: Algorithm<u16> = Algorithm {
    poly: 0x8005,
    init: 0xFFFF,
    reflected: false,
};

/// CRC-16 protecting the LAME extension of an info tag.
pub const CRC_LAME_TAG_ALG: Algorithm<u16> = Algorithm {
    poly: 0xA001,
    init: 0x0000,
    reflected: true,
};

/// Feeds the low `len` bits of `data` into `value`, most significant bit first.
#[inline(always)]
pub const fn crc16(poly: u16, mut value: u16, data: u16, len: u32) -> u16 {
    let mut i = len;
    while i > 0 {
        i -= 1;
        let bit = (data >> i) & 1;
        let msb = value >> 15;
        value <<= 1;
        if msb ^ bit != 0 {
            value ^= poly;
        }
    }

    value
}

#[inline(always)]
const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc16(poly, 0, i as u16, 8);
        i += 1;
    }

    table
}

#[inline(always)]
const fn crc16_reflected_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        let mut value = i as u16;
        let mut bit = 0;
        while bit < 8 {
            value = if value & 1 != 0 {
                (value >> 1) ^ poly
            } else {
                value >> 1
            };
            bit += 1;
        }
        table[i] = value;
        i += 1;
    }

    table
}

#[derive(Debug)]
pub struct Crc16 {
    pub poly: u16,
    pub init: u16,
    pub reflected: bool,
    table: [u16; 256],
}

impl Crc16 {
    pub const fn new(algorithm: &Algorithm<u16>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            reflected: algorithm.reflected,
            table: if algorithm.reflected {
                crc16_reflected_table(algorithm.poly)
            } else {
                crc16_table(algorithm.poly)
            },
        }
    }

    const fn table_entry(&self, index: u16) -> u16 {
        self.table[(index & 0xFF) as usize]
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            crc = if self.reflected {
                self.table_entry(crc ^ bytes[i] as u16) ^ (crc >> 8)
            } else {
                self.table_entry((crc >> 8) ^ bytes[i] as u16) ^ (crc << 8)
            };
            i += 1;
        }

        crc
    }

    /// Feeds a partial byte. Only meaningful for MSB-first algorithms.
    #[inline(always)]
    pub const fn update_bits(&self, crc: u16, data: u16, len: u32) -> u16 {
        debug_assert!(!self.reflected);
        crc16(self.poly, crc, data, len)
    }

    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        self.update(self.init, bytes)
    }
}

#[test]
fn crc16_check_values() {
    let header = Crc16::new(&CRC_FRAME_HEADER_ALG);
    assert_eq!(header.checksum(b"123456789"), 0xAEE7);

    let lame = Crc16::new(&CRC_LAME_TAG_ALG);
    assert_eq!(lame.checksum(b"123456789"), 0xBB3D);
}

#[test]
fn crc16_bitwise_matches_table() {
    let crc = Crc16::new(&CRC_FRAME_HEADER_ALG);
    let bytes = [0xFFu8, 0xFB, 0x90, 0x64, 0x00, 0x5A];

    let by_table = crc.update(crc.init, &bytes);
    let by_bits = bytes
        .iter()
        .fold(crc.init, |acc, &b| crc.update_bits(acc, b as u16, 8));
    assert_eq!(by_table, by_bits);

    // splitting a byte into 3 + 5 bits gives the same result
    let split = crc.update_bits(crc.update_bits(crc.init, 0b101, 3), 0b11011, 5);
    assert_eq!(split, crc.update(crc.init, &[0b1011_1011]));
}
