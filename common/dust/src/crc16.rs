// Licensed under the Apache-2.0 license

/// Generator polynomial used by DUST frames (x^16 + x^12 + x^5 + 1).
pub const DUST_CRC16_POLYNOMIAL: u16 = 0x1021;

pub const CRC16_SIZE: usize = 2;

/// Builds the 256-entry lookup table for a non-reflected CRC16 with the given polynomial.
pub const fn build_table(polynomial: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut value = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            if value & 0x8000 != 0 {
                value = (value << 1) ^ polynomial;
            } else {
                value <<= 1;
            }
            bit += 1;
        }
        table[i] = value;
        i += 1;
    }
    table
}

/// Table-driven CRC16 engine.
///
/// Built once and handed by reference to every serialize/deserialize call; the table is
/// never modified after construction.
#[derive(Clone)]
pub struct Crc16 {
    polynomial: u16,
    table: [u16; 256],
}

impl Crc16 {
    pub const fn new(polynomial: u16) -> Self {
        Self {
            polynomial,
            table: build_table(polynomial),
        }
    }

    pub fn polynomial(&self) -> u16 {
        self.polynomial
    }

    /// Computes the CRC16 of `data`, starting from zero.
    pub fn checksum(&self, data: &[u8]) -> u16 {
        data.iter().fold(0u16, |crc, &byte| {
            let index = ((crc >> 8) ^ byte as u16) & 0xff;
            (crc << 8) ^ self.table[index as usize]
        })
    }

    /// Returns true if `frame` ends with a big-endian CRC16 of the bytes before it.
    ///
    /// Running the CRC over data followed by its own CRC yields zero.
    pub fn is_frame_valid(&self, frame: &[u8]) -> bool {
        self.checksum(frame) == 0
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new(DUST_CRC16_POLYNOMIAL)
    }
}

impl core::fmt::Debug for Crc16 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Crc16")
            .field("polynomial", &format_args!("{:#06x}", self.polynomial))
            .finish()
    }
}
