// Licensed under the Apache-2.0 license

//! Wire format of the DUST firmware update protocol.
//!
//! Every frame is `header(4) || payload(32|64|128|256) || crc16(2)`, all big-endian.
//! The header carries its own 16-bit checksum so a receiver can trust the length code
//! before reading the rest of the frame; the trailing CRC16 covers the whole frame.

pub mod codec;
pub mod crc16;
pub mod error;
pub mod protocol;

pub use crc16::{Crc16, DUST_CRC16_POLYNOMIAL};
pub use error::DustError;
