// Licensed under the Apache-2.0 license

use crate::codec::DustCodecError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DustError {
    #[error("header checksum mismatch: expected {expected:#06x}, found {actual:#06x}")]
    HeaderChecksumInvalid { expected: u16, actual: u16 },
    #[error("packet crc16 mismatch")]
    CrcMismatch,
    #[error("payload of {actual} bytes does not match the {expected} bytes of its length code")]
    InvalidPayloadLength { expected: usize, actual: usize },
    #[error("buffer too short")]
    BufferTooShort,
    #[error("frame of {0} bytes does not carry a 32, 64, 128 or 256 byte payload")]
    InvalidFrameSize(usize),
    #[error("invalid ack frequency code {0:#04x}")]
    InvalidAckFrequency(u8),
    #[error("invalid payload size {0}")]
    InvalidPayloadSize(u16),
}

impl From<DustCodecError> for DustError {
    fn from(err: DustCodecError) -> Self {
        match err {
            DustCodecError::BufferTooShort => DustError::BufferTooShort,
            DustCodecError::InvalidAckFrequency(code) => DustError::InvalidAckFrequency(code),
            DustCodecError::InvalidPayloadSize(size) => DustError::InvalidPayloadSize(size),
        }
    }
}
