// Licensed under the Apache-2.0 license

use crate::codec::DustCodec;
use crate::crc16::{Crc16, CRC16_SIZE};
use crate::error::DustError;
use crate::protocol::header::{LengthCode, PacketHeader, HEADER_SIZE};

/// Smallest possible frame: a header, an empty payload and the CRC16 trailer.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CRC16_SIZE;

/// Total frame size for a payload of the given length code.
pub fn frame_size(length_code: LengthCode) -> usize {
    HEADER_SIZE + length_code.byte_count() + CRC16_SIZE
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    data: Vec<u8>,
}

impl Payload {
    /// Wraps `data` as the payload for `length_code`; the sizes must agree.
    pub fn new(length_code: LengthCode, data: &[u8]) -> Result<Self, DustError> {
        let expected = length_code.byte_count();
        if data.len() != expected {
            return Err(DustError::InvalidPayloadLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: data.to_vec(),
        })
    }

    pub fn zeroed(length_code: LengthCode) -> Self {
        Self {
            data: vec![0; length_code.byte_count()],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    payload: Payload,
    crc16: u16,
}

impl Packet {
    /// Combines `header` and `payload` and computes the CRC16 over their serialized bytes.
    pub fn build(header: PacketHeader, payload: Payload, crc: &Crc16) -> Result<Self, DustError> {
        let expected = header.payload_size();
        if payload.len() != expected {
            return Err(DustError::InvalidPayloadLength {
                expected,
                actual: payload.len(),
            });
        }
        let crc16 = crc.checksum(&Self::serialize_body(&header, &payload));
        Ok(Self {
            header,
            payload,
            crc16,
        })
    }

    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn crc16(&self) -> u16 {
        self.crc16
    }

    fn serialize_body(header: &PacketHeader, payload: &Payload) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC16_SIZE);
        bytes.extend_from_slice(&header.to_bytes());
        bytes.extend_from_slice(payload.as_bytes());
        bytes
    }

    /// `header || payload || crc16`, all big-endian.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Self::serialize_body(&self.header, &self.payload);
        bytes.extend_from_slice(&self.crc16.to_be_bytes());
        bytes
    }

    /// Parses a complete frame and checks its CRC16.
    ///
    /// The payload between header and trailer must be one of the sizes a length code can
    /// announce. Only the CRC is verified. The header checksum is a separate check
    /// (`PacketHeader::is_checksum_valid`) done by the receiver before it sizes the read.
    pub fn deserialize(bytes: &[u8], crc: &Crc16) -> Result<Self, DustError> {
        if bytes.len() < MIN_FRAME_SIZE {
            return Err(DustError::BufferTooShort);
        }
        if LengthCode::from_byte_count(bytes.len() - MIN_FRAME_SIZE).is_none() {
            return Err(DustError::InvalidFrameSize(bytes.len()));
        }
        if !crc.is_frame_valid(bytes) {
            return Err(DustError::CrcMismatch);
        }
        let header = PacketHeader::decode(bytes)?;
        let trailer = bytes.len() - CRC16_SIZE;
        Ok(Self {
            header,
            payload: Payload {
                data: bytes[HEADER_SIZE..trailer].to_vec(),
            },
            crc16: u16::from_be_bytes([bytes[trailer], bytes[trailer + 1]]),
        })
    }
}
