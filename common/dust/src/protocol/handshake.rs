// Licensed under the Apache-2.0 license

use crate::codec::{DustCodec, DustCodecError};
use crate::protocol::header::LengthCode;
use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const HANDSHAKE_OPTIONS_SIZE: usize = 32;

/// How many DATA packets the initiator sends between acknowledgment reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AckFrequency {
    AfterEachPacket = 0x00,
    #[default]
    After8 = 0x01,
    After16 = 0x02,
    After32 = 0x03,
    After64 = 0x04,
    After128 = 0x05,
    After256 = 0x06,
    After512 = 0x07,
}

impl AckFrequency {
    pub fn packet_count(self) -> u16 {
        match self {
            AckFrequency::AfterEachPacket => 1,
            AckFrequency::After8 => 8,
            AckFrequency::After16 => 16,
            AckFrequency::After32 => 32,
            AckFrequency::After64 => 64,
            AckFrequency::After128 => 128,
            AckFrequency::After256 => 256,
            AckFrequency::After512 => 512,
        }
    }

    pub fn from_packet_count(count: u16) -> Option<Self> {
        match count {
            1 => Some(AckFrequency::AfterEachPacket),
            8 => Some(AckFrequency::After8),
            16 => Some(AckFrequency::After16),
            32 => Some(AckFrequency::After32),
            64 => Some(AckFrequency::After64),
            128 => Some(AckFrequency::After128),
            256 => Some(AckFrequency::After256),
            512 => Some(AckFrequency::After512),
            _ => None,
        }
    }
}

impl TryFrom<u8> for AckFrequency {
    type Error = DustCodecError;

    fn try_from(value: u8) -> Result<Self, DustCodecError> {
        match value {
            0x00 => Ok(AckFrequency::AfterEachPacket),
            0x01 => Ok(AckFrequency::After8),
            0x02 => Ok(AckFrequency::After16),
            0x03 => Ok(AckFrequency::After32),
            0x04 => Ok(AckFrequency::After64),
            0x05 => Ok(AckFrequency::After128),
            0x06 => Ok(AckFrequency::After256),
            0x07 => Ok(AckFrequency::After512),
            _ => Err(DustCodecError::InvalidAckFrequency(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct HandshakeOptionsBlock {
    ack_frequency: u8,
    number_of_packets: U32<BigEndian>,
    payload_size: U16<BigEndian>,
    reserved: [u8; 25],
}

const _: () = assert!(core::mem::size_of::<HandshakeOptionsBlock>() == HANDSHAKE_OPTIONS_SIZE);

/// Session parameters carried as the CONNECT payload.
///
/// Wire form: `[ack_frequency:1][number_of_packets:4 BE][payload_size:2 BE][zero:25]`,
/// where `payload_size` is a byte count (32/64/128/256), not the 2-bit length code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeOptions {
    pub ack_frequency: AckFrequency,
    pub number_of_packets: u32,
    pub length_code: LengthCode,
}

impl HandshakeOptions {
    pub fn new(ack_frequency: AckFrequency, number_of_packets: u32, length_code: LengthCode) -> Self {
        Self {
            ack_frequency,
            number_of_packets,
            length_code,
        }
    }

    pub fn payload_size(&self) -> usize {
        self.length_code.byte_count()
    }

    pub fn to_bytes(&self) -> [u8; HANDSHAKE_OPTIONS_SIZE] {
        let mut bytes = [0u8; HANDSHAKE_OPTIONS_SIZE];
        bytes.copy_from_slice(self.block().as_bytes());
        bytes
    }

    fn block(&self) -> HandshakeOptionsBlock {
        HandshakeOptionsBlock {
            ack_frequency: self.ack_frequency as u8,
            number_of_packets: U32::new(self.number_of_packets),
            payload_size: U16::new(self.length_code.byte_count() as u16),
            reserved: [0; 25],
        }
    }
}

impl DustCodec for HandshakeOptions {
    const CODEC_SIZE: usize = HANDSHAKE_OPTIONS_SIZE;

    fn encode(&self, buffer: &mut [u8]) -> Result<usize, DustCodecError> {
        self.block()
            .write_to_prefix(buffer)
            .map_err(|_| DustCodecError::BufferTooShort)
            .map(|_| HANDSHAKE_OPTIONS_SIZE)
    }

    fn decode(buffer: &[u8]) -> Result<Self, DustCodecError> {
        let (block, _) = HandshakeOptionsBlock::read_from_prefix(buffer)
            .map_err(|_| DustCodecError::BufferTooShort)?;
        let payload_size = block.payload_size.get();
        let length_code = LengthCode::from_byte_count(payload_size as usize)
            .ok_or(DustCodecError::InvalidPayloadSize(payload_size))?;
        Ok(Self {
            ack_frequency: AckFrequency::try_from(block.ack_frequency)?,
            number_of_packets: block.number_of_packets.get(),
            length_code,
        })
    }
}
