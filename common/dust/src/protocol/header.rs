// Licensed under the Apache-2.0 license

use crate::codec::{DustCodec, DustCodecError};
use crate::error::DustError;
use bitfield::bitfield;

pub const HEADER_SIZE: usize = 4;
pub const PACKET_NUMBER_BITS: u32 = 11;
pub const PACKET_NUMBER_MASK: u16 = (1 << PACKET_NUMBER_BITS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Connect = 0x00,
    Disconnect = 0x01,
    Data = 0x02,
    Error = 0x03,
}

impl Opcode {
    /// Maps the two low bits of `bits` to an opcode. Every 2-bit value is a valid opcode.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0x00 => Opcode::Connect,
            0x01 => Opcode::Disconnect,
            0x02 => Opcode::Data,
            _ => Opcode::Error,
        }
    }
}

/// Payload size selector carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum LengthCode {
    #[default]
    Bytes32 = 0x00,
    Bytes64 = 0x01,
    Bytes128 = 0x02,
    Bytes256 = 0x03,
}

impl LengthCode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0x00 => LengthCode::Bytes32,
            0x01 => LengthCode::Bytes64,
            0x02 => LengthCode::Bytes128,
            _ => LengthCode::Bytes256,
        }
    }

    pub fn from_byte_count(count: usize) -> Option<Self> {
        match count {
            32 => Some(LengthCode::Bytes32),
            64 => Some(LengthCode::Bytes64),
            128 => Some(LengthCode::Bytes128),
            256 => Some(LengthCode::Bytes256),
            _ => None,
        }
    }

    pub fn byte_count(self) -> usize {
        match self {
            LengthCode::Bytes32 => 32,
            LengthCode::Bytes64 => 64,
            LengthCode::Bytes128 => 128,
            LengthCode::Bytes256 => 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Ack {
    #[default]
    Unset = 0x00,
    Set = 0x01,
}

impl Ack {
    pub fn from_bits(bits: u8) -> Self {
        if bits & 0b1 == 0 {
            Ack::Unset
        } else {
            Ack::Set
        }
    }
}

bitfield! {
    /// Raw 32-bit header word as it appears on the wire (most significant byte first).
    #[derive(Copy, Clone, PartialEq, Eq)]
    struct HeaderWord(u32);
    impl Debug;
    pub u8, opcode, set_opcode: 31, 30;
    pub u8, length_code, set_length_code: 29, 28;
    pub u8, ack, set_ack: 27, 27;
    pub u16, packet_number, set_packet_number: 26, 16;
    pub u16, checksum, set_checksum: 15, 0;
}

/// Computes the header self-checksum: the bitwise NOT of the upper 16 bits of the header word.
pub fn checksum(opcode: Opcode, length_code: LengthCode, ack: Ack, packet_number: u16) -> u16 {
    let fields = (opcode as u16) << 14
        | (length_code as u16) << 12
        | (ack as u16) << 11
        | (packet_number & PACKET_NUMBER_MASK);
    !fields
}

/// DUST packet header.
///
/// Layout: `[opcode:2][length_code:2][ack:1][packet_number:11][checksum:16]`.
/// The caller must keep `packet_number` within 11 bits; wider values are masked on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub opcode: Opcode,
    pub length_code: LengthCode,
    pub ack: Ack,
    pub packet_number: u16,
    pub checksum: u16,
}

impl PacketHeader {
    pub fn new(opcode: Opcode, length_code: LengthCode, ack: Ack, packet_number: u16) -> Self {
        debug_assert!(packet_number <= PACKET_NUMBER_MASK);
        let packet_number = packet_number & PACKET_NUMBER_MASK;
        Self {
            opcode,
            length_code,
            ack,
            packet_number,
            checksum: checksum(opcode, length_code, ack, packet_number),
        }
    }

    pub fn expected_checksum(&self) -> u16 {
        checksum(self.opcode, self.length_code, self.ack, self.packet_number)
    }

    pub fn is_checksum_valid(&self) -> bool {
        self.checksum == self.expected_checksum()
    }

    pub fn verify_checksum(&self) -> Result<(), DustError> {
        let expected = self.expected_checksum();
        if self.checksum != expected {
            return Err(DustError::HeaderChecksumInvalid {
                expected,
                actual: self.checksum,
            });
        }
        Ok(())
    }

    /// Number of payload bytes announced by the length code.
    pub fn payload_size(&self) -> usize {
        self.length_code.byte_count()
    }

    fn word(&self) -> HeaderWord {
        let mut word = HeaderWord(0);
        word.set_opcode(self.opcode as u8);
        word.set_length_code(self.length_code as u8);
        word.set_ack(self.ack as u8);
        word.set_packet_number(self.packet_number & PACKET_NUMBER_MASK);
        word.set_checksum(self.checksum);
        word
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        self.word().0.to_be_bytes()
    }

    /// Splits the big-endian header word into its fields. The checksum is not verified here.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let word = HeaderWord(u32::from_be_bytes(*bytes));
        Self {
            opcode: Opcode::from_bits(word.opcode()),
            length_code: LengthCode::from_bits(word.length_code()),
            ack: Ack::from_bits(word.ack()),
            packet_number: word.packet_number(),
            checksum: word.checksum(),
        }
    }
}

impl DustCodec for PacketHeader {
    const CODEC_SIZE: usize = HEADER_SIZE;

    fn encode(&self, buffer: &mut [u8]) -> Result<usize, DustCodecError> {
        let dest = buffer
            .get_mut(..HEADER_SIZE)
            .ok_or(DustCodecError::BufferTooShort)?;
        dest.copy_from_slice(&self.to_bytes());
        Ok(HEADER_SIZE)
    }

    fn decode(buffer: &[u8]) -> Result<Self, DustCodecError> {
        let bytes: &[u8; HEADER_SIZE] = buffer
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(DustCodecError::BufferTooShort)?;
        Ok(Self::from_bytes(bytes))
    }
}
