// Licensed under the Apache-2.0 license

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DustCodecError {
    BufferTooShort,
    InvalidAckFrequency(u8),
    InvalidPayloadSize(u16),
}

/// A trait for encoding and decoding the fixed-size DUST structures.
///
/// Implemented by the packet header and the handshake options block, the two
/// structures whose wire size never changes.
pub trait DustCodec: core::fmt::Debug + Sized {
    /// Number of bytes the structure occupies on the wire.
    const CODEC_SIZE: usize;

    /// Encodes the structure into the provided byte buffer.
    ///
    /// # Returns
    ///
    /// The number of bytes written on success, or `DustCodecError::BufferTooShort`
    /// if `buffer` cannot hold `CODEC_SIZE` bytes.
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, DustCodecError>;

    /// Decodes the structure from the first `CODEC_SIZE` bytes of `buffer`.
    fn decode(buffer: &[u8]) -> Result<Self, DustCodecError>;
}
