// Licensed under the Apache-2.0 license

pub mod handshake;
pub mod header;
pub mod packet;

pub use handshake::{AckFrequency, HandshakeOptions, HANDSHAKE_OPTIONS_SIZE};
pub use header::{Ack, LengthCode, Opcode, PacketHeader, HEADER_SIZE, PACKET_NUMBER_MASK};
pub use packet::{frame_size, Packet, Payload, MIN_FRAME_SIZE};
