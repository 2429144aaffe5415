// Licensed under the Apache-2.0 license

use crate::config::SessionConfig;
use crate::segment::{chunk, Segment};
use crate::session_sm::{
    Context, DefaultActions, Events, InnerContext, StateMachine, StateMachineActions, States,
};
use crate::transport::{DustSocket, TransportError};
use dust_common::codec::DustCodec;
use dust_common::crc16::{Crc16, CRC16_SIZE};
use dust_common::protocol::{
    Ack, HandshakeOptions, LengthCode, Opcode, Packet, PacketHeader, Payload, HEADER_SIZE,
    PACKET_NUMBER_MASK,
};
use dust_common::DustError;
use log::{debug, error, info, warn};
use thiserror::Error;

/// Control packets (CONNECT, DISCONNECT-ACK) always carry 32 bytes.
pub const CONTROL_LENGTH_CODE: LengthCode = LengthCode::Bytes32;
pub const CONNECT_PACKET_NUMBER: u16 = 0;
pub const DISCONNECT_ACK_PACKET_NUMBER: u16 = 1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] DustError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("ACK was not received")]
    AckNotReceived,
    #[error("expected a {expected:?} packet, received {received:?}")]
    ProtocolViolation { expected: Opcode, received: Opcode },
    #[error("batch starting at packet {packet_number} still unacknowledged after {limit} retries")]
    RetryLimitExceeded { packet_number: u32, limit: u32 },
    #[error("operation not allowed in state {0:?}")]
    InvalidState(States),
    #[error("image is empty")]
    EmptyImage,
    #[error("image holds {actual} packets but {expected} were announced")]
    ImageSizeMismatch { expected: u32, actual: usize },
    #[error("image needs {0} packets, more than a handshake can announce")]
    TooManyPackets(usize),
}

impl SessionError {
    /// Corrupted or missing responses. The exchange may be retried; anything else is fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::Protocol(DustError::HeaderChecksumInvalid { .. })
                | SessionError::Protocol(DustError::CrcMismatch)
                | SessionError::Transport(TransportError::Timeout)
                | SessionError::Transport(TransportError::ShortRead { .. })
        )
    }
}

/// Drives one DUST update over an opened socket: CONNECT, windowed DATA, DISCONNECT.
pub struct DustSession<S: DustSocket, A: StateMachineActions = DefaultActions> {
    socket: S,
    crc: Crc16,
    config: SessionConfig,
    options: Option<HandshakeOptions>,
    sm: StateMachine<Context<A>>,
}

impl<S: DustSocket> DustSession<S, DefaultActions> {
    pub fn new(socket: S, config: SessionConfig) -> Self {
        Self::with_actions(socket, config, DefaultActions)
    }
}

impl<S: DustSocket, A: StateMachineActions> DustSession<S, A> {
    pub fn with_actions(socket: S, config: SessionConfig, actions: A) -> Self {
        Self {
            socket,
            crc: Crc16::new(config.polynomial),
            config,
            options: None,
            sm: StateMachine::new(Context::new(actions)),
        }
    }

    pub fn state(&self) -> States {
        *self.sm.state()
    }

    pub fn context(&self) -> &InnerContext {
        &self.sm.context().inner_ctx
    }

    pub fn actions(&self) -> &A {
        self.sm.context().actions()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn into_socket(self) -> S {
        self.socket
    }

    /// Connects, transfers `segment` and disconnects.
    ///
    /// Connecting is attempted up to `connect_attempts` times as long as the device either
    /// rejects the handshake or its response is lost or corrupted.
    pub fn run(&mut self, segment: &Segment) -> Result<(), SessionError> {
        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.connect(segment.size()) {
                Ok(_) => break,
                Err(e) if matches!(e, SessionError::AckNotReceived) || e.is_recoverable() => {
                    if attempt >= attempts {
                        error!("No connection after {} attempts", attempts);
                        return Err(self.fail(e));
                    }
                    warn!("Connect attempt {}/{} failed: {}", attempt, attempts, e);
                }
                Err(e) => return Err(e),
            }
        }
        self.update(segment)?;
        self.disconnect()
    }

    /// Sends the handshake for an image of `image_size` bytes and waits for the device's ACK.
    ///
    /// A NACK or a lost/corrupted response leaves the session in `Connecting`; the caller
    /// may call `connect` again.
    pub fn connect(&mut self, image_size: usize) -> Result<HandshakeOptions, SessionError> {
        if image_size == 0 {
            return Err(SessionError::EmptyImage);
        }
        let payload_size = self.config.length_code.byte_count();
        let packets = image_size.div_ceil(payload_size);
        let number_of_packets =
            u32::try_from(packets).map_err(|_| SessionError::TooManyPackets(packets))?;
        let options = HandshakeOptions::new(
            self.config.ack_frequency,
            number_of_packets,
            self.config.length_code,
        );

        self.process(Events::Connect)?;
        info!(
            "Connecting: {} bytes in {} packets of {} bytes",
            image_size, number_of_packets, payload_size
        );

        let mut payload = [0u8; HandshakeOptions::CODEC_SIZE];
        options
            .encode(&mut payload)
            .map_err(|e| self.fail(DustError::from(e).into()))?;
        let packet = self.build_packet(
            Opcode::Connect,
            CONTROL_LENGTH_CODE,
            Ack::Unset,
            CONNECT_PACKET_NUMBER,
            &payload,
        )?;
        self.send_or_fail(&packet)?;

        let response = self.receive_or_fail()?;
        self.expect_opcode(&response, Opcode::Connect)?;
        if response.header().ack != Ack::Set {
            warn!("CONNECT was not acknowledged");
            return Err(SessionError::AckNotReceived);
        }

        self.process(Events::ConnectAcknowledged(options))?;
        self.options = Some(options);
        Ok(options)
    }

    /// Streams `segment` with go-back-N retransmission.
    ///
    /// An acknowledgment is read after every `ack_frequency` packets and after the last one.
    /// A NACK, a corrupted response or a timeout resends the whole batch from its first packet.
    pub fn update(&mut self, segment: &Segment) -> Result<(), SessionError> {
        let state = self.state();
        let options = match (state, self.options) {
            (States::Connected, Some(options)) => options,
            _ => return Err(SessionError::InvalidState(state)),
        };

        let payload_size = options.payload_size();
        let data = segment.transfer_buffer(payload_size);
        let total = options.number_of_packets as usize;
        if data.len() / payload_size != total {
            return Err(SessionError::ImageSizeMismatch {
                expected: options.number_of_packets,
                actual: data.len() / payload_size,
            });
        }
        let batch = options.ack_frequency.packet_count() as usize;

        self.process(Events::StartTransfer)?;
        info!("Sending {} ({} packets)", segment.name(), total);

        let mut index = 0;
        let mut failures = 0;
        while index < total {
            let data_chunk = chunk(&data, payload_size, index).ok_or(
                SessionError::ImageSizeMismatch {
                    expected: options.number_of_packets,
                    actual: index,
                },
            )?;
            let packet = self.build_packet(
                Opcode::Data,
                options.length_code,
                Ack::Unset,
                packet_number(index),
                data_chunk,
            )?;
            self.send_or_fail(&packet)?;

            if (index + 1) % batch != 0 && index + 1 != total {
                index += 1;
                continue;
            }

            let batch_start = index - index % batch;
            let acknowledged = match self.receive_packet() {
                Ok(response) => {
                    self.expect_opcode(&response, Opcode::Data)?;
                    if response.header().ack != Ack::Set {
                        warn!(
                            "NACK for batch starting at packet {} (response packet {})",
                            batch_start,
                            response.header().packet_number
                        );
                    }
                    response.header().ack == Ack::Set
                }
                Err(e) if e.is_recoverable() => {
                    warn!("No valid acknowledgment for packet {}: {}", index, e);
                    false
                }
                Err(e) => return Err(self.fail(e)),
            };

            if acknowledged {
                failures = 0;
                self.process(Events::BatchAcknowledged(batch_start as u32))?;
                index += 1;
                if index % (batch * 16) == 0 || index == total {
                    info!("{}/{} packets acknowledged", index, total);
                }
            } else {
                failures += 1;
                if failures > self.config.max_retries {
                    return Err(self.fail(SessionError::RetryLimitExceeded {
                        packet_number: batch_start as u32,
                        limit: self.config.max_retries,
                    }));
                }
                self.process(Events::BatchRejected(batch_start as u32))?;
                index = batch_start;
            }
        }

        self.process(Events::TransferComplete)
    }

    /// Waits for the device's DISCONNECT and acknowledges it until the device confirms.
    ///
    /// If the DISCONNECT itself is lost or corrupted the session stays in `Disconnecting`
    /// and `disconnect` may be called again.
    pub fn disconnect(&mut self) -> Result<(), SessionError> {
        self.process(Events::Disconnect)?;

        let request = match self.receive_packet() {
            Ok(request) => request,
            Err(e) if e.is_recoverable() => {
                warn!("Failed to receive DISCONNECT: {}", e);
                return Err(e);
            }
            Err(e) => return Err(self.fail(e)),
        };
        self.expect_opcode(&request, Opcode::Disconnect)?;

        let ack = self.build_packet(
            Opcode::Disconnect,
            CONTROL_LENGTH_CODE,
            Ack::Set,
            DISCONNECT_ACK_PACKET_NUMBER,
            Payload::zeroed(CONTROL_LENGTH_CODE).as_bytes(),
        )?;
        let mut retries = 0;
        loop {
            self.send_or_fail(&ack)?;
            match self.receive_packet() {
                Ok(response) => {
                    self.expect_opcode(&response, Opcode::Disconnect)?;
                    if response.header().ack == Ack::Set {
                        break;
                    }
                    warn!("DISCONNECT-ACK was not acknowledged");
                }
                Err(e) if e.is_recoverable() => warn!("No valid response to DISCONNECT-ACK: {}", e),
                Err(e) => return Err(self.fail(e)),
            }
            retries += 1;
            if retries > self.config.max_retries {
                return Err(self.fail(SessionError::RetryLimitExceeded {
                    packet_number: DISCONNECT_ACK_PACKET_NUMBER as u32,
                    limit: self.config.max_retries,
                }));
            }
        }

        self.options = None;
        self.process(Events::DisconnectAcknowledged)
    }

    /// Reads one frame: the header first, then as many bytes as its length code announces.
    ///
    /// The header checksum is verified before the length code is trusted. On mismatch, or
    /// when only part of a frame arrives in time, the pending input is dropped so the next
    /// read starts on a frame boundary.
    pub fn receive_packet(&mut self) -> Result<Packet, SessionError> {
        let mut frame = self.receive_exact(HEADER_SIZE)?;
        let header = PacketHeader::decode(&frame).map_err(DustError::from)?;
        if let Err(e) = header.verify_checksum() {
            warn!("Dropping frame with corrupted header {:02x?}", frame);
            self.socket.discard_input()?;
            return Err(e.into());
        }
        frame.extend(self.receive_exact(header.payload_size() + CRC16_SIZE)?);
        let packet = Packet::deserialize(&frame, &self.crc)?;
        debug!("Received {:?}", packet.header());
        Ok(packet)
    }

    pub fn transmit(&mut self, packet: &Packet) -> Result<(), SessionError> {
        self.socket.send(&packet.serialize())?;
        debug!("Sent {:?}", packet.header());
        Ok(())
    }

    fn receive_exact(&mut self, count: usize) -> Result<Vec<u8>, SessionError> {
        match self.socket.receive(count) {
            Err(e @ TransportError::ShortRead { .. }) => {
                warn!("Dropping partial frame: {}", e);
                self.socket.discard_input()?;
                Err(e.into())
            }
            result => Ok(result?),
        }
    }

    /// ERROR packets and packets of another exchange are fatal.
    fn expect_opcode(&mut self, packet: &Packet, expected: Opcode) -> Result<(), SessionError> {
        let received = packet.header().opcode;
        if received != expected {
            return Err(self.fail(SessionError::ProtocolViolation { expected, received }));
        }
        Ok(())
    }

    fn build_packet(
        &mut self,
        opcode: Opcode,
        length_code: LengthCode,
        ack: Ack,
        packet_number: u16,
        data: &[u8],
    ) -> Result<Packet, SessionError> {
        let header = PacketHeader::new(opcode, length_code, ack, packet_number);
        Payload::new(length_code, data)
            .and_then(|payload| Packet::build(header, payload, &self.crc))
            .map_err(|e| self.fail(e.into()))
    }

    fn send_or_fail(&mut self, packet: &Packet) -> Result<(), SessionError> {
        match self.transmit(packet) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn receive_or_fail(&mut self) -> Result<Packet, SessionError> {
        match self.receive_packet() {
            Err(e) if !e.is_recoverable() => Err(self.fail(e)),
            result => result,
        }
    }

    fn process(&mut self, event: Events) -> Result<(), SessionError> {
        let state = self.state();
        self.sm
            .process_event(event)
            .map(|_| ())
            .map_err(|_| SessionError::InvalidState(state))
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        error!("{}", err);
        if self.sm.process_event(Events::Abort).is_err() {
            error!("Abort rejected in state {:?}", self.state());
        }
        err
    }
}

/// Wire packet number of the packet at `index`; the full count travels in the handshake.
fn packet_number(index: usize) -> u16 {
    (index & PACKET_NUMBER_MASK as usize) as u16
}
