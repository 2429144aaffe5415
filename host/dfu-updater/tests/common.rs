// Licensed under the Apache-2.0 license
#![allow(dead_code)]

use dfu_updater::config::SessionConfig;
use dfu_updater::session::DustSession;
use dfu_updater::transport::{DustSocket, TransportError};
use dust_common::crc16::Crc16;
use dust_common::protocol::{Ack, LengthCode, Opcode, Packet, PacketHeader, Payload};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What the scripted device does the next time the updater reads from an empty link.
pub enum DeviceResponse {
    Frame(Vec<u8>),
    /// Only the first `arrived` bytes are there before the read times out. The rest
    /// lands in the input buffer right after.
    Late { frame: Vec<u8>, arrived: usize },
    Fail(TransportError),
}

#[derive(Default)]
struct MockLink {
    sent: Vec<Vec<u8>>,
    script: VecDeque<DeviceResponse>,
    pending: VecDeque<u8>,
    late: VecDeque<u8>,
    discards: usize,
    disconnected: bool,
}

/// Loopback socket that records every frame the updater sends and replays scripted
/// device responses. Clones share the same link, so a test keeps one handle while
/// the session owns another.
#[derive(Clone, Default)]
pub struct MockDustSocket {
    link: Arc<Mutex<MockLink>>,
}

impl MockDustSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&self, frame: Vec<u8>) {
        self.link
            .lock()
            .unwrap()
            .script
            .push_back(DeviceResponse::Frame(frame));
    }

    pub fn push_error(&self, error: TransportError) {
        self.link
            .lock()
            .unwrap()
            .script
            .push_back(DeviceResponse::Fail(error));
    }

    pub fn push_late_frame(&self, frame: Vec<u8>, arrived: usize) {
        self.link
            .lock()
            .unwrap()
            .script
            .push_back(DeviceResponse::Late { frame, arrived });
    }

    pub fn push_ack(&self) {
        self.push_frame(control_frame(Opcode::Data, Ack::Set, 0));
    }

    pub fn push_nack(&self) {
        self.push_frame(control_frame(Opcode::Data, Ack::Unset, 0));
    }

    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.link.lock().unwrap().sent.clone()
    }

    pub fn sent_packets(&self) -> Vec<Packet> {
        let crc = Crc16::default();
        self.sent_frames()
            .iter()
            .map(|frame| Packet::deserialize(frame, &crc).unwrap())
            .collect()
    }

    /// Packet numbers of the DATA packets sent so far, in order.
    pub fn sent_data_packet_numbers(&self) -> Vec<u16> {
        self.sent_packets()
            .iter()
            .filter(|p| p.header().opcode == Opcode::Data)
            .map(|p| p.header().packet_number)
            .collect()
    }

    pub fn remaining_responses(&self) -> usize {
        self.link.lock().unwrap().script.len()
    }

    pub fn discards(&self) -> usize {
        self.link.lock().unwrap().discards
    }

    pub fn is_disconnected(&self) -> bool {
        self.link.lock().unwrap().disconnected
    }
}

impl DustSocket for MockDustSocket {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.link.lock().unwrap().sent.push(bytes.to_vec());
        Ok(())
    }

    fn receive(&mut self, count: usize) -> Result<Vec<u8>, TransportError> {
        let mut link = self.link.lock().unwrap();
        if link.pending.is_empty() {
            match link.script.pop_front() {
                Some(DeviceResponse::Frame(frame)) => link.pending.extend(frame),
                Some(DeviceResponse::Late { frame, arrived }) => {
                    link.pending.extend(&frame[..arrived]);
                    link.late.extend(&frame[arrived..]);
                }
                Some(DeviceResponse::Fail(error)) => return Err(error),
                None => return Err(TransportError::Timeout),
            }
        }
        if link.pending.len() < count {
            let received = link.pending.len();
            link.pending.clear();
            let late: Vec<u8> = link.late.drain(..).collect();
            link.pending.extend(late);
            return Err(TransportError::ShortRead {
                expected: count,
                received,
            });
        }
        Ok(link.pending.drain(..count).collect())
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        let mut link = self.link.lock().unwrap();
        link.pending.clear();
        link.discards += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.link.lock().unwrap().disconnected = true;
    }
}

/// A BYTES32 frame with a zero payload, as the device sends for ACK/NACK and DISCONNECT.
pub fn control_frame(opcode: Opcode, ack: Ack, packet_number: u16) -> Vec<u8> {
    let header = PacketHeader::new(opcode, LengthCode::Bytes32, ack, packet_number);
    Packet::build(
        header,
        Payload::zeroed(LengthCode::Bytes32),
        &Crc16::default(),
    )
    .unwrap()
    .serialize()
}

pub fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn setup(config: SessionConfig) -> (MockDustSocket, DustSession<MockDustSocket>) {
    // Initialize log level to debug (only once)
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();

    let device = MockDustSocket::new();
    let session = DustSession::new(device.clone(), config);
    (device, session)
}
