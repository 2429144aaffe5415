// Licensed under the Apache-2.0 license

#[cfg(test)]
mod common;

use common::{control_frame, image, setup, MockDustSocket};
use dfu_updater::config::SessionConfig;
use dfu_updater::segment::Segment;
use dfu_updater::session::{DustSession, SessionError};
use dfu_updater::session_sm::States;
use dfu_updater::transport::TransportError;
use dust_common::protocol::{Ack, LengthCode, Opcode};
use dust_common::DustError;

fn transferred(config: SessionConfig) -> (MockDustSocket, DustSession<MockDustSocket>) {
    let segment = Segment::new(".text", &[image(64)]);
    let (device, mut session) = setup(config);
    device.push_frame(control_frame(Opcode::Connect, Ack::Set, 0));
    device.push_ack();
    session.connect(segment.size()).unwrap();
    session.update(&segment).unwrap();
    (device, session)
}

fn sent_disconnect_acks(device: &MockDustSocket) -> usize {
    device
        .sent_packets()
        .iter()
        .filter(|p| p.header().opcode == Opcode::Disconnect)
        .count()
}

#[test]
fn test_disconnect() {
    let (device, mut session) = transferred(SessionConfig::default());
    device.push_frame(control_frame(Opcode::Disconnect, Ack::Unset, 0));
    device.push_frame(control_frame(Opcode::Disconnect, Ack::Set, 1));

    session.disconnect().unwrap();
    assert_eq!(session.state(), States::Idle);
    assert_eq!(session.context().options, None);

    let sent = device.sent_packets();
    let ack = sent.last().unwrap();
    assert_eq!(ack.header().opcode, Opcode::Disconnect);
    assert_eq!(ack.header().ack, Ack::Set);
    assert_eq!(ack.header().packet_number, 1);
    assert_eq!(ack.header().length_code, LengthCode::Bytes32);
    assert!(ack.payload().as_bytes().iter().all(|&b| b == 0));
    assert_eq!(sent_disconnect_acks(&device), 1);
}

#[test]
fn test_disconnect_retransmits_ack_until_acknowledged() {
    let (device, mut session) = transferred(SessionConfig::default());
    device.push_frame(control_frame(Opcode::Disconnect, Ack::Unset, 0));
    device.push_frame(control_frame(Opcode::Disconnect, Ack::Unset, 1));
    device.push_frame(control_frame(Opcode::Disconnect, Ack::Unset, 1));
    device.push_frame(control_frame(Opcode::Disconnect, Ack::Set, 1));

    session.disconnect().unwrap();
    assert_eq!(session.state(), States::Idle);

    // One initial DISCONNECT-ACK plus exactly two retransmissions.
    assert_eq!(sent_disconnect_acks(&device), 3);
    assert_eq!(device.remaining_responses(), 0);
}

#[test]
fn test_disconnect_unexpected_opcode() {
    let (device, mut session) = transferred(SessionConfig::default());
    device.push_frame(control_frame(Opcode::Error, Ack::Unset, 0));

    assert_eq!(
        session.disconnect(),
        Err(SessionError::ProtocolViolation {
            expected: Opcode::Disconnect,
            received: Opcode::Error
        })
    );
    assert_eq!(session.state(), States::Failed);
    assert_eq!(sent_disconnect_acks(&device), 0);
}

#[test]
fn test_disconnect_error_reply_fails_session() {
    let (device, mut session) = transferred(SessionConfig::default());
    device.push_frame(control_frame(Opcode::Disconnect, Ack::Unset, 0));
    device.push_frame(control_frame(Opcode::Error, Ack::Set, 1));

    assert_eq!(
        session.disconnect(),
        Err(SessionError::ProtocolViolation {
            expected: Opcode::Disconnect,
            received: Opcode::Error
        })
    );
    assert_eq!(session.state(), States::Failed);
    assert_eq!(sent_disconnect_acks(&device), 1);
}

#[test]
fn test_disconnect_request_lost() {
    let (device, mut session) = transferred(SessionConfig::default());
    let mut request = control_frame(Opcode::Disconnect, Ack::Unset, 0);
    request[30] ^= 0xff;
    device.push_frame(request);

    assert_eq!(
        session.disconnect(),
        Err(SessionError::Protocol(DustError::CrcMismatch))
    );
    assert_eq!(session.state(), States::Disconnecting);

    device.push_frame(control_frame(Opcode::Disconnect, Ack::Unset, 0));
    device.push_frame(control_frame(Opcode::Disconnect, Ack::Set, 1));
    session.disconnect().unwrap();
    assert_eq!(session.state(), States::Idle);
}

#[test]
fn test_disconnect_retry_limit() {
    let (device, mut session) = transferred(SessionConfig {
        max_retries: 1,
        ..Default::default()
    });
    device.push_frame(control_frame(Opcode::Disconnect, Ack::Unset, 0));
    device.push_frame(control_frame(Opcode::Disconnect, Ack::Unset, 1));
    device.push_error(TransportError::Timeout);

    assert_eq!(
        session.disconnect(),
        Err(SessionError::RetryLimitExceeded {
            packet_number: 1,
            limit: 1
        })
    );
    assert_eq!(session.state(), States::Failed);
    assert_eq!(sent_disconnect_acks(&device), 2);
}

#[test]
fn test_disconnect_closed_link() {
    let (device, mut session) = transferred(SessionConfig::default());
    device.push_frame(control_frame(Opcode::Disconnect, Ack::Unset, 0));
    device.push_error(TransportError::Closed);

    assert_eq!(
        session.disconnect(),
        Err(SessionError::Transport(TransportError::Closed))
    );
    assert_eq!(session.state(), States::Failed);
}

#[test]
fn test_disconnect_requires_connection() {
    let (device, mut session) = setup(SessionConfig::default());
    assert_eq!(
        session.disconnect(),
        Err(SessionError::InvalidState(States::Idle))
    );
    assert!(device.sent_frames().is_empty());
}
