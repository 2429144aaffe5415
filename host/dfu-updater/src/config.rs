// Licensed under the Apache-2.0 license

use core::time::Duration;
use dust_common::protocol::{AckFrequency, LengthCode};
use dust_common::DUST_CRC16_POLYNOMIAL;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_RETRIES: u32 = 8;
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;

/// Parameters of one update session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Offered in the handshake; also the go-back-N window.
    pub ack_frequency: AckFrequency,
    /// Payload size of DATA packets. Control packets always use 32 bytes.
    pub length_code: LengthCode,
    /// Consecutive rejected batches (or DISCONNECT-ACK NACKs) tolerated before giving up.
    pub max_retries: u32,
    pub connect_attempts: u32,
    pub polynomial: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ack_frequency: AckFrequency::After8,
            length_code: LengthCode::Bytes32,
            max_retries: DEFAULT_MAX_RETRIES,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            polynomial: DUST_CRC16_POLYNOMIAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
