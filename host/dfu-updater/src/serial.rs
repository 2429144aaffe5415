// Licensed under the Apache-2.0 license

use crate::config::SerialConfig;
use crate::transport::{read_exact, DustSocket, DustTransport, TransportError};
use core::time::Duration;
use log::{debug, warn};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::Write;

/// Opens DUST links on serial ports, 8N1 with no flow control.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialTransport;

impl SerialTransport {
    pub fn open_with(&self, config: &SerialConfig) -> Result<SerialSocket, TransportError> {
        self.open(&config.port, config.baud_rate, config.timeout)
    }
}

impl DustTransport<SerialSocket> for SerialTransport {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<SerialSocket, TransportError> {
        debug!("Opening {} at {} baud, timeout {:?}", port, baud_rate, timeout);
        let handle = serialport::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .stop_bits(StopBits::One)
            .timeout(timeout)
            .open()
            .map_err(|e| TransportError::Open(format!("{}: {}", port, e)))?;
        Ok(SerialSocket {
            name: port.to_string(),
            port: Some(handle),
        })
    }
}

pub struct SerialSocket {
    name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialSocket {
    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl DustSocket for SerialSocket {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = self.port()?;
        port.write_all(bytes)
            .and_then(|_| port.flush())
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn receive(&mut self, count: usize) -> Result<Vec<u8>, TransportError> {
        let mut buffer = vec![0u8; count];
        read_exact(self.port()?, &mut buffer)?;
        Ok(buffer)
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.port()?
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn disconnect(&mut self) {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush() {
                warn!("Failed to flush {}: {}", self.name, e);
            }
            debug!("Closed {}", self.name);
        }
    }
}
