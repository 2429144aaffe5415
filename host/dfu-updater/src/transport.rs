// Licensed under the Apache-2.0 license

use core::time::Duration;
use std::io::{ErrorKind, Read};
use thiserror::Error;

// The updater talks to the device through two traits.
// DustTransport is the physical channel (a serial port, a pipe, a test double) and knows how
// to open a link to one device. DustSocket is the opened link: a blocking, half-duplex byte
// channel with exact-count reads.
//
//     Updater                            Device
//        |                                 |
//    DustSocket                        DustSocket
// --------------------------------------------------------
//                     DustTransport
// --------------------------------------------------------

pub trait DustTransport<S: DustSocket> {
    fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<S, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timed out waiting for data")]
    Timeout,
    #[error("link closed by peer")]
    Closed,
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },
    #[error("failed to open link: {0}")]
    Open(String),
    #[error("i/o error: {0}")]
    Io(String),
}

pub trait DustSocket {
    /// Writes all of `bytes` to the link.
    ///
    /// # Returns
    ///
    /// * `Result<(), TransportError>` - Returns `Ok(())` once every byte has been handed to the link.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Blocks until exactly `count` bytes have been read or the read timeout expires.
    ///
    /// A partial read is never returned: it surfaces as `TransportError::ShortRead`.
    fn receive(&mut self, count: usize) -> Result<Vec<u8>, TransportError>;

    /// Drops any bytes already received but not yet read.
    fn discard_input(&mut self) -> Result<(), TransportError>;

    /// Releases the link. Expected to always succeed.
    fn disconnect(&mut self);
}

/// Fills `buffer` from `reader`, mapping the ways a timed read can end to `TransportError`.
pub fn read_exact<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> Result<(), TransportError> {
    let mut received = 0;
    while received < buffer.len() {
        match reader.read(&mut buffer[received..]) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                if received == 0 {
                    return Err(TransportError::Timeout);
                }
                return Err(TransportError::ShortRead {
                    expected: buffer.len(),
                    received,
                });
            }
            Err(e) => return Err(TransportError::Io(e.to_string())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    enum Step {
        Data(Vec<u8>),
        Fail(ErrorKind),
    }

    struct ScriptedReader {
        steps: VecDeque<Step>,
    }

    impl ScriptedReader {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Step::Data(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                Some(Step::Fail(kind)) => Err(io::Error::from(kind)),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_read_exact_across_fragments() {
        let mut reader = ScriptedReader::new(vec![
            Step::Data(vec![1, 2]),
            Step::Fail(ErrorKind::Interrupted),
            Step::Data(vec![3]),
            Step::Data(vec![4, 5, 6]),
        ]);
        let mut buffer = [0u8; 6];
        read_exact(&mut reader, &mut buffer).unwrap();
        assert_eq!(buffer, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_read_exact_timeout_before_data() {
        let mut reader = ScriptedReader::new(vec![Step::Fail(ErrorKind::TimedOut)]);
        let mut buffer = [0u8; 4];
        assert_eq!(
            read_exact(&mut reader, &mut buffer),
            Err(TransportError::Timeout)
        );
    }

    #[test]
    fn test_read_exact_timeout_after_partial_data() {
        let mut reader = ScriptedReader::new(vec![
            Step::Data(vec![0xaa; 3]),
            Step::Fail(ErrorKind::TimedOut),
        ]);
        let mut buffer = [0u8; 38];
        assert_eq!(
            read_exact(&mut reader, &mut buffer),
            Err(TransportError::ShortRead {
                expected: 38,
                received: 3
            })
        );
    }

    #[test]
    fn test_read_exact_closed_and_io_errors() {
        let mut buffer = [0u8; 4];

        let mut reader = ScriptedReader::new(vec![]);
        assert_eq!(
            read_exact(&mut reader, &mut buffer),
            Err(TransportError::Closed)
        );

        let mut reader = ScriptedReader::new(vec![Step::Fail(ErrorKind::BrokenPipe)]);
        assert!(matches!(
            read_exact(&mut reader, &mut buffer),
            Err(TransportError::Io(_))
        ));
    }
}
