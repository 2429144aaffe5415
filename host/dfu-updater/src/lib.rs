// Licensed under the Apache-2.0 license

//! Host side of the DUST firmware update protocol.
//!
//! [`segment`] prepares the image, [`session::DustSession`] drives the
//! CONNECT / DATA / DISCONNECT exchange over any [`transport::DustSocket`],
//! and [`serial`] provides the serial port implementation used by the binary.

pub mod config;
pub mod image;
pub mod segment;
pub mod serial;
pub mod session;
pub mod session_sm;
pub mod transport;
