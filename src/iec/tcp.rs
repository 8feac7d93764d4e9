//! # TCP Transport
//!
//! Blocking TCP adapter for serial links relayed over a socket (GSM modems,
//! terminal servers). The framing on the wire is identical to the serial
//! case; baud switching is acknowledged at the protocol level but is a no-op
//! here.

use crate::error::Iec61107Error;
use crate::iec::session::Transport;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connects without a read timeout; reads block until data or
    /// end-of-stream.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<TcpTransport, Iec61107Error> {
        let stream = TcpStream::connect(addr)?;
        Ok(TcpTransport { stream })
    }

    /// Connects with a read timeout; an elapsed timeout surfaces as an empty
    /// read, like end-of-stream.
    pub fn connect_with_timeout(
        addr: impl ToSocketAddrs,
        timeout: Duration,
    ) -> Result<TcpTransport, Iec61107Error> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(timeout))?;
        Ok(TcpTransport { stream })
    }

    /// Wraps an already accepted connection (simulator behind a listener).
    pub fn from_stream(stream: TcpStream) -> TcpTransport {
        TcpTransport { stream }
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), Iec61107Error> {
        self.stream.write_all(data)?;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Iec61107Error> {
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}
