//! # Serial Transport
//!
//! Blocking serial adapter for the session layer. IEC 61107 meters talk
//! 7 data bits, even parity, 1 stop bit; the line speed is switched on the
//! fly during the mode-C handshake.

use crate::error::Iec61107Error;
use crate::iec::session::Transport;
use serialport::{DataBits, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Configuration for the serial connection.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baudrate: u32,
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baudrate: crate::constants::ADVERTISED_BAUDRATE,
            timeout: Duration::from_secs(2),
        }
    }
}

/// A serial port opened with the 7E1 framing the meters expect.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Opens `path` with the default configuration (9600 baud, 2 s timeout).
    pub fn open(path: &str) -> Result<SerialTransport, Iec61107Error> {
        Self::open_with_config(path, SerialConfig::default())
    }

    /// Opens `path` with a custom configuration.
    pub fn open_with_config(
        path: &str,
        config: SerialConfig,
    ) -> Result<SerialTransport, Iec61107Error> {
        let port = serialport::new(path, config.baudrate)
            .data_bits(DataBits::Seven)
            .parity(Parity::Even)
            .stop_bits(StopBits::One)
            .timeout(config.timeout)
            .open()
            .map_err(|e| Iec61107Error::Serial(e.to_string()))?;
        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), Iec61107Error> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Iec61107Error> {
        // one byte at a time, the pace the meters themselves answer at;
        // a read timeout is "no data", not an error
        match self.port.read(&mut buf[..1]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn switch_baud(&mut self, baud: u32) -> Result<(), Iec61107Error> {
        if self.port.baud_rate().ok() == Some(baud) {
            return Ok(());
        }
        self.port
            .set_baud_rate(baud)
            .map_err(|e| Iec61107Error::Serial(e.to_string()))
    }
}
