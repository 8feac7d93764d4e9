//! # iec61107-rs - A Rust Crate for IEC 61107 Meter Communication
//!
//! The iec61107-rs crate implements the vendor dialect of the IEC 61107
//! (МЭК 61107) serial metering protocol spoken by NEVA MT3xx electricity
//! meters: byte-level framing with block-check validation, the mode-C
//! connect/login/exchange/logout session, OBIS register addressing with
//! hex-range wildcards, and the half-hour tariff-profile aggregation that
//! turns raw registers into billing-ready energy buckets.
//!
//! ## Features
//!
//! - Interrogate a meter over a serial line or a TCP-relayed serial link
//! - Simulate a meter, answering requests the way the real hardware does
//! - Parse and pack the acknowledge, negative-acknowledge, message and
//!   command frames, with both the ISO 1155 and the XOR checksum variants
//! - Match OBIS addresses, including hex-range wildcards and dynamic
//!   date/time registers
//! - Aggregate half-hour load profiles into per-tariff energies, surviving
//!   meter-side midnight rollovers
//!
//! ## Usage
//!
//! ```no_run
//! use iec61107_rs::connect_serial;
//!
//! # fn main() -> Result<(), iec61107_rs::Iec61107Error> {
//! let mut session = connect_serial("/dev/ttyUSB0")?;
//! session.connect("")?;
//! session.login("00000000")?;
//! let date = session.read_register("00.09.02*FF")?;
//! println!("meter date: {date}");
//! session.logout()?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod error;
pub mod iec;
pub mod logging;
pub mod obis;
pub mod tariff;

pub use crate::error::Iec61107Error;
pub use crate::logging::{init_logger, init_logger_with_verbosity};

// Core protocol types
pub use iec::frame::{Bcc, Frame, FrameCodec};
pub use iec::handshake::Identity;
pub use iec::serial::{SerialConfig, SerialTransport};
pub use iec::session::{Profile, Session, SessionState, SimulatorConfig, Transport};
pub use iec::tcp::TcpTransport;

// Register addressing and profile aggregation
pub use obis::{ObisEntry, ObisTable};
pub use tariff::{HalfHourRecord, RegisterReader, TariffProfile};

use std::time::Duration;

/// Opens a serial session with the NEVA MT3xx profile and default port
/// settings (9600 baud, 7E1, 2 s timeout).
///
/// # Arguments
/// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM1" on Windows)
pub fn connect_serial(port: &str) -> Result<Session<SerialTransport>, Iec61107Error> {
    let transport = SerialTransport::open(port)?;
    Ok(Session::new(transport, Profile::NEVA_MT3XX))
}

/// Opens a TCP session with the NEVA MT3xx profile against a serial link
/// relayed over a socket.
pub fn connect_tcp(addr: &str, timeout: Duration) -> Result<Session<TcpTransport>, Iec61107Error> {
    let transport = TcpTransport::connect_with_timeout(addr, timeout)?;
    Ok(Session::new(transport, Profile::NEVA_MT3XX))
}
