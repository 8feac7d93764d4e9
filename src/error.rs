//! # IEC 61107 Error Handling
//!
//! This module defines the Iec61107Error enum, which represents the different
//! error types that can occur in the iec61107-rs crate.

use chrono::NaiveDate;
use thiserror::Error;

/// Represents the different error types that can occur in the IEC 61107 crate.
#[derive(Debug, Error)]
pub enum Iec61107Error {
    /// Indicates an I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Indicates an error related to the serial port itself.
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Indicates a frame starting with none of the recognized control bytes.
    #[error("Malformed frame: SOH, STX, ACK or NAK expected, got 0x{0:02X}")]
    MalformedFrame(u8),

    /// Indicates a block check character mismatch.
    #[error("Invalid checksum: expected 0x{expected:02X}, calculated 0x{calculated:02X}")]
    ChecksumMismatch { expected: u8, calculated: u8 },

    /// Indicates a request line without the request marker or terminator.
    #[error("Malformed request line: {0:?}")]
    MalformedRequest(String),

    /// Indicates an identity message that does not follow the standard layout.
    #[error("Malformed identity message: {0:?}")]
    MalformedIdentity(String),

    /// Indicates identity fields that cannot be encoded.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Indicates an acknowledge/option message that does not follow the fixed layout.
    #[error("Malformed acknowledge/option message: {0:?}")]
    MalformedAckOptions(String),

    /// Indicates a baud rate outside the mode-C symbol table.
    #[error("Unsupported baud rate: {0}")]
    UnsupportedBaud(u32),

    /// Indicates a baud rate symbol outside the mode-C symbol table.
    #[error("Unsupported baud rate symbol: {0:?}")]
    UnsupportedBaudSymbol(char),

    /// Indicates the peer acknowledged a different baud rate than advertised.
    #[error("Baud rate {acknowledged} acknowledged, {advertised} advertised")]
    BaudrateNotAcknowledged { advertised: u32, acknowledged: u32 },

    /// Indicates a request addressed to another meter.
    #[error("Another meter address requested: {requested:?}; configured address: {configured:?}")]
    AddressMismatch {
        requested: String,
        configured: String,
    },

    /// Indicates a protocol sequence violation.
    #[error("Unexpected frame: {expected} expected, got {got}")]
    UnexpectedFrame {
        expected: &'static str,
        got: String,
    },

    /// Indicates a rejected login.
    #[error("Access denied")]
    AccessDenied,

    /// Indicates an OBIS hex range with begin greater than end.
    #[error("Invalid OBIS range: begin 0x{begin:02X} > end 0x{end:02X}")]
    InvalidRange { begin: u32, end: u32 },

    /// Indicates an OBIS address that cannot be parsed.
    #[error("Malformed OBIS address: {0:?}")]
    MalformedObis(String),

    /// Indicates a register read for which no entry is configured.
    #[error("OBIS not found: {0}")]
    ObisNotFound(String),

    /// Indicates a register payload that does not parse as expected.
    #[error("Malformed register {obis}: {payload:?}")]
    MalformedRegister { obis: String, payload: String },

    /// Indicates a tariff index outside the 1..=4 bucket range.
    #[error("Tariff index out of range (1..=4): {0}")]
    InvalidTariffIndex(u8),

    /// Indicates a profile request for a date the meter has not reached yet.
    #[error("Requested date {requested} is ahead of meter date {meter}")]
    FutureDate {
        requested: NaiveDate,
        meter: NaiveDate,
    },

    /// Indicates the meter date kept changing across the rollover retries.
    #[error("Meter date kept changing during the profile read")]
    DateUnstable,

    /// Indicates a day offset the profile registers cannot address.
    #[error("Days-ago value out of range (0..=127): {0}")]
    DaysAgoOutOfRange(i64),

    /// Indicates a month offset the monthly energies register cannot address.
    #[error("Months-ago value out of range (0..=12): {0}")]
    MonthsAgoOutOfRange(u8),
}
