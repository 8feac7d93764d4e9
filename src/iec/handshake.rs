//! # Mode-C Handshake Messages
//!
//! Builders and parsers for the three line-terminated messages of the
//! IEC 61107 mode-C connection setup: the request (`/?<address>!`), the
//! identification message (`/CCCBdevice-id`) and the acknowledge/option
//! message (ACK + protocol mode + baud symbol + access mode). Baud rates are
//! encoded as a single digit from a fixed symbol table, `'0'..='5'` for
//! 300..9600 baud.
//!
//! All parsers take the line with its CRLF terminator already stripped, the
//! way [`Session::receive_line`](crate::iec::session::Session::receive_line)
//! delivers it.

use crate::constants::{ACK, BAUDRATES, BAUDRATE_SYMBOLS, LINE_TERMINATOR};
use crate::error::Iec61107Error;

/// Identity advertised by a meter: company code, handshake baud, device id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub company: String,
    pub baud: u32,
    pub device: String,
}

/// Maps a baud rate to its mode-C symbol digit.
pub fn baud_to_symbol(baud: u32) -> Result<u8, Iec61107Error> {
    BAUDRATES
        .iter()
        .position(|&b| b == baud)
        .map(|i| BAUDRATE_SYMBOLS[i])
        .ok_or(Iec61107Error::UnsupportedBaud(baud))
}

/// Maps a mode-C symbol digit back to its baud rate.
pub fn symbol_to_baud(symbol: u8) -> Result<u32, Iec61107Error> {
    BAUDRATE_SYMBOLS
        .iter()
        .position(|&s| s == symbol)
        .map(|i| BAUDRATES[i])
        .ok_or(Iec61107Error::UnsupportedBaudSymbol(symbol as char))
}

/// Builds a request line, `/?<address>!` + CRLF.
///
/// The device address is 0 to 32 characters; an empty address requests
/// whichever meter is listening.
pub fn build_request(device_address: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(device_address.len() + 5);
    line.extend_from_slice(b"/?");
    line.extend_from_slice(device_address.as_bytes());
    line.push(b'!');
    line.extend_from_slice(LINE_TERMINATOR);
    line
}

/// Extracts the device address from a request line.
///
/// The `/?` marker may be preceded by stray bytes (a meter re-requesting a
/// session can leave the tail of the previous exchange on the wire), so the
/// marker is searched rather than anchored.
pub fn parse_request(line: &[u8]) -> Result<String, Iec61107Error> {
    let start = line
        .windows(2)
        .position(|w| w == b"/?")
        .filter(|_| line.last() == Some(&b'!'))
        .ok_or_else(|| malformed_request(line))?;
    Ok(String::from_utf8_lossy(&line[start + 2..line.len() - 1]).into_owned())
}

fn malformed_request(line: &[u8]) -> Iec61107Error {
    Iec61107Error::MalformedRequest(String::from_utf8_lossy(line).into_owned())
}

/// Builds an identification message, `/` + company + baud symbol + device id
/// + CRLF.
pub fn build_identity(company: &str, baud: u32, device: &str) -> Result<Vec<u8>, Iec61107Error> {
    if company.len() != 3 {
        return Err(Iec61107Error::InvalidIdentity(format!(
            "company code must be exactly 3 characters: {company:?}"
        )));
    }
    if device.len() > 16 {
        return Err(Iec61107Error::InvalidIdentity(format!(
            "device id longer than 16 characters: {device:?}"
        )));
    }
    let symbol = baud_to_symbol(baud)?;
    let mut line = Vec::with_capacity(device.len() + 7);
    line.push(b'/');
    line.extend_from_slice(company.as_bytes());
    line.push(symbol);
    line.extend_from_slice(device.as_bytes());
    line.extend_from_slice(LINE_TERMINATOR);
    Ok(line)
}

/// Parses an identification message into its company, baud and device parts.
pub fn parse_identity(line: &[u8]) -> Result<Identity, Iec61107Error> {
    if line.len() < 5 || line[0] != b'/' {
        return Err(Iec61107Error::MalformedIdentity(
            String::from_utf8_lossy(line).into_owned(),
        ));
    }
    let baud = symbol_to_baud(line[4])?;
    Ok(Identity {
        company: String::from_utf8_lossy(&line[1..4]).into_owned(),
        baud,
        device: String::from_utf8_lossy(&line[5..]).into_owned(),
    })
}

/// Builds an acknowledge/option message.
///
/// `v` selects the protocol procedure (`'0'` normal, `'1'` secondary) and `y`
/// the access mode (`'0'` data readout, `'1'` programming).
pub fn build_ack_options(baud: u32, v: char, y: char) -> Result<Vec<u8>, Iec61107Error> {
    let symbol = baud_to_symbol(baud)?;
    let mut line = Vec::with_capacity(6);
    line.push(ACK);
    line.push(v as u8);
    line.push(symbol);
    line.push(y as u8);
    line.extend_from_slice(LINE_TERMINATOR);
    Ok(line)
}

/// Parses an acknowledge/option message into `(baud, v, y)`.
pub fn parse_ack_options(line: &[u8]) -> Result<(u32, char, char), Iec61107Error> {
    if line.len() != 4 || line[0] != ACK {
        return Err(Iec61107Error::MalformedAckOptions(
            String::from_utf8_lossy(line).into_owned(),
        ));
    }
    let baud = symbol_to_baud(line[2])?;
    Ok((baud, line[1] as char, line[3] as char))
}
