//! Unit tests for the mode-C handshake messages: request, identification and
//! acknowledge/option lines, plus the baud symbol table.

use iec61107_rs::constants::BAUDRATES;
use iec61107_rs::iec::handshake::{
    baud_to_symbol, build_ack_options, build_identity, build_request, parse_ack_options,
    parse_identity, parse_request, symbol_to_baud,
};
use iec61107_rs::{Iec61107Error, Identity};
use std::collections::HashSet;

/// Tests the wire layout of request lines with and without an address.
#[test]
fn test_build_request() {
    assert_eq!(build_request(""), b"/?!\r\n");
    assert_eq!(build_request("9144"), b"/?9144!\r\n");
}

/// Tests that the device address is extracted from a request line.
#[test]
fn test_parse_request() {
    assert_eq!(parse_request(b"/?!").unwrap(), "");
    assert_eq!(parse_request(b"/?9144!").unwrap(), "9144");
}

/// Tests that stray bytes before the request marker are tolerated; a meter
/// reconnecting can leave the tail of the previous exchange on the wire.
#[test]
fn test_parse_request_with_leading_garbage() {
    assert_eq!(parse_request(b"\x01B0\x02\x03\x73/?9144!").unwrap(), "9144");
}

/// Tests that request lines without the marker or the bang are rejected.
#[test]
fn test_parse_request_malformed() {
    for line in [&b"/9144!"[..], b"/?9144", b"", b"hello"] {
        assert!(matches!(
            parse_request(line),
            Err(Iec61107Error::MalformedRequest(_))
        ));
    }
}

/// Tests the identity round-trip vector from the real meter.
#[test]
fn test_identity_roundtrip() {
    let line = build_identity("TPC", 9600, "NEVAMT324.2303").unwrap();
    assert_eq!(line, b"/TPC5NEVAMT324.2303\r\n");
    let identity = parse_identity(&line[..line.len() - 2]).unwrap();
    assert_eq!(
        identity,
        Identity {
            company: "TPC".to_string(),
            baud: 9600,
            device: "NEVAMT324.2303".to_string(),
        }
    );
}

/// Tests that an identity with an empty device id still parses.
#[test]
fn test_identity_empty_device() {
    let line = build_identity("ABC", 300, "").unwrap();
    assert_eq!(line, b"/ABC0\r\n");
    let identity = parse_identity(b"/ABC0").unwrap();
    assert_eq!(identity.baud, 300);
    assert_eq!(identity.device, "");
}

/// Tests the identity field validation rules.
#[test]
fn test_build_identity_validation() {
    assert!(matches!(
        build_identity("TP", 9600, "X"),
        Err(Iec61107Error::InvalidIdentity(_))
    ));
    assert!(matches!(
        build_identity("TPCX", 9600, "X"),
        Err(Iec61107Error::InvalidIdentity(_))
    ));
    assert!(matches!(
        build_identity("TPC", 9600, "01234567890123456"),
        Err(Iec61107Error::InvalidIdentity(_))
    ));
    assert!(matches!(
        build_identity("TPC", 1234, "X"),
        Err(Iec61107Error::UnsupportedBaud(1234))
    ));
}

/// Tests the identity parse failure modes.
#[test]
fn test_parse_identity_malformed() {
    assert!(matches!(
        parse_identity(b""),
        Err(Iec61107Error::MalformedIdentity(_))
    ));
    assert!(matches!(
        parse_identity(b"/TPC"),
        Err(Iec61107Error::MalformedIdentity(_))
    ));
    assert!(matches!(
        parse_identity(b"TPC5XXXXX"),
        Err(Iec61107Error::MalformedIdentity(_))
    ));
    assert!(matches!(
        parse_identity(b"/TPC6XXXXX"),
        Err(Iec61107Error::UnsupportedBaudSymbol('6'))
    ));
}

/// Tests the acknowledge/option message round-trip.
#[test]
fn test_ack_options_roundtrip() {
    let line = build_ack_options(9600, '0', '1').unwrap();
    assert_eq!(line, [0x06, b'0', b'5', b'1', 0x0D, 0x0A]);
    let (baud, v, y) = parse_ack_options(&line[..4]).unwrap();
    assert_eq!((baud, v, y), (9600, '0', '1'));
}

/// Tests the acknowledge/option parse failure modes.
#[test]
fn test_parse_ack_options_malformed() {
    assert!(matches!(
        parse_ack_options(b""),
        Err(Iec61107Error::MalformedAckOptions(_))
    ));
    assert!(matches!(
        parse_ack_options(&[0x06, b'0', b'5']),
        Err(Iec61107Error::MalformedAckOptions(_))
    ));
    assert!(matches!(
        parse_ack_options(&[b'X', b'0', b'5', b'1']),
        Err(Iec61107Error::MalformedAckOptions(_))
    ));
    assert!(matches!(
        parse_ack_options(&[0x06, b'0', b'9', b'1']),
        Err(Iec61107Error::UnsupportedBaudSymbol('9'))
    ));
}

/// Tests that the baud symbol table is a bijection over the six rates.
#[test]
fn test_baud_symbol_bijection() {
    let mut symbols = HashSet::new();
    for baud in BAUDRATES {
        let symbol = baud_to_symbol(baud).unwrap();
        assert!(symbols.insert(symbol), "duplicate symbol for {baud}");
        assert!(symbol.is_ascii_digit());
        assert_eq!(symbol_to_baud(symbol).unwrap(), baud);
    }
    assert_eq!(symbols.len(), 6);
    assert!(matches!(
        baud_to_symbol(19200),
        Err(Iec61107Error::UnsupportedBaud(19200))
    ));
}
