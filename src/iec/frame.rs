//! # IEC 61107 Frame Codec
//!
//! This module decodes and encodes the four frame variants exchanged after the
//! mode-C handshake: acknowledge, negative-acknowledge, message and command
//! frames. Parsing is streaming: a buffer holding a well-formed prefix of a
//! frame yields `Ok(None)` so the caller can read more bytes and try again,
//! which supports byte-at-a-time serial reads as well as chunked socket reads.
//!
//! Frame integrity is protected by a block check character (BCC) computed over
//! every byte after the leading control byte up to and including the ETX/EOT
//! terminator. Two BCC variants exist: the ISO 1155 seven-bit modulo sum used
//! by plain IEC 61107 devices, and the XOR accumulator used by the NEVA MT3xx
//! family. The variant is selected per protocol profile when the codec is
//! constructed.

use crate::constants::{ACK, EOT, ETX, NAK, SOH, STX};
use crate::error::Iec61107Error;
use nom::bytes::streaming::take_till;
use nom::number::streaming::be_u8;
use nom::IResult;
use std::fmt;

/// Represents one frame of the command/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Positive acknowledge, a single control byte.
    Ack,
    /// Negative acknowledge, a single control byte.
    Nak,
    /// A data message. `more` is set when the frame was terminated by EOT,
    /// meaning further blocks follow.
    Message { data: Vec<u8>, more: bool },
    /// A tagged command. The tag is the two ASCII characters between SOH and
    /// STX, e.g. `R1` for a register read.
    Command {
        tag: [u8; 2],
        data: Vec<u8>,
        more: bool,
    },
}

impl Frame {
    /// A single-block message frame.
    pub fn message(data: impl Into<Vec<u8>>) -> Self {
        Frame::Message {
            data: data.into(),
            more: false,
        }
    }

    /// A single-block command frame.
    pub fn command(tag: [u8; 2], data: impl Into<Vec<u8>>) -> Self {
        Frame::Command {
            tag,
            data: data.into(),
            more: false,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Frame::Ack)
    }

    /// Payload bytes of a message or command frame, empty for ACK/NAK.
    pub fn data(&self) -> &[u8] {
        match self {
            Frame::Message { data, .. } | Frame::Command { data, .. } => data,
            _ => &[],
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Ack => write!(f, "ACK"),
            Frame::Nak => write!(f, "NAK"),
            Frame::Message { data, .. } => {
                write!(f, "Message: {}", String::from_utf8_lossy(data))
            }
            Frame::Command { tag, data, .. } => write!(
                f,
                "Command {}: {}",
                String::from_utf8_lossy(tag),
                String::from_utf8_lossy(data)
            ),
        }
    }
}

/// Block check character variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bcc {
    /// ISO 1155 block check: seven-bit modulo sum, one's complement plus one.
    Iso1155,
    /// XOR accumulator, the NEVA MT3xx vendor variant.
    Xor,
}

impl Bcc {
    /// Computes the block check character over `buf`.
    pub fn compute(self, buf: &[u8]) -> u8 {
        match self {
            Bcc::Iso1155 => {
                let sum = buf.iter().fold(0u8, |acc, &b| acc.wrapping_add(b) & 0x7F);
                (sum ^ 0xFF).wrapping_add(1)
            }
            Bcc::Xor => buf.iter().fold(0u8, |acc, &b| acc ^ b),
        }
    }
}

/// Stateless frame codec bound to one BCC variant.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    bcc: Bcc,
}

/// Frame body up to the terminator, the terminator byte and the BCC byte.
fn parse_body(input: &[u8]) -> IResult<&[u8], (&[u8], u8, u8)> {
    let (input, data) = take_till(|b| b == ETX || b == EOT)(input)?;
    let (input, terminator) = be_u8(input)?;
    let (input, bcc) = be_u8(input)?;
    Ok((input, (data, terminator, bcc)))
}

impl FrameCodec {
    pub fn new(bcc: Bcc) -> Self {
        FrameCodec { bcc }
    }

    pub fn bcc(&self) -> Bcc {
        self.bcc
    }

    /// Parses one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` while the buffer holds only a prefix of a frame
    /// (caller must read more bytes), or `Ok(Some((frame, consumed)))` once a
    /// complete frame is present. A leading byte that is none of SOH, STX,
    /// ACK or NAK fails with [`Iec61107Error::MalformedFrame`]; a BCC mismatch
    /// fails with [`Iec61107Error::ChecksumMismatch`] and invalidates the
    /// whole frame.
    pub fn parse(&self, buf: &[u8]) -> Result<Option<(Frame, usize)>, Iec61107Error> {
        let Some(&lead) = buf.first() else {
            return Ok(None);
        };
        match lead {
            ACK => return Ok(Some((Frame::Ack, 1))),
            NAK => return Ok(Some((Frame::Nak, 1))),
            SOH | STX => {}
            other => return Err(Iec61107Error::MalformedFrame(other)),
        }
        match parse_body(&buf[1..]) {
            Ok((rest, (body, terminator, bcc))) => {
                let consumed = buf.len() - rest.len();
                let calculated = self.bcc.compute(&buf[1..consumed - 1]);
                if calculated != bcc {
                    return Err(Iec61107Error::ChecksumMismatch {
                        expected: bcc,
                        calculated,
                    });
                }
                let more = terminator == EOT;
                let frame = if lead == SOH {
                    if body.len() < 3 || body[2] != STX {
                        return Err(Iec61107Error::MalformedFrame(lead));
                    }
                    Frame::Command {
                        tag: [body[0], body[1]],
                        data: body[3..].to_vec(),
                        more,
                    }
                } else {
                    Frame::Message {
                        data: body.to_vec(),
                        more,
                    }
                };
                Ok(Some((frame, consumed)))
            }
            Err(nom::Err::Incomplete(_)) => Ok(None),
            Err(_) => Err(Iec61107Error::MalformedFrame(lead)),
        }
    }

    /// Serializes a frame, the exact inverse of [`FrameCodec::parse`].
    pub fn pack(&self, frame: &Frame) -> Vec<u8> {
        match frame {
            Frame::Ack => vec![ACK],
            Frame::Nak => vec![NAK],
            Frame::Message { data, more } => {
                let mut buf = Vec::with_capacity(data.len() + 3);
                buf.push(STX);
                buf.extend_from_slice(data);
                buf.push(if *more { EOT } else { ETX });
                buf.push(self.bcc.compute(&buf[1..]));
                buf
            }
            Frame::Command { tag, data, more } => {
                let mut buf = Vec::with_capacity(data.len() + 6);
                buf.push(SOH);
                buf.extend_from_slice(tag);
                buf.push(STX);
                buf.extend_from_slice(data);
                buf.push(if *more { EOT } else { ETX });
                buf.push(self.bcc.compute(&buf[1..]));
                buf
            }
        }
    }
}
