//! # Session State Machine
//!
//! Sequences the mode-C handshake, login, command/response loop and logout
//! over a byte-stream transport. The same machine serves both roles: a client
//! driving a real meter, and a simulator answering as a meter would. The
//! transport is abstracted behind the narrow [`Transport`] contract so serial
//! lines, TCP relays and in-memory test doubles are interchangeable.
//!
//! Everything here is blocking and synchronous. There are no internal
//! timeouts: a transport read timeout surfaces as an empty read, which is
//! treated exactly like end-of-stream.

use crate::constants::{
    CMD_LOGOUT, CMD_PASSWORD_REPLY, CMD_PASSWORD_REQUEST, CMD_READ_REGISTER, CMD_WRITE_REGISTER,
    LINE_TERMINATOR, LOGOUT_RESEND_PAUSE_MS, PASSWORD_PROMPT,
};
use crate::error::Iec61107Error;
use crate::iec::frame::{Bcc, Frame, FrameCodec};
use crate::iec::handshake;
use crate::iec::handshake::Identity;
use crate::obis::{self, ObisTable};
use bytes::BytesMut;
use log::{debug, info, trace, warn};
use std::thread;
use std::time::Duration;

/// Byte-stream transport consumed by the session.
///
/// Implementations block; timeout policy belongs to them, not to the session.
pub trait Transport {
    /// Sends the whole buffer.
    fn send(&mut self, data: &[u8]) -> Result<(), Iec61107Error>;

    /// Reads some bytes into `buf`. Returns 0 on end-of-stream or when the
    /// transport's own read timeout elapsed with no data; never an error for
    /// either.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Iec61107Error>;

    /// Switches the line speed. A no-op for transports without a baud rate
    /// (TCP carries the negotiation at the protocol level only).
    fn switch_baud(&mut self, baud: u32) -> Result<(), Iec61107Error> {
        let _ = baud;
        Ok(())
    }
}

/// Protocol profile: where the handshake starts and which BCC variant the
/// frame codec uses.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    pub initial_baud: u32,
    pub bcc: Bcc,
}

impl Profile {
    /// Plain IEC 61107 mode C: handshake starts at 300 baud, ISO 1155 BCC.
    pub const MODE_C: Profile = Profile {
        initial_baud: 300,
        bcc: Bcc::Iso1155,
    };

    /// NEVA MT3xx dialect: fixed 9600 baud, XOR BCC.
    pub const NEVA_MT3XX: Profile = Profile {
        initial_baud: 9600,
        bcc: Bcc::Xor,
    };
}

/// Lifecycle of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    SendingRequest,
    AwaitingRequest,
    IdentityExchanged,
    BaudSwitched,
    LoggingIn,
    Authenticated,
    Exchanging,
    LoggedOut,
}

/// Configuration of the simulator role.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Three-character company code advertised in the identity message.
    pub company: String,
    /// Device id advertised in the identity message, up to 16 characters.
    pub device: String,
    /// Password accepted at login.
    pub password: String,
    /// Own meter address, compared against the request when `check_address`.
    pub address: String,
    /// Reject requests addressed to a different meter.
    pub check_address: bool,
    /// Baud rate advertised in the identity message and expected back in the
    /// acknowledge/option message.
    pub advertised_baud: u32,
    /// Data pushed down the transport before the first request, e.g. the
    /// banner a GSM modem emits after dialing in.
    pub init_data: Option<Vec<u8>>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            company: "TPC".to_string(),
            device: "NEVAMT324.2303".to_string(),
            password: "00000000".to_string(),
            address: String::new(),
            check_address: false,
            advertised_baud: crate::constants::ADVERTISED_BAUDRATE,
            init_data: None,
        }
    }
}

/// One protocol session over one transport, strictly sequential.
pub struct Session<T: Transport> {
    transport: T,
    codec: FrameCodec,
    profile: Profile,
    state: SessionState,
    rx: BytesMut,
}

fn unexpected(expected: &'static str, got: &Frame) -> Iec61107Error {
    Iec61107Error::UnexpectedFrame {
        expected,
        got: got.to_string(),
    }
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, profile: Profile) -> Self {
        Session {
            transport,
            codec: FrameCodec::new(profile.bcc),
            profile,
            state: SessionState::Disconnected,
            rx: BytesMut::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn send_raw(&mut self, data: &[u8]) -> Result<(), Iec61107Error> {
        trace!("<< {}", hex::encode(data));
        self.transport.send(data)
    }

    /// Serializes and sends one frame.
    pub fn send_frame(&mut self, frame: &Frame) -> Result<(), Iec61107Error> {
        debug!("<< {frame}");
        let buf = self.codec.pack(frame);
        self.send_raw(&buf)
    }

    /// Reads until a CRLF-terminated line is assembled and returns it with
    /// the terminator stripped. Returns an empty buffer on end-of-stream.
    pub fn receive_line(&mut self) -> Result<Vec<u8>, Iec61107Error> {
        loop {
            if let Some(pos) = self.rx.windows(2).position(|w| w == LINE_TERMINATOR) {
                let line = self.rx.split_to(pos + LINE_TERMINATOR.len());
                return Ok(line[..pos].to_vec());
            }
            if !self.fill_rx()? {
                return Ok(Vec::new());
            }
        }
    }

    /// Accumulates bytes and feeds the frame codec until a complete frame is
    /// present. Returns `None` on end-of-stream.
    pub fn receive_frame(&mut self) -> Result<Option<Frame>, Iec61107Error> {
        loop {
            if !self.rx.is_empty() {
                if let Some((frame, used)) = self.codec.parse(&self.rx)? {
                    let _ = self.rx.split_to(used);
                    debug!(">> {frame}");
                    return Ok(Some(frame));
                }
            }
            if !self.fill_rx()? {
                return Ok(None);
            }
        }
    }

    fn fill_rx(&mut self) -> Result<bool, Iec61107Error> {
        let mut chunk = [0u8; 256];
        let n = self.transport.receive(&mut chunk)?;
        if n == 0 {
            return Ok(false);
        }
        trace!(">> {}", hex::encode(&chunk[..n]));
        self.rx.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    fn expect_frame(&mut self, expected: &'static str) -> Result<Frame, Iec61107Error> {
        self.receive_frame()?
            .ok_or_else(|| Iec61107Error::UnexpectedFrame {
                expected,
                got: "end of stream".to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Client role
    // ------------------------------------------------------------------

    /// Runs the client side of the mode-C handshake with the default modes:
    /// normal procedure (`v = '0'`), programming access (`y = '1'`).
    pub fn connect(&mut self, device_address: &str) -> Result<Identity, Iec61107Error> {
        self.connect_with_options(device_address, '0', '1')
    }

    /// Runs the client side of the mode-C handshake: request, identity,
    /// acknowledge/options, then switches the local line speed to whatever
    /// the meter advertised.
    pub fn connect_with_options(
        &mut self,
        device_address: &str,
        v: char,
        y: char,
    ) -> Result<Identity, Iec61107Error> {
        self.transport.switch_baud(self.profile.initial_baud)?;
        self.state = SessionState::SendingRequest;
        let request = handshake::build_request(device_address);
        self.send_raw(&request)?;

        let line = self.receive_line()?;
        let identity = handshake::parse_identity(&line)?;
        info!(
            "meter identified: company {}; baud {}; device {}",
            identity.company, identity.baud, identity.device
        );
        self.state = SessionState::IdentityExchanged;

        let ack = handshake::build_ack_options(identity.baud, v, y)?;
        self.send_raw(&ack)?;
        self.transport.switch_baud(identity.baud)?;
        self.state = SessionState::BaudSwitched;
        Ok(identity)
    }

    /// Answers the meter's password request. Anything but a plain acknowledge
    /// in return is a rejected login.
    pub fn login(&mut self, password: &str) -> Result<(), Iec61107Error> {
        self.state = SessionState::LoggingIn;
        let prompt = self.expect_frame("P0 password request")?;
        match &prompt {
            Frame::Command { tag, .. } if *tag == CMD_PASSWORD_REQUEST => {}
            other => return Err(unexpected("P0 password request", other)),
        }
        let reply = Frame::command(CMD_PASSWORD_REPLY, format!("({password})").into_bytes());
        self.send_frame(&reply)?;
        let answer = self.expect_frame("login acknowledge")?;
        if !answer.is_ack() {
            return Err(Iec61107Error::AccessDenied);
        }
        self.state = SessionState::Authenticated;
        info!("login ok");
        Ok(())
    }

    /// Reads one register and returns its value with the parentheses
    /// stripped.
    pub fn read_register(&mut self, code: &str) -> Result<String, Iec61107Error> {
        self.state = SessionState::Exchanging;
        let key = obis::normalize(code);
        let read = Frame::command(CMD_READ_REGISTER, format!("{key}()").into_bytes());
        self.send_frame(&read)?;
        let reply = self.expect_frame("register message")?;
        let Frame::Message { data, .. } = &reply else {
            return Err(unexpected("register message", &reply));
        };
        let text = String::from_utf8_lossy(data).into_owned();
        let value = text
            .strip_prefix(key.as_str())
            .and_then(|rest| rest.strip_prefix('('))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| Iec61107Error::MalformedRegister {
                obis: key.clone(),
                payload: text.clone(),
            })?;
        debug!("OBIS {key}: {value}");
        Ok(value.to_string())
    }

    /// Writes one register. Only a plain acknowledge counts as success.
    pub fn write_register(&mut self, code: &str, value: &str) -> Result<(), Iec61107Error> {
        self.state = SessionState::Exchanging;
        let key = obis::normalize(code);
        let write = Frame::command(CMD_WRITE_REGISTER, format!("{key}({value})").into_bytes());
        self.send_frame(&write)?;
        let reply = self.expect_frame("write acknowledge")?;
        if !reply.is_ack() {
            return Err(unexpected("write acknowledge", &reply));
        }
        debug!("OBIS {key} written");
        Ok(())
    }

    /// Sends the terminating command twice with a short pause between the
    /// sends; meters behind slow links tend to miss the first one. No reply
    /// is awaited.
    pub fn logout(&mut self) -> Result<(), Iec61107Error> {
        let terminate = Frame::command(CMD_LOGOUT, Vec::new());
        self.send_frame(&terminate)?;
        thread::sleep(Duration::from_millis(LOGOUT_RESEND_PAUSE_MS));
        self.send_frame(&terminate)?;
        self.state = SessionState::LoggedOut;
        info!("logged out");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Simulator role
    // ------------------------------------------------------------------

    /// Serves sessions until the transport reaches end-of-stream, answering
    /// register reads out of `registers`.
    pub fn serve(
        &mut self,
        config: &SimulatorConfig,
        registers: &ObisTable,
    ) -> Result<(), Iec61107Error> {
        if let Some(data) = &config.init_data {
            self.send_raw(data)?;
        }
        while self.serve_session(config, registers)? {}
        Ok(())
    }

    /// Serves one session. Returns `false` once the transport ended.
    fn serve_session(
        &mut self,
        config: &SimulatorConfig,
        registers: &ObisTable,
    ) -> Result<bool, Iec61107Error> {
        self.state = SessionState::AwaitingRequest;
        let line = self.receive_line()?;
        if line.is_empty() {
            self.state = SessionState::Disconnected;
            return Ok(false);
        }
        let requested = handshake::parse_request(&line)?;
        if config.check_address && requested != config.address {
            return Err(Iec61107Error::AddressMismatch {
                requested,
                configured: config.address.clone(),
            });
        }
        info!("session requested by address {requested:?}");

        let identity =
            handshake::build_identity(&config.company, config.advertised_baud, &config.device)?;
        self.send_raw(&identity)?;
        self.state = SessionState::IdentityExchanged;

        let line = self.receive_line()?;
        let (acknowledged, _v, _y) = handshake::parse_ack_options(&line)?;
        if acknowledged != config.advertised_baud {
            return Err(Iec61107Error::BaudrateNotAcknowledged {
                advertised: config.advertised_baud,
                acknowledged,
            });
        }
        self.state = SessionState::BaudSwitched;

        self.login_peer(config)?;
        self.command_loop(registers)
    }

    /// Drives the meter side of the login: prompt, password check, verdict.
    fn login_peer(&mut self, config: &SimulatorConfig) -> Result<(), Iec61107Error> {
        self.state = SessionState::LoggingIn;
        let prompt = Frame::command(CMD_PASSWORD_REQUEST, PASSWORD_PROMPT.as_bytes().to_vec());
        self.send_frame(&prompt)?;
        let reply = self.expect_frame("P1 password reply")?;
        match &reply {
            Frame::Command { tag, data, .. } if *tag == CMD_PASSWORD_REPLY => {
                if data != format!("({})", config.password).as_bytes() {
                    self.send_frame(&Frame::Nak)?;
                    return Err(Iec61107Error::AccessDenied);
                }
            }
            other => return Err(unexpected("P1 password reply", other)),
        }
        self.send_frame(&Frame::Ack)?;
        self.state = SessionState::Authenticated;
        info!("client logged in");
        Ok(())
    }

    /// Answers register reads until the client logs out. Returns `false` if
    /// the transport ended instead.
    fn command_loop(&mut self, registers: &ObisTable) -> Result<bool, Iec61107Error> {
        self.state = SessionState::Exchanging;
        loop {
            let Some(frame) = self.receive_frame()? else {
                warn!("transport ended inside the command loop");
                self.state = SessionState::Disconnected;
                return Ok(false);
            };
            match &frame {
                Frame::Command { tag, data, .. } if *tag == CMD_READ_REGISTER => {
                    let payload = String::from_utf8_lossy(data).into_owned();
                    let code = payload.strip_suffix("()").unwrap_or(&payload);
                    let value = registers.lookup(code)?;
                    info!("OBIS {code}: {value}");
                    self.send_frame(&Frame::message(format!("{code}({value})").into_bytes()))?;
                }
                Frame::Command { tag, .. } if *tag == CMD_LOGOUT => {
                    self.state = SessionState::LoggedOut;
                    info!("client logged out");
                    return Ok(true);
                }
                other => return Err(unexpected("R1 read or B0 logout", other)),
            }
        }
    }
}
