//! The iec module contains the components responsible for the core IEC 61107
//! protocol implementation: frame parsing and packing, the mode-C handshake,
//! the session state machine and the transport adapters.

pub mod frame;
pub mod handshake;
pub mod serial;
pub mod serial_mock;
pub mod session;
pub mod tcp;

pub use frame::{Bcc, Frame, FrameCodec};
pub use handshake::Identity;
pub use serial::{SerialConfig, SerialTransport};
pub use session::{Profile, Session, SessionState, SimulatorConfig, Transport};
pub use tcp::TcpTransport;
