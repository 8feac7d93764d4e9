//! IEC 61107 Protocol Constants
//!
//! This module defines constants used in the IEC 61107 protocol implementation
//! and its NEVA MT3xx vendor dialect.

/// Start-of-header control byte, opens a command frame
pub const SOH: u8 = 0x01;

/// Start-of-text control byte, opens a message frame (and the payload of a command frame)
pub const STX: u8 = 0x02;

/// End-of-text control byte, terminates the last (or only) block of a frame
pub const ETX: u8 = 0x03;

/// End-of-transmission control byte, terminates a block when more blocks follow
pub const EOT: u8 = 0x04;

/// Acknowledge control byte
pub const ACK: u8 = 0x06;

/// Negative-acknowledge control byte
pub const NAK: u8 = 0x0F;

/// Line terminator for request, identity and acknowledge/option messages
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Baud rates supported by the mode-C handshake
pub const BAUDRATES: [u32; 6] = [300, 600, 1200, 2400, 4800, 9600];

/// Baud rate symbols, index-aligned with [`BAUDRATES`]
pub const BAUDRATE_SYMBOLS: &[u8; 6] = b"012345";

/// Baud rate a NEVA MT3xx meter advertises in its identity message
pub const ADVERTISED_BAUDRATE: u32 = 9600;

// ----------------------------------------------------------------------------
// Command tags (2 ASCII characters after SOH)
// ----------------------------------------------------------------------------

/// Password request, sent by the meter after the option negotiation
pub const CMD_PASSWORD_REQUEST: [u8; 2] = *b"P0";

/// Password reply carrying the password in parenthesized form
pub const CMD_PASSWORD_REPLY: [u8; 2] = *b"P1";

/// Read a register addressed by an OBIS code
pub const CMD_READ_REGISTER: [u8; 2] = *b"R1";

/// Write a register addressed by an OBIS code
pub const CMD_WRITE_REGISTER: [u8; 2] = *b"W1";

/// Terminate the session
pub const CMD_LOGOUT: [u8; 2] = *b"B0";

/// Payload of the meter's password request prompt
pub const PASSWORD_PROMPT: &str = "(00000000)";

/// Pause between the two logout sends, for meters that miss the first one
pub const LOGOUT_RESEND_PAUSE_MS: u64 = 500;

// ----------------------------------------------------------------------------
// Well-known OBIS register keys (normalized, separators stripped)
// ----------------------------------------------------------------------------

/// Current meter date, `YYMMDD`
pub const OBIS_DATE: &str = "000902FF";

/// Current meter time, `HHMMSS`
pub const OBIS_TIME: &str = "000901FF";

/// Year tariff schedule, 32 `MMDDTT` tokens
pub const OBIS_YEAR_SCHEDULE: &str = "0B0000FF";

/// Ordinary-day tariff schedule, 8 `HHMMTT` tokens
pub const OBIS_DAY_SCHEDULE: &str = "0A0164FF";

/// Per-day cumulative tariff energies, kWh; suffix is the days-ago offset in hex
pub const OBIS_DAY_ENERGIES_PREFIX: &str = "0F8080";

/// Per-day 48-slot half-hour active-energy profile, W; suffix is the days-ago offset in hex
pub const OBIS_HALF_HOURS_PREFIX: &str = "630100";

/// Per-month cumulative tariff energies, kWh; suffix is the months-ago offset in hex
pub const OBIS_MONTH_ENERGIES_PREFIX: &str = "0F0880";

/// Slot count of the year tariff schedule register
pub const YEAR_SCHEDULE_SLOTS: usize = 32;

/// Slot count of the day tariff schedule register
pub const DAY_SCHEDULE_SLOTS: usize = 8;

/// Half-hour slots in one day profile
pub const HALF_HOURS_PER_DAY: usize = 48;

/// Deepest day offset the profile registers accept
pub const MAX_PROFILE_DAYS_AGO: u8 = 127;

/// Deepest month offset the monthly energies register accepts
pub const MAX_MONTHS_AGO: u8 = 12;

/// Year-schedule tariff sentinel meaning "ordinary day, use the day table"
pub const TARIFF_ORDINARY_DAY: u8 = 0x7F;

/// Highest valid tariff bucket index
pub const MAX_TARIFF_INDEX: u8 = 4;

/// Attempts at re-reading a day whose boundary moved under the query
pub const DATE_ROLLOVER_RETRIES: usize = 3;
