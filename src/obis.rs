//! # OBIS Address Matching
//!
//! OBIS codes address meter registers. On the wire they travel in normalized
//! form (8 hex digits, group separators stripped); in configuration they may
//! carry `.`/`*` separators and an optional bracketed hex range over the
//! trailing group, e.g. `63.01.00*[00..7F]` to cover every day offset of the
//! half-hour profile register with one entry.
//!
//! Entries without a fixed value resolve dynamically at read time: the
//! well-known date and time registers answer with the current meter clock,
//! anything else answers with an empty string.

use crate::constants::{OBIS_DATE, OBIS_TIME};
use crate::error::Iec61107Error;
use chrono::Local;

/// Strips the `.` and `*` group separators from an OBIS code.
pub fn normalize(code: &str) -> String {
    code.chars().filter(|&c| c != '.' && c != '*').collect()
}

/// One configured register: normalized key, optional hex range over the
/// trailing group, optional fixed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObisEntry {
    key: String,
    range: Option<(u32, u32)>,
    value: Option<String>,
}

impl ObisEntry {
    /// Parses an OBIS address with an optional `[begin..end]` range suffix.
    pub fn parse(code: &str, value: Option<String>) -> Result<Self, Iec61107Error> {
        let Some(open) = code.find('[') else {
            return Ok(ObisEntry {
                key: normalize(code),
                range: None,
                value,
            });
        };
        let body = code[open..]
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| Iec61107Error::MalformedObis(code.to_string()))?;
        let (begin, end) = body
            .split_once("..")
            .ok_or_else(|| Iec61107Error::MalformedObis(code.to_string()))?;
        let begin = u32::from_str_radix(begin, 16)
            .map_err(|_| Iec61107Error::MalformedObis(code.to_string()))?;
        let end = u32::from_str_radix(end, 16)
            .map_err(|_| Iec61107Error::MalformedObis(code.to_string()))?;
        if begin > end {
            return Err(Iec61107Error::InvalidRange { begin, end });
        }
        Ok(ObisEntry {
            key: normalize(&code[..open]),
            range: Some((begin, end)),
            value,
        })
    }

    /// Parses a simulator CLI argument of the form `CODE` or `CODE:VALUE`.
    pub fn parse_arg(arg: &str) -> Result<Self, Iec61107Error> {
        match arg.split_once(':') {
            Some((code, value)) => Self::parse(code, Some(value.to_string())),
            None => Self::parse(arg, None),
        }
    }

    /// Whether this entry covers the normalized key `key`.
    ///
    /// Without a range the comparison is exact. With a range, the prefix
    /// before the ranged group must match literally and the remaining hex
    /// digits must fall inside the range.
    pub fn matches(&self, key: &str) -> bool {
        let Some((begin, end)) = self.range else {
            return self.key == key;
        };
        let Some(suffix) = key.strip_prefix(self.key.as_str()) else {
            return false;
        };
        match u32::from_str_radix(suffix, 16) {
            Ok(group) => begin <= group && group <= end,
            Err(_) => false,
        }
    }

    /// Resolves the entry to its value.
    ///
    /// A fixed value wins; otherwise the date and time registers answer with
    /// the current clock, and any other valueless entry answers empty.
    pub fn resolve(&self) -> String {
        if let Some(value) = &self.value {
            return value.clone();
        }
        match self.key.as_str() {
            OBIS_DATE => Local::now().format("%y%m%d").to_string(),
            OBIS_TIME => Local::now().format("%H%M%S").to_string(),
            _ => String::new(),
        }
    }
}

/// The simulator's register list, built once at startup and immutable after.
#[derive(Debug, Clone, Default)]
pub struct ObisTable {
    entries: Vec<ObisEntry>,
}

impl ObisTable {
    pub fn new() -> Self {
        ObisTable::default()
    }

    /// A table answering only the dynamic date and time registers.
    pub fn with_clock() -> Self {
        let mut table = ObisTable::new();
        // the keys are already normalized, parse cannot fail on them
        for key in [OBIS_DATE, OBIS_TIME] {
            if let Ok(entry) = ObisEntry::parse(key, None) {
                table.push(entry);
            }
        }
        table
    }

    pub fn push(&mut self, entry: ObisEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ObisEntry] {
        &self.entries
    }

    /// Looks up a register by OBIS code, first matching entry wins.
    ///
    /// A miss is [`Iec61107Error::ObisNotFound`]: the simulator was asked for
    /// a register it was never configured with.
    pub fn lookup(&self, code: &str) -> Result<String, Iec61107Error> {
        let key = normalize(code);
        self.entries
            .iter()
            .find(|entry| entry.matches(&key))
            .map(ObisEntry::resolve)
            .ok_or(Iec61107Error::ObisNotFound(key))
    }
}
