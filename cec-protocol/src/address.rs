//! Logical and physical CEC addresses

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, Result};

/// A CEC logical address: one hex digit, `0`..=`F`.
///
/// `F` doubles as the broadcast destination in transmit frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalAddress(u8);

impl LogicalAddress {
    pub const BROADCAST: LogicalAddress = LogicalAddress(0xF);

    /// Create from a numeric value; `None` when above `0xF`.
    pub fn new(value: u8) -> Option<Self> {
        (value <= 0xF).then_some(Self(value))
    }

    /// Parse a single hex digit, either case.
    pub fn from_char(c: char) -> Option<Self> {
        c.to_digit(16).map(|d| Self(d as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Uppercase hex digit as it appears on the wire.
    pub fn as_char(self) -> char {
        char::from_digit(u32::from(self.0), 16)
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('F')
    }
}

impl FromStr for LogicalAddress {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Self::from_char(c).ok_or_else(|| ProtocolError::InvalidLogicalAddress(s.to_string()))
            }
            _ => Err(ProtocolError::InvalidLogicalAddress(s.to_string())),
        }
    }
}

impl fmt::Display for LogicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl Serialize for LogicalAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A CEC physical address in dotted form, e.g. `1.0.0.0`.
///
/// The default, `0.0.0.0`, is the root of the HDMI tree (the TV).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PhysicalAddress([u8; 4]);

impl PhysicalAddress {
    pub fn new(nibbles: [u8; 4]) -> Option<Self> {
        nibbles.iter().all(|n| *n <= 0xF).then_some(Self(nibbles))
    }

    pub fn nibbles(&self) -> [u8; 4] {
        self.0
    }

    /// Two-byte frame operand, `1.0.0.0` → `10:00`.
    pub fn as_frame(&self) -> String {
        let [a, b, c, d] = self.0;
        format!("{a:X}{b:X}:{c:X}{d:X}")
    }
}

impl FromStr for PhysicalAddress {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ProtocolError::InvalidPhysicalAddress(s.to_string());
        let mut nibbles = [0u8; 4];
        let mut parts = s.trim().split('.');
        for slot in nibbles.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            let mut chars = part.chars();
            *slot = match (chars.next(), chars.next()) {
                (Some(c), None) => c.to_digit(16).ok_or_else(invalid)? as u8,
                _ => return Err(invalid()),
            };
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(nibbles))
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a:x}.{b:x}.{c:x}.{d:x}")
    }
}

impl Serialize for PhysicalAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
