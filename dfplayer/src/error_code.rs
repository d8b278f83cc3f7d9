// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol error codes carried in 0x40 replies, plus the
//! locally-synthesized timeout code that never appears on the wire.

/// A 16-bit error code, either reported by the module or synthesized by the
/// coordinator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use_defmt", derive(defmt::Format))]
pub enum ErrorCode {
    Unsupported,
    NoSources,
    Sleeping,
    SerialError,
    BadChecksum,
    FileOutOfRange,
    TrackNotFound,
    InsertionError,
    MediaError,
    EnteredSleep,
    /// Never carried on the wire: synthesized when a deadline expires.
    TimedOut,
    /// A value the module sent that isn't in the documented set.
    Unknown(u16),
}

impl ErrorCode {
    pub fn from_wire(value: u16) -> Self {
        match value {
            0x00 => Self::Unsupported,
            0x01 => Self::NoSources,
            0x02 => Self::Sleeping,
            0x03 => Self::SerialError,
            0x04 => Self::BadChecksum,
            0x05 => Self::FileOutOfRange,
            0x06 => Self::TrackNotFound,
            0x07 => Self::InsertionError,
            0x08 => Self::MediaError,
            0x0a => Self::EnteredSleep,
            other => Self::Unknown(other),
        }
    }

    pub const fn timed_out() -> Self {
        Self::TimedOut
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_codes_roundtrip() {
        assert_eq!(ErrorCode::from_wire(0x01), ErrorCode::NoSources);
        assert_eq!(ErrorCode::from_wire(0x0a), ErrorCode::EnteredSleep);
    }

    #[test]
    fn unknown_code_preserved() {
        assert_eq!(ErrorCode::from_wire(0x99), ErrorCode::Unknown(0x99));
    }
}
