// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! The coordinator's single state record: a flags bitmask plus the opcode
//! most recently dispatched.

use crate::device::DeviceSet;
use crate::opcode;
use bitflags::bitflags;

bitflags! {
    /// Checklist of events the coordinator is waiting for before it will
    /// dispatch the next queued command.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    #[cfg_attr(feature = "use_defmt", derive(defmt::Format))]
    pub struct StateFlags: u8 {
        const EXPECT_ACK      = 0x01;
        const EXPECT_ACK2     = 0x02;
        const EXPECT_RESPONSE = 0x04;
        const DELAY           = 0x08;
        const CHECK_USB       = 0x10;
        const CHECK_SDCARD    = 0x20;
        const CHECK_FLASH     = 0x40;
        const UNINITIALIZED   = 0x80;
    }
}

impl StateFlags {
    /// Map a device to its discovery "still need to probe this one" flag.
    pub fn check_flag_for(device: DeviceSet) -> Option<StateFlags> {
        match device {
            DeviceSet::USB => Some(StateFlags::CHECK_USB),
            DeviceSet::SDCARD => Some(StateFlags::CHECK_SDCARD),
            DeviceSet::FLASH => Some(StateFlags::CHECK_FLASH),
            _ => None,
        }
    }
}

/// The coordinator's in-flight bookkeeping: which opcode is outstanding,
/// what it's still waiting for, when it times out, and (during discovery)
/// which devices have been found present.
#[derive(Debug)]
pub struct State {
    pub sent: u8,
    pub flags: StateFlags,
    pub deadline: Option<u64>,
    pub available: DeviceSet,
}

impl Default for State {
    fn default() -> Self {
        Self {
            sent: opcode::NONE,
            flags: StateFlags::UNINITIALIZED,
            deadline: None,
            available: DeviceSet::empty(),
        }
    }
}

impl State {
    /// `flags == 0` iff the coordinator is willing to pop the queue.
    pub fn is_ready(&self) -> bool {
        self.flags.is_empty()
    }

    /// Arrived while powering up, before anything has been sent.
    pub fn is_powering_up(&self) -> bool {
        self.sent == opcode::NONE && self.flags == StateFlags::UNINITIALIZED
    }

    pub fn is_uninitialized(&self) -> bool {
        self.flags.contains(StateFlags::UNINITIALIZED)
    }

    /// Waiting on a spontaneous `INIT_COMPLETE` with nothing else in
    /// flight: true at start-up, and again right after a `RESET`'s ack.
    /// Both cases fall back to a `STATUS`-probe discovery on timeout.
    pub fn is_idle_uninitialized(&self) -> bool {
        self.flags == StateFlags::UNINITIALIZED
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_state_is_powering_up() {
        let state = State::default();
        assert!(state.is_powering_up());
        assert!(!state.is_ready());
    }

    #[test]
    fn ready_iff_flags_empty() {
        let mut state = State::default();
        state.flags = StateFlags::empty();
        assert!(state.is_ready());
        state.flags = StateFlags::DELAY;
        assert!(!state.is_ready());
    }
}
