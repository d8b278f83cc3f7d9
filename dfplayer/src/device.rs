// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! Storage device flags and the probe order used by device discovery.

use bitflags::bitflags;

bitflags! {
    /// A single storage device, or a bitwise-or'd set of them. The module's
    /// wire protocol represents both the same way, as a byte built from
    /// these bit values, so this one type covers both a selected source and
    /// a discovered set.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    #[cfg_attr(feature = "use_defmt", derive(defmt::Format))]
    pub struct DeviceSet: u8 {
        const USB    = 0x01;
        const SDCARD = 0x02;
        const FLASH  = 0x04;
        const AUX    = 0x08;
        const SLEEP  = 0x10;
    }
}

/// The devices probed during discovery, and the order they are probed in.
pub const PROBE_ORDER: [DeviceSet; 3] =
    [DeviceSet::USB, DeviceSet::SDCARD, DeviceSet::FLASH];

/// Which direction a `device_change` hook call refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use_defmt", derive(defmt::Format))]
pub enum DeviceChange {
    Removed,
    Inserted,
}
