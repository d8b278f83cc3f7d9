// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! The application-supplied callback sink. All methods default to doing
//! nothing, so implementers only override what they care about. Calls
//! happen synchronously on the [`crate::Coordinator::update`] stack;
//! re-entering `update` from inside a hook is forbidden.

use crate::{DeviceChange, DeviceSet, ErrorCode};

/// Which field a `query_response` call refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use_defmt", derive(defmt::Format))]
pub enum Parameter {
    Status,
    Volume,
    EqProfile,
    PlaybackSequence,
    FirmwareVersion,
    UsbFileCount,
    SdFileCount,
    FlashFileCount,
    CurrentUsbFile,
    CurrentSdFile,
    CurrentFlashFile,
    FolderFileCount,
    FolderCount,
}

impl Parameter {
    pub(crate) fn from_id(id: u8) -> Option<Self> {
        use crate::opcode::*;
        Some(match id {
            STATUS => Self::Status,
            VOLUME => Self::Volume,
            EQ_PROFILE => Self::EqProfile,
            PLAYBACK_SEQUENCE => Self::PlaybackSequence,
            FIRMWARE_VERSION => Self::FirmwareVersion,
            USB_FILE_COUNT => Self::UsbFileCount,
            SD_FILE_COUNT => Self::SdFileCount,
            FLASH_FILE_COUNT => Self::FlashFileCount,
            CURRENT_USB => Self::CurrentUsbFile,
            CURRENT_SD => Self::CurrentSdFile,
            CURRENT_FLASH => Self::CurrentFlashFile,
            FOLDER_FILE_COUNT => Self::FolderFileCount,
            FOLDER_COUNT => Self::FolderCount,
            _ => return None,
        })
    }
}

/// Optional callbacks the coordinator invokes as it classifies inbound
/// frames. Every method has an empty default implementation.
#[allow(unused_variables)]
pub trait Hooks {
    /// A protocol error was reported by the module, or a deadline expired
    /// (`ErrorCode::TimedOut`). `in_flight_id` is the opcode that was
    /// outstanding when the error occurred.
    fn error(&mut self, code: ErrorCode, in_flight_id: u8) {}

    /// The response to an application query arrived.
    fn query_response(&mut self, parameter: Parameter, value: u16) {}

    /// A storage device was inserted or removed.
    fn device_change(&mut self, device: DeviceSet, change: DeviceChange) {}

    /// A track finished playing on the given device.
    fn finished_file(&mut self, device: DeviceSet, index: u16) {}

    /// The module finished initializing (after power-up, after `reset()`,
    /// or because it reset itself unexpectedly mid-session). `devices` is
    /// the set discovered to be present.
    fn init_complete(&mut self, devices: DeviceSet) {}
}

/// A [`Hooks`] implementation that ignores every callback.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullHooks;

impl Hooks for NullHooks {}
