// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire-level commands and queries. Application-facing methods on
//! [`crate::Coordinator`] build one of these and hand it to the queue;
//! [`Command::encode`] is what the coordinator calls to turn the queued
//! entry into the wire frame it writes.

use crate::opcode;

/// EQ presets supported by the device.
#[derive(Copy, Clone, Debug, Eq, PartialEq, num_enum::TryFromPrimitive)]
#[cfg_attr(feature = "use_defmt", derive(defmt::Format))]
#[repr(u16)]
#[allow(missing_docs)]
pub enum EqProfile {
    Normal = 0x00,
    Pop = 0x01,
    Rock = 0x02,
    Jazz = 0x03,
    Classical = 0x04,
    Bass = 0x05,
}

impl EqProfile {
    /// Decode a `QueryEqProfile` response's raw value. The coordinator calls
    /// this to validate the value before forwarding it to the
    /// `query_response` hook; `Err` means the module sent a value outside
    /// the documented preset set.
    pub fn from_wire(value: u16) -> Result<Self, crate::Error> {
        Ok(Self::try_from(value)?)
    }
}

/// Every wire-level operation this driver knows how to build. Application
/// code normally reaches these through [`crate::Coordinator`]'s methods
/// rather than constructing them directly, but the variants are public so
/// callers on hardware this crate doesn't fully cover can enqueue one
/// directly through [`crate::Coordinator::enqueue_raw`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use_defmt", derive(defmt::Format))]
pub enum Command {
    Reset,
    SelectSource(crate::DeviceSet),
    SetVolume(u8),
    IncreaseVolume,
    DecreaseVolume,
    SetEq(EqProfile),
    LoopFile(u16),
    LoopFolder(u16),
    PlayFile(u16),
    PlayNext,
    PlayPrevious,
    /// Pre-combined `(folder << 8) | track` parameter.
    PlayFromFolder(u16),
    /// Pre-combined `(folder << 12) | track` parameter.
    PlayFromBigFolder(u16),
    PlayFromMp3(u16),
    LoopAll,
    RandomPlay,
    LoopCurrentFile,
    Stop,
    Pause,
    Unpause,
    InsertAdvert(u16),
    /// Pre-combined `(folder << 8) | track` parameter.
    InsertAdvertN(u16),
    StopAdvert,
    QueryStatus,
    QueryVolume,
    QueryEqProfile,
    QueryFirmwareVersion,
    QueryFolderCount,
    QueryPlaybackSequence,
    QueryUsbFileCount,
    QuerySdFileCount,
    QueryFlashFileCount,
    QueryCurrentUsbFile,
    QueryCurrentSdFile,
    QueryCurrentFlashFile,
    QueryFolderFileCount(u8),
    /// An arbitrary `(opcode, parameter)` pair, for hardware that needs an
    /// opcode this crate doesn't expose a constructor for: `SLEEP`/`WAKE`/
    /// DAC-enable and similar dialect-specific commands.
    Raw(u8, u16),
}

impl Command {
    pub fn id(&self) -> u8 {
        use Command::*;
        match self {
            Reset => opcode::RESET,
            SelectSource(_) => opcode::SELECT_SOURCE,
            SetVolume(_) => opcode::SET_VOLUME,
            IncreaseVolume => opcode::VOLUME_UP,
            DecreaseVolume => opcode::VOLUME_DOWN,
            SetEq(_) => opcode::SET_EQ,
            LoopFile(_) => opcode::LOOP_FILE,
            LoopFolder(_) => opcode::LOOP_FOLDER,
            PlayFile(_) => opcode::PLAY_FILE,
            PlayNext => opcode::PLAY_NEXT,
            PlayPrevious => opcode::PLAY_PREVIOUS,
            PlayFromFolder(_) => opcode::PLAY_FROM_FOLDER,
            PlayFromBigFolder(_) => opcode::PLAY_FROM_BIG_FOLDER,
            PlayFromMp3(_) => opcode::PLAY_FROM_MP3,
            LoopAll => opcode::LOOP_ALL,
            RandomPlay => opcode::RANDOM_PLAY,
            LoopCurrentFile => opcode::LOOP_CURRENT,
            Stop => opcode::STOP,
            Pause => opcode::PAUSE,
            Unpause => opcode::UNPAUSE,
            InsertAdvert(_) => opcode::INSERT_ADVERT,
            InsertAdvertN(_) => opcode::INSERT_ADVERT_N,
            StopAdvert => opcode::STOP_ADVERT,
            QueryStatus => opcode::STATUS,
            QueryVolume => opcode::VOLUME,
            QueryEqProfile => opcode::EQ_PROFILE,
            QueryFirmwareVersion => opcode::FIRMWARE_VERSION,
            QueryFolderCount => opcode::FOLDER_COUNT,
            QueryPlaybackSequence => opcode::PLAYBACK_SEQUENCE,
            QueryUsbFileCount => opcode::USB_FILE_COUNT,
            QuerySdFileCount => opcode::SD_FILE_COUNT,
            QueryFlashFileCount => opcode::FLASH_FILE_COUNT,
            QueryCurrentUsbFile => opcode::CURRENT_USB,
            QueryCurrentSdFile => opcode::CURRENT_SD,
            QueryCurrentFlashFile => opcode::CURRENT_FLASH,
            QueryFolderFileCount(_) => opcode::FOLDER_FILE_COUNT,
            Raw(id, _) => *id,
        }
    }

    pub fn param(&self) -> u16 {
        use Command::*;
        match self {
            SelectSource(d) => d.bits() as u16,
            SetVolume(v) => *v as u16,
            SetEq(e) => *e as u16,
            LoopFile(v) | PlayFile(v) | PlayFromFolder(v) | PlayFromBigFolder(v)
            | PlayFromMp3(v) | LoopFolder(v) | InsertAdvert(v)
            | InsertAdvertN(v) => *v,
            QueryFolderFileCount(folder) => *folder as u16,
            Raw(_, param) => *param,
            _ => 0,
        }
    }

    /// `true` unless this is a query: queries must be sent with feedback=0
    /// because the response itself serves as the acknowledgment.
    pub fn wants_feedback(&self) -> bool {
        !opcode::is_query_response(self.id())
    }

    /// Encode this command into the 10-byte wire frame.
    pub fn encode(&self) -> [u8; 10] {
        crate::frame::encode(self.id(), self.param(), self.wants_feedback())
    }
}

/// Combine a folder/track pair into the `PLAY_FROM_FOLDER` or
/// `PLAY_FROM_BIG_FOLDER` command. Returns `None` if neither encoding fits
/// (track >= 256 and folder >= 16).
pub fn play_track(folder: u16, track: u16) -> Option<Command> {
    if track < 256 {
        let param = (folder << 8) | track;
        Some(Command::PlayFromFolder(param))
    } else if folder < 16 {
        let param = (folder << 12) | (track & 0x0fff);
        Some(Command::PlayFromBigFolder(param))
    } else {
        None
    }
}

/// Build the right advert-insertion command: `folder == 0` delegates to the
/// single-argument form.
pub fn insert_advert(folder: u8, track: u8) -> Command {
    if folder == 0 {
        Command::InsertAdvert(track as u16)
    } else {
        let param = ((folder as u16) << 8) | track as u16;
        Command::InsertAdvertN(param)
    }
}
