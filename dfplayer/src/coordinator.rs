// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! The state machine that turns a byte stream into hook callbacks and an
//! application's method calls into outbound frames. [`Coordinator::update`]
//! is the only place bytes are read or written; every other method just
//! queues work for the next call to it.

use crate::command::{self, Command, EqProfile};
use crate::device::{DeviceChange, DeviceSet, PROBE_ORDER};
use crate::error::Error;
use crate::error_code::ErrorCode;
use crate::frame::{self, Decoded, Decoder};
use crate::hooks::{Hooks, Parameter};
use crate::opcode;
use crate::queue::{CommandQueue, QueueEntry};
use crate::state::{State, StateFlags};
use crate::transport::Transport;

const ACK_TIMEOUT_MS: u64 = 30;
const RESPONSE_TIMEOUT_MS: u64 = 100;
const RESET_TIMEOUT_MS: u64 = 3000;
const DELAY_TIMEOUT_MS: u64 = 300;
const POWER_UP_TIMEOUT_MS: u64 = 3000;

/// Drives the wire protocol end to end: frame codec, command queue, and the
/// ack/response/timeout bookkeeping in between. Generic over the queue
/// capacity; `4` is a comfortable default for interactive use and is what
/// `Default` uses.
pub struct Coordinator<const CAP: usize = 4> {
    decoder: Decoder,
    queue: CommandQueue<CAP>,
    state: State,
    /// Devices still to be probed during discovery. Also accumulates
    /// devices reported inserted outside of discovery, per
    /// `handle_async_notification`; nothing acts on those entries unless
    /// discovery is re-entered.
    to_check: DeviceSet,
    /// The last `(device, index)` finished-file notification delivered to a
    /// hook, so an immediate wire-level repeat (the module is known to send
    /// one) is suppressed exactly once.
    last_finish: Option<(DeviceSet, u16)>,
}

impl<const CAP: usize> Default for Coordinator<CAP> {
    fn default() -> Self {
        Self {
            decoder: Decoder::new(),
            queue: CommandQueue::default(),
            state: State::default(),
            to_check: DeviceSet::empty(),
            last_finish: None,
        }
    }
}

impl<const CAP: usize> Coordinator<CAP> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the command queue still has room.
    pub fn has_capacity(&self) -> bool {
        !self.queue.is_full()
    }

    // ---- operations -----------------------------------------------------

    /// Purge the queue and force a `RESET` out on the next `update` call,
    /// regardless of whatever was previously in flight. The only operation
    /// that reorders anything.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.state.flags = StateFlags::empty();
        self.state.deadline = None;
        self.to_check = DeviceSet::empty();
        // Capacity is always >= 2 and the queue was just cleared, so this
        // cannot fail.
        let _ = self.queue.push_back(QueueEntry {
            command: Command::Reset,
            flags: StateFlags::EXPECT_ACK | StateFlags::UNINITIALIZED,
        });
    }

    pub fn select_source(&mut self, device: DeviceSet) -> Result<(), Error> {
        self.enqueue(
            Command::SelectSource(device),
            StateFlags::EXPECT_ACK | StateFlags::DELAY,
        )
    }

    pub fn set_volume(&mut self, volume: u8) -> Result<(), Error> {
        self.enqueue(Command::SetVolume(volume.min(30)), StateFlags::EXPECT_ACK)
    }

    pub fn increase_volume(&mut self) -> Result<(), Error> {
        self.enqueue(Command::IncreaseVolume, StateFlags::EXPECT_ACK)
    }

    pub fn decrease_volume(&mut self) -> Result<(), Error> {
        self.enqueue(Command::DecreaseVolume, StateFlags::EXPECT_ACK)
    }

    pub fn set_eq(&mut self, profile: EqProfile) -> Result<(), Error> {
        self.enqueue(Command::SetEq(profile), StateFlags::EXPECT_ACK)
    }

    pub fn loop_file(&mut self, index: u16) -> Result<(), Error> {
        self.enqueue(Command::LoopFile(index), StateFlags::EXPECT_ACK)
    }

    /// Loops every file in a folder. Dispatched with the double-ack
    /// template: the module answers this one with two `ACK`s.
    pub fn loop_folder(&mut self, folder: u16) -> Result<(), Error> {
        self.enqueue(
            Command::LoopFolder(folder),
            StateFlags::EXPECT_ACK | StateFlags::EXPECT_ACK2,
        )
    }

    pub fn play_file(&mut self, index: u16) -> Result<(), Error> {
        self.enqueue(Command::PlayFile(index), StateFlags::EXPECT_ACK)
    }

    pub fn play_next(&mut self) -> Result<(), Error> {
        self.enqueue(Command::PlayNext, StateFlags::EXPECT_ACK)
    }

    pub fn play_previous(&mut self) -> Result<(), Error> {
        self.enqueue(Command::PlayPrevious, StateFlags::EXPECT_ACK)
    }

    /// Plays `track` from `folder`, picking whichever of the two
    /// folder-addressed opcodes the pair fits. Rejected silently (no queue
    /// entry, no error) if neither encoding can represent it.
    pub fn play_track(&mut self, folder: u16, track: u16) -> Result<(), Error> {
        match command::play_track(folder, track) {
            Some(cmd) => self.enqueue(cmd, StateFlags::EXPECT_ACK),
            None => Ok(()),
        }
    }

    pub fn play_track_from_mp3(&mut self, track: u16) -> Result<(), Error> {
        self.enqueue(Command::PlayFromMp3(track), StateFlags::EXPECT_ACK)
    }

    pub fn loop_all_files(&mut self) -> Result<(), Error> {
        self.enqueue(Command::LoopAll, StateFlags::EXPECT_ACK)
    }

    pub fn play_files_in_random_order(&mut self) -> Result<(), Error> {
        self.enqueue(Command::RandomPlay, StateFlags::EXPECT_ACK)
    }

    pub fn loop_current_file(&mut self) -> Result<(), Error> {
        self.enqueue(Command::LoopCurrentFile, StateFlags::EXPECT_ACK)
    }

    pub fn stop(&mut self) -> Result<(), Error> {
        self.enqueue(Command::Stop, StateFlags::EXPECT_ACK)
    }

    pub fn pause(&mut self) -> Result<(), Error> {
        self.enqueue(Command::Pause, StateFlags::EXPECT_ACK)
    }

    pub fn unpause(&mut self) -> Result<(), Error> {
        self.enqueue(Command::Unpause, StateFlags::EXPECT_ACK)
    }

    /// Inserts an advertisement track to play over the current playback.
    pub fn insert_advert(&mut self, track: u16) -> Result<(), Error> {
        self.enqueue(Command::InsertAdvert(track), StateFlags::EXPECT_ACK)
    }

    /// As [`Coordinator::insert_advert`], but addresses a specific folder.
    /// `folder == 0` delegates to the single-argument form.
    pub fn insert_advert_from_folder(
        &mut self,
        folder: u8,
        track: u8,
    ) -> Result<(), Error> {
        self.enqueue(command::insert_advert(folder, track), StateFlags::EXPECT_ACK)
    }

    pub fn stop_advert(&mut self) -> Result<(), Error> {
        self.enqueue(Command::StopAdvert, StateFlags::EXPECT_ACK)
    }

    pub fn query_status(&mut self) -> Result<(), Error> {
        self.enqueue(Command::QueryStatus, StateFlags::EXPECT_RESPONSE)
    }

    pub fn query_volume(&mut self) -> Result<(), Error> {
        self.enqueue(Command::QueryVolume, StateFlags::EXPECT_RESPONSE)
    }

    pub fn query_eq_profile(&mut self) -> Result<(), Error> {
        self.enqueue(Command::QueryEqProfile, StateFlags::EXPECT_RESPONSE)
    }

    pub fn query_firmware_version(&mut self) -> Result<(), Error> {
        self.enqueue(Command::QueryFirmwareVersion, StateFlags::EXPECT_RESPONSE)
    }

    pub fn query_folder_count(&mut self) -> Result<(), Error> {
        self.enqueue(Command::QueryFolderCount, StateFlags::EXPECT_RESPONSE)
    }

    pub fn query_playback_sequence(&mut self) -> Result<(), Error> {
        self.enqueue(Command::QueryPlaybackSequence, StateFlags::EXPECT_RESPONSE)
    }

    /// Queries the file count on `device`. A no-op if `device` isn't
    /// exactly one of USB/SD/flash.
    pub fn query_file_count(&mut self, device: DeviceSet) -> Result<(), Error> {
        let Some(cmd) = (match device {
            DeviceSet::USB => Some(Command::QueryUsbFileCount),
            DeviceSet::SDCARD => Some(Command::QuerySdFileCount),
            DeviceSet::FLASH => Some(Command::QueryFlashFileCount),
            _ => None,
        }) else {
            return Ok(());
        };
        self.enqueue(cmd, StateFlags::EXPECT_RESPONSE)
    }

    /// Queries the currently-playing file index on `device`. A no-op if
    /// `device` isn't exactly one of USB/SD/flash.
    pub fn query_current_file(&mut self, device: DeviceSet) -> Result<(), Error> {
        let Some(cmd) = (match device {
            DeviceSet::USB => Some(Command::QueryCurrentUsbFile),
            DeviceSet::SDCARD => Some(Command::QueryCurrentSdFile),
            DeviceSet::FLASH => Some(Command::QueryCurrentFlashFile),
            _ => None,
        }) else {
            return Ok(());
        };
        self.enqueue(cmd, StateFlags::EXPECT_RESPONSE)
    }

    pub fn query_folder_file_count(&mut self, folder: u8) -> Result<(), Error> {
        self.enqueue(
            Command::QueryFolderFileCount(folder),
            StateFlags::EXPECT_RESPONSE,
        )
    }

    /// Enqueues an arbitrary `(opcode, param)` pair for hardware that needs
    /// an opcode this crate doesn't name a constructor for. `flags` should
    /// normally be just `EXPECT_ACK` or just `EXPECT_RESPONSE`.
    pub fn enqueue_raw(
        &mut self,
        id: u8,
        param: u16,
        flags: StateFlags,
    ) -> Result<(), Error> {
        self.enqueue(Command::Raw(id, param), flags)
    }

    fn enqueue(&mut self, command: Command, flags: StateFlags) -> Result<(), Error> {
        self.queue.push_back(QueueEntry { command, flags })
    }

    // ---- the tick ---------------------------------------------------

    /// Drives one tick: drains whatever bytes the transport has available,
    /// checks the deadline, and dispatches the next queued command if the
    /// coordinator is ready. Returns whether the queue still has room for
    /// more work. Should be called frequently and regularly; it is the only
    /// method that touches `transport`.
    pub fn update<T: Transport>(
        &mut self,
        transport: &mut T,
        hooks: &mut impl Hooks,
    ) -> Result<bool, T::Error> {
        if self.state.is_idle_uninitialized() && self.state.deadline.is_none() {
            self.state.deadline = Some(transport.now_ms() + POWER_UP_TIMEOUT_MS);
        }

        let mut buf = [0u8; 32];
        loop {
            let n = transport.read_available(&mut buf)?;
            if n == 0 {
                break;
            }
            for &byte in &buf[..n] {
                if let Decoded::Complete(f) = self.decoder.process_byte(byte) {
                    self.handle_frame(f, transport, hooks)?;
                }
            }
            if n < buf.len() {
                break;
            }
        }

        if let Some(deadline) = self.state.deadline {
            if transport.now_ms() >= deadline {
                self.handle_timeout(transport, hooks)?;
            }
        }

        if self.state.is_ready() {
            self.dispatch_next(transport)?;
        }

        Ok(!self.queue.is_full())
    }

    // ---- dispatch ---------------------------------------------------

    fn dispatch_next<T: Transport>(&mut self, transport: &mut T) -> Result<(), T::Error> {
        if let Some(entry) = self.queue.peek_front() {
            self.queue.pop_front();
            let timeout = Self::timeout_for(entry.flags);
            self.dispatch_now(entry.command, entry.flags, timeout, transport)?;
        }
        Ok(())
    }

    fn dispatch_now<T: Transport>(
        &mut self,
        command: Command,
        flags: StateFlags,
        timeout_ms: u64,
        transport: &mut T,
    ) -> Result<(), T::Error> {
        transport.write(&command.encode())?;
        self.state.sent = command.id();
        self.state.flags = flags;
        self.state.deadline = if timeout_ms > 0 {
            Some(transport.now_ms() + timeout_ms)
        } else {
            None
        };
        Ok(())
    }

    /// Deadline to install at dispatch time: 3000ms for a `RESET` (the only
    /// command combining `EXPECT_ACK` with `UNINITIALIZED`), 30ms if an ack
    /// is expected, 100ms if a response is expected, disabled otherwise.
    fn timeout_for(flags: StateFlags) -> u64 {
        if flags.contains(StateFlags::EXPECT_ACK | StateFlags::UNINITIALIZED) {
            RESET_TIMEOUT_MS
        } else if flags.contains(StateFlags::EXPECT_ACK) {
            ACK_TIMEOUT_MS
        } else if flags.contains(StateFlags::EXPECT_RESPONSE) {
            RESPONSE_TIMEOUT_MS
        } else {
            0
        }
    }

    // ---- event handling -----------------------------------------------

    fn handle_frame<T: Transport>(
        &mut self,
        decoded: frame::Frame,
        transport: &mut T,
        hooks: &mut impl Hooks,
    ) -> Result<(), T::Error> {
        let id = decoded.id;
        let param = decoded.param;

        if opcode::is_async_notification(id) {
            self.handle_async_notification(id, param, transport, hooks);
        } else if opcode::is_ack(id) {
            self.handle_ack(transport);
        } else if opcode::is_init_complete(id) {
            self.handle_init_complete(param, hooks);
        } else if opcode::is_query_response(id)
            && self.state.flags.contains(StateFlags::EXPECT_RESPONSE)
            && self.state.sent == id
        {
            self.handle_query_response(id, param, transport, hooks)?;
        } else if opcode::is_error(id) {
            self.handle_error(ErrorCode::from_wire(param), hooks);
        } else {
            // A response nobody is waiting for, or an opcode outside every
            // known range. It simply never satisfies the checklist, so the
            // in-flight command will eventually time out.
            #[cfg(feature = "use_defmt")]
            defmt::debug!("ignoring unsolicited frame, id={=u8:#04x}", id);
        }

        Ok(())
    }

    fn handle_ack<T: Transport>(&mut self, transport: &mut T) {
        if self.state.flags.contains(StateFlags::EXPECT_ACK) {
            self.state.flags.remove(StateFlags::EXPECT_ACK);
            if self
                .state
                .flags
                .intersects(StateFlags::EXPECT_ACK2 | StateFlags::DELAY)
            {
                self.state.deadline = Some(transport.now_ms() + DELAY_TIMEOUT_MS);
            } else if self.state.is_idle_uninitialized() {
                // A RESET's ack: still waiting for the module to announce
                // itself, same ceiling as power-up.
                self.state.deadline = Some(transport.now_ms() + POWER_UP_TIMEOUT_MS);
            } else {
                self.state.deadline = None;
            }
        } else if self.state.flags.contains(StateFlags::EXPECT_ACK2) {
            self.state.flags.remove(StateFlags::EXPECT_ACK2);
            self.state.deadline = None;
        } else {
            #[cfg(feature = "use_defmt")]
            defmt::debug!("ignoring unsolicited ack");
        }
    }

    fn handle_init_complete(&mut self, param: u16, hooks: &mut impl Hooks) {
        let devices = DeviceSet::from_bits_truncate(param as u8);
        // Arriving while an INIT_COMPLETE query was in flight is the module
        // answering that query's optional form, not a spontaneous reset.
        let expected = self.state.is_powering_up()
            || self.state.sent == opcode::RESET
            || self.state.sent == opcode::INIT_COMPLETE;
        if !expected {
            // The module reset itself without being asked to; whatever was
            // in flight is moot.
            self.queue.clear();
        }
        self.state.flags = StateFlags::empty();
        self.state.deadline = None;
        self.to_check = DeviceSet::empty();
        hooks.init_complete(devices);
    }

    fn handle_timeout<T: Transport>(
        &mut self,
        transport: &mut T,
        hooks: &mut impl Hooks,
    ) -> Result<(), T::Error> {
        self.state.deadline = None;

        if self.state.flags.contains(StateFlags::DELAY) {
            self.state.flags.remove(StateFlags::DELAY);
            return Ok(());
        }

        if self.state.is_idle_uninitialized() {
            self.dispatch_now(
                Command::QueryStatus,
                StateFlags::EXPECT_RESPONSE | StateFlags::UNINITIALIZED,
                RESPONSE_TIMEOUT_MS,
                transport,
            )?;
            return Ok(());
        }

        self.handle_error(ErrorCode::timed_out(), hooks);
        Ok(())
    }

    fn handle_error(&mut self, code: ErrorCode, hooks: &mut impl Hooks) {
        if self.state.flags.contains(StateFlags::UNINITIALIZED)
            && code == ErrorCode::NoSources
        {
            // Discovery terminates cleanly: nothing is present.
            self.state.flags = StateFlags::empty();
            self.state.deadline = None;
            self.state.available = DeviceSet::empty();
            self.to_check = DeviceSet::empty();
            hooks.init_complete(DeviceSet::empty());
            return;
        }

        let in_flight = self.state.sent;
        self.state.flags = StateFlags::empty();
        self.state.deadline = None;
        hooks.error(code, in_flight);
    }

    fn handle_query_response<T: Transport>(
        &mut self,
        id: u8,
        param: u16,
        transport: &mut T,
        hooks: &mut impl Hooks,
    ) -> Result<(), T::Error> {
        self.state.deadline = None;
        self.state.flags.remove(StateFlags::EXPECT_RESPONSE);

        if self.state.flags.contains(StateFlags::UNINITIALIZED) {
            self.handle_discovery_response(id, param, transport, hooks)?;
        } else if let Some(parameter) = Parameter::from_id(id) {
            if id == opcode::EQ_PROFILE && EqProfile::from_wire(param).is_err() {
                // The module sent a preset value outside the documented
                // set; surface it as a protocol error instead of forwarding
                // garbage to the caller.
                hooks.error(ErrorCode::Unknown(param), id);
            } else {
                hooks.query_response(parameter, param);
            }
        }

        Ok(())
    }

    fn handle_async_notification<T: Transport>(
        &mut self,
        id: u8,
        param: u16,
        transport: &mut T,
        hooks: &mut impl Hooks,
    ) {
        match id {
            opcode::DEVICE_INSERTED => {
                let device = DeviceSet::from_bits_truncate(param as u8);
                self.to_check.insert(device);
                hooks.device_change(device, DeviceChange::Inserted);
                // The module needs a quiet window after an insertion before
                // it will reliably answer anything else.
                self.state.flags.insert(StateFlags::DELAY);
                self.state.deadline = Some(transport.now_ms() + DELAY_TIMEOUT_MS);
            }
            opcode::DEVICE_REMOVED => {
                let device = DeviceSet::from_bits_truncate(param as u8);
                self.state.available.remove(device);
                self.to_check.remove(device);
                hooks.device_change(device, DeviceChange::Removed);
            }
            opcode::FINISHED_USB | opcode::FINISHED_SD | opcode::FINISHED_FLASH => {
                let device = match id {
                    opcode::FINISHED_USB => DeviceSet::USB,
                    opcode::FINISHED_SD => DeviceSet::SDCARD,
                    _ => DeviceSet::FLASH,
                };
                if self.last_finish == Some((device, param)) {
                    self.last_finish = None;
                } else {
                    hooks.finished_file(device, param);
                    self.last_finish = Some((device, param));
                }
            }
            _ => {}
        }
    }

    // ---- discovery ---------------------------------------------------

    fn handle_discovery_response<T: Transport>(
        &mut self,
        id: u8,
        param: u16,
        transport: &mut T,
        hooks: &mut impl Hooks,
    ) -> Result<(), T::Error> {
        if id == opcode::STATUS {
            let selected = DeviceSet::from_bits_truncate((param >> 8) as u8);
            self.state.available = selected;
            self.to_check = DeviceSet::empty();
            for device in PROBE_ORDER {
                if !selected.contains(device) {
                    self.to_check.insert(device);
                }
            }
        } else {
            let device = match id {
                opcode::USB_FILE_COUNT => DeviceSet::USB,
                opcode::SD_FILE_COUNT => DeviceSet::SDCARD,
                opcode::FLASH_FILE_COUNT => DeviceSet::FLASH,
                _ => return Ok(()),
            };
            if param > 0 {
                self.state.available.insert(device);
            }
            self.to_check.remove(device);
        }

        self.dispatch_discovery_probe(transport, hooks)
    }

    /// Builds the `CHECK_*` flags still outstanding from `to_check`, so
    /// `State::flags` keeps reflecting every device yet to be probed even
    /// though only one probe is in flight at a time.
    fn discovery_flags(&self) -> StateFlags {
        let mut flags = StateFlags::EXPECT_RESPONSE | StateFlags::UNINITIALIZED;
        for device in PROBE_ORDER {
            if self.to_check.contains(device) {
                if let Some(flag) = StateFlags::check_flag_for(device) {
                    flags.insert(flag);
                }
            }
        }
        flags
    }

    fn dispatch_discovery_probe<T: Transport>(
        &mut self,
        transport: &mut T,
        hooks: &mut impl Hooks,
    ) -> Result<(), T::Error> {
        let next = PROBE_ORDER.into_iter().find(|d| self.to_check.contains(*d));
        let flags = self.discovery_flags();
        match next {
            Some(DeviceSet::USB) => {
                self.dispatch_now(Command::QueryUsbFileCount, flags, RESPONSE_TIMEOUT_MS, transport)
            }
            Some(DeviceSet::SDCARD) => {
                self.dispatch_now(Command::QuerySdFileCount, flags, RESPONSE_TIMEOUT_MS, transport)
            }
            Some(DeviceSet::FLASH) => {
                self.dispatch_now(Command::QueryFlashFileCount, flags, RESPONSE_TIMEOUT_MS, transport)
            }
            _ => {
                self.state.flags = StateFlags::empty();
                self.state.deadline = None;
                hooks.init_complete(self.state.available);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::convert::Infallible;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::vec::Vec;

    #[derive(Default)]
    struct FakeTransport {
        written: Vec<Vec<u8>>,
        inbound: VecDeque<u8>,
        now: u64,
    }

    impl FakeTransport {
        fn advance(&mut self, ms: u64) {
            self.now += ms;
        }

        fn inject(&mut self, id: u8, param: u16, feedback: bool) {
            self.inbound.extend(frame::encode(id, param, feedback));
        }

        fn last_id(&self) -> u8 {
            self.written.last().expect("a frame was written")[3]
        }
    }

    impl Transport for FakeTransport {
        type Error = Infallible;

        fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
            self.written.push(bytes.to_vec());
            Ok(())
        }

        fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let n = self.inbound.len().min(buf.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.inbound.pop_front().unwrap();
            }
            Ok(n)
        }

        fn now_ms(&self) -> u64 {
            self.now
        }
    }

    #[derive(Default)]
    struct RecordingHooks {
        errors: Vec<(ErrorCode, u8)>,
        responses: Vec<(Parameter, u16)>,
        device_changes: Vec<(DeviceSet, DeviceChange)>,
        finished: Vec<(DeviceSet, u16)>,
        init_completes: Vec<DeviceSet>,
    }

    impl Hooks for RecordingHooks {
        fn error(&mut self, code: ErrorCode, in_flight_id: u8) {
            self.errors.push((code, in_flight_id));
        }

        fn query_response(&mut self, parameter: Parameter, value: u16) {
            self.responses.push((parameter, value));
        }

        fn device_change(&mut self, device: DeviceSet, change: DeviceChange) {
            self.device_changes.push((device, change));
        }

        fn finished_file(&mut self, device: DeviceSet, index: u16) {
            self.finished.push((device, index));
        }

        fn init_complete(&mut self, devices: DeviceSet) {
            self.init_completes.push(devices);
        }
    }

    fn powered_up() -> (Coordinator, FakeTransport, RecordingHooks) {
        let mut c: Coordinator = Coordinator::new();
        let mut t = FakeTransport::default();
        let mut h = RecordingHooks::default();
        t.inject(opcode::INIT_COMPLETE, 0, false);
        c.update(&mut t, &mut h).unwrap();
        t.written.clear();
        (c, t, h)
    }

    #[test]
    fn spontaneous_init_complete_reports_devices() {
        let mut c: Coordinator = Coordinator::new();
        let mut t = FakeTransport::default();
        let mut h = RecordingHooks::default();
        t.inject(opcode::INIT_COMPLETE, 0x03, false);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(h.init_completes, vec![DeviceSet::USB | DeviceSet::SDCARD]);
    }

    #[test]
    fn power_up_timeout_drives_discovery_to_completion() {
        let mut c: Coordinator = Coordinator::new();
        let mut t = FakeTransport::default();
        let mut h = RecordingHooks::default();

        c.update(&mut t, &mut h).unwrap(); // installs the 3000ms power-up deadline
        t.advance(3000);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::STATUS);

        // USB selected at boot; SD and flash still need checking.
        t.inject(opcode::STATUS, 0x0100, false);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::SD_FILE_COUNT);

        t.inject(opcode::SD_FILE_COUNT, 0, false); // not present
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::FLASH_FILE_COUNT);

        t.inject(opcode::FLASH_FILE_COUNT, 7, false); // present
        c.update(&mut t, &mut h).unwrap();

        assert_eq!(
            h.init_completes,
            vec![DeviceSet::USB | DeviceSet::FLASH]
        );
    }

    #[test]
    fn discovery_ends_cleanly_on_no_sources_error() {
        let mut c: Coordinator = Coordinator::new();
        let mut t = FakeTransport::default();
        let mut h = RecordingHooks::default();
        c.update(&mut t, &mut h).unwrap();
        t.advance(3000);
        c.update(&mut t, &mut h).unwrap(); // dispatches STATUS

        t.inject(opcode::ERROR, 0x01, false); // NO_SOURCES
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(h.init_completes, vec![DeviceSet::empty()]);
        assert!(h.errors.is_empty());
    }

    #[test]
    fn set_volume_dispatches_and_clears_on_ack() {
        let (mut c, mut t, mut h) = powered_up();
        c.set_volume(20).unwrap();
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::SET_VOLUME);

        t.inject(opcode::ACK, 0, false);
        c.update(&mut t, &mut h).unwrap();

        c.stop().unwrap();
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::STOP);
        assert!(h.errors.is_empty());
    }

    #[test]
    fn ack_timeout_reports_error_with_in_flight_opcode() {
        let (mut c, mut t, mut h) = powered_up();
        c.stop().unwrap();
        c.update(&mut t, &mut h).unwrap();
        t.advance(31);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(h.errors, vec![(ErrorCode::TimedOut, opcode::STOP)]);
    }

    #[test]
    fn loop_folder_waits_for_both_acks() {
        let (mut c, mut t, mut h) = powered_up();
        c.loop_folder(2).unwrap();
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::LOOP_FOLDER);
        t.written.clear();

        t.inject(opcode::ACK, 0, false);
        c.update(&mut t, &mut h).unwrap();

        c.stop().unwrap();
        c.update(&mut t, &mut h).unwrap();
        assert!(t.written.is_empty(), "stop must wait for the second ack");

        t.inject(opcode::ACK, 0, false);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::STOP);
    }

    #[test]
    fn select_source_enforces_quiet_window_before_next_dispatch() {
        let (mut c, mut t, mut h) = powered_up();
        c.select_source(DeviceSet::SDCARD).unwrap();
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::SELECT_SOURCE);
        t.written.clear();

        t.inject(opcode::ACK, 0, false);
        c.update(&mut t, &mut h).unwrap();

        c.stop().unwrap();
        c.update(&mut t, &mut h).unwrap();
        assert!(t.written.is_empty(), "must wait out the 300ms quiet window");

        t.advance(300);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::STOP);
    }

    #[test]
    fn duplicate_finished_file_notification_is_suppressed_once() {
        let (mut c, mut t, mut h) = powered_up();
        t.inject(opcode::FINISHED_USB, 5, false);
        t.inject(opcode::FINISHED_USB, 5, false);
        t.inject(opcode::FINISHED_USB, 5, false);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(h.finished, vec![(DeviceSet::USB, 5), (DeviceSet::USB, 5)]);
    }

    #[test]
    fn device_insertion_and_removal_report_and_update_available_set() {
        let (mut c, mut t, mut h) = powered_up();
        t.inject(opcode::DEVICE_INSERTED, DeviceSet::SDCARD.bits() as u16, false);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(
            h.device_changes,
            vec![(DeviceSet::SDCARD, DeviceChange::Inserted)]
        );

        t.inject(opcode::DEVICE_REMOVED, DeviceSet::SDCARD.bits() as u16, false);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(
            h.device_changes[1],
            (DeviceSet::SDCARD, DeviceChange::Removed)
        );
    }

    #[test]
    fn query_response_reaches_hook_once_ready() {
        let (mut c, mut t, mut h) = powered_up();
        c.query_volume().unwrap();
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::VOLUME);

        t.inject(opcode::VOLUME, 17, false);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(h.responses, vec![(Parameter::Volume, 17)]);
    }

    #[test]
    fn queue_overflow_is_reported_to_the_caller() {
        let (mut c, _t, _h) = powered_up();
        for _ in 0..4 {
            c.play_next().unwrap();
        }
        assert!(matches!(c.play_next(), Err(Error::QueueFull)));
    }

    #[test]
    fn reset_purges_queue_and_forces_a_fresh_power_up() {
        let (mut c, mut t, mut h) = powered_up();
        c.play_next().unwrap();
        c.reset();
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::RESET);

        t.inject(opcode::ACK, 0, false);
        c.update(&mut t, &mut h).unwrap();
        t.inject(opcode::INIT_COMPLETE, 0, false);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(h.init_completes.last(), Some(&DeviceSet::empty()));

        // The play_next queued before reset() must not have survived it.
        c.stop().unwrap();
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::STOP);
    }

    #[test]
    fn unexpected_reset_mid_session_clears_queue_but_still_reports() {
        let (mut c, mut t, mut h) = powered_up();
        c.play_next().unwrap();
        c.update(&mut t, &mut h).unwrap(); // PLAY_NEXT in flight, EXPECT_ACK

        t.inject(opcode::INIT_COMPLETE, 0x01, false);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(h.init_completes.last(), Some(&DeviceSet::USB));

        c.stop().unwrap();
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::STOP);
    }

    #[test]
    fn init_complete_answering_a_query_does_not_clear_the_queue() {
        let (mut c, mut t, mut h) = powered_up();
        c.enqueue_raw(opcode::INIT_COMPLETE, 0, StateFlags::EXPECT_RESPONSE)
            .unwrap();
        c.play_next().unwrap();
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::INIT_COMPLETE);

        t.inject(opcode::INIT_COMPLETE, 0x03, false);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(h.init_completes, vec![DeviceSet::USB | DeviceSet::SDCARD]);
        // play_next, queued behind the query, survives and dispatches right away.
        assert_eq!(t.last_id(), opcode::PLAY_NEXT);
    }

    #[test]
    fn eq_profile_out_of_range_reports_an_error_instead_of_the_raw_value() {
        let (mut c, mut t, mut h) = powered_up();
        c.query_eq_profile().unwrap();
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(t.last_id(), opcode::EQ_PROFILE);

        t.inject(opcode::EQ_PROFILE, 0xff, false);
        c.update(&mut t, &mut h).unwrap();
        assert_eq!(h.errors, vec![(ErrorCode::Unknown(0xff), opcode::EQ_PROFILE)]);
        assert!(h.responses.is_empty());
    }
}
