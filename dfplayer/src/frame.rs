// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! The 10-byte wire frame: a pure function of bytes, with no I/O and no
//! notion of time. `encode` builds an outbound frame; [`Decoder`]
//! incrementally consumes an inbound byte stream.

pub const START: u8 = 0x7e;
pub const VERSION: u8 = 0xff;
pub const LEN: u8 = 0x06;
pub const STOP: u8 = 0xef;

/// A validated, decoded frame: the opcode and its 16-bit parameter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use_defmt", derive(defmt::Format))]
pub struct Frame {
    pub id: u8,
    pub param: u16,
}

/// Encode `(id, param, feedback)` into the 10-byte wire frame. `feedback`
/// must be `true` iff the caller wants the module to reply with an ACK.
pub fn encode(id: u8, param: u16, feedback: bool) -> [u8; 10] {
    let mut buf = [0u8; 10];
    buf[0] = START;
    buf[1] = VERSION;
    buf[2] = LEN;
    buf[3] = id;
    buf[4] = feedback as u8;
    buf[5] = (param >> 8) as u8;
    buf[6] = param as u8;

    let checksum = checksum16(&buf[1..7]);
    buf[7] = (checksum >> 8) as u8;
    buf[8] = checksum as u8;
    buf[9] = STOP;
    buf
}

fn checksum16(payload: &[u8]) -> u16 {
    let sum: u16 = payload.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
    0u16.wrapping_sub(sum)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    WaitStart,
    WaitVersion,
    WaitLen,
    WaitId,
    WaitFeedback,
    WaitParamHi,
    WaitParamLo,
    WaitChecksumHiOrStop,
    WaitChecksumLo,
    WaitStop,
}

/// Outcome of feeding one byte to a [`Decoder`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Decoded {
    /// The decoder needs more bytes.
    Incomplete,
    /// A complete, valid frame was assembled.
    Complete(Frame),
}

/// Streaming byte-at-a-time decoder. Feed it one byte at a time with
/// [`Decoder::process_byte`]; it tracks its place in the expected template
/// and resynchronizes on any byte that breaks it.
#[derive(Debug)]
pub struct Decoder {
    state: State,
    id: u8,
    feedback: u8,
    param_hi: u8,
    param_lo: u8,
    checksum_hi: u8,
    checksum_lo: u8,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            state: State::WaitStart,
            id: 0,
            feedback: 0,
            param_hi: 0,
            param_lo: 0,
            checksum_hi: 0,
            checksum_lo: 0,
        }
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resync helper for the fixed-byte positions (0, 1, 2, 9): on mismatch,
    /// a fresh `START` byte becomes the new position-0, anything else drops
    /// back to waiting for `START`.
    fn resync(byte: u8, on_restart: State) -> State {
        if byte == START {
            on_restart
        } else {
            State::WaitStart
        }
    }

    pub fn process_byte(&mut self, byte: u8) -> Decoded {
        self.state = match self.state {
            State::WaitStart => {
                if byte == START {
                    State::WaitVersion
                } else {
                    State::WaitStart
                }
            }
            State::WaitVersion => {
                if byte == VERSION {
                    State::WaitLen
                } else {
                    Self::resync(byte, State::WaitVersion)
                }
            }
            State::WaitLen => {
                if byte == LEN {
                    State::WaitId
                } else {
                    Self::resync(byte, State::WaitVersion)
                }
            }
            State::WaitId => {
                self.id = byte;
                State::WaitFeedback
            }
            State::WaitFeedback => {
                self.feedback = byte;
                State::WaitParamHi
            }
            State::WaitParamHi => {
                self.param_hi = byte;
                State::WaitParamLo
            }
            State::WaitParamLo => {
                self.param_lo = byte;
                State::WaitChecksumHiOrStop
            }
            State::WaitChecksumHiOrStop => {
                if byte == STOP {
                    // Short (unchecksummed) frame: accept it now.
                    self.state = State::WaitStart;
                    return Decoded::Complete(Frame {
                        id: self.id,
                        param: u16::from_be_bytes([self.param_hi, self.param_lo]),
                    });
                }
                self.checksum_hi = byte;
                State::WaitChecksumLo
            }
            State::WaitChecksumLo => {
                self.checksum_lo = byte;
                State::WaitStop
            }
            State::WaitStop => {
                if byte == STOP {
                    self.state = State::WaitStart;
                    if self.checksum_valid() {
                        return Decoded::Complete(Frame {
                            id: self.id,
                            param: u16::from_be_bytes([
                                self.param_hi,
                                self.param_lo,
                            ]),
                        });
                    }
                    // Bad checksum: drop the frame silently. The coordinator
                    // never sees it, so this naturally surfaces as a timeout.
                    #[cfg(feature = "use_defmt")]
                    defmt::debug!("dropping frame with bad checksum, id={=u8:#04x}", self.id);
                    return Decoded::Incomplete;
                }
                Self::resync(byte, State::WaitVersion)
            }
        };

        Decoded::Incomplete
    }

    fn checksum_valid(&self) -> bool {
        let payload_sum = checksum16(&[
            VERSION,
            LEN,
            self.id,
            self.feedback,
            self.param_hi,
            self.param_lo,
        ]);
        let received = u16::from_be_bytes([self.checksum_hi, self.checksum_lo]);
        // payload checksum is the negated sum; a valid frame's checksum plus
        // the sum it was computed from wraps back to zero.
        payload_sum == received
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed(decoder: &mut Decoder, bytes: &[u8]) -> Option<Frame> {
        let mut last = None;
        for &b in bytes {
            if let Decoded::Complete(f) = decoder.process_byte(b) {
                last = Some(f);
            }
        }
        last
    }

    #[test]
    fn encode_set_volume_25() {
        let buf = encode(0x06, 0x0019, true);
        assert_eq!(
            buf,
            [0x7e, 0xff, 0x06, 0x06, 0x01, 0x00, 0x19, 0xff, 0xd5, 0xef]
        );
    }

    #[test]
    fn round_trip_every_opcode_and_param() {
        for id in 0u8..=255 {
            for &param in &[0u16, 1, 0x00ff, 0x1234, 0xffff] {
                for feedback in [false, true] {
                    let buf = encode(id, param, feedback);
                    let mut decoder = Decoder::new();
                    let got = feed(&mut decoder, &buf).expect("frame completes");
                    assert_eq!(got, Frame { id, param });
                }
            }
        }
    }

    #[test]
    fn checksum_sensitivity() {
        let buf = encode(0x06, 0x0019, true);
        for pos in 3..=6 {
            for delta in 1u8..=255 {
                let mut corrupted = buf;
                corrupted[pos] = corrupted[pos].wrapping_add(delta);
                if corrupted[pos] == buf[pos] {
                    continue;
                }
                let mut decoder = Decoder::new();
                assert_eq!(feed(&mut decoder, &corrupted), None);
            }
        }
    }

    #[test]
    fn resync_after_noise_with_no_start_byte() {
        let buf = encode(0x09, 0x0001, true);
        let mut decoder = Decoder::new();
        let noise = [0x00u8, 0x01, 0x02, 0xaa, 0xbb];
        let mut stream = noise.to_vec();
        stream.extend_from_slice(&buf);
        let got = feed(&mut decoder, &stream).expect("frame completes");
        assert_eq!(got, Frame { id: 0x09, param: 1 });
    }

    #[test]
    fn short_frame_accepted_without_checksum() {
        let mut decoder = Decoder::new();
        let short = [0x7e, 0xff, 0x06, 0x3a, 0x00, 0x00, 0x02, 0xef];
        let got = feed(&mut decoder, &short).expect("frame completes");
        assert_eq!(
            got,
            Frame {
                id: 0x3a,
                param: 2
            }
        );
    }
}
