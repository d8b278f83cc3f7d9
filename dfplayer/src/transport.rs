// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! The only interface through which the coordinator touches the outside
//! world: write bytes, read whatever is available without blocking, and
//! read the clock.

/// A byte-oriented UART-like transport plus a monotonic millisecond clock.
/// Implementations must not block beyond the underlying I/O buffer.
pub trait Transport {
    type Error;

    /// Write the given bytes. Should not block waiting for a reply.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Copy as many currently-available bytes as fit into `buf` without
    /// blocking, returning how many were copied. Returning `0` means no
    /// bytes are available right now, not end-of-stream.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// The current reading of a monotonic millisecond clock. Only
    /// differences between calls are meaningful.
    fn now_ms(&self) -> u64;
}
