//! Assembling outgoing packet bodies in a fixed-capacity buffer.

use core::fmt::LowerHex;

use crate::util::slicevec::{CapacityError, SliceVec};

/// Writes one outgoing packet body into a borrowed buffer.
///
/// All writes are capacity-checked: a body that does not fit the buffer
/// surfaces a [`CapacityError`] before anything reaches the wire, which is
/// what turns an oversized `QTDP` into the "actions too complex" failure.
pub struct PacketWriter<'a> {
    buf: SliceVec<'a, u8>,
}

impl<'a> PacketWriter<'a> {
    pub fn new(storage: &'a mut [u8]) -> PacketWriter<'a> {
        PacketWriter {
            buf: SliceVec::new(storage),
        }
    }

    /// Append a string verbatim.
    pub fn write_str(&mut self, s: &str) -> Result<(), CapacityError> {
        self.buf.extend_from_slice(s.as_bytes())
    }

    /// Append a number as lowercase big-endian hex in its most compact
    /// form. Signed values emit their two's-complement bit pattern, so
    /// `-1i32` comes out as `ffffffff`.
    pub fn write_num<D: LowerHex>(&mut self, n: D) -> Result<(), CapacityError> {
        self.write_str(&format!("{:x}", n))
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_slice()
    }
}
