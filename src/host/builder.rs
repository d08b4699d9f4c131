use core::fmt::{self, Display};
use core::marker::PhantomData;

use crate::arch::Arch;
use crate::conn::Connection;
use crate::host::TraceHost;
use crate::protocol::engine::{TraceEngine, DEFAULT_PACKET_BUF_SIZE};

/// Smallest accepted packet buffer; enough for every fixed-size packet of
/// the protocol.
const MIN_PACKET_BUF_SIZE: usize = 64;

/// An error preventing a [`TraceHost`] from being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderError {
    PacketBufTooSmall,
}

impl Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderError::PacketBufTooSmall => write!(f, "packet buffer is too small"),
        }
    }
}

impl std::error::Error for BuilderError {}

/// Helper to configure and construct a [`TraceHost`].
pub struct TraceHostBuilder<A: Arch, C: Connection> {
    conn: C,
    packet_buf_size: usize,
    _arch: PhantomData<A>,
}

impl<A: Arch, C: Connection> TraceHostBuilder<A, C> {
    pub(crate) fn new(conn: C) -> TraceHostBuilder<A, C> {
        TraceHostBuilder {
            conn,
            packet_buf_size: DEFAULT_PACKET_BUF_SIZE,
            _arch: PhantomData,
        }
    }

    /// Size in bytes of the engine's packet buffers.
    ///
    /// This bounds outgoing packet bodies: a compiled `QTDP` larger than
    /// the buffer fails with
    /// [`Error::ActionsTooComplex`](crate::error::Error::ActionsTooComplex)
    /// before anything is sent.
    pub fn packet_buf_size(mut self, size: usize) -> Self {
        self.packet_buf_size = size;
        self
    }

    /// Build the host.
    pub fn build(self) -> Result<TraceHost<A, C>, BuilderError> {
        if self.packet_buf_size < MIN_PACKET_BUF_SIZE {
            return Err(BuilderError::PacketBufTooSmall);
        }
        Ok(TraceHost::from_engine(TraceEngine::with_packet_buf_size(
            self.conn,
            self.packet_buf_size,
        )))
    }
}
