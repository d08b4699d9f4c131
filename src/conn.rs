//! Trait to exchange protocol packets with a remote stub.

/// A synchronous, packet-oriented transport to the remote stub.
///
/// Implementations are expected to handle the serial-line framing of the
/// remote protocol (the leading `$`, the trailing `#` + checksum, and
/// acknowledgment bytes); the engine deals purely in packet bodies.
pub trait Connection {
    /// Transport-specific error type.
    type Error;

    /// Send a single packet body, blocking until it is on the wire.
    fn send_packet(&mut self, pkt: &[u8]) -> Result<(), Self::Error>;

    /// Receive a single packet body into `buf`, blocking until one arrives.
    ///
    /// Returns the number of bytes written. Zero bytes means the stub sent
    /// an empty reply, i.e. it does not support the command it was asked to
    /// perform. A reply that does not fit in `buf` should be reported as a
    /// transport error rather than silently truncated.
    fn recv_packet(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}
