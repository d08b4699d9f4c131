//! The request/response driver for the `QT*` packet family.

use core::marker::PhantomData;

use log::trace;

use crate::arch::Arch;
use crate::collection::{encode_actions, EncodedActions, Scratch};
use crate::common::Addr;
use crate::conn::Connection;
use crate::debugger::Debugger;
use crate::error::{Error, InternalError, ReplyError};
use crate::protocol::hex::decode_hex_vec;
use crate::protocol::reply::{apply_register_snapshot, parse_frame_reply, parse_stub_error};
use crate::protocol::writer::PacketWriter;
use crate::registry::{Tracepoint, TracepointRegistry};
use crate::util::slicevec::CapacityError;

/// Default size of the engine's packet buffers, in bytes.
///
/// A compiled `QTDP` body larger than the outgoing buffer fails with
/// [`Error::ActionsTooComplex`] before anything reaches the wire.
pub const DEFAULT_PACKET_BUF_SIZE: usize = 2048;

/// A request to select a new trace frame on the stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    /// Select frame `n`; −1 ends trace-buffer debugging.
    Num(i32),
    /// Select the next frame whose PC is the given address.
    AtPc(Addr),
    /// Select the next frame produced by the given tracepoint.
    Hit(u32),
    /// Select the next frame whose PC lies in `[start, end]` (both
    /// inclusive on the wire).
    Range(Addr, Addr),
    /// Select the next frame whose PC lies outside `[start, end]`.
    Outside(Addr, Addr),
}

/// Driver for the tracepoint packet exchanges.
///
/// Owns the connection and the scratch packet buffers; everything else is
/// passed in per call. All exchanges are synchronous: the engine blocks on
/// the connection until a terminal reply arrives, servicing interleaved
/// console-output and register-snapshot notifications along the way.
pub struct TraceEngine<A: Arch, C: Connection> {
    conn: C,
    reply_buf: Box<[u8]>,
    pkt_buf: Box<[u8]>,
    _arch: PhantomData<A>,
}

fn send_on<T, C: Connection>(conn: &mut C, pkt: &[u8]) -> Result<(), Error<T, C::Error>> {
    trace!("--> {}", String::from_utf8_lossy(pkt));
    conn.send_packet(pkt).map_err(Error::ConnectionSend)
}

impl<A: Arch, C: Connection> TraceEngine<A, C> {
    pub fn new(conn: C) -> TraceEngine<A, C> {
        TraceEngine::with_packet_buf_size(conn, DEFAULT_PACKET_BUF_SIZE)
    }

    pub(crate) fn with_packet_buf_size(conn: C, size: usize) -> TraceEngine<A, C> {
        TraceEngine {
            conn,
            reply_buf: vec![0; size].into_boxed_slice(),
            pkt_buf: vec![0; size].into_boxed_slice(),
            _arch: PhantomData,
        }
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &C {
        &self.conn
    }

    /// Wait for the current command's terminal reply, servicing whatever
    /// the stub interleaves before it:
    ///
    /// - `E…` classifies and fails the command,
    /// - `O…` (except `OK`) forwards console output and keeps waiting,
    /// - `R…` re-synchronizes frame state, applies the pushed register
    ///   snapshot, and keeps waiting,
    /// - an empty reply means the command is unsupported.
    fn noisy_recv<D: Debugger>(
        &mut self,
        dbg: &mut D,
    ) -> Result<&[u8], Error<D::Error, C::Error>> {
        let len = loop {
            let n = self
                .conn
                .recv_packet(&mut self.reply_buf)
                .map_err(Error::ConnectionRecv)?;
            trace!("<-- {}", String::from_utf8_lossy(&self.reply_buf[..n]));
            if n == 0 {
                return Err(Error::Unsupported);
            }
            match self.reply_buf[0] {
                b'E' => return Err(Error::Stub(parse_stub_error(&self.reply_buf[1..n]))),
                b'R' => {
                    // The pushed registers describe a different frame than
                    // whatever is cached; flush before supplying them.
                    dbg.invalidate_frames();
                    dbg.registers_changed();
                    dbg.reselect_frame();
                    apply_register_snapshot::<A, D>(dbg, &self.reply_buf[1..n])
                        .map_err(Error::Reply)?;
                }
                b'O' if &self.reply_buf[..n] != b"OK" => {
                    let bytes = decode_hex_vec(&self.reply_buf[1..n])
                        .map_err(|_| Error::Reply(ReplyError::MalformedConsoleOutput))?;
                    dbg.console_output(&bytes);
                }
                _ => break n,
            }
        };
        Ok(&self.reply_buf[..len])
    }

    fn transact_ok<D: Debugger>(
        &mut self,
        dbg: &mut D,
        pkt: &[u8],
    ) -> Result<(), Error<D::Error, C::Error>> {
        send_on(&mut self.conn, pkt)?;
        let reply = self.noisy_recv(dbg)?;
        if reply != b"OK" {
            return Err(Error::Reply(ReplyError::UnexpectedReply(
                String::from_utf8_lossy(reply).into_owned(),
            )));
        }
        Ok(())
    }

    /// Download every tracepoint and start collection: `QTinit`, one
    /// `QTDP` per tracepoint in chain order, then `QTStart`.
    ///
    /// The caller is responsible for resetting the trace-frame cursor once
    /// this returns successfully; starting a run invalidates all old trace
    /// frames.
    pub fn start<D: Debugger>(
        &mut self,
        dbg: &mut D,
        registry: &TracepointRegistry,
        scratch: &mut Scratch,
    ) -> Result<(), Error<D::Error, C::Error>> {
        self.transact_ok(dbg, b"QTinit")?;

        for t in registry.iter() {
            let encoded = if t.actions.is_empty() {
                None
            } else {
                Some(encode_actions::<A, D>(dbg, t, scratch)?)
            };

            let len = {
                let mut w = PacketWriter::new(&mut self.pkt_buf);
                write_qtdp(&mut w, t, encoded.as_ref())
                    .map_err(|_| Error::ActionsTooComplex(t.number))?;
                w.len()
            };
            send_on(&mut self.conn, &self.pkt_buf[..len])?;
            let reply = self.noisy_recv(dbg)?;
            if reply != b"OK" {
                return Err(Error::Reply(ReplyError::UnexpectedReply(
                    String::from_utf8_lossy(reply).into_owned(),
                )));
            }
        }

        self.transact_ok(dbg, b"QTStart")
    }

    /// Stop collection (`QTStop`).
    pub fn stop<D: Debugger>(&mut self, dbg: &mut D) -> Result<(), Error<D::Error, C::Error>> {
        self.transact_ok(dbg, b"QTStop")
    }

    /// Query collection status (`qTStatus`).
    pub fn status<D: Debugger>(&mut self, dbg: &mut D) -> Result<(), Error<D::Error, C::Error>> {
        self.transact_ok(dbg, b"qTStatus")
    }

    /// Ask the stub to select a trace frame, returning the
    /// `(frame, tracepoint)` pair it reports. Either defaults to −1 when
    /// the stub declines to reveal it.
    ///
    /// A request for frame −1 (end trace debugging) accepts only the
    /// literal `F-1` acknowledgment; for every other request, an explicit
    /// `F-1` or `T-1` means the stub failed to find a matching frame.
    pub fn select_frame<D: Debugger>(
        &mut self,
        dbg: &mut D,
        req: &FrameRequest,
    ) -> Result<(i32, i32), Error<D::Error, C::Error>> {
        let len = {
            let mut w = PacketWriter::new(&mut self.pkt_buf);
            write_qtframe(&mut w, req)
                .map_err(|_| Error::Internal(InternalError::PacketBufferOverflow))?;
            w.len()
        };
        send_on(&mut self.conn, &self.pkt_buf[..len])?;
        let reply = self.noisy_recv(dbg)?;

        if let FrameRequest::Num(-1) = req {
            // Hopefully the stub has complied.
            if reply != b"F-1" {
                return Err(Error::Reply(ReplyError::UnexpectedReply(
                    String::from_utf8_lossy(reply).into_owned(),
                )));
            }
            return Ok((-1, -1));
        }

        let parsed = parse_frame_reply(reply).map_err(Error::Reply)?;
        if parsed.frame == Some(-1) || parsed.tracepoint == Some(-1) {
            return Err(Error::FrameNotFound);
        }
        Ok((parsed.frame.unwrap_or(-1), parsed.tracepoint.unwrap_or(-1)))
    }
}

fn write_qtdp(
    w: &mut PacketWriter<'_>,
    t: &Tracepoint,
    encoded: Option<&EncodedActions>,
) -> Result<(), CapacityError> {
    w.write_str("QTDP:")?;
    w.write_num(t.number)?;
    w.write_str(":")?;
    w.write_num(t.address)?;
    w.write_str(if t.enabled { ":E:" } else { ":D:" })?;
    w.write_num(t.step_count as i32)?;
    w.write_str(":")?;
    w.write_num(t.pass_count)?;
    if let Some(encoded) = encoded {
        if let Some(tdp) = &encoded.tdp_actions {
            w.write_str(tdp)?;
        }
        if let Some(stepping) = &encoded.stepping_actions {
            w.write_str("S")?;
            w.write_str(stepping)?;
        }
    }
    Ok(())
}

fn write_qtframe(w: &mut PacketWriter<'_>, req: &FrameRequest) -> Result<(), CapacityError> {
    w.write_str("QTFrame:")?;
    match *req {
        FrameRequest::Num(n) => w.write_num(n),
        FrameRequest::AtPc(pc) => {
            w.write_str("pc:")?;
            w.write_num(pc)
        }
        FrameRequest::Hit(tdp) => {
            w.write_str("tdp:")?;
            w.write_num(tdp)
        }
        FrameRequest::Range(start, end) => {
            w.write_str("range:")?;
            w.write_num(start)?;
            w.write_str(":")?;
            w.write_num(end)
        }
        FrameRequest::Outside(start, end) => {
            w.write_str("outside:")?;
            w.write_num(start)?;
            w.write_str(":")?;
            w.write_num(end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StubError;
    use crate::registry::TracepointRegistry;
    use crate::testutil::{test_sal, TestArch, TestConn, TestDebugger};

    fn engine(conn: TestConn) -> TraceEngine<TestArch, TestConn> {
        TraceEngine::new(conn)
    }

    fn registry_with_actions(
        dbg: &mut TestDebugger,
        actions: &[&str],
    ) -> TracepointRegistry {
        let mut reg = TracepointRegistry::new();
        let n = reg.create(dbg, &test_sal(0x4010c0), None);
        if let Some(t) = reg.get_mut(n) {
            t.actions = actions.iter().map(|s| s.to_string()).collect();
        }
        reg
    }

    #[test]
    fn tstart_packet_sequence() {
        let mut dbg = TestDebugger::new();
        let reg = registry_with_actions(&mut dbg, &["collect $regs", "end"]);

        let conn = TestConn::replying(&["OK", "OK", "OK"]);
        let mut eng = engine(conn);
        let mut scratch = Scratch::new();
        eng.start(&mut dbg, &reg, &mut scratch).unwrap();

        assert_eq!(
            eng.conn.sent(),
            vec![
                "QTinit".to_string(),
                "QTDP:1:4010c0:E:0:0RFFFF".to_string(),
                "QTStart".to_string(),
            ]
        );
    }

    #[test]
    fn stepping_actions_use_the_s_separator() {
        let mut dbg = TestDebugger::new();
        let mut reg = registry_with_actions(
            &mut dbg,
            &["collect var_a", "while-stepping 3", "collect $regs", "end", "end"],
        );
        if let Some(t) = reg.get_mut(1) {
            t.step_count = 3;
        }

        let conn = TestConn::replying(&["OK", "OK", "OK"]);
        let mut eng = engine(conn);
        let mut scratch = Scratch::new();
        eng.start(&mut dbg, &reg, &mut scratch).unwrap();

        assert_eq!(
            eng.conn.sent()[1],
            "QTDP:1:4010c0:E:3:0R0800MB,FFFFFFFFFFFFFFF8,4SRFFFF"
        );
    }

    #[test]
    fn oversized_actions_abort_before_sending() {
        let mut dbg = TestDebugger::new();
        // enough literal ranges to overflow a tiny packet buffer
        let mut collects: Vec<String> = Vec::new();
        for i in 0..64 {
            collects.push(format!("collect $(0x{:x}000, 4)", i + 1));
        }
        let mut actions: Vec<&str> = collects.iter().map(|s| s.as_str()).collect();
        actions.push("end");
        let reg = registry_with_actions(&mut dbg, &actions);

        let conn = TestConn::replying(&["OK"]);
        let mut eng = TraceEngine::<TestArch, _>::with_packet_buf_size(conn, 128);
        let mut scratch = Scratch::new();
        match eng.start(&mut dbg, &reg, &mut scratch) {
            Err(Error::ActionsTooComplex(1)) => {}
            other => panic!("expected capacity failure, got {:?}", other),
        }
        // QTinit went out; the oversized QTDP did not
        assert_eq!(eng.conn.sent(), vec!["QTinit".to_string()]);
    }

    #[test]
    fn console_output_is_decoded_and_forwarded() {
        let mut dbg = TestDebugger::new();
        let reg = registry_with_actions(&mut dbg, &[]);

        let conn = TestConn::replying(&["O48656c6c6f", "OK", "OK", "OK"]);
        let mut eng = engine(conn);
        let mut scratch = Scratch::new();
        eng.start(&mut dbg, &reg, &mut scratch).unwrap();

        assert_eq!(dbg.console, b"Hello".to_vec());
    }

    #[test]
    fn register_push_is_applied_before_the_terminal_reply() {
        let mut dbg = TestDebugger::new();

        let conn = TestConn::replying(&["R0:11223344;", "OK"]);
        let mut eng = engine(conn);
        eng.stop(&mut dbg).unwrap();

        assert_eq!(dbg.supplied, vec![(0, vec![0x11, 0x22, 0x33, 0x44])]);
        // frame caches were flushed before the registers were supplied
        assert_eq!(
            &dbg.events[..3],
            &["invalidate_frames", "registers_changed", "reselect_frame"]
        );
    }

    #[test]
    fn stub_errors_are_classified() {
        let mut dbg = TestDebugger::new();

        let conn = TestConn::replying(&["E10"]);
        match engine(conn).stop(&mut dbg) {
            Err(Error::Stub(StubError::OutgoingPacket)) => {}
            other => panic!("unexpected: {:?}", other),
        }

        let conn = TestConn::replying(&["E1F"]);
        match engine(conn).stop(&mut dbg) {
            Err(Error::Stub(StubError::OutgoingPacketField(0xf))) => {}
            other => panic!("unexpected: {:?}", other),
        }

        let conn = TestConn::replying(&["E2A0"]);
        match engine(conn).stop(&mut dbg) {
            Err(Error::Stub(StubError::Api(code))) => assert_eq!(code, "A0"),
            other => panic!("unexpected: {:?}", other),
        }

        let conn = TestConn::replying(&["E99"]);
        match engine(conn).stop(&mut dbg) {
            Err(Error::Stub(StubError::Other(_))) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn empty_reply_means_unsupported() {
        let mut dbg = TestDebugger::new();
        let conn = TestConn::replying(&[""]);
        match engine(conn).status(&mut dbg) {
            Err(Error::Unsupported) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn frame_selection_variants_encode_correctly() {
        let cases: Vec<(FrameRequest, &str)> = vec![
            (FrameRequest::Num(5), "QTFrame:5"),
            (FrameRequest::AtPc(0x4010c0), "QTFrame:pc:4010c0"),
            (FrameRequest::Hit(2), "QTFrame:tdp:2"),
            (FrameRequest::Range(0x1000, 0x1fff), "QTFrame:range:1000:1fff"),
            (FrameRequest::Outside(0x1000, 0x1fff), "QTFrame:outside:1000:1fff"),
        ];
        for (req, wire) in cases {
            let mut dbg = TestDebugger::new();
            let conn = TestConn::replying(&["F0T1"]);
            let mut eng = engine(conn);
            eng.select_frame(&mut dbg, &req).unwrap();
            assert_eq!(eng.conn.sent(), vec![wire.to_string()]);
        }
    }

    #[test]
    fn end_trace_request_encodes_minus_one_and_wants_f_minus_one() {
        let mut dbg = TestDebugger::new();
        let conn = TestConn::replying(&["F-1"]);
        let mut eng = engine(conn);
        assert_eq!(eng.select_frame(&mut dbg, &FrameRequest::Num(-1)).unwrap(), (-1, -1));
        assert_eq!(eng.conn.sent(), vec!["QTFrame:ffffffff".to_string()]);

        let mut dbg = TestDebugger::new();
        let conn = TestConn::replying(&["OK"]);
        let mut eng = engine(conn);
        match eng.select_frame(&mut dbg, &FrameRequest::Num(-1)) {
            Err(Error::Reply(ReplyError::UnexpectedReply(_))) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn explicit_failure_tokens_are_frame_not_found() {
        let mut dbg = TestDebugger::new();
        let conn = TestConn::replying(&["F-1"]);
        let mut eng = engine(conn);
        match eng.select_frame(&mut dbg, &FrameRequest::Num(5)) {
            Err(Error::FrameNotFound) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn bare_ok_defaults_both_to_minus_one() {
        let mut dbg = TestDebugger::new();
        let conn = TestConn::replying(&["OK"]);
        let mut eng = engine(conn);
        assert_eq!(eng.select_frame(&mut dbg, &FrameRequest::Num(5)).unwrap(), (-1, -1));
    }
}
