//! Parsing the stub's replies: error classification, frame-selection
//! results, and register snapshots.

use crate::arch::Arch;
use crate::debugger::Debugger;
use crate::error::{ReplyError, StubError};
use crate::protocol::hex::{decode_hex, decode_signed_hex};

fn lossy(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf).into_owned()
}

/// Classify the tail of an `E…` reply (everything after the `E`).
///
/// `10` is a general malformed-outgoing-packet report, `1<n>` localizes the
/// failure to field `n`, `2<code>` is a trace-API error code, and anything
/// else is opaque.
pub fn parse_stub_error(tail: &[u8]) -> StubError {
    match tail {
        [b'1', b'0', ..] => StubError::OutgoingPacket,
        [b'1', rest @ ..] if !rest.is_empty() => match decode_hex::<u32>(rest) {
            Ok(field) => StubError::OutgoingPacketField(field),
            Err(_) => StubError::Other(lossy(tail)),
        },
        [b'2', rest @ ..] if !rest.is_empty() => StubError::Api(lossy(rest)),
        _ => StubError::Other(lossy(tail)),
    }
}

/// The stub's answer to a `QTFrame` request.
///
/// Either token may be absent; `Some(-1)` records an explicit `F-1`/`T-1`,
/// which (outside the end-trace handshake) means the stub failed to find
/// the requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReply {
    pub frame: Option<i32>,
    pub tracepoint: Option<i32>,
}

fn scan_signed_hex(buf: &[u8]) -> Result<(i32, &[u8]), ReplyError> {
    let digits = match buf.first() {
        Some(b'-') => 1 + count_hex(&buf[1..]),
        _ => count_hex(buf),
    };
    let value = decode_signed_hex::<i64>(&buf[..digits])
        .map_err(|_| ReplyError::UnexpectedReply(lossy(buf)))?;
    Ok((value as i32, &buf[digits..]))
}

fn count_hex(buf: &[u8]) -> usize {
    buf.iter().take_while(|b| b.is_ascii_hexdigit()).count()
}

/// Parse a `QTFrame` terminal reply: a sequence of `F<hex>` and `T<hex>`
/// tokens, optionally followed by `OK`. A bare `OK` is a valid reply where
/// the stub declines to reveal which frame it selected.
pub fn parse_frame_reply(reply: &[u8]) -> Result<FrameReply, ReplyError> {
    let mut out = FrameReply::default();
    let mut rest = reply;
    while !rest.is_empty() {
        match rest[0] {
            b'F' => {
                let (value, tail) = scan_signed_hex(&rest[1..])?;
                out.frame = Some(value);
                rest = tail;
            }
            b'T' => {
                let (value, tail) = scan_signed_hex(&rest[1..])?;
                out.tracepoint = Some(value);
                rest = tail;
            }
            b'O' if rest.starts_with(b"OK") => rest = &rest[2..],
            _ => return Err(ReplyError::UnexpectedReply(lossy(reply))),
        }
    }
    Ok(out)
}

/// Decode an `R…` register-snapshot notification (everything after the
/// `R`), handing each register's raw bytes to the debugger.
///
/// The stream is a repetition of `<regno>:<value>;` where each value is
/// exactly `register_raw_size(regno)` bytes of hex.
pub fn apply_register_snapshot<A: Arch, D: Debugger>(
    dbg: &mut D,
    tail: &[u8],
) -> Result<(), ReplyError> {
    let mut rest = tail;
    while !rest.is_empty() {
        let colon = rest
            .iter()
            .position(|&b| b == b':')
            .ok_or(ReplyError::MalformedRegisterSnapshot)?;
        let regno: usize = decode_hex(&rest[..colon])
            .map_err(|_| ReplyError::MalformedRegisterSnapshot)?;
        rest = &rest[colon + 1..];

        let nbytes = A::register_raw_size(regno);
        let nhex = nbytes * 2;
        if rest.len() < nhex {
            return Err(ReplyError::ShortRegisterValue(regno));
        }
        let mut raw = Vec::with_capacity(nbytes);
        for pair in rest[..nhex].chunks_exact(2) {
            let byte: u8 =
                decode_hex(pair).map_err(|_| ReplyError::ShortRegisterValue(regno))?;
            raw.push(byte);
        }
        rest = &rest[nhex..];

        match rest.first() {
            Some(b';') => rest = &rest[1..],
            _ => return Err(ReplyError::MalformedRegisterSnapshot),
        }

        dbg.supply_register(regno, &raw);
    }
    Ok(())
}
