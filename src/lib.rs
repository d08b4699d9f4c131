//! A host-side implementation of the GDB remote tracepoint protocol.
//!
//! `tracehost` is the engine behind a debugger's `trace`, `actions`,
//! `tstart`, `tstop`, and `tfind` commands. It owns the tracepoint registry,
//! compiles user-authored action lists into their compact wire encoding,
//! drives the `QTinit` / `QTDP` / `QTStart` / `QTStop` / `qTStatus` /
//! `QTFrame` packet exchanges against a remote stub, and tracks which trace
//! frame (if any) the user is currently inspecting.
//!
//! Everything the engine does not own is reached through two traits:
//!
//! - [`Connection`](conn::Connection): a synchronous, packet-level transport
//!   to the stub. Serial-line framing, acks, and checksums live below it.
//! - [`Debugger`](debugger::Debugger): the surrounding debugger (symbol
//!   tables, expression parsing, frame machinery, the console, and the
//!   convenience-variable table of the expression evaluator).
//!
//! Register-file geometry (how many registers, which one is the frame
//! pointer, raw register sizes) is described by an [`Arch`](arch::Arch)
//! implementation, mirroring the numbering the stub uses.
//!
//! The crate never installs a logger; wire traffic is reported via `trace!`,
//! verbose collection narration via `info!`, and user-visible warnings that
//! do not abort a command via `warn!`.

pub mod actions;
pub mod arch;
pub mod collection;
pub mod common;
pub mod conn;
pub mod cursor;
pub mod debugger;
pub mod error;
pub mod host;
pub mod protocol;
pub mod registry;

mod util;

#[cfg(test)]
pub(crate) mod testutil;

pub use common::Addr;
pub use error::Error;
pub use host::{TraceHost, TraceHostBuilder};
pub use protocol::engine::FrameRequest;
