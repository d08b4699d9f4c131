//! Compiled collection state: what to capture when a tracepoint is hit.
//!
//! A user's `collect` lines reference symbols, registers, and literal
//! memory ranges; compilation reduces all of them to a register bitmap
//! plus a sorted, merged list of memory ranges per tracepoint, ready for
//! wire encoding.

mod compile;
mod list;
mod symbols;

pub use compile::{encode_actions, EncodedActions, Scratch};
pub use list::{CollectionList, Memrange, REGS_MASK_LEN};
pub use symbols::{add_scope_symbols, collect_symbol, ScopeKind};
