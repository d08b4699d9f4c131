//! Types and definitions used across the crate.

/// An address (or PC) on the traced target.
pub type Addr = u64;
