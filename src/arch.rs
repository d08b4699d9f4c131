//! Register-file geometry of the traced target.

/// Architecture-level facts the tracepoint engine needs about the remote
/// target's register file.
///
/// The host and the stub must agree on register numbering; implementations
/// of this trait describe the numbering the stub uses, which is not
/// necessarily the numbering of the debugger's own register view.
pub trait Arch {
    /// Number of registers in the target's register file.
    ///
    /// `collect $regs` records every register in `[0, NUM_REGS)`.
    const NUM_REGS: usize;

    /// Register number of the frame pointer.
    ///
    /// Locals and arguments with frame-relative locations are collected as
    /// offsets from this register.
    const FP_REGNUM: usize;

    /// Largest virtual size, in bytes, of any register.
    ///
    /// Two adjacent memory ranges of the same kind separated by a gap of at
    /// most this many bytes are merged into a single collection descriptor.
    const MAX_REGISTER_VIRTUAL_SIZE: u64;

    /// Size in bytes of register `regno`'s raw representation on the wire.
    fn register_raw_size(regno: usize) -> usize;

    /// Human-readable name of register `regno`, if it has one.
    fn register_name(regno: usize) -> Option<&'static str>;
}
