use log::{info, warn};

use crate::arch::Arch;
use crate::collection::CollectionList;
use crate::common::Addr;
use crate::debugger::{Debugger, Symbol, SymbolLoc};
use crate::error::InternalError;

/// Which symbol family a scope walk collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// `$locals`: variables local to the block/function scope.
    Locals,
    /// `$args`: function arguments.
    Args,
}

/// Add one symbol's location to `list`, or explain why it cannot be
/// collected.
///
/// Symbols without a collectable location (constants, typedefs, plain
/// stack arguments, optimized-out variables) are skipped; skipping one
/// item never aborts the surrounding `collect`.
pub fn collect_symbol<A: Arch>(
    list: &mut CollectionList,
    sym: &Symbol,
) -> Result<(), InternalError> {
    match sym.loc {
        SymbolLoc::Const { value } => {
            info!(
                "{} is constant, value is {}: will not be collected",
                sym.name, value
            );
        }
        SymbolLoc::ConstBytes { .. }
        | SymbolLoc::Typedef
        | SymbolLoc::Label { .. }
        | SymbolLoc::Block { .. } => {
            info!("{}: nothing to collect for this symbol", sym.name);
        }
        SymbolLoc::Static { addr } => {
            info!("static {}: collect {} bytes at {:#x}", sym.name, sym.size, addr);
            list.add_memrange(0, addr as i64, sym.size)?;
        }
        SymbolLoc::Register { regno } | SymbolLoc::RegParm { regno } => {
            info!("register {}: ", sym.name);
            list.add_register(regno)?;
        }
        SymbolLoc::RegParmAddr { regno } => {
            info!(
                "{}: collect {} bytes at offset 0 from reg {}",
                sym.name, sym.size, regno
            );
            list.add_memrange(regno as u32, 0, sym.size)?;
        }
        SymbolLoc::Local { offset } | SymbolLoc::LocalArg { offset } => {
            info!(
                "{}: collect {} bytes at offset {} from frame ptr reg {}",
                sym.name,
                sym.size,
                offset,
                A::FP_REGNUM
            );
            list.add_memrange(A::FP_REGNUM as u32, offset, sym.size)?;
        }
        SymbolLoc::Basereg { basereg, offset } | SymbolLoc::BaseregArg { basereg, offset } => {
            info!(
                "{}: collect {} bytes at offset {} from basereg {}",
                sym.name, sym.size, offset, basereg
            );
            list.add_memrange(basereg as u32, offset, sym.size)?;
        }
        SymbolLoc::Arg { .. } | SymbolLoc::RefArg { .. } => {
            warn!(
                "don't know how to collect plain stack argument {}; skipped",
                sym.name
            );
        }
        SymbolLoc::Unresolved => {
            warn!("don't know how to collect unresolved symbol {}", sym.name);
        }
        SymbolLoc::OptimizedOut => {
            warn!("{} has been optimized out of existence", sym.name);
        }
    }
    Ok(())
}

fn in_family(loc: &SymbolLoc, kind: ScopeKind) -> bool {
    match kind {
        ScopeKind::Locals => matches!(
            loc,
            SymbolLoc::Local { .. }
                | SymbolLoc::Static { .. }
                | SymbolLoc::Register { .. }
                | SymbolLoc::Basereg { .. }
        ),
        ScopeKind::Args => matches!(
            loc,
            SymbolLoc::Arg { .. }
                | SymbolLoc::LocalArg { .. }
                | SymbolLoc::RefArg { .. }
                | SymbolLoc::RegParm { .. }
                | SymbolLoc::RegParmAddr { .. }
                | SymbolLoc::BaseregArg { .. }
        ),
    }
}

/// Collect every in-scope local or argument at `pc`, walking outward from
/// the innermost block until the enclosing function block.
pub fn add_scope_symbols<A: Arch, D: Debugger>(
    list: &mut CollectionList,
    dbg: &D,
    pc: Addr,
    kind: ScopeKind,
) -> Result<(), InternalError> {
    let mut count = 0;
    for block in dbg.scope_blocks(pc) {
        for sym in &block.symbols {
            if in_family(&sym.loc, kind) {
                count += 1;
                collect_symbol::<A>(list, sym)?;
            }
        }
        if block.is_function {
            break;
        }
    }
    if count == 0 {
        warn!(
            "no {} found in scope",
            match kind {
                ScopeKind::Locals => "locals",
                ScopeKind::Args => "args",
            }
        );
    }
    Ok(())
}
