use crate::actions::{parse_memrange, split_collect_items, strip_prefix_ci};
use crate::arch::Arch;
use crate::collection::symbols::{add_scope_symbols, collect_symbol, ScopeKind};
use crate::collection::CollectionList;
use crate::common::Addr;
use crate::debugger::{Debugger, ExprNode};
use crate::error::ActionError;
use crate::registry::Tracepoint;

/// The two scratch collection lists, reused across compilations.
///
/// `sort_merge` and `stringify` are not reentrant on the same list, and
/// each compilation begins by clearing both.
#[derive(Debug, Default)]
pub struct Scratch {
    pub(crate) tracepoint_list: CollectionList,
    pub(crate) stepping_list: CollectionList,
}

impl Scratch {
    pub fn new() -> Scratch {
        Scratch::default()
    }
}

/// The wire form of one tracepoint's action list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedActions {
    /// Tail of the `QTDP` body describing trap-time collection, or `None`
    /// when nothing is collected at the trap.
    pub tdp_actions: Option<String>,
    /// Collection descriptors for the single-stepping phase, sent after an
    /// `S` separator, or `None` when there are no stepping actions.
    pub stepping_actions: Option<String>,
}

/// Compile `t`'s action lines into their wire encoding.
///
/// `collect` operands are routed into the trap-time list until a
/// `while-stepping` line switches the target to the stepping list; `end`
/// switches back, and a second `end` terminates the walk. Both lists are
/// sort-merged before stringification, so equal action lists always
/// produce equal wire strings.
pub fn encode_actions<A: Arch, D: Debugger>(
    dbg: &mut D,
    t: &Tracepoint,
    scratch: &mut Scratch,
) -> Result<EncodedActions, ActionError<D::Error>> {
    scratch.tracepoint_list.clear();
    scratch.stepping_list.clear();
    let mut stepping = false;

    'lines: for line in &t.actions {
        let line = line.trim_start();

        if let Some(rest) = strip_prefix_ci(line, "collect") {
            for item in split_collect_items(rest) {
                let item = item.trim();
                if item.is_empty() {
                    continue;
                }
                let list = if stepping {
                    &mut scratch.stepping_list
                } else {
                    &mut scratch.tracepoint_list
                };
                compile_item::<A, D>(dbg, list, t.address, item)?;
            }
        } else if strip_prefix_ci(line, "while-stepping").is_some() {
            stepping = true;
        } else if strip_prefix_ci(line, "end").is_some() {
            if stepping {
                stepping = false;
            } else {
                break 'lines;
            }
        }
    }

    scratch.tracepoint_list.sort_merge(A::MAX_REGISTER_VIRTUAL_SIZE);
    scratch.stepping_list.sort_merge(A::MAX_REGISTER_VIRTUAL_SIZE);

    Ok(EncodedActions {
        tdp_actions: scratch.tracepoint_list.stringify(),
        stepping_actions: scratch.stepping_list.stringify(),
    })
}

fn compile_item<A: Arch, D: Debugger>(
    dbg: &mut D,
    list: &mut CollectionList,
    addr: Addr,
    item: &str,
) -> Result<(), ActionError<D::Error>> {
    if let Some(pseudo) = item.strip_prefix('$') {
        let low = pseudo.to_ascii_lowercase();
        if low.starts_with("reg") {
            for regno in 0..A::NUM_REGS {
                list.add_register(regno)?;
            }
            return Ok(());
        }
        if low.starts_with("arg") {
            add_scope_symbols::<A, D>(list, dbg, addr, ScopeKind::Args)?;
            return Ok(());
        }
        if low.starts_with("loc") {
            add_scope_symbols::<A, D>(list, dbg, addr, ScopeKind::Locals)?;
            return Ok(());
        }
        if pseudo.starts_with('(') {
            let m = parse_memrange(dbg, addr, item)?;
            list.add_memrange(m.kind, m.offset, m.size)?;
            return Ok(());
        }
    }

    match dbg
        .parse_expression(item, addr)
        .map_err(ActionError::Debugger)?
    {
        ExprNode::Register(regno) => list.add_register(regno)?,
        ExprNode::Symbol(sym) => collect_symbol::<A>(list, &sym)?,
        // Anything else was rejected at validation time; ignore it rather
        // than miscollect.
        ExprNode::Long(_) | ExprNode::Other => {}
    }
    Ok(())
}
