//! Validation and entry of tracepoint action lists.
//!
//! Action lines are kept verbatim on the tracepoint and re-interpreted at
//! compile time; validation happens once, when the user enters a line at
//! the `actions` sub-prompt.

use log::warn;

use crate::common::Addr;
use crate::debugger::{Debugger, ExprNode, SymbolLoc};
use crate::error::{ActionError, InputError};
use crate::registry::Tracepoint;

/// Classification of one action line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionLineKind {
    /// Rejected; the user is prompted for another line.
    Bad,
    /// A `collect` line.
    Generic,
    /// An `end` line.
    End,
    /// A `while-stepping` line.
    Stepping,
}

/// Strip `prefix` from the start of `s`, ASCII-case-insensitively.
pub(crate) fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Split a `collect` operand list on commas, leaving `$(...)` memranges
/// whole.
pub(crate) fn split_collect_items(s: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&s[start..]);
    items
}

/// A parsed `$(...)` literal memrange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedMemrange {
    /// 0 for absolute, else the base register number.
    pub kind: u32,
    pub offset: i64,
    pub size: u64,
}

/// Parse a leading signed integer (decimal or `0x` hex), returning the
/// value and the unconsumed remainder.
fn parse_int_prefix(s: &str) -> Option<(i64, &str)> {
    let s = s.trim_start();
    let (neg, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, s) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(rest) => (16, rest),
        None => (10, s),
    };
    let end = s
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or_else(|| s.len());
    if end == 0 {
        return None;
    }
    let magnitude = i64::from_str_radix(&s[..end], radix).ok()?;
    Some((if neg { -magnitude } else { magnitude }, &s[end..]))
}

/// Parse one `$(…)` literal memrange at `pc`.
///
/// Grammar: `'$(' [register ','] signed-int ',' signed-int ')'`. The size
/// must be positive; a register field is an expression that must resolve
/// to a bare register.
pub fn parse_memrange<D: Debugger>(
    dbg: &mut D,
    pc: Addr,
    text: &str,
) -> Result<ParsedMemrange, ActionError<D::Error>> {
    let inner = text
        .trim()
        .strip_prefix("$(")
        .ok_or(InputError::MemrangeBadNumber)?;
    let inner = match inner.find(')') {
        Some(close) => &inner[..close],
        None => return Err(InputError::MemrangeMissingParen.into()),
    };

    let mut rest = inner.trim_start();
    let kind = if rest.starts_with('$') {
        let comma = rest.find(',').ok_or(InputError::MemrangeMissingComma)?;
        let register = rest[..comma].trim();
        rest = &rest[comma + 1..];
        match dbg
            .parse_expression(register, pc)
            .map_err(ActionError::Debugger)?
        {
            ExprNode::Register(regno) => regno as u32,
            _ => return Err(InputError::MemrangeBadRegister.into()),
        }
    } else {
        0
    };

    let (offset, rest) = parse_int_prefix(rest).ok_or(InputError::MemrangeBadNumber)?;
    let rest = rest
        .trim_start()
        .strip_prefix(',')
        .ok_or(InputError::MemrangeMissingComma)?;
    let (size, rest) = parse_int_prefix(rest).ok_or(InputError::MemrangeBadNumber)?;
    if size <= 0 {
        return Err(InputError::MemrangeBadSize(size).into());
    }
    if !rest.trim().is_empty() {
        return Err(InputError::MemrangeMissingParen.into());
    }

    Ok(ParsedMemrange {
        kind,
        offset,
        size: size as u64,
    })
}

/// Validate one line of an action list against tracepoint `t`.
///
/// `while-stepping` lines record their step count on `t` as a side effect.
/// Rejections that only deserve a warning return [`ActionLineKind::Bad`];
/// malformed memranges and debugger failures abort the whole entry.
pub fn validate_action_line<D: Debugger>(
    dbg: &mut D,
    t: &mut Tracepoint,
    line: &str,
) -> Result<ActionLineKind, ActionError<D::Error>> {
    let p = line.trim_start();

    if p.is_empty() {
        return Ok(ActionLineKind::Bad);
    }

    if let Some(rest) = strip_prefix_ci(p, "collect") {
        if rest.trim().is_empty() {
            warn!("collect: enter variable name or register");
            return Ok(ActionLineKind::Bad);
        }
        for item in split_collect_items(rest) {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            if let Some(pseudo) = item.strip_prefix('$') {
                let low = pseudo.to_ascii_lowercase();
                if low.starts_with("reg") || low.starts_with("arg") || low.starts_with("loc") {
                    continue;
                }
                if pseudo.starts_with('(') {
                    parse_memrange(dbg, t.address, item)?;
                    continue;
                }
                // Everything else falls through to the expression parser;
                // register expressions pass, convenience variables land on
                // a non-collectable opcode and are rejected below.
            }
            match dbg
                .parse_expression(item, t.address)
                .map_err(ActionError::Debugger)?
            {
                ExprNode::Register(_) => {}
                ExprNode::Symbol(sym) => match sym.loc {
                    SymbolLoc::Const { value } => {
                        warn!(
                            "{} is constant (value {}): will not be collected",
                            sym.name, value
                        );
                        return Ok(ActionLineKind::Bad);
                    }
                    SymbolLoc::OptimizedOut => {
                        warn!("{} is optimized away and cannot be collected", sym.name);
                        return Ok(ActionLineKind::Bad);
                    }
                    _ => {}
                },
                ExprNode::Long(_) | ExprNode::Other => {
                    warn!("collect: enter variable name or register");
                    return Ok(ActionLineKind::Bad);
                }
            }
        }
        return Ok(ActionLineKind::Generic);
    }

    if let Some(rest) = strip_prefix_ci(p, "while-stepping") {
        let rest = rest.trim();
        if rest.is_empty() {
            t.step_count = -1;
        } else {
            match parse_int_prefix(rest).map(|(n, _)| n).unwrap_or(0) {
                0 => {
                    warn!("'{}' evaluates to zero -- command ignored", rest);
                    return Ok(ActionLineKind::Bad);
                }
                n => t.step_count = n,
            }
        }
        return Ok(ActionLineKind::Stepping);
    }

    if strip_prefix_ci(p, "end").is_some() {
        return Ok(ActionLineKind::End);
    }

    warn!("'{}' is not a supported tracepoint action", p);
    Ok(ActionLineKind::Bad)
}

const PROMPT: &str = "> ";
const STEPPING_PROMPT: &str = "  > ";

/// Run the interactive `actions` sub-prompt for `t`, replacing its action
/// list.
///
/// The previous list is discarded on entry; the new list is committed only
/// when the user finishes it with a bare `end`. On any abnormal exit
/// (interrupt, end-of-input, debugger error) the tracepoint is left with an
/// empty action list and the keyboard-interrupt disposition is restored.
pub fn read_actions<D: Debugger>(
    dbg: &mut D,
    t: &mut Tracepoint,
) -> Result<(), ActionError<D::Error>> {
    t.actions.clear();

    // Control-C must quit instantly while in this loop rather than wait for
    // a newline.
    dbg.set_immediate_interrupts(true);
    let result = read_action_lines(dbg, t);
    dbg.set_immediate_interrupts(false);

    t.actions = result?;
    Ok(())
}

fn read_action_lines<D: Debugger>(
    dbg: &mut D,
    t: &mut Tracepoint,
) -> Result<Vec<String>, ActionError<D::Error>> {
    let mut lines: Vec<String> = Vec::new();
    let mut stepping = false;

    loop {
        let prompt = if stepping { STEPPING_PROMPT } else { PROMPT };
        let line = match dbg.read_line(prompt).map_err(ActionError::Debugger)? {
            Some(line) => line,
            None => return Err(InputError::Cancelled.into()),
        };

        let kind = validate_action_line(dbg, t, &line)?;
        if kind == ActionLineKind::Bad {
            continue;
        }
        lines.push(line);

        match kind {
            ActionLineKind::Stepping => {
                if stepping {
                    warn!("already processing 'while-stepping'");
                } else {
                    stepping = true;
                }
            }
            ActionLineKind::End => {
                if stepping {
                    stepping = false;
                } else {
                    break;
                }
            }
            ActionLineKind::Generic | ActionLineKind::Bad => {}
        }
    }

    Ok(lines)
}
