//! The text command surface: one verb table mapping user commands onto
//! [`TraceHost`] operations.

use crate::arch::Arch;
use crate::conn::Connection;
use crate::debugger::Debugger;
use crate::error::{Error, InputError};
use crate::host::{split_token, TraceHost};

/// Parse and execute one command line.
///
/// The verbs are the tracing command set (`trace`, `actions`, `passcount`,
/// `tstart`, `tstop`, `tstatus`, `tfind`, `tdump`, `save-tracepoints`,
/// `enable`/`disable`/`delete tracepoints`, `info tracepoints`,
/// `info scope`). The actions-list pseudo-commands (`collect`,
/// `while-stepping`, `end`) are dispatched to descriptive errors so help
/// text can still enumerate them.
pub fn handle_command<A: Arch, C: Connection, D: Debugger>(
    host: &mut TraceHost<A, C>,
    dbg: &mut D,
    line: &str,
) -> Result<(), Error<D::Error, C::Error>> {
    let (verb, rest) = split_token(line);

    match verb.to_ascii_lowercase().as_str() {
        "" => Ok(()),
        "trace" | "trac" | "tra" | "tr" | "tp" => host.trace(dbg, rest).map(|_| ()),
        "actions" => host.actions(dbg, rest),
        "passcount" => host.passcount(dbg, rest),
        "tstart" => host.tstart(dbg),
        "tstop" => host.tstop(dbg),
        "tstatus" => host.tstatus(dbg),
        "tfind" => host.tfind_command(dbg, rest),
        "tdump" => host.tdump(dbg),
        "save-tracepoints" => {
            let path = rest.trim();
            if path.is_empty() {
                return Err(InputError::MissingArgument("save-tracepoints").into());
            }
            if let Some(script) = host.save_tracepoints() {
                std::fs::write(path, script)
                    .map_err(|_| InputError::CannotOpenFile(path.to_string()))?;
                dbg.print(&format!("Tracepoints saved to file '{}'.\n", path));
            }
            Ok(())
        }
        "enable" | "disable" | "delete" => {
            let (what, nums) = split_token(rest);
            if !what.eq_ignore_ascii_case("tracepoints") {
                return Err(InputError::UnknownCommand(line.trim().to_string()).into());
            }
            match verb.to_ascii_lowercase().as_str() {
                "enable" => host.enable_tracepoints(dbg, nums),
                "disable" => host.disable_tracepoints(dbg, nums),
                _ => host.delete_tracepoints(dbg, nums),
            }
        }
        "info" => {
            let (what, arg) = split_token(rest);
            match what.to_ascii_lowercase().as_str() {
                "tracepoints" | "tp" => {
                    let table = host.info_tracepoints(dbg, arg)?;
                    dbg.print(&table);
                    Ok(())
                }
                "scope" => {
                    let text = host.info_scope(dbg, arg)?;
                    dbg.print(&text);
                    Ok(())
                }
                _ => Err(InputError::UnknownCommand(line.trim().to_string()).into()),
            }
        }
        // Meaningful only inside an `actions` sub-prompt.
        "collect" => Err(InputError::ActionsOnly("collect").into()),
        "while-stepping" => Err(InputError::ActionsOnly("while-stepping").into()),
        "end" => Err(InputError::EndOnly.into()),
        _ => Err(InputError::UnknownCommand(verb.to_string()).into()),
    }
}
