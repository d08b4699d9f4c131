//! `TraceHost`: the user-level operations of the tracepoint subsystem.
//!
//! One instance owns the registry, the protocol engine, the trace-frame
//! cursor, and the compiler's scratch lists. The surrounding debugger is
//! passed `&mut` into every operation, mirroring how the engine is driven
//! from a command loop.

mod builder;
mod dispatch;

pub use builder::{BuilderError, TraceHostBuilder};
pub use dispatch::handle_command;

use core::fmt::Write;

use log::warn;

use crate::actions::{read_actions, split_collect_items, strip_prefix_ci};
use crate::arch::Arch;
use crate::common::Addr;
use crate::conn::Connection;
use crate::collection::Scratch;
use crate::cursor::TraceFrameCursor;
use crate::debugger::{Debugger, SymbolLoc};
use crate::error::{Error, InputError};
use crate::protocol::engine::{FrameRequest, TraceEngine};
use crate::registry::TracepointRegistry;

/// The host side of the tracepoint subsystem.
pub struct TraceHost<A: Arch, C: Connection> {
    registry: TracepointRegistry,
    engine: TraceEngine<A, C>,
    cursor: TraceFrameCursor,
    scratch: Scratch,
}

impl<A: Arch, C: Connection> TraceHost<A, C> {
    /// Create a host over `conn` with default buffer sizes.
    pub fn new(conn: C) -> TraceHost<A, C> {
        TraceHost::from_engine(TraceEngine::new(conn))
    }

    /// Start building a host with a custom configuration.
    pub fn builder(conn: C) -> TraceHostBuilder<A, C> {
        TraceHostBuilder::new(conn)
    }

    pub(crate) fn from_engine(engine: TraceEngine<A, C>) -> TraceHost<A, C> {
        TraceHost {
            registry: TracepointRegistry::new(),
            engine,
            cursor: TraceFrameCursor::new(),
            scratch: Scratch::new(),
        }
    }

    pub fn registry(&self) -> &TracepointRegistry {
        &self.registry
    }

    pub fn cursor(&self) -> &TraceFrameCursor {
        &self.cursor
    }

    /// `trace <locspec>`: create a tracepoint at each location the spec
    /// resolves to. Returns the numbers created.
    pub fn trace<D: Debugger>(
        &mut self,
        dbg: &mut D,
        spec: &str,
    ) -> Result<Vec<u32>, Error<D::Error, C::Error>> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(InputError::MissingArgument("trace").into());
        }

        let sals = dbg.resolve_source(spec).map_err(Error::Debugger)?;
        let mut created = Vec::with_capacity(sals.len());
        for sal in &sals {
            created.push(self.registry.create(dbg, sal, Some(spec.to_string())));
        }

        if created.len() > 1 {
            dbg.print("Multiple tracepoints were set.\n");
            dbg.print("Use the \"delete\" command to delete unwanted tracepoints.\n");
        }
        Ok(created)
    }

    /// `actions [tpnum]`: replace a tracepoint's action list from the
    /// interactive sub-prompt.
    pub fn actions<D: Debugger>(
        &mut self,
        dbg: &mut D,
        arg: &str,
    ) -> Result<(), Error<D::Error, C::Error>> {
        let number = match self.registry.lookup_token(dbg, arg).map_err(Error::Input)? {
            Some(n) => n,
            None => return Ok(()),
        };
        dbg.print(&format!(
            "Enter actions for tracepoint {}, one per line.\n",
            number
        ));
        if let Some(t) = self.registry.get_mut(number) {
            read_actions(dbg, t)?;
        }
        Ok(())
    }

    /// `passcount <count> [tpnum|all]`: set the stop-after count.
    pub fn passcount<D: Debugger>(
        &mut self,
        dbg: &mut D,
        args: &str,
    ) -> Result<(), Error<D::Error, C::Error>> {
        let args = args.trim();
        if args.is_empty() {
            return Err(InputError::MissingArgument("passcount").into());
        }

        let digits_end = args
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or_else(|| args.len());
        let count: u64 = args[..digits_end].parse().unwrap_or(0);
        let rest = args[digits_end..].trim();

        let targets: Vec<u32> = if strip_prefix_ci(rest, "all").is_some() {
            self.registry.iter().map(|t| t.number).collect()
        } else {
            match self.registry.lookup_token(dbg, rest).map_err(Error::Input)? {
                Some(n) => vec![n],
                None => return Ok(()),
            }
        };

        for number in targets {
            if let Some(t) = self.registry.get_mut(number) {
                t.pass_count = count;
                dbg.print(&format!(
                    "Setting tracepoint {}'s passcount to {}\n",
                    number, count
                ));
            }
        }
        Ok(())
    }

    /// `enable tracepoints [nums…]`; no numbers means all.
    pub fn enable_tracepoints<D: Debugger>(
        &mut self,
        dbg: &mut D,
        args: &str,
    ) -> Result<(), Error<D::Error, C::Error>> {
        for number in self
            .registry
            .resolve_spec_list(dbg, args)
            .map_err(Error::Input)?
        {
            if let Some(t) = self.registry.get_mut(number) {
                t.enabled = true;
            }
        }
        Ok(())
    }

    /// `disable tracepoints [nums…]`; no numbers means all.
    pub fn disable_tracepoints<D: Debugger>(
        &mut self,
        dbg: &mut D,
        args: &str,
    ) -> Result<(), Error<D::Error, C::Error>> {
        for number in self
            .registry
            .resolve_spec_list(dbg, args)
            .map_err(Error::Input)?
        {
            if let Some(t) = self.registry.get_mut(number) {
                t.enabled = false;
            }
        }
        Ok(())
    }

    /// `delete tracepoints [nums…]`; no numbers means all.
    pub fn delete_tracepoints<D: Debugger>(
        &mut self,
        dbg: &mut D,
        args: &str,
    ) -> Result<(), Error<D::Error, C::Error>> {
        for number in self
            .registry
            .resolve_spec_list(dbg, args)
            .map_err(Error::Input)?
        {
            self.registry.delete(dbg, number);
        }
        Ok(())
    }

    /// `tstart`: download the registry and start collection. On success
    /// every old trace frame is invalid and the cursor returns to live
    /// debugging.
    pub fn tstart<D: Debugger>(&mut self, dbg: &mut D) -> Result<(), Error<D::Error, C::Error>> {
        self.engine.start(dbg, &self.registry, &mut self.scratch)?;
        self.cursor.select(dbg, -1, -1);
        Ok(())
    }

    /// `tstop`: stop collection.
    pub fn tstop<D: Debugger>(&mut self, dbg: &mut D) -> Result<(), Error<D::Error, C::Error>> {
        self.engine.stop(dbg)
    }

    /// `tstatus`: query collection status.
    pub fn tstatus<D: Debugger>(&mut self, dbg: &mut D) -> Result<(), Error<D::Error, C::Error>> {
        self.engine.status(dbg)
    }

    /// Select a trace frame and synchronize the cursor with the stub's
    /// answer.
    pub fn tfind<D: Debugger>(
        &mut self,
        dbg: &mut D,
        req: FrameRequest,
    ) -> Result<(), Error<D::Error, C::Error>> {
        let (frame, tracepoint) = self.engine.select_frame(dbg, &req)?;
        self.cursor.select(dbg, frame, tracepoint);
        Ok(())
    }

    /// `tfind [n|-|pc [addr]|tracepoint [num]|line [spec]|range a,b|outside
    /// a,b|start|end|none]`, with the same defaults as the debugger's
    /// command: no argument advances one frame, `-` goes back one.
    pub fn tfind_command<D: Debugger>(
        &mut self,
        dbg: &mut D,
        args: &str,
    ) -> Result<(), Error<D::Error, C::Error>> {
        let args = args.trim();

        let req = if args.is_empty() {
            match self.cursor.frame_number() {
                -1 => FrameRequest::Num(0),
                n => FrameRequest::Num(n + 1),
            }
        } else if args == "-" {
            match self.cursor.frame_number() {
                -1 => return Err(InputError::NotDebuggingTraceBuffer.into()),
                0 => return Err(InputError::AtStartOfTraceBuffer.into()),
                n => FrameRequest::Num(n - 1),
            }
        } else {
            let (verb, operand) = split_token(args);
            match verb.to_ascii_lowercase().as_str() {
                "start" => FrameRequest::Num(0),
                "end" | "none" => FrameRequest::Num(-1),
                "pc" => {
                    let pc = if operand.is_empty() {
                        dbg.read_pc()
                    } else {
                        dbg.evaluate_address(operand).map_err(Error::Debugger)?
                    };
                    FrameRequest::AtPc(pc)
                }
                "tracepoint" => {
                    let number = if operand.is_empty() {
                        match self.cursor.tracepoint_number() {
                            -1 => return Err(InputError::NoCurrentTracepoint.into()),
                            n => n as u32,
                        }
                    } else {
                        dbg.evaluate_address(operand).map_err(Error::Debugger)? as u32
                    };
                    FrameRequest::Hit(number)
                }
                "line" => self.line_request(dbg, operand)?,
                "range" => {
                    let (start, stop) = self.addr_pair(dbg, operand, "tfind range")?;
                    FrameRequest::Range(start, stop)
                }
                "outside" => {
                    let (start, stop) = self.addr_pair(dbg, operand, "tfind outside")?;
                    FrameRequest::Outside(start, stop)
                }
                _ => {
                    let n = match args.parse::<i64>() {
                        Ok(n) => n,
                        Err(_) => dbg.evaluate_address(args).map_err(Error::Debugger)? as i64,
                    };
                    FrameRequest::Num(n as i32)
                }
            }
        };

        self.tfind(dbg, req)
    }

    fn addr_pair<D: Debugger>(
        &mut self,
        dbg: &mut D,
        operand: &str,
        what: &'static str,
    ) -> Result<(Addr, Addr), Error<D::Error, C::Error>> {
        let operand = operand.trim();
        if operand.is_empty() {
            return Err(InputError::MissingArgument(what).into());
        }
        match operand.find(',') {
            Some(comma) => {
                let start = dbg
                    .evaluate_address(operand[..comma].trim())
                    .map_err(Error::Debugger)?;
                let stop = dbg
                    .evaluate_address(operand[comma + 1..].trim())
                    .map_err(Error::Debugger)?;
                Ok((start, stop))
            }
            None => {
                // XXX a single address selects [addr, addr + 1); this is
                // the documented contract for the no-comma form.
                let start = dbg.evaluate_address(operand).map_err(Error::Debugger)?;
                Ok((start, start + 1))
            }
        }
    }

    fn line_request<D: Debugger>(
        &mut self,
        dbg: &mut D,
        operand: &str,
    ) -> Result<FrameRequest, Error<D::Error, C::Error>> {
        let operand = operand.trim();
        let sal = if operand.is_empty() {
            dbg.find_pc_line(dbg.read_pc())
                .ok_or(InputError::NoLineNumberInfo)?
        } else {
            let mut sals = dbg.resolve_source(operand).map_err(Error::Debugger)?;
            if sals.is_empty() {
                return Err(InputError::NoLineNumberInfo.into());
            }
            sals.remove(0)
        };

        let (start, end) = dbg
            .find_line_pc_range(&sal)
            .ok_or(InputError::NoLineNumberInfo)?;
        if start == end {
            return Err(InputError::LineHasNoCode(sal.line).into());
        }

        // An explicit line looks for frames within it; no operand looks
        // for frames away from the current line.
        Ok(if operand.is_empty() {
            FrameRequest::Outside(start, end - 1)
        } else {
            FrameRequest::Range(start, end - 1)
        })
    }

    /// `tdump`: route every item collected at the current frame to the
    /// debugger's display hooks. Trap frames show trap-time collections,
    /// stepping frames show `while-stepping` collections.
    pub fn tdump<D: Debugger>(&mut self, dbg: &mut D) -> Result<(), Error<D::Error, C::Error>> {
        let tpnum = self.cursor.tracepoint_number();
        if tpnum == -1 {
            warn!("no current trace frame");
            return Ok(());
        }
        let t = match self.registry.get(tpnum as u32) {
            Some(t) => t,
            None => return Err(InputError::UnknownCurrentTracepoint(tpnum).into()),
        };

        dbg.print(&format!(
            "Data collected at tracepoint {}, trace frame {}:\n",
            tpnum,
            self.cursor.frame_number()
        ));

        // The frame is a trap frame iff its PC equals the tracepoint's;
        // otherwise it was collected during single-stepping.
        let stepping_frame = dbg.read_pc() != t.address;
        let mut stepping_actions = false;

        for line in &t.actions {
            let line = line.trim_start();
            if strip_prefix_ci(line, "while-stepping").is_some() {
                stepping_actions = true;
            } else if strip_prefix_ci(line, "end").is_some() {
                stepping_actions = false;
            } else if let Some(rest) = strip_prefix_ci(line, "collect") {
                if stepping_frame != stepping_actions {
                    continue;
                }
                for item in split_collect_items(rest) {
                    let item = item.trim();
                    if item.is_empty() {
                        continue;
                    }
                    let low = item.to_ascii_lowercase();
                    if low.starts_with("$reg") {
                        dbg.show_registers();
                    } else if low.starts_with("$loc") {
                        dbg.show_locals();
                    } else if low.starts_with("$arg") {
                        dbg.show_args();
                    } else {
                        dbg.print_expression(item);
                    }
                }
            }
        }
        Ok(())
    }

    /// `save-tracepoints`: render the registry as a re-executable script,
    /// or `None` when there is nothing to save.
    pub fn save_tracepoints(&self) -> Option<String> {
        if self.registry.is_empty() {
            warn!("save-tracepoints: no tracepoints to save");
            return None;
        }

        let mut out = String::new();
        for t in self.registry.iter() {
            match &t.addr_string {
                Some(spec) => {
                    let _ = writeln!(out, "trace {}", spec);
                }
                None => {
                    let _ = writeln!(out, "trace *{:#x}", t.address);
                }
            }
            if t.pass_count != 0 {
                let _ = writeln!(out, "  passcount {}", t.pass_count);
            }
            if !t.actions.is_empty() {
                let _ = writeln!(out, "  actions");
                let mut indent = "    ";
                for line in &t.actions {
                    let line = line.trim_start();
                    let _ = writeln!(out, "{}{}", indent, line);
                    if strip_prefix_ci(line, "while-stepping").is_some() {
                        indent = "      ";
                    } else if strip_prefix_ci(line, "end").is_some() {
                        indent = "    ";
                    }
                }
            }
        }
        Some(out)
    }

    /// `info tracepoints [n]`: render the status table.
    pub fn info_tracepoints<D: Debugger>(
        &self,
        dbg: &mut D,
        arg: &str,
    ) -> Result<String, Error<D::Error, C::Error>> {
        let filter: i64 = match arg.trim() {
            "" => -1,
            spec => dbg.evaluate_address(spec).map_err(Error::Debugger)? as i64,
        };

        let mut out = String::new();
        let mut found = false;
        for t in self
            .registry
            .iter()
            .filter(|t| filter == -1 || i64::from(t.number) == filter)
        {
            if !found {
                out.push_str("Num Enb Address    PassC StepC What\n");
                found = true;
            }
            let _ = write!(
                out,
                "{:<3} {:<3} {:08x}   {:<5} {:<5} ",
                t.number,
                if t.enabled { "y" } else { "n" },
                t.address,
                t.pass_count,
                t.step_count
            );
            match &t.source_file {
                Some(file) => {
                    if let Some(fun) = dbg.find_pc_function(t.address) {
                        let _ = write!(out, "in {} at {}:{}", fun, file, t.line_number);
                    } else {
                        let _ = write!(out, "{}:{}", file, t.line_number);
                    }
                }
                None => match dbg.find_pc_function(t.address) {
                    Some(fun) => {
                        let _ = write!(out, "{:#x} <{}>", t.address, fun);
                    }
                    None => {
                        let _ = write!(out, "{:#x}", t.address);
                    }
                },
            }
            out.push('\n');

            if !t.actions.is_empty() {
                let _ = writeln!(out, "  Actions for tracepoint {}:", t.number);
                for line in &t.actions {
                    let _ = writeln!(out, "\t{}", line.trim_start());
                }
            }
        }

        if !found {
            out = if filter == -1 {
                "No tracepoints.\n".to_string()
            } else {
                format!("No tracepoint number {}.\n", filter)
            };
        }
        Ok(out)
    }

    /// `info scope <locspec>`: describe every symbol in scope at the
    /// location, innermost block outward until the enclosing function.
    pub fn info_scope<D: Debugger>(
        &self,
        dbg: &mut D,
        spec: &str,
    ) -> Result<String, Error<D::Error, C::Error>> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(InputError::MissingArgument("info scope").into());
        }

        let sals = dbg.resolve_source(spec).map_err(Error::Debugger)?;
        let sal = match sals.first() {
            Some(sal) => sal.clone(),
            None => return Ok(String::new()),
        };

        let mut out = String::new();
        let mut count = 0usize;
        for block in dbg.scope_blocks(sal.pc) {
            for sym in &block.symbols {
                if sym.name.is_empty() {
                    continue;
                }
                if count == 0 {
                    let _ = writeln!(out, "Scope for {}:", spec);
                }
                count += 1;

                let _ = write!(out, "Symbol {} is ", sym.name);
                let described = describe_location::<A>(&sym.loc);
                out.push_str(&described.text);
                if described.with_length {
                    let _ = writeln!(out, ", length {}.", sym.size);
                } else {
                    out.push('\n');
                }
            }
            if block.is_function {
                break;
            }
        }

        if count == 0 {
            let _ = writeln!(out, "Scope for {} contains no locals or arguments.", spec);
        }
        Ok(out)
    }
}

struct LocationDescription {
    text: String,
    with_length: bool,
}

fn describe_location<A: Arch>(loc: &SymbolLoc) -> LocationDescription {
    fn reg_name<A: Arch>(regno: usize) -> &'static str {
        A::register_name(regno).unwrap_or("?")
    }

    let (text, with_length) = match loc {
        SymbolLoc::Const { value } => {
            (format!("a constant with value {} ({:#x})", value, value), true)
        }
        SymbolLoc::ConstBytes { bytes } => {
            let mut text = "constant bytes:".to_string();
            for b in bytes {
                let _ = write!(text, " {:02x}", b);
            }
            (text, true)
        }
        SymbolLoc::Static { addr } => {
            (format!("in static storage at address {:#x}", addr), true)
        }
        SymbolLoc::Register { regno } => (
            format!("a local variable in register ${}", reg_name::<A>(*regno)),
            true,
        ),
        SymbolLoc::RegParm { regno } => (
            format!("an argument in register ${}", reg_name::<A>(*regno)),
            true,
        ),
        SymbolLoc::RegParmAddr { regno } => (
            format!(
                "the address of an argument, in register ${}",
                reg_name::<A>(*regno)
            ),
            true,
        ),
        SymbolLoc::Arg { offset } | SymbolLoc::LocalArg { offset } => (
            format!("an argument at stack/frame offset {}", offset),
            true,
        ),
        SymbolLoc::Local { offset } => (format!("a local variable at frame offset {}", offset), true),
        SymbolLoc::RefArg { offset } => (format!("a reference argument at offset {}", offset), true),
        SymbolLoc::Basereg { basereg, offset } => (
            format!(
                "a variable at offset {} from register ${}",
                offset,
                reg_name::<A>(*basereg)
            ),
            true,
        ),
        SymbolLoc::BaseregArg { basereg, offset } => (
            format!(
                "an argument at offset {} from register ${}",
                offset,
                reg_name::<A>(*basereg)
            ),
            true,
        ),
        SymbolLoc::Label { addr } => (format!("a label at address {:#x}", addr), true),
        SymbolLoc::Block { addr } => (format!("a function at address {:#x}", addr), true),
        SymbolLoc::Typedef => ("a typedef.".to_string(), false),
        SymbolLoc::Unresolved => ("an unresolved static symbol".to_string(), true),
        SymbolLoc::OptimizedOut => ("optimized out.".to_string(), false),
    };
    LocationDescription { text, with_length }
}

pub(crate) fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], s[end..].trim_start()),
        None => (s, ""),
    }
}
