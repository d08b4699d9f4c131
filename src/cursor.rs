//! Host-side record of which trace frame is being inspected.

use crate::common::Addr;
use crate::debugger::{Debugger, Sal, TraceValue};

/// The trace-frame cursor: `(frame, tracepoint, pc)` plus the cached
/// source context of the selected frame.
///
/// The cursor shadows its state into the convenience variables
/// `$trace_frame`, `$tracepoint`, `$trace_line`, `$trace_func`, and
/// `$trace_file`; every transition rewrites the whole set, so the
/// expression evaluator never sees a mix of old and new values.
#[derive(Debug)]
pub struct TraceFrameCursor {
    frame: i32,
    tracepoint: i32,
    pc: i64,
    fun: Option<String>,
    sal: Option<Sal>,
}

impl TraceFrameCursor {
    /// A cursor in the "live debugging, no frame selected" state.
    pub fn new() -> TraceFrameCursor {
        TraceFrameCursor {
            frame: -1,
            tracepoint: -1,
            pc: -1,
            fun: None,
            sal: None,
        }
    }

    /// Selected frame number, or −1 when debugging live state.
    pub fn frame_number(&self) -> i32 {
        self.frame
    }

    /// Tracepoint whose hit produced the selected frame, or −1.
    pub fn tracepoint_number(&self) -> i32 {
        self.tracepoint
    }

    /// PC of the selected frame.
    pub fn pc(&self) -> Option<Addr> {
        if self.pc < 0 {
            None
        } else {
            Some(self.pc as Addr)
        }
    }

    /// Function containing the selected frame's PC.
    pub fn function(&self) -> Option<&str> {
        self.fun.as_deref()
    }

    /// Source line of the selected frame's PC.
    pub fn sal(&self) -> Option<&Sal> {
        self.sal.as_ref()
    }

    /// Move the cursor to `(frame, tracepoint)`.
    ///
    /// Every transition runs the same sequence, in this order: invalidate
    /// cached frames, mark registers stale, re-select the current frame,
    /// publish the frame/tracepoint variables, then recompute and publish
    /// the source context of the new PC. A transition to frame −1 nulls
    /// the context.
    pub fn select<D: Debugger>(&mut self, dbg: &mut D, frame: i32, tracepoint: i32) {
        dbg.invalidate_frames();
        dbg.registers_changed();
        dbg.reselect_frame();

        self.frame = frame;
        self.tracepoint = tracepoint;
        dbg.set_var("trace_frame", TraceValue::Int(i64::from(frame)));
        dbg.set_var("tracepoint", TraceValue::Int(i64::from(tracepoint)));

        let pc = if frame == -1 { None } else { Some(dbg.read_pc()) };
        self.set_context(dbg, pc);
    }

    fn set_context<D: Debugger>(&mut self, dbg: &mut D, pc: Option<Addr>) {
        match pc {
            None => {
                self.pc = -1;
                self.fun = None;
                self.sal = None;
                dbg.set_var("trace_line", TraceValue::Int(-1));
                dbg.set_var("trace_func", TraceValue::Null);
                dbg.set_var("trace_file", TraceValue::Null);
            }
            Some(pc) => {
                self.pc = pc as i64;
                self.sal = dbg.find_pc_line(pc);
                self.fun = dbg.find_pc_function(pc);

                let line = self.sal.as_ref().map(|s| i64::from(s.line)).unwrap_or(-1);
                dbg.set_var("trace_line", TraceValue::Int(line));

                let func = match &self.fun {
                    Some(name) => TraceValue::Str(name.clone()),
                    None => TraceValue::Null,
                };
                dbg.set_var("trace_func", func);

                let file = match self.sal.as_ref().and_then(|s| s.file.as_ref()) {
                    Some(file) => TraceValue::Str(file.path()),
                    None => TraceValue::Null,
                };
                dbg.set_var("trace_file", file);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestDebugger;

    #[test]
    fn new_cursor_is_live() {
        let c = TraceFrameCursor::new();
        assert_eq!(c.frame_number(), -1);
        assert_eq!(c.tracepoint_number(), -1);
        assert_eq!(c.pc(), None);
    }

    #[test]
    fn selection_publishes_context() {
        let mut dbg = TestDebugger::new();
        dbg.pc = 0x4010c0;
        let mut c = TraceFrameCursor::new();

        c.select(&mut dbg, 5, 2);

        assert_eq!(c.frame_number(), 5);
        assert_eq!(c.tracepoint_number(), 2);
        assert_eq!(c.pc(), Some(0x4010c0));
        assert_eq!(dbg.get_var("trace_frame"), Some(TraceValue::Int(5)));
        assert_eq!(dbg.get_var("tracepoint"), Some(TraceValue::Int(2)));
        assert_eq!(dbg.get_var("trace_line"), Some(TraceValue::Int(10)));
        assert_eq!(
            dbg.get_var("trace_func"),
            Some(TraceValue::Str("main".to_string()))
        );
        assert_eq!(
            dbg.get_var("trace_file"),
            Some(TraceValue::Str("/src/main.c".to_string()))
        );
    }

    #[test]
    fn minus_one_nulls_the_context() {
        let mut dbg = TestDebugger::new();
        let mut c = TraceFrameCursor::new();

        c.select(&mut dbg, 5, 2);
        c.select(&mut dbg, -1, 0x7f3f);

        assert_eq!(c.frame_number(), -1);
        assert_eq!(c.tracepoint_number(), 0x7f3f);
        assert_eq!(c.pc(), None);
        assert_eq!(dbg.get_var("trace_frame"), Some(TraceValue::Int(-1)));
        assert_eq!(dbg.get_var("trace_line"), Some(TraceValue::Int(-1)));
        assert_eq!(dbg.get_var("trace_func"), Some(TraceValue::Null));
        assert_eq!(dbg.get_var("trace_file"), Some(TraceValue::Null));
    }

    #[test]
    fn invalidation_runs_before_variable_writes() {
        let mut dbg = TestDebugger::new();
        let mut c = TraceFrameCursor::new();
        c.select(&mut dbg, 0, 1);

        let inval = dbg.events.iter().position(|e| *e == "invalidate_frames");
        let regs = dbg.events.iter().position(|e| *e == "registers_changed");
        let resel = dbg.events.iter().position(|e| *e == "reselect_frame");
        let var = dbg.events.iter().position(|e| *e == "set_var");
        assert!(inval < regs);
        assert!(regs < resel);
        assert!(resel < var);
    }

    #[test]
    fn variable_set_is_written_as_a_unit() {
        let mut dbg = TestDebugger::new();
        let mut c = TraceFrameCursor::new();
        c.select(&mut dbg, 3, 1);

        // all five variables are rewritten by a single transition
        let writes: Vec<&str> = dbg
            .var_writes
            .iter()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(
            writes,
            vec![
                "trace_frame",
                "tracepoint",
                "trace_line",
                "trace_func",
                "trace_file"
            ]
        );
    }
}
