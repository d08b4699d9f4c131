//! Shared fixtures: a scripted connection, a table-driven debugger fake,
//! and a small register file.

use std::collections::{HashMap, VecDeque};

use crate::arch::Arch;
use crate::common::Addr;
use crate::conn::Connection;
use crate::debugger::{
    Debugger, ExprNode, Sal, ScopeBlock, SourceFile, Symbol, SymbolLoc, TraceValue,
};
use crate::registry::Tracepoint;

/// 16 four-byte registers; r11 is the frame pointer.
pub struct TestArch;

const REG_NAMES: [&str; 16] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "fp", "r12", "sp", "lr",
    "pc",
];

impl Arch for TestArch {
    const NUM_REGS: usize = 16;
    const FP_REGNUM: usize = 11;
    const MAX_REGISTER_VIRTUAL_SIZE: u64 = 8;

    fn register_raw_size(_regno: usize) -> usize {
        4
    }

    fn register_name(regno: usize) -> Option<&'static str> {
        REG_NAMES.get(regno).copied()
    }
}

/// A connection that replays canned stub replies and records outbound
/// packets.
pub struct TestConn {
    replies: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
}

impl TestConn {
    pub fn replying(replies: &[&str]) -> TestConn {
        TestConn {
            replies: replies.iter().map(|r| r.as_bytes().to_vec()).collect(),
            sent: Vec::new(),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent
            .iter()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect()
    }
}

impl Connection for TestConn {
    type Error = &'static str;

    fn send_packet(&mut self, pkt: &[u8]) -> Result<(), Self::Error> {
        self.sent.push(pkt.to_vec());
        Ok(())
    }

    fn recv_packet(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let reply = self.replies.pop_front().ok_or("no more scripted replies")?;
        if reply.len() > buf.len() {
            return Err("scripted reply larger than buffer");
        }
        buf[..reply.len()].copy_from_slice(&reply);
        Ok(reply.len())
    }
}

pub fn sym(name: &str, size: u64, loc: SymbolLoc) -> Symbol {
    Symbol {
        name: name.to_string(),
        size,
        loc,
    }
}

pub fn test_sal(pc: Addr) -> Sal {
    Sal {
        pc,
        line: 10,
        file: Some(SourceFile {
            dirname: "/src".to_string(),
            filename: "main.c".to_string(),
        }),
    }
}

pub fn test_tracepoint(number: u32, address: Addr) -> Tracepoint {
    Tracepoint {
        number,
        address,
        source_file: Some("/src/main.c".to_string()),
        line_number: 10,
        addr_string: Some("main".to_string()),
        cond_string: None,
        language: "c".to_string(),
        input_radix: 10,
        enabled: true,
        pass_count: 0,
        step_count: 0,
        actions: Vec::new(),
    }
}

/// A debugger fake over a fixed symbol table:
///
/// | name        | location            |
/// |-------------|---------------------|
/// | `var_a`     | FP-8, 4 bytes       |
/// | `var_b`     | FP-4, 4 bytes       |
/// | `glob`      | static 0x6000, 8 b  |
/// | `forty_two` | constant 42         |
/// | `gone`      | optimized out       |
/// | `$fp`       | register 11         |
/// | `$sp`       | register 13         |
pub struct TestDebugger {
    pub vars: HashMap<String, TraceValue>,
    pub var_writes: Vec<String>,
    pub events: Vec<&'static str>,
    pub supplied: Vec<(usize, Vec<u8>)>,
    pub console: Vec<u8>,
    pub created: Vec<u32>,
    pub deleted: Vec<u32>,
    pub printed: Vec<String>,
    pub printed_exprs: Vec<String>,
    pub shown: Vec<&'static str>,
    pub interrupt_scopes: Vec<bool>,
    pub blocks: Vec<ScopeBlock>,
    pub lines: VecDeque<String>,
    pub pc: Addr,
    pub line_range: Option<(Addr, Addr)>,
}

impl TestDebugger {
    pub const FP_EXPR_REGNO: usize = 11;

    pub fn new() -> TestDebugger {
        TestDebugger {
            vars: HashMap::new(),
            var_writes: Vec::new(),
            events: Vec::new(),
            supplied: Vec::new(),
            console: Vec::new(),
            created: Vec::new(),
            deleted: Vec::new(),
            printed: Vec::new(),
            printed_exprs: Vec::new(),
            shown: Vec::new(),
            interrupt_scopes: Vec::new(),
            blocks: vec![ScopeBlock {
                symbols: vec![
                    sym("var_a", 4, SymbolLoc::Local { offset: -8 }),
                    sym("var_b", 4, SymbolLoc::Local { offset: -4 }),
                ],
                is_function: true,
            }],
            lines: VecDeque::new(),
            pc: 0x4010c0,
            line_range: Some((0x4010c0, 0x4010d0)),
        }
    }

    pub fn script_lines(&mut self, lines: &[&str]) {
        self.lines = lines.iter().map(|l| l.to_string()).collect();
    }

    fn lookup_symbol(&self, name: &str) -> Option<Symbol> {
        match name {
            "var_a" => Some(sym("var_a", 4, SymbolLoc::Local { offset: -8 })),
            "var_b" => Some(sym("var_b", 4, SymbolLoc::Local { offset: -4 })),
            "glob" => Some(sym("glob", 8, SymbolLoc::Static { addr: 0x6000 })),
            "forty_two" => Some(sym("forty_two", 4, SymbolLoc::Const { value: 42 })),
            "gone" => Some(sym("gone", 4, SymbolLoc::OptimizedOut)),
            _ => None,
        }
    }
}

impl Debugger for TestDebugger {
    type Error = &'static str;

    fn resolve_source(&mut self, _spec: &str) -> Result<Vec<Sal>, Self::Error> {
        Ok(vec![test_sal(0x4010c0)])
    }

    fn find_line_pc_range(&self, _sal: &Sal) -> Option<(Addr, Addr)> {
        self.line_range
    }

    fn parse_expression(&mut self, text: &str, _pc: Addr) -> Result<ExprNode, Self::Error> {
        let text = text.trim();
        match text {
            "$fp" => return Ok(ExprNode::Register(Self::FP_EXPR_REGNO)),
            "$sp" => return Ok(ExprNode::Register(13)),
            _ => {}
        }
        if text.starts_with('$') {
            // convenience variables and other non-collectable opcodes
            return Ok(ExprNode::Other);
        }
        if let Ok(n) = text.parse::<i64>() {
            return Ok(ExprNode::Long(n));
        }
        match self.lookup_symbol(text) {
            Some(sym) => Ok(ExprNode::Symbol(sym)),
            None => Err("no symbol in current context"),
        }
    }

    fn evaluate_address(&mut self, text: &str) -> Result<Addr, Self::Error> {
        let text = text.trim();
        if text == "main" {
            return Ok(0x4010c0);
        }
        if let Some(hex) = text.strip_prefix("0x") {
            return Addr::from_str_radix(hex, 16).map_err(|_| "bad address");
        }
        text.parse::<Addr>().map_err(|_| "bad address")
    }

    fn scope_blocks(&self, _pc: Addr) -> Vec<ScopeBlock> {
        self.blocks.clone()
    }

    fn find_pc_line(&self, pc: Addr) -> Option<Sal> {
        Some(test_sal(pc))
    }

    fn find_pc_function(&self, _pc: Addr) -> Option<String> {
        Some("main".to_string())
    }

    fn current_language(&self) -> String {
        "c".to_string()
    }

    fn input_radix(&self) -> u32 {
        10
    }

    fn get_var(&self, name: &str) -> Option<TraceValue> {
        self.vars.get(name).cloned()
    }

    fn set_var(&mut self, name: &str, val: TraceValue) {
        self.events.push("set_var");
        self.var_writes.push(name.to_string());
        self.vars.insert(name.to_string(), val);
    }

    fn read_pc(&self) -> Addr {
        self.pc
    }

    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.lines.pop_front())
    }

    fn set_immediate_interrupts(&mut self, on: bool) {
        self.interrupt_scopes.push(on);
    }

    fn supply_register(&mut self, regno: usize, bytes: &[u8]) {
        self.supplied.push((regno, bytes.to_vec()));
    }

    fn invalidate_frames(&mut self) {
        self.events.push("invalidate_frames");
    }

    fn registers_changed(&mut self) {
        self.events.push("registers_changed");
    }

    fn reselect_frame(&mut self) {
        self.events.push("reselect_frame");
    }

    fn console_output(&mut self, bytes: &[u8]) {
        self.console.extend_from_slice(bytes);
    }

    fn print(&mut self, text: &str) {
        self.printed.push(text.to_string());
    }

    fn tracepoint_created(&mut self, t: &Tracepoint) {
        self.created.push(t.number);
    }

    fn tracepoint_deleted(&mut self, t: &Tracepoint) {
        self.deleted.push(t.number);
    }

    fn show_registers(&mut self) {
        self.shown.push("registers");
    }

    fn show_locals(&mut self) {
        self.shown.push("locals");
    }

    fn show_args(&mut self) {
        self.shown.push("args");
    }

    fn print_expression(&mut self, text: &str) {
        self.printed_exprs.push(text.to_string());
    }
}
