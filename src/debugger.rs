//! The interface between the tracepoint engine and its surrounding
//! debugger.
//!
//! The engine never looks up a symbol, parses an expression, or prints to
//! the console itself; all of that is delegated to an implementation of
//! [`Debugger`]. The types in this module describe the data exchanged
//! across that boundary.

use crate::common::Addr;
use crate::registry::Tracepoint;

/// A resolved source location: the symtab-and-line triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sal {
    /// Code address of the location.
    pub pc: Addr,
    /// Source line, 1-based. Zero when unknown.
    pub line: u32,
    /// Source file, when line information exists.
    pub file: Option<SourceFile>,
}

/// A source file as recorded by the symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub dirname: String,
    pub filename: String,
}

impl SourceFile {
    /// Full path of the file.
    ///
    /// XXX the original joins the components by advancing past the
    /// directory's terminator rather than by length; the contract kept here
    /// is "exactly one separator between the two components".
    pub fn path(&self) -> String {
        if self.dirname.is_empty() || self.dirname.ends_with('/') {
            format!("{}{}", self.dirname, self.filename)
        } else {
            format!("{}/{}", self.dirname, self.filename)
        }
    }
}

/// Where a symbol lives, as reported by the symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SymbolLoc {
    /// Compile-time constant; there is no location to collect.
    Const { value: i64 },
    /// Constant whose value is a block of bytes.
    ConstBytes { bytes: Vec<u8> },
    /// Static storage at a fixed address.
    Static { addr: Addr },
    /// Lives in a register.
    Register { regno: usize },
    /// Argument passed in a register.
    RegParm { regno: usize },
    /// Argument whose address is passed in a register.
    RegParmAddr { regno: usize },
    /// Argument at an offset into the frame's argument list.
    Arg { offset: i64 },
    /// Reference argument at a frame offset.
    RefArg { offset: i64 },
    /// Local variable at an offset from the frame pointer.
    Local { offset: i64 },
    /// Argument visible as a frame-pointer-relative local.
    LocalArg { offset: i64 },
    /// Variable at an offset from a base register.
    Basereg { basereg: usize, offset: i64 },
    /// Argument at an offset from a base register.
    BaseregArg { basereg: usize, offset: i64 },
    /// Code label.
    Label { addr: Addr },
    /// Nested function or block.
    Block { addr: Addr },
    /// A type name; nothing to collect.
    Typedef,
    /// Needs a minimal-symbol lookup the symbol table could not complete.
    Unresolved,
    /// Optimized away by the compiler.
    OptimizedOut,
}

/// A symbol as the tracepoint engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    /// Size in bytes of the symbol's (typedef-resolved) type.
    pub size: u64,
    pub loc: SymbolLoc,
}

/// One block of a scope chain, innermost first.
#[derive(Debug, Clone)]
pub struct ScopeBlock {
    pub symbols: Vec<Symbol>,
    /// True when the block is a function body. Scope walks stop after the
    /// first function block.
    pub is_function: bool,
}

/// The head opcode of a parsed expression, as far as `collect` cares.
#[derive(Debug, Clone)]
pub enum ExprNode {
    /// A bare register reference (`$sp`).
    Register(usize),
    /// A symbol reference.
    Symbol(Symbol),
    /// An integer literal.
    Long(i64),
    /// Any other opcode (convenience variables, casts, arithmetic, …);
    /// not collectable.
    Other,
}

/// A value in the expression evaluator's convenience-variable table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceValue {
    Int(i64),
    Str(String),
    Null,
}

/// The surrounding debugger.
///
/// Implementations wire the tracepoint engine into a debugger's symbol
/// tables, expression evaluator, frame machinery, and UI. Methods are
/// grouped the way the engine uses them; the `Error` type propagates
/// through the engine as [`Error::Debugger`](crate::error::Error).
pub trait Debugger {
    /// Debugger-specific fatal error type.
    type Error;

    /// Resolve a location spec (`function`, `file:line`, `*addr`, …) into
    /// one or more source-and-line records with resolved PCs.
    fn resolve_source(&mut self, spec: &str) -> Result<Vec<Sal>, Self::Error>;

    /// Address range `[start, end)` of the code generated for `sal`'s line.
    fn find_line_pc_range(&self, sal: &Sal) -> Option<(Addr, Addr)>;

    /// Parse `text` as an expression in the block containing `pc` and
    /// classify its head opcode.
    fn parse_expression(&mut self, text: &str, pc: Addr) -> Result<ExprNode, Self::Error>;

    /// Parse and evaluate `text` to an address.
    fn evaluate_address(&mut self, text: &str) -> Result<Addr, Self::Error>;

    /// Scope chain at `pc`, innermost block first, ending at (and
    /// including) the enclosing function block.
    fn scope_blocks(&self, pc: Addr) -> Vec<ScopeBlock>;

    /// Source line containing `pc`.
    fn find_pc_line(&self, pc: Addr) -> Option<Sal>;

    /// Name of the function containing `pc`.
    fn find_pc_function(&self, pc: Addr) -> Option<String>;

    /// Language in effect, captured at tracepoint creation.
    fn current_language(&self) -> String;

    /// Input radix in effect, captured at tracepoint creation.
    fn input_radix(&self) -> u32;

    /// Read a convenience variable of the expression evaluator.
    fn get_var(&self, name: &str) -> Option<TraceValue>;

    /// Write a convenience variable of the expression evaluator.
    fn set_var(&mut self, name: &str, val: TraceValue);

    /// PC of the currently selected frame.
    fn read_pc(&self) -> Addr;

    /// Read one line of user input for the `actions` sub-prompt.
    ///
    /// `None` means end-of-input or a keyboard interrupt; either cancels
    /// the action list being entered.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, Self::Error>;

    /// Switch the keyboard-interrupt disposition to "interrupt immediately
    /// on keystroke" (or back). Scoped by the `actions` sub-prompt; the
    /// engine restores the disposition on every exit path.
    fn set_immediate_interrupts(&mut self, _on: bool) {}

    /// Accept one register's raw bytes from a stub register snapshot.
    fn supply_register(&mut self, regno: usize, bytes: &[u8]);

    /// Drop any cached frames; the frame chain is no longer valid.
    fn invalidate_frames(&mut self);

    /// Mark all cached register values stale.
    fn registers_changed(&mut self);

    /// Re-select the current execution frame, so the expression evaluator
    /// sees the newly selected trace frame rather than stale state.
    fn reselect_frame(&mut self);

    /// Console output pushed by the stub (`O…` notifications).
    fn console_output(&mut self, bytes: &[u8]);

    /// Host-side informational output (tables, narration).
    fn print(&mut self, text: &str);

    /// A tracepoint was created. UI hook.
    fn tracepoint_created(&mut self, _t: &Tracepoint) {}

    /// A tracepoint was deleted. UI hook.
    fn tracepoint_deleted(&mut self, _t: &Tracepoint) {}

    /// `tdump` view: display the registers of the current frame.
    fn show_registers(&mut self) {}

    /// `tdump` view: display the locals of the current frame.
    fn show_locals(&mut self) {}

    /// `tdump` view: display the arguments of the current frame.
    fn show_args(&mut self) {}

    /// `tdump` view: evaluate and display one collected expression.
    fn print_expression(&mut self, _text: &str) {}
}
