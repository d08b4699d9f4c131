//! Error types for the tracepoint engine.

use core::fmt::{self, Debug, Display};

/// Errors in direct response to something the user typed.
///
/// These abort the current command and leave the registry unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InputError {
    /// A command that requires an argument was given none.
    MissingArgument(&'static str),
    /// A convenience variable used as a tracepoint number is not an
    /// integer.
    VariableNotInteger(String),
    /// `$(...)` memrange missing a comma between fields.
    MemrangeMissingComma,
    /// `$(...)` memrange missing its close-parenthesis.
    MemrangeMissingParen,
    /// `$(...)` memrange whose register field does not name a register.
    MemrangeBadRegister,
    /// `$(...)` memrange offset or size field is not a number.
    MemrangeBadNumber,
    /// `$(...)` memrange with a non-positive size.
    MemrangeBadSize(i64),
    /// `tfind -` while no trace frame is selected.
    NotDebuggingTraceBuffer,
    /// `tfind -` while already at the first frame.
    AtStartOfTraceBuffer,
    /// `tfind tracepoint` with no operand and no current tracepoint.
    NoCurrentTracepoint,
    /// The current frame's tracepoint is no longer in the registry.
    UnknownCurrentTracepoint(i32),
    /// A location spec with no line number information.
    NoLineNumberInfo,
    /// A source line that contains no code.
    LineHasNoCode(u32),
    /// The `actions` sub-prompt was interrupted; the partial list was
    /// discarded.
    Cancelled,
    /// An actions-list pseudo-command (`collect`, `while-stepping`) used at
    /// top level.
    ActionsOnly(&'static str),
    /// `end` used at top level.
    EndOnly,
    /// Verb not in the command table.
    UnknownCommand(String),
    /// A file could not be opened for writing.
    CannotOpenFile(String),
}

impl Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::InputError::*;
        match self {
            MissingArgument(cmd) => write!(f, "'{}' command requires an argument", cmd),
            VariableNotInteger(name) => {
                write!(f, "convenience variable ${} must have integral type", name)
            }
            MemrangeMissingComma => write!(f, "missing comma for memrange"),
            MemrangeMissingParen => write!(f, "missing close-parenthesis for memrange"),
            MemrangeBadRegister => write!(f, "bad register operand for memrange"),
            MemrangeBadNumber => write!(f, "bad numeric operand for memrange"),
            MemrangeBadSize(size) => write!(f, "invalid size {} in memrange", size),
            NotDebuggingTraceBuffer => write!(f, "not debugging trace buffer"),
            AtStartOfTraceBuffer => write!(f, "already at start of trace buffer"),
            NoCurrentTracepoint => {
                write!(f, "no current tracepoint -- please supply an argument")
            }
            UnknownCurrentTracepoint(n) => {
                write!(f, "no known tracepoint matches 'current' tracepoint #{}", n)
            }
            NoLineNumberInfo => write!(f, "no line number information available"),
            LineHasNoCode(line) => write!(f, "line {} is at an address with no code", line),
            Cancelled => write!(f, "action list cancelled"),
            ActionsOnly(cmd) => write!(
                f,
                "'{}' can only be used in a tracepoint actions list",
                cmd
            ),
            EndOnly => write!(f, "this command cannot be used at the top level"),
            UnknownCommand(cmd) => write!(f, "unknown command '{}'", cmd),
            CannotOpenFile(path) => write!(f, "unable to open file '{}'", path),
        }
    }
}

/// Error reported by the stub in an `E…` reply, classified per the trace
/// protocol's conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubError {
    /// `E10`: the stub could not parse our outgoing packet.
    OutgoingPacket,
    /// `E1<n>`: the stub could not parse field `n` of our outgoing packet.
    OutgoingPacketField(u32),
    /// `E2<code>`: trace-API error code.
    Api(String),
    /// Any other error reply; the payload is opaque to the host.
    Other(String),
}

impl Display for StubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::StubError::*;
        match self {
            OutgoingPacket => write!(f, "error in outgoing packet"),
            OutgoingPacketField(n) => write!(f, "error in outgoing packet at field #{}", n),
            Api(code) => write!(f, "trace API error 0x{}", code),
            Other(code) => write!(f, "target returns error code '{}'", code),
        }
    }
}

/// A structurally malformed stub reply.
///
/// After one of these the stub's state is considered unreliable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    /// A terminal reply that does not fit the expected grammar.
    UnexpectedReply(String),
    /// A register-snapshot (`R…`) notification that does not scan.
    MalformedRegisterSnapshot,
    /// A register value shorter than the register's raw size.
    ShortRegisterValue(usize),
    /// Console output (`O…`) whose payload is not valid hex.
    MalformedConsoleOutput,
}

impl Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::ReplyError::*;
        match self {
            UnexpectedReply(reply) => write!(f, "bogus reply from target: {}", reply),
            MalformedRegisterSnapshot => write!(f, "malformed 'R' packet from target"),
            ShortRegisterValue(regno) => {
                write!(f, "remote reply too short for register {}", regno)
            }
            MalformedConsoleOutput => write!(f, "malformed 'O' packet from target"),
        }
    }
}

/// Invariant violation inside the engine.
///
/// Seeing one of these is a bug in `tracehost`, not in user input or the
/// stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalError {
    /// Register number beyond the collection bitmap.
    RegisterNumberTooLarge(usize),
    /// A fixed-size protocol packet did not fit its buffer.
    PacketBufferOverflow,
}

impl Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::InternalError::*;
        match self {
            RegisterNumberTooLarge(regno) => {
                write!(f, "internal: register number {} too large for tracepoint", regno)
            }
            PacketBufferOverflow => write!(f, "internal: packet buffer overflow"),
        }
    }
}

/// Any error of the action validator/compiler.
///
/// The action layer never touches the connection, so its error type only
/// carries the debugger half of [`Error`]'s parameters.
#[derive(Debug)]
pub enum ActionError<T> {
    /// The surrounding debugger failed (expression parser, readline, …).
    Debugger(T),
    /// Malformed user input.
    Input(InputError),
    /// Engine invariant violation.
    Internal(InternalError),
}

impl<T> From<InputError> for ActionError<T> {
    fn from(e: InputError) -> Self {
        ActionError::Input(e)
    }
}

impl<T> From<InternalError> for ActionError<T> {
    fn from(e: InternalError) -> Self {
        ActionError::Internal(e)
    }
}

/// An error which may occur while driving the remote tracepoint protocol.
///
/// `T` is the [`Debugger`](crate::debugger::Debugger) error type and `C` the
/// [`Connection`](crate::conn::Connection) error type.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error<T, C> {
    /// Transport failure while sending a packet.
    ConnectionSend(C),
    /// Transport failure while waiting for a reply.
    ConnectionRecv(C),
    /// The stub answered with an empty reply: it does not support this
    /// command.
    Unsupported,
    /// The stub's reply could not be parsed.
    Reply(ReplyError),
    /// The stub reported an error.
    Stub(StubError),
    /// The stub could not find the requested trace frame.
    FrameNotFound,
    /// The compiled actions for a tracepoint exceed the outgoing packet
    /// buffer. Nothing was sent; the registry and the stub are unchanged.
    ActionsTooComplex(u32),
    /// The user's input was malformed; the command was abandoned.
    Input(InputError),
    /// The surrounding debugger reported an error.
    Debugger(T),
    /// Internal invariant violation; indicates a bug in `tracehost`.
    Internal(InternalError),
}

impl<T, C> From<InputError> for Error<T, C> {
    fn from(e: InputError) -> Self {
        Error::Input(e)
    }
}

impl<T, C> From<ReplyError> for Error<T, C> {
    fn from(e: ReplyError) -> Self {
        Error::Reply(e)
    }
}

impl<T, C> From<StubError> for Error<T, C> {
    fn from(e: StubError) -> Self {
        Error::Stub(e)
    }
}

impl<T, C> From<InternalError> for Error<T, C> {
    fn from(e: InternalError) -> Self {
        Error::Internal(e)
    }
}

impl<T, C> From<ActionError<T>> for Error<T, C> {
    fn from(e: ActionError<T>) -> Self {
        match e {
            ActionError::Debugger(e) => Error::Debugger(e),
            ActionError::Input(e) => Error::Input(e),
            ActionError::Internal(e) => Error::Internal(e),
        }
    }
}

impl<T, C> Display for Error<T, C>
where
    T: Debug,
    C: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::Error::*;
        match self {
            ConnectionSend(e) => write!(f, "connection error while sending packet: {:?}", e),
            ConnectionRecv(e) => write!(f, "connection error while awaiting reply: {:?}", e),
            Unsupported => write!(f, "target does not support this command"),
            Reply(e) => write!(f, "{}", e),
            Stub(e) => write!(f, "{}", e),
            FrameNotFound => write!(f, "target failed to find requested trace frame"),
            ActionsTooComplex(n) => {
                write!(f, "actions for tracepoint {} too complex; please simplify", n)
            }
            Input(e) => write!(f, "{}", e),
            Debugger(e) => write!(f, "debugger error: {:?}", e),
            Internal(e) => write!(f, "{}", e),
        }
    }
}

impl<T, C> std::error::Error for Error<T, C>
where
    T: Debug,
    C: Debug,
{
}
