use crate::value::ValueKind;

pub type VmResult<T> = Result<T, VmError>;

/// Failure raised while executing a single instruction.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("column {column} violates its type contract: declared {expected}, found {found}")]
    ColumnTypeMismatch {
        column: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("{what} produced {found} where {expected} was declared")]
    TypeMismatch {
        what: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("ordinal {ordinal} is out of range for a row with {width} values")]
    OrdinalOutOfRange { ordinal: usize, width: usize },

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("duplicate table: {0}")]
    DuplicateTable(String),

    #[error("schema mismatch for {table}: expected {expected} values, got {actual}")]
    SchemaMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("the source stack is empty")]
    NoSource,

    #[error("the current source has no row")]
    NoCurrentRow,

    #[error("no {0} is available to inject")]
    MissingInjection(&'static str),

    #[error("expected {expected} on the object stack, found {found}")]
    UnexpectedObject {
        expected: &'static str,
        found: &'static str,
    },

    #[error("property access `{path}` failed: {reason}")]
    PropertyAccess { path: String, reason: String },

    #[error("{method} failed: {source}")]
    Method {
        method: &'static str,
        #[source]
        source: MethodError,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    #[error("{op} is not defined for {kind}")]
    UnsupportedOperation { op: &'static str, kind: ValueKind },

    #[error("invalid LIKE pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("instruction pointer {0} is outside the program")]
    InstructionPointerOutOfRange(i64),

    #[error("instruction budget of {0} exceeded")]
    InstructionBudgetExceeded(u64),
}

/// Error returned by a library method implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MethodError(pub String);

impl MethodError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The first failure of a run, tagged with the instruction that raised it.
#[derive(Debug, thiserror::Error)]
#[error("instruction {ip} ({instruction}) failed: {source}")]
pub struct RunError {
    pub ip: i64,
    pub instruction: String,
    #[source]
    pub source: VmError,
}

/// Malformed instruction stream, rejected before execution starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error("label `{0}` is referenced but never marked")]
    UnresolvedLabel(String),

    #[error("label `{0}` is marked more than once")]
    DuplicateLabel(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("call to {method} passes {actual} arguments, but the method declares {expected}")]
    ArgumentCountMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("call to {method} at {index} has no matching PrepareMethodCall")]
    UnpreparedCall { method: String, index: usize },

    #[error("PrepareMethodCall for {method} at {index} is never called")]
    UncalledPrepare { method: String, index: usize },

    #[error("jump at {index} targets {target}, outside a program of {len} instructions")]
    TargetOutOfRange {
        index: usize,
        target: i64,
        len: usize,
    },
}
