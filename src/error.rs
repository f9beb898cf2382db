//! Error types for equation compilation and execution.

use std::fmt;

/// An error from compiling or executing an equation program.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected source text: unexpected token, malformed number, unknown
    /// function, wrong arity, missing paren.
    Parse,
    /// The VM popped an empty operand stack. Unreachable for programs
    /// produced by the compiler; guards hand-built or corrupted bytecode.
    StackUnderflow,
    /// The VM hit an instruction the compiler never emits (reserved
    /// control-flow opcodes, out-of-range variable index).
    BadProgram,
}

impl EvalError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::Parse,
        }
    }

    pub fn stack_underflow() -> Self {
        Self {
            message: "operand stack underflow".to_string(),
            kind: ErrorKind::StackUnderflow,
        }
    }

    pub fn bad_program(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::BadProgram,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Parse => "parse error",
            ErrorKind::StackUnderflow => "stack underflow",
            ErrorKind::BadProgram => "bad program",
        };
        write!(f, "{kind}: {}", self.message)
    }
}

impl std::error::Error for EvalError {}
