//! Provides [InterpretationError], the error that most things return.
use std::fmt;

use thiserror::Error;

/// Any error that can occur during interpretation.
#[derive(Debug, Error)]
pub enum InterpretationError {
    /// One or more compile-time errors, such as syntax errors or a redeclared local.
    #[error("{} compile-time error(s)", .0.len())]
    Compile(Vec<CompileError>),
    /// A runtime error, such as a type error or an undefined variable.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// A single error reported by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[line {line}] Error{location}: {message}")]
pub struct CompileError {
    /// The line of the offending lexeme.
    pub line: usize,
    /// Where, on that line, the error was found.
    pub location: ErrorLocation,
    /// What went wrong.
    pub message: String,
}

/// Where a [CompileError] happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// At the end of the source code.
    AtEnd,
    /// At the given lexeme.
    At(String),
    /// Lexical errors have no lexeme to point at; the message says it all.
    Unspecified,
}

/// An error that stopped the virtual machine.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}\n[line {line}] in script")]
pub struct RuntimeError {
    /// What went wrong.
    pub kind: RuntimeErrorKind,
    /// The source line of the instruction that failed.
    pub line: usize,
}

/// Every reason the virtual machine can stop early.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeErrorKind {
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operands must be two numbers or two strings.")]
    OperandsMustBeNumbersOrStrings,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("Stack underflow.")]
    StackUnderflow,
    /// The byte at the instruction pointer is not an [OpCode](crate::chunk::OpCode).
    #[error("Invalid opcode {0:#04x}.")]
    InvalidOpcode(u8),
    /// The chunk ended in the middle of an instruction.
    #[error("Unexpected end of bytecode.")]
    UnexpectedEndOfChunk,
    #[error("No constant at index {0}.")]
    InvalidConstant(u8),
    #[error("Global name must be a string.")]
    InvalidGlobalName,
    #[error("Could not write output: {0}")]
    Output(String),
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorLocation::AtEnd => write!(f, " at end"),
            ErrorLocation::At(text) => write!(f, " at '{text}'"),
            ErrorLocation::Unspecified => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compile_error_formats() {
        let error = CompileError {
            line: 3,
            location: ErrorLocation::At("=".to_owned()),
            message: "Invalid assignment target.".to_owned(),
        };
        assert_eq!(
            "[line 3] Error at '=': Invalid assignment target.",
            error.to_string()
        );

        let error = CompileError {
            line: 1,
            location: ErrorLocation::AtEnd,
            message: "Expect expression.".to_owned(),
        };
        assert_eq!("[line 1] Error at end: Expect expression.", error.to_string());

        let error = CompileError {
            line: 7,
            location: ErrorLocation::Unspecified,
            message: "Unexpected character.".to_owned(),
        };
        assert_eq!("[line 7] Error: Unexpected character.", error.to_string());
    }

    #[test]
    fn runtime_error_formats() {
        let error = RuntimeError {
            kind: RuntimeErrorKind::UndefinedVariable("x".to_owned()),
            line: 2,
        };
        assert_eq!("Undefined variable 'x'.\n[line 2] in script", error.to_string());

        let wrapped: InterpretationError = error.into();
        assert!(matches!(wrapped, InterpretationError::Runtime(_)));
    }
}
