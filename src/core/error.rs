// This module defines the error types of the Dread compiler using the thiserror crate.
// CompileError is the single error enum returned by every fallible compiler entry point:
// it covers syntax errors (all parser diagnostics of a pass, bundled), program-level
// validation (missing or duplicate entry functions, duplicate declarations, parameter
// limits), call checking (unknown callees, argument counts), binding resolution, type
// agreement between values and declarations, and instruction construction failures
// reported by iced-x86. Every semantic variant carries the construct name and the source
// position so the driver can print actionable messages. CompileResult<T> is the alias
// used throughout the crate.

//! Error types for the Dread compiler.

use thiserror::Error;

use crate::frontend::ast::{Position, TypeTag};
use crate::frontend::Diagnostic;

/// Main error type for compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{} syntax error(s):\n{}", .diagnostics.len(), render_diagnostics(.diagnostics))]
    Parse { diagnostics: Vec<Diagnostic> },

    #[error("program has no Entry function")]
    MissingEntry,

    #[error("{position}: duplicate Entry function '{name}' (first Entry function is '{first}')")]
    DuplicateEntry {
        name: String,
        first: String,
        position: Position,
    },

    #[error("{position}: function '{name}' is declared more than once")]
    DuplicateFunction { name: String, position: Position },

    #[error("{position}: function '{name}' declares {count} parameters, at most one is supported")]
    TooManyParameters {
        name: String,
        count: usize,
        position: Position,
    },

    #[error("{position}: Entry function '{name}' cannot take parameters")]
    EntryParameters { name: String, position: Position },

    #[error("{position}: parameter '{name}' of '{function}' cannot have type Void")]
    VoidParameter {
        name: String,
        function: String,
        position: Position,
    },

    #[error("{position}: call to unknown function '{name}'")]
    UnknownFunction { name: String, position: Position },

    #[error("{position}: call to '{callee}' passes {count} arguments, at most one is supported")]
    TooManyArguments {
        callee: String,
        count: usize,
        position: Position,
    },

    #[error("{position}: '{callee}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
        position: Position,
    },

    #[error("{position}: undefined variable '{name}'")]
    UndefinedVariable { name: String, position: Position },

    #[error("{position}: {context} expects {expected}, got {found}")]
    TypeMismatch {
        context: String,
        expected: TypeTag,
        found: TypeTag,
        position: Position,
    },

    #[error("{position}: '{callee}' returns Void and cannot be assigned")]
    VoidValue { callee: String, position: Position },

    #[error("{position}: function '{name}' returns {return_type} but does not end with Return")]
    MissingReturn {
        name: String,
        return_type: TypeTag,
        position: Position,
    },

    #[error("instruction encoding failed: {0}")]
    Encoding(#[from] iced_x86::IcedError),

    #[error("failed to format assembly output")]
    Format(#[from] std::fmt::Error),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("  {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_lists_every_diagnostic() {
        let err = CompileError::Parse {
            diagnostics: vec![
                Diagnostic {
                    message: "first".to_string(),
                    position: Position::new(1, 2),
                },
                Diagnostic {
                    message: "second".to_string(),
                    position: Position::new(3, 4),
                },
            ],
        };
        assert_eq!(err.to_string(), "2 syntax error(s):\n  1:2: first\n  3:4: second");
    }

    #[test]
    fn test_semantic_errors_carry_position() {
        let err = CompileError::TypeMismatch {
            context: "argument of 'greet'".to_string(),
            expected: TypeTag::Text,
            found: TypeTag::Integer,
            position: Position::new(5, 9),
        };
        assert_eq!(
            err.to_string(),
            "5:9: argument of 'greet' expects String, got Int"
        );
    }
}
