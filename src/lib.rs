//! Dread - a small compiler from the Dread language to x86-64 assembly.
//!
//! Dread programs are a list of functions; exactly one is marked `Entry`.
//! Bodies bind names, print text and integers, call other functions with at
//! most one argument and return. The compiler is single-pass: tokens, AST,
//! then GAS Intel-syntax assembly for Linux that the system `as` and `ld`
//! turn into a static executable.
//!
//! # Primary Usage
//!
//! ```
//! let asm = dread::compile("Entry main() (Int) { Print('hi') Return(0) }").unwrap();
//! assert!(asm.contains("_start:"));
//! ```
//!
//! With an explicit arena and options:
//!
//! ```
//! use bumpalo::Bump;
//! use dread::core::{CodegenOptions, CompilationSession};
//!
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! let options = CodegenOptions::default().with_annotations(false);
//! let asm = dread::compile_with("Entry main() { }", &session, options).unwrap();
//! assert!(!asm.contains('#'));
//! println!("{}", session.stats());
//! ```
//!
//! # Architecture
//!
//! - [`frontend`] - Lexer, parser and AST
//! - [`codegen`] - AST to assembly (pooling, bindings, validation)
//! - [`x64`] - x86-64 specific code (encoder, calling convention, runtime helpers)
//! - [`core`] - Shared infrastructure (session, options, errors)

pub mod codegen;
pub mod core;
pub mod frontend;
pub mod x64;

use bumpalo::Bump;

pub use crate::codegen::{generate, CodeGenerator};
pub use crate::core::{
    CodegenOptions, CompilationSession, CompileError, CompileResult, SessionStats,
};
pub use crate::frontend::{parse, Diagnostic, Lexer, Parser, Token, TokenKind};

/// Compile source text to assembly with default options.
pub fn compile(source: &str) -> CompileResult<String> {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    compile_with(source, &session, CodegenOptions::default())
}

/// Compile source text to assembly within an existing session.
///
/// Fails with every syntax error of the source if parsing reported any.
pub fn compile_with(
    source: &str,
    session: &CompilationSession<'_>,
    options: CodegenOptions,
) -> CompileResult<String> {
    let (program, diagnostics) = parse(source);
    if !diagnostics.is_empty() {
        return Err(CompileError::Parse { diagnostics });
    }
    CodeGenerator::new(session, options).generate(&program)
}
