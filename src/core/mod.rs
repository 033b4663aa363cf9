// This module is the hub for the compiler's shared infrastructure: the arena-backed
// compilation session with its statistics, the code generation options, and the error
// enum used by every fallible stage. Frontend and backend both depend on it; it depends
// on nothing but the AST types used in error messages.

//! Core compiler infrastructure.
//!
//! # Key Components
//!
//! ## Session Management (`session`)
//! - Arena-based memory allocation using `bumpalo`
//! - String interning for labels and names
//! - Compilation statistics
//!
//! ## Options (`options`)
//! - Output annotations
//!
//! ## Errors (`error`)
//! - `CompileError` and the `CompileResult` alias

pub mod error;
pub mod options;
pub mod session;

pub use error::{CompileError, CompileResult};
pub use options::CodegenOptions;
pub use session::{CompilationSession, SessionStats};
