//! x86-64 architecture-specific components.
//!
//! This module contains all x86-64 specific code:
//! - Instruction construction and Intel-syntax rendering using iced-x86
//! - The Dread calling convention and frame layout
//! - Per-function prologue/epilogue generation
//! - Shared runtime helpers

pub mod calling_convention;
pub mod encoder;
pub mod function_codegen;
pub mod runtime;

pub use calling_convention::{function_symbol, FunctionFrame, ENTRY_SYMBOL};
pub use encoder::{AsmBuffer, AsmFormatter, AsmLine, SymbolTable};
pub use function_codegen::{FunctionCodegen, ParamClass, ParamHome};
