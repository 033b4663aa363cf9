//! Dread frontend: source text to AST.
//!
//! - [`lexer`] turns characters into [`Token`]s
//! - [`parser`] builds the [`ast::Program`] and collects [`Diagnostic`]s

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use lexer::Lexer;
pub use parser::{parse, Diagnostic, Parser};
pub use token::{Token, TokenKind};
