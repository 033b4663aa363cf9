//! Recursive-descent parser for Dread.
//!
//! The parser keeps one token of lookahead (`cur`) plus one peek token. Syntax
//! errors never abort the whole parse: a failing production records a
//! [`Diagnostic`], returns `None`, and the parser resynchronises at the next
//! statement or declaration boundary. Callers must check [`Parser::diagnostics`]
//! before trusting the returned [`Program`].

use std::fmt;

use super::ast::*;
use super::lexer::Lexer;
use super::token::{Token, TokenKind};

/// A syntax error recorded while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub position: Position,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.message)
    }
}

/// Parse a complete source text.
pub fn parse(source: &str) -> (Program, Vec<Diagnostic>) {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();
    (program, parser.into_diagnostics())
}

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    cur: Token<'src>,
    peek: Token<'src>,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Parser<'src> {
    pub fn new(mut lexer: Lexer<'src>) -> Self {
        // Read two tokens so cur and peek are both set
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Self {
            lexer,
            cur,
            peek,
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn next_token(&mut self) {
        self.cur = self.peek;
        self.peek = self.lexer.next_token();
    }

    fn position(&self) -> Position {
        Position::new(self.cur.line, self.cur.column)
    }

    fn error_at(&mut self, token: Token<'src>, message: String) {
        self.diagnostics.push(Diagnostic {
            message,
            position: Position::new(token.line, token.column),
        });
    }

    fn peek_error(&mut self, expected: &str) {
        let message = format!(
            "expected next token to be {}, got {} instead",
            expected, self.peek.kind
        );
        self.error_at(self.peek, message);
    }

    /// Advance if the peek token has the given kind, otherwise record a diagnostic.
    fn expect_peek(&mut self, kind: TokenKind) -> Option<()> {
        if self.peek.kind == kind {
            self.next_token();
            Some(())
        } else {
            self.peek_error(kind.name());
            None
        }
    }

    fn expect_peek_type(&mut self) -> Option<TypeTag> {
        match type_tag(self.peek.kind) {
            Some(ty) => {
                self.next_token();
                Some(ty)
            }
            None => {
                self.peek_error("a type");
                None
            }
        }
    }

    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();

        while self.cur.kind != TokenKind::Eof {
            match self.cur.kind {
                TokenKind::Entry | TokenKind::Function => match self.parse_function() {
                    Some(function) => {
                        program.functions.push(function);
                        if self.cur.kind == TokenKind::RBrace {
                            self.next_token();
                        }
                    }
                    None => self.synchronize_declaration(),
                },
                _ => {
                    let message = format!("unexpected {} at top level", describe(&self.cur));
                    self.error_at(self.cur, message);
                    self.synchronize_declaration();
                }
            }
        }

        log::debug!(
            "Parsed {} function(s) with {} diagnostic(s)",
            program.functions.len(),
            self.diagnostics.len()
        );
        program
    }

    /// Skip to the next declaration keyword.
    fn synchronize_declaration(&mut self) {
        self.next_token();
        while !matches!(
            self.cur.kind,
            TokenKind::Entry | TokenKind::Function | TokenKind::Eof
        ) {
            self.next_token();
        }
    }

    fn parse_function(&mut self) -> Option<Function> {
        let is_entry = self.cur.kind == TokenKind::Entry;
        let position = self.position();

        self.expect_peek(TokenKind::Ident)?;
        let name = self.cur.literal.to_string();

        self.expect_peek(TokenKind::LParen)?;
        let params = self.parse_parameters()?;
        let return_type = self.parse_return_type()?;

        self.expect_peek(TokenKind::LBrace)?;
        let body = self.parse_block();

        Some(Function {
            is_entry,
            name,
            params,
            return_type,
            body,
            position,
        })
    }

    /// Parse a parameter list. `cur` is the opening parenthesis; on success it
    /// is the closing one.
    fn parse_parameters(&mut self) -> Option<Vec<Parameter>> {
        let mut params = Vec::new();

        if self.peek.kind == TokenKind::RParen {
            self.next_token();
            return Some(params);
        }

        loop {
            self.next_token();
            params.push(self.parse_parameter()?);
            if self.peek.kind != TokenKind::Comma {
                break;
            }
            self.next_token();
        }

        self.expect_peek(TokenKind::RParen)?;
        Some(params)
    }

    /// Either `Type name` or `name Type`.
    fn parse_parameter(&mut self) -> Option<Parameter> {
        if let Some(ty) = type_tag(self.cur.kind) {
            self.expect_peek(TokenKind::Ident)?;
            return Some(Parameter {
                name: self.cur.literal.to_string(),
                ty,
            });
        }

        if self.cur.kind == TokenKind::Ident {
            let name = self.cur.literal.to_string();
            let ty = self.expect_peek_type()?;
            return Some(Parameter { name, ty });
        }

        let message = format!("expected a parameter, got {} instead", describe(&self.cur));
        self.error_at(self.cur, message);
        None
    }

    /// `(Type)`, a bare `Type`, or nothing (Void). Only the peek token decides.
    fn parse_return_type(&mut self) -> Option<TypeTag> {
        match self.peek.kind {
            TokenKind::LParen => {
                self.next_token();
                let ty = self.expect_peek_type()?;
                self.expect_peek(TokenKind::RParen)?;
                Some(ty)
            }
            kind => match type_tag(kind) {
                Some(ty) => {
                    self.next_token();
                    Some(ty)
                }
                None => Some(TypeTag::Void),
            },
        }
    }

    /// Parse statements up to the closing brace. `cur` is the opening brace.
    fn parse_block(&mut self) -> Block {
        let mut block = Block::default();
        self.next_token();

        loop {
            match self.cur.kind {
                TokenKind::RBrace => break,
                TokenKind::Eof | TokenKind::Entry | TokenKind::Function => {
                    let message = format!(
                        "expected next token to be {}, got {} instead",
                        TokenKind::RBrace,
                        self.cur.kind
                    );
                    self.error_at(self.cur, message);
                    break;
                }
                _ => {}
            }

            match self.parse_statement() {
                Some(stmt) => {
                    block.statements.push(stmt);
                    self.next_token();
                }
                None => self.synchronize_statement(),
            }
        }

        block
    }

    /// Skip to the next token that can start a statement or end the block.
    fn synchronize_statement(&mut self) {
        self.next_token();
        loop {
            match self.cur.kind {
                TokenKind::RBrace
                | TokenKind::Eof
                | TokenKind::Entry
                | TokenKind::Function
                | TokenKind::Print
                | TokenKind::Return => return,
                TokenKind::Ident
                    if matches!(self.peek.kind, TokenKind::Assign | TokenKind::LParen) =>
                {
                    return
                }
                _ => self.next_token(),
            }
        }
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur.kind {
            TokenKind::Ident => match self.peek.kind {
                TokenKind::Assign => self.parse_assignment(),
                TokenKind::LParen => {
                    let callee = Callee::Function(self.cur.literal.to_string());
                    self.parse_call(callee).map(Statement::Call)
                }
                _ => {
                    self.peek_error("ASSIGN or LPAREN");
                    None
                }
            },
            TokenKind::Print => self
                .parse_call(Callee::Builtin(Builtin::Print))
                .map(Statement::Call),
            TokenKind::Return => self
                .parse_call(Callee::Builtin(Builtin::Return))
                .map(Statement::Call),
            _ => {
                let message = format!("unexpected {} in function body", describe(&self.cur));
                self.error_at(self.cur, message);
                None
            }
        }
    }

    fn parse_assignment(&mut self) -> Option<Statement> {
        let position = self.position();
        let target = self.cur.literal.to_string();

        self.expect_peek(TokenKind::Assign)?;
        self.next_token();
        let value = self.parse_expression(true)?;

        Some(Statement::Assign {
            target,
            value,
            position,
        })
    }

    /// Parse `callee ( args )`. `cur` is the callee token; on success it is the
    /// closing parenthesis.
    fn parse_call(&mut self, callee: Callee) -> Option<Call> {
        let position = self.position();
        self.expect_peek(TokenKind::LParen)?;

        let mut args = Vec::new();
        if self.peek.kind == TokenKind::RParen {
            self.next_token();
            return Some(Call {
                callee,
                args,
                position,
            });
        }

        loop {
            self.next_token();
            args.push(self.parse_expression(false)?);
            if self.peek.kind != TokenKind::Comma {
                break;
            }
            self.next_token();
        }

        self.expect_peek(TokenKind::RParen)?;
        Some(Call {
            callee,
            args,
            position,
        })
    }

    /// Single-dispatch expression parsing. Calls are accepted only where
    /// `allow_call` is set (assignment right-hand sides).
    fn parse_expression(&mut self, allow_call: bool) -> Option<Expression> {
        match self.cur.kind {
            TokenKind::Str => Some(Expression::Text(self.cur.literal.to_string())),
            TokenKind::Int => match self.cur.literal.parse::<i64>() {
                Ok(value) => Some(Expression::Integer(value)),
                Err(_) => {
                    let message = format!("integer literal {} is out of range", self.cur.literal);
                    self.error_at(self.cur, message);
                    None
                }
            },
            TokenKind::Ident if self.peek.kind == TokenKind::LParen => {
                if !allow_call {
                    let message = format!(
                        "call to '{}' is only allowed on the right-hand side of an assignment",
                        self.cur.literal
                    );
                    self.error_at(self.cur, message);
                    return None;
                }
                let callee = Callee::Function(self.cur.literal.to_string());
                self.parse_call(callee).map(Expression::Call)
            }
            TokenKind::Ident => Some(Expression::Identifier(self.cur.literal.to_string())),
            _ => {
                let message = format!("expected an expression, got {} instead", describe(&self.cur));
                self.error_at(self.cur, message);
                None
            }
        }
    }
}

fn type_tag(kind: TokenKind) -> Option<TypeTag> {
    match kind {
        TokenKind::IntType => Some(TypeTag::Integer),
        TokenKind::StringType => Some(TypeTag::Text),
        TokenKind::VoidType => Some(TypeTag::Void),
        _ => None,
    }
}

fn describe(token: &Token<'_>) -> String {
    if token.literal.is_empty() {
        token.kind.to_string()
    } else {
        format!("{} '{}'", token.kind, token.literal)
    }
}
