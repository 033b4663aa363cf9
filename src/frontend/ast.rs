//! Abstract syntax tree for Dread programs.
//!
//! The tree is built once by the parser and only read afterwards. Every node
//! implements [`Display`](fmt::Display), printing a normalised form of the
//! source that the `--emit ast` driver mode shows.

use std::fmt;

/// Source position of a construct (1-based line, column of its first token).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Declared type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Integer,
    Text,
    Void,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeTag::Integer => "Int",
            TypeTag::Text => "String",
            TypeTag::Void => "Void",
        })
    }
}

/// Root node: all top-level declarations in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub functions: Vec<Function>,
}

impl Program {
    pub fn entry_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| f.is_entry)
    }

    pub fn ordinary_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| !f.is_entry)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub is_entry: bool,
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: TypeTag,
    pub body: Block,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeTag,
}

/// Statements of a function body. All statements share one flat scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign {
        target: String,
        value: Expression,
        position: Position,
    },
    Call(Call),
}

impl Statement {
    pub fn position(&self) -> Position {
        match self {
            Statement::Assign { position, .. } => *position,
            Statement::Call(call) => call.position,
        }
    }

    /// Whether this statement is a `Return(...)` call.
    pub fn is_return(&self) -> bool {
        matches!(
            self,
            Statement::Call(Call {
                callee: Callee::Builtin(Builtin::Return),
                ..
            })
        )
    }
}

/// Functions implemented directly by the code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Print,
    Return,
}

impl Builtin {
    pub const fn name(self) -> &'static str {
        match self {
            Builtin::Print => "Print",
            Builtin::Return => "Return",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    Builtin(Builtin),
    Function(String),
}

impl Callee {
    pub fn name(&self) -> &str {
        match self {
            Callee::Builtin(builtin) => builtin.name(),
            Callee::Function(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: Callee,
    pub args: Vec<Expression>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Text(String),
    Integer(i64),
    Identifier(String),
    /// Only produced for the right-hand side of an assignment.
    Call(Call),
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, function) in self.functions.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_entry { "Entry" } else { "Function" };
        write!(f, "{keyword} {}(", self.name)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", param.ty, param.name)?;
        }
        writeln!(f, ") ({}) {{", self.return_type)?;
        for stmt in &self.body.statements {
            writeln!(f, "    {stmt}")?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assign { target, value, .. } => write!(f, "{target} = {value}"),
            Statement::Call(call) => write!(f, "{call}"),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.callee.name())?;
        for (idx, arg) in self.args.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Text(text) => write!(f, "'{text}'"),
            Expression::Integer(value) => write!(f, "{value}"),
            Expression::Identifier(name) => f.write_str(name),
            Expression::Call(call) => write!(f, "{call}"),
        }
    }
}
