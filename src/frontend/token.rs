//! Token types produced by the lexer.

use std::borrow::Cow;
use std::fmt;

/// Kind tag of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A character the lexer does not recognise.
    Illegal,
    /// End of input.
    Eof,

    Ident,
    /// `'hello world'`
    Str,
    /// `123`
    Int,

    // Keywords
    Entry,
    Function,
    Print,
    Return,

    // Type keywords
    IntType,
    StringType,
    VoidType,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,

    /// `=`
    Assign,
}

/// Reserved words. Everything else matching the identifier shape is an `Ident`.
static KEYWORDS: &[(&str, TokenKind)] = &[
    ("Entry", TokenKind::Entry),
    ("Function", TokenKind::Function),
    ("Print", TokenKind::Print),
    ("Return", TokenKind::Return),
    ("Int", TokenKind::IntType),
    ("String", TokenKind::StringType),
    ("Void", TokenKind::VoidType),
];

impl TokenKind {
    /// Look up an identifier in the keyword table.
    pub fn lookup_ident(ident: &str) -> TokenKind {
        KEYWORDS
            .iter()
            .find(|(word, _)| *word == ident)
            .map(|&(_, kind)| kind)
            .unwrap_or(TokenKind::Ident)
    }

    /// Name used in diagnostics and token dumps.
    pub const fn name(self) -> &'static str {
        use TokenKind::*;
        match self {
            Illegal => "ILLEGAL",
            Eof => "EOF",
            Ident => "IDENT",
            Str => "STRING",
            Int => "INT",
            Entry => "ENTRY",
            Function => "FUNCTION",
            Print => "PRINT",
            Return => "RETURN",
            IntType => "INT_TYPE",
            StringType => "STRING_TYPE",
            VoidType => "VOID_TYPE",
            LParen => "LPAREN",
            RParen => "RPAREN",
            LBrace => "LBRACE",
            RBrace => "RBRACE",
            Comma => "COMMA",
            Assign => "ASSIGN",
        }
    }

    pub fn is_type(self) -> bool {
        matches!(
            self,
            TokenKind::IntType | TokenKind::StringType | TokenKind::VoidType
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single token. The literal borrows from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    /// Raw text of the token. For strings this is the text between the quotes,
    /// escapes kept verbatim.
    pub literal: &'src str,
    pub line: u32,
    pub column: u32,
}

impl<'src> Token<'src> {
    pub fn new(kind: TokenKind, literal: &'src str, line: u32, column: u32) -> Self {
        Self {
            kind,
            literal,
            line,
            column,
        }
    }

    /// Source text that lexes back to this token.
    ///
    /// A string whose literal ends in an unpaired backslash can only come from
    /// an unterminated string at the end of input, so it is not closed again.
    pub fn source_text(&self) -> Cow<'src, str> {
        match self.kind {
            TokenKind::Str if ends_with_unpaired_backslash(self.literal) => {
                Cow::Owned(format!("'{}", self.literal))
            }
            TokenKind::Str => Cow::Owned(format!("'{}'", self.literal)),
            _ => Cow::Borrowed(self.literal),
        }
    }
}

fn ends_with_unpaired_backslash(literal: &str) -> bool {
    literal.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {} {:?}",
            self.line, self.column, self.kind, self.literal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::lookup_ident("Entry"), TokenKind::Entry);
        assert_eq!(TokenKind::lookup_ident("Function"), TokenKind::Function);
        assert_eq!(TokenKind::lookup_ident("String"), TokenKind::StringType);
        // Keywords are case sensitive
        assert_eq!(TokenKind::lookup_ident("entry"), TokenKind::Ident);
        assert_eq!(TokenKind::lookup_ident("message"), TokenKind::Ident);
    }

    #[test]
    fn test_source_text_requotes_strings() {
        let tok = Token::new(TokenKind::Str, "it\\'s", 1, 1);
        assert_eq!(tok.source_text(), "'it\\'s'");

        let tok = Token::new(TokenKind::Ident, "name", 1, 1);
        assert_eq!(tok.source_text(), "name");
    }

    #[test]
    fn test_source_text_of_trailing_backslash() {
        let tok = Token::new(TokenKind::Str, "abc\\", 1, 1);
        assert_eq!(tok.source_text(), "'abc\\");

        // An escaped backslash is a complete escape, the string was closed
        let tok = Token::new(TokenKind::Str, "abc\\\\", 1, 1);
        assert_eq!(tok.source_text(), "'abc\\\\'");
    }
}
