//! Lexer for Dread source text.
//!
//! The lexer is lazy: tokens are produced one at a time by [`Lexer::next_token`]
//! or through the [`Iterator`] impl, which ends after yielding a single
//! [`TokenKind::Eof`] token. Unrecognised input never aborts lexing; it becomes
//! [`TokenKind::Illegal`] tokens for the parser to report.

use super::token::{Token, TokenKind};

#[derive(Debug, Clone)]
pub struct Lexer<'src> {
    input: &'src str,
    /// Byte offset of the current character.
    pos: usize,
    /// Position of the current character.
    line: u32,
    column: u32,
    /// Set once the iterator has handed out the EOF token.
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(input: &'src str) -> Self {
        let mut lexer = Self {
            input,
            pos: 0,
            line: 1,
            column: 0,
            finished: false,
        };
        lexer.enter_current();
        lexer
    }

    /// Rewind to the start of the input.
    pub fn restart(&mut self) {
        *self = Self::new(self.input);
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Update line/column for the character now under the cursor.
    fn enter_current(&mut self) {
        if self.current() == Some('\n') {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current() {
            self.pos += ch.len_utf8();
            self.enter_current();
        }
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(ch) = self.current() {
            if !pred(ch) {
                break;
            }
            self.advance();
        }
    }

    /// Produce the next token. Returns EOF tokens forever once the input is exhausted.
    pub fn next_token(&mut self) -> Token<'src> {
        self.skip_trivia();

        let (line, column) = (self.line, self.column);
        let start = self.pos;

        let Some(ch) = self.current() else {
            return Token::new(TokenKind::Eof, "", line, column);
        };

        let kind = match ch {
            '=' => TokenKind::Assign,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            '\'' => return self.read_string(line, column),
            c if is_letter(c) => {
                self.advance_while(|c| is_letter(c) || c.is_ascii_digit());
                let ident = &self.input[start..self.pos];
                return Token::new(TokenKind::lookup_ident(ident), ident, line, column);
            }
            c if c.is_ascii_digit() => {
                self.advance_while(|c| c.is_ascii_digit());
                return Token::new(TokenKind::Int, &self.input[start..self.pos], line, column);
            }
            _ => TokenKind::Illegal,
        };

        self.advance();
        Token::new(kind, &self.input[start..self.pos], line, column)
    }

    /// Skip whitespace and both comment forms.
    fn skip_trivia(&mut self) {
        loop {
            self.advance_while(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));

            match (self.current(), self.peek_char()) {
                (Some('/'), Some('/')) => {
                    self.advance_while(|c| c != '\n');
                }
                (Some('/'), Some('*')) => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    fn skip_block_comment(&mut self) {
        // Skip "/*"
        self.advance();
        self.advance();

        while let Some(ch) = self.current() {
            if ch == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
    }

    /// Read a single-quoted string. The cursor is on the opening quote.
    fn read_string(&mut self, line: u32, column: u32) -> Token<'src> {
        self.advance();
        let start = self.pos;

        while let Some(ch) = self.current() {
            if ch == '\'' {
                break;
            }
            if ch == '\\' && self.peek_char().is_some() {
                self.advance();
            }
            self.advance();
        }

        let literal = &self.input[start..self.pos];
        // Closing quote, if the string was terminated
        self.advance();
        Token::new(TokenKind::Str, literal, line, column)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Token<'src>> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.finished = true;
        }
        Some(token)
    }
}

fn is_letter(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_entry_function() {
        let src = "Entry main() (Int) {\n    msg = 'hi'\n    Print(msg)\n    Return(0)\n}";
        assert_eq!(
            kinds(src),
            vec![
                Entry, Ident, LParen, RParen, LParen, IntType, RParen, LBrace, Ident, Assign,
                Str, Print, LParen, Ident, RParen, Return, LParen, Int, RParen, RBrace, Eof
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let src = "// leading\nPrint /* inline */ ( 'x' ) // trailing";
        assert_eq!(kinds(src), vec![Print, LParen, Str, RParen, Eof]);
    }

    #[test]
    fn test_unterminated_block_comment_runs_to_end() {
        assert_eq!(kinds("Print /* never closed ( 'x'"), vec![Print, Eof]);
    }

    #[test]
    fn test_string_escapes_kept_verbatim() {
        let mut lexer = Lexer::new(r"'it\'s a \n test'");
        let tok = lexer.next_token();
        assert_eq!(tok.kind, Str);
        assert_eq!(tok.literal, r"it\'s a \n test");
        assert_eq!(lexer.next_token().kind, Eof);
    }

    #[test]
    fn test_unterminated_string_runs_to_end() {
        let mut lexer = Lexer::new("'open ended");
        let tok = lexer.next_token();
        assert_eq!(tok.kind, Str);
        assert_eq!(tok.literal, "open ended");
        assert_eq!(lexer.next_token().kind, Eof);
    }

    #[test]
    fn test_illegal_characters() {
        let tokens: Vec<_> = Lexer::new("a + / b").collect();
        assert_eq!(tokens[1].kind, Illegal);
        assert_eq!(tokens[1].literal, "+");
        assert_eq!(tokens[2].kind, Illegal);
        assert_eq!(tokens[2].literal, "/");
        assert_eq!(tokens[3].kind, Ident);
    }

    #[test]
    fn test_non_ascii_is_single_illegal_token() {
        let tokens: Vec<_> = Lexer::new("é1").collect();
        assert_eq!(tokens[0].kind, Illegal);
        assert_eq!(tokens[0].literal, "é");
        assert_eq!(tokens[1].kind, Int);
        assert_eq!(tokens[1].literal, "1");
    }

    #[test]
    fn test_positions() {
        let tokens: Vec<_> = Lexer::new("Entry main\n  x = 42").collect();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 7));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
        assert_eq!((tokens[4].line, tokens[4].column), (2, 7));
        assert_eq!(tokens[4].literal, "42");
    }

    #[test]
    fn test_iterator_ends_after_eof() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next().map(|t| t.kind), Some(Ident));
        assert_eq!(lexer.next().map(|t| t.kind), Some(Eof));
        assert_eq!(lexer.next(), None);

        // next_token keeps returning EOF
        assert_eq!(lexer.next_token().kind, Eof);
        assert_eq!(lexer.next_token().kind, Eof);
    }

    #[test]
    fn test_restart() {
        let mut lexer = Lexer::new("Print('a')");
        let first: Vec<_> = lexer.by_ref().collect();
        lexer.restart();
        let second: Vec<_> = lexer.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_identifiers_with_digits_and_underscores() {
        let tokens: Vec<_> = Lexer::new("_tmp1 value_2 3abc").collect();
        assert_eq!(tokens[0].literal, "_tmp1");
        assert_eq!(tokens[1].literal, "value_2");
        assert_eq!(tokens[2].kind, Int);
        assert_eq!(tokens[2].literal, "3");
        assert_eq!(tokens[3].kind, Ident);
        assert_eq!(tokens[3].literal, "abc");
    }
}
