//! Deduplicating pool of literal text emitted to the data section.
//!
//! Every string literal and every integer literal (by its decimal text) gets
//! one `str_N` label. Labels are numbered in first-seen order of a walk over
//! the AST in declaration order, so the data section is stable across runs.

use hashbrown::HashMap;
use std::fmt::Write;

use crate::core::{CompilationSession, CompileResult};
use crate::frontend::ast::{Call, Expression, Program, Statement};

#[derive(Debug, Clone, Copy)]
struct PoolEntry<'a> {
    label: &'a str,
    /// Raw literal text, escapes still in source form.
    text: &'a str,
}

pub struct StringPool<'a> {
    entries: Vec<PoolEntry<'a>>,
    index: HashMap<&'a str, usize>,
}

impl<'a> StringPool<'a> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Pool every literal of `program`.
    pub fn collect(program: &Program, session: &CompilationSession<'a>) -> Self {
        let mut pool = Self::new();
        for function in &program.functions {
            for stmt in &function.body.statements {
                match stmt {
                    Statement::Assign { value, .. } => pool.collect_expression(value, session),
                    Statement::Call(call) => pool.collect_call(call, session),
                }
            }
        }
        log::debug!("String pool holds {} constant(s)", pool.len());
        pool
    }

    fn collect_call(&mut self, call: &Call, session: &CompilationSession<'a>) {
        for arg in &call.args {
            self.collect_expression(arg, session);
        }
    }

    fn collect_expression(&mut self, expr: &Expression, session: &CompilationSession<'a>) {
        match expr {
            Expression::Text(text) => {
                self.intern(text, session);
            }
            Expression::Integer(value) => {
                self.intern(&value.to_string(), session);
            }
            Expression::Identifier(_) => {}
            Expression::Call(call) => self.collect_call(call, session),
        }
    }

    /// Label for `text`, adding it on first sight.
    pub fn intern(&mut self, text: &str, session: &CompilationSession<'a>) -> &'a str {
        if let Some(&idx) = self.index.get(text) {
            return self.entries[idx].label;
        }

        let label = session.intern_str(&format!("str_{}", self.entries.len()));
        let text = session.intern_str(text);
        self.index.insert(text, self.entries.len());
        self.entries.push(PoolEntry { label, text });
        session.record_string_constant();
        label
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the `.data` section.
    pub fn write_data_section(&self, out: &mut String) -> CompileResult<()> {
        writeln!(out, ".section .data")?;
        for entry in &self.entries {
            writeln!(out, "{}: .asciz \"{}\"", entry.label, escape_asciz(entry.text))?;
        }
        Ok(())
    }
}

impl Default for StringPool<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert raw literal text into the body of a GAS `.asciz` string.
///
/// Dread's escapes `\n`, `\t`, `\r`, `\\`, `\"` and `\'` keep their meaning.
/// Any other backslash is literal, so both it and the next character reach the
/// data section. Characters GAS cannot take verbatim are escaped.
pub fn escape_asciz(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            escape_char(ch, &mut out);
            continue;
        }
        match chars.next() {
            Some('\'') => out.push('\''),
            Some(next @ ('n' | 't' | 'r' | '\\' | '"')) => {
                out.push('\\');
                out.push(next);
            }
            Some(next) => {
                out.push_str("\\\\");
                escape_char(next, &mut out);
            }
            None => out.push_str("\\\\"),
        }
    }

    out
}

fn escape_char(ch: char, out: &mut String) {
    match ch {
        '"' => out.push_str("\\\""),
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\r' => out.push_str("\\r"),
        c if c == ' ' || c.is_ascii_graphic() => out.push(c),
        c => {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                // Three digits so a following digit is never absorbed
                let _ = write!(out, "\\{byte:03o}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse;
    use bumpalo::Bump;

    #[test]
    fn test_pool_deduplicates_in_first_seen_order() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let (program, diagnostics) = parse(
            "Entry main() {
                a = 'hi'
                Print('hi')
                Print('bye')
                Return(3)
            }
            Function f() { Print('hi') Print('x') }",
        );
        assert!(diagnostics.is_empty());

        let mut pool = StringPool::collect(&program, &session);
        let mut out = String::new();
        pool.write_data_section(&mut out).unwrap();
        assert_eq!(
            out,
            ".section .data\n\
             str_0: .asciz \"hi\"\n\
             str_1: .asciz \"bye\"\n\
             str_2: .asciz \"3\"\n\
             str_3: .asciz \"x\"\n"
        );
        assert_eq!(pool.len(), 4);
        assert_eq!(session.stats().string_constants, 4);

        // Already pooled, so no new entry
        assert_eq!(pool.intern("bye", &session), "str_1");
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn test_integer_and_text_share_entries() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut pool = StringPool::new();
        let a = pool.intern("42", &session);
        let b = pool.intern(&42.to_string(), &session);
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_data_section() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut pool = StringPool::new();
        pool.intern("Hello", &session);
        pool.intern("say \"hi\"", &session);

        let mut out = String::new();
        pool.write_data_section(&mut out).unwrap();
        assert_eq!(
            out,
            ".section .data\nstr_0: .asciz \"Hello\"\nstr_1: .asciz \"say \\\"hi\\\"\"\n"
        );
    }

    #[test]
    fn test_escape_asciz() {
        assert_eq!(escape_asciz(r"it\'s"), "it's");
        assert_eq!(escape_asciz(r"line\n"), r"line\n");
        assert_eq!(escape_asciz(r"back\\slash"), r"back\\slash");
        assert_eq!(escape_asciz("tab\there"), r"tab\there");
        assert_eq!(escape_asciz("raw\nline"), r"raw\nline");
        assert_eq!(escape_asciz("é"), r"\303\251");
        assert_eq!(escape_asciz("\u{1}9"), r"\0019");
        assert_eq!(escape_asciz("end\\"), r"end\\");
        assert_eq!(escape_asciz(r#"say \"hi\""#), r#"say \"hi\""#);
    }

    #[test]
    fn test_unknown_escapes_keep_both_bytes() {
        assert_eq!(escape_asciz(r"C:\path\x"), r"C:\\path\\x");
        assert_eq!(escape_asciz(r"a\x"), r"a\\x");
        assert_eq!(escape_asciz(r"\0b"), r"\\0b");
        assert_eq!(escape_asciz(r"\q"), r"\\q");
        assert_eq!(escape_asciz("\\\u{1}"), r"\\\001");
    }
}
