// This module provides arena-based compilation session management using the bumpalo crate.
// CompilationSession owns a reference to the caller's arena and ties every per-compilation
// object to that single lifetime: interned strings (pool labels, function symbols and
// variable names stored as &'arena str), per-function frames and binding tables allocated
// in the arena by the code generator. It also accumulates SessionStats: functions compiled,
// instructions emitted with a per-mnemonic breakdown, the largest function, pooled string
// constants, call sites and spills. The driver prints the statistics with --stats through
// the Display implementation.

//! Arena-based compilation session management.
//!
//! All compilation objects are tied to the session lifetime, so code generation
//! never has to propagate more than the one `'arena` lifetime.

use bumpalo::Bump;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// Arena-based compilation session.
pub struct CompilationSession<'arena> {
    /// Arena allocator for compilation objects.
    arena: &'arena Bump,

    /// Session statistics for debugging.
    stats: RefCell<SessionStats>,

    /// String interning for labels and names.
    interned_strings: RefCell<HashMap<String, &'arena str>>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new compilation session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
            interned_strings: RefCell::new(HashMap::new()),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned = self.arena.alloc_str(s);
        strings.insert(s.to_string(), interned);
        interned
    }

    /// Record that a function was compiled.
    pub fn record_function_compiled(&self, name: &str, instruction_count: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_compiled += 1;

        if stats.largest_function_size < instruction_count {
            stats.largest_function_size = instruction_count;
            stats.largest_function_name = name.to_string();
        }
    }

    /// Record an emitted machine instruction.
    pub fn record_instruction_emitted(&self, mnemonic: &str) {
        let mut stats = self.stats.borrow_mut();
        stats.instructions_emitted += 1;
        *stats
            .instruction_counts
            .entry(mnemonic.to_string())
            .or_insert(0) += 1;
    }

    /// Record a new entry in the string constant pool.
    pub fn record_string_constant(&self) {
        self.stats.borrow_mut().string_constants += 1;
    }

    /// Record a call to a user function.
    pub fn record_call_site(&self, function_name: &str) {
        self.stats.borrow_mut().total_calls += 1;
        log::debug!("Call site recorded: {}", function_name);
    }

    /// Record a pending return value spilled to the stack.
    pub fn record_spill_generated(&self) {
        self.stats.borrow_mut().spills_generated += 1;
    }

    /// Get compilation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Number of functions compiled (entry included).
    pub functions_compiled: usize,

    /// Number of machine instructions emitted, helpers included.
    pub instructions_emitted: usize,

    /// Count of each mnemonic emitted.
    pub instruction_counts: HashMap<String, usize>,

    /// Largest function compiled, in instructions.
    pub largest_function_size: usize,

    /// Name of largest function.
    pub largest_function_name: String,

    /// Distinct literals in the string constant pool.
    pub string_constants: usize,

    /// Calls to user functions compiled.
    pub total_calls: usize,

    /// Return values spilled to the stack.
    pub spills_generated: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Functions compiled: {}", self.functions_compiled)?;
        writeln!(f, "  Instructions emitted: {}", self.instructions_emitted)?;
        writeln!(f, "  String constants: {}", self.string_constants)?;
        writeln!(f, "  Function calls compiled: {}", self.total_calls)?;
        writeln!(f, "  Spills generated: {}", self.spills_generated)?;

        if !self.largest_function_name.is_empty() {
            writeln!(
                f,
                "  Largest function: {} ({} instructions)",
                self.largest_function_name, self.largest_function_size
            )?;
        }

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

            for (mnemonic, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", mnemonic, count)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_session_creation() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        let stats = session.stats();
        assert_eq!(stats.functions_compiled, 0);
        assert_eq!(stats.instructions_emitted, 0);
        assert_eq!(stats.string_constants, 0);
    }

    #[test]
    fn test_string_interning() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        let s1 = session.intern_str("str_0");
        let s2 = session.intern_str("str_0");
        let s3 = session.intern_str("str_1");

        assert_eq!(s1.as_ptr(), s2.as_ptr());
        assert_ne!(s1.as_ptr(), s3.as_ptr());
    }

    #[test]
    fn test_session_statistics() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        session.record_function_compiled("main", 12);
        session.record_instruction_emitted("mov");
        session.record_instruction_emitted("call");
        session.record_instruction_emitted("mov");
        session.record_string_constant();
        session.record_call_site("greet");
        session.record_spill_generated();

        let stats = session.stats();
        assert_eq!(stats.functions_compiled, 1);
        assert_eq!(stats.instructions_emitted, 3);
        assert_eq!(stats.instruction_counts["mov"], 2);
        assert_eq!(stats.instruction_counts["call"], 1);
        assert_eq!(stats.string_constants, 1);
        assert_eq!(stats.total_calls, 1);
        assert_eq!(stats.spills_generated, 1);
    }

    #[test]
    fn test_statistics_display() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        session.record_function_compiled("greet", 9);
        session.record_instruction_emitted("lea");
        session.record_instruction_emitted("syscall");

        let output = format!("{}", session.stats());
        assert!(output.contains("Functions compiled: 1"));
        assert!(output.contains("Instructions emitted: 2"));
        assert!(output.contains("greet (9 instructions)"));
    }
}
