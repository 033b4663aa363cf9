//! Integration tests compiling whole Dread programs to assembly.
//!
//! Sample programs live in `tests/programs`; smaller cases are inline.

use bumpalo::Bump;
use std::fs;
use std::path::Path;

use dread::{compile, compile_with, CodegenOptions, CompilationSession, CompileError};

/// Helper to load a sample program from the test directory
fn load_program(filename: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/programs")
        .join(filename);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
}

/// Helper to check if output contains expected patterns
fn check_output_contains(output: &str, patterns: &[&str]) {
    for pattern in patterns {
        assert!(
            output.contains(pattern),
            "Output missing expected pattern: '{pattern}'\nFull output:\n{output}"
        );
    }
}

/// Instruction lines of the function labelled `label`, comments dropped.
fn function_code(asm: &str, label: &str) -> Vec<String> {
    asm.lines()
        .map(str::trim)
        .skip_while(|line| *line != format!("{label}:"))
        .skip(1)
        .take_while(|line| !line.is_empty())
        .filter(|line| !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[test]
fn test_hello_program() {
    let asm = compile(&load_program("hello.dread")).unwrap();

    check_output_contains(
        &asm,
        &[
            ".intel_syntax noprefix",
            ".global _start",
            ".section .data",
            "str_0: .asciz \"Hello, World!\\n\"",
            ".section .text",
            "strlen:",
            "_start:",
            "# Print(message)",
            "# Return(0)",
        ],
    );
    assert_eq!(asm.matches("Hello, World!").count(), 1);

    let code = function_code(&asm, "_start");
    let tail: Vec<&str> = code.iter().rev().take(3).rev().map(String::as_str).collect();
    assert_eq!(tail, ["mov rdi, 0", "mov rax, 60", "syscall"]);
}

#[test]
fn test_text_parameter_passed_in_register() {
    let asm = compile(&load_program("greet.dread")).unwrap();

    check_output_contains(&asm, &["fn_greet:", "call fn_greet", "# Parameter String name"]);

    // The caller loads the literal's address into the argument register
    let entry = function_code(&asm, "_start");
    let call = entry.iter().position(|l| l == "call fn_greet").unwrap();
    assert!(entry[call - 1].starts_with("lea rdi"), "{entry:?}");

    // The callee stores the argument and prints from its own slot
    let greet = function_code(&asm, "fn_greet");
    assert!(greet.iter().any(|l| l.contains("[rbp-8], rdi")), "{greet:?}");
    let reads = greet
        .iter()
        .filter(|l| l.starts_with("mov rdi,") && l.contains("[rbp-8]"))
        .count();
    assert_eq!(reads, 1, "{greet:?}");
    assert_eq!(greet.last().map(String::as_str), Some("ret"));
}

#[test]
fn test_call_results_are_printed() {
    let asm = compile(&load_program("call_result.dread")).unwrap();

    check_output_contains(
        &asm,
        &[
            "fn_get_name:",
            "fn_answer:",
            "# name = get_name()",
            "# value = answer()",
            "utoa:",
            "utoa_buf: .skip 32",
        ],
    );
    // The call expression itself is never printed as text
    assert!(!asm.contains(".asciz \"get_name()\""));

    let entry = function_code(&asm, "_start");
    let call = entry.iter().position(|l| l == "call fn_get_name").unwrap();
    assert!(entry[call + 1].contains("rax"), "{entry:?}");
    assert!(entry.iter().any(|l| l == "call utoa"));

    let answer = function_code(&asm, "fn_answer");
    assert!(answer.iter().any(|l| l == "mov rax, 42"));
}

#[test]
fn test_literals_are_pooled_once() {
    let asm = compile(
        "Entry main() {
            Print('same')
            Print('same')
            a = 'same'
            Print(a)
        }",
    )
    .unwrap();

    assert_eq!(asm.matches(".asciz").count(), 1);
    let refs = function_code(&asm, "_start")
        .iter()
        .filter(|l| l.starts_with("lea rdi") && l.contains("str_0"))
        .count();
    assert_eq!(refs, 3);
}

#[test]
fn test_entry_function_count() {
    let err = compile("Function helper() { }").unwrap_err();
    assert!(matches!(err, CompileError::MissingEntry));
    assert_eq!(err.to_string(), "program has no Entry function");

    let err = compile("Entry a() { } Entry b() { }").unwrap_err();
    assert!(matches!(err, CompileError::DuplicateEntry { .. }));
    assert!(err.to_string().contains("duplicate Entry function 'b'"));
}

#[test]
fn test_unknown_callee() {
    let err = compile("Entry main() { missing('x') }").unwrap_err();
    match err {
        CompileError::UnknownFunction { name, position } => {
            assert_eq!(name, "missing");
            assert_eq!(position.to_string(), "1:16");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_void_call_result_cannot_be_bound() {
    let err = compile(
        "Entry main() { x = nothing() }
         Function nothing() { }",
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::VoidValue { ref callee, .. } if callee == "nothing"));
}

#[test]
fn test_parse_errors_are_reported_together() {
    let err = compile("foo Entry main() { Print('x') } bar").unwrap_err();
    match &err {
        CompileError::Parse { diagnostics } => {
            assert_eq!(diagnostics.len(), 2, "{diagnostics:?}");
            assert!(diagnostics[0].message.contains("'foo'"));
            assert!(diagnostics[1].message.contains("'bar'"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("2 syntax error(s):"));
}

#[test]
fn test_session_statistics() {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    compile_with(
        &load_program("greet.dread"),
        &session,
        CodegenOptions::default(),
    )
    .unwrap();

    let stats = session.stats();
    assert_eq!(stats.functions_compiled, 2);
    assert_eq!(stats.total_calls, 1);
    assert!(stats.instructions_emitted > 0);
    check_output_contains(
        &stats.to_string(),
        &["Compilation Session Statistics:", "Functions compiled: 2"],
    );
}

#[test]
fn test_entry_statements_keep_source_order() {
    let asm = compile("Entry main() { Print('a') Print('b') Print(3) Return(4) }").unwrap();
    check_output_contains(
        &asm,
        &[
            "str_0: .asciz \"a\"",
            "str_1: .asciz \"b\"",
            "str_2: .asciz \"3\"",
        ],
    );

    let code = function_code(&asm, "_start");
    let loads: Vec<usize> = ["str_0", "str_1", "str_2"]
        .iter()
        .map(|label| {
            code.iter()
                .position(|l| l.starts_with("lea rdi") && l.contains(label))
                .unwrap_or_else(|| panic!("no load of {label}: {code:?}"))
        })
        .collect();
    assert!(loads.windows(2).all(|w| w[0] < w[1]), "{code:?}");

    let tail: Vec<&str> = code.iter().rev().take(3).rev().map(String::as_str).collect();
    assert_eq!(tail, ["mov rdi, 4", "mov rax, 60", "syscall"]);
    let exit = code.len() - 3;
    assert!(loads.iter().all(|&at| at < exit), "{code:?}");
}

#[test]
fn test_multiline_literal_stays_in_comment() {
    let asm = compile("Entry main() { Print('line one\nline two') }").unwrap();
    check_output_contains(
        &asm,
        &[
            "str_0: .asciz \"line one\\nline two\"",
            "# Print('line one\\nline two')",
        ],
    );
    for line in asm.lines().map(str::trim) {
        if line.contains("line two") {
            assert!(
                line.starts_with('#') || line.starts_with("str_0:"),
                "stray line {line:?}\n{asm}"
            );
        }
    }
}

#[test]
fn test_unknown_escapes_reach_data_section() {
    let asm = compile(r"Entry main() { Print('C:\path\x') Print('\0') }").unwrap();
    check_output_contains(
        &asm,
        &[
            r#"str_0: .asciz "C:\\path\\x""#,
            r#"str_1: .asciz "\\0""#,
        ],
    );
}
