//! Runtime helpers shared by all functions of a program.
//!
//! - `strlen`: length of the NUL-terminated text at RDI, returned in RAX.
//!   Only RAX is written.
//! - `utoa`: decimal text of the unsigned value in RDI, returned as an address
//!   in RAX. Writes RCX, RDX, RSI and the static `utoa_buf`, so the result is
//!   only valid until the next call.

use iced_x86::Register;

use crate::core::CompileResult;
use crate::x64::encoder::{AsmBuffer, AsmLine, SymbolTable};

pub const STRLEN: &str = "strlen";
pub const UTOA: &str = "utoa";
pub const UTOA_BUFFER: &str = "utoa_buf";

const STRLEN_LOOP: &str = "strlen_loop";
const STRLEN_DONE: &str = "strlen_done";
const UTOA_LOOP: &str = "utoa_loop";

/// Room for the 20 digits of u64::MAX plus the terminator.
const UTOA_BUFFER_SIZE: i32 = 32;

pub fn emit_strlen<'a>(symbols: &mut SymbolTable<'a>) -> CompileResult<Vec<AsmLine<'a>>> {
    let mut asm = AsmBuffer::new();
    symbols.address_of(STRLEN);

    asm.label(STRLEN);
    asm.xor32_reg_reg(Register::EAX, Register::EAX)?;
    asm.label(STRLEN_LOOP);
    asm.cmp8_mem_imm(Register::RDI, Register::RAX, 0)?;
    asm.je(symbols.address_of(STRLEN_DONE))?;
    asm.inc_reg(Register::RAX)?;
    asm.jmp(symbols.address_of(STRLEN_LOOP))?;
    asm.label(STRLEN_DONE);
    asm.ret();

    log::trace!("Emitted runtime helper {}", STRLEN);
    Ok(asm.into_lines())
}

pub fn emit_utoa<'a>(symbols: &mut SymbolTable<'a>) -> CompileResult<Vec<AsmLine<'a>>> {
    let mut asm = AsmBuffer::new();
    symbols.address_of(UTOA);

    asm.label(UTOA);
    // Digits are written backwards from the end of the buffer
    asm.lea_reg_label(Register::RSI, symbols.address_of(UTOA_BUFFER))?;
    asm.add_reg_imm(Register::RSI, UTOA_BUFFER_SIZE - 1)?;
    asm.mov8_mem_imm(Register::RSI, 0)?;
    asm.mov_reg_reg(Register::RAX, Register::RDI)?;
    asm.mov_reg_imm(Register::RCX, 10)?;
    asm.label(UTOA_LOOP);
    asm.xor32_reg_reg(Register::EDX, Register::EDX)?;
    asm.div_reg(Register::RCX)?;
    asm.add8_reg_imm(Register::DL, b'0' as i32)?;
    asm.dec_reg(Register::RSI)?;
    asm.mov8_mem_reg(Register::RSI, Register::DL)?;
    asm.test_reg_reg(Register::RAX, Register::RAX)?;
    asm.jne(symbols.address_of(UTOA_LOOP))?;
    asm.mov_reg_reg(Register::RAX, Register::RSI)?;
    asm.ret();

    log::trace!("Emitted runtime helper {}", UTOA);
    Ok(asm.into_lines())
}

/// `.bss` section reserving the `utoa` buffer.
pub fn utoa_bss() -> String {
    format!(".section .bss\n{UTOA_BUFFER}: .skip {UTOA_BUFFER_SIZE}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x64::encoder::AsmFormatter;

    fn render(lines: &[AsmLine<'_>], symbols: &SymbolTable<'_>) -> Vec<String> {
        let mut out = String::new();
        AsmFormatter::new(symbols).write_lines(lines, &mut out);
        out.lines().map(|l| l.trim().to_string()).collect()
    }

    #[test]
    fn test_strlen_shape() {
        let mut symbols = SymbolTable::new();
        let lines = emit_strlen(&mut symbols).unwrap();
        let text = render(&lines, &symbols);

        assert_eq!(text[0], "strlen:");
        assert_eq!(text[1], "xor eax, eax");
        assert_eq!(text[2], "strlen_loop:");
        assert!(text[3].starts_with("cmp byte ptr [rdi+rax]"), "{}", text[3]);
        assert_eq!(text[4], "je strlen_done");
        assert_eq!(text[5], "inc rax");
        assert_eq!(text[6], "jmp strlen_loop");
        assert_eq!(text[7], "strlen_done:");
        assert_eq!(text[8], "ret");
    }

    #[test]
    fn test_utoa_shape() {
        let mut symbols = SymbolTable::new();
        let lines = emit_utoa(&mut symbols).unwrap();
        let text = render(&lines, &symbols);

        assert_eq!(text[0], "utoa:");
        assert!(text[1].contains("utoa_buf"), "{}", text[1]);
        assert_eq!(text[2], "add rsi, 31");
        assert!(text.contains(&"div rcx".to_string()));
        assert!(text.contains(&"add dl, 48".to_string()));
        assert!(text.contains(&"jne utoa_loop".to_string()));
        assert_eq!(text.last().unwrap(), "ret");
    }

    #[test]
    fn test_bss_section() {
        assert_eq!(utoa_bss(), ".section .bss\nutoa_buf: .skip 32\n");
    }
}
