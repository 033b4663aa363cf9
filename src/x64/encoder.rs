// This module builds and renders x86-64 instructions using the iced-x86 library. Every
// machine instruction the compiler emits is constructed as an iced_x86::Instruction from an
// explicit Code, so an invalid operand combination fails at construction with an IcedError
// instead of producing assembly the GNU assembler rejects. AsmBuffer collects instructions,
// labels and annotation comments for one function or runtime helper and exposes one method
// per instruction form the code generator needs (moves, LEA, stack operations, calls and
// branches, the byte operations of the runtime helpers). Labels are referenced through
// synthetic addresses handed out by SymbolTable; at render time LabelResolver maps those
// addresses back to names so IntelFormatter prints `call strlen` and `lea rdi, [str_0]`.
// AsmFormatter configures the formatter for GAS .intel_syntax noprefix output with decimal
// numbers.

//! x86-64 instruction construction and Intel-syntax rendering using iced-x86.

use hashbrown::HashMap;
use iced_x86::{
    Code, Formatter, Instruction, IntelFormatter, MemoryOperand, NumberBase, OpKind, Register,
    SymbolResolver, SymbolResult,
};

use crate::core::CompileResult;

/// First synthetic address handed out to a label.
const SYMBOL_BASE: u64 = 0x1000_0000;
const SYMBOL_STRIDE: u64 = 0x10;

/// One line of the text section.
#[derive(Debug, Clone)]
pub enum AsmLine<'a> {
    Label(&'a str),
    Instruction(Instruction),
    Comment(String),
}

/// Maps label names to the synthetic addresses used as instruction operands.
#[derive(Debug, Default)]
pub struct SymbolTable<'a> {
    addresses: HashMap<&'a str, u64>,
}

impl<'a> SymbolTable<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address standing in for `name`, assigned on first use.
    pub fn address_of(&mut self, name: &'a str) -> u64 {
        let next = SYMBOL_BASE + self.addresses.len() as u64 * SYMBOL_STRIDE;
        *self.addresses.entry(name).or_insert(next)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Snapshot of the table for the formatter.
    pub fn resolver(&self) -> LabelResolver {
        LabelResolver {
            names: self
                .addresses
                .iter()
                .map(|(name, address)| (*address, name.to_string()))
                .collect(),
        }
    }
}

/// Resolves synthetic label addresses in branch targets and absolute or
/// RIP-relative memory operands.
pub struct LabelResolver {
    names: HashMap<u64, String>,
}

impl SymbolResolver for LabelResolver {
    fn symbol(
        &mut self,
        instruction: &Instruction,
        _operand: u32,
        instruction_operand: Option<u32>,
        address: u64,
        _address_size: u32,
    ) -> Option<SymbolResult<'_>> {
        let op_kind = instruction.op_kind(instruction_operand?);
        let is_label_operand = match op_kind {
            OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64 => true,
            OpKind::Memory => matches!(
                instruction.memory_base(),
                Register::RIP | Register::None
            ),
            _ => false,
        };
        if !is_label_operand {
            return None;
        }

        self.names
            .get(&address)
            .map(|name| SymbolResult::with_str(address, name.as_str()))
    }
}

/// Renders [`AsmLine`]s as GAS Intel-syntax text.
pub struct AsmFormatter {
    formatter: IntelFormatter,
    scratch: String,
}

impl AsmFormatter {
    pub fn new(symbols: &SymbolTable<'_>) -> Self {
        let mut formatter = IntelFormatter::with_options(Some(Box::new(symbols.resolver())), None);
        let options = formatter.options_mut();
        options.set_number_base(NumberBase::Decimal);
        options.set_space_after_operand_separator(true);
        options.set_show_branch_size(false);
        options.set_rip_relative_addresses(false);

        Self {
            formatter,
            scratch: String::new(),
        }
    }

    pub fn format_instruction(&mut self, instruction: &Instruction) -> &str {
        self.scratch.clear();
        self.formatter.format(instruction, &mut self.scratch);
        &self.scratch
    }

    pub fn write_lines(&mut self, lines: &[AsmLine<'_>], out: &mut String) {
        for line in lines {
            match line {
                AsmLine::Label(name) => {
                    out.push_str(name);
                    out.push_str(":\n");
                }
                AsmLine::Instruction(instruction) => {
                    out.push_str("    ");
                    out.push_str(self.format_instruction(instruction));
                    out.push('\n');
                }
                AsmLine::Comment(text) => {
                    out.push_str("    # ");
                    // A raw line break would end the comment early
                    for ch in text.chars() {
                        if ch.is_control() {
                            out.extend(ch.escape_default());
                        } else {
                            out.push(ch);
                        }
                    }
                    out.push('\n');
                }
            }
        }
    }
}

/// Lowercase mnemonic of an instruction, as used in statistics.
pub fn mnemonic_name(instruction: &Instruction) -> String {
    format!("{:?}", instruction.mnemonic()).to_ascii_lowercase()
}

/// Instruction buffer for one function or helper.
#[derive(Debug, Default)]
pub struct AsmBuffer<'a> {
    lines: Vec<AsmLine<'a>>,
}

impl<'a> AsmBuffer<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_lines(self) -> Vec<AsmLine<'a>> {
        self.lines
    }

    pub fn append(&mut self, other: AsmBuffer<'a>) {
        self.lines.extend(other.lines);
    }

    pub fn label(&mut self, name: &'a str) {
        self.lines.push(AsmLine::Label(name));
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.lines.push(AsmLine::Comment(text.into()));
    }

    fn emit(&mut self, instruction: Instruction) {
        self.lines.push(AsmLine::Instruction(instruction));
    }

    /// mov reg64, imm64
    pub fn mov_reg_imm(&mut self, dst: Register, imm: i64) -> CompileResult<()> {
        self.emit(Instruction::with2(Code::Mov_r64_imm64, dst, imm as u64)?);
        Ok(())
    }

    /// mov reg64, reg64
    pub fn mov_reg_reg(&mut self, dst: Register, src: Register) -> CompileResult<()> {
        self.emit(Instruction::with2(Code::Mov_r64_rm64, dst, src)?);
        Ok(())
    }

    /// mov reg64, [base + offset]
    pub fn mov_reg_mem(&mut self, dst: Register, base: Register, offset: i32) -> CompileResult<()> {
        let mem = MemoryOperand::with_base_displ(base, offset as i64);
        self.emit(Instruction::with2(Code::Mov_r64_rm64, dst, mem)?);
        Ok(())
    }

    /// mov [base + offset], reg64
    pub fn mov_mem_reg(&mut self, base: Register, offset: i32, src: Register) -> CompileResult<()> {
        let mem = MemoryOperand::with_base_displ(base, offset as i64);
        self.emit(Instruction::with2(Code::Mov_rm64_r64, mem, src)?);
        Ok(())
    }

    /// lea reg64, [label]
    pub fn lea_reg_label(&mut self, dst: Register, label_address: u64) -> CompileResult<()> {
        let mem = MemoryOperand::with_base_displ(Register::RIP, label_address as i64);
        self.emit(Instruction::with2(Code::Lea_r64_m, dst, mem)?);
        Ok(())
    }

    /// lea reg64, [base + offset]
    pub fn lea_reg_mem(&mut self, dst: Register, base: Register, offset: i32) -> CompileResult<()> {
        let mem = MemoryOperand::with_base_displ(base, offset as i64);
        self.emit(Instruction::with2(Code::Lea_r64_m, dst, mem)?);
        Ok(())
    }

    pub fn push_reg(&mut self, reg: Register) -> CompileResult<()> {
        self.emit(Instruction::with1(Code::Push_r64, reg)?);
        Ok(())
    }

    pub fn pop_reg(&mut self, reg: Register) -> CompileResult<()> {
        self.emit(Instruction::with1(Code::Pop_r64, reg)?);
        Ok(())
    }

    pub fn add_reg_imm(&mut self, dst: Register, imm: i32) -> CompileResult<()> {
        self.emit(Instruction::with2(Code::Add_rm64_imm32, dst, imm)?);
        Ok(())
    }

    pub fn sub_reg_imm(&mut self, dst: Register, imm: i32) -> CompileResult<()> {
        self.emit(Instruction::with2(Code::Sub_rm64_imm32, dst, imm)?);
        Ok(())
    }

    /// xor reg32, reg32 (zeroes the full register)
    pub fn xor32_reg_reg(&mut self, dst: Register, src: Register) -> CompileResult<()> {
        self.emit(Instruction::with2(Code::Xor_r32_rm32, dst, src)?);
        Ok(())
    }

    pub fn test_reg_reg(&mut self, left: Register, right: Register) -> CompileResult<()> {
        self.emit(Instruction::with2(Code::Test_rm64_r64, left, right)?);
        Ok(())
    }

    pub fn inc_reg(&mut self, reg: Register) -> CompileResult<()> {
        self.emit(Instruction::with1(Code::Inc_rm64, reg)?);
        Ok(())
    }

    pub fn dec_reg(&mut self, reg: Register) -> CompileResult<()> {
        self.emit(Instruction::with1(Code::Dec_rm64, reg)?);
        Ok(())
    }

    /// Unsigned divide of rdx:rax by a 64-bit register.
    pub fn div_reg(&mut self, divisor: Register) -> CompileResult<()> {
        self.emit(Instruction::with1(Code::Div_rm64, divisor)?);
        Ok(())
    }

    /// add reg8, imm8
    pub fn add8_reg_imm(&mut self, dst: Register, imm: i32) -> CompileResult<()> {
        self.emit(Instruction::with2(Code::Add_rm8_imm8, dst, imm)?);
        Ok(())
    }

    /// cmp byte ptr [base + index], imm8
    pub fn cmp8_mem_imm(&mut self, base: Register, index: Register, imm: i32) -> CompileResult<()> {
        let mem = MemoryOperand::with_base_index(base, index);
        self.emit(Instruction::with2(Code::Cmp_rm8_imm8, mem, imm)?);
        Ok(())
    }

    /// mov byte ptr [base], imm8
    pub fn mov8_mem_imm(&mut self, base: Register, imm: i32) -> CompileResult<()> {
        let mem = MemoryOperand::with_base(base);
        self.emit(Instruction::with2(Code::Mov_rm8_imm8, mem, imm)?);
        Ok(())
    }

    /// mov byte ptr [base], reg8
    pub fn mov8_mem_reg(&mut self, base: Register, src: Register) -> CompileResult<()> {
        let mem = MemoryOperand::with_base(base);
        self.emit(Instruction::with2(Code::Mov_rm8_r8, mem, src)?);
        Ok(())
    }

    pub fn call(&mut self, target_address: u64) -> CompileResult<()> {
        self.emit(Instruction::with_branch(Code::Call_rel32_64, target_address)?);
        Ok(())
    }

    pub fn jmp(&mut self, target_address: u64) -> CompileResult<()> {
        self.emit(Instruction::with_branch(Code::Jmp_rel32_64, target_address)?);
        Ok(())
    }

    pub fn je(&mut self, target_address: u64) -> CompileResult<()> {
        self.emit(Instruction::with_branch(Code::Je_rel32_64, target_address)?);
        Ok(())
    }

    pub fn jne(&mut self, target_address: u64) -> CompileResult<()> {
        self.emit(Instruction::with_branch(Code::Jne_rel32_64, target_address)?);
        Ok(())
    }

    pub fn ret(&mut self) {
        self.emit(Instruction::with(Code::Retnq));
    }

    pub fn syscall(&mut self) {
        self.emit(Instruction::with(Code::Syscall));
    }
}
