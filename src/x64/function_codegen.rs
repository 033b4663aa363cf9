// This module provides per-function code generation on top of the calling convention and the
// instruction encoder. FunctionCodegen owns the instruction buffer of one function body, its
// FunctionFrame and a borrow of the global SymbolTable so body code can refer to labels by
// name. It homes the incoming parameter (integer into callee-saved R15, text into a stack
// slot), allocates slots for spilled return values, and emits the two ways out of a
// function: the entry function exits the process with the exit syscall, ordinary functions
// unwind their frame with an epilogue that does not depend on the final frame size. The
// prologue is generated last, in finish(), once every slot is known, and prepended to the
// body together with the function's label.

//! Function code generation with the Dread calling convention.

use bumpalo::Bump;
use iced_x86::Register;

use crate::core::CompileResult;
use crate::x64::calling_convention::{
    FunctionFrame, ARG_REG, FRAME_REG, INT_PARAM_HOME, STACK_REG,
};
use crate::x64::encoder::{AsmBuffer, AsmLine, SymbolTable};

const SYS_WRITE: i64 = 1;
const SYS_EXIT: i64 = 60;
const STDOUT: i64 = 1;

/// Where a parameter lives for the rest of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamHome {
    Register(Register),
    Stack(i32),
}

/// Runtime class of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamClass {
    /// Passed by value.
    Integer,
    /// Passed as an address.
    Address,
}

/// Function code generator.
pub struct FunctionCodegen<'s, 'a> {
    symbol: &'a str,
    is_entry: bool,
    frame: FunctionFrame<'a>,
    symbols: &'s mut SymbolTable<'a>,
    body: AsmBuffer<'a>,
}

impl<'s, 'a> FunctionCodegen<'s, 'a> {
    pub fn new(
        arena: &'a Bump,
        symbols: &'s mut SymbolTable<'a>,
        symbol: &'a str,
        is_entry: bool,
    ) -> Self {
        symbols.address_of(symbol);
        Self {
            symbol,
            is_entry,
            frame: FunctionFrame::new(arena),
            symbols,
            body: AsmBuffer::new(),
        }
    }

    /// Access to the body buffer for instruction emission.
    pub fn asm(&mut self) -> &mut AsmBuffer<'a> {
        &mut self.body
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.body.comment(text);
    }

    /// Move the incoming argument to its home. Must run before any slot is
    /// allocated.
    pub fn home_parameter(&mut self, class: ParamClass) -> CompileResult<ParamHome> {
        match class {
            ParamClass::Integer => {
                self.frame.add_saved_register(INT_PARAM_HOME);
                self.body.mov_reg_reg(INT_PARAM_HOME, ARG_REG)?;
                Ok(ParamHome::Register(INT_PARAM_HOME))
            }
            ParamClass::Address => {
                let offset = self.frame.allocate_spill_slot(8);
                self.body.mov_mem_reg(FRAME_REG, offset, ARG_REG)?;
                Ok(ParamHome::Stack(offset))
            }
        }
    }

    /// Allocate a spill slot and return its frame offset.
    pub fn allocate_spill_slot(&mut self) -> i32 {
        self.frame.allocate_spill_slot(8)
    }

    /// Emit code to spill a register to its assigned stack slot.
    pub fn emit_spill(&mut self, reg: Register, offset: i32) -> CompileResult<()> {
        self.body.mov_mem_reg(FRAME_REG, offset, reg)
    }

    /// Emit code to reload a register from its spill slot.
    pub fn emit_reload(&mut self, reg: Register, offset: i32) -> CompileResult<()> {
        self.body.mov_reg_mem(reg, FRAME_REG, offset)
    }

    pub fn lea_label(&mut self, dst: Register, label: &'a str) -> CompileResult<()> {
        let address = self.symbols.address_of(label);
        self.body.lea_reg_label(dst, address)
    }

    pub fn call(&mut self, target: &'a str) -> CompileResult<()> {
        let address = self.symbols.address_of(target);
        self.body.call(address)
    }

    /// `write(1, rsi, rdx)` where RSI/RDX are loaded from RDI and RAX.
    pub fn emit_write_stdout(&mut self) -> CompileResult<()> {
        self.body.mov_reg_reg(Register::RDX, Register::RAX)?;
        self.body.mov_reg_reg(Register::RSI, Register::RDI)?;
        self.body.mov_reg_imm(Register::RAX, SYS_WRITE)?;
        self.body.mov_reg_imm(Register::RDI, STDOUT)?;
        self.body.syscall();
        Ok(())
    }

    /// Exit the process with the status already in RDI.
    pub fn emit_exit(&mut self) -> CompileResult<()> {
        self.body.mov_reg_imm(Register::RAX, SYS_EXIT)?;
        self.body.syscall();
        Ok(())
    }

    /// Generate function epilogue.
    ///
    /// RSP is recomputed from RBP, so the epilogue is valid wherever it is
    /// emitted, before the final frame size is known.
    pub fn emit_epilogue(&mut self) -> CompileResult<()> {
        let saved = self.frame.saved_area_size() as i32;
        if saved == 0 {
            self.body.mov_reg_reg(STACK_REG, FRAME_REG)?;
        } else {
            self.body.lea_reg_mem(STACK_REG, FRAME_REG, -saved)?;
        }

        for i in (0..self.frame.saved_registers.len()).rev() {
            let reg = self.frame.saved_registers[i];
            self.body.pop_reg(reg)?;
        }

        self.body.pop_reg(FRAME_REG)?;
        self.body.ret();
        Ok(())
    }

    /// Generate function prologue.
    ///
    /// Ordinary functions: `push rbp; mov rbp, rsp`, the saved registers, then
    /// the slot area. The entry function is never returned from, so it only sets
    /// up RBP when it has slots.
    fn emit_prologue(&mut self) -> CompileResult<AsmBuffer<'a>> {
        self.frame.calculate_frame_size();
        let mut prologue = AsmBuffer::new();
        prologue.label(self.symbol);

        if self.is_entry {
            if self.frame.has_slots() {
                prologue.mov_reg_reg(FRAME_REG, STACK_REG)?;
                prologue.sub_reg_imm(STACK_REG, self.frame.frame_size as i32)?;
            }
            return Ok(prologue);
        }

        prologue.push_reg(FRAME_REG)?;
        prologue.mov_reg_reg(FRAME_REG, STACK_REG)?;
        for &reg in self.frame.saved_registers.iter() {
            prologue.push_reg(reg)?;
        }
        if self.frame.frame_size > 0 {
            prologue.sub_reg_imm(STACK_REG, self.frame.frame_size as i32)?;
        }
        Ok(prologue)
    }

    /// Finalize code generation and return the complete function.
    pub fn finish(mut self) -> CompileResult<Vec<AsmLine<'a>>> {
        let mut function = self.emit_prologue()?;
        log::trace!(
            "{}: frame size {}, {} saved register(s), {} slot(s)",
            self.symbol,
            self.frame.frame_size,
            self.frame.saved_registers.len(),
            self.frame.spill_slots.len()
        );
        function.append(self.body);
        Ok(function.into_lines())
    }
}
