// This module defines the calling convention used between Dread functions on x86-64 Linux.
// Every function takes at most one argument, passed in RDI, and returns its value in RAX
// (an address for text, the value itself for integers). An integer parameter is moved to
// callee-saved R15 in the prologue so it survives the syscalls and helper calls of the
// body; a text parameter is stored to a stack slot. FunctionFrame manages the stack
// layout below RBP: saved callee-saved registers first, then 8-byte slots for text
// parameters and spilled return values, with the allocation rounded so RSP stays 16-byte
// aligned at call sites. Symbol naming lives here as well: the entry function becomes
// _start and every ordinary function is prefixed so user names never collide with
// registers, pool labels or runtime helpers.

//! Dread calling convention and stack frame layout.

use bumpalo::{collections::Vec as BumpVec, Bump};
use iced_x86::Register;

/// Register carrying the single argument of a call.
pub const ARG_REG: Register = Register::RDI;

/// Register carrying the return value.
pub const RET_REG: Register = Register::RAX;

/// Callee-saved home of an integer parameter.
pub const INT_PARAM_HOME: Register = Register::R15;

pub const FRAME_REG: Register = Register::RBP;
pub const STACK_REG: Register = Register::RSP;

/// Symbol of the entry function (the process entry point).
pub const ENTRY_SYMBOL: &str = "_start";

/// Symbol of an ordinary function.
pub fn function_symbol(name: &str) -> String {
    format!("fn_{name}")
}

/// Stack frame of one function.
#[derive(Debug)]
pub struct FunctionFrame<'a> {
    /// Callee-saved registers pushed after RBP, in push order.
    pub saved_registers: BumpVec<'a, Register>,
    /// Bytes subtracted from RSP after the pushes.
    pub frame_size: u32,
    /// RBP-relative offsets of allocated slots.
    pub spill_slots: BumpVec<'a, i32>,
    /// Lowest offset handed out so far.
    pub spill_offset: i32,
}

impl<'a> FunctionFrame<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        Self {
            saved_registers: BumpVec::new_in(arena),
            frame_size: 0,
            spill_slots: BumpVec::new_in(arena),
            spill_offset: 0,
        }
    }

    /// Add a callee-saved register that needs preservation. Must be called
    /// before any slot is allocated, since the pushes sit directly below RBP.
    pub fn add_saved_register(&mut self, reg: Register) {
        debug_assert!(self.spill_slots.is_empty());
        if !self.saved_registers.contains(&reg) {
            self.saved_registers.push(reg);
            self.spill_offset -= 8;
        }
    }

    /// Allocate a new slot and return its RBP-relative offset.
    pub fn allocate_spill_slot(&mut self, size: u32) -> i32 {
        let aligned_size = size.div_ceil(8) * 8;
        self.spill_offset -= aligned_size as i32;
        let offset = self.spill_offset;
        self.spill_slots.push(offset);
        offset
    }

    pub fn has_slots(&self) -> bool {
        !self.spill_slots.is_empty()
    }

    /// Offset of RSP from RBP once the saved registers are pushed.
    pub fn saved_area_size(&self) -> u32 {
        self.saved_registers.len() as u32 * 8
    }

    /// Calculate the final frame size.
    pub fn calculate_frame_size(&mut self) {
        // Frame layout:
        // rbp:      saved rbp (ordinary functions only)
        // rbp - 8:  saved registers (callee-saved)
        // rbp - X:  parameter and spill slots
        let saved = self.saved_area_size();
        let used = (-self.spill_offset) as u32;

        // RBP is 16-byte aligned in every frame, keep RSP aligned too
        self.frame_size = used.div_ceil(16) * 16 - saved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_symbols() {
        assert_eq!(function_symbol("greet"), "fn_greet");
        assert_eq!(function_symbol("rax"), "fn_rax");
    }

    #[test]
    fn test_function_frame_spill_allocation() {
        let arena = Bump::new();
        let mut frame = FunctionFrame::new(&arena);

        let slot1 = frame.allocate_spill_slot(8);
        let slot2 = frame.allocate_spill_slot(4);

        assert_eq!(slot1, -8);
        assert_eq!(slot2, -16);
        assert!(frame.has_slots());
    }

    #[test]
    fn test_slots_sit_below_saved_registers() {
        let arena = Bump::new();
        let mut frame = FunctionFrame::new(&arena);

        frame.add_saved_register(Register::R15);
        frame.add_saved_register(Register::R15);
        assert_eq!(frame.saved_registers.len(), 1);

        assert_eq!(frame.allocate_spill_slot(8), -16);
    }

    #[test]
    fn test_frame_size_keeps_alignment() {
        let arena = Bump::new();

        let mut frame = FunctionFrame::new(&arena);
        frame.calculate_frame_size();
        assert_eq!(frame.frame_size, 0);

        let mut frame = FunctionFrame::new(&arena);
        frame.allocate_spill_slot(8);
        frame.calculate_frame_size();
        assert_eq!(frame.frame_size, 16);

        let mut frame = FunctionFrame::new(&arena);
        frame.add_saved_register(Register::R15);
        frame.calculate_frame_size();
        assert_eq!(frame.frame_size, 8);

        let mut frame = FunctionFrame::new(&arena);
        frame.add_saved_register(Register::R15);
        frame.allocate_spill_slot(8);
        frame.calculate_frame_size();
        assert_eq!(frame.frame_size, 8);
        assert_eq!((frame.saved_area_size() + frame.frame_size) % 16, 0);
    }
}
