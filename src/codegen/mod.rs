// This module turns a parsed Dread program into one GAS Intel-syntax assembly text. The
// CodeGenerator validates the program's declarations (FunctionTable), pools every literal
// (StringPool), then compiles the entry function followed by each ordinary function in
// declaration order. Per function, a FunctionCompiler walks the statements: assignments
// bind names to storage descriptors without emitting code (literals bind pool labels,
// identifiers alias, calls bind the return-value register), Print writes text through the
// strlen helper and the write syscall (runtime integers are first converted by utoa),
// Return exits the process from the entry function or unwinds the frame of an ordinary
// function, and user calls pass their single argument in RDI. Any pending return value is
// spilled to a stack slot before a statement that clobbers RAX. The final text is
// assembled from the header, the data section, the optional bss section, the runtime
// helpers and every function, all rendered through iced-x86.

//! AST to x86-64 assembly code generation.

pub mod bindings;
pub mod signatures;
pub mod string_pool;

use bumpalo::Bump;
use iced_x86::Register;
use std::fmt::Write;

use crate::core::{CodegenOptions, CompilationSession, CompileError, CompileResult};
use crate::frontend::ast::{
    Builtin, Call, Callee, Expression, Function, Position, Program, Statement, TypeTag,
};
use crate::x64::calling_convention::{function_symbol, ARG_REG, ENTRY_SYMBOL, RET_REG};
use crate::x64::encoder::{mnemonic_name, AsmFormatter, AsmLine, SymbolTable};
use crate::x64::function_codegen::{FunctionCodegen, ParamClass, ParamHome};
use crate::x64::runtime;

pub use bindings::{Bindings, ConstantValue, Storage, ValueKind};
pub use signatures::FunctionTable;
pub use string_pool::StringPool;

/// Generate assembly for `program` with default options and a private arena.
pub fn generate(program: &Program) -> CompileResult<String> {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    CodeGenerator::new(&session, CodegenOptions::default()).generate(program)
}

/// Whole-program code generator.
pub struct CodeGenerator<'s, 'a> {
    session: &'s CompilationSession<'a>,
    options: CodegenOptions,
}

/// Output of one compiled function.
struct CompiledFunction<'a> {
    lines: Vec<AsmLine<'a>>,
    uses_utoa: bool,
}

impl<'s, 'a> CodeGenerator<'s, 'a> {
    pub fn new(session: &'s CompilationSession<'a>, options: CodegenOptions) -> Self {
        Self { session, options }
    }

    pub fn generate(&self, program: &Program) -> CompileResult<String> {
        let table = FunctionTable::build(program)?;
        let mut pool = StringPool::collect(program, self.session);
        let mut symbols = SymbolTable::new();

        let mut compiled = Vec::new();
        compiled.push(self.compile_function(table.entry(), &table, &mut pool, &mut symbols)?);
        for function in program.ordinary_functions() {
            compiled.push(self.compile_function(function, &table, &mut pool, &mut symbols)?);
        }

        let uses_utoa = compiled.iter().any(|f| f.uses_utoa);
        let mut helpers = vec![runtime::emit_strlen(&mut symbols)?];
        if uses_utoa {
            helpers.push(runtime::emit_utoa(&mut symbols)?);
        }
        for lines in &helpers {
            self.record_instructions(lines);
        }

        let mut out = String::new();
        writeln!(out, ".intel_syntax noprefix")?;
        writeln!(out, ".global {ENTRY_SYMBOL}")?;
        writeln!(out)?;
        pool.write_data_section(&mut out)?;
        writeln!(out)?;
        if uses_utoa {
            out.push_str(&runtime::utoa_bss());
            writeln!(out)?;
        }
        writeln!(out, ".section .text")?;

        let mut formatter = AsmFormatter::new(&symbols);
        for lines in &helpers {
            formatter.write_lines(lines, &mut out);
            writeln!(out)?;
        }
        for (idx, function) in compiled.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            formatter.write_lines(&function.lines, &mut out);
        }

        log::debug!(
            "Generated {} function(s), {} symbol(s), {} bytes of assembly",
            compiled.len(),
            symbols.len(),
            out.len()
        );
        Ok(out)
    }

    fn compile_function<'g>(
        &self,
        function: &'g Function,
        table: &'g FunctionTable<'g>,
        pool: &'g mut StringPool<'a>,
        symbols: &'g mut SymbolTable<'a>,
    ) -> CompileResult<CompiledFunction<'a>> {
        log::debug!("Compiling function '{}'", function.name);

        let symbol = if function.is_entry {
            self.session.intern_str(ENTRY_SYMBOL)
        } else {
            self.session.intern_str(&function_symbol(&function.name))
        };

        let mut compiler = FunctionCompiler {
            session: self.session,
            options: self.options,
            table,
            pool,
            function,
            bindings: Bindings::new_in(self.session.arena()),
            cg: FunctionCodegen::new(self.session.arena(), symbols, symbol, function.is_entry),
            uses_utoa: false,
        };
        compiler.compile()?;

        let uses_utoa = compiler.uses_utoa;
        let lines = compiler.cg.finish()?;
        let count = self.record_instructions(&lines);
        self.session.record_function_compiled(&function.name, count);

        Ok(CompiledFunction { lines, uses_utoa })
    }

    fn record_instructions(&self, lines: &[AsmLine<'_>]) -> usize {
        let mut count = 0;
        for line in lines {
            if let AsmLine::Instruction(instruction) = line {
                self.session.record_instruction_emitted(&mnemonic_name(instruction));
                count += 1;
            }
        }
        count
    }
}

/// Statement compiler for one function body.
struct FunctionCompiler<'g, 's, 'a> {
    session: &'s CompilationSession<'a>,
    options: CodegenOptions,
    table: &'g FunctionTable<'g>,
    pool: &'g mut StringPool<'a>,
    function: &'g Function,
    bindings: Bindings<'a>,
    cg: FunctionCodegen<'g, 'a>,
    uses_utoa: bool,
}

impl<'g, 's, 'a> FunctionCompiler<'g, 's, 'a> {
    fn compile(&mut self) -> CompileResult<()> {
        self.home_parameters()?;

        let function = self.function;
        let statements = &function.body.statements;
        for stmt in statements {
            log::trace!("{}: {}", function.name, stmt);
            self.compile_statement(stmt)?;
        }

        if let Some(idx) = statements.iter().position(Statement::is_return) {
            if idx + 1 < statements.len() {
                log::warn!(
                    "{}: unreachable statement after Return in '{}'",
                    statements[idx + 1].position(),
                    function.name
                );
            }
        }

        if statements.last().is_some_and(Statement::is_return) {
            return Ok(());
        }
        self.compile_fallthrough()
    }

    fn home_parameters(&mut self) -> CompileResult<()> {
        let function = self.function;
        for param in &function.params {
            let Some(kind) = ValueKind::from_type(param.ty) else {
                return Err(CompileError::VoidParameter {
                    name: param.name.clone(),
                    function: function.name.clone(),
                    position: function.position,
                });
            };
            let class = match kind {
                ValueKind::Integer => ParamClass::Integer,
                ValueKind::Text => ParamClass::Address,
            };

            self.annotate(|| format!("Parameter {} {}", param.ty, param.name));
            let storage = match self.cg.home_parameter(class)? {
                ParamHome::Register(reg) => Storage::Register { reg, kind },
                ParamHome::Stack(offset) => Storage::Stack { offset, kind },
            };
            let name = self.session.intern_str(&param.name);
            self.bindings.bind(name, storage);
        }
        Ok(())
    }

    /// The body ran off its end without a Return.
    fn compile_fallthrough(&mut self) -> CompileResult<()> {
        if self.function.is_entry {
            self.annotate(|| "Default exit".to_string());
            self.cg.asm().mov_reg_imm(ARG_REG, 0)?;
            return self.cg.emit_exit();
        }

        if self.function.return_type != TypeTag::Void {
            return Err(CompileError::MissingReturn {
                name: self.function.name.clone(),
                return_type: self.function.return_type,
                position: self.function.position,
            });
        }

        self.annotate(|| "Default return".to_string());
        self.cg.emit_epilogue()
    }

    fn annotate(&mut self, text: impl FnOnce() -> String) {
        if self.options.annotate {
            self.cg.comment(text());
        }
    }

    fn compile_statement(&mut self, stmt: &Statement) -> CompileResult<()> {
        match stmt {
            Statement::Assign {
                target,
                value,
                position,
            } => self.compile_assign(target, value, *position),
            Statement::Call(call) => match &call.callee {
                Callee::Builtin(Builtin::Print) => self.compile_print(call),
                Callee::Builtin(Builtin::Return) => self.compile_return(call),
                Callee::Function(_) => {
                    // The result, if any, is discarded
                    self.compile_user_call(call).map(|_| ())
                }
            },
        }
    }

    fn compile_assign(
        &mut self,
        target: &str,
        value: &Expression,
        position: Position,
    ) -> CompileResult<()> {
        let storage = match value {
            Expression::Call(call) => {
                self.annotate(|| format!("{target} = {call}"));
                let return_type = self.compile_user_call(call)?;
                let kind = ValueKind::from_type(return_type).ok_or_else(|| {
                    CompileError::VoidValue {
                        callee: call.callee.name().to_string(),
                        position,
                    }
                })?;
                Storage::ReturnValue { kind }
            }
            other => self.resolve(other, position)?,
        };

        let name = self.session.intern_str(target);
        self.bindings.bind(name, storage);
        Ok(())
    }

    /// Storage of an operand. A call operand is emitted here and yields the
    /// return-value register.
    fn resolve(&mut self, expr: &Expression, position: Position) -> CompileResult<Storage<'a>> {
        match expr {
            Expression::Text(text) => Ok(Storage::Constant {
                label: self.pool_label(text),
                value: ConstantValue::Text,
            }),
            Expression::Integer(value) => Ok(Storage::Constant {
                label: self.pool_label(&value.to_string()),
                value: ConstantValue::Integer(*value),
            }),
            Expression::Identifier(name) => {
                self.bindings
                    .lookup(name)
                    .ok_or_else(|| CompileError::UndefinedVariable {
                        name: name.clone(),
                        position,
                    })
            }
            Expression::Call(call) => {
                let return_type = self.compile_user_call(call)?;
                let kind = ValueKind::from_type(return_type).ok_or_else(|| {
                    CompileError::VoidValue {
                        callee: call.callee.name().to_string(),
                        position: call.position,
                    }
                })?;
                Ok(Storage::ReturnValue { kind })
            }
        }
    }

    /// Pool label of a literal. Literals are pooled up front in AST order, so
    /// this returns the existing label; a literal the walk missed is added.
    fn pool_label(&mut self, text: &str) -> &'a str {
        self.pool.intern(text, self.session)
    }

    /// Load the value of `storage` into `dst`.
    fn load(&mut self, dst: Register, storage: Storage<'a>) -> CompileResult<()> {
        match storage {
            Storage::Constant {
                label,
                value: ConstantValue::Text,
            } => self.cg.lea_label(dst, label),
            Storage::Constant {
                value: ConstantValue::Integer(value),
                ..
            } => self.cg.asm().mov_reg_imm(dst, value),
            Storage::Register { reg, .. } => {
                if reg == dst {
                    return Ok(());
                }
                self.cg.asm().mov_reg_reg(dst, reg)
            }
            Storage::Stack { offset, .. } => self.cg.emit_reload(dst, offset),
            Storage::ReturnValue { .. } => {
                if dst == RET_REG {
                    return Ok(());
                }
                self.cg.asm().mov_reg_reg(dst, RET_REG)
            }
        }
    }

    /// Move every binding that still refers to RAX into one new stack slot.
    fn spill_pending(&mut self) -> CompileResult<()> {
        let pending = self.bindings.pending_return_values();
        if pending.is_empty() {
            return Ok(());
        }

        let offset = self.cg.allocate_spill_slot();
        self.cg.emit_spill(RET_REG, offset)?;
        self.bindings.spill_return_values(offset);
        self.session.record_spill_generated();
        log::trace!("Spilled {:?} to [rbp{}]", pending, offset);
        Ok(())
    }

    fn check_arity(&self, call: &Call, expected: usize) -> CompileResult<()> {
        let found = call.args.len();
        if found > 1 {
            return Err(CompileError::TooManyArguments {
                callee: call.callee.name().to_string(),
                count: found,
                position: call.position,
            });
        }
        if found != expected {
            return Err(CompileError::ArityMismatch {
                callee: call.callee.name().to_string(),
                expected,
                found,
                position: call.position,
            });
        }
        Ok(())
    }

    fn check_kind(
        &self,
        context: impl FnOnce() -> String,
        expected: TypeTag,
        storage: Storage<'a>,
        position: Position,
    ) -> CompileResult<()> {
        let found = storage.kind().type_tag();
        if found != expected {
            return Err(CompileError::TypeMismatch {
                context: context(),
                expected,
                found,
                position,
            });
        }
        Ok(())
    }

    fn compile_print(&mut self, call: &Call) -> CompileResult<()> {
        self.check_arity(call, 1)?;
        self.annotate(|| call.to_string());
        self.spill_pending()?;

        let storage = self.resolve(&call.args[0], call.position)?;
        match storage {
            Storage::Constant {
                label,
                value: ConstantValue::Integer(_),
            } => {
                // The decimal text is already in the pool
                self.cg.lea_label(ARG_REG, label)?;
            }
            _ if storage.kind() == ValueKind::Integer => {
                self.load(ARG_REG, storage)?;
                self.cg.call(runtime::UTOA)?;
                self.cg.asm().mov_reg_reg(ARG_REG, RET_REG)?;
                self.uses_utoa = true;
            }
            _ => self.load(ARG_REG, storage)?,
        }

        self.cg.call(runtime::STRLEN)?;
        self.cg.emit_write_stdout()
    }

    fn compile_return(&mut self, call: &Call) -> CompileResult<()> {
        if self.function.is_entry {
            return self.compile_exit(call);
        }

        let return_type = self.function.return_type;
        let expected = usize::from(return_type != TypeTag::Void);
        self.check_arity(call, expected)?;
        self.annotate(|| call.to_string());

        if let Some(arg) = call.args.first() {
            let storage = self.resolve(arg, call.position)?;
            let name = &self.function.name;
            self.check_kind(
                || format!("return value of '{name}'"),
                return_type,
                storage,
                call.position,
            )?;
            self.load(RET_REG, storage)?;
        }

        self.cg.emit_epilogue()
    }

    /// `Return` in the entry function terminates the process.
    fn compile_exit(&mut self, call: &Call) -> CompileResult<()> {
        if call.args.len() > 1 {
            return Err(CompileError::TooManyArguments {
                callee: call.callee.name().to_string(),
                count: call.args.len(),
                position: call.position,
            });
        }
        self.annotate(|| call.to_string());

        match call.args.first() {
            Some(arg) => {
                let storage = self.resolve(arg, call.position)?;
                let name = &self.function.name;
                self.check_kind(
                    || format!("exit status of '{name}'"),
                    TypeTag::Integer,
                    storage,
                    call.position,
                )?;
                self.load(ARG_REG, storage)?;
            }
            None => self.cg.asm().mov_reg_imm(ARG_REG, 0)?,
        }

        self.cg.emit_exit()
    }

    /// Emit a call to a user function and return its declared return type.
    fn compile_user_call(&mut self, call: &Call) -> CompileResult<TypeTag> {
        let name = call.callee.name();
        let callee = match &call.callee {
            Callee::Function(_) => self.table.lookup(name),
            Callee::Builtin(_) => None,
        }
        .ok_or_else(|| CompileError::UnknownFunction {
            name: name.to_string(),
            position: call.position,
        })?;

        self.check_arity(call, callee.params.len())?;
        self.annotate(|| format!("Call {name}"));
        self.spill_pending()?;

        if let (Some(arg), Some(param)) = (call.args.first(), callee.params.first()) {
            let storage = self.resolve(arg, call.position)?;
            self.check_kind(
                || format!("argument '{}' of '{name}'", param.name),
                param.ty,
                storage,
                call.position,
            )?;
            self.load(ARG_REG, storage)?;
        }

        let symbol = self.session.intern_str(&function_symbol(name));
        self.cg.call(symbol)?;
        self.session.record_call_site(name);
        Ok(callee.return_type)
    }
}
