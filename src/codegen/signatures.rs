//! Program-level validation and the table of callable functions.

use hashbrown::HashMap;

use crate::core::{CompileError, CompileResult};
use crate::frontend::ast::{Function, Program, TypeTag};

/// Validated view of a program's declarations.
#[derive(Debug)]
pub struct FunctionTable<'p> {
    entry: &'p Function,
    functions: HashMap<&'p str, &'p Function>,
}

impl<'p> FunctionTable<'p> {
    /// Check declaration-level rules and index the ordinary functions.
    ///
    /// The entry count is checked before anything else, so a program with two
    /// entry functions always reports `DuplicateEntry`.
    pub fn build(program: &'p Program) -> CompileResult<Self> {
        let mut entries = program.entry_functions();
        let entry = entries.next().ok_or(CompileError::MissingEntry)?;
        if let Some(second) = entries.next() {
            return Err(CompileError::DuplicateEntry {
                name: second.name.clone(),
                first: entry.name.clone(),
                position: second.position,
            });
        }

        let mut functions = HashMap::new();
        for function in &program.functions {
            check_parameters(function)?;

            if !function.is_entry && functions.insert(function.name.as_str(), function).is_some() {
                return Err(CompileError::DuplicateFunction {
                    name: function.name.clone(),
                    position: function.position,
                });
            }
        }

        log::debug!(
            "Entry function '{}', {} ordinary function(s)",
            entry.name,
            functions.len()
        );
        Ok(Self { entry, functions })
    }

    pub fn entry(&self) -> &'p Function {
        self.entry
    }

    /// Resolve a callee by name. The entry function is not callable.
    pub fn lookup(&self, name: &str) -> Option<&'p Function> {
        self.functions.get(name).copied()
    }
}

fn check_parameters(function: &Function) -> CompileResult<()> {
    if function.is_entry && !function.params.is_empty() {
        return Err(CompileError::EntryParameters {
            name: function.name.clone(),
            position: function.position,
        });
    }

    if function.params.len() > 1 {
        return Err(CompileError::TooManyParameters {
            name: function.name.clone(),
            count: function.params.len(),
            position: function.position,
        });
    }

    if let Some(param) = function.params.iter().find(|p| p.ty == TypeTag::Void) {
        return Err(CompileError::VoidParameter {
            name: param.name.clone(),
            function: function.name.clone(),
            position: function.position,
        });
    }

    Ok(())
}
