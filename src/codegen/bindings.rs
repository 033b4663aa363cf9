//! Per-function binding table: variable name to storage descriptor.
//!
//! The table lives in the session arena (`hashbrown` with a `bumpalo`
//! allocator) and is dropped with the function's code generator.

use bumpalo::Bump;
use hashbrown::{DefaultHashBuilder, HashMap};
use iced_x86::Register;

use crate::frontend::ast::TypeTag;

/// Runtime class of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Text,
}

impl ValueKind {
    /// `None` for `Void`, which has no values.
    pub fn from_type(ty: TypeTag) -> Option<Self> {
        match ty {
            TypeTag::Integer => Some(ValueKind::Integer),
            TypeTag::Text => Some(ValueKind::Text),
            TypeTag::Void => None,
        }
    }

    pub fn type_tag(self) -> TypeTag {
        match self {
            ValueKind::Integer => TypeTag::Integer,
            ValueKind::Text => TypeTag::Text,
        }
    }
}

/// Compile-time value of a pooled constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantValue {
    Text,
    /// Integers keep their value so they can be used as immediates.
    Integer(i64),
}

/// Where the value of a binding can be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage<'a> {
    Constant {
        label: &'a str,
        value: ConstantValue,
    },
    Register {
        reg: Register,
        kind: ValueKind,
    },
    /// RBP-relative slot.
    Stack {
        offset: i32,
        kind: ValueKind,
    },
    /// The return-value register of the most recent call.
    ReturnValue {
        kind: ValueKind,
    },
}

impl Storage<'_> {
    pub fn kind(&self) -> ValueKind {
        match *self {
            Storage::Constant {
                value: ConstantValue::Text,
                ..
            } => ValueKind::Text,
            Storage::Constant {
                value: ConstantValue::Integer(_),
                ..
            } => ValueKind::Integer,
            Storage::Register { kind, .. }
            | Storage::Stack { kind, .. }
            | Storage::ReturnValue { kind } => kind,
        }
    }
}

pub struct Bindings<'a> {
    table: HashMap<&'a str, Storage<'a>, DefaultHashBuilder, &'a Bump>,
}

impl<'a> Bindings<'a> {
    pub fn new_in(arena: &'a Bump) -> Self {
        Self {
            table: HashMap::new_in(arena),
        }
    }

    /// Bind or rebind `name`.
    pub fn bind(&mut self, name: &'a str, storage: Storage<'a>) {
        self.table.insert(name, storage);
    }

    pub fn lookup(&self, name: &str) -> Option<Storage<'a>> {
        self.table.get(name).copied()
    }

    /// Names still bound to the return-value register, sorted.
    pub fn pending_return_values(&self) -> Vec<&'a str> {
        let mut names: Vec<_> = self
            .table
            .iter()
            .filter(|(_, storage)| matches!(storage, Storage::ReturnValue { .. }))
            .map(|(name, _)| *name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Move every return-value binding to the stack slot at `offset`.
    pub fn spill_return_values(&mut self, offset: i32) -> usize {
        let mut spilled = 0;
        for storage in self.table.values_mut() {
            if let Storage::ReturnValue { kind } = *storage {
                *storage = Storage::Stack { offset, kind };
                spilled += 1;
            }
        }
        spilled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_rebind() {
        let arena = Bump::new();
        let mut bindings = Bindings::new_in(&arena);
        assert_eq!(bindings.lookup("msg"), None);

        let text = Storage::Constant {
            label: "str_0",
            value: ConstantValue::Text,
        };
        bindings.bind("msg", text);
        assert_eq!(bindings.lookup("msg"), Some(text));
        assert_eq!(bindings.lookup("msg").map(|s| s.kind()), Some(ValueKind::Text));

        bindings.bind(
            "msg",
            Storage::Constant {
                label: "str_1",
                value: ConstantValue::Integer(7),
            },
        );
        assert_eq!(bindings.lookup("msg").map(|s| s.kind()), Some(ValueKind::Integer));
        assert_eq!(bindings.lookup("other"), None);
    }

    #[test]
    fn test_spill_return_values() {
        let arena = Bump::new();
        let mut bindings = Bindings::new_in(&arena);
        let pending = Storage::ReturnValue {
            kind: ValueKind::Text,
        };
        bindings.bind("b", pending);
        bindings.bind("a", pending);
        bindings.bind(
            "n",
            Storage::Register {
                reg: Register::R15,
                kind: ValueKind::Integer,
            },
        );

        assert_eq!(bindings.pending_return_values(), vec!["a", "b"]);
        assert_eq!(bindings.spill_return_values(-16), 2);
        assert!(bindings.pending_return_values().is_empty());
        assert_eq!(
            bindings.lookup("a"),
            Some(Storage::Stack {
                offset: -16,
                kind: ValueKind::Text
            })
        );
        assert!(matches!(bindings.lookup("n"), Some(Storage::Register { .. })));
    }

    #[test]
    fn test_value_kind_from_type() {
        assert_eq!(ValueKind::from_type(TypeTag::Integer), Some(ValueKind::Integer));
        assert_eq!(ValueKind::from_type(TypeTag::Text), Some(ValueKind::Text));
        assert_eq!(ValueKind::from_type(TypeTag::Void), None);
        assert_eq!(ValueKind::Text.type_tag(), TypeTag::Text);
    }
}
