//! Structural copies used when duplicating an engine.

use crate::{
    functions::FunctionTable,
    value::{Callable, Value, ValueKind, VariableStore},
};

/// Value-semantic clone: the copy shares no `Rc` node or boxed state
/// with the original but compares equal to it.
pub trait DeepCopy {
    fn deep_copy(&self) -> Self;
}

impl DeepCopy for Value {
    fn deep_copy(&self) -> Self {
        let kind = match self.kind() {
            ValueKind::Undefined => ValueKind::Undefined,
            ValueKind::Null => ValueKind::Null,
            ValueKind::Bool(b) => ValueKind::Bool(*b),
            ValueKind::Number(n) => ValueKind::Number(*n),
            ValueKind::String(s) => ValueKind::String(s.clone()),
            ValueKind::Array(values) => {
                ValueKind::Array(values.iter().map(DeepCopy::deep_copy).collect())
            }
            ValueKind::Object(entries) => ValueKind::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.deep_copy()))
                    .collect(),
            ),
            ValueKind::Function(callable) => ValueKind::Function(match callable {
                Callable::Method { receiver, name } => Callable::Method {
                    receiver: receiver.deep_copy(),
                    name: name.clone(),
                },
                other => other.clone(),
            }),
        };
        Value::new(kind)
    }
}

impl DeepCopy for VariableStore {
    fn deep_copy(&self) -> Self {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.deep_copy()))
            .collect()
    }
}

impl DeepCopy for FunctionTable {
    fn deep_copy(&self) -> Self {
        FunctionTable::from_entries(
            self.iter()
                .map(|(name, function)| (name.clone(), function.clone_box()))
                .collect(),
        )
    }
}
