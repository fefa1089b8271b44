use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;
use tracing::trace;

use crate::{
    diagnostics::{Result, ScriptError},
    value::TypeTag,
};

/// Append-only map from variable name to the first type assigned to it.
///
/// Cloning the handle shares the table: every engine duplicated from the
/// same origin holds the same `TypeNamespace` and therefore enforces one
/// type per variable name across all forks. Not thread-safe; embedders
/// running engines on several threads must synchronise access themselves.
#[derive(Clone, Default)]
pub struct TypeNamespace {
    types: Rc<RefCell<IndexMap<String, TypeTag>>>,
}

impl TypeNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<TypeTag> {
        self.types.borrow().get(name).copied()
    }

    /// Fails with an assignment error if `name` was already recorded with a
    /// different type.
    pub fn check(&self, name: &str, tag: TypeTag) -> Result<()> {
        match self.get(name) {
            Some(existing) if existing != tag => Err(ScriptError::Assignment(format!(
                "Type mismatch during variable set. The type of \"{name}\" is \"{existing}\", and it is tried to set to \"{tag}\"."
            ))),
            _ => Ok(()),
        }
    }

    /// Records `tag` for `name` if absent; otherwise checks it agrees.
    pub fn record_or_check(&self, name: &str, tag: TypeTag) -> Result<()> {
        self.check(name, tag)?;
        let mut types = self.types.borrow_mut();
        if !types.contains_key(name) {
            trace!(name, %tag, "recorded variable type");
            types.insert(name.to_string(), tag);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.types.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.borrow().is_empty()
    }

    /// Snapshot of the recorded types in first-assignment order.
    pub fn entries(&self) -> Vec<(String, TypeTag)> {
        self.types
            .borrow()
            .iter()
            .map(|(name, tag)| (name.clone(), *tag))
            .collect()
    }

    /// Whether both handles point at the same table.
    pub fn shares_with(&self, other: &TypeNamespace) -> bool {
        Rc::ptr_eq(&self.types, &other.types)
    }
}

impl std::fmt::Debug for TypeNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.types.borrow().iter().map(|(k, v)| (k, v.as_str())))
            .finish()
    }
}
