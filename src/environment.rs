use std::cell::RefCell;

use indexmap::IndexMap;

use crate::{
    ast::DeclKind,
    diagnostics::{Diagnostic, Result, ScriptError, SourceSpan},
    functions::FunctionTable,
    namespace::TypeNamespace,
    value::{Callable, Value, VariableStore},
};

/// Name under which scripts reach the boolean-conversion primitive.
pub const BOOLEAN_WORD: &str = "Boolean";

/// Identifiers that can never name a variable or function, and can never be
/// assigned or deleted.
pub const RESERVED_WORDS: &[&str] = &[BOOLEAN_WORD];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}

/// Scope seen by one execution.
///
/// Block-scoped locals are searched first and vanish when the execution
/// ends. Every other identifier goes through the resolver methods
/// (`has`, `read`, `write`, `delete`), which guard the engine's variable
/// store.
pub struct Environment<'a> {
    variables: &'a mut VariableStore,
    functions: &'a RefCell<FunctionTable>,
    namespace: &'a TypeNamespace,
    scopes: Vec<IndexMap<String, Binding>>,
}

impl<'a> Environment<'a> {
    pub fn new(
        variables: &'a mut VariableStore,
        functions: &'a RefCell<FunctionTable>,
        namespace: &'a TypeNamespace,
    ) -> Self {
        Self {
            variables,
            functions,
            namespace,
            scopes: vec![IndexMap::new()],
        }
    }

    /// Existence check. Always true: unknown names are not an error, they
    /// read as `undefined`.
    pub fn has(&self, _name: &str) -> bool {
        true
    }

    pub fn read(&self, name: &str) -> Value {
        if is_reserved(name) {
            return Value::function(Callable::Boolean);
        }
        if self.is_function(name) {
            return Value::function(Callable::Host(name.to_string()));
        }
        self.variables
            .get(name)
            .cloned()
            .unwrap_or_else(Value::undefined)
    }

    pub fn write(&mut self, name: &str, value: Value) -> Result<()> {
        if is_reserved(name) {
            return Err(ScriptError::Assignment(format!(
                "Reserved word \"{name}\" cannot be assigned."
            )));
        }
        if self.is_function(name) {
            return Err(ScriptError::Assignment(format!(
                "Cannot set a value to the property \"{name}\". It is already in use as a function."
            )));
        }
        let tag = value.type_tag();
        self.namespace.check(name, tag)?;
        self.variables.insert(name, value);
        self.namespace.record_or_check(name, tag)
    }

    /// Removes `name` from the store; absent names are fine.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if is_reserved(name) {
            return Err(ScriptError::Deletion(format!(
                "Reserved word \"{name}\" cannot be deleted."
            )));
        }
        self.variables.remove(name);
        Ok(())
    }

    pub fn call_function(&self, name: &str, args: &[Value]) -> Result<Value> {
        let mut functions = self
            .functions
            .try_borrow_mut()
            .map_err(|_| ScriptError::runtime("function table is already in use"))?;
        functions.call(name, args).map_err(|err| match err {
            ScriptError::Runtime(diag) => {
                ScriptError::Runtime(diag.with_note(format!("raised by host function `{name}`")))
            }
            other => other,
        })
    }

    fn is_function(&self, name: &str) -> bool {
        self.functions
            .try_borrow()
            .map(|functions| functions.contains(name))
            .unwrap_or(false)
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declares a local. `var` lives in the outermost scope of the
    /// execution; `let` and `const` in the innermost block.
    pub fn declare(
        &mut self,
        kind: DeclKind,
        name: &str,
        value: Option<Value>,
        span: SourceSpan,
    ) -> Result<()> {
        if is_reserved(name) {
            return Err(ScriptError::Assignment(format!(
                "Reserved word \"{name}\" cannot be used as a variable."
            )));
        }
        let scope = match kind {
            DeclKind::Var => &mut self.scopes[0],
            DeclKind::Let | DeclKind::Const => self
                .scopes
                .last_mut()
                .ok_or_else(|| ScriptError::runtime("no active scope"))?,
        };
        if let Some(binding) = scope.get_mut(name) {
            if kind == DeclKind::Var && binding.mutable {
                if let Some(value) = value {
                    binding.value = value;
                }
                return Ok(());
            }
            return Err(ScriptError::Runtime(
                Diagnostic::runtime(format!("Identifier '{name}' has already been declared"))
                    .with_span(span),
            ));
        }
        scope.insert(
            name.to_string(),
            Binding {
                value: value.unwrap_or_else(Value::undefined),
                mutable: kind != DeclKind::Const,
            },
        );
        Ok(())
    }

    fn local(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.local(name).is_some()
    }

    /// Resolves an identifier: locals first, then the resolver.
    pub fn lookup(&self, name: &str, span: SourceSpan) -> Result<Value> {
        if let Some(binding) = self.local(name) {
            return Ok(binding.value.clone());
        }
        if !self.has(name) {
            return Err(ScriptError::Runtime(
                Diagnostic::runtime(format!("{name} is not defined")).with_span(span),
            ));
        }
        Ok(self.read(name))
    }

    /// Assigns to a local if one is visible, otherwise writes through the
    /// resolver.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(binding) = scope.get_mut(name) {
                if !binding.mutable {
                    return Err(ScriptError::Assignment(
                        "Assignment to constant variable.".into(),
                    ));
                }
                binding.value = value;
                return Ok(());
            }
        }
        self.write(name, value)
    }

    /// `delete name`. Locals cannot be deleted and report `false`.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        if self.is_local(name) {
            return Ok(false);
        }
        self.delete(name)?;
        Ok(true)
    }
}
