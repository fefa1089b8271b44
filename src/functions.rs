use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    diagnostics::{Diagnostic, Result, ScriptError},
    value::Value,
};

/// A callable exposed to scripts through the function table.
///
/// `clone_box` must produce an independent copy: duplicated engines call
/// it so that state owned by the function is not shared with the fork.
pub trait HostFunction {
    fn call(&mut self, args: &[Value]) -> Result<Value>;

    fn clone_box(&self) -> Box<dyn HostFunction>;
}

impl<F> HostFunction for F
where
    F: FnMut(&[Value]) -> Result<Value> + Clone + 'static,
{
    fn call(&mut self, args: &[Value]) -> Result<Value> {
        self(args)
    }

    fn clone_box(&self) -> Box<dyn HostFunction> {
        Box::new(self.clone())
    }
}

/// Plain function pointer with an arity check.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub callback: fn(&[Value]) -> Result<Value>,
}

/// Arity value accepting any number of arguments.
pub const VARIADIC: usize = usize::MAX;

impl NativeFunction {
    pub fn new(name: &'static str, arity: usize, callback: fn(&[Value]) -> Result<Value>) -> Self {
        Self {
            name,
            arity,
            callback,
        }
    }
}

impl HostFunction for NativeFunction {
    fn call(&mut self, args: &[Value]) -> Result<Value> {
        if self.arity != VARIADIC && args.len() != self.arity {
            return Err(ScriptError::Runtime(Diagnostic::runtime(format!(
                "function `{}` expected {} arguments but received {}",
                self.name,
                self.arity,
                args.len()
            ))));
        }
        (self.callback)(args)
    }

    fn clone_box(&self) -> Box<dyn HostFunction> {
        Box::new(self.clone())
    }
}

/// Host-supplied callables, looked up by name.
#[derive(Default)]
pub struct FunctionTable {
    entries: IndexMap<String, Box<dyn HostFunction>>,
}

/// Handle shared between the embedding caller and an engine.
pub type FunctionTableRef = Rc<RefCell<FunctionTable>>;

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, function: impl HostFunction + 'static) {
        self.entries.insert(name.into(), Box::new(function));
    }

    pub fn with(mut self, name: impl Into<String>, function: impl HostFunction + 'static) -> Self {
        self.insert(name, function);
        self
    }

    pub fn into_shared(self) -> FunctionTableRef {
        Rc::new(RefCell::new(self))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invokes the named member. Missing names are a runtime error.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match self.entries.get_mut(name) {
            Some(function) => function.call(args),
            None => Err(ScriptError::runtime(format!("{name} is not a function"))),
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Box<dyn HostFunction>)> {
        self.entries.iter()
    }

    pub(crate) fn from_entries(entries: IndexMap<String, Box<dyn HostFunction>>) -> Self {
        Self { entries }
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
