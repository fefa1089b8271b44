//! The embedding surface: a script engine bound to one variable store, a
//! host function table and a (possibly shared) type namespace.
//!
//! Every entry point parses its input fresh and runs it to completion. A
//! runaway script, such as `while (true) {}`, blocks the calling thread:
//! there is no step or time budget.

use std::{cell::Ref, rc::Rc};

use tracing::debug;

use crate::{
    diagnostics::{Result, ScriptError},
    environment::{is_reserved, Environment},
    functions::{FunctionTable, FunctionTableRef},
    namespace::TypeNamespace,
    parser::{parse_expression, parse_program, parse_template},
    runtime::Interpreter,
    snapshot::DeepCopy,
    value::{Value, VariableStore},
};

pub struct ScriptEngine {
    functions: FunctionTableRef,
    variables: VariableStore,
    namespace: TypeNamespace,
}

impl ScriptEngine {
    /// Builds an engine with a fresh type namespace.
    pub fn new(functions: FunctionTableRef, variables: VariableStore) -> Result<Self> {
        Self::with_namespace(functions, variables, TypeNamespace::new())
    }

    /// Builds an engine that enforces variable types through `namespace`,
    /// which may be shared with other engines.
    pub fn with_namespace(
        functions: FunctionTableRef,
        variables: VariableStore,
        namespace: TypeNamespace,
    ) -> Result<Self> {
        validate(&functions.borrow(), &variables)?;
        Ok(Self {
            functions,
            variables,
            namespace,
        })
    }

    /// Runs `code` as a program. Locals declared by the program are dropped
    /// when it finishes.
    pub fn execute(&mut self, code: &str) -> Result<()> {
        debug!(code, "execute");
        let result = parse_program(code)
            .map_err(ScriptError::from)
            .and_then(|program| self.interpreter().run(&program));
        finish("execute", result)
    }

    /// Evaluates a single expression and returns its value.
    pub fn evaluate(&mut self, expression: &str) -> Result<Value> {
        debug!(expression, "evaluate");
        let result = parse_expression(expression)
            .map_err(ScriptError::from)
            .and_then(|expr| self.interpreter().evaluate(&expr));
        finish("evaluate", result)
    }

    pub fn boolean(&mut self, expression: &str) -> Result<bool> {
        self.evaluate(expression).map(|value| value.is_truthy())
    }

    /// Same as [`ScriptEngine::boolean`].
    pub fn condition_check(&mut self, expression: &str) -> Result<bool> {
        self.boolean(expression)
    }

    /// Evaluates and converts with `Number()` rules. Non-numeric results are
    /// NaN, not an error.
    pub fn number(&mut self, expression: &str) -> Result<f64> {
        self.evaluate(expression).map(|value| value.to_number())
    }

    /// Renders `template` as the body of a template literal.
    pub fn string(&mut self, template: &str) -> Result<String> {
        debug!(template, "string");
        let result = parse_template(template)
            .map_err(ScriptError::from)
            .and_then(|parts| self.interpreter().render(&parts));
        finish("string", result)
    }

    /// Forks the engine. Store and function table are deep copies; the
    /// namespace handle is shared, so type agreement still spans both.
    pub fn duplicate(&self) -> ScriptEngine {
        debug!(
            variables = self.variables.len(),
            functions = self.functions.borrow().len(),
            "duplicate"
        );
        ScriptEngine {
            functions: self.functions.borrow().deep_copy().into_shared(),
            variables: self.variables.deep_copy(),
            namespace: self.namespace.clone(),
        }
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn functions(&self) -> Ref<'_, FunctionTable> {
        self.functions.borrow()
    }

    /// The shared handle, for building sibling engines.
    pub fn function_table(&self) -> FunctionTableRef {
        Rc::clone(&self.functions)
    }

    pub fn namespace(&self) -> &TypeNamespace {
        &self.namespace
    }

    fn interpreter(&mut self) -> Interpreter<'_> {
        Interpreter::new(Environment::new(
            &mut self.variables,
            &self.functions,
            &self.namespace,
        ))
    }
}

fn validate(functions: &FunctionTable, variables: &VariableStore) -> Result<()> {
    if let Some(name) = functions.names().find(|name| is_reserved(name)) {
        return Err(ScriptError::Configuration(format!(
            "Reserved word \"{name}\" cannot be used as a function."
        )));
    }
    if let Some(name) = variables.names().find(|name| is_reserved(name)) {
        return Err(ScriptError::Configuration(format!(
            "Reserved word \"{name}\" cannot be used as a variable."
        )));
    }
    if let Some(name) = variables.names().find(|name| functions.contains(name)) {
        return Err(ScriptError::Configuration(format!(
            "Cannot use \"{name}\" as a variable. It is already in use as a function."
        )));
    }
    Ok(())
}

fn finish<T>(entry: &'static str, result: Result<T>) -> Result<T> {
    result.map_err(|err| {
        let err = err.strip_generic_prefix();
        debug!(entry, kind = ?err.kind(), error = %err, "script failed");
        err
    })
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("variables", &self.variables)
            .field("functions", &*self.functions.borrow())
            .field("namespace", &self.namespace)
            .finish()
    }
}
