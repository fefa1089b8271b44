use indexmap::IndexMap;

use crate::{
    ast::{
        BinaryOp, Expr, ExprKind, Literal, LogicalOp, Program, Stmt, StmtKind, TemplatePart,
        UnaryOp,
    },
    diagnostics::{Diagnostic, Result, ScriptError, SourceSpan},
    environment::Environment,
    stdlib,
    value::{format_number, Callable, Value, ValueKind},
};

/// Tree-walking evaluator for one execution.
pub struct Interpreter<'a> {
    env: Environment<'a>,
}

enum FlowControl {
    Next,
    Break,
    Continue,
}

fn runtime_error(message: impl Into<String>, span: SourceSpan) -> ScriptError {
    ScriptError::Runtime(Diagnostic::runtime(message).with_span(span))
}

impl<'a> Interpreter<'a> {
    pub fn new(env: Environment<'a>) -> Self {
        Self { env }
    }

    pub fn run(&mut self, program: &Program) -> Result<()> {
        match self.execute_sequence(&program.items)? {
            FlowControl::Next => Ok(()),
            FlowControl::Break => Err(ScriptError::runtime("Illegal break statement")),
            FlowControl::Continue => Err(ScriptError::runtime(
                "Illegal continue statement: no surrounding iteration statement",
            )),
        }
    }

    /// Renders template parts, stringifying each interpolated value.
    pub fn render(&mut self, parts: &[TemplatePart]) -> Result<String> {
        let mut out = String::new();
        for part in parts {
            match part {
                TemplatePart::Text(text) => out.push_str(text),
                TemplatePart::Expr(expr) => out.push_str(&self.evaluate(expr)?.to_string()),
            }
        }
        Ok(out)
    }

    fn execute_sequence(&mut self, statements: &[Stmt]) -> Result<FlowControl> {
        for stmt in statements {
            match self.execute_statement(stmt)? {
                FlowControl::Next => {}
                other => return Ok(other),
            }
        }
        Ok(FlowControl::Next)
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<FlowControl> {
        self.env.push_scope();
        let result = self.execute_sequence(statements);
        self.env.pop_scope();
        result
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<FlowControl> {
        match &stmt.kind {
            StmtKind::Declaration { kind, declarators } => {
                for declarator in declarators {
                    let value = match &declarator.initializer {
                        Some(expr) => Some(self.evaluate(expr)?),
                        None => None,
                    };
                    self.env
                        .declare(*kind, &declarator.name, value, declarator.span)?;
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Expr(expr) => {
                self.evaluate(expr)?;
                Ok(FlowControl::Next)
            }
            StmtKind::Block(statements) => self.execute_block(statements),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_statement(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute_statement(branch)
                } else {
                    Ok(FlowControl::Next)
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute_statement(body)? {
                        FlowControl::Next | FlowControl::Continue => {}
                        FlowControl::Break => break,
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Break => Ok(FlowControl::Break),
            StmtKind::Continue => Ok(FlowControl::Continue),
            StmtKind::Empty => Ok(FlowControl::Next),
        }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal(lit)),
            ExprKind::Identifier(name) => self.env.lookup(name, expr.span),
            ExprKind::Template(parts) => Ok(Value::string(self.render(parts)?)),
            ExprKind::Binary { op, left, right } => {
                let left_value = self.evaluate(left)?;
                let right_value = self.evaluate(right)?;
                Ok(binary(*op, &left_value, &right_value))
            }
            ExprKind::Logical { op, left, right } => {
                let left_value = self.evaluate(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left_value.is_truthy(),
                    LogicalOp::Or => left_value.is_truthy(),
                    LogicalOp::Nullish => !left_value.is_nullish(),
                };
                if short_circuit {
                    Ok(left_value)
                } else {
                    self.evaluate(right)
                }
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.evaluate(operand)?;
                Ok(match op {
                    UnaryOp::Negate => Value::number(-value.to_number()),
                    UnaryOp::Plus => Value::number(value.to_number()),
                    UnaryOp::Not => Value::bool(!value.is_truthy()),
                    UnaryOp::TypeOf => Value::string(value.type_tag().as_str()),
                })
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test)?.is_truthy() {
                    self.evaluate(consequent)
                } else {
                    self.evaluate(alternate)
                }
            }
            ExprKind::Assign { op, target, value } => {
                let place = self.resolve_place(target)?;
                let new_value = match op {
                    None => self.evaluate(value)?,
                    Some(op) => {
                        let current = self.read_place(&place)?;
                        let rhs = self.evaluate(value)?;
                        binary(*op, &current, &rhs)
                    }
                };
                self.write_place(&place, new_value.clone())?;
                Ok(new_value)
            }
            ExprKind::Update {
                increment,
                prefix,
                target,
            } => {
                let place = self.resolve_place(target)?;
                let old = self.read_place(&place)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.write_place(&place, Value::number(new))?;
                Ok(Value::number(if *prefix { new } else { old }))
            }
            ExprKind::Delete(target) => self.delete(target),
            ExprKind::Call { callee, args } => {
                let callee_value = self.evaluate(callee)?;
                let mut eval_args = Vec::with_capacity(args.len());
                for arg in args {
                    eval_args.push(self.evaluate(arg)?);
                }
                self.call(&callee_value, &eval_args, callee, expr.span)
            }
            ExprKind::ArrayLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(Value::array(values))
            }
            ExprKind::ObjectLiteral(entries) => {
                let mut map = IndexMap::new();
                for (key, value_expr) in entries {
                    let value = self.evaluate(value_expr)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::object(map))
            }
            ExprKind::Group(inner) => self.evaluate(inner),
            ExprKind::Index { target, index } => {
                let target_value = self.evaluate(target)?;
                let key = property_key(&self.evaluate(index)?);
                member(&target_value, &key, expr.span)
            }
            ExprKind::Field { target, field } => {
                let target_value = self.evaluate(target)?;
                member(&target_value, field, expr.span)
            }
        }
    }

    fn call(
        &mut self,
        callee: &Value,
        args: &[Value],
        callee_expr: &Expr,
        span: SourceSpan,
    ) -> Result<Value> {
        let ValueKind::Function(callable) = callee.kind() else {
            return Err(runtime_error(
                format!("{} is not a function", describe(callee_expr)),
                span,
            ));
        };
        let result = match callable {
            Callable::Boolean => Ok(Value::bool(
                args.first().map(Value::is_truthy).unwrap_or(false),
            )),
            Callable::Host(name) => self.env.call_function(name, args),
            Callable::Method { receiver, name } => stdlib::call_method(receiver, name, args),
        };
        result.map_err(|err| match err {
            ScriptError::Runtime(diag) => ScriptError::Runtime(diag.or_span(span)),
            other => other,
        })
    }

    /// Evaluates the keys along `target` once, left to right.
    fn resolve_place(&mut self, target: &Expr) -> Result<Place> {
        match &target.kind {
            ExprKind::Identifier(name) => Ok(Place {
                root: PlaceRoot::Binding {
                    name: name.clone(),
                    span: target.span,
                },
                path: Vec::new(),
            }),
            ExprKind::Group(inner) => self.resolve_place(inner),
            ExprKind::Field {
                target: owner,
                field,
            } => {
                let mut place = self.resolve_place(owner)?;
                place.path.push((field.clone(), target.span));
                Ok(place)
            }
            ExprKind::Index {
                target: owner,
                index,
            } => {
                let mut place = self.resolve_place(owner)?;
                let key = property_key(&self.evaluate(index)?);
                place.path.push((key, target.span));
                Ok(place)
            }
            _ => Ok(Place {
                root: PlaceRoot::Temporary(self.evaluate(target)?),
                path: Vec::new(),
            }),
        }
    }

    fn root_value(&self, root: &PlaceRoot) -> Result<Value> {
        match root {
            PlaceRoot::Binding { name, span } => self.env.lookup(name, *span),
            PlaceRoot::Temporary(value) => Ok(value.clone()),
        }
    }

    fn read_place(&self, place: &Place) -> Result<Value> {
        let mut current = self.root_value(&place.root)?;
        for (key, span) in &place.path {
            current = member(&current, key, *span)?;
        }
        Ok(current)
    }

    /// Rebuilds every container along the path with the new value and
    /// writes the outermost one back to the root binding.
    fn write_place(&mut self, place: &Place, value: Value) -> Result<()> {
        let Some(parents) = place.path.len().checked_sub(1) else {
            return self.write_root(&place.root, value);
        };
        let mut current = self.root_value(&place.root)?;
        let mut owners = Vec::with_capacity(place.path.len());
        for (key, span) in &place.path[..parents] {
            let next = member(&current, key, *span)?;
            owners.push(std::mem::replace(&mut current, next));
        }
        owners.push(current);

        let mut updated = value;
        for (owner, (key, span)) in owners.iter().zip(&place.path).rev() {
            match with_member(owner, key, updated, *span)? {
                Some(rebuilt) => updated = rebuilt,
                // Primitive owner: the write is silently dropped.
                None => return Ok(()),
            }
        }
        self.write_root(&place.root, updated)
    }

    fn write_root(&mut self, root: &PlaceRoot, value: Value) -> Result<()> {
        match root {
            PlaceRoot::Binding { name, .. } => self.env.assign(name, value),
            // Temporaries such as call results: nothing to write back to.
            PlaceRoot::Temporary(_) => Ok(()),
        }
    }

    fn delete(&mut self, target: &Expr) -> Result<Value> {
        match &target.kind {
            ExprKind::Identifier(name) => Ok(Value::bool(self.env.remove(name)?)),
            ExprKind::Group(inner) => self.delete(inner),
            ExprKind::Field { .. } | ExprKind::Index { .. } => {
                let mut place = self.resolve_place(target)?;
                if let Some((key, span)) = place.path.pop() {
                    let owner = self.read_place(&place)?;
                    if let Some(updated) = without_member(&owner, &key, span)? {
                        self.write_place(&place, updated)?;
                    }
                }
                Ok(Value::bool(true))
            }
            _ => {
                self.evaluate(target)?;
                Ok(Value::bool(true))
            }
        }
    }
}

/// An assignment target with its member keys already evaluated.
struct Place {
    root: PlaceRoot,
    path: Vec<(String, SourceSpan)>,
}

enum PlaceRoot {
    Binding { name: String, span: SourceSpan },
    Temporary(Value),
}

/// Highest index an array may hold; lengths stop at 2^32 - 1.
const MAX_ARRAY_INDEX: usize = 4_294_967_294;

/// How far past its end a single write may grow an array.
const MAX_ARRAY_GROWTH: usize = 1 << 16;

/// `owner` rebuilt with `key` set, or `None` when the owner is a primitive
/// that ignores property writes.
fn with_member(
    owner: &Value,
    key: &str,
    value: Value,
    span: SourceSpan,
) -> Result<Option<Value>> {
    let updated = match owner.kind() {
        ValueKind::Undefined | ValueKind::Null => {
            return Err(runtime_error(
                format!("Cannot set properties of {owner} (setting '{key}')"),
                span,
            ));
        }
        ValueKind::Object(map) => {
            let mut new_map = map.clone();
            new_map.insert(key.to_string(), value);
            Value::object(new_map)
        }
        ValueKind::Array(elements) => {
            let Some(idx) = array_index(key) else {
                return Err(runtime_error(format!("invalid array index '{key}'"), span));
            };
            if idx > MAX_ARRAY_INDEX {
                return Err(runtime_error("Invalid array length", span));
            }
            if idx > elements.len() + MAX_ARRAY_GROWTH {
                return Err(runtime_error(
                    format!(
                        "index {idx} is too far past the end of an array of length {}",
                        elements.len()
                    ),
                    span,
                ));
            }
            let mut new_elements = elements.clone();
            if idx >= new_elements.len() {
                new_elements.resize(idx + 1, Value::undefined());
            }
            new_elements[idx] = value;
            Value::array(new_elements)
        }
        _ => return Ok(None),
    };
    Ok(Some(updated))
}

/// `owner` rebuilt without `key`, or `None` when nothing changes.
fn without_member(owner: &Value, key: &str, span: SourceSpan) -> Result<Option<Value>> {
    let updated = match owner.kind() {
        ValueKind::Undefined | ValueKind::Null => {
            return Err(runtime_error(
                "Cannot convert undefined or null to object",
                span,
            ));
        }
        ValueKind::Object(map) if map.contains_key(key) => {
            let mut new_map = map.clone();
            new_map.shift_remove(key);
            Value::object(new_map)
        }
        ValueKind::Array(elements) => match array_index(key) {
            Some(idx) if idx < elements.len() => {
                let mut new_elements = elements.clone();
                new_elements[idx] = Value::undefined();
                Value::array(new_elements)
            }
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };
    Ok(Some(updated))
}

fn literal(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::number(*n),
        Literal::String(s) => Value::string(s.clone()),
        Literal::Bool(b) => Value::bool(*b),
        Literal::Null => Value::null(),
    }
}

/// Arrays, objects and functions take part in `+` and comparisons through
/// their string form.
fn to_primitive(value: &Value) -> Value {
    match value.kind() {
        ValueKind::Array(_) | ValueKind::Object(_) | ValueKind::Function(_) => {
            Value::string(value.to_string())
        }
        _ => value.clone(),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    use BinaryOp::*;
    match op {
        Add => {
            let (left, right) = (to_primitive(left), to_primitive(right));
            if left.as_str().is_some() || right.as_str().is_some() {
                Value::string(format!("{left}{right}"))
            } else {
                Value::number(left.to_number() + right.to_number())
            }
        }
        Sub => Value::number(left.to_number() - right.to_number()),
        Mul => Value::number(left.to_number() * right.to_number()),
        Div => Value::number(left.to_number() / right.to_number()),
        Mod => Value::number(left.to_number() % right.to_number()),
        Equal => Value::bool(left.loose_equals(right)),
        NotEqual => Value::bool(!left.loose_equals(right)),
        StrictEqual => Value::bool(left.strict_equals(right)),
        StrictNotEqual => Value::bool(!left.strict_equals(right)),
        Less => Value::bool(compare(left, right, |o| o.is_lt())),
        LessEqual => Value::bool(compare(left, right, |o| o.is_le())),
        Greater => Value::bool(compare(left, right, |o| o.is_gt())),
        GreaterEqual => Value::bool(compare(left, right, |o| o.is_ge())),
    }
}

fn compare<F>(left: &Value, right: &Value, accept: F) -> bool
where
    F: Fn(std::cmp::Ordering) -> bool,
{
    let (left, right) = (to_primitive(left), to_primitive(right));
    let ordering = match (left.as_str(), right.as_str()) {
        (Some(a), Some(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    ordering.map(accept).unwrap_or(false)
}

fn property_key(value: &Value) -> String {
    match value.kind() {
        ValueKind::Number(n) => format_number(*n),
        _ => value.to_string(),
    }
}

fn array_index(key: &str) -> Option<usize> {
    let idx: usize = key.parse().ok()?;
    (idx.to_string() == key).then_some(idx)
}

fn member(target: &Value, key: &str, span: SourceSpan) -> Result<Value> {
    let found = match target.kind() {
        ValueKind::Undefined | ValueKind::Null => {
            return Err(runtime_error(
                format!("Cannot read properties of {target} (reading '{key}')"),
                span,
            ));
        }
        ValueKind::Object(map) => map.get(key).cloned(),
        ValueKind::Array(values) => {
            if key == "length" {
                Some(Value::number(values.len() as f64))
            } else {
                array_index(key).and_then(|idx| values.get(idx).cloned())
            }
        }
        ValueKind::String(text) => {
            if key == "length" {
                Some(Value::number(text.chars().count() as f64))
            } else {
                array_index(key)
                    .and_then(|idx| text.chars().nth(idx))
                    .map(|ch| Value::string(ch.to_string()))
            }
        }
        _ => None,
    };
    if let Some(value) = found {
        return Ok(value);
    }
    if stdlib::has_method(target, key) {
        return Ok(Value::function(Callable::Method {
            receiver: target.clone(),
            name: key.to_string(),
        }));
    }
    Ok(Value::undefined())
}

fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::Field { target, field } => format!("{}.{field}", describe(target)),
        ExprKind::Group(inner) => describe(inner),
        _ => "expression".to_string(),
    }
}
