use std::{fmt, rc::Rc};

use indexmap::IndexMap;

use crate::diagnostics::{Result, ScriptError};

/// A dynamically typed script value.
///
/// Compound values are immutable and shared through `Rc`; assigning into a
/// member rebuilds the container and writes it back to its binding.
#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

#[derive(Clone)]
pub enum ValueKind {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Function(Callable),
}

/// Something a script can call.
#[derive(Clone, Debug)]
pub enum Callable {
    /// The boolean-conversion primitive exposed under the reserved word.
    Boolean,
    /// A member of the engine's function table, resolved at call time.
    Host(String),
    /// A built-in method bound to its receiver, e.g. `name.toUpperCase`.
    Method { receiver: Value, name: String },
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Boolean => crate::environment::BOOLEAN_WORD,
            Callable::Host(name) => name,
            Callable::Method { name, .. } => name,
        }
    }
}

/// The `typeof` classification recorded in the type namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Undefined,
    Object,
    Boolean,
    Number,
    String,
    Function,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Undefined => "undefined",
            TypeTag::Object => "object",
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Function => "function",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn undefined() -> Self {
        Self::new(ValueKind::Undefined)
    }

    pub fn null() -> Self {
        Self::new(ValueKind::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn number(value: f64) -> Self {
        Self::new(ValueKind::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(values))
    }

    pub fn object(entries: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Object(entries))
    }

    pub fn function(callable: Callable) -> Self {
        Self::new(ValueKind::Function(callable))
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0
    }

    pub fn type_tag(&self) -> TypeTag {
        match &*self.0 {
            ValueKind::Undefined => TypeTag::Undefined,
            ValueKind::Null | ValueKind::Array(_) | ValueKind::Object(_) => TypeTag::Object,
            ValueKind::Bool(_) => TypeTag::Boolean,
            ValueKind::Number(_) => TypeTag::Number,
            ValueKind::String(_) => TypeTag::String,
            ValueKind::Function(_) => TypeTag::Function,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(&*self.0, ValueKind::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(&*self.0, ValueKind::Undefined | ValueKind::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &*self.0 {
            ValueKind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match &*self.0 {
            ValueKind::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match &*self.0 {
            ValueKind::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// JavaScript truthiness, as applied by the boolean primitive.
    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::Undefined | ValueKind::Null => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Number(n) => *n != 0.0 && !n.is_nan(),
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::Array(_) | ValueKind::Object(_) | ValueKind::Function(_) => true,
        }
    }

    /// JavaScript `Number(value)`.
    pub fn to_number(&self) -> f64 {
        match &*self.0 {
            ValueKind::Undefined => f64::NAN,
            ValueKind::Null => 0.0,
            ValueKind::Bool(b) => f64::from(u8::from(*b)),
            ValueKind::Number(n) => *n,
            ValueKind::String(s) => parse_numeric_string(s),
            ValueKind::Array(_) => parse_numeric_string(&self.to_string()),
            ValueKind::Object(_) | ValueKind::Function(_) => f64::NAN,
        }
    }

    /// `===`: primitives by value, compound values by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Undefined, ValueKind::Undefined) => true,
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Number(a), ValueKind::Number(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Function(Callable::Boolean), ValueKind::Function(Callable::Boolean)) => {
                true
            }
            (ValueKind::Function(Callable::Host(a)), ValueKind::Function(Callable::Host(b))) => {
                a == b
            }
            _ => Rc::ptr_eq(&self.0, &other.0),
        }
    }

    /// `==`: JavaScript loose equality with its primitive coercions.
    pub fn loose_equals(&self, other: &Value) -> bool {
        use ValueKind as K;
        match (&*self.0, &*other.0) {
            (K::Undefined | K::Null, K::Undefined | K::Null) => true,
            (K::Undefined | K::Null, _) | (_, K::Undefined | K::Null) => false,
            (K::Number(a), K::String(_)) => *a == other.to_number(),
            (K::String(_), K::Number(b)) => self.to_number() == *b,
            (K::Bool(_), _) => Value::number(self.to_number()).loose_equals(other),
            (_, K::Bool(_)) => self.loose_equals(&Value::number(other.to_number())),
            (K::Array(_) | K::Object(_) | K::Function(_), K::Number(_) | K::String(_)) => {
                Value::string(self.to_string()).loose_equals(other)
            }
            (K::Number(_) | K::String(_), K::Array(_) | K::Object(_) | K::Function(_)) => {
                self.loose_equals(&Value::string(other.to_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// Structural equality, ignoring identity. NaN equals NaN here.
    pub fn deep_equals(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Undefined, ValueKind::Undefined) => true,
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Number(a), ValueKind::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Array(a), ValueKind::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(l, r)| l.deep_equals(r))
            }
            (ValueKind::Object(a), ValueKind::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.get(key)
                            .map(|rhs| value.deep_equals(rhs))
                            .unwrap_or(false)
                    })
            }
            (ValueKind::Function(a), ValueKind::Function(b)) => match (a, b) {
                (Callable::Boolean, Callable::Boolean) => true,
                (Callable::Host(a), Callable::Host(b)) => a == b,
                (
                    Callable::Method {
                        receiver: ra,
                        name: na,
                    },
                    Callable::Method {
                        receiver: rb,
                        name: nb,
                    },
                ) => na == nb && ra.deep_equals(rb),
                _ => false,
            },
            _ => false,
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::null(),
            serde_json::Value::Bool(b) => Value::bool(*b),
            serde_json::Value::Number(n) => Value::number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s.clone()),
            serde_json::Value::Array(items) => {
                Value::array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Lossy JSON view: `undefined`, functions and non-finite numbers
    /// become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match &*self.0 {
            ValueKind::Undefined | ValueKind::Null | ValueKind::Function(_) => {
                serde_json::Value::Null
            }
            ValueKind::Bool(b) => serde_json::Value::Bool(*b),
            ValueKind::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            ValueKind::String(s) => serde_json::Value::String(s.clone()),
            ValueKind::Array(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
            ValueKind::Object(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Formats a number the way JavaScript's `String(number)` does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n == 0.0 {
        return "0".into();
    }
    let magnitude = n.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{n}");
    }
    let formatted = format!("{n:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}

/// JavaScript's string-to-number conversion: surrounding whitespace is
/// ignored, an empty string is 0, anything unparseable is NaN.
pub fn parse_numeric_string(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .map(|n| n as f64)
                .unwrap_or(f64::NAN);
        }
    }
    let well_formed = trimmed.chars().any(|ch| ch.is_ascii_digit())
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-'));
    if !well_formed {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Undefined => write!(f, "undefined"),
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Number(n) => write!(f, "{}", format_number(*n)),
            ValueKind::String(s) => write!(f, "{s:?}"),
            ValueKind::Array(values) => f.debug_list().entries(values.iter()).finish(),
            ValueKind::Object(map) => f.debug_map().entries(map.iter()).finish(),
            ValueKind::Function(callable) => write!(f, "[Function: {}]", callable.name()),
        }
    }
}

/// JavaScript `String(value)`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Undefined => write!(f, "undefined"),
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Number(n) => write!(f, "{}", format_number(*n)),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::Array(values) => {
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    if !value.is_nullish() {
                        write!(f, "{value}")?;
                    }
                }
                Ok(())
            }
            ValueKind::Object(_) => write!(f, "[object Object]"),
            ValueKind::Function(callable) => {
                write!(f, "function {}() {{ [native code] }}", callable.name())
            }
        }
    }
}

/// Structural equality; scripts use `===` for identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_equals(other)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::string(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::array(values)
    }
}

/// Per-engine mapping from variable name to current value.
///
/// Callers populate it before constructing an engine; afterwards only
/// executed scripts add or remove entries.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    entries: IndexMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Structural comparison of two stores, see [`Value::deep_equals`].
    pub fn deep_equals(&self, other: &VariableStore) -> bool {
        self.len() == other.len()
            && self.iter().all(|(name, value)| {
                other
                    .get(name)
                    .map(|rhs| value.deep_equals(rhs))
                    .unwrap_or(false)
            })
    }

    /// Builds a store from a JSON object.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(entries) = json else {
            return Err(ScriptError::Configuration(
                "Initial variables must be a JSON object.".into(),
            ));
        };
        Ok(entries
            .iter()
            .map(|(name, value)| (name.clone(), Value::from_json(value)))
            .collect())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for VariableStore {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

impl From<IndexMap<String, Value>> for VariableStore {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Self { entries }
    }
}
