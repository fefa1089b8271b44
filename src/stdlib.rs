use crate::{
    diagnostics::{Result, ScriptError},
    functions::{FunctionTable, NativeFunction, VARIADIC},
    value::{Value, ValueKind},
};

/// Function table with the general-purpose helpers the CLI exposes.
pub fn standard_functions() -> FunctionTable {
    let mut table = FunctionTable::new();
    for function in [
        native("print", VARIADIC, io_print),
        native("len", 1, collections_len),
        native("min", VARIADIC, math_min),
        native("max", VARIADIC, math_max),
        native("abs", 1, math_abs),
        native("floor", 1, math_floor),
        native("ceil", 1, math_ceil),
        native("round", 1, math_round),
    ] {
        table.insert(function.name, function);
    }
    table
}

fn native(name: &'static str, arity: usize, callback: fn(&[Value]) -> Result<Value>) -> NativeFunction {
    NativeFunction::new(name, arity, callback)
}

const STRING_METHODS: &[&str] = &[
    "includes",
    "startsWith",
    "endsWith",
    "indexOf",
    "toUpperCase",
    "toLowerCase",
    "trim",
    "slice",
];

const ARRAY_METHODS: &[&str] = &["includes", "indexOf", "join", "slice", "concat"];

const NUMBER_METHODS: &[&str] = &["toFixed"];

/// Whether `receiver.name` is a built-in method.
pub fn has_method(receiver: &Value, name: &str) -> bool {
    let methods = match receiver.kind() {
        ValueKind::String(_) => STRING_METHODS,
        ValueKind::Array(_) => ARRAY_METHODS,
        ValueKind::Number(_) => NUMBER_METHODS,
        _ => return false,
    };
    methods.contains(&name)
}

/// Runs a built-in method. Methods never modify their receiver.
pub fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value> {
    match receiver.kind() {
        ValueKind::String(text) => string_method(text, name, args),
        ValueKind::Array(values) => array_method(values, name, args),
        ValueKind::Number(n) if name == "toFixed" => number_to_fixed(*n, args),
        _ => Err(ScriptError::runtime(format!(
            "{receiver:?}.{name} is not a function"
        ))),
    }
}

fn arg(args: &[Value], idx: usize) -> Value {
    args.get(idx).cloned().unwrap_or_else(Value::undefined)
}

fn string_arg(args: &[Value], idx: usize) -> String {
    arg(args, idx).to_string()
}

/// Resolves a JS-style relative index (negative counts from the end).
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

fn string_method(text: &str, name: &str, args: &[Value]) -> Result<Value> {
    let value = match name {
        "includes" => Value::bool(text.contains(&string_arg(args, 0))),
        "startsWith" => Value::bool(text.starts_with(&string_arg(args, 0))),
        "endsWith" => Value::bool(text.ends_with(&string_arg(args, 0))),
        "indexOf" => {
            let needle = string_arg(args, 0);
            let index = text
                .find(&needle)
                .map(|byte| text[..byte].chars().count() as f64)
                .unwrap_or(-1.0);
            Value::number(index)
        }
        "toUpperCase" => Value::string(text.to_uppercase()),
        "toLowerCase" => Value::string(text.to_lowercase()),
        "trim" => Value::string(text.trim()),
        "slice" => {
            let chars: Vec<char> = text.chars().collect();
            let start = relative_index(&arg(args, 0), chars.len(), 0);
            let end = relative_index(&arg(args, 1), chars.len(), chars.len());
            Value::string(chars[start..end.max(start)].iter().collect::<String>())
        }
        _ => {
            return Err(ScriptError::runtime(format!(
                "string.{name} is not a function"
            )))
        }
    };
    Ok(value)
}

fn array_method(values: &[Value], name: &str, args: &[Value]) -> Result<Value> {
    let value = match name {
        "includes" => {
            let needle = arg(args, 0);
            Value::bool(values.iter().any(|value| {
                value.strict_equals(&needle)
                    || (value.to_number().is_nan()
                        && needle.to_number().is_nan()
                        && matches!(value.kind(), ValueKind::Number(_))
                        && matches!(needle.kind(), ValueKind::Number(_)))
            }))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            let index = values
                .iter()
                .position(|value| value.strict_equals(&needle))
                .map(|idx| idx as f64)
                .unwrap_or(-1.0);
            Value::number(index)
        }
        "join" => {
            let separator = match args.first() {
                Some(sep) if !sep.is_undefined() => sep.to_string(),
                _ => ",".to_string(),
            };
            let parts: Vec<String> = values
                .iter()
                .map(|value| {
                    if value.is_nullish() {
                        String::new()
                    } else {
                        value.to_string()
                    }
                })
                .collect();
            Value::string(parts.join(&separator))
        }
        "slice" => {
            let start = relative_index(&arg(args, 0), values.len(), 0);
            let end = relative_index(&arg(args, 1), values.len(), values.len());
            Value::array(values[start..end.max(start)].to_vec())
        }
        "concat" => {
            let mut combined = values.to_vec();
            for extra in args {
                match extra.as_array() {
                    Some(items) => combined.extend(items.iter().cloned()),
                    None => combined.push(extra.clone()),
                }
            }
            Value::array(combined)
        }
        _ => {
            return Err(ScriptError::runtime(format!(
                "array.{name} is not a function"
            )))
        }
    };
    Ok(value)
}

fn number_to_fixed(n: f64, args: &[Value]) -> Result<Value> {
    let digits = arg(args, 0).to_number();
    let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
    if !(0.0..=100.0).contains(&digits) {
        return Err(ScriptError::runtime(
            "toFixed() digits argument must be between 0 and 100",
        ));
    }
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(Value::string(crate::value::format_number(n)));
    }
    let body = fixed_decimal(n.abs(), digits as usize);
    Ok(Value::string(if n < 0.0 { format!("-{body}") } else { body }))
}

/// Rounds the exact binary value of `abs` half-up to `digits` places.
fn fixed_decimal(abs: f64, digits: usize) -> String {
    // 1074 places hold the full expansion of any finite double.
    let exact = format!("{abs:.1074}");
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let mut kept: Vec<char> = int_part.chars().chain(frac_part.chars().take(digits)).collect();
    let round_up = frac_part
        .as_bytes()
        .get(digits)
        .is_some_and(|digit| *digit >= b'5');
    if round_up {
        let mut idx = kept.len();
        loop {
            if idx == 0 {
                kept.insert(0, '1');
                break;
            }
            idx -= 1;
            match kept[idx] {
                '9' => kept[idx] = '0',
                digit => {
                    kept[idx] = char::from(digit as u8 + 1);
                    break;
                }
            }
        }
    }
    let int_len = kept.len() - digits;
    let mut out: String = kept[..int_len].iter().collect();
    if digits > 0 {
        out.push('.');
        out.extend(&kept[int_len..]);
    }
    out
}

fn io_print(args: &[Value]) -> Result<Value> {
    let line: Vec<String> = args.iter().map(|value| value.to_string()).collect();
    println!("{}", line.join(" "));
    Ok(Value::undefined())
}

fn collections_len(args: &[Value]) -> Result<Value> {
    let len = match args[0].kind() {
        ValueKind::String(s) => s.chars().count(),
        ValueKind::Array(values) => values.len(),
        ValueKind::Object(entries) => entries.len(),
        _ => {
            return Err(ScriptError::runtime(format!(
                "len expects string, array or object, found {}",
                args[0].type_tag()
            )))
        }
    };
    Ok(Value::number(len as f64))
}

fn math_min(args: &[Value]) -> Result<Value> {
    Ok(Value::number(args.iter().fold(f64::INFINITY, |acc, value| {
        let n = value.to_number();
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            acc.min(n)
        }
    })))
}

fn math_max(args: &[Value]) -> Result<Value> {
    Ok(Value::number(args.iter().fold(f64::NEG_INFINITY, |acc, value| {
        let n = value.to_number();
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            acc.max(n)
        }
    })))
}

fn math_abs(args: &[Value]) -> Result<Value> {
    Ok(Value::number(args[0].to_number().abs()))
}

fn math_floor(args: &[Value]) -> Result<Value> {
    Ok(Value::number(args[0].to_number().floor()))
}

fn math_ceil(args: &[Value]) -> Result<Value> {
    Ok(Value::number(args[0].to_number().ceil()))
}

/// Nearest integer, ties toward positive infinity.
fn math_round(args: &[Value]) -> Result<Value> {
    let n = args[0].to_number();
    let floor = n.floor();
    Ok(Value::number(if n - floor >= 0.5 { floor + 1.0 } else { floor }))
}
