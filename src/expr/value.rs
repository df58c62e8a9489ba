//! Runtime values of the expression language

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Objects that can be bound by name in an expression scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Sys,
    Os,
    Platform,
}

impl Module {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sys" => Some(Module::Sys),
            "os" => Some(Module::Os),
            "platform" => Some(Module::Platform),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Module::Sys => "sys",
            Module::Os => "os",
            Module::Platform => "platform",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Module(Module),
    Builtin(&'static str),
    /// A method looked up on a receiver, waiting to be called
    Method(Box<Value>, String),
}

/// A number view of a value, with booleans counting as integers
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Module(_) => "module",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Method(..) => "method",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.is_empty(),
            Value::Module(_) | Value::Builtin(_) | Value::Method(..) => true,
        }
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Equality with numeric promotion, so `1 == 1.0 == True`
    pub fn py_eq(&self, other: &Value) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => return a == b,
            (Some(a), Some(b)) => return a.as_f64() == b.as_f64(),
            _ => {}
        }
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.py_eq(w)))
            }
            _ => self == other,
        }
    }

    /// Ordering for `<` and friends, `None` when the types do not compare
    pub fn py_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self.as_number(), other.as_number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => return Some(a.cmp(&b)),
            (Some(a), Some(b)) => return a.as_f64().partial_cmp(&b.as_f64()),
            _ => {}
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !x.py_eq(y) {
                        return x.py_cmp(y);
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    /// The `repr()` form: strings quoted, everything else as `str()`
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote(s),
            other => other.to_string(),
        }
    }
}

fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

/// Shortest round-trip rendering, with `.0` for whole numbers and two digit
/// exponents outside `1e-4..1e16`
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{:e}", value);
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        return format!("{}e{}{:0>2}", mantissa, sign, digits);
    }

    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Dict(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Module(m) => write!(f, "<module '{}'>", m.name()),
            Value::Builtin(name) => write!(f, "<built-in function {}>", name),
            Value::Method(receiver, name) => {
                write!(f, "<method '{}' of '{}' object>", name, receiver.type_name())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(0.1).to_string(), "0.1");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::from("a'b"), Value::None]).to_string(),
            r#"[1, "a'b", None]"#
        );
        let dict = BTreeMap::from([("k".to_string(), Value::from("v"))]);
        assert_eq!(Value::Dict(dict).to_string(), "{'k': 'v'}");
    }

    #[test]
    fn test_format_float_exponents() {
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(-2.0), "-2.0");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::List(Vec::new()).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Int(-1).is_truthy());
    }

    #[test]
    fn test_numeric_equality_and_ordering() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).py_eq(&Value::Int(1)));
        assert!(!Value::from("1").py_eq(&Value::Int(1)));
        assert_eq!(Value::Int(2).py_cmp(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::from("b").py_cmp(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from("b").py_cmp(&Value::Int(1)), None);
    }
}
