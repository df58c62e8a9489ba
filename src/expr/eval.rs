//! Expression evaluation against a sandboxed scope
//!
//! Only the names bound in a [`Scope`] and the fixed builtin table are
//! reachable. Nothing an expression does can touch the filesystem or spawn a
//! process.

use crate::error::{ExpressionError, ExpressionResult};
use crate::expr::parser::{BinOp, CmpOp, Expr, FPart, UnaryOp};
use crate::expr::value::{Module, Number, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Functions callable by name from any expression
pub const BUILTINS: &[&str] = &[
    "len", "str", "int", "float", "bool", "abs", "min", "max", "sum", "sorted", "round", "any",
    "all", "range",
];

const MAX_RANGE_LEN: i64 = 1_000_000;

fn runtime(message: impl Into<String>) -> ExpressionError {
    ExpressionError::Runtime(message.into())
}

/// Names visible to an expression
#[derive(Debug, Clone)]
pub struct Scope {
    names: HashMap<String, Value>,
    env: BTreeMap<String, String>,
    argv: Vec<String>,
    cwd: PathBuf,
}

impl Scope {
    /// A scope with `sys` bound, reading `${VAR}` and `os.environ` from `env`
    pub fn new(env: BTreeMap<String, String>, cwd: PathBuf) -> Self {
        let mut names = HashMap::new();
        names.insert("sys".to_string(), Value::Module(Module::Sys));
        Scope {
            names,
            env,
            argv: Vec::new(),
            cwd,
        }
    }

    pub fn with_argv(mut self, argv: Vec<String>) -> Self {
        self.argv = argv;
        self
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.names.insert(name.into(), value);
    }

    pub fn import(&mut self, module: Module) {
        self.names.insert(module.name().to_string(), Value::Module(module));
    }

    /// The task environment as a dict value
    pub fn environ(&self) -> Value {
        Value::Dict(
            self.env
                .iter()
                .map(|(k, v)| (k.clone(), Value::Str(v.clone())))
                .collect(),
        )
    }

    pub fn evaluate(&self, expr: &Expr) -> ExpressionResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::FString(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        FPart::Literal(text) => out.push_str(text),
                        FPart::Field(inner, spec) => {
                            let value = self.evaluate(inner)?;
                            match spec {
                                Some(spec) => out.push_str(&format_field(&value, spec)?),
                                None => out.push_str(&value.to_string()),
                            }
                        }
                    }
                }
                Ok(Value::Str(out))
            }
            Expr::Name(name) => self.lookup(name),
            Expr::Env(name) => Ok(Value::Str(self.env.get(name).cloned().unwrap_or_default())),
            Expr::List(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<ExpressionResult<Vec<_>>>()
                .map(Value::List),
            Expr::Dict(entries) => {
                let mut dict = BTreeMap::new();
                for (key, value) in entries {
                    let key = match self.evaluate(key)? {
                        Value::Str(s) => s,
                        other => return Err(runtime(format!("dict keys must be str, not {}", other.type_name()))),
                    };
                    dict.insert(key, self.evaluate(value)?);
                }
                Ok(Value::Dict(dict))
            }
            Expr::Unary(op, operand) => unary(*op, self.evaluate(operand)?),
            Expr::Binary(op, left, right) => binary(*op, self.evaluate(left)?, self.evaluate(right)?),
            Expr::And(left, right) => {
                let left = self.evaluate(left)?;
                if left.is_truthy() {
                    self.evaluate(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = self.evaluate(left)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expr::Compare(first, rest) => {
                let mut left = self.evaluate(first)?;
                for (op, right) in rest {
                    let right = self.evaluate(right)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then)
                } else {
                    self.evaluate(otherwise)
                }
            }
            Expr::Attr(target, name) => self.attribute(self.evaluate(target)?, name),
            Expr::Index(target, index) => subscript(self.evaluate(target)?, self.evaluate(index)?),
            Expr::Slice(target, start, stop) => {
                let bound = |b: &Option<Box<Expr>>| -> ExpressionResult<Option<i64>> {
                    match b {
                        None => Ok(None),
                        Some(e) => match self.evaluate(e)? {
                            Value::None => Ok(None),
                            v => v
                                .as_number()
                                .and_then(|n| match n {
                                    Number::Int(i) => Some(Some(i)),
                                    Number::Float(_) => None,
                                })
                                .ok_or_else(|| runtime("slice indices must be integers or None")),
                        },
                    }
                };
                slice(self.evaluate(target)?, bound(start)?, bound(stop)?)
            }
            Expr::Call(call) => {
                let func = self.evaluate(&call.func)?;
                let args = call
                    .args
                    .iter()
                    .map(|a| self.evaluate(a))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                let mut kwargs = BTreeMap::new();
                for (name, value) in &call.kwargs {
                    kwargs.insert(name.clone(), self.evaluate(value)?);
                }
                self.call(func, args, kwargs)
            }
        }
    }

    fn lookup(&self, name: &str) -> ExpressionResult<Value> {
        if let Some(value) = self.names.get(name) {
            return Ok(value.clone());
        }
        if name == "environ" {
            return Ok(self.environ());
        }
        BUILTINS
            .iter()
            .find(|b| **b == name)
            .map(|b| Value::Builtin(*b))
            .ok_or_else(|| ExpressionError::InvalidReference(name.to_string()))
    }

    fn attribute(&self, target: Value, name: &str) -> ExpressionResult<Value> {
        let method = |target: &Value| Ok(Value::Method(Box::new(target.clone()), name.to_string()));

        match (&target, name) {
            (Value::Module(Module::Sys), "platform") => Ok(Value::from(sys_platform())),
            (Value::Module(Module::Sys), "argv") => Ok(Value::List(
                self.argv.iter().map(|a| Value::Str(a.clone())).collect(),
            )),
            (Value::Module(Module::Os), "name") => {
                Ok(Value::from(if cfg!(windows) { "nt" } else { "posix" }))
            }
            (Value::Module(Module::Os), "sep") => Ok(Value::from(std::path::MAIN_SEPARATOR_STR)),
            (Value::Module(Module::Os), "linesep") => {
                Ok(Value::from(if cfg!(windows) { "\r\n" } else { "\n" }))
            }
            (Value::Module(Module::Os), "environ") => Ok(self.environ()),
            (Value::Module(Module::Os), "getcwd")
            | (Value::Module(Module::Platform), "system" | "machine") => method(&target),
            (
                Value::Str(_),
                "upper" | "lower" | "strip" | "lstrip" | "rstrip" | "startswith" | "endswith"
                | "split" | "join" | "replace",
            )
            | (Value::Dict(_), "get" | "keys" | "values" | "items")
            | (Value::List(_), "index" | "count") => method(&target),
            _ => Err(runtime(format!(
                "'{}' object has no attribute '{}'",
                target.type_name(),
                name
            ))),
        }
    }

    fn call(
        &self,
        func: Value,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    ) -> ExpressionResult<Value> {
        match func {
            Value::Builtin(name) => call_builtin(name, args, kwargs),
            Value::Method(receiver, name) => {
                if !kwargs.is_empty() {
                    return Err(runtime(format!("{}() takes no keyword arguments", name)));
                }
                self.call_method(*receiver, &name, args)
            }
            other => Err(runtime(format!("'{}' object is not callable", other.type_name()))),
        }
    }

    fn call_method(&self, receiver: Value, name: &str, args: Vec<Value>) -> ExpressionResult<Value> {
        match receiver {
            Value::Module(Module::Os) if name == "getcwd" => {
                arity(name, &args, 0, 0)?;
                Ok(Value::Str(self.cwd.display().to_string()))
            }
            Value::Module(Module::Platform) => {
                arity(name, &args, 0, 0)?;
                Ok(Value::from(match name {
                    "system" => platform_system(),
                    _ => std::env::consts::ARCH,
                }))
            }
            Value::Str(s) => str_method(&s, name, args),
            Value::Dict(d) => dict_method(d, name, args),
            Value::List(items) => list_method(&items, name, args),
            other => Err(runtime(format!(
                "'{}' object has no attribute '{}'",
                other.type_name(),
                name
            ))),
        }
    }
}

fn sys_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn platform_system() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        other => other,
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> ExpressionResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(runtime(format!(
            "{}() takes {} arguments ({} given)",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn iterate(value: &Value) -> ExpressionResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Dict(d) => Ok(d.keys().map(|k| Value::Str(k.clone())).collect()),
        other => Err(runtime(format!("'{}' object is not iterable", other.type_name()))),
    }
}

fn as_int(value: &Value, context: &str) -> ExpressionResult<i64> {
    match value.as_number() {
        Some(Number::Int(i)) => Ok(i),
        _ => Err(runtime(format!(
            "{} must be an integer, not '{}'",
            context,
            value.type_name()
        ))),
    }
}

fn unary(op: UnaryOp, operand: Value) -> ExpressionResult<Value> {
    match (op, operand.as_number()) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!operand.is_truthy())),
        (UnaryOp::Neg, Some(Number::Int(i))) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| runtime("integer overflow")),
        (UnaryOp::Neg, Some(Number::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Number::Int(i))) => Ok(Value::Int(i)),
        (UnaryOp::Pos, Some(Number::Float(f))) => Ok(Value::Float(f)),
        (_, None) => Err(runtime(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            operand.type_name()
        ))),
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
    }
}

/// Longest string or list a repetition may build
const MAX_REPEAT_LEN: usize = 1 << 20;

fn repeat<T: Clone>(items: &[T], times: i64) -> ExpressionResult<Vec<T>> {
    let times = usize::try_from(times).unwrap_or(0);
    match items.len().checked_mul(times) {
        Some(len) if len <= MAX_REPEAT_LEN => Ok(items.iter().cloned().cycle().take(len).collect()),
        _ => Err(runtime(format!("repetition result exceeds {} items", MAX_REPEAT_LEN))),
    }
}

fn binary(op: BinOp, left: Value, right: Value) -> ExpressionResult<Value> {
    let overflow = || runtime("integer overflow");

    match (op, &left, &right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{}{}", a, b))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            return Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) if n.as_number().is_some() => {
            let chars: Vec<char> = s.chars().collect();
            return Ok(Value::Str(repeat(&chars, as_int(n, "repeat count")?)?.into_iter().collect()));
        }
        (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items))
            if n.as_number().is_some() =>
        {
            return Ok(Value::List(repeat(items, as_int(n, "repeat count")?)?));
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(runtime(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op_symbol(op),
            left.type_name(),
            right.type_name()
        )));
    };

    match (a, b) {
        (Number::Int(a), Number::Int(b)) => match op {
            BinOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Div => {
                if b == 0 {
                    return Err(runtime("division by zero"));
                }
                Ok(Value::Float(a as f64 / b as f64))
            }
            BinOp::FloorDiv | BinOp::Mod => {
                if b == 0 {
                    return Err(runtime("integer division or modulo by zero"));
                }
                let quotient = a.checked_div(b).ok_or_else(overflow)?;
                let remainder = a % b;
                let adjust = remainder != 0 && ((remainder < 0) != (b < 0));
                if op == BinOp::FloorDiv {
                    Ok(Value::Int(if adjust { quotient - 1 } else { quotient }))
                } else {
                    Ok(Value::Int(if adjust { remainder + b } else { remainder }))
                }
            }
            BinOp::Pow => {
                if b < 0 {
                    return Ok(Value::Float((a as f64).powf(b as f64)));
                }
                u32::try_from(b)
                    .ok()
                    .and_then(|exp| a.checked_pow(exp))
                    .map(Value::Int)
                    .ok_or_else(overflow)
            }
        },
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => {
                    if b == 0.0 {
                        return Err(runtime("float division by zero"));
                    }
                    a / b
                }
                BinOp::FloorDiv => {
                    if b == 0.0 {
                        return Err(runtime("float floor division by zero"));
                    }
                    (a / b).floor()
                }
                BinOp::Mod => {
                    if b == 0.0 {
                        return Err(runtime("float modulo"));
                    }
                    let r = a % b;
                    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                        r + b
                    } else {
                        r
                    }
                }
                BinOp::Pow => a.powf(b),
            };
            Ok(Value::Float(result))
        }
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> ExpressionResult<bool> {
    let ordering = |symbol: &str| {
        left.py_cmp(right).ok_or_else(|| {
            runtime(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                symbol,
                left.type_name(),
                right.type_name()
            ))
        })
    };

    Ok(match op {
        CmpOp::Eq => left.py_eq(right),
        CmpOp::NotEq => !left.py_eq(right),
        CmpOp::Lt => ordering("<")? == Ordering::Less,
        CmpOp::LtE => ordering("<=")? != Ordering::Greater,
        CmpOp::Gt => ordering(">")? == Ordering::Greater,
        CmpOp::GtE => ordering(">=")? != Ordering::Less,
        CmpOp::In => contains(right, left)?,
        CmpOp::NotIn => !contains(right, left)?,
        CmpOp::Is => is_same(left, right),
        CmpOp::IsNot => !is_same(left, right),
    })
}

fn is_same(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Module(a), Value::Module(b)) => a == b,
        _ => false,
    }
}

fn contains(container: &Value, item: &Value) -> ExpressionResult<bool> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Str(_), other) => Err(runtime(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::List(items), item) => Ok(items.iter().any(|i| i.py_eq(item))),
        (Value::Dict(d), Value::Str(key)) => Ok(d.contains_key(key)),
        (Value::Dict(_), _) => Ok(false),
        (other, _) => Err(runtime(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn subscript(target: Value, index: Value) -> ExpressionResult<Value> {
    match target {
        Value::List(items) => {
            let i = as_int(&index, "list indices")?;
            normalize_index(i, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| runtime("list index out of range"))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = as_int(&index, "string indices")?;
            normalize_index(i, chars.len())
                .map(|i| Value::Str(chars[i].to_string()))
                .ok_or_else(|| runtime("string index out of range"))
        }
        Value::Dict(mut d) => match &index {
            Value::Str(key) => d
                .remove(key)
                .ok_or_else(|| runtime(format!("KeyError: {}", index.repr()))),
            _ => Err(runtime(format!("KeyError: {}", index.repr()))),
        },
        other => Err(runtime(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn slice_bounds(len: usize, start: Option<i64>, stop: Option<i64>) -> (usize, usize) {
    let len_i = len as i64;
    let clamp = |v: i64| -> usize {
        let v = if v < 0 { v + len_i } else { v };
        v.clamp(0, len_i) as usize
    };
    let start = start.map(clamp).unwrap_or(0);
    let stop = stop.map(clamp).unwrap_or(len);
    (start, stop.max(start))
}

fn slice(target: Value, start: Option<i64>, stop: Option<i64>) -> ExpressionResult<Value> {
    match target {
        Value::List(items) => {
            let (a, b) = slice_bounds(items.len(), start, stop);
            Ok(Value::List(items[a..b].to_vec()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (a, b) = slice_bounds(chars.len(), start, stop);
            Ok(Value::Str(chars[a..b].iter().collect()))
        }
        other => Err(runtime(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn extremum(name: &str, args: Vec<Value>, want: Ordering) -> ExpressionResult<Value> {
    let items = if args.len() == 1 {
        iterate(&args[0])?
    } else {
        args
    };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| runtime(format!("{}() arg is an empty sequence", name)))?;
    for item in iter {
        let ordering = item.py_cmp(&best).ok_or_else(|| {
            runtime(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                if want == Ordering::Less { "<" } else { ">" },
                item.type_name(),
                best.type_name()
            ))
        })?;
        if ordering == want {
            best = item;
        }
    }
    Ok(best)
}

fn call_builtin(
    name: &str,
    args: Vec<Value>,
    mut kwargs: BTreeMap<String, Value>,
) -> ExpressionResult<Value> {
    let reverse = if name == "sorted" {
        kwargs.remove("reverse").map(|v| v.is_truthy()).unwrap_or(false)
    } else {
        false
    };
    let start = if name == "sum" { kwargs.remove("start") } else { None };
    if let Some(key) = kwargs.keys().next() {
        return Err(runtime(format!(
            "{}() got an unexpected keyword argument '{}'",
            name, key
        )));
    }

    match name {
        "len" => {
            arity(name, &args, 1, 1)?;
            let len = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Dict(d) => d.len(),
                other => {
                    return Err(runtime(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Int(len as i64))
        }
        "str" => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Str(args.first().map(|v| v.to_string()).unwrap_or_default()))
        }
        "int" => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Int(0)),
                Some(Value::Str(s)) => s
                    .trim()
                    .replace('_', "")
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| {
                        runtime(format!("invalid literal for int() with base 10: {}", Value::from(s.as_str()).repr()))
                    }),
                Some(v) => match v.as_number() {
                    Some(Number::Int(i)) => Ok(Value::Int(i)),
                    Some(Number::Float(f)) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
                    _ => Err(runtime(format!(
                        "int() argument must be a string or a number, not '{}'",
                        v.type_name()
                    ))),
                },
            }
        }
        "float" => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Float(0.0)),
                Some(Value::Str(s)) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                    runtime(format!("could not convert string to float: {}", Value::from(s.as_str()).repr()))
                }),
                Some(v) => v
                    .as_number()
                    .map(|n| Value::Float(n.as_f64()))
                    .ok_or_else(|| {
                        runtime(format!(
                            "float() argument must be a string or a number, not '{}'",
                            v.type_name()
                        ))
                    }),
            }
        }
        "bool" => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
        }
        "abs" => {
            arity(name, &args, 1, 1)?;
            match args[0].as_number() {
                Some(Number::Int(i)) => i
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| runtime("integer overflow")),
                Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
                None => Err(runtime(format!(
                    "bad operand type for abs(): '{}'",
                    args[0].type_name()
                ))),
            }
        }
        "min" => extremum(name, args, Ordering::Less),
        "max" => extremum(name, args, Ordering::Greater),
        "sum" => {
            arity(name, &args, 1, 2)?;
            let mut total = start.or_else(|| args.get(1).cloned()).unwrap_or(Value::Int(0));
            for item in iterate(&args[0])? {
                total = binary(BinOp::Add, total, item)?;
            }
            Ok(total)
        }
        "sorted" => {
            arity(name, &args, 1, 1)?;
            let mut items = iterate(&args[0])?;
            let mut failure = None;
            items.sort_by(|a, b| {
                a.py_cmp(b).unwrap_or_else(|| {
                    failure.get_or_insert_with(|| {
                        format!(
                            "'<' not supported between instances of '{}' and '{}'",
                            a.type_name(),
                            b.type_name()
                        )
                    });
                    Ordering::Equal
                })
            });
            if let Some(message) = failure {
                return Err(runtime(message));
            }
            if reverse {
                items.reverse();
            }
            Ok(Value::List(items))
        }
        "round" => {
            arity(name, &args, 1, 2)?;
            let number = args[0].as_number().ok_or_else(|| {
                runtime(format!(
                    "type {} doesn't define __round__ method",
                    args[0].type_name()
                ))
            })?;
            match args.get(1) {
                None | Some(Value::None) => match number {
                    Number::Int(i) => Ok(Value::Int(i)),
                    Number::Float(f) => Ok(Value::Int(f.round_ties_even() as i64)),
                },
                Some(digits) => {
                    let digits = as_int(digits, "round() digits")?;
                    match number {
                        Number::Int(i) => Ok(Value::Int(i)),
                        Number::Float(f) => {
                            let factor = 10f64.powi(digits as i32);
                            Ok(Value::Float((f * factor).round_ties_even() / factor))
                        }
                    }
                }
            }
        }
        "any" => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Bool(iterate(&args[0])?.iter().any(Value::is_truthy)))
        }
        "all" => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Bool(iterate(&args[0])?.iter().all(Value::is_truthy)))
        }
        "range" => {
            arity(name, &args, 1, 3)?;
            let ints = args
                .iter()
                .map(|a| as_int(a, "range() argument"))
                .collect::<ExpressionResult<Vec<_>>>()?;
            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => unreachable!("arity checked"),
            };
            if step == 0 {
                return Err(runtime("range() arg 3 must not be zero"));
            }
            let mut items = Vec::new();
            let mut current = start;
            while (step > 0 && current < stop) || (step < 0 && current > stop) {
                if items.len() as i64 >= MAX_RANGE_LEN {
                    return Err(runtime("range() result is too large"));
                }
                items.push(Value::Int(current));
                current = match current.checked_add(step) {
                    Some(next) => next,
                    None => break,
                };
            }
            Ok(Value::List(items))
        }
        _ => Err(ExpressionError::InvalidReference(name.to_string())),
    }
}

fn str_arg<'v>(name: &str, value: &'v Value) -> ExpressionResult<&'v str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(runtime(format!(
            "{}() argument must be str, not {}",
            name,
            other.type_name()
        ))),
    }
}

fn str_method(s: &str, name: &str, args: Vec<Value>) -> ExpressionResult<Value> {
    match name {
        "upper" => {
            arity(name, &args, 0, 0)?;
            Ok(Value::Str(s.to_uppercase()))
        }
        "lower" => {
            arity(name, &args, 0, 0)?;
            Ok(Value::Str(s.to_lowercase()))
        }
        "strip" | "lstrip" | "rstrip" => {
            arity(name, &args, 0, 1)?;
            let chars: Option<Vec<char>> = match args.first() {
                None | Some(Value::None) => None,
                Some(v) => Some(str_arg(name, v)?.chars().collect()),
            };
            let matches = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            let result = match name {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            };
            Ok(Value::Str(result.to_string()))
        }
        "startswith" | "endswith" => {
            arity(name, &args, 1, 1)?;
            let candidates = match &args[0] {
                Value::List(items) => items.clone(),
                other => vec![other.clone()],
            };
            for candidate in &candidates {
                let candidate = str_arg(name, candidate)?;
                let hit = if name == "startswith" {
                    s.starts_with(candidate)
                } else {
                    s.ends_with(candidate)
                };
                if hit {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "split" => {
            arity(name, &args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::from).collect(),
                Some(sep) => {
                    let sep = str_arg(name, sep)?;
                    if sep.is_empty() {
                        return Err(runtime("empty separator"));
                    }
                    s.split(sep).map(Value::from).collect()
                }
            };
            Ok(Value::List(parts))
        }
        "join" => {
            arity(name, &args, 1, 1)?;
            let items = iterate(&args[0])?;
            let parts = items
                .iter()
                .map(|item| str_arg(name, item).map(str::to_string))
                .collect::<ExpressionResult<Vec<_>>>()?;
            Ok(Value::Str(parts.join(s)))
        }
        "replace" => {
            arity(name, &args, 2, 2)?;
            let old = str_arg(name, &args[0])?;
            let new = str_arg(name, &args[1])?;
            Ok(Value::Str(s.replace(old, new)))
        }
        _ => Err(runtime(format!("'str' object has no attribute '{}'", name))),
    }
}

fn dict_method(
    mut d: BTreeMap<String, Value>,
    name: &str,
    args: Vec<Value>,
) -> ExpressionResult<Value> {
    match name {
        "get" => {
            arity(name, &args, 1, 2)?;
            let default = args.get(1).cloned().unwrap_or(Value::None);
            match &args[0] {
                Value::Str(key) => Ok(d.remove(key).unwrap_or(default)),
                _ => Ok(default),
            }
        }
        "keys" => {
            arity(name, &args, 0, 0)?;
            Ok(Value::List(d.into_keys().map(Value::Str).collect()))
        }
        "values" => {
            arity(name, &args, 0, 0)?;
            Ok(Value::List(d.into_values().collect()))
        }
        "items" => {
            arity(name, &args, 0, 0)?;
            Ok(Value::List(
                d.into_iter()
                    .map(|(k, v)| Value::List(vec![Value::Str(k), v]))
                    .collect(),
            ))
        }
        _ => Err(runtime(format!("'dict' object has no attribute '{}'", name))),
    }
}

fn list_method(items: &[Value], name: &str, args: Vec<Value>) -> ExpressionResult<Value> {
    arity(name, &args, 1, 1)?;
    match name {
        "count" => Ok(Value::Int(
            items.iter().filter(|i| i.py_eq(&args[0])).count() as i64,
        )),
        "index" => items
            .iter()
            .position(|i| i.py_eq(&args[0]))
            .map(|p| Value::Int(p as i64))
            .ok_or_else(|| runtime(format!("{} is not in list", args[0].repr()))),
        _ => Err(runtime(format!("'list' object has no attribute '{}'", name))),
    }
}

/// Largest width or precision an f-string format spec may ask for
const MAX_FORMAT_WIDTH: usize = 4096;

/// Apply an f-string format spec: `[[fill]align][0][width][.precision][type]`
/// with type one of `s d f %`
fn format_field(value: &Value, spec: &str) -> ExpressionResult<String> {
    let invalid = || runtime(format!("Invalid format specifier '{}'", spec));
    let chars: Vec<char> = spec.chars().collect();
    let mut i = 0;
    let mut fill = ' ';
    let mut align = None;

    if chars.len() >= 2 && "<>^".contains(chars[1]) {
        fill = chars[0];
        align = Some(chars[1]);
        i = 2;
    } else if chars.first().is_some_and(|c| "<>^".contains(*c)) {
        align = Some(chars[0]);
        i = 1;
    }

    let zero_pad = chars.get(i) == Some(&'0');
    if zero_pad {
        i += 1;
    }

    let digits = |i: &mut usize| -> Option<usize> {
        let start = *i;
        while chars.get(*i).is_some_and(char::is_ascii_digit) {
            *i += 1;
        }
        if start == *i {
            return None;
        }
        // Too many digits for usize is as oversized as any other huge width
        Some(chars[start..*i].iter().collect::<String>().parse().unwrap_or(usize::MAX))
    };

    let width = digits(&mut i).unwrap_or(0);
    let precision = if chars.get(i) == Some(&'.') {
        i += 1;
        Some(digits(&mut i).ok_or_else(invalid)?)
    } else {
        None
    };
    if width > MAX_FORMAT_WIDTH || precision.is_some_and(|p| p > MAX_FORMAT_WIDTH) {
        return Err(runtime(format!(
            "Width or precision in format specifier '{}' exceeds {}",
            spec, MAX_FORMAT_WIDTH
        )));
    }
    let kind = chars.get(i).copied();
    if chars.len() > i + 1 {
        return Err(invalid());
    }

    let number = value.as_number();
    let body = match (kind, number) {
        (Some('f'), Some(n)) => format!("{:.*}", precision.unwrap_or(6), n.as_f64()),
        (Some('%'), Some(n)) => format!("{:.*}%", precision.unwrap_or(6), n.as_f64() * 100.0),
        (Some('d'), Some(Number::Int(n))) if precision.is_none() => n.to_string(),
        (Some('s') | None, _) if precision.is_some() && number.is_none() => {
            value.to_string().chars().take(precision.unwrap_or(0)).collect()
        }
        (Some('s'), None) | (None, _) if precision.is_none() => value.to_string(),
        _ => return Err(invalid()),
    };

    let len = body.chars().count();
    if len >= width {
        return Ok(body);
    }
    let pad = width - len;

    if zero_pad && align.is_none() && number.is_some() {
        let (sign, digits) = match body.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", body.as_str()),
        };
        return Ok(format!("{}{}{}", sign, "0".repeat(pad), digits));
    }

    let fill_str = |n: usize| fill.to_string().repeat(n);
    let align = align.unwrap_or(if number.is_some() { '>' } else { '<' });
    Ok(match align {
        '>' => format!("{}{}", fill_str(pad), body),
        '^' => format!("{}{}{}", fill_str(pad / 2), body, fill_str(pad - pad / 2)),
        _ => format!("{}{}", body, fill_str(pad)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse_expression;

    fn scope() -> Scope {
        let env = BTreeMap::from([
            ("HOME".to_string(), "/home/poet".to_string()),
            ("EMPTY".to_string(), String::new()),
        ]);
        let mut scope = Scope::new(env, PathBuf::from("/work")).with_argv(vec![
            "task".to_string(),
            "extra".to_string(),
        ]);
        scope.bind("count", Value::Int(3));
        scope.bind("name", Value::from("poet"));
        scope.bind("flag", Value::Bool(false));
        scope.bind("items", Value::List(vec![Value::Int(3), Value::Int(1), Value::Int(2)]));
        scope
    }

    fn eval(source: &str) -> Value {
        scope().evaluate(&parse_expression(source).unwrap()).unwrap()
    }

    fn eval_err(source: &str) -> ExpressionError {
        scope().evaluate(&parse_expression(source).unwrap()).unwrap_err()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval("7 / 2"), Value::Float(3.5));
        assert_eq!(eval("-7 // 2"), Value::Int(-4));
        assert_eq!(eval("-7 % 3"), Value::Int(2));
        assert_eq!(eval("2 ** 10"), Value::Int(1024));
        assert_eq!(eval("2 ** -1"), Value::Float(0.5));
        assert_eq!(eval("True + 1"), Value::Int(2));
        assert_eq!(eval("'ab' * 2"), Value::from("abab"));
        assert!(matches!(eval_err("1 / 0"), ExpressionError::Runtime(_)));
        assert!(matches!(eval_err("1 + 'a'"), ExpressionError::Runtime(_)));
    }

    #[test]
    fn test_boolean_logic_returns_operands() {
        assert_eq!(eval("flag or name"), Value::from("poet"));
        assert_eq!(eval("count and name"), Value::from("poet"));
        assert_eq!(eval("not flag"), Value::Bool(true));
        assert_eq!(eval("'yes' if count > 2 else 'no'"), Value::from("yes"));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("1 < count <= 3"), Value::Bool(true));
        assert_eq!(eval("1 < count < 3"), Value::Bool(false));
        assert_eq!(eval("'oe' in name"), Value::Bool(true));
        assert_eq!(eval("4 not in items"), Value::Bool(true));
        assert_eq!(eval("None is None"), Value::Bool(true));
        assert!(matches!(eval_err("'a' < 1"), ExpressionError::Runtime(_)));
    }

    #[test]
    fn test_builtins() {
        assert_eq!(eval("len(items)"), Value::Int(3));
        assert_eq!(eval("sorted(items)").to_string(), "[1, 2, 3]");
        assert_eq!(eval("sorted(items, reverse=True)").to_string(), "[3, 2, 1]");
        assert_eq!(eval("max(items)"), Value::Int(3));
        assert_eq!(eval("min(4, 2, 8)"), Value::Int(2));
        assert_eq!(eval("sum(items)"), Value::Int(6));
        assert_eq!(eval("int('42') + int(2.9)"), Value::Int(44));
        assert_eq!(eval("float('1.5')"), Value::Float(1.5));
        assert_eq!(eval("round(2.5)"), Value::Int(2));
        assert_eq!(eval("round(2.25, 1)"), Value::Float(2.2));
        assert_eq!(eval("str(count) + name"), Value::from("3poet"));
        assert_eq!(eval("range(3)").to_string(), "[0, 1, 2]");
        assert_eq!(eval("any([0, '', 1]) and not all([1, 0])"), Value::Bool(true));
        assert_eq!(eval("abs(-3)"), Value::Int(3));
        assert!(matches!(eval_err("int('x')"), ExpressionError::Runtime(_)));
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(eval("name.upper()"), Value::from("POET"));
        assert_eq!(eval("'  x '.strip()"), Value::from("x"));
        assert_eq!(eval("'a,b'.split(',')").to_string(), "['a', 'b']");
        assert_eq!(eval("'-'.join(['a', 'b'])"), Value::from("a-b"));
        assert_eq!(eval("name.replace('p', 'P')"), Value::from("Poet"));
        assert_eq!(eval("name.startswith(['x', 'po'])"), Value::Bool(true));
    }

    #[test]
    fn test_env_and_modules() {
        assert_eq!(eval("${HOME}"), Value::from("/home/poet"));
        assert_eq!(eval("${MISSING}"), Value::from(""));
        assert_eq!(eval("sys.argv[1:]").to_string(), "['extra']");
        assert_eq!(eval("sys.platform"), Value::from(sys_platform()));
        assert_eq!(eval("environ['HOME']"), Value::from("/home/poet"));
        assert!(matches!(eval_err("os.getcwd()"), ExpressionError::InvalidReference(_)));

        let mut scope = scope();
        scope.import(Module::Os);
        let value = scope.evaluate(&parse_expression("os.getcwd()").unwrap()).unwrap();
        assert_eq!(value, Value::from(PathBuf::from("/work").display().to_string()));
        let value = scope
            .evaluate(&parse_expression("os.environ.get('NOPE', 'dflt')").unwrap())
            .unwrap();
        assert_eq!(value, Value::from("dflt"));
    }

    #[test]
    fn test_fstrings() {
        assert_eq!(eval("f'{name}-{count}'"), Value::from("poet-3"));
        assert_eq!(eval("f'{count / 7:.2f}'"), Value::from("0.43"));
        assert_eq!(eval("f'[{name:>6}]'"), Value::from("[  poet]"));
        assert_eq!(eval("f'{count:03d}'"), Value::from("003"));
        assert_eq!(eval("f'{items}'"), Value::from("[3, 1, 2]"));
    }

    #[test]
    fn test_output_size_is_bounded() {
        assert_eq!(eval("f'{count:4096}'"), Value::from(format!("{:>4096}", 3)));
        assert!(matches!(eval_err("f'{count:999999999999}'"), ExpressionError::Runtime(_)));
        assert!(matches!(
            eval_err("f'{count:99999999999999999999999999}'"),
            ExpressionError::Runtime(_)
        ));
        assert!(matches!(eval_err("f'{count / 7:.5000f}'"), ExpressionError::Runtime(_)));
        assert!(matches!(eval_err("'ab' * 10 ** 12"), ExpressionError::Runtime(_)));
        assert!(matches!(eval_err("[1] * 10 ** 18"), ExpressionError::Runtime(_)));
    }

    #[test]
    fn test_indexing() {
        assert_eq!(eval("items[-1]"), Value::Int(2));
        assert_eq!(eval("name[1:3]"), Value::from("oe"));
        assert_eq!(eval("{'a': 1}['a']"), Value::Int(1));
        assert!(matches!(eval_err("items[5]"), ExpressionError::Runtime(_)));
        assert!(matches!(eval_err("{'a': 1}['b']"), ExpressionError::Runtime(_)));
    }
}
