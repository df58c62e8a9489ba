//! Named task arguments
//!
//! Tasks may declare positional arguments, options and boolean flags. The
//! resolver matches the tokens given after the task name against those
//! declarations, coerces values to their declared type and hands back the
//! bindings plus any tokens that belong to the task itself.

use crate::env::{EnvValue, Environment};
use crate::error::{ArgumentError, ArgumentResult, ConfigError, ConfigResult};
use crate::expr::value::{format_float, Value};
use std::collections::HashSet;
use std::fmt;

/// Declared value type of an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Float,
    Integer,
    Boolean,
}

impl ArgType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" | "str" => Some(ArgType::String),
            "float" => Some(ArgType::Float),
            "integer" | "int" => Some(ArgType::Integer),
            "boolean" | "bool" => Some(ArgType::Boolean),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ArgType::String => "a string",
            ArgType::Float => "a float",
            ArgType::Integer => "an integer",
            ArgType::Boolean => "a boolean",
        }
    }
}

/// How many values an argument accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiple {
    Single,
    Unbounded,
    Exactly(usize),
}

impl Multiple {
    pub fn is_multiple(self) -> bool {
        !matches!(self, Multiple::Single)
    }
}

/// A resolved argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ArgValue>),
}

impl ArgValue {
    /// The value as stored in a task environment
    ///
    /// Lists are joined with single spaces, booleans keep their type.
    pub fn to_env_value(&self) -> EnvValue {
        match self {
            ArgValue::Bool(b) => EnvValue::Bool(*b),
            other => EnvValue::Str(other.to_string()),
        }
    }

    /// The value as seen by expressions and script callables
    pub fn to_value(&self) -> Value {
        match self {
            ArgValue::Str(s) => Value::Str(s.clone()),
            ArgValue::Int(i) => Value::Int(*i),
            ArgValue::Float(x) => Value::Float(*x),
            ArgValue::Bool(b) => Value::Bool(*b),
            ArgValue::List(items) => Value::List(items.iter().map(ArgValue::to_value).collect()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Str(s) => f.write_str(s),
            ArgValue::Int(i) => write!(f, "{}", i),
            ArgValue::Float(x) => f.write_str(&format_float(*x)),
            ArgValue::Bool(true) => f.write_str("True"),
            ArgValue::Bool(false) => Ok(()),
            ArgValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                f.write_str(&parts.join(" "))
            }
        }
    }
}

/// A declared task argument
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    pub name: String,

    /// CLI flags for non-positional arguments, e.g. `["-n", "--name"]`
    pub options: Vec<String>,

    pub arg_type: ArgType,

    pub default: Option<ArgValue>,

    pub required: bool,

    pub positional: bool,

    /// Display name for a positional argument in usage text
    pub positional_name: Option<String>,

    pub multiple: Multiple,

    pub help: Option<String>,
}

impl ArgumentSpec {
    /// A string option named `name` with the default `--name` flag
    pub fn new(name: &str) -> Self {
        ArgumentSpec {
            name: name.to_string(),
            options: vec![format!("--{}", name)],
            arg_type: ArgType::String,
            default: None,
            required: false,
            positional: false,
            positional_name: None,
            multiple: Multiple::Single,
            help: None,
        }
    }

    /// The name the value is bound to in env and expression scopes
    pub fn var_name(&self) -> String {
        self.name.replace('-', "_")
    }

    fn metavar(&self) -> String {
        self.positional_name
            .clone()
            .unwrap_or_else(|| self.name.to_uppercase().replace('-', "_"))
    }

    fn display_flag(&self) -> String {
        self.options
            .iter()
            .max_by_key(|o| o.len())
            .cloned()
            .unwrap_or_else(|| self.name.clone())
    }
}

/// The outcome of matching CLI tokens against a task's arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedArgs {
    /// Every declared argument in declaration order, `None` when unset
    pub bindings: Vec<(String, Option<ArgValue>)>,

    /// Tokens not consumed by declared arguments
    pub leftover: Vec<String>,
}

impl ResolvedArgs {
    /// Pass all tokens through untouched
    pub fn passthrough(tokens: &[String]) -> Self {
        ResolvedArgs {
            bindings: Vec::new(),
            leftover: tokens.to_vec(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    /// Bound values, skipping unset arguments
    pub fn values(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.bindings
            .iter()
            .filter_map(|(n, v)| v.as_ref().map(|v| (n.as_str(), v)))
    }

    /// Project bound values into an environment layer
    pub fn apply_to(&self, env: &mut Environment) {
        for (name, value) in self.values() {
            env.set(name, value.to_env_value());
        }
    }
}

/// Truthiness of a configured default for a boolean flag
fn default_truth(default: Option<&ArgValue>) -> bool {
    match default {
        None => false,
        Some(ArgValue::Bool(b)) => *b,
        Some(ArgValue::Int(i)) => *i != 0,
        Some(ArgValue::Float(x)) => *x != 0.0,
        Some(ArgValue::List(items)) => !items.is_empty(),
        Some(ArgValue::Str(s)) => {
            !matches!(s.trim().to_lowercase().as_str(), "" | "false" | "0" | "no")
        }
    }
}

/// Check a task's argument declarations for consistency
pub fn validate_specs(task: &str, specs: &[ArgumentSpec]) -> ConfigResult<()> {
    let invalid = |arg: &str, reason: &str| ConfigError::InvalidArgument {
        task: task.to_string(),
        arg: arg.to_string(),
        reason: reason.to_string(),
    };

    let mut names = HashSet::new();
    let mut flags = HashSet::new();
    let positionals: Vec<&ArgumentSpec> = specs.iter().filter(|s| s.positional).collect();

    for spec in specs {
        if spec.name.is_empty() {
            return Err(invalid("", "argument name must not be empty"));
        }
        if !names.insert(spec.var_name()) {
            return Err(invalid(&spec.name, "duplicate argument name"));
        }

        if spec.positional {
            if spec.arg_type == ArgType::Boolean {
                return Err(invalid(&spec.name, "positional arguments cannot be boolean"));
            }
            if !spec.options.is_empty() {
                return Err(invalid(&spec.name, "positional arguments cannot declare options"));
            }
        } else {
            if spec.options.is_empty() {
                return Err(invalid(&spec.name, "options list must not be empty"));
            }
            for option in &spec.options {
                if !option.starts_with('-') || option.len() < 2 || option.contains('=') {
                    return Err(invalid(
                        &spec.name,
                        &format!("option '{}' must start with '-'", option),
                    ));
                }
                if !flags.insert(option.as_str()) {
                    return Err(invalid(
                        &spec.name,
                        &format!("option '{}' is declared more than once", option),
                    ));
                }
            }
        }

        if spec.multiple.is_multiple() && spec.arg_type == ArgType::Boolean {
            return Err(invalid(&spec.name, "boolean arguments cannot take multiple values"));
        }
        if let Multiple::Exactly(n) = spec.multiple {
            if n < 2 {
                return Err(invalid(&spec.name, "multiple must be a boolean or an integer >= 2"));
            }
        }
    }

    if let Some((last, rest)) = positionals.split_last() {
        if let Some(bad) = rest.iter().find(|s| s.multiple.is_multiple()) {
            return Err(invalid(
                &bad.name,
                &format!("only the last positional argument may be multiple, not '{}' before '{}'", bad.name, last.name),
            ));
        }
    }

    Ok(())
}

/// Match CLI tokens against declared arguments
///
/// Without declarations every token is passed through. Otherwise tokens after
/// the first `--` are passed through and everything before it must match a
/// declaration. String defaults are templated against `env`.
pub fn resolve(
    task: &str,
    specs: &[ArgumentSpec],
    tokens: &[String],
    env: &Environment,
) -> ArgumentResult<ResolvedArgs> {
    if specs.is_empty() {
        return Ok(ResolvedArgs::passthrough(tokens));
    }

    let (named, leftover) = match tokens.iter().position(|t| t == "--") {
        Some(split) => (&tokens[..split], tokens[split + 1..].to_vec()),
        None => (tokens, Vec::new()),
    };

    let mut parser = TokenParser {
        task,
        specs,
        raw: vec![None; specs.len()],
        flags_seen: vec![false; specs.len()],
    };
    let free = parser.scan(named)?;
    parser.assign_positionals(free)?;

    let mut bindings = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        let value = if spec.arg_type == ArgType::Boolean {
            let base = default_truth(spec.default.as_ref());
            Some(ArgValue::Bool(base != parser.flags_seen[index]))
        } else {
            match parser.raw[index].take() {
                Some(raw) => Some(coerce_tokens(task, spec, raw)?),
                None => default_value(task, spec, env)?,
            }
        };

        if value.is_none() && spec.required {
            return Err(ArgumentError::Missing {
                task: task.to_string(),
                name: spec.name.clone(),
            });
        }
        bindings.push((spec.var_name(), value));
    }

    Ok(ResolvedArgs { bindings, leftover })
}

struct TokenParser<'a> {
    task: &'a str,
    specs: &'a [ArgumentSpec],
    raw: Vec<Option<Vec<String>>>,
    flags_seen: Vec<bool>,
}

impl TokenParser<'_> {
    fn find_option(&self, flag: &str) -> Option<usize> {
        self.specs
            .iter()
            .position(|s| !s.positional && s.options.iter().any(|o| o == flag))
    }

    /// Split `--flag=value` into the flag and the attached value
    fn split_flag<'t>(&self, token: &'t str) -> Option<(usize, &'t str, Option<&'t str>)> {
        if let Some(index) = self.find_option(token) {
            return Some((index, token, None));
        }
        let (flag, value) = token.split_once('=')?;
        self.find_option(flag).map(|index| (index, flag, Some(value)))
    }

    fn is_recognized_flag(&self, token: &str) -> bool {
        self.split_flag(token).is_some()
    }

    /// Consume option tokens, returning the tokens left for positionals
    fn scan(&mut self, tokens: &[String]) -> ArgumentResult<Vec<String>> {
        let mut free = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;

            let Some((index, flag, attached)) = self.split_flag(token) else {
                if looks_like_flag(token) {
                    return Err(self.unrecognized(token));
                }
                free.push(token.clone());
                continue;
            };

            let spec = &self.specs[index];
            match (spec.arg_type, spec.multiple) {
                (ArgType::Boolean, _) => {
                    if attached.is_some() {
                        return Err(ArgumentError::UnexpectedValue {
                            task: self.task.to_string(),
                            flag: flag.to_string(),
                        });
                    }
                    self.flags_seen[index] = true;
                }
                (_, Multiple::Single) => {
                    let value = match attached {
                        Some(value) => value.to_string(),
                        None => match tokens.get(i) {
                            Some(next) if !self.is_recognized_flag(next) => {
                                i += 1;
                                next.clone()
                            }
                            _ => {
                                return Err(ArgumentError::MissingValue {
                                    task: self.task.to_string(),
                                    flag: flag.to_string(),
                                })
                            }
                        },
                    };
                    self.raw[index] = Some(vec![value]);
                }
                (_, multiple) => {
                    let mut values: Vec<String> = attached.map(str::to_string).into_iter().collect();
                    let limit = match multiple {
                        Multiple::Exactly(n) => n,
                        _ => usize::MAX,
                    };
                    while values.len() < limit {
                        match tokens.get(i) {
                            Some(next) if !self.is_recognized_flag(next) && !looks_like_flag(next) => {
                                values.push(next.clone());
                                i += 1;
                            }
                            _ => break,
                        }
                    }
                    if let Multiple::Exactly(n) = multiple {
                        if values.len() != n {
                            return Err(ArgumentError::WrongValueCount {
                                task: self.task.to_string(),
                                flag: flag.to_string(),
                                expected: n,
                                got: values.len(),
                            });
                        }
                    }
                    self.raw[index] = Some(values);
                }
            }
        }

        Ok(free)
    }

    fn assign_positionals(&mut self, free: Vec<String>) -> ArgumentResult<()> {
        let mut remaining = free.into_iter();

        for (index, spec) in self.specs.iter().enumerate() {
            if !spec.positional {
                continue;
            }
            let values: Vec<String> = match spec.multiple {
                Multiple::Single => remaining.next().into_iter().collect(),
                Multiple::Unbounded => remaining.by_ref().collect(),
                Multiple::Exactly(n) => {
                    let values: Vec<String> = remaining.by_ref().take(n).collect();
                    if !values.is_empty() && values.len() != n {
                        return Err(ArgumentError::WrongValueCount {
                            task: self.task.to_string(),
                            flag: spec.metavar(),
                            expected: n,
                            got: values.len(),
                        });
                    }
                    values
                }
            };
            if !values.is_empty() {
                self.raw[index] = Some(values);
            }
        }

        match remaining.next() {
            Some(extra) => Err(self.unrecognized(&extra)),
            None => Ok(()),
        }
    }

    fn unrecognized(&self, token: &str) -> ArgumentError {
        ArgumentError::Unrecognized {
            task: self.task.to_string(),
            token: token.to_string(),
        }
    }
}

/// A token that starts with a dash and is not a negative number
fn looks_like_flag(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-') && token.parse::<f64>().is_err()
}

fn coerce_tokens(task: &str, spec: &ArgumentSpec, raw: Vec<String>) -> ArgumentResult<ArgValue> {
    if spec.multiple.is_multiple() {
        let items = raw
            .iter()
            .map(|token| coerce(task, spec, token))
            .collect::<ArgumentResult<Vec<_>>>()?;
        Ok(ArgValue::List(items))
    } else {
        let token = raw.into_iter().next().unwrap_or_default();
        coerce(task, spec, &token)
    }
}

fn coerce(task: &str, spec: &ArgumentSpec, token: &str) -> ArgumentResult<ArgValue> {
    let invalid = || ArgumentError::InvalidType {
        task: task.to_string(),
        name: spec.name.clone(),
        value: token.to_string(),
        expected: spec.arg_type.label(),
    };

    match spec.arg_type {
        ArgType::String => Ok(ArgValue::Str(token.to_string())),
        ArgType::Integer => token.trim().parse::<i64>().map(ArgValue::Int).map_err(|_| invalid()),
        ArgType::Float => token.trim().parse::<f64>().map(ArgValue::Float).map_err(|_| invalid()),
        ArgType::Boolean => Ok(ArgValue::Bool(default_truth(Some(&ArgValue::Str(token.to_string()))))),
    }
}

fn default_value(
    task: &str,
    spec: &ArgumentSpec,
    env: &Environment,
) -> ArgumentResult<Option<ArgValue>> {
    let Some(default) = &spec.default else {
        return Ok(None);
    };

    let coerce_default = |value: &ArgValue| -> ArgumentResult<ArgValue> {
        match (spec.arg_type, value) {
            (ArgType::String, ArgValue::Str(s)) => Ok(ArgValue::Str(env.fill_template(s))),
            (_, ArgValue::Str(s)) => coerce(task, spec, &env.fill_template(s)),
            (ArgType::String, other) => Ok(ArgValue::Str(other.to_string())),
            (ArgType::Float, ArgValue::Int(i)) => Ok(ArgValue::Float(*i as f64)),
            (_, other) => Ok(other.clone()),
        }
    };

    let value = match default {
        ArgValue::List(items) => ArgValue::List(
            items
                .iter()
                .map(&coerce_default)
                .collect::<ArgumentResult<Vec<_>>>()?,
        ),
        scalar => coerce_default(scalar)?,
    };
    Ok(Some(value))
}

/// One-line usage text for a task's arguments
pub fn usage(task: &str, specs: &[ArgumentSpec]) -> String {
    let mut parts = vec![format!("poet {}", task)];

    for spec in specs.iter().filter(|s| !s.positional) {
        let flag = spec.display_flag();
        let part = match (spec.arg_type, spec.multiple) {
            (ArgType::Boolean, _) => flag,
            (_, Multiple::Single) => format!("{} {}", flag, spec.metavar()),
            (_, Multiple::Exactly(n)) => {
                format!("{} {}", flag, vec![spec.metavar(); n].join(" "))
            }
            (_, Multiple::Unbounded) => format!("{} [{} ...]", flag, spec.metavar()),
        };
        parts.push(if spec.required { part } else { format!("[{}]", part) });
    }

    for spec in specs.iter().filter(|s| s.positional) {
        let metavar = spec.metavar();
        let part = match spec.multiple {
            Multiple::Single => metavar,
            Multiple::Exactly(n) => vec![metavar; n].join(" "),
            Multiple::Unbounded => format!("{} ...", metavar),
        };
        parts.push(if spec.required { part } else { format!("[{}]", part) });
    }

    format!("usage: {}", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn flag(name: &str, default: Option<ArgValue>) -> ArgumentSpec {
        ArgumentSpec {
            arg_type: ArgType::Boolean,
            default,
            ..ArgumentSpec::new(name)
        }
    }

    fn positional(name: &str) -> ArgumentSpec {
        ArgumentSpec {
            options: Vec::new(),
            positional: true,
            ..ArgumentSpec::new(name)
        }
    }

    fn run(specs: &[ArgumentSpec], cli: &[&str]) -> ArgumentResult<ResolvedArgs> {
        resolve("task", specs, &tokens(cli), &Environment::new())
    }

    #[test]
    fn test_no_specs_passes_everything_through() {
        let result = run(&[], &["--anything", "goes", "--"]).unwrap();
        assert!(result.bindings.is_empty());
        assert_eq!(result.leftover, tokens(&["--anything", "goes", "--"]));
    }

    #[test]
    fn test_boolean_flag_semantics() {
        let specs = [flag("verbose", None)];

        let passed = run(&specs, &["--verbose"]).unwrap();
        assert_eq!(passed.get("verbose"), Some(&ArgValue::Bool(true)));

        let absent = run(&specs, &[]).unwrap();
        assert_eq!(absent.get("verbose"), Some(&ArgValue::Bool(false)));

        let mut env = Environment::new();
        passed.apply_to(&mut env);
        assert_eq!(env.to_process_env()["verbose"], "True");

        let mut env = Environment::new();
        absent.apply_to(&mut env);
        assert_eq!(env.to_process_env()["verbose"], "");
    }

    #[test]
    fn test_boolean_flag_negates_truthy_default() {
        let specs = [flag("hello", Some(ArgValue::Str("hi!".to_string())))];

        let passed = run(&specs, &["--hello"]).unwrap();
        assert_eq!(passed.get("hello"), Some(&ArgValue::Bool(false)));

        let absent = run(&specs, &[]).unwrap();
        assert_eq!(absent.get("hello"), Some(&ArgValue::Bool(true)));

        let specs = [flag("quiet", Some(ArgValue::Str("false".to_string())))];
        let absent = run(&specs, &[]).unwrap();
        assert_eq!(absent.get("quiet"), Some(&ArgValue::Bool(false)));
    }

    #[test]
    fn test_option_values_and_types() {
        let specs = [
            ArgumentSpec {
                options: tokens(&["-n", "--name"]),
                ..ArgumentSpec::new("name")
            },
            ArgumentSpec {
                arg_type: ArgType::Integer,
                ..ArgumentSpec::new("count")
            },
            ArgumentSpec {
                arg_type: ArgType::Float,
                ..ArgumentSpec::new("ratio")
            },
        ];

        let result = run(&specs, &["-n", "poet", "--count=3", "--ratio", "-0.5"]).unwrap();
        assert_eq!(result.get("name"), Some(&ArgValue::Str("poet".to_string())));
        assert_eq!(result.get("count"), Some(&ArgValue::Int(3)));
        assert_eq!(result.get("ratio"), Some(&ArgValue::Float(-0.5)));
    }

    #[test]
    fn test_invalid_integer() {
        let specs = [ArgumentSpec {
            arg_type: ArgType::Integer,
            ..ArgumentSpec::new("count")
        }];
        let err = run(&specs, &["--count", "three"]).unwrap_err();
        assert!(matches!(err, ArgumentError::InvalidType { .. }));
    }

    #[test]
    fn test_missing_required() {
        let specs = [ArgumentSpec {
            required: true,
            ..ArgumentSpec::new("name")
        }];
        let err = run(&specs, &[]).unwrap_err();
        assert!(matches!(err, ArgumentError::Missing { .. }));
    }

    #[test]
    fn test_unrecognized_flag_with_specs() {
        let specs = [ArgumentSpec::new("name")];
        let err = run(&specs, &["--other", "x"]).unwrap_err();
        assert!(matches!(err, ArgumentError::Unrecognized { ref token, .. } if token == "--other"));
    }

    #[test]
    fn test_extra_positional_is_unrecognized() {
        let specs = [positional("target")];
        let err = run(&specs, &["a", "b"]).unwrap_err();
        assert!(matches!(err, ArgumentError::Unrecognized { ref token, .. } if token == "b"));
    }

    #[test]
    fn test_double_dash_splits_leftover() {
        let specs = [ArgumentSpec::new("name")];
        let result = run(&specs, &["--name", "x", "--", "--raw", "y"]).unwrap();
        assert_eq!(result.get("name"), Some(&ArgValue::Str("x".to_string())));
        assert_eq!(result.leftover, tokens(&["--raw", "y"]));
    }

    #[test]
    fn test_last_positional_absorbs_rest() {
        let specs = [
            positional("first"),
            ArgumentSpec {
                multiple: Multiple::Unbounded,
                ..positional("rest")
            },
        ];
        let result = run(&specs, &["a", "b", "c"]).unwrap();
        assert_eq!(result.get("first"), Some(&ArgValue::Str("a".to_string())));
        assert_eq!(
            result.get("rest"),
            Some(&ArgValue::List(vec![
                ArgValue::Str("b".to_string()),
                ArgValue::Str("c".to_string()),
            ]))
        );
    }

    #[test]
    fn test_unbounded_option_stops_at_next_flag() {
        let specs = [
            ArgumentSpec {
                multiple: Multiple::Unbounded,
                ..ArgumentSpec::new("files")
            },
            flag("force", None),
        ];
        let result = run(&specs, &["--files", "a", "b", "--force"]).unwrap();
        assert_eq!(result.get("files").map(|v| v.to_string()), Some("a b".to_string()));
        assert_eq!(result.get("force"), Some(&ArgValue::Bool(true)));
    }

    #[test]
    fn test_exact_count_option() {
        let specs = [ArgumentSpec {
            arg_type: ArgType::Integer,
            multiple: Multiple::Exactly(2),
            ..ArgumentSpec::new("size")
        }];
        let result = run(&specs, &["--size", "3", "4"]).unwrap();
        assert_eq!(
            result.get("size"),
            Some(&ArgValue::List(vec![ArgValue::Int(3), ArgValue::Int(4)]))
        );

        let err = run(&specs, &["--size", "3"]).unwrap_err();
        assert!(matches!(err, ArgumentError::WrongValueCount { expected: 2, got: 1, .. }));
    }

    #[test]
    fn test_defaults_are_templated_and_coerced() {
        let env = Environment::from_vars([("WHO", "world"), ("N", "7")]);
        let specs = [
            ArgumentSpec {
                default: Some(ArgValue::Str("hello ${WHO}".to_string())),
                ..ArgumentSpec::new("greeting")
            },
            ArgumentSpec {
                arg_type: ArgType::Integer,
                default: Some(ArgValue::Str("${N}".to_string())),
                ..ArgumentSpec::new("count")
            },
            ArgumentSpec::new("unset"),
        ];
        let result = resolve("task", &specs, &[], &env).unwrap();
        assert_eq!(result.get("greeting"), Some(&ArgValue::Str("hello world".to_string())));
        assert_eq!(result.get("count"), Some(&ArgValue::Int(7)));
        assert_eq!(result.get("unset"), None);
        assert_eq!(result.bindings.len(), 3);
    }

    #[test]
    fn test_dashes_become_underscores() {
        let specs = [ArgumentSpec::new("dry-run-target")];
        let result = run(&specs, &["--dry-run-target", "x"]).unwrap();
        assert_eq!(result.get("dry_run_target"), Some(&ArgValue::Str("x".to_string())));
    }

    /// Render a value back into the tokens that would produce it
    fn render(spec: &ArgumentSpec, value: &ArgValue) -> Vec<String> {
        let flag = spec.options.first().cloned();
        let mut out = Vec::new();
        match value {
            ArgValue::Bool(b) => {
                if *b != default_truth(spec.default.as_ref()) {
                    out.extend(flag);
                }
            }
            ArgValue::List(items) => {
                out.extend(flag);
                out.extend(items.iter().map(|i| i.to_string()));
            }
            other => {
                out.extend(flag);
                out.push(other.to_string());
            }
        }
        out
    }

    #[test]
    fn test_round_trip_representative_values() {
        let cases = vec![
            (ArgumentSpec::new("s"), ArgValue::Str("some value".to_string())),
            (
                ArgumentSpec { arg_type: ArgType::Integer, ..ArgumentSpec::new("i") },
                ArgValue::Int(-12),
            ),
            (
                ArgumentSpec { arg_type: ArgType::Float, ..ArgumentSpec::new("f") },
                ArgValue::Float(2.5),
            ),
            (flag("b", None), ArgValue::Bool(true)),
            (flag("b", None), ArgValue::Bool(false)),
            (flag("b", Some(ArgValue::Bool(true))), ArgValue::Bool(false)),
            (
                ArgumentSpec {
                    arg_type: ArgType::Integer,
                    multiple: Multiple::Unbounded,
                    ..ArgumentSpec::new("many")
                },
                ArgValue::List(vec![ArgValue::Int(1), ArgValue::Int(2), ArgValue::Int(3)]),
            ),
            (
                ArgumentSpec { multiple: Multiple::Unbounded, ..positional("paths") },
                ArgValue::List(vec![
                    ArgValue::Str("a.txt".to_string()),
                    ArgValue::Str("b.txt".to_string()),
                ]),
            ),
        ];

        for (spec, value) in cases {
            let cli = render(&spec, &value);
            let specs = [spec.clone()];
            let result = resolve("task", &specs, &cli, &Environment::new()).unwrap();
            assert_eq!(result.get(&spec.var_name()), Some(&value), "spec {:?}", spec);
        }
    }

    #[test]
    fn test_validate_specs() {
        assert!(validate_specs("t", &[positional("a"), flag("b", None)]).is_ok());

        let bool_positional = ArgumentSpec {
            arg_type: ArgType::Boolean,
            ..positional("a")
        };
        assert!(validate_specs("t", &[bool_positional]).is_err());

        let multiple_bool = ArgumentSpec {
            multiple: Multiple::Unbounded,
            ..flag("a", None)
        };
        assert!(validate_specs("t", &[multiple_bool]).is_err());

        let early_multiple = [
            ArgumentSpec { multiple: Multiple::Unbounded, ..positional("a") },
            positional("b"),
        ];
        assert!(validate_specs("t", &early_multiple).is_err());

        assert!(validate_specs("t", &[ArgumentSpec::new("a"), ArgumentSpec::new("a")]).is_err());

        let bad_option = ArgumentSpec {
            options: tokens(&["name"]),
            ..ArgumentSpec::new("name")
        };
        assert!(validate_specs("t", &[bad_option]).is_err());
    }

    #[test]
    fn test_usage_text() {
        let specs = [
            ArgumentSpec {
                options: tokens(&["-n", "--name"]),
                required: true,
                ..ArgumentSpec::new("name")
            },
            flag("loud", None),
            ArgumentSpec { multiple: Multiple::Unbounded, ..positional("files") },
        ];
        assert_eq!(
            usage("greet", &specs),
            "usage: poet greet --name NAME [--loud] [FILES ...]"
        );
    }
}
