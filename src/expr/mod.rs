//! A small sandboxed expression language for `expr` tasks, switch controls
//! and script call arguments

pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use self::eval::{Scope, BUILTINS};
pub use self::parser::{free_names, parse_call, parse_expression, Call, Expr};
pub use self::value::{format_float, Module, Value};

use crate::error::{ExpressionError, ExpressionResult};

/// Parse and evaluate `source` in `scope`
pub fn evaluate(source: &str, scope: &Scope) -> ExpressionResult<Value> {
    scope.evaluate(&parse_expression(source)?)
}

/// Reject references to names that will not be bound at run time
pub fn check_names(expr: &Expr, allowed: &[&str]) -> ExpressionResult<()> {
    for name in free_names(expr) {
        if !allowed.contains(&name) && !BUILTINS.contains(&name) && name != "sys" {
            return Err(ExpressionError::InvalidReference(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn test_check_names() {
        let expr = parse_expression("len(items) + count if sys.argv else 0").unwrap();
        assert!(check_names(&expr, &["items", "count"]).is_ok());
        assert!(matches!(
            check_names(&expr, &["items"]),
            Err(ExpressionError::InvalidReference(name)) if name == "count"
        ));

        let expr = parse_expression("os.getcwd()").unwrap();
        assert!(check_names(&expr, &[]).is_err());
        assert!(check_names(&expr, &["os"]).is_ok());
    }

    #[test]
    fn test_evaluate() {
        let scope = Scope::new(BTreeMap::new(), PathBuf::from("."));
        assert_eq!(evaluate("[1, 2][0] + 1", &scope).unwrap(), Value::Int(2));
        assert!(evaluate("lambda: 1", &scope).is_err());
    }
}
