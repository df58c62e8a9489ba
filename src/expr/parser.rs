//! Expression syntax tree and recursive descent parser
//!
//! Precedence from loosest to tightest: conditional `a if c else b`, `or`,
//! `and`, `not`, comparisons (chained), `+ -`, `* / // %`, unary `+ -`, `**`,
//! then attribute access, calls and subscripts.

use crate::error::{ExpressionError, ExpressionResult};
use crate::expr::lexer::{tokenize, Token};
use crate::expr::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    FString(Vec<FPart>),
    Name(String),
    Env(String),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Slice(Box<Expr>, Option<Box<Expr>>, Option<Box<Expr>>),
    Call(Call),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
    pub kwargs: Vec<(String, Expr)>,
}

impl Call {
    /// The dotted name of the called function, if it is a plain name chain
    pub fn dotted_name(&self) -> Option<String> {
        let mut parts = Vec::new();
        let mut node = self.func.as_ref();
        loop {
            match node {
                Expr::Attr(inner, attr) => {
                    parts.push(attr.as_str());
                    node = inner;
                }
                Expr::Name(name) => {
                    parts.push(name.as_str());
                    parts.reverse();
                    return Some(parts.join("."));
                }
                _ => return None,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FPart {
    Literal(String),
    Field(Expr, Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

const FORBIDDEN_KEYWORDS: &[&str] = &["lambda", "yield", "await"];
const RESERVED_KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "for", "from", "import", "def", "class",
    "return", "del", "pass", "raise", "with", "as", "global", "nonlocal", "assert", "while",
    "try", "except", "finally", "async", "break", "continue", "elif",
];

/// Parse a complete expression
pub fn parse_expression(source: &str) -> ExpressionResult<Expr> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
        source,
    };
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a function call such as `build(target, verbose=True)`
pub fn parse_call(source: &str) -> ExpressionResult<Call> {
    match parse_expression(source)? {
        Expr::Call(call) if call.dotted_name().is_some() => Ok(call),
        _ => Err(ExpressionError::Parse(format!(
            "Expected a function call, instead got: {}",
            source
        ))),
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Some(Token::Punct(p)) if *p == punct)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == keyword)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        let found = self.at_punct(punct);
        if found {
            self.pos += 1;
        }
        found
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.at_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_punct(&mut self, punct: &str) -> ExpressionResult<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{}'", punct)))
        }
    }

    fn expect_end(&self) -> ExpressionResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("expected end of expression")),
        }
    }

    fn unexpected(&self, context: &str) -> ExpressionError {
        let found = match self.peek() {
            Some(Token::Punct(":=")) => {
                return ExpressionError::Forbidden("Named expression".to_string())
            }
            Some(token) => format!("{:?}", token),
            None => "end of input".to_string(),
        };
        ExpressionError::Parse(format!("{}, found {} in: {}", context, found, self.source))
    }

    fn expression(&mut self) -> ExpressionResult<Expr> {
        let expr = self.or_expr()?;
        if !self.eat_keyword("if") {
            return Ok(expr);
        }
        let condition = self.or_expr()?;
        if !self.eat_keyword("else") {
            return Err(self.unexpected("expected 'else'"));
        }
        let otherwise = self.expression()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(expr),
            otherwise: Box::new(otherwise),
        })
    }

    fn or_expr(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> ExpressionResult<Expr> {
        if self.eat_keyword("not") {
            let operand = self.not_expr()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek()? {
            Token::Punct("==") => CmpOp::Eq,
            Token::Punct("!=") => CmpOp::NotEq,
            Token::Punct("<") => CmpOp::Lt,
            Token::Punct("<=") => CmpOp::LtE,
            Token::Punct(">") => CmpOp::Gt,
            Token::Punct(">=") => CmpOp::GtE,
            Token::Name(n) if n == "in" => CmpOp::In,
            Token::Name(n) if n == "is" => {
                self.pos += 1;
                return Some(if self.eat_keyword("not") {
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                });
            }
            Token::Name(n) if n == "not" => {
                if !matches!(self.tokens.get(self.pos + 1), Some(Token::Name(n)) if n == "in") {
                    return None;
                }
                self.pos += 2;
                return Some(CmpOp::NotIn);
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn comparison(&mut self) -> ExpressionResult<Expr> {
        let left = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare(Box::new(left), rest))
        }
    }

    fn arith(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = if self.eat_punct("+") {
                BinOp::Add
            } else if self.eat_punct("-") {
                BinOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat_punct("*") {
                BinOp::Mul
            } else if self.eat_punct("//") {
                BinOp::FloorDiv
            } else if self.eat_punct("/") {
                BinOp::Div
            } else if self.eat_punct("%") {
                BinOp::Mod
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> ExpressionResult<Expr> {
        if self.eat_punct("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat_punct("+") {
            return Ok(Expr::Unary(UnaryOp::Pos, Box::new(self.unary()?)));
        }
        self.power()
    }

    fn power(&mut self) -> ExpressionResult<Expr> {
        let base = self.postfix()?;
        if self.eat_punct("**") {
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> ExpressionResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct(".") {
                match self.advance() {
                    Some(Token::Name(attr)) => expr = Expr::Attr(Box::new(expr), attr),
                    _ => return Err(self.unexpected("expected attribute name")),
                }
            } else if self.eat_punct("(") {
                expr = Expr::Call(self.call_arguments(expr)?);
            } else if self.eat_punct("[") {
                expr = self.subscript(expr)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_arguments(&mut self, func: Expr) -> ExpressionResult<Call> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();

        while !self.eat_punct(")") {
            let keyword = match (self.peek(), self.tokens.get(self.pos + 1)) {
                (Some(Token::Name(name)), Some(Token::Punct("="))) => Some(name.clone()),
                _ => None,
            };
            match keyword {
                Some(name) => {
                    self.pos += 2;
                    if kwargs.iter().any(|(k, _)| *k == name) {
                        return Err(ExpressionError::Parse(format!(
                            "keyword argument repeated: {}",
                            name
                        )));
                    }
                    kwargs.push((name, self.expression()?));
                }
                None => {
                    if !kwargs.is_empty() {
                        return Err(ExpressionError::Parse(
                            "positional argument follows keyword argument".to_string(),
                        ));
                    }
                    args.push(self.expression()?);
                }
            }
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }

        Ok(Call {
            func: Box::new(func),
            args,
            kwargs,
        })
    }

    fn subscript(&mut self, target: Expr) -> ExpressionResult<Expr> {
        let start = if self.at_punct(":") {
            None
        } else {
            Some(Box::new(self.expression()?))
        };

        if self.eat_punct(":") {
            let stop = if self.at_punct("]") {
                None
            } else {
                Some(Box::new(self.expression()?))
            };
            self.expect_punct("]")?;
            return Ok(Expr::Slice(Box::new(target), start, stop));
        }

        self.expect_punct("]")?;
        match start {
            Some(index) => Ok(Expr::Index(Box::new(target), index)),
            None => Err(self.unexpected("expected subscript")),
        }
    }

    fn primary(&mut self) -> ExpressionResult<Expr> {
        let Some(token) = self.advance() else {
            return Err(ExpressionError::Parse(format!(
                "unexpected end of expression: {}",
                self.source
            )));
        };

        match token {
            Token::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Token::Str(mut s) => {
                // Adjacent string literals concatenate
                while let Some(Token::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Literal(Value::Str(s)))
            }
            Token::FStr(body) => Ok(Expr::FString(parse_fstring(&body)?)),
            Token::Env(name) => Ok(Expr::Env(name)),
            Token::Name(name) => match name.as_str() {
                "None" => Ok(Expr::Literal(Value::None)),
                "True" => Ok(Expr::Literal(Value::Bool(true))),
                "False" => Ok(Expr::Literal(Value::Bool(false))),
                n if FORBIDDEN_KEYWORDS.contains(&n) => {
                    Err(ExpressionError::Forbidden(format!("'{}'", n)))
                }
                n if RESERVED_KEYWORDS.contains(&n) => {
                    self.pos -= 1;
                    Err(self.unexpected("unexpected keyword"))
                }
                _ => Ok(Expr::Name(name)),
            },
            Token::Punct("(") => {
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            Token::Punct("[") => {
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    items.push(self.expression()?);
                    if self.at_keyword("for") {
                        return Err(ExpressionError::Forbidden("Comprehension".to_string()));
                    }
                    if !self.eat_punct(",") {
                        self.expect_punct("]")?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            Token::Punct("{") => {
                let mut entries = Vec::new();
                while !self.eat_punct("}") {
                    let key = self.expression()?;
                    self.expect_punct(":")?;
                    let value = self.expression()?;
                    entries.push((key, value));
                    if !self.eat_punct(",") {
                        self.expect_punct("}")?;
                        break;
                    }
                }
                Ok(Expr::Dict(entries))
            }
            Token::Punct(":=") => Err(ExpressionError::Forbidden("Named expression".to_string())),
            _ => {
                self.pos -= 1;
                Err(self.unexpected("unexpected token"))
            }
        }
    }
}

/// Split an f-string body into literal text and `{expr[:spec]}` fields
fn parse_fstring(body: &str) -> ExpressionResult<Vec<FPart>> {
    let chars: Vec<char> = body.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '{' => {
                let start = i + 1;
                let mut depth = 0usize;
                let mut quote: Option<char> = None;
                let mut end = None;
                let mut colon = None;
                for (j, &c) in chars.iter().enumerate().skip(start) {
                    match (quote, c) {
                        (Some(q), c) if c == q => quote = None,
                        (Some(_), _) => {}
                        (None, '\'' | '"') => quote = Some(c),
                        (None, '(' | '[' | '{') => depth += 1,
                        (None, ')' | ']') => depth = depth.saturating_sub(1),
                        (None, '}') if depth > 0 => depth -= 1,
                        (None, '}') => {
                            end = Some(j);
                            break;
                        }
                        (None, ':') if depth == 0 && colon.is_none() => colon = Some(j),
                        _ => {}
                    }
                }
                let end = end.ok_or_else(|| {
                    ExpressionError::Parse(format!("f-string: expecting '}}' in: {}", body))
                })?;

                if !literal.is_empty() {
                    parts.push(FPart::Literal(std::mem::take(&mut literal)));
                }
                let expr_end = colon.unwrap_or(end);
                let source: String = chars[start..expr_end].iter().collect();
                if source.trim().is_empty() {
                    return Err(ExpressionError::Parse(
                        "f-string: empty expression not allowed".to_string(),
                    ));
                }
                let spec = colon.map(|c| chars[c + 1..end].iter().collect::<String>());
                parts.push(FPart::Field(parse_expression(&source)?, spec));
                i = end + 1;
            }
            '}' => {
                return Err(ExpressionError::Parse(
                    "f-string: single '}' is not allowed".to_string(),
                ))
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() {
        parts.push(FPart::Literal(literal));
    }
    Ok(parts)
}

/// Collect the free names an expression refers to
///
/// Function names of calls on plain name chains are included, so a call to
/// an unknown function is reported like any other unknown name.
pub fn free_names(expr: &Expr) -> Vec<&str> {
    let mut names = Vec::new();
    collect_names(expr, &mut names);
    names
}

fn collect_names<'e>(expr: &'e Expr, names: &mut Vec<&'e str>) {
    match expr {
        Expr::Name(name) => names.push(name),
        Expr::Literal(_) | Expr::Env(_) => {}
        Expr::FString(parts) => {
            for part in parts {
                if let FPart::Field(inner, _) = part {
                    collect_names(inner, names);
                }
            }
        }
        Expr::List(items) => items.iter().for_each(|i| collect_names(i, names)),
        Expr::Dict(entries) => {
            for (k, v) in entries {
                collect_names(k, names);
                collect_names(v, names);
            }
        }
        Expr::Unary(_, inner) | Expr::Attr(inner, _) => collect_names(inner, names),
        Expr::Binary(_, l, r) | Expr::And(l, r) | Expr::Or(l, r) | Expr::Index(l, r) => {
            collect_names(l, names);
            collect_names(r, names);
        }
        Expr::Compare(first, rest) => {
            collect_names(first, names);
            rest.iter().for_each(|(_, e)| collect_names(e, names));
        }
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            collect_names(condition, names);
            collect_names(then, names);
            collect_names(otherwise, names);
        }
        Expr::Slice(target, start, stop) => {
            collect_names(target, names);
            for bound in [start, stop].into_iter().flatten() {
                collect_names(bound, names);
            }
        }
        Expr::Call(call) => {
            collect_names(&call.func, names);
            call.args.iter().for_each(|a| collect_names(a, names));
            call.kwargs.iter().for_each(|(_, v)| collect_names(v, names));
        }
    }
}
