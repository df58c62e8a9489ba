//! Tokenizer for expressions

use crate::error::{ExpressionError, ExpressionResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    /// Raw body of an `f"..."` string, parsed later
    FStr(String),
    Name(String),
    /// A `${VAR}` reference to the task environment
    Env(String),
    Punct(&'static str),
}

const PUNCTUATION: &[&str] = &[
    "**", "//", "==", "!=", "<=", ">=", ":=", "+", "-", "*", "/", "%", "<", ">", "(", ")", "[",
    "]", "{", "}", ",", ":", ".", "=",
];

pub fn tokenize(source: &str) -> ExpressionResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '$' && chars.get(i + 1) == Some(&'{') {
            let start = i + 2;
            let end = chars[start..]
                .iter()
                .position(|&c| c == '}')
                .map(|offset| start + offset)
                .ok_or_else(|| ExpressionError::Parse(format!("unterminated '${{' in: {}", source)))?;
            let name: String = chars[start..end].iter().collect();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ExpressionError::Parse(format!("bad env reference '${{{}}}'", name)));
            }
            tokens.push(Token::Env(name));
            i = end + 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let (token, next) = number(&chars, i)?;
            tokens.push(token);
            i = next;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();

            // String prefixes
            if let Some(&(quote @ ('"' | '\''))) = chars.get(i) {
                match word.to_ascii_lowercase().as_str() {
                    "f" => {
                        let (body, next) = string_body(&chars, i + 1, quote, false)?;
                        tokens.push(Token::FStr(body));
                        i = next;
                        continue;
                    }
                    "r" => {
                        let (body, next) = string_body(&chars, i + 1, quote, true)?;
                        tokens.push(Token::Str(body));
                        i = next;
                        continue;
                    }
                    _ => {}
                }
            }

            tokens.push(Token::Name(word));
            continue;
        }

        if c == '"' || c == '\'' {
            let (body, next) = string_body(&chars, i + 1, c, false)?;
            tokens.push(Token::Str(body));
            i = next;
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
        match PUNCTUATION.iter().find(|p| rest.starts_with(**p)) {
            Some(p) => {
                tokens.push(Token::Punct(*p));
                i += p.chars().count();
            }
            None => {
                return Err(ExpressionError::Parse(format!(
                    "unexpected character '{}' in: {}",
                    c, source
                )))
            }
        }
    }

    Ok(tokens)
}

fn number(chars: &[char], start: usize) -> ExpressionResult<(Token, usize)> {
    let mut i = start;
    let mut is_float = false;

    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
        i += 1;
    }
    if chars.get(i) == Some(&'.') && chars.get(i + 1).map_or(true, |c| !c.is_alphabetic()) {
        is_float = true;
        i += 1;
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
            i += 1;
        }
    }
    if matches!(chars.get(i), Some('e' | 'E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+' | '-')) {
            j += 1;
        }
        if chars.get(j).is_some_and(char::is_ascii_digit) {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text: String = chars[start..i].iter().filter(|&&c| c != '_').collect();
    let token = if is_float {
        text.parse::<f64>().map(Token::Float).ok()
    } else {
        text.parse::<i64>().map(Token::Int).ok()
    };
    token
        .map(|t| (t, i))
        .ok_or_else(|| ExpressionError::Parse(format!("invalid number literal '{}'", text)))
}

/// Read a string body up to the closing quote; `raw` keeps backslashes as is
fn string_body(
    chars: &[char],
    start: usize,
    quote: char,
    raw: bool,
) -> ExpressionResult<(String, usize)> {
    let mut body = String::new();
    let mut i = start;

    while let Some(&c) = chars.get(i) {
        i += 1;
        if c == quote {
            return Ok((body, i));
        }
        if c != '\\' {
            body.push(c);
            continue;
        }

        let Some(&escaped) = chars.get(i) else { break };
        i += 1;
        if raw {
            body.push('\\');
            body.push(escaped);
            continue;
        }
        match escaped {
            'n' => body.push('\n'),
            't' => body.push('\t'),
            'r' => body.push('\r'),
            '0' => body.push('\0'),
            '\\' | '\'' | '"' => body.push(escaped),
            other => {
                body.push('\\');
                body.push(other);
            }
        }
    }

    Err(ExpressionError::Parse("unterminated string literal".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_mixed() {
        let tokens = tokenize("len(${NAME}) >= 2 ** 3 and 'a\\'b'").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("len".to_string()),
                Token::Punct("("),
                Token::Env("NAME".to_string()),
                Token::Punct(")"),
                Token::Punct(">="),
                Token::Int(2),
                Token::Punct("**"),
                Token::Int(3),
                Token::Name("and".to_string()),
                Token::Str("a'b".to_string()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokenize("1_000").unwrap(), vec![Token::Int(1000)]);
        assert_eq!(tokenize("2.5").unwrap(), vec![Token::Float(2.5)]);
        assert_eq!(tokenize(".5").unwrap(), vec![Token::Float(0.5)]);
        assert_eq!(tokenize("1e3").unwrap(), vec![Token::Float(1000.0)]);
    }

    #[test]
    fn test_fstring_and_raw() {
        assert_eq!(
            tokenize(r#"f"{x:.2f}" r'\d'"#).unwrap(),
            vec![Token::FStr("{x:.2f}".to_string()), Token::Str(r"\d".to_string())]
        );
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("${}").is_err());
        assert!(tokenize("a ; b").is_err());
    }
}
