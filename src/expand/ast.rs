//! Syntax tree and parser for command task content
//!
//! Command content is a small subset of shell syntax: words separated by
//! whitespace, single and double quotes, backslash escapes, `#` comments,
//! `$VAR` / `${VAR}` parameters with the `:-` and `:+` operators, and glob
//! patterns (`*`, `?`, `[...]`). Lines are separated by `;`; newlines are plain
//! whitespace except that they end a comment.

use crate::error::{ExpansionError, ExpansionResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub lines: Vec<Line>,
}

impl Script {
    /// Lines that contain at least one word
    pub fn command_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|line| !line.words.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub words: Vec<Word>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    Unquoted,
    Single,
    Double,
}

/// A run of a word sharing one quoting style
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub quote: QuoteStyle,
    pub elements: Vec<Element>,
}

impl Segment {
    pub fn is_quoted(&self) -> bool {
        self.quote != QuoteStyle::Unquoted
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(String),
    Glob(String),
    Param(ParamExpansion),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamExpansion {
    pub name: String,
    pub operation: Option<ParamOperation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamOperator {
    /// `:-`
    Default,
    /// `:+`
    Alternate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamOperation {
    pub operator: ParamOperator,
    pub argument: Vec<Segment>,
}

const WORD_BREAK_CHARS: &str = "'\";#$?*[";
const PARAM_ARG_BREAK_CHARS: &str = "'\"$}";
const LINE_BREAK_CHARS: &str = "\r\n\u{c}\u{b}";

fn is_param_init(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_param_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse command task content into a [`Script`]
pub fn parse(source: &str) -> ExpansionResult<Script> {
    Parser {
        chars: source.chars().collect(),
        pos: 0,
    }
    .script()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn take(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ExpansionError {
        let consumed = &self.chars[..self.pos];
        let line = consumed.iter().filter(|&&c| c == '\n').count();
        let line_start = consumed
            .iter()
            .rposition(|&c| c == '\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        ExpansionError::Parse {
            message: message.into(),
            line,
            position: (self.pos - line_start).saturating_sub(1),
        }
    }

    fn script(mut self) -> ExpansionResult<Script> {
        let mut lines = Vec::new();
        while let Some(c) = self.peek() {
            if c == ';' {
                self.pos += 1;
                continue;
            }
            if let Some(line) = self.line()? {
                lines.push(line);
            }
        }
        Ok(Script { lines })
    }

    fn line(&mut self) -> ExpansionResult<Option<Line>> {
        let mut words = Vec::new();
        let mut comment = None;

        while let Some(c) = self.take() {
            if c == ';' {
                break;
            } else if c.is_whitespace() {
                continue;
            } else if c == '#' {
                comment = Some(self.comment());
                break;
            }
            self.pos -= 1;
            let word = self.word()?;
            if !word.segments.is_empty() {
                words.push(word);
            }
        }

        if words.is_empty() && comment.is_none() {
            return Ok(None);
        }
        Ok(Some(Line { words, comment }))
    }

    fn comment(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.take() {
            if LINE_BREAK_CHARS.contains(c) {
                break;
            }
            text.push(c);
        }
        text
    }

    fn word(&mut self) -> ExpansionResult<Word> {
        let mut segments = Vec::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ';' || c == '#' {
                break;
            }
            segments.push(self.segment(false)?);
        }
        Ok(Word { segments })
    }

    fn segment(&mut self, in_param_argument: bool) -> ExpansionResult<Segment> {
        match self.peek() {
            Some('\'') => {
                self.pos += 1;
                self.single_quoted()
            }
            Some('"') => {
                self.pos += 1;
                self.double_quoted()
            }
            _ if in_param_argument => self.param_argument_unquoted(),
            _ => self.unquoted(),
        }
    }

    fn single_quoted(&mut self) -> ExpansionResult<Segment> {
        let mut text = String::new();
        while let Some(c) = self.take() {
            if c == '\'' {
                return Ok(Segment {
                    quote: QuoteStyle::Single,
                    elements: vec![Element::Text(text)],
                });
            }
            text.push(c);
        }
        Err(self.error("Unexpected end of input with unmatched single quote"))
    }

    fn double_quoted(&mut self) -> ExpansionResult<Segment> {
        let mut elements = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(self.error("Unexpected end of input with unmatched double quote"))
                }
                Some('"') => {
                    self.pos += 1;
                    if elements.is_empty() {
                        elements.push(Element::Text(String::new()));
                    }
                    return Ok(Segment {
                        quote: QuoteStyle::Double,
                        elements,
                    });
                }
                Some('$') => match self.param()? {
                    Some(param) => elements.push(Element::Param(param)),
                    None => {
                        self.pos += 1;
                        let text = format!("${}", self.double_quoted_text());
                        elements.push(Element::Text(text));
                    }
                },
                Some(_) => {
                    let text = self.double_quoted_text();
                    elements.push(Element::Text(text));
                }
            }
        }
    }

    fn double_quoted_text(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(next @ ('"' | '$')) => {
                            self.pos += 1;
                            text.push(next);
                        }
                        _ => text.push('\\'),
                    }
                }
                '"' | '$' => break,
                _ => {
                    self.pos += 1;
                    text.push(c);
                }
            }
        }
        text
    }

    fn unquoted(&mut self) -> ExpansionResult<Segment> {
        let mut elements = Vec::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || "'\";#".contains(c) {
                break;
            }
            match c {
                '$' => match self.param()? {
                    Some(param) => elements.push(Element::Param(param)),
                    None => {
                        self.pos += 1;
                        let text = format!("${}", self.unquoted_text(WORD_BREAK_CHARS)?);
                        elements.push(Element::Text(text));
                    }
                },
                '*' | '?' | '[' => match self.glob() {
                    Some(glob) => elements.push(Element::Glob(glob)),
                    None => {
                        self.pos += 1;
                        let text = format!("{}{}", c, self.unquoted_text(WORD_BREAK_CHARS)?);
                        elements.push(Element::Text(text));
                    }
                },
                _ => {
                    let text = self.unquoted_text(WORD_BREAK_CHARS)?;
                    elements.push(Element::Text(text));
                }
            }
        }
        Ok(Segment {
            quote: QuoteStyle::Unquoted,
            elements,
        })
    }

    fn unquoted_text(&mut self, break_chars: &str) -> ExpansionResult<String> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                match self.take() {
                    Some(escaped) => text.push(escaped),
                    None => return Err(self.error("Unexpected end of input after backslash")),
                }
                continue;
            }
            if c.is_whitespace() || break_chars.contains(c) {
                break;
            }
            self.pos += 1;
            text.push(c);
        }
        Ok(text)
    }

    /// `*`, `?` or a `[...]` group; an unterminated group is not a glob
    fn glob(&mut self) -> Option<String> {
        let start = self.pos;
        match self.take()? {
            c @ ('*' | '?') => Some(c.to_string()),
            '[' => {
                let mut group = String::new();
                while let Some(c) = self.take() {
                    if c == ']' && !group.is_empty() && group != "!" {
                        return Some(format!("[{}]", group));
                    }
                    group.push(c);
                }
                self.pos = start;
                None
            }
            _ => {
                self.pos = start;
                None
            }
        }
    }

    /// Parse a parameter at `$`, or leave the cursor alone when the `$` is
    /// not followed by a parameter
    fn param(&mut self) -> ExpansionResult<Option<ParamExpansion>> {
        let start = self.pos;
        self.pos += 1;

        match self.peek() {
            Some('{') => {
                self.pos += 1;
                self.braced_param().map(Some)
            }
            Some(c) if is_param_init(c) => {
                let mut name = String::new();
                while let Some(c) = self.peek().filter(|&c| is_param_char(c)) {
                    self.pos += 1;
                    name.push(c);
                }
                Ok(Some(ParamExpansion {
                    name,
                    operation: None,
                }))
            }
            _ => {
                self.pos = start;
                Ok(None)
            }
        }
    }

    fn braced_param(&mut self) -> ExpansionResult<ParamExpansion> {
        let mut name = String::new();
        let mut operation = None;

        while let Some(c) = self.take() {
            if c == '}' {
                if name.is_empty() {
                    return Err(self.error("Bad substitution: ${}"));
                }
                return Ok(ParamExpansion { name, operation });
            }

            if name.is_empty() {
                if !is_param_init(c) {
                    return Err(self.error(format!(
                        "Bad substitution: Illegal first character in parameter name {:?}",
                        c
                    )));
                }
                name.push(c);
            } else if c == ':' {
                self.pos -= 1;
                operation = Some(self.param_operation()?);
            } else if is_param_char(c) {
                name.push(c);
            } else {
                return Err(self.error(format!(
                    "Bad substitution: Illegal character in parameter name {:?}",
                    c
                )));
            }
        }

        Err(self.error("Unexpected end of input, expected closing '}' after '${'"))
    }

    fn param_operation(&mut self) -> ExpansionResult<ParamOperation> {
        let (Some(first), Some(second)) = (self.take(), self.take()) else {
            return Err(self.error("Unexpected end of input in param expansion, expected '}'"));
        };

        let operator = match (first, second) {
            (':', '-') => ParamOperator::Default,
            (':', '+') => ParamOperator::Alternate,
            _ => {
                return Err(self.error(format!(
                    "Bad substitution: Unsupported operator '{}{}'",
                    first, second
                )))
            }
        };

        let mut argument = Vec::new();
        while let Some(c) = self.peek() {
            if c == '}' {
                break;
            }
            argument.push(self.segment(true)?);
        }

        Ok(ParamOperation { operator, argument })
    }

    /// Unquoted text inside a parameter argument, where whitespace, `;` and
    /// `#` are ordinary and globs are not recognised
    fn param_argument_unquoted(&mut self) -> ExpansionResult<Segment> {
        let mut elements = Vec::new();
        while let Some(c) = self.peek() {
            if "'\"}".contains(c) {
                break;
            }
            if c.is_whitespace() {
                while self.peek().is_some_and(char::is_whitespace) {
                    self.pos += 1;
                }
                elements.push(Element::Text(" ".to_string()));
            } else if c == '$' {
                match self.param()? {
                    Some(param) => elements.push(Element::Param(param)),
                    None => {
                        self.pos += 1;
                        let text = format!("${}", self.unquoted_text(PARAM_ARG_BREAK_CHARS)?);
                        elements.push(Element::Text(text));
                    }
                }
            } else {
                let text = self.unquoted_text(PARAM_ARG_BREAK_CHARS)?;
                elements.push(Element::Text(text));
            }
        }
        Ok(Segment {
            quote: QuoteStyle::Unquoted,
            elements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Element {
        Element::Text(s.to_string())
    }

    fn words(source: &str) -> Vec<Word> {
        parse(source)
            .unwrap()
            .lines
            .into_iter()
            .flat_map(|line| line.words)
            .collect()
    }

    #[test]
    fn test_words_and_lines() {
        let script = parse("echo hello world; ls\n  -la # list\n").unwrap();
        assert_eq!(script.lines.len(), 2);
        assert_eq!(script.lines[0].words.len(), 3);
        assert_eq!(script.lines[1].words.len(), 2);
        assert_eq!(script.lines[1].comment.as_deref(), Some(" list"));
    }

    #[test]
    fn test_comment_ends_at_newline() {
        let script = parse("a # one\nb").unwrap();
        let all: Vec<&Word> = script.lines.iter().flat_map(|l| &l.words).collect();
        assert_eq!(all.len(), 2);
        assert_eq!(script.command_lines().count(), 2);
    }

    #[test]
    fn test_quoted_segments() {
        let w = words(r#"pre'single $X'"double $X""#);
        assert_eq!(w.len(), 1);
        let segments = &w[0].segments;
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].elements, vec![text("pre")]);
        assert_eq!(segments[1].quote, QuoteStyle::Single);
        assert_eq!(segments[1].elements, vec![text("single $X")]);
        assert_eq!(segments[2].quote, QuoteStyle::Double);
        assert_eq!(
            segments[2].elements,
            vec![
                text("double "),
                Element::Param(ParamExpansion {
                    name: "X".to_string(),
                    operation: None
                })
            ]
        );
    }

    #[test]
    fn test_escapes() {
        let w = words(r#"a\ b "q\"\$\n""#);
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].segments[0].elements, vec![text("a b")]);
        assert_eq!(w[1].segments[0].elements, vec![text(r#"q"$\n"#)]);
    }

    #[test]
    fn test_lone_dollar_is_text() {
        let w = words("cost: $ 5$");
        assert_eq!(w[1].segments[0].elements, vec![text("$")]);
        assert_eq!(w[2].segments[0].elements, vec![text("5"), text("$")]);
    }

    #[test]
    fn test_param_operations() {
        let w = words("${A:-default value}");
        let Element::Param(param) = &w[0].segments[0].elements[0] else {
            panic!("expected param");
        };
        assert_eq!(param.name, "A");
        let op = param.operation.as_ref().unwrap();
        assert_eq!(op.operator, ParamOperator::Default);
        assert_eq!(
            op.argument[0].elements,
            vec![text("default"), text(" "), text("value")]
        );
    }

    #[test]
    fn test_globs() {
        let w = words("*.txt file?.rs [ab]c []x] [!]]y [unclosed");
        let kinds: Vec<&Element> = w.iter().map(|w| &w.segments[0].elements[0]).collect();
        assert_eq!(kinds[0], &Element::Glob("*".to_string()));
        assert_eq!(w[1].segments[0].elements[1], Element::Glob("?".to_string()));
        assert_eq!(kinds[2], &Element::Glob("[ab]".to_string()));
        assert_eq!(kinds[3], &Element::Glob("[]x]".to_string()));
        assert_eq!(kinds[4], &Element::Glob("[!]]".to_string()));
        assert_eq!(kinds[5], &text("[unclosed"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("'open"), Err(ExpansionError::Parse { .. })));
        assert!(matches!(parse("\"open"), Err(ExpansionError::Parse { .. })));
        assert!(matches!(parse("${}"), Err(ExpansionError::Parse { .. })));
        assert!(matches!(parse("${1A}"), Err(ExpansionError::Parse { .. })));
        assert!(matches!(parse("${A:=x}"), Err(ExpansionError::Parse { .. })));
        assert!(matches!(parse("${A"), Err(ExpansionError::Parse { .. })));
        assert!(matches!(parse("trailing\\"), Err(ExpansionError::Parse { .. })));
    }

    #[test]
    fn test_error_position() {
        let err = parse("ok\nbad ${A-}").unwrap_err();
        match err {
            ExpansionError::Parse { line, position, .. } => {
                assert_eq!(line, 1);
                assert_eq!(position, 7);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
