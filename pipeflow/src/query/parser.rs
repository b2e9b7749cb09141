//! Recursive-descent parser for query expressions.
//!
//! Grammar, loosest binding first: `or`, `and`, `not`, then primaries:
//! `all`, `is(kind)` / `isinstance(kind)`, `(query)` and
//! `<path> <op> <literal>` with the operators `==` `=` `!=` `<` `<=` `>`
//! `>=` `=~` `!~`. Regex patterns are compiled here, so a bad pattern fails
//! the pipeline before any data flows.

use super::model::{CompareOp, Query};
use crate::errors::ParseError;
use crate::value::JsonElement;
use regex::Regex;

/// Parses a query expression into a [`Query`] tree.
pub fn parse_query(input: &str) -> Result<Query, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::new("the query is empty"));
    }
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
    };
    let query = parser.query()?;
    if let Some(token) = parser.peek() {
        return Err(ParseError::new(format!(
            "unexpected trailing input in query: {token}"
        )));
    }
    Ok(query)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Number(serde_json::Number),
    Compare(CompareOp),
    Regex { negated: bool },
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Word(word) => write!(f, "'{word}'"),
            Self::Quoted(text) => write!(f, "\"{text}\""),
            Self::Number(number) => write!(f, "{number}"),
            Self::Compare(_) | Self::Regex { .. } => write!(f, "an operator"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
        }
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-')
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let ch = chars[pos];
        if ch.is_whitespace() {
            pos += 1;
        } else if ch == '(' {
            tokens.push(Token::LParen);
            pos += 1;
        } else if ch == ')' {
            tokens.push(Token::RParen);
            pos += 1;
        } else if matches!(ch, '=' | '!' | '<' | '>') {
            let (token, width) = operator(ch, chars.get(pos + 1).copied())?;
            tokens.push(token);
            pos += width;
        } else if matches!(ch, '"' | '\'') {
            let (text, consumed) = quoted(&chars, pos)?;
            tokens.push(Token::Quoted(text));
            pos += consumed;
        } else if ch.is_ascii_digit()
            || (ch == '-' && chars.get(pos + 1).is_some_and(char::is_ascii_digit))
        {
            let (number, consumed) = number(&chars, pos)?;
            tokens.push(Token::Number(number));
            pos += consumed;
        } else if is_word_char(ch) {
            let mut word = String::new();
            while pos < chars.len() && is_word_char(chars[pos]) {
                word.push(chars[pos]);
                pos += 1;
            }
            tokens.push(Token::Word(word));
        } else {
            return Err(ParseError::new(format!(
                "unexpected character '{ch}' in query"
            )));
        }
    }
    Ok(tokens)
}

fn operator(first: char, second: Option<char>) -> Result<(Token, usize), ParseError> {
    let token = match (first, second) {
        ('=', Some('=')) => (Token::Compare(CompareOp::Eq), 2),
        ('=', Some('~')) => (Token::Regex { negated: false }, 2),
        ('=', _) => (Token::Compare(CompareOp::Eq), 1),
        ('!', Some('=')) => (Token::Compare(CompareOp::Ne), 2),
        ('!', Some('~')) => (Token::Regex { negated: true }, 2),
        ('<', Some('=')) => (Token::Compare(CompareOp::Le), 2),
        ('<', _) => (Token::Compare(CompareOp::Lt), 1),
        ('>', Some('=')) => (Token::Compare(CompareOp::Ge), 2),
        ('>', _) => (Token::Compare(CompareOp::Gt), 1),
        _ => return Err(ParseError::new("unexpected '!' in query")),
    };
    Ok(token)
}

/// Reads a quoted string starting at `start`. The closing quote may be
/// escaped with a backslash; other escape sequences are kept verbatim so
/// regex patterns like `\d` survive.
fn quoted(chars: &[char], start: usize) -> Result<(String, usize), ParseError> {
    let open = chars[start];
    let mut text = String::new();
    let mut pos = start + 1;
    while pos < chars.len() {
        let ch = chars[pos];
        if ch == '\\' {
            match chars.get(pos + 1) {
                Some(&next) if next == open || next == '\\' => {
                    text.push(next);
                    pos += 2;
                }
                Some(&next) => {
                    text.push('\\');
                    text.push(next);
                    pos += 2;
                }
                None => break,
            }
        } else if ch == open {
            return Ok((text, pos - start + 1));
        } else {
            text.push(ch);
            pos += 1;
        }
    }
    Err(ParseError::new("unbalanced quotes in query"))
}

fn number(chars: &[char], start: usize) -> Result<(serde_json::Number, usize), ParseError> {
    let mut end = start;
    if chars.get(end) == Some(&'-') {
        end += 1;
    }
    let mut after_exponent = false;
    while let Some(&ch) = chars.get(end) {
        if ch.is_ascii_digit() || ch == '.' {
            after_exponent = false;
        } else if ch == 'e' || ch == 'E' {
            after_exponent = true;
        } else if matches!(ch, '+' | '-') && after_exponent {
            after_exponent = false;
        } else {
            break;
        }
        end += 1;
    }
    let text: String = chars[start..end].iter().collect();
    let number = text
        .parse::<i64>()
        .ok()
        .map(serde_json::Number::from)
        .or_else(|| text.parse::<f64>().ok().and_then(serde_json::Number::from_f64))
        .ok_or_else(|| ParseError::new(format!("invalid number '{text}' in query")))?;
    Ok((number, end - start))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(found)) if found == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn query(&mut self) -> Result<Query, ParseError> {
        let mut left = self.conjunction()?;
        while self.eat_word("or") {
            let right = self.conjunction()?;
            left = Query::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn conjunction(&mut self) -> Result<Query, ParseError> {
        let mut left = self.negation()?;
        while self.eat_word("and") {
            let right = self.negation()?;
            left = Query::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn negation(&mut self) -> Result<Query, ParseError> {
        if self.eat_word("not") {
            Ok(Query::Not(Box::new(self.negation()?)))
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Result<Query, ParseError> {
        match self.bump() {
            Some(Token::LParen) => {
                let inner = self.query()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ParseError::new("missing ')' in query")),
                }
            }
            Some(Token::Word(word)) if word == "all" => Ok(Query::All),
            Some(Token::Word(word))
                if (word == "is" || word == "isinstance")
                    && self.peek() == Some(&Token::LParen) =>
            {
                self.pos += 1;
                let kind = match self.bump() {
                    Some(Token::Word(kind) | Token::Quoted(kind)) => kind,
                    _ => return Err(ParseError::new("is() needs a kind name")),
                };
                match self.bump() {
                    Some(Token::RParen) => Ok(Query::IsKind(kind)),
                    _ => Err(ParseError::new("missing ')' after the kind name")),
                }
            }
            Some(Token::Word(path)) => self.predicate(path),
            Some(token) => Err(ParseError::new(format!(
                "expected a predicate, found {token}"
            ))),
            None => Err(ParseError::new("expected a predicate")),
        }
    }

    fn predicate(&mut self, path: String) -> Result<Query, ParseError> {
        match self.bump() {
            Some(Token::Compare(op)) => {
                let value = self.literal(&path)?;
                Ok(Query::Compare { path, op, value })
            }
            Some(Token::Regex { negated }) => {
                let raw = match self.bump() {
                    Some(Token::Quoted(text) | Token::Word(text)) => text,
                    _ => {
                        return Err(ParseError::new(format!(
                            "missing regex pattern for '{path}'"
                        )))
                    }
                };
                let pattern = Regex::new(&raw).map_err(|err| {
                    ParseError::new(format!("invalid regex for '{path}': {err}"))
                })?;
                Ok(Query::Match {
                    path,
                    pattern,
                    negated,
                })
            }
            _ => Err(ParseError::new(format!(
                "property '{path}' must be followed by a comparison"
            ))),
        }
    }

    fn literal(&mut self, path: &str) -> Result<JsonElement, ParseError> {
        match self.bump() {
            Some(Token::Quoted(text)) => Ok(JsonElement::String(text)),
            Some(Token::Number(number)) => Ok(JsonElement::Number(number)),
            Some(Token::Word(word)) => match word.as_str() {
                "true" => Ok(JsonElement::Bool(true)),
                "false" => Ok(JsonElement::Bool(false)),
                "null" => Ok(JsonElement::Null),
                "and" | "or" | "not" => {
                    Err(ParseError::new(format!("missing literal for '{path}'")))
                }
                _ => Ok(JsonElement::String(word)),
            },
            _ => Err(ParseError::new(format!("missing literal for '{path}'"))),
        }
    }
}
