//! Parser for `key=value` argument lists.

use crate::errors::ParseError;
use crate::value::{Json, JsonElement};

/// Parses an argument string of `key=value` pairs into a JSON mapping.
///
/// Pairs are separated by whitespace and/or commas. A key starts with a
/// letter or underscore and may contain letters, digits, `_`, `.` and `-`.
/// A value is a JSON primitive: a quoted string (single or double quotes,
/// backslash escapes the next character) or a bare token read as `true`,
/// `false`, `null` or a number, anything else as a string. Duplicate keys
/// are rejected.
pub fn parse_key_values(input: &str) -> Result<Json, ParseError> {
    let mut scanner = Scanner::new(input);
    let mut result = Json::new();
    scanner.skip_separators();
    while !scanner.at_end() {
        let (key, value) = scanner.key_value()?;
        if result.contains_key(&key) {
            return Err(ParseError::new(format!("duplicate key '{key}'")));
        }
        result.insert(key, value);
        scanner.skip_separators();
    }
    Ok(result)
}

/// Splits leading `key=value` assignments off the front of a command line.
///
/// Stops at the first token that does not look like an assignment and
/// returns the stringified pairs plus the remaining text. A malformed
/// assignment (a key directly followed by `=`) is an error rather than a
/// stopping point.
pub(super) fn parse_assignment_prefix(
    input: &str,
) -> Result<(Vec<(String, String)>, String), ParseError> {
    let mut scanner = Scanner::new(input);
    let mut pairs = Vec::new();
    scanner.skip_separators();
    while scanner.assignment_ahead() {
        let (key, value) = scanner.key_value()?;
        pairs.push((key, stringify(&value)));
        scanner.skip_separators();
    }
    Ok((pairs, scanner.remainder().to_string()))
}

fn stringify(value: &JsonElement) -> String {
    match value {
        JsonElement::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn is_key_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-')
}

fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || ch == ','
}

struct Scanner<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn skip_separators(&mut self) {
        while self.peek().is_some_and(is_separator) {
            self.pos += 1;
        }
    }

    /// The unconsumed tail of the input.
    fn remainder(&self) -> &'a str {
        let consumed: usize = self.chars[..self.pos].iter().map(|ch| ch.len_utf8()).sum();
        &self.input[consumed..]
    }

    /// True if the next token is `key=`, meaning an assignment starts here.
    fn assignment_ahead(&self) -> bool {
        let mut look = self.pos;
        match self.chars.get(look) {
            Some(ch) if is_key_start(*ch) => look += 1,
            _ => return false,
        }
        while self.chars.get(look).copied().is_some_and(is_key_char) {
            look += 1;
        }
        self.chars.get(look) == Some(&'=')
    }

    fn key_value(&mut self) -> Result<(String, JsonElement), ParseError> {
        let key = self.key()?;
        if self.bump() != Some('=') {
            return Err(ParseError::new(format!(
                "expected '=' after key '{key}'"
            )));
        }
        let value = self.value(&key)?;
        Ok((key, value))
    }

    fn key(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(ch) if is_key_start(ch) => {}
            _ => {
                return Err(ParseError::new(format!(
                    "expected a key at '{}'",
                    self.remainder()
                )))
            }
        }
        let mut key = String::new();
        while let Some(ch) = self.peek() {
            if !is_key_char(ch) {
                break;
            }
            key.push(ch);
            self.pos += 1;
        }
        Ok(key)
    }

    fn value(&mut self, key: &str) -> Result<JsonElement, ParseError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                self.quoted(quote, key)
            }
            Some(ch) if !is_separator(ch) => Ok(interpret_bare(&self.bare())),
            _ => Err(ParseError::new(format!("missing value for key '{key}'"))),
        }
    }

    fn quoted(&mut self, quote: char, key: &str) -> Result<JsonElement, ParseError> {
        let mut text = String::new();
        while let Some(ch) = self.bump() {
            match ch {
                '\\' => match self.bump() {
                    Some(escaped) => text.push(escaped),
                    None => break,
                },
                ch if ch == quote => return Ok(JsonElement::String(text)),
                ch => text.push(ch),
            }
        }
        Err(ParseError::new(format!(
            "unbalanced quotes in value for key '{key}'"
        )))
    }

    fn bare(&mut self) -> String {
        let mut token = String::new();
        while let Some(ch) = self.peek() {
            if is_separator(ch) {
                break;
            }
            token.push(ch);
            self.pos += 1;
        }
        token
    }
}

fn interpret_bare(token: &str) -> JsonElement {
    match token {
        "true" => JsonElement::Bool(true),
        "false" => JsonElement::Bool(false),
        "null" => JsonElement::Null,
        _ => {
            if let Ok(int) = token.parse::<i64>() {
                return JsonElement::from(int);
            }
            if let Ok(float) = token.parse::<f64>() {
                if let Some(number) = serde_json::Number::from_f64(float) {
                    return JsonElement::Number(number);
                }
            }
            JsonElement::String(token.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_key_values_primitives() {
        let parsed = parse_key_values(r#"a=1 b=true c=null d=foo e="with space" f='single'"#)
            .unwrap();
        assert_eq!(
            JsonElement::Object(parsed),
            json!({"a": 1, "b": true, "c": null, "d": "foo", "e": "with space", "f": "single"})
        );
    }

    #[test]
    fn test_parse_key_values_numbers() {
        let parsed = parse_key_values("a=-3 b=2.5 c=1e3").unwrap();
        assert_eq!(
            JsonElement::Object(parsed),
            json!({"a": -3, "b": 2.5, "c": 1000.0})
        );
    }

    #[test]
    fn test_parse_key_values_comma_separated() {
        let parsed = parse_key_values("clean=true, delete=false").unwrap();
        assert_eq!(
            JsonElement::Object(parsed),
            json!({"clean": true, "delete": false})
        );
    }

    #[test]
    fn test_parse_key_values_dotted_and_dashed_keys() {
        let parsed = parse_key_values("tag.owner=team-a cleanup-age=7 path=/tmp/x").unwrap();
        assert_eq!(
            JsonElement::Object(parsed),
            json!({"tag.owner": "team-a", "cleanup-age": 7, "path": "/tmp/x"})
        );
    }

    #[test]
    fn test_parse_key_values_escapes_in_quotes() {
        let parsed = parse_key_values(r#"a="say \"hi\"" b='don\'t'"#).unwrap();
        assert_eq!(
            JsonElement::Object(parsed),
            json!({"a": "say \"hi\"", "b": "don't"})
        );
    }

    #[test]
    fn test_parse_key_values_empty_input() {
        assert_eq!(parse_key_values("").unwrap(), Json::new());
        assert_eq!(parse_key_values("  ").unwrap(), Json::new());
    }

    #[test]
    fn test_parse_key_values_rejects_duplicates() {
        let err = parse_key_values("a=1 a=2").unwrap_err();
        assert!(err.to_string().contains("duplicate key 'a'"));
    }

    #[test]
    fn test_parse_key_values_rejects_missing_equals() {
        let err = parse_key_values("clean").unwrap_err();
        assert!(err.to_string().contains("expected '=' after key 'clean'"));
    }

    #[test]
    fn test_parse_key_values_rejects_missing_value() {
        let err = parse_key_values("a=").unwrap_err();
        assert!(err.to_string().contains("missing value for key 'a'"));
        let err = parse_key_values("a= 1").unwrap_err();
        assert!(err.to_string().contains("missing value for key 'a'"));
    }

    #[test]
    fn test_parse_key_values_rejects_unbalanced_quotes() {
        let err = parse_key_values(r#"a="open"#).unwrap_err();
        assert!(err.to_string().contains("unbalanced quotes"));
    }

    #[test]
    fn test_parse_key_values_rejects_bad_key() {
        let err = parse_key_values("1a=2").unwrap_err();
        assert!(err.to_string().contains("expected a key"));
    }

    #[test]
    fn test_assignment_prefix_stops_at_command() {
        let (pairs, rest) = parse_assignment_prefix("graph=prod section=desired match all").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("graph".to_string(), "prod".to_string()),
                ("section".to_string(), "desired".to_string())
            ]
        );
        assert_eq!(rest, "match all");
    }

    #[test]
    fn test_assignment_prefix_stringifies_values() {
        let (pairs, rest) = parse_assignment_prefix(r#"test=foo bla="bar" d=true n=3 env"#).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("test".to_string(), "foo".to_string()),
                ("bla".to_string(), "bar".to_string()),
                ("d".to_string(), "true".to_string()),
                ("n".to_string(), "3".to_string())
            ]
        );
        assert_eq!(rest, "env");
    }

    #[test]
    fn test_assignment_prefix_without_assignments() {
        let (pairs, rest) = parse_assignment_prefix("echo [1, 2]").unwrap();
        assert!(pairs.is_empty());
        assert_eq!(rest, "echo [1, 2]");
    }

    #[test]
    fn test_assignment_prefix_malformed_assignment_fails() {
        assert!(parse_assignment_prefix("graph= match all").is_err());
    }
}
