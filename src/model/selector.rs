//! Metric selector parsing.
//!
//! Grammar:
//!
//! ```text
//! selector := [metric_name] ['{' [matcher {',' matcher} [',']] '}']
//! matcher  := label_name ('=' | '!=' | '=~' | '!~') string
//! string   := '"' ... '"' | '\'' ... '\'' | '`' ... '`'
//! ```
//!
//! A selector must contain at least one matcher that does not match the
//! empty string.

use crate::model::labels::METRIC_NAME;
use crate::model::matcher::{MatchType, Matcher};
use thiserror::Error;

/// Selector parse failure with byte position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at char {position}: {message}")]
pub struct SelectorError {
    pub position: usize,
    pub message: String,
}

/// Parse a metric selector such as `up{job="api"}` into matchers.
pub fn parse_metric_selector(input: &str) -> Result<Vec<Matcher>, SelectorError> {
    let mut parser = Parser { input, pos: 0 };
    let matchers = parser.selector()?;
    parser.skip_whitespace();
    if parser.pos < input.len() {
        return Err(parser.error("unexpected character after selector"));
    }
    if matchers.iter().all(|m| m.matches("")) {
        return Err(SelectorError {
            position: 0,
            message: "vector selector must contain at least one non-empty matcher".to_string(),
        });
    }
    Ok(matchers)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: &str) -> SelectorError {
        SelectorError {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn identifier(&mut self, allow_colon: bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let ok = c.is_ascii_alphabetic()
                || c == '_'
                || (allow_colon && c == ':')
                || (self.pos > start && c.is_ascii_digit());
            if !ok {
                break;
            }
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn selector(&mut self) -> Result<Vec<Matcher>, SelectorError> {
        self.skip_whitespace();
        let name = self.identifier(true);
        let mut matchers = Vec::new();

        self.skip_whitespace();
        if self.eat('{') {
            loop {
                self.skip_whitespace();
                if self.eat('}') {
                    break;
                }
                matchers.push(self.matcher()?);
                self.skip_whitespace();
                if self.eat(',') {
                    continue;
                }
                if self.eat('}') {
                    break;
                }
                return Err(self.error("expected ',' or '}' in label matching"));
            }
        } else if name.is_empty() {
            return Err(self.error("expected metric name or '{'"));
        }

        if !name.is_empty() {
            if matchers.iter().any(|m| m.name == METRIC_NAME) {
                return Err(self.error("metric name must not be set twice"));
            }
            matchers.push(Matcher::equal(METRIC_NAME, name));
        }
        Ok(matchers)
    }

    fn matcher(&mut self) -> Result<Matcher, SelectorError> {
        let name = self.identifier(false);
        if name.is_empty() {
            return Err(self.error("expected label name"));
        }
        self.skip_whitespace();
        let match_type = if self.eat('=') {
            if self.eat('~') {
                MatchType::Regex
            } else {
                MatchType::Equal
            }
        } else if self.eat('!') {
            if self.eat('=') {
                MatchType::NotEqual
            } else if self.eat('~') {
                MatchType::NotRegex
            } else {
                return Err(self.error("expected '=' or '~' after '!'"));
            }
        } else {
            return Err(self.error("expected label matching operator"));
        };
        self.skip_whitespace();
        let start = self.pos;
        let value = self.string()?;
        Matcher::new(match_type, name, value).map_err(|e| SelectorError {
            position: start,
            message: e.to_string(),
        })
    }

    fn string(&mut self) -> Result<String, SelectorError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'' | '`')) => q,
            _ => return Err(self.error("expected quoted string")),
        };
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self
                .peek()
                .ok_or_else(|| self.error("unterminated quoted string"))?;
            self.pos += c.len_utf8();
            if c == quote {
                return Ok(out);
            }
            if c == '\\' && quote != '`' {
                let escaped = self
                    .peek()
                    .ok_or_else(|| self.error("unterminated escape sequence"))?;
                self.pos += escaped.len_utf8();
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\\' | '"' | '\'' => escaped,
                    _ => return Err(self.error("unknown escape sequence")),
                });
            } else {
                out.push(c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_name_only() {
        let matchers = parse_metric_selector("up").unwrap();
        assert_eq!(matchers, vec![Matcher::equal(METRIC_NAME, "up")]);
    }

    #[test]
    fn test_name_and_matchers() {
        let matchers =
            parse_metric_selector(r#"http_requests_total{job="api", code=~"5..", env!='dev',}"#)
                .unwrap();
        assert_eq!(matchers.len(), 4);
        assert_eq!(matchers[0].match_type, MatchType::Equal);
        assert_eq!(matchers[1].match_type, MatchType::Regex);
        assert_eq!(matchers[2].match_type, MatchType::NotEqual);
        assert_eq!(matchers[2].value, "dev");
        assert_eq!(matchers[3].name, METRIC_NAME);
    }

    #[test]
    fn test_braces_only() {
        let matchers = parse_metric_selector(r#"{__name__=~"job:.*"}"#).unwrap();
        assert_eq!(matchers.len(), 1);
    }

    #[test]
    fn test_escapes() {
        let matchers = parse_metric_selector(r#"{path="a\"b\\c"}"#).unwrap();
        assert_eq!(matchers[0].value, "a\"b\\c");
        let matchers = parse_metric_selector(r#"{path=`a\d`}"#).unwrap();
        assert_eq!(matchers[0].value, "a\\d");
    }

    #[test]
    fn test_rejects_empty_matchers() {
        assert!(parse_metric_selector("").is_err());
        assert!(parse_metric_selector("{}").is_err());
        assert!(parse_metric_selector(r#"{job=""}"#).is_err());
        assert!(parse_metric_selector(r#"{job=~".*"}"#).is_err());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse_metric_selector("up{job}").is_err());
        assert!(parse_metric_selector(r#"up{job="api""#).is_err());
        assert!(parse_metric_selector(r#"up{job="api"} extra"#).is_err());
        assert!(parse_metric_selector(r#"up{job=~"("}"#).is_err());
    }
}
