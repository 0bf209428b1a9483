//! Label matchers.

use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Matcher operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `=~`
    Regex,
    /// `!~`
    NotRegex,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Regex => "=~",
            Self::NotRegex => "!~",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matcher construction failure.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("invalid regular expression {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A single label constraint. Regular expressions are fully anchored.
#[derive(Debug, Clone)]
pub struct Matcher {
    pub match_type: MatchType,
    pub name: String,
    pub value: String,
    regex: Option<Regex>,
}

impl Matcher {
    /// Create a matcher, compiling the pattern for regex operators.
    pub fn new(
        match_type: MatchType,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, MatcherError> {
        let value = value.into();
        let regex = match match_type {
            MatchType::Regex | MatchType::NotRegex => {
                let anchored = format!("^(?:{})$", value);
                Some(Regex::new(&anchored).map_err(|source| MatcherError::InvalidRegex {
                    pattern: value.clone(),
                    source,
                })?)
            }
            MatchType::Equal | MatchType::NotEqual => None,
        };
        Ok(Self {
            match_type,
            name: name.into(),
            value,
            regex,
        })
    }

    /// Equality matcher; never fails.
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            match_type: MatchType::Equal,
            name: name.into(),
            value: value.into(),
            regex: None,
        }
    }

    /// Whether a label value (empty when the label is absent) satisfies
    /// this matcher.
    pub fn matches(&self, value: &str) -> bool {
        match self.match_type {
            MatchType::Equal => self.value == value,
            MatchType::NotEqual => self.value != value,
            MatchType::Regex => self.regex.as_ref().is_some_and(|re| re.is_match(value)),
            MatchType::NotRegex => !self.regex.as_ref().is_some_and(|re| re.is_match(value)),
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.match_type == other.match_type && self.name == other.name && self.value == other.value
    }
}

impl Eq for Matcher {}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.match_type, self.value)
    }
}

/// Whether a label set satisfies every matcher.
pub fn matches_all(matchers: &[Matcher], labels: &crate::model::labels::Labels) -> bool {
    matchers
        .iter()
        .all(|m| m.matches(labels.value_or_empty(&m.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::labels::Labels;

    #[test]
    fn test_regex_is_anchored() {
        let m = Matcher::new(MatchType::Regex, "job", "api|web").unwrap();
        assert!(m.matches("api"));
        assert!(!m.matches("api-server"));
        let m = Matcher::new(MatchType::NotRegex, "job", "a.*").unwrap();
        assert!(!m.matches("api"));
        assert!(m.matches("web"));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(Matcher::new(MatchType::Regex, "job", "(").is_err());
    }

    #[test]
    fn test_absent_label_matches_empty() {
        let labels = Labels::from_pairs([("job", "api")]);
        assert!(matches_all(&[Matcher::equal("dc", "")], &labels));
        assert!(!matches_all(&[Matcher::equal("dc", "east")], &labels));
    }

    #[test]
    fn test_display() {
        let m = Matcher::new(MatchType::NotEqual, "job", "a\"b").unwrap();
        assert_eq!(m.to_string(), r#"job!="a\"b""#);
    }
}
