//! Field name matchers

use regex::Regex;
use thiserror::Error;

/// Uncompiled rule, as written in a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSpec<'a> {
    /// Whole name equals the string
    Exact(&'a str),
    /// Name starts with the string
    Prefix(&'a str),
    /// Regex tested against the name
    Pattern(&'a str),
}

/// Compiled rule ready for evaluation
#[derive(Debug, Clone)]
pub enum FieldMatcher {
    Exact(String),
    Prefix(String),
    Pattern(Regex),
}

impl FieldMatcher {
    /// Compile a rule specification
    pub fn compile(spec: &RuleSpec<'_>) -> Result<Self, ClassifierError> {
        match *spec {
            RuleSpec::Exact(name) => Ok(Self::Exact(name.to_string())),
            RuleSpec::Prefix(prefix) => Ok(Self::Prefix(prefix.to_string())),
            RuleSpec::Pattern(pattern) => Regex::new(pattern)
                .map(Self::Pattern)
                .map_err(|source| ClassifierError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                }),
        }
    }

    /// Check a field name against this rule
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(expected) => name == expected,
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Self::Pattern(regex) => regex.is_match(name),
        }
    }
}

/// Errors raised while compiling classification tables
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
