//! Comparison operators used by key/value constraints.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use rust_decimal::{Decimal, prelude::FromPrimitive};

use crate::error::QueryError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    #[default]
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    /// Record value is one of the expected array's members
    In,
    /// SQL `LIKE` with `%` and `_` wildcards, case-insensitive
    Like,
    /// Regular expression match
    Matches,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::LessEqual => "<=",
            Operator::GreaterEqual => ">=",
            Operator::In => "in",
            Operator::Like => "like",
            Operator::Matches => "regexp",
        }
    }

    /// Checks that a literal operand is usable with this operator.
    pub fn validate(&self, expected: &Value) -> Result<(), QueryError> {
        self.compile(expected).map(|_| ())
    }

    /// Compiles the pattern of a `like` or `regexp` operand. Other operators
    /// and non-string operands have none.
    pub fn compile(&self, expected: &Value) -> Result<Option<Pattern>, QueryError> {
        match (self, expected) {
            (Operator::Like, Value::String(p)) => like_regex(p).map(|re| Some(Pattern(re))),
            (Operator::Matches, Value::String(p)) => compile(p).map(|re| Some(Pattern(re))),
            _ => Ok(None),
        }
    }

    /// Like [`Operator::test`], reusing `pattern` when the operand was
    /// compiled ahead of time.
    pub fn test_compiled(&self, actual: &Value, expected: &Value, pattern: Option<&Pattern>) -> bool {
        match (self, pattern) {
            (Operator::Like | Operator::Matches, Some(pattern)) => match actual {
                Value::String(s) => pattern.is_match(s),
                _ => false,
            },
            _ => self.test(actual, expected),
        }
    }

    /// Tests a record's field value against the expected operand.
    ///
    /// A missing field is passed as [`Value::Null`].
    pub fn test(&self, actual: &Value, expected: &Value) -> bool {
        match self {
            Operator::Equal => loose_eq(actual, expected),
            Operator::NotEqual => !loose_eq(actual, expected),
            Operator::LessThan => compare(actual, expected) == Some(Ordering::Less),
            Operator::GreaterThan => compare(actual, expected) == Some(Ordering::Greater),
            Operator::LessEqual => matches!(
                compare(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::GreaterEqual => matches!(
                compare(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::In => match expected {
                Value::Array(items) => items.iter().any(|item| loose_eq(actual, item)),
                other => loose_eq(actual, other),
            },
            Operator::Like => match (actual, expected) {
                (Value::String(s), Value::String(p)) => pattern_match(like_regex(p), s),
                _ => false,
            },
            Operator::Matches => match (actual, expected) {
                (Value::String(s), Value::String(p)) => pattern_match(compile(p), s),
                _ => false,
            },
        }
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Ok(Operator::Equal),
            "!=" | "<>" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::LessThan),
            ">" => Ok(Operator::GreaterThan),
            "<=" => Ok(Operator::LessEqual),
            ">=" => Ok(Operator::GreaterEqual),
            "in" => Ok(Operator::In),
            "like" => Ok(Operator::Like),
            "regexp" | "matches" => Ok(Operator::Matches),
            _ => Err(QueryError::UnknownOperator(s.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled `like` or `regexp` operand.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn is_match(&self, subject: &str) -> bool {
        self.0.is_match(subject)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

fn pattern_match(re: Result<Regex, QueryError>, subject: &str) -> bool {
    match re {
        Ok(re) => re.is_match(subject),
        Err(e) => {
            // only reachable through variables, literals are compiled on construction
            tracing::warn!(error = %e, "pattern failed to compile during evaluation");
            false
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, QueryError> {
    Regex::new(pattern).map_err(|e| QueryError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn like_regex(pattern: &str) -> Result<Regex, QueryError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push_str("(?is)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    compile(&re)
}

fn to_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Integer(n) => Some(Decimal::from(*n)),
        Value::Float(n) => Decimal::from_f64(*n),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            compare(a, b) == Some(Ordering::Equal)
        }
        _ => a == b,
    }
}

/// Orders numbers (exactly, across integer and float) and strings; other
/// combinations are unordered.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Integer(_), Value::Float(_)) | (Value::Float(_), Value::Integer(_)) => {
            match (to_decimal(a), to_decimal(b)) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.as_float()?.partial_cmp(&b.as_float()?),
            }
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Boolean(x), Value::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
