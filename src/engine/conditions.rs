use crate::config::TriggerSpec;
use crate::Result;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use super::context::{coerce_to_string, HookContext};
use super::functions::FunctionRegistry;

/// Result of trigger evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionResult {
    /// Trigger matched
    Match,
    /// Trigger did not match
    NoMatch,
    /// Trigger could not be evaluated (treat as no match)
    Error(String),
}

impl ConditionResult {
    /// Check if this result represents a match
    pub fn is_match(&self) -> bool {
        matches!(self, ConditionResult::Match)
    }

    /// Check if this result represents an error
    pub fn is_error(&self) -> bool {
        matches!(self, ConditionResult::Error(_))
    }

    fn from_bool(matched: bool) -> Self {
        if matched {
            ConditionResult::Match
        } else {
            ConditionResult::NoMatch
        }
    }

    /// Flip Match/NoMatch when `negate` is set; errors are preserved
    fn negated(self, negate: bool) -> Self {
        match (self, negate) {
            (ConditionResult::Match, true) => ConditionResult::NoMatch,
            (ConditionResult::NoMatch, true) => ConditionResult::Match,
            (result, _) => result,
        }
    }
}

/// Comparison operators for `condition` triggers
#[derive(Debug, Clone)]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Exists,
    Matches(Regex),
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Kept so evaluation can report it; never matches
    Unknown(String),
}

impl ConditionOperator {
    /// Parse an operator name; `matches` compiles its regex from `value`
    pub fn parse(name: &str, value: Option<&Value>) -> Result<Self> {
        let operator = match name.trim().to_ascii_lowercase().as_str() {
            "equals" | "eq" | "==" => Self::Equals,
            "not_equals" | "ne" | "!=" => Self::NotEquals,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "starts_with" | "startswith" => Self::StartsWith,
            "ends_with" | "endswith" => Self::EndsWith,
            "exists" => Self::Exists,
            "matches" | "regex" => {
                let pattern = value.and_then(coerce_to_string).unwrap_or_default();
                Self::Matches(Regex::new(&pattern)?)
            }
            "in" => Self::In,
            "gt" | ">" => Self::Gt,
            "gte" | ">=" => Self::Gte,
            "lt" | "<" => Self::Lt,
            "lte" | "<=" => Self::Lte,
            other => Self::Unknown(other.to_string()),
        };
        Ok(operator)
    }
}

/// A trigger compiled from its `TriggerSpec`, regexes built once
#[derive(Debug, Clone)]
pub enum Trigger {
    Pattern {
        field: String,
        regex: Regex,
        negate: bool,
    },
    Condition {
        field: String,
        operator: ConditionOperator,
        value: Option<Value>,
        negate: bool,
    },
    Function {
        name: String,
        negate: bool,
    },
}

impl Trigger {
    /// Compile a trigger; fails only on an invalid regex
    pub fn compile(spec: &TriggerSpec) -> Result<Self> {
        let trigger = match spec {
            TriggerSpec::Pattern {
                field,
                pattern,
                flags,
                negate,
            } => Trigger::Pattern {
                field: field.clone(),
                regex: build_regex(pattern, flags)?,
                negate: *negate,
            },
            TriggerSpec::Condition {
                field,
                operator,
                value,
                negate,
            } => Trigger::Condition {
                field: field.clone(),
                operator: ConditionOperator::parse(operator, value.as_ref())?,
                value: value.clone(),
                negate: *negate,
            },
            TriggerSpec::Function { function, negate } => Trigger::Function {
                name: function.clone(),
                negate: *negate,
            },
        };
        Ok(trigger)
    }

    /// Evaluate against a context
    pub fn evaluate(&self, ctx: &HookContext, functions: &FunctionRegistry) -> ConditionResult {
        match self {
            Trigger::Pattern {
                field,
                regex,
                negate,
            } => match ctx.get_str(field) {
                // A missing field never matches, negated or not
                None => ConditionResult::NoMatch,
                Some(text) => ConditionResult::from_bool(regex.is_match(&text)).negated(*negate),
            },
            Trigger::Condition {
                field,
                operator,
                value,
                negate,
            } => evaluate_condition(ctx, field, operator, value.as_ref()).negated(*negate),
            Trigger::Function { name, negate } => match functions.call_trigger(name, ctx) {
                Some(matched) => ConditionResult::from_bool(matched).negated(*negate),
                None => ConditionResult::Error(format!("Unknown trigger function '{}'", name)),
            },
        }
    }
}

/// AND over all triggers; an empty list never matches
pub fn evaluate_all(
    triggers: &[Trigger],
    ctx: &HookContext,
    functions: &FunctionRegistry,
) -> ConditionResult {
    if triggers.is_empty() {
        return ConditionResult::NoMatch;
    }

    for trigger in triggers {
        match trigger.evaluate(ctx, functions) {
            ConditionResult::Match => continue,
            ConditionResult::Error(e) => {
                warn!("Trigger evaluation failed: {}", e);
                return ConditionResult::Error(e);
            }
            ConditionResult::NoMatch => {
                debug!("Trigger did not match: {:?}", trigger);
                return ConditionResult::NoMatch;
            }
        }
    }
    ConditionResult::Match
}

/// Build a regex honouring `i`, `m`, `s` and `x` style flags
pub fn build_regex(pattern: &str, flags: &[String]) -> Result<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags {
        let normalized = flag.trim().to_ascii_lowercase();
        match normalized.trim_start_matches("re.") {
            "i" | "ignorecase" | "ignore_case" | "case_insensitive" => {
                builder.case_insensitive(true);
            }
            "m" | "multiline" => {
                builder.multi_line(true);
            }
            "s" | "dotall" => {
                builder.dot_matches_new_line(true);
            }
            "x" | "verbose" => {
                builder.ignore_whitespace(true);
            }
            other => warn!("Ignoring unknown regex flag '{}'", other),
        }
    }
    Ok(builder.build()?)
}

fn evaluate_condition(
    ctx: &HookContext,
    field: &str,
    operator: &ConditionOperator,
    expected: Option<&Value>,
) -> ConditionResult {
    if let ConditionOperator::Unknown(name) = operator {
        return ConditionResult::Error(format!("Unknown operator '{}'", name));
    }
    if let ConditionOperator::Exists = operator {
        return ConditionResult::from_bool(ctx.contains(field));
    }

    let actual = match ctx.get(field) {
        Some(value) if !value.is_null() => value,
        _ => return ConditionResult::NoMatch,
    };
    let expected = expected.unwrap_or(&Value::Null);

    let matched = match operator {
        ConditionOperator::Equals => values_equal(actual, expected),
        ConditionOperator::NotEquals => !values_equal(actual, expected),
        ConditionOperator::Contains => value_contains(actual, expected),
        ConditionOperator::NotContains => !value_contains(actual, expected),
        ConditionOperator::StartsWith => string_pair(actual, expected)
            .is_some_and(|(actual, expected)| actual.starts_with(&expected)),
        ConditionOperator::EndsWith => string_pair(actual, expected)
            .is_some_and(|(actual, expected)| actual.ends_with(&expected)),
        ConditionOperator::Matches(regex) => {
            coerce_to_string(actual).is_some_and(|text| regex.is_match(&text))
        }
        ConditionOperator::In => match expected {
            Value::Array(items) => items.iter().any(|item| values_equal(actual, item)),
            _ => {
                return ConditionResult::Error(format!(
                    "Operator 'in' on '{}' requires a list value",
                    field
                ))
            }
        },
        ConditionOperator::Gt => compare_numbers(actual, expected, |a, b| a > b),
        ConditionOperator::Gte => compare_numbers(actual, expected, |a, b| a >= b),
        ConditionOperator::Lt => compare_numbers(actual, expected, |a, b| a < b),
        ConditionOperator::Lte => compare_numbers(actual, expected, |a, b| a <= b),
        ConditionOperator::Exists | ConditionOperator::Unknown(_) => false,
    };
    ConditionResult::from_bool(matched)
}

/// Same-type values compare directly, everything else by coerced string
fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(_), Value::String(_))
        | (Value::Bool(_), Value::Bool(_))
        | (Value::Array(_), Value::Array(_))
        | (Value::Object(_), Value::Object(_)) => actual == expected,
        _ => match (coerce_to_string(actual), coerce_to_string(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn value_contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => string_pair(actual, expected).is_some_and(|(actual, expected)| actual.contains(&expected)),
    }
}

fn string_pair(actual: &Value, expected: &Value) -> Option<(String, String)> {
    Some((coerce_to_string(actual)?, coerce_to_string(expected)?))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare_numbers(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}
