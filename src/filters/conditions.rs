//! Filter condition matching logic

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Single parsed filter condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Dot-separated path into the record
    pub field: String,
    pub operator: ConditionOperator,
    pub value: String,
}

/// Comparison operators for conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Contains,
    StartsWith,
    EndsWith,
    Gt,
    Lt,
    Exists,
    /// Unrecognized operator name; never matches
    Unknown,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Eq => "eq",
            ConditionOperator::Ne => "ne",
            ConditionOperator::Contains => "contains",
            ConditionOperator::StartsWith => "startswith",
            ConditionOperator::EndsWith => "endswith",
            ConditionOperator::Gt => "gt",
            ConditionOperator::Lt => "lt",
            ConditionOperator::Exists => "exists",
            ConditionOperator::Unknown => "unknown",
        }
    }

    /// Parse an operator name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "eq" => Some(ConditionOperator::Eq),
            "ne" => Some(ConditionOperator::Ne),
            "contains" => Some(ConditionOperator::Contains),
            "startswith" => Some(ConditionOperator::StartsWith),
            "endswith" => Some(ConditionOperator::EndsWith),
            "gt" => Some(ConditionOperator::Gt),
            "lt" => Some(ConditionOperator::Lt),
            "exists" => Some(ConditionOperator::Exists),
            _ => None,
        }
    }
}

/// Anything a dot-separated field path can be resolved against
pub trait FieldSource {
    fn field(&self, path: &str) -> Option<&Value>;
}

impl FieldSource for Value {
    fn field(&self, path: &str) -> Option<&Value> {
        resolve_path(self, path)
    }
}

impl FieldSource for Map<String, Value> {
    fn field(&self, path: &str) -> Option<&Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let value = self.get(head).filter(|v| !v.is_null())?;
        match rest {
            Some(rest) => resolve_path(value, rest),
            None => Some(value),
        }
    }
}

impl<T: FieldSource + ?Sized> FieldSource for &T {
    fn field(&self, path: &str) -> Option<&Value> {
        (**self).field(path)
    }
}

/// Walk `path` through nested objects.
///
/// Returns `None` when a segment is missing, an intermediate value is not an
/// object, or the leaf is `null`.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Test if this condition matches the given record
    pub fn matches<S: FieldSource + ?Sized>(&self, source: &S) -> bool {
        if self.operator == ConditionOperator::Unknown {
            return false;
        }

        let actual = source.field(&self.field);

        if self.operator == ConditionOperator::Exists {
            let present = actual.is_some_and(is_non_empty);
            return if is_negation(&self.value) { !present } else { present };
        }

        // Absent fields only satisfy "not equal"
        let Some(actual) = actual else {
            return self.operator == ConditionOperator::Ne;
        };

        let search_value = self.value.to_lowercase();

        if let Value::Array(items) = actual {
            let mut texts = items.iter().map(|item| text_of(item).to_lowercase());
            return match self.operator {
                ConditionOperator::Eq => texts.any(|t| t == search_value),
                ConditionOperator::Ne => !texts.any(|t| t == search_value),
                ConditionOperator::Contains => texts.any(|t| t.contains(&search_value)),
                _ => false,
            };
        }

        let field_value = text_of(actual).to_lowercase();

        match self.operator {
            ConditionOperator::Eq => field_value == search_value,
            ConditionOperator::Ne => field_value != search_value,
            ConditionOperator::Contains => field_value.contains(&search_value),
            ConditionOperator::StartsWith => field_value.starts_with(&search_value),
            ConditionOperator::EndsWith => field_value.ends_with(&search_value),
            ConditionOperator::Gt => compare(&field_value, &search_value) == Some(Ordering::Greater),
            ConditionOperator::Lt => compare(&field_value, &search_value) == Some(Ordering::Less),
            ConditionOperator::Exists => is_non_empty(actual) != is_negation(&self.value),
            ConditionOperator::Unknown => false,
        }
    }
}

/// Numeric comparison when both sides parse, lexicographic otherwise
/// (ISO-8601 timestamps order correctly as text).
fn compare(actual: &str, expected: &str) -> Option<Ordering> {
    match (actual.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b),
        _ => Some(actual.cmp(expected)),
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn is_negation(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "false" | "0" | "no")
}

fn text_of(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}
