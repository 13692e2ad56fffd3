//! Filter engine - parses filter expressions and applies them to records
//!
//! Expression format: comma-separated clauses, each one of
//! - `field` (existence check)
//! - `field:value` (equality)
//! - `field:operator:value` (value may itself contain colons)

use super::conditions::{ConditionOperator, FieldSource, FilterCondition};
use super::{FilterError, MatchLogic};

/// Filter engine that applies expressions to records
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEngine {
    strict: bool,
}

impl FilterEngine {
    /// Create a permissive filter engine (malformed clauses are skipped)
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// Create a filter engine that rejects malformed clauses
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Parse an expression according to this engine's strictness
    pub fn compile(&self, expression: &str) -> Result<Vec<FilterCondition>, FilterError> {
        if self.strict {
            parse_strict(expression)
        } else {
            Ok(parse_filter_expression(expression))
        }
    }

    /// Test if a record satisfies a condition list.
    /// An empty list matches everything.
    pub fn test_record<S: FieldSource + ?Sized>(
        &self,
        record: &S,
        conditions: &[FilterCondition],
        logic: MatchLogic,
    ) -> bool {
        if conditions.is_empty() {
            return true;
        }

        match logic {
            MatchLogic::All => conditions.iter().all(|cond| cond.matches(record)),
            MatchLogic::Any => conditions.iter().any(|cond| cond.matches(record)),
        }
    }

    /// Filter records by an expression.
    ///
    /// A missing or blank expression, or one without any usable clause,
    /// returns the input unchanged.
    pub fn apply<T: FieldSource>(
        &self,
        records: Vec<T>,
        expression: Option<&str>,
        logic: MatchLogic,
    ) -> Result<Vec<T>, FilterError> {
        let expression = match expression {
            Some(expr) if !expr.trim().is_empty() => expr,
            _ => return Ok(records),
        };

        let conditions = self.compile(expression)?;
        if records.is_empty() || conditions.is_empty() {
            return Ok(records);
        }

        let before = records.len();
        let filtered: Vec<T> = records
            .into_iter()
            .filter(|record| self.test_record(record, &conditions, logic))
            .collect();

        log::debug!(
            "Filter '{}' ({}) kept {} of {} records",
            expression,
            logic.as_str(),
            filtered.len(),
            before
        );

        Ok(filtered)
    }
}

/// Parse an expression, silently skipping malformed clauses
pub fn parse_filter_expression(expression: &str) -> Vec<FilterCondition> {
    expression
        .split(',')
        .filter_map(|clause| match parse_clause(clause, false) {
            Ok(condition) => condition,
            Err(reason) => {
                log::debug!("Ignoring filter clause {:?}: {}", clause.trim(), reason);
                None
            }
        })
        .collect()
}

/// Parse an expression, failing on the first malformed clause
pub fn parse_strict(expression: &str) -> Result<Vec<FilterCondition>, FilterError> {
    let mut conditions = Vec::new();
    for clause in expression.split(',') {
        match parse_clause(clause, true) {
            Ok(Some(condition)) => conditions.push(condition),
            Ok(None) => {}
            Err(reason) => {
                return Err(FilterError::MalformedClause {
                    clause: clause.trim().to_string(),
                    reason,
                })
            }
        }
    }
    Ok(conditions)
}

/// `Ok(None)` for an empty clause. Outside strict mode an unknown operator
/// yields a condition that never matches.
fn parse_clause(clause: &str, strict: bool) -> Result<Option<FilterCondition>, String> {
    let clause = clause.trim();
    if clause.is_empty() {
        return Ok(None);
    }

    // Only the first two colons are significant
    let mut segments = clause.splitn(3, ':');
    let field = segments.next().unwrap_or_default().trim();
    if field.is_empty() {
        return Err("missing field name".to_string());
    }

    let condition = match (segments.next(), segments.next()) {
        (None, _) => FilterCondition::new(field, ConditionOperator::Exists, "true"),
        (Some(value), None) => FilterCondition::new(field, ConditionOperator::Eq, value.trim()),
        (Some(operator), Some(value)) => {
            let operator = match ConditionOperator::parse(operator) {
                Some(operator) => operator,
                None if strict => return Err(format!("unknown operator {:?}", operator.trim())),
                None => {
                    log::debug!("Unknown operator {:?} in clause {:?}", operator.trim(), clause);
                    ConditionOperator::Unknown
                }
            };
            FilterCondition::new(field, operator, value.trim())
        }
    };

    Ok(Some(condition))
}
