//! Post-fetch filtering
//!
//! Ad-hoc boolean predicates over arbitrary nested JSON records, written as
//! compact expressions such as `categories:Work,isRead:eq:false`.

pub mod conditions;
pub mod engine;

pub use conditions::{resolve_path, ConditionOperator, FieldSource, FilterCondition};
pub use engine::{parse_filter_expression, parse_strict, FilterEngine};

use serde::{Deserialize, Serialize};

/// Match logic for multiple conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchLogic {
    #[default]
    All, // AND - all conditions must match
    Any, // OR - any condition must match
}

impl MatchLogic {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchLogic::All => "all",
            MatchLogic::Any => "any",
        }
    }

    /// `true` selects AND, `false` selects OR
    pub fn from_match_all(match_all: bool) -> Self {
        if match_all {
            MatchLogic::All
        } else {
            MatchLogic::Any
        }
    }
}

/// Filter expression errors (strict parsing only)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("Malformed filter clause {clause:?}: {reason}")]
    MalformedClause { clause: String, reason: String },
}
