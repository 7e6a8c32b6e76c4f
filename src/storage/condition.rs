//! Typed WHERE-clause conditions for outcome queries

use crate::storage::{StorageError, StorageResult};
use rusqlite::types::Value;

/// Filterable columns of the `crawled_urls` table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlColumn {
    Url,
    Domain,
    Path,
    Depth,
    StatusCode,
    ContentType,
    ResponseTimeMs,
    ErrorMessage,
}

impl UrlColumn {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Domain => "domain",
            Self::Path => "path",
            Self::Depth => "depth",
            Self::StatusCode => "status_code",
            Self::ContentType => "content_type",
            Self::ResponseTimeMs => "response_time_ms",
            Self::ErrorMessage => "error_message",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    IsNull,
    IsNotNull,
}

impl Operator {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    fn takes_value(&self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

/// Bound value for a condition
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<ConditionValue> for Value {
    fn from(value: ConditionValue) -> Self {
        match value {
            ConditionValue::Integer(i) => Value::Integer(i),
            ConditionValue::Real(r) => Value::Real(r),
            ConditionValue::Text(t) => Value::Text(t),
        }
    }
}

/// A single `column operator value` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: UrlColumn,
    pub operator: Operator,
    pub value: Option<ConditionValue>,
}

impl Condition {
    pub fn new(column: UrlColumn, operator: Operator, value: ConditionValue) -> Self {
        Self {
            column,
            operator,
            value: Some(value),
        }
    }

    pub fn is_null(column: UrlColumn) -> Self {
        Self {
            column,
            operator: Operator::IsNull,
            value: None,
        }
    }

    pub fn is_not_null(column: UrlColumn) -> Self {
        Self {
            column,
            operator: Operator::IsNotNull,
            value: None,
        }
    }
}

/// Renders conditions as an `AND`-joined clause with positional parameters
///
/// Returns an empty clause for no conditions. The caller prefixes `WHERE`
/// or `AND` as needed.
pub(crate) fn render_conditions(conditions: &[Condition]) -> StorageResult<(String, Vec<Value>)> {
    let mut clauses = Vec::with_capacity(conditions.len());
    let mut values = Vec::new();

    for condition in conditions {
        let column = condition.column.as_sql();
        let operator = condition.operator.as_sql();

        match (&condition.value, condition.operator.takes_value()) {
            (Some(value), true) => {
                clauses.push(format!("{} {} ?", column, operator));
                values.push(Value::from(value.clone()));
            }
            (None, false) => clauses.push(format!("{} {}", column, operator)),
            (None, true) => {
                return Err(StorageError::InvalidCondition(format!(
                    "{} {} requires a value",
                    column, operator
                )))
            }
            (Some(_), false) => {
                return Err(StorageError::InvalidCondition(format!(
                    "{} {} takes no value",
                    column, operator
                )))
            }
        }
    }

    Ok((clauses.join(" AND "), values))
}
