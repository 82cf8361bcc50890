use chrono::{DateTime, Utc};
use sqlx::query::QueryAs;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;

use crate::errors::ApiError;
use crate::models::{Column, ColumnKind};

/// A value coerced to a column's native representation, ready to be bound
/// into a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
}

impl SqlValue {
    pub fn bind_as<'q, O>(
        self,
        query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    ) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
        match self {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Int(value) => query.bind(value),
            SqlValue::Float(value) => query.bind(value),
            SqlValue::Text(value) => query.bind(value),
            SqlValue::DateTime(value) => query.bind(value),
        }
    }
}

/// A conjunctive filter over an entity's declared columns: one
/// `column IN (...)` clause per constrained column, with the coerced values
/// to bind in clause order.
#[derive(Debug, Default)]
pub struct SqlFilter {
    pub clauses: Vec<String>,
    pub binds: Vec<SqlValue>,
}

/// Builds a filter from repeated `column[]=value` query parameters.
///
/// Values supplied for the same column combine with OR (set membership),
/// distinct columns combine with AND, and a column with no values imposes no
/// constraint. Parameter names that match no declared column are ignored;
/// a value that cannot be coerced to the column's kind fails the request.
pub fn build(columns: &[Column], params: &[(String, String)]) -> Result<SqlFilter, ApiError> {
    let mut filter = SqlFilter::default();

    for column in columns {
        let key = format!("{}[]", column.name);
        let values: Vec<&str> = params
            .iter()
            .filter(|(name, _)| *name == key)
            .map(|(_, value)| value.as_str())
            .collect();

        if values.is_empty() {
            continue;
        }

        let placeholders = vec!["?"; values.len()].join(", ");
        filter
            .clauses
            .push(format!("{} IN ({})", column.name, placeholders));

        for value in values {
            filter.binds.push(coerce(column, value)?);
        }
    }

    Ok(filter)
}

fn coerce(column: &Column, value: &str) -> Result<SqlValue, ApiError> {
    match column.kind {
        ColumnKind::Integer => value.parse().map(SqlValue::Int).map_err(|_| {
            ApiError::validation(format!(
                "'{}' is not a valid integer for column '{}'",
                value, column.name
            ))
        }),
        ColumnKind::Float => value.parse().map(SqlValue::Float).map_err(|_| {
            ApiError::validation(format!(
                "'{}' is not a valid number for column '{}'",
                value, column.name
            ))
        }),
        ColumnKind::Text | ColumnKind::DateTime => Ok(SqlValue::Text(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sensor;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_membership_within_one_column() {
        let filter = build(Sensor::columns(), &params(&[("id[]", "1"), ("id[]", "2")])).unwrap();

        assert_eq!(filter.clauses, vec!["id IN (?, ?)"]);
        assert_eq!(filter.binds, vec![SqlValue::Int(1), SqlValue::Int(2)]);
    }

    #[test]
    fn test_columns_combine_with_and() {
        let filter = build(
            Sensor::columns(),
            &params(&[("id[]", "1"), ("name[]", "outdoor")]),
        )
        .unwrap();

        assert_eq!(filter.clauses, vec!["id IN (?)", "name IN (?)"]);
        assert_eq!(
            filter.binds,
            vec![SqlValue::Int(1), SqlValue::Text(String::from("outdoor"))]
        );
    }

    #[test]
    fn test_unknown_parameter_is_ignored() {
        let filter = build(
            Sensor::columns(),
            &params(&[("nonsense[]", "1"), ("plain", "2")]),
        )
        .unwrap();

        assert!(filter.clauses.is_empty());
        assert!(filter.binds.is_empty());
    }

    #[test]
    fn test_non_coercible_value_fails() {
        let result = build(Sensor::columns(), &params(&[("id[]", "abc")]));

        assert!(matches!(result, Err(ApiError::Validation(message)) if message.contains("abc")));
    }
}
