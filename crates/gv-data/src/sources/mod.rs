//! Statement execution against data sources

pub mod sqlite_source;

pub use sqlite_source::SqliteProvider;

use async_trait::async_trait;
use serde::Serialize;

use crate::query::Statement;
use crate::DataError;

/// One cell of a query result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric value; integers widen to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

/// Rows returned by a provider, column-named
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub values: Vec<Vec<SqlValue>>,
}

impl QueryResult {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The SQL execution capability the query layer runs on.
///
/// `None` means the statement produced no result set, which callers treat
/// the same as an empty one. Failures propagate unchanged.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn exec(
        &self,
        data_source: &str,
        statement: &Statement,
    ) -> Result<Option<QueryResult>, DataError>;
}
