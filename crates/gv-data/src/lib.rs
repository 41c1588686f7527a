//! Data access for dimensional datasets stored as SQLite files
//!
//! The value cube is encoded relationally (see [`schema`]); [`query`] turns
//! the fixed query shapes the visualization needs into parameterized SQL,
//! [`sources`] executes it, and [`cache`] keeps the per-data-source variable
//! and dimension metadata.

pub mod cache;
pub mod config;
pub mod query;
pub mod resolve;
pub mod schema;
pub mod service;
pub mod sources;

use thiserror::Error;
use tokio::task::JoinError;

use gv_core::{DimensionId, VariableId};

// Re-exports
pub use cache::MetadataCache;
pub use config::{DataFrom, DataSourceNameDict};
pub use query::{
    translate, DimensionCondition, LocationFilter, MaxMin, MaxMinFilter, MetadataFilter,
    OneOrMany, QueryObject, SqlParam, Statement, ValueFilter, ValueRecord,
};
pub use service::{DataService, QueryResponse};
pub use sources::{DataProvider, QueryResult, SqlValue, SqliteProvider};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid JSON in column `{column}`: {source}")]
    Json {
        column: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing column `{0}` in query result")]
    MissingColumn(String),

    #[error("Unexpected value in column `{column}`: {value}")]
    InvalidValue { column: String, value: String },

    #[error("Unknown data source: {0}")]
    UnknownDataSource(String),

    #[error("Variable {variable} expects coordinates for dimensions {expected:?}, got {actual:?}")]
    IncompleteCoordinates {
        variable: VariableId,
        expected: Vec<DimensionId>,
        actual: Vec<DimensionId>,
    },

    #[error("Join error: {0}")]
    Join(#[from] JoinError),

    #[error("Other error: {0}")]
    Other(String),
}
