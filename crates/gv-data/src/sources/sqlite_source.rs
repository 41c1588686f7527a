//! SQLite data provider implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};
use tracing::{debug, trace};

use super::{DataProvider, QueryResult, SqlValue};
use crate::query::{SqlParam, Statement};
use crate::DataError;

const FILE_PREFIX: &str = "file:";

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::Integer(value) => ToSqlOutput::from(*value),
            SqlParam::Text(value) => ToSqlOutput::from(value.as_str()),
        })
    }
}

/// Executes statements against SQLite databases keyed by data-source name.
///
/// Connections are either registered up front or opened read-only on first
/// use, resolving the data-source name as a path (an optional `file:` prefix
/// is stripped, relative paths resolve against the root directory).
pub struct SqliteProvider {
    root: Option<PathBuf>,
    connections: RwLock<AHashMap<String, Arc<Mutex<Connection>>>>,
}

impl SqliteProvider {
    pub fn new() -> Self {
        Self {
            root: None,
            connections: RwLock::new(AHashMap::new()),
        }
    }

    /// Resolve relative data-source paths against `root`
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: Some(root.as_ref().to_path_buf()),
            ..Self::new()
        }
    }

    /// Serve `data_source` from an already open connection
    pub fn register(&self, data_source: impl Into<String>, conn: Connection) {
        let data_source = data_source.into();
        debug!(data_source = %data_source, "registered SQLite connection");
        self.connections
            .write()
            .insert(data_source, Arc::new(Mutex::new(conn)));
    }

    /// Names of the data sources with an open connection
    pub fn data_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn resolve_path(&self, data_source: &str) -> PathBuf {
        let path = Path::new(data_source.strip_prefix(FILE_PREFIX).unwrap_or(data_source));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn connection(&self, data_source: &str) -> Result<Arc<Mutex<Connection>>, DataError> {
        if let Some(conn) = self.connections.read().get(data_source) {
            return Ok(conn.clone());
        }

        let path = self.resolve_path(data_source);
        if !path.is_file() {
            return Err(DataError::UnknownDataSource(data_source.to_string()));
        }
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!(data_source, path = %path.display(), "opened SQLite database");

        let mut connections = self.connections.write();
        let conn = connections
            .entry(data_source.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(conn)));
        Ok(conn.clone())
    }

    fn run(conn: &Connection, statement: &Statement) -> Result<Option<QueryResult>, DataError> {
        let mut stmt = conn.prepare(&statement.sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for index in 0..width {
                cells.push(match row.get_ref(index)? {
                    ValueRef::Null => SqlValue::Null,
                    ValueRef::Integer(i) => SqlValue::Integer(i),
                    ValueRef::Real(f) => SqlValue::Real(f),
                    ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
                });
            }
            values.push(cells);
        }

        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(QueryResult { columns, values }))
    }
}

impl Default for SqliteProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataProvider for SqliteProvider {
    async fn exec(
        &self,
        data_source: &str,
        statement: &Statement,
    ) -> Result<Option<QueryResult>, DataError> {
        let conn = self.connection(data_source)?;
        let statement = statement.clone();
        trace!(data_source, sql = %statement.to_inline_sql(), "executing");

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            Self::run(&conn, &statement)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::create_schema_sql;

    fn sample_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&create_schema_sql(&[5])).unwrap();
        conn.execute_batch(
            "INSERT INTO value (location, variable, value, dimension_5) VALUES
                (1, 1, 10.0, 0), (1, 1, 11.5, 1), (2, 1, NULL, 1), (2, 1, 7.0, NULL);",
        )
        .unwrap();
        conn
    }

    #[tokio::test]
    async fn test_exec_binds_parameters() {
        let provider = SqliteProvider::new();
        provider.register("ds1", sample_connection());

        let statement = Statement {
            sql: "SELECT location, value FROM value WHERE variable = ? AND dimension_5 = ?".into(),
            params: vec![SqlParam::Integer(1), SqlParam::Integer(1)],
        };
        let result = provider.exec("ds1", &statement).await.unwrap().unwrap();
        assert_eq!(result.columns, vec!["location", "value"]);
        assert_eq!(
            result.values,
            vec![
                vec![SqlValue::Integer(1), SqlValue::Real(11.5)],
                vec![SqlValue::Integer(2), SqlValue::Null],
            ]
        );
    }

    #[tokio::test]
    async fn test_no_rows_is_none() {
        let provider = SqliteProvider::new();
        provider.register("ds1", sample_connection());
        let statement = Statement::new("SELECT * FROM value WHERE variable = 42");
        assert_eq!(provider.exec("ds1", &statement).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_data_source() {
        let provider = SqliteProvider::with_root(std::env::temp_dir());
        let err = provider
            .exec("does-not-exist.sqlite", &Statement::new("SELECT 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::UnknownDataSource(name) if name == "does-not-exist.sqlite"));
    }

    #[tokio::test]
    async fn test_opens_file_data_source_read_only() {
        let dir = std::env::temp_dir().join(format!("gv-data-sqlite-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ds.sqlite");
        let _ = std::fs::remove_file(&path);
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(&create_schema_sql(&[])).unwrap();
            conn.execute_batch("INSERT INTO location (id) VALUES (3)").unwrap();
        }

        let provider = SqliteProvider::with_root(&dir);
        let result = provider
            .exec("file:ds.sqlite", &Statement::new("SELECT id FROM location"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.values, vec![vec![SqlValue::Integer(3)]]);
        assert_eq!(provider.data_sources(), vec!["file:ds.sqlite"]);

        let write = provider
            .exec("file:ds.sqlite", &Statement::new("DELETE FROM location"))
            .await;
        assert!(write.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
