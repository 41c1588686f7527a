//! Per-data-source variable and dimension metadata

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use gv_core::{AvailableVariablesDict, Location, VariableWithDimensions};

use crate::query::{
    decode_dimensions, decode_locations, decode_variable_dimension_links, decode_variables,
    translate, variable_dimension_links, LocationFilter, MetadataFilter, QueryObject, Statement,
};
use crate::sources::{DataProvider, QueryResult};
use crate::DataError;

type Entry = Arc<OnceCell<Arc<Vec<VariableWithDimensions>>>>;

/// Lazily populated cache of each data source's variables with their
/// dimensions.
///
/// The first access for a data source runs three queries (variables,
/// dimensions, the join table); every later access returns the same `Arc`.
/// Concurrent first accesses share one population. A failed population
/// leaves no entry behind, so the next access retries.
pub struct MetadataCache {
    provider: Arc<dyn DataProvider>,
    entries: Mutex<AHashMap<String, Entry>>,
}

impl MetadataCache {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self {
            provider,
            entries: Mutex::new(AHashMap::new()),
        }
    }

    fn entry(&self, data_source: &str) -> Entry {
        self.entries
            .lock()
            .entry(data_source.to_string())
            .or_default()
            .clone()
    }

    /// Variables of `data_source`, each with its dimensions in join order
    pub async fn available_variables(
        &self,
        data_source: &str,
    ) -> Result<Arc<Vec<VariableWithDimensions>>, DataError> {
        let entry = self.entry(data_source);
        if let Some(variables) = entry.get() {
            trace!(data_source, "metadata cache hit");
            return Ok(variables.clone());
        }
        match entry.get_or_try_init(|| self.populate(data_source)).await {
            Ok(variables) => Ok(variables.clone()),
            Err(err) => {
                self.forget_empty(data_source, &entry);
                Err(err)
            }
        }
    }

    /// Remove `entry` if it is still the unpopulated cell stored for
    /// `data_source`
    fn forget_empty(&self, data_source: &str, entry: &Entry) {
        let mut entries = self.entries.lock();
        let stale = entries
            .get(data_source)
            .is_some_and(|current| Arc::ptr_eq(current, entry) && !current.initialized());
        if stale {
            entries.remove(data_source);
            trace!(data_source, "dropped unpopulated metadata cache entry");
        }
    }

    /// Locations of `data_source`; never cached
    pub async fn available_locations(&self, data_source: &str) -> Result<Vec<Location>, DataError> {
        let query = QueryObject::Locations {
            filter: LocationFilter::default(),
        };
        match self.exec(data_source, &query).await? {
            Some(result) => decode_locations(&result),
            None => Ok(Vec::new()),
        }
    }

    async fn exec(
        &self,
        data_source: &str,
        query: &QueryObject,
    ) -> Result<Option<QueryResult>, DataError> {
        let statement = translate(query).ok_or_else(|| {
            DataError::Other(format!("untranslatable {} query", query.kind()))
        })?;
        self.exec_statement(data_source, &statement).await
    }

    async fn exec_statement(
        &self,
        data_source: &str,
        statement: &Statement,
    ) -> Result<Option<QueryResult>, DataError> {
        self.provider.exec(data_source, statement).await
    }

    async fn populate(&self, data_source: &str) -> Result<Arc<Vec<VariableWithDimensions>>, DataError> {
        debug!(data_source, "populating metadata cache");
        let variables = match self
            .exec(data_source, &QueryObject::Variables { filter: MetadataFilter::default() })
            .await?
        {
            Some(result) => decode_variables(&result)?,
            None => Vec::new(),
        };
        let dimensions = match self
            .exec(data_source, &QueryObject::Dimensions { filter: MetadataFilter::default() })
            .await?
        {
            Some(result) => decode_dimensions(&result)?,
            None => Vec::new(),
        };
        let links = match self
            .exec_statement(data_source, &variable_dimension_links())
            .await?
        {
            Some(result) => decode_variable_dimension_links(&result)?,
            None => Vec::new(),
        };

        let mut resolved: Vec<VariableWithDimensions> =
            variables.into_iter().map(VariableWithDimensions::new).collect();
        for (variable_id, dimension_id) in links {
            let Some(variable) = resolved.iter_mut().find(|v| v.id() == variable_id) else {
                continue;
            };
            if let Some(dimension) = dimensions.iter().find(|d| d.id == dimension_id) {
                variable.dimensions.push(dimension.clone());
            }
        }

        debug!(data_source, variables = resolved.len(), "metadata cache populated");
        Ok(Arc::new(resolved))
    }

    /// Cached variables without triggering population
    pub fn cached(&self, data_source: &str) -> Option<Arc<Vec<VariableWithDimensions>>> {
        self.entries.lock().get(data_source)?.get().cloned()
    }

    /// Drop the entry of one data source; returns whether it was populated
    pub fn invalidate(&self, data_source: &str) -> bool {
        let removed = self.entries.lock().remove(data_source);
        let was_populated = removed.is_some_and(|entry| entry.initialized());
        if was_populated {
            debug!(data_source, "metadata cache entry invalidated");
        }
        was_populated
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        debug!("metadata cache cleared");
    }

    /// Populated entries, in the shape published as `cache.availableVariablesDict`
    pub fn to_available_variables_dict(&self) -> AvailableVariablesDict {
        self.entries
            .lock()
            .iter()
            .filter_map(|(data_source, entry)| Some((data_source.clone(), entry.get()?.clone())))
            .collect()
    }

    /// Adopt entries from a published dictionary without re-querying
    pub fn seed_from(&self, dict: &AvailableVariablesDict) {
        let mut entries = self.entries.lock();
        for (data_source, variables) in dict {
            let entry = entries.entry(data_source.clone()).or_default();
            if entry.set(variables.clone()).is_err() {
                trace!(data_source = %data_source, "metadata cache entry already populated");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaWriter;
    use crate::sources::SqliteProvider;
    use async_trait::async_trait;
    use gv_core::{Dimension, Variable};
    use rusqlite::Connection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        inner: SqliteProvider,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DataProvider for CountingProvider {
        async fn exec(
            &self,
            data_source: &str,
            statement: &Statement,
        ) -> Result<Option<QueryResult>, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.exec(data_source, statement).await
        }
    }

    fn dimension(id: i64, name: &str, size: i64) -> Dimension {
        Dimension {
            id,
            name: name.to_string(),
            size,
            description: None,
            value_labels: None,
        }
    }

    fn provider() -> Arc<CountingProvider> {
        let conn = Connection::open_in_memory().unwrap();
        {
            let time = dimension(5, "time", 3);
            let depth = dimension(6, "depth", 2);
            let mut writer = SchemaWriter::create(&conn, &[time.clone(), depth.clone()]).unwrap();
            let mut temp = VariableWithDimensions::new(Variable {
                id: 1,
                name: "temp".into(),
                unit: Some("K".into()),
                description: None,
            });
            temp.dimensions = vec![depth, time];
            writer.insert_variable(&temp).unwrap();
            writer
                .insert_variable(&VariableWithDimensions::new(Variable {
                    id: 2,
                    name: "area".into(),
                    unit: None,
                    description: None,
                }))
                .unwrap();
        }
        // A join row pointing at a dimension that does not exist is skipped
        conn.execute("INSERT INTO variable_dimension VALUES (2, 99)", [])
            .unwrap();

        let inner = SqliteProvider::new();
        inner.register("ds1", conn);
        Arc::new(CountingProvider {
            inner,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_folds_join_in_row_order() {
        let cache = MetadataCache::new(provider());
        let variables = cache.available_variables("ds1").await.unwrap();

        assert_eq!(variables.len(), 2);
        let names: Vec<&str> = variables[0].dimensions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["depth", "time"]);
        assert!(variables[1].dimensions.is_empty());
    }

    #[tokio::test]
    async fn test_second_access_returns_same_arc() {
        let provider = provider();
        let cache = MetadataCache::new(provider.clone());

        let first = cache.available_variables("ds1").await.unwrap();
        let second = cache.available_variables("ds1").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_first_access_populates_once() {
        let provider = provider();
        let cache = MetadataCache::new(provider.clone());

        let (a, b) = tokio::join!(
            cache.available_variables("ds1"),
            cache.available_variables("ds1")
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_population_retries() {
        let provider = provider();
        let cache = MetadataCache::new(provider.clone());

        assert!(cache.available_variables("missing").await.is_err());
        assert!(cache.cached("missing").is_none());
        assert!(cache.available_variables("missing").await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_data_sources_leave_no_entries() {
        let cache = MetadataCache::new(provider());
        for name in ["missing", "other", "missing"] {
            assert!(cache.available_variables(name).await.is_err());
        }
        assert!(cache.entries.lock().is_empty());

        cache.available_variables("ds1").await.unwrap();
        let names: Vec<String> = cache.entries.lock().keys().cloned().collect();
        assert_eq!(names, vec!["ds1"]);
        assert!(!cache.invalidate("missing"));
    }

    #[tokio::test]
    async fn test_invalidate_and_export() {
        let provider = provider();
        let cache = MetadataCache::new(provider.clone());

        let first = cache.available_variables("ds1").await.unwrap();
        let dict = cache.to_available_variables_dict();
        assert!(Arc::ptr_eq(&dict["ds1"], &first));

        assert!(cache.invalidate("ds1"));
        assert!(cache.cached("ds1").is_none());
        let second = cache.available_variables("ds1").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 6);

        let seeded = MetadataCache::new(provider.clone());
        seeded.seed_from(&dict);
        assert!(Arc::ptr_eq(&seeded.available_variables("ds1").await.unwrap(), &first));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_locations_are_not_cached() {
        let provider = provider();
        let cache = MetadataCache::new(provider.clone());
        assert!(cache.available_locations("ds1").await.unwrap().is_empty());
        assert!(cache.available_locations("ds1").await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
