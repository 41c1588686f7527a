//! Query execution on top of a data provider

use std::sync::Arc;

use ahash::AHashMap;
use serde::Serialize;
use tracing::{debug, warn};

use gv_core::{
    Dimension, DimensionIdAndValueDict, Location, Value, Variable, VariableId,
    VariableWithDimensions,
};

use crate::cache::MetadataCache;
use crate::query::{
    decode_dimensions, decode_locations, decode_max_min, decode_value_records, decode_variables,
    translate, LocationFilter, MaxMin, MaxMinFilter, MetadataFilter, QueryObject, ValueFilter,
    ValueRecord,
};
use crate::sources::{DataProvider, QueryResult};
use crate::DataError;

/// Decoded result of a [`QueryObject`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Locations(Vec<Location>),
    Dimensions(Vec<Dimension>),
    Variables(Vec<Variable>),
    MaxMinValue(MaxMin),
    Values(Vec<ValueRecord>),
}

/// Entry point for consumers: translates, executes and decodes queries and
/// owns the metadata cache of every data source it serves.
pub struct DataService {
    provider: Arc<dyn DataProvider>,
    cache: MetadataCache,
}

impl DataService {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self {
            cache: MetadataCache::new(provider.clone()),
            provider,
        }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub async fn available_variables(
        &self,
        data_source: &str,
    ) -> Result<Arc<Vec<VariableWithDimensions>>, DataError> {
        self.cache.available_variables(data_source).await
    }

    async fn exec(
        &self,
        data_source: &str,
        query: &QueryObject,
    ) -> Result<Option<QueryResult>, DataError> {
        let Some(statement) = translate(query) else {
            return Ok(None);
        };
        Ok(Some(
            self.provider
                .exec(data_source, &statement)
                .await?
                .unwrap_or_default(),
        ))
    }

    /// Run any query object; `None` when it cannot be executed
    pub async fn query(
        &self,
        data_source: &str,
        query: &QueryObject,
    ) -> Result<Option<QueryResponse>, DataError> {
        let response = match query {
            QueryObject::Locations { filter } => {
                QueryResponse::Locations(self.locations(data_source, filter).await?)
            }
            QueryObject::Dimensions { filter } => {
                QueryResponse::Dimensions(self.dimensions(data_source, filter).await?)
            }
            QueryObject::Variables { filter } => {
                QueryResponse::Variables(self.variables(data_source, filter).await?)
            }
            QueryObject::MaxMinValue { filter } => match self.max_min_value(data_source, filter).await? {
                Some(max_min) => QueryResponse::MaxMinValue(max_min),
                None => return Ok(None),
            },
            QueryObject::Values { filter } => match self.value_records(data_source, filter).await? {
                Some(records) => QueryResponse::Values(records),
                None => return Ok(None),
            },
        };
        Ok(Some(response))
    }

    pub async fn locations(
        &self,
        data_source: &str,
        filter: &LocationFilter,
    ) -> Result<Vec<Location>, DataError> {
        let query = QueryObject::Locations {
            filter: filter.clone(),
        };
        match self.exec(data_source, &query).await? {
            Some(result) => decode_locations(&result),
            None => Ok(Vec::new()),
        }
    }

    pub async fn dimensions(
        &self,
        data_source: &str,
        filter: &MetadataFilter,
    ) -> Result<Vec<Dimension>, DataError> {
        let query = QueryObject::Dimensions {
            filter: filter.clone(),
        };
        match self.exec(data_source, &query).await? {
            Some(result) => decode_dimensions(&result),
            None => Ok(Vec::new()),
        }
    }

    pub async fn variables(
        &self,
        data_source: &str,
        filter: &MetadataFilter,
    ) -> Result<Vec<Variable>, DataError> {
        let query = QueryObject::Variables {
            filter: filter.clone(),
        };
        match self.exec(data_source, &query).await? {
            Some(result) => decode_variables(&result),
            None => Ok(Vec::new()),
        }
    }

    /// Extent of the matching values; `None` for dimension-scoped filters
    pub async fn max_min_value(
        &self,
        data_source: &str,
        filter: &MaxMinFilter,
    ) -> Result<Option<MaxMin>, DataError> {
        let query = QueryObject::MaxMinValue {
            filter: filter.clone(),
        };
        self.exec(data_source, &query)
            .await?
            .map(|result| decode_max_min(&result))
            .transpose()
    }

    pub async fn max_min_for_variable(
        &self,
        data_source: &str,
        variable: VariableId,
    ) -> Result<Option<MaxMin>, DataError> {
        self.max_min_value(data_source, &MaxMinFilter::for_variable(variable))
            .await
    }

    /// Raw value rows; `None` when the filter names no variable.
    ///
    /// When the variables' metadata is already cached, a filter whose
    /// coordinates all lie outside a dimension's `0..size` returns an empty
    /// result without touching the provider, and each record keeps only
    /// the coordinates of its own variable's dimensions.
    pub async fn value_records(
        &self,
        data_source: &str,
        filter: &ValueFilter,
    ) -> Result<Option<Vec<ValueRecord>>, DataError> {
        let cached = self.cache.cached(data_source);
        let variable_ids = filter.variables();
        let known: Vec<&VariableWithDimensions> = cached
            .iter()
            .flat_map(|variables| variables.iter())
            .filter(|v| variable_ids.contains(&v.id()))
            .collect();

        if out_of_range(filter, &known) {
            debug!(data_source, "value filter is out of range, skipping query");
            return Ok(Some(Vec::new()));
        }

        let query = QueryObject::Values {
            filter: filter.clone(),
        };
        let Some(result) = self.exec(data_source, &query).await? else {
            return Ok(None);
        };
        let records = decode_value_records(&result)?;
        if known.is_empty() {
            return Ok(Some(records));
        }

        let dimension_ids: AHashMap<VariableId, Vec<i64>> = known
            .iter()
            .map(|v| (v.id(), v.dimensions.iter().map(|d| d.id).collect()))
            .collect();
        Ok(Some(
            records
                .into_iter()
                .map(|record| match dimension_ids.get(&record.variable_id) {
                    Some(ids) => record.restricted_to(ids),
                    None => record,
                })
                .collect(),
        ))
    }

    /// Value rows with their location and variable resolved.
    ///
    /// Rows whose location or variable no longer exists are dropped.
    pub async fn values(
        &self,
        data_source: &str,
        filter: &ValueFilter,
    ) -> Result<Option<Vec<Value>>, DataError> {
        let variables = self.cache.available_variables(data_source).await?;
        let Some(records) = self.value_records(data_source, filter).await? else {
            return Ok(None);
        };
        if records.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let mut location_ids: Vec<i64> = records.iter().map(|r| r.location_id).collect();
        location_ids.sort_unstable();
        location_ids.dedup();
        let locations: AHashMap<i64, Location> = self
            .locations(
                data_source,
                &LocationFilter {
                    ids: Some(location_ids),
                },
            )
            .await?
            .into_iter()
            .map(|location| (location.id, location))
            .collect();

        let total = records.len();
        let values: Vec<Value> = records
            .into_iter()
            .filter_map(|record| {
                let location = locations.get(&record.location_id)?.clone();
                let variable = variables.iter().find(|v| v.id() == record.variable_id)?;
                Some(Value {
                    location,
                    variable: variable.variable.clone(),
                    value: record.value,
                    dimension_id_and_value_dict: record
                        .dimension_id_and_value_dict
                        .into_iter()
                        .filter(|(id, _)| variable.dimension(*id).is_some())
                        .collect(),
                })
            })
            .collect();
        if values.len() < total {
            warn!(
                data_source,
                dropped = total - values.len(),
                "value rows reference unknown locations or variables"
            );
        }
        Ok(Some(values))
    }

    /// Every non-null value of a variable at the given coordinates
    pub async fn value_population(
        &self,
        data_source: &str,
        variable: VariableId,
        coordinates: &DimensionIdAndValueDict,
    ) -> Result<Vec<f64>, DataError> {
        let filter = ValueFilter::for_variable(variable).with_coordinates(coordinates);
        let records = self
            .value_records(data_source, &filter)
            .await?
            .unwrap_or_default();
        Ok(records
            .into_iter()
            .filter_map(|record| record.value)
            .filter(|value| value.is_finite())
            .collect())
    }
}

/// Whether some dimension condition can only select coordinates outside
/// the dimension's valid range
fn out_of_range(filter: &ValueFilter, variables: &[&VariableWithDimensions]) -> bool {
    let Some(conditions) = &filter.dimension_id_and_value_dict else {
        return false;
    };
    conditions.iter().any(|(dimension_id, condition)| {
        let Some(coordinates) = condition.coordinates() else {
            return false;
        };
        variables.iter().any(|variable| {
            variable
                .dimension(*dimension_id)
                .is_some_and(|dimension| coordinates.iter().all(|c| !dimension.contains(*c)))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::DimensionCondition;
    use crate::schema::SchemaWriter;
    use crate::sources::SqliteProvider;
    use crate::Statement;
    use async_trait::async_trait;
    use gv_core::{Dimension, Variable};
    use parking_lot::Mutex;
    use rusqlite::Connection;

    /// Records every statement it forwards
    struct RecordingProvider {
        inner: SqliteProvider,
        statements: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DataProvider for RecordingProvider {
        async fn exec(
            &self,
            data_source: &str,
            statement: &Statement,
        ) -> Result<Option<QueryResult>, DataError> {
            self.statements.lock().push(statement.to_inline_sql());
            self.inner.exec(data_source, statement).await
        }
    }

    fn time() -> Dimension {
        Dimension {
            id: 5,
            name: "time".to_string(),
            size: 3,
            description: None,
            value_labels: None,
        }
    }

    fn depth() -> Dimension {
        Dimension {
            id: 6,
            name: "depth".to_string(),
            size: 2,
            description: None,
            value_labels: None,
        }
    }

    fn dataset() -> Arc<RecordingProvider> {
        let conn = Connection::open_in_memory().unwrap();
        {
            let mut writer = SchemaWriter::create(&conn, &[time(), depth()]).unwrap();
            for id in 1..=2 {
                writer
                    .insert_location(&Location {
                        id,
                        geometry: serde_json::json!({"type": "Point", "coordinates": [id, 0]}),
                        metadata: serde_json::json!({"name": format!("station {id}")}),
                    })
                    .unwrap();
            }
            let mut temp = VariableWithDimensions::new(Variable {
                id: 1,
                name: "temp".into(),
                unit: None,
                description: None,
            });
            temp.dimensions.push(time());
            writer.insert_variable(&temp).unwrap();
            let mut flow = VariableWithDimensions::new(Variable {
                id: 2,
                name: "flow".into(),
                unit: None,
                description: None,
            });
            flow.dimensions.push(depth());
            writer.insert_variable(&flow).unwrap();

            for t in 0..3 {
                writer
                    .insert_value(1, 1, Some(t as f64), &DimensionIdAndValueDict::from([(5, Some(t))]))
                    .unwrap();
                writer
                    .insert_value(2, 1, Some(10.0 + t as f64), &DimensionIdAndValueDict::from([(5, Some(t))]))
                    .unwrap();
            }
            writer
                .insert_value(1, 1, None, &DimensionIdAndValueDict::from([(5, None)]))
                .unwrap();
            writer
                .insert_value(1, 2, Some(4.0), &DimensionIdAndValueDict::from([(6, Some(1))]))
                .unwrap();
        }
        let inner = SqliteProvider::new();
        inner.register("ds1", conn);
        Arc::new(RecordingProvider {
            inner,
            statements: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_values_query_scenario() {
        let provider = dataset();
        let service = DataService::new(provider.clone());

        let filter = ValueFilter::for_variable(1_i64).with_condition(5, DimensionCondition::at(1));
        let records = service.value_records("ds1", &filter).await.unwrap().unwrap();

        assert_eq!(
            provider.statements.lock().last().map(String::as_str),
            Some("SELECT * FROM value WHERE variable = 1 AND dimension_5 = 1")
        );
        let mut values: Vec<(i64, Option<f64>)> =
            records.iter().map(|r| (r.location_id, r.value)).collect();
        values.sort_by_key(|(location, _)| *location);
        assert_eq!(values, vec![(1, Some(1.0)), (2, Some(11.0))]);
    }

    #[tokio::test]
    async fn test_null_coordinates_round_trip() {
        let service = DataService::new(dataset());
        let filter = ValueFilter::for_variable(1_i64).with_condition(5, DimensionCondition::IsNull);
        let records = service.value_records("ds1", &filter).await.unwrap().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, None);
        assert_eq!(records[0].dimension_id_and_value_dict.get(&5), Some(&None));
    }

    #[tokio::test]
    async fn test_out_of_range_skips_query_once_metadata_is_cached() {
        let provider = dataset();
        let service = DataService::new(provider.clone());
        let filter = ValueFilter::for_variable(1_i64).with_condition(5, DimensionCondition::at(7));

        // Without metadata the query runs and simply matches nothing
        assert_eq!(service.value_records("ds1", &filter).await.unwrap(), Some(Vec::new()));
        assert_eq!(provider.statements.lock().len(), 1);

        service.available_variables("ds1").await.unwrap();
        let issued = provider.statements.lock().len();
        assert_eq!(service.value_records("ds1", &filter).await.unwrap(), Some(Vec::new()));
        assert_eq!(provider.statements.lock().len(), issued);
    }

    #[tokio::test]
    async fn test_values_resolve_locations_and_variables() {
        let service = DataService::new(dataset());
        let filter = ValueFilter::for_variable(2_i64);
        let values = service.values("ds1", &filter).await.unwrap().unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].variable.name, "flow");
        assert_eq!(values[0].location.metadata["name"], "station 1");
        // Only the variable's own dimension is reported
        assert_eq!(
            values[0].dimension_id_and_value_dict,
            DimensionIdAndValueDict::from([(6, Some(1))])
        );
    }

    #[tokio::test]
    async fn test_untranslatable_queries_are_none() {
        let service = DataService::new(dataset());
        let no_variable = QueryObject::Values {
            filter: ValueFilter::default(),
        };
        assert_eq!(service.query("ds1", &no_variable).await.unwrap(), None);

        let scoped = QueryObject::MaxMinValue {
            filter: MaxMinFilter {
                dimensions: Some(vec![5]),
                ..MaxMinFilter::default()
            },
        };
        assert_eq!(service.query("ds1", &scoped).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_max_min_and_population() {
        let service = DataService::new(dataset());
        let max_min = service.max_min_for_variable("ds1", 1).await.unwrap().unwrap();
        assert_eq!(max_min.extent(), Some((0.0, 12.0)));

        let mut population = service
            .value_population("ds1", 1, &DimensionIdAndValueDict::from([(5, Some(2))]))
            .await
            .unwrap();
        population.sort_by(f64::total_cmp);
        assert_eq!(population, vec![2.0, 12.0]);
    }

    #[tokio::test]
    async fn test_query_response_json() {
        let service = DataService::new(dataset());
        let query: QueryObject =
            serde_json::from_str(r#"{"for": "variables", "filter": {"names": ["temp"]}}"#).unwrap();
        let response = service.query("ds1", &query).await.unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!([{"id": 1, "name": "temp"}])
        );
    }
}
