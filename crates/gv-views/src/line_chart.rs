//! Line chart plotting values along one dimension

use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use gv_core::{
    keys, Coordinate, Dimension, DimensionIdAndValueDict, LocationId, Recompute, RecomputeRegistry,
    RecomputeSet, SharedState, StateTracker, Value, VariableId, VariableWithDimensions,
};
use gv_data::resolve::resolve_variable_id;
use gv_data::{DataService, LocationFilter, MetadataFilter, ValueFilter};

use crate::consumer::Consumer;
use crate::ViewError;

pub const DEFAULT_COLORS: [&str; 6] = [
    "#8CC63E", "#2989E3", "#724498", "#F02C89", "#FB943B", "#F4CD26",
];
pub const FALLBACK_COLOR: &str = "hsl(0, 0%, 0%)";
pub const SELECTION_COLOR: &str = "hsl(0, 0%, 70%)";

/// One line per location, all for the same variable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSeries {
    #[serde(default)]
    pub data_source: Option<String>,
    pub dimension_name: String,
    pub variable_name: String,
    /// Locations to plot; pins and the selection when absent
    #[serde(default)]
    pub location_ids: Option<Vec<LocationId>>,
}

/// One line per variable, all at the same location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSeries {
    #[serde(default)]
    pub data_source: Option<String>,
    pub dimension_name: String,
    /// Location to plot; the selection when absent
    #[serde(default)]
    pub location_id: Option<LocationId>,
    /// Variables to plot; the current variable when absent
    #[serde(default)]
    pub variable_names: Option<Vec<String>>,
}

/// What the chart plots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChartDataFor {
    Variable(VariableSeries),
    Location(LocationSeries),
}

impl ChartDataFor {
    fn data_source(&self) -> Option<&str> {
        match self {
            ChartDataFor::Variable(series) => series.data_source.as_deref(),
            ChartDataFor::Location(series) => series.data_source.as_deref(),
        }
    }

    fn dimension_name(&self) -> &str {
        match self {
            ChartDataFor::Variable(series) => &series.dimension_name,
            ChartDataFor::Location(series) => &series.dimension_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChartConfig {
    #[serde(default = "default_header")]
    pub header: String,
    pub data_for: ChartDataFor,
    /// Metadata key holding a location's display label
    #[serde(default)]
    pub location_label_key: Option<String>,
}

fn default_header() -> String {
    "Line Chart".to_string()
}

impl LineChartConfig {
    pub fn new(data_for: ChartDataFor) -> Self {
        Self {
            header: default_header(),
            data_for,
            location_label_key: None,
        }
    }
}

/// One plotted line; `None` marks a coordinate without a value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub label: String,
    pub color: String,
    pub data: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineChartModel {
    /// One label per coordinate of the plotted dimension
    pub labels: Vec<String>,
    pub datasets: Vec<LineSeries>,
}

pub struct LineChart {
    service: Arc<DataService>,
    config: LineChartConfig,
    registry: RecomputeRegistry,
    tracker: StateTracker,

    // State
    data_source: Option<String>,
    variables: Arc<Vec<VariableWithDimensions>>,
    dimension: Option<Dimension>,
    model: LineChartModel,
}

impl LineChart {
    pub fn new(service: Arc<DataService>, config: LineChartConfig) -> Self {
        Self {
            service,
            config,
            registry: RecomputeRegistry::line_chart(),
            tracker: StateTracker::new(),
            data_source: None,
            variables: Arc::default(),
            dimension: None,
            model: LineChartModel::default(),
        }
    }

    pub fn model(&self) -> &LineChartModel {
        &self.model
    }

    pub fn dimension(&self) -> Option<&Dimension> {
        self.dimension.as_ref()
    }

    /// Snapshot moving the current variable to `coordinate` along the
    /// plotted dimension
    pub fn select_coordinate(&self, state: &SharedState, coordinate: Coordinate) -> Option<SharedState> {
        let data_source = self.data_source.as_deref()?;
        let dimension = self.dimension.as_ref()?;
        let variable = state.current_variable_id()?;
        let dict = state.dimension_value_dict().unwrap_or_default();
        let next = dict.with_coordinate(data_source, variable, dimension.id, Some(coordinate));
        Some(state.with_object(keys::DIMENSION_VALUE_DICT, next))
    }

    fn actual_data_source(&self, state: &SharedState) -> Option<String> {
        self.config
            .data_for
            .data_source()
            .map(str::to_string)
            .or_else(|| state.location_selection().map(|s| s.data_source.clone()))
    }

    async fn update_metadata(&mut self) -> Result<(), ViewError> {
        self.variables = Arc::default();
        self.dimension = None;
        let Some(data_source) = self.data_source.as_deref() else {
            return Ok(());
        };
        self.variables = self.service.available_variables(data_source).await?;
        let name = self.config.data_for.dimension_name();
        self.dimension = self
            .service
            .dimensions(data_source, &MetadataFilter::default())
            .await?
            .into_iter()
            .find(|d| d.name == name);
        if self.dimension.is_none() {
            debug!(data_source, dimension = name, "chart dimension not found");
        }
        Ok(())
    }

    async fn update_datasets(&mut self, state: &SharedState) -> Result<(), ViewError> {
        let datasets = match (&self.data_source, &self.dimension) {
            (Some(data_source), Some(dimension)) => match &self.config.data_for {
                ChartDataFor::Variable(series) => {
                    self.variable_datasets(state, data_source, dimension, series).await?
                }
                ChartDataFor::Location(series) => {
                    self.location_datasets(state, data_source, dimension, series).await?
                }
            },
            _ => Vec::new(),
        };
        self.model = LineChartModel {
            labels: self.dimension.as_ref().map(Dimension::labels).unwrap_or_default(),
            datasets,
        };
        Ok(())
    }

    async fn variable_datasets(
        &self,
        state: &SharedState,
        data_source: &str,
        dimension: &Dimension,
        series: &VariableSeries,
    ) -> Result<Vec<LineSeries>, ViewError> {
        let mut locations: Vec<(LocationId, String)> = match &series.location_ids {
            Some(ids) => ids
                .iter()
                .enumerate()
                .map(|(i, id)| (*id, DEFAULT_COLORS.get(i).unwrap_or(&FALLBACK_COLOR).to_string()))
                .collect(),
            None => state
                .location_pins()
                .map(|pins| {
                    pins.iter()
                        .filter(|pin| pin.data_source == data_source)
                        .map(|pin| {
                            let color = pin.color.clone().unwrap_or_else(|| FALLBACK_COLOR.to_string());
                            (pin.location_id, color)
                        })
                        .collect()
                })
                .unwrap_or_default(),
        };
        if let Some(selection) = state.location_selection() {
            if selection.data_source == data_source
                && !locations.iter().any(|(id, _)| *id == selection.location_id)
            {
                locations.push((selection.location_id, SELECTION_COLOR.to_string()));
            }
        }

        let variable = resolve_variable_id(&self.variables, &series.variable_name)
            .or_else(|| state.current_variable_id());
        let Some(variable) = variable.filter(|_| !locations.is_empty()) else {
            return Ok(Vec::new());
        };

        let ids: Vec<LocationId> = locations.iter().map(|(id, _)| *id).collect();
        let filter = ValueFilter::for_variable(variable)
            .at_locations(ids.clone())
            .with_coordinates(&self.coordinates(state, data_source, variable, dimension));
        let values = self
            .service
            .values(data_source, &filter)
            .await?
            .unwrap_or_default();
        let labels = self.location_labels(data_source, &ids).await?;

        Ok(locations
            .into_iter()
            .map(|(id, color)| LineSeries {
                label: labels
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| format!("Location {id}")),
                color,
                data: along_dimension(values.iter().filter(|v| v.location.id == id), dimension),
            })
            .collect())
    }

    async fn location_datasets(
        &self,
        state: &SharedState,
        data_source: &str,
        dimension: &Dimension,
        series: &LocationSeries,
    ) -> Result<Vec<LineSeries>, ViewError> {
        let variables: Vec<&VariableWithDimensions> = match &series.variable_names {
            Some(names) => names
                .iter()
                .filter_map(|name| self.variables.iter().find(|v| v.name() == name))
                .collect(),
            None => state
                .current_variable_id()
                .and_then(|id| self.variables.iter().find(|v| v.id() == id))
                .into_iter()
                .collect(),
        };
        let location = series.location_id.or_else(|| {
            state
                .location_selection()
                .filter(|s| s.data_source == data_source)
                .map(|s| s.location_id)
        });
        let (Some(location), Some(first)) = (location, variables.first()) else {
            return Ok(Vec::new());
        };

        let ids: Vec<VariableId> = variables.iter().map(|v| v.id()).collect();
        let filter = ValueFilter::for_variable(ids)
            .at_locations(location)
            .with_coordinates(&self.coordinates(state, data_source, first.id(), dimension));
        let values = self
            .service
            .values(data_source, &filter)
            .await?
            .unwrap_or_default();

        Ok(variables
            .iter()
            .enumerate()
            .map(|(i, variable)| LineSeries {
                label: variable.name().to_string(),
                color: DEFAULT_COLORS.get(i).unwrap_or(&FALLBACK_COLOR).to_string(),
                data: along_dimension(
                    values.iter().filter(|v| v.variable.id == variable.id()),
                    dimension,
                ),
            })
            .collect())
    }

    /// Selected coordinates of `variable` with the plotted dimension left free
    fn coordinates(
        &self,
        state: &SharedState,
        data_source: &str,
        variable: VariableId,
        dimension: &Dimension,
    ) -> DimensionIdAndValueDict {
        let mut coordinates = state
            .dimension_value_dict()
            .and_then(|dict| dict.get(data_source, variable).cloned())
            .unwrap_or_default();
        coordinates.remove(&dimension.id);
        coordinates
    }

    async fn location_labels(
        &self,
        data_source: &str,
        ids: &[LocationId],
    ) -> Result<AHashMap<LocationId, String>, ViewError> {
        let Some(key) = self.config.location_label_key.as_deref() else {
            return Ok(AHashMap::new());
        };
        let locations = self
            .service
            .locations(
                data_source,
                &LocationFilter {
                    ids: Some(ids.to_vec()),
                },
            )
            .await?;
        Ok(locations
            .into_iter()
            .filter_map(|location| {
                let label = match location.metadata.get(key)? {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((location.id, label))
            })
            .collect())
    }
}

/// Values indexed by their coordinate along `dimension`, `None` where no
/// value exists
fn along_dimension<'a>(values: impl Iterator<Item = &'a Value>, dimension: &Dimension) -> Vec<Option<f64>> {
    let size = usize::try_from(dimension.size).unwrap_or(0);
    let mut data = vec![None; size];
    for value in values {
        let Some(Some(coordinate)) = value.dimension_id_and_value_dict.get(&dimension.id) else {
            continue;
        };
        if let Some(slot) = usize::try_from(*coordinate).ok().and_then(|i| data.get_mut(i)) {
            if slot.is_none() {
                *slot = value.value;
            }
        }
    }
    data
}

#[async_trait]
impl Consumer for LineChart {
    fn view_type(&self) -> &str {
        "line-chart"
    }

    fn display_name(&self) -> &str {
        &self.config.header
    }

    fn registry(&self) -> &RecomputeRegistry {
        &self.registry
    }

    fn tracker_mut(&mut self) -> &mut StateTracker {
        &mut self.tracker
    }

    async fn recompute(&mut self, state: &SharedState, work: &RecomputeSet) -> Result<(), ViewError> {
        let data_source = self.actual_data_source(state);
        if work.contains(Recompute::Shape) || data_source != self.data_source {
            self.data_source = data_source;
            self.update_metadata().await?;
        }
        if work.contains(Recompute::Values) {
            self.update_datasets(state).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::dataset;
    use gv_core::{DimensionValueDict, LocationPin, LocationSelection};

    fn chart(data_for: ChartDataFor) -> LineChart {
        LineChart::new(
            Arc::new(DataService::new(dataset())),
            LineChartConfig::new(data_for),
        )
    }

    fn selection(location_id: LocationId) -> SharedState {
        SharedState::new()
            .with(keys::CURRENT_DATA_SOURCE, "ds1")
            .with(keys::CURRENT_VARIABLE_ID, 1_i64)
            .with_object(
                keys::LOCATION_SELECTION,
                LocationSelection {
                    data_source: "ds1".into(),
                    location_id,
                },
            )
    }

    #[test]
    fn test_data_for_json() {
        let variable: ChartDataFor = serde_json::from_str(
            r#"{"dataSource": "ds1", "dimensionName": "time", "variableName": "temp"}"#,
        )
        .unwrap();
        assert!(matches!(variable, ChartDataFor::Variable(_)));

        let location: ChartDataFor =
            serde_json::from_str(r#"{"dimensionName": "time", "locationId": 2}"#).unwrap();
        assert!(matches!(
            location,
            ChartDataFor::Location(LocationSeries {
                location_id: Some(2),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_variable_series_follow_pins_and_selection() {
        let mut chart = chart(ChartDataFor::Variable(VariableSeries {
            dimension_name: "time".into(),
            variable_name: "temp".into(),
            ..VariableSeries::default()
        }));
        let state = selection(1).with_object(
            keys::LOCATION_PINS,
            vec![LocationPin {
                data_source: "ds1".into(),
                location_id: 2,
                color: Some("#123456".into()),
            }],
        );
        chart.on_state(&state).await.unwrap();

        let model = chart.model();
        assert_eq!(model.labels, vec!["0", "1", "2"]);
        assert_eq!(model.datasets.len(), 2);
        assert_eq!(model.datasets[0].label, "Location 2");
        assert_eq!(model.datasets[0].color, "#123456");
        assert_eq!(model.datasets[0].data, vec![Some(10.0), Some(11.0), Some(12.0)]);
        assert_eq!(model.datasets[1].label, "Location 1");
        assert_eq!(model.datasets[1].color, SELECTION_COLOR);
        assert_eq!(model.datasets[1].data, vec![Some(0.0), Some(1.0), Some(2.0)]);
    }

    #[tokio::test]
    async fn test_plotted_dimension_is_left_unconstrained() {
        let mut chart = chart(ChartDataFor::Location(LocationSeries {
            dimension_name: "time".into(),
            ..LocationSeries::default()
        }));
        let state = selection(2).with_object(
            keys::DIMENSION_VALUE_DICT,
            DimensionValueDict::new().with_coordinate("ds1", 1, 5, Some(0)),
        );
        chart.on_state(&state).await.unwrap();

        let model = chart.model();
        assert_eq!(model.datasets.len(), 1);
        assert_eq!(model.datasets[0].label, "temp");
        assert_eq!(model.datasets[0].color, DEFAULT_COLORS[0]);
        assert_eq!(model.datasets[0].data, vec![Some(10.0), Some(11.0), Some(12.0)]);
    }

    #[tokio::test]
    async fn test_missing_coordinates_are_gaps() {
        let mut chart = chart(ChartDataFor::Location(LocationSeries {
            dimension_name: "time".into(),
            location_id: Some(3),
            ..LocationSeries::default()
        }));
        chart.on_state(&selection(1)).await.unwrap();
        assert_eq!(chart.model().datasets[0].data, vec![None, None, None]);
    }

    #[tokio::test]
    async fn test_select_coordinate_publishes_fresh_dict() {
        let mut chart = chart(ChartDataFor::Location(LocationSeries {
            dimension_name: "time".into(),
            ..LocationSeries::default()
        }));
        let state = selection(1);
        chart.on_state(&state).await.unwrap();

        let next = chart.select_coordinate(&state, 2).unwrap();
        let dict = next.dimension_value_dict().unwrap();
        assert_eq!(dict.get("ds1", 1), Some(&DimensionIdAndValueDict::from([(5, Some(2))])));

        let work = chart.on_state(&next).await.unwrap();
        assert_eq!(work.iter().collect::<Vec<_>>(), vec![Recompute::Values]);
    }
}
