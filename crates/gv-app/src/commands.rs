//! Subcommand implementations
//!
//! Each command opens a [`Session`], publishes the snapshot its arguments
//! describe and lets the matching consumer react to it.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use gv_core::{
    keys, DimensionValueDict, LocationId, LocationPin, LocationSelection, SharedState, StateStore,
    VariableWithDimensions,
};
use gv_data::resolve::resolve_variable_id;
use gv_data::{DataService, SqliteProvider};
use gv_views::{
    ChartDataFor, Consumer, Legend, LegendConfig, LineChart, LineChartConfig, LocationSeries,
    ValueLayer, ValueLayerConfig, VariableSeries,
};

use crate::config::VisConfig;

/// What the snapshot should select besides data source and variable
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// `dimension name -> coordinate`
    pub coordinates: Vec<(String, i64)>,
    pub selected: Option<LocationId>,
    pub pins: Vec<(LocationId, Option<String>)>,
}

/// Data service plus the shared state consumers observe
pub struct Session {
    config: VisConfig,
    service: Arc<DataService>,
    store: StateStore,
    data_source: String,
    variable: VariableWithDimensions,
}

impl Session {
    pub async fn open(
        config: VisConfig,
        data_source: Option<&str>,
        variable: Option<&str>,
    ) -> Result<Self> {
        let data_source = config
            .initial_data_source(data_source)
            .ok_or_else(|| anyhow!("No data source given; pass --data-source or list dataSources in the config"))?;
        let service = Arc::new(DataService::new(Arc::new(SqliteProvider::new())));

        let variables = service
            .available_variables(&data_source)
            .await
            .with_context(|| format!("Failed to load variables of {data_source}"))?;
        let name = variable.or_else(|| config.data_from.as_ref()?.variable_name.as_deref());
        let variable = match name {
            Some(name) => {
                let id = resolve_variable_id(&variables, name)
                    .ok_or_else(|| anyhow!("Unknown variable {name} in {data_source}"))?;
                variables.iter().find(|v| v.id() == id).cloned()
            }
            None => variables.first().cloned(),
        }
        .ok_or_else(|| anyhow!("{data_source} has no variables"))?;
        info!(data_source = %data_source, variable = variable.name(), "opened session");

        let state = SharedState::new()
            .with(keys::CURRENT_DATA_SOURCE, data_source.as_str())
            .with(keys::CURRENT_VARIABLE_ID, variable.id())
            .with_object(
                keys::AVAILABLE_VARIABLES_DICT,
                service.cache().to_available_variables_dict(),
            );
        Ok(Self {
            config,
            service,
            store: StateStore::new(state),
            data_source,
            variable,
        })
    }

    pub fn variables(&self) -> Option<Arc<Vec<VariableWithDimensions>>> {
        self.service.cache().cached(&self.data_source)
    }

    /// Publish the snapshot describing `selection`
    pub fn select(&self, selection: &Selection) -> Result<SharedState> {
        let mut dims = DimensionValueDict::new();
        for (name, coordinate) in &selection.coordinates {
            let dimension = self
                .variable
                .dimension_by_name(name)
                .ok_or_else(|| anyhow!("{} has no dimension {name}", self.variable.name()))?;
            if !dimension.contains(*coordinate) {
                bail!("Coordinate {coordinate} is outside {name} (size {})", dimension.size);
            }
            dims = dims.with_coordinate(&self.data_source, self.variable.id(), dimension.id, Some(*coordinate));
        }

        let data_source = self.data_source.clone();
        let pins: Vec<LocationPin> = selection
            .pins
            .iter()
            .map(|(location_id, color)| LocationPin {
                data_source: data_source.clone(),
                location_id: *location_id,
                color: color.clone(),
            })
            .collect();

        let changed = self.store.update(|state| {
            let mut next = state.with_object(keys::DIMENSION_VALUE_DICT, dims);
            if !pins.is_empty() {
                next = next.with_object(keys::LOCATION_PINS, pins);
            }
            match selection.selected {
                Some(location_id) => next.with_object(
                    keys::LOCATION_SELECTION,
                    LocationSelection {
                        data_source,
                        location_id,
                    },
                ),
                None => next,
            }
        });
        debug!(changed = ?changed.sorted(), "selection published");
        Ok(self.store.current())
    }

    pub fn value_layer(&self) -> ValueLayer {
        ValueLayer::new(
            self.service.clone(),
            ValueLayerConfig {
                display_name: self.config.data_source_dict.display_name(&self.data_source).to_string(),
                data_from: self.config.data_from.clone(),
                color_scheme: self.config.color_scheme.clone(),
                ..ValueLayerConfig::default()
            },
        )
    }

    pub fn legend(&self) -> Legend {
        Legend::new(
            self.service.clone(),
            LegendConfig {
                data_from: self.config.data_from.clone(),
                color_scheme: self.config.color_scheme.clone(),
                data_source_dict: self.config.data_source_dict.clone(),
                fraction_digits: self.config.fraction_digits,
                ..LegendConfig::default()
            },
        )
    }

    /// Chart of the current variable along `dimension` at `locations`, or
    /// of every variable with that dimension at one location
    pub fn line_chart(&self, dimension: &str, locations: &[LocationId], per_variable: bool) -> Result<LineChart> {
        let data_for = if per_variable {
            let location_id = match locations {
                [] => None,
                [one] => Some(*one),
                _ => bail!("A per-variable chart plots a single location"),
            };
            let variable_names = self.variables().map(|variables| {
                variables
                    .iter()
                    .filter(|v| v.dimension_by_name(dimension).is_some())
                    .map(|v| v.name().to_string())
                    .collect()
            });
            ChartDataFor::Location(LocationSeries {
                data_source: Some(self.data_source.clone()),
                dimension_name: dimension.to_string(),
                location_id,
                variable_names,
            })
        } else {
            ChartDataFor::Variable(VariableSeries {
                data_source: Some(self.data_source.clone()),
                dimension_name: dimension.to_string(),
                variable_name: self.variable.name().to_string(),
                location_ids: (!locations.is_empty()).then(|| locations.to_vec()),
            })
        };
        Ok(LineChart::new(
            self.service.clone(),
            LineChartConfig {
                location_label_key: Some("name".to_string()),
                ..LineChartConfig::new(data_for)
            },
        ))
    }
}

/// Let `consumer` catch up with `state`
pub async fn render<C: Consumer>(consumer: &mut C, state: &SharedState) -> Result<()> {
    let work = consumer
        .on_state(state)
        .await
        .with_context(|| format!("{} failed to update", consumer.view_type()))?;
    debug!(view = consumer.view_type(), ?work, "rendered");
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_db::{populate, SampleOptions};
    use gv_views::LegendScale;

    fn sample_file(name: &str) -> String {
        let path = std::env::temp_dir().join(format!("gridvis-{}-{name}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let conn = rusqlite::Connection::open(&path).unwrap();
        populate(&conn, SampleOptions { locations: 4, seed: 3 }).unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    async fn test_session_defaults_to_first_variable() {
        let path = sample_file("defaults");
        let session = Session::open(VisConfig::default(), Some(&path), None).await.unwrap();
        assert_eq!(session.variable.name(), "temperature");
        assert_eq!(session.variables().map(|v| v.len()), Some(2));

        let err = Session::open(VisConfig::default(), Some(&path), Some("wind"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Unknown variable wind"));
    }

    #[tokio::test]
    async fn test_layer_and_legend_follow_selection() {
        let path = sample_file("layer");
        let session = Session::open(VisConfig::default(), Some(&path), Some("salinity"))
            .await
            .unwrap();
        let state = session
            .select(&Selection {
                coordinates: vec![("depth".into(), 2)],
                selected: Some(3),
                pins: vec![(1, Some("#ff0000".into()))],
            })
            .unwrap();

        let mut layer = session.value_layer();
        render(&mut layer, &state).await.unwrap();
        let styles = layer.styles();
        assert_eq!(styles.len(), 4);
        assert!(styles.iter().all(|s| s.fill_color.starts_with('#')));
        let selected = styles.iter().find(|s| s.location_id == 3).unwrap();
        assert_eq!(selected.weight, 3);
        let pinned = styles.iter().find(|s| s.location_id == 1).unwrap();
        assert_eq!(pinned.color, "#ff0000");

        let mut legend = session.legend();
        render(&mut legend, &state).await.unwrap();
        assert_eq!(legend.model().variable, "salinity");
        assert!(matches!(legend.model().scale, Some(LegendScale::Sequential { .. })));
    }

    #[tokio::test]
    async fn test_selection_rejects_unknown_coordinates() {
        let path = sample_file("coords");
        let session = Session::open(VisConfig::default(), Some(&path), None).await.unwrap();
        let unknown = Selection {
            coordinates: vec![("depth".into(), 0)],
            ..Selection::default()
        };
        assert!(session.select(&unknown).is_err());
        let outside = Selection {
            coordinates: vec![("month".into(), 12)],
            ..Selection::default()
        };
        assert!(session.select(&outside).is_err());
    }

    #[tokio::test]
    async fn test_line_chart_per_location() {
        let path = sample_file("chart");
        let session = Session::open(VisConfig::default(), Some(&path), None).await.unwrap();
        let state = session.select(&Selection::default()).unwrap();
        let mut chart = session.line_chart("month", &[1, 2], false).unwrap();
        render(&mut chart, &state).await.unwrap();

        let model = chart.model();
        assert_eq!(model.labels.first().map(String::as_str), Some("Jan"));
        assert_eq!(model.labels.len(), 12);
        assert_eq!(model.datasets.len(), 2);
        assert_eq!(model.datasets[0].label, "Station 001");
        assert!(session.line_chart("month", &[1, 2], true).is_err());
    }
}
