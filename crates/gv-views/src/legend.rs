//! Legend for the color scale of the current variable

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gv_color::{
    format_tick, generate_color_scale, generate_gradient_css, legend_ticks, Color, ColorScale,
    ColorSchemeConfig,
};
use gv_core::{Recompute, RecomputeRegistry, RecomputeSet, SharedState, StateTracker};
use gv_data::resolve::obtain_current_data_source;
use gv_data::{DataFrom, DataService, DataSourceNameDict};

use crate::consumer::{bind_domain, resolve_target, Consumer};
use crate::ViewError;

const NOT_AVAILABLE: &str = "N/A";
const GRADIENT_STEPS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegendConfig {
    pub header: String,
    pub data_from: Option<DataFrom>,
    pub color_scheme: ColorSchemeConfig,
    pub data_source_dict: DataSourceNameDict,
    pub fraction_digits: usize,
}

impl Default for LegendConfig {
    fn default() -> Self {
        Self {
            header: "Legend".to_string(),
            data_from: None,
            color_scheme: ColorSchemeConfig::default(),
            data_source_dict: DataSourceNameDict::default(),
            fraction_digits: 2,
        }
    }
}

/// How the scale itself is drawn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LegendScale {
    /// One block per bin with the bin edges as labels
    Discrete { colors: Vec<Color>, ticks: Vec<String> },
    /// A gradient between the variable's extremes
    Sequential {
        gradient_css: Option<String>,
        min: String,
        max: String,
    },
}

/// Everything a renderer needs to draw the legend
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendModel {
    pub header: String,
    pub data_source: String,
    pub variable: String,
    pub scale: Option<LegendScale>,
}

pub struct Legend {
    service: Arc<DataService>,
    config: LegendConfig,
    registry: RecomputeRegistry,
    tracker: StateTracker,
    model: LegendModel,
}

impl Legend {
    pub fn new(service: Arc<DataService>, config: LegendConfig) -> Self {
        let model = LegendModel {
            header: config.header.clone(),
            data_source: NOT_AVAILABLE.to_string(),
            variable: NOT_AVAILABLE.to_string(),
            scale: None,
        };
        Self {
            service,
            config,
            registry: RecomputeRegistry::legend(),
            tracker: StateTracker::new(),
            model,
        }
    }

    pub fn model(&self) -> &LegendModel {
        &self.model
    }

    async fn update_model(&mut self, state: &SharedState) -> Result<(), ViewError> {
        let header = self.config.header.clone();
        let data_from = self.config.data_from.as_ref();
        let Some(target) = resolve_target(&self.service, data_from, state).await? else {
            let data_source = obtain_current_data_source(data_from, state);
            self.model = LegendModel {
                header,
                data_source: data_source
                    .as_deref()
                    .map(|ds| self.config.data_source_dict.display_name(ds).to_string())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                variable: NOT_AVAILABLE.to_string(),
                scale: None,
            };
            return Ok(());
        };

        let definition = self
            .config
            .color_scheme
            .lookup(&target.data_source, target.variable.name());
        let unbound = generate_color_scale(definition)?;
        let bound = bind_domain(&self.service, &target, unbound.clone()).await?;
        let scale = self.render_scale(bound.as_ref().unwrap_or(&unbound), bound.is_some());

        self.model = LegendModel {
            header,
            data_source: self
                .config
                .data_source_dict
                .display_name(&target.data_source)
                .to_string(),
            variable: target.variable.name().to_string(),
            scale: Some(scale),
        };
        Ok(())
    }

    fn render_scale(&self, scale: &ColorScale, has_domain: bool) -> LegendScale {
        let digits = self.config.fraction_digits;
        match scale {
            ColorScale::Sequential(sequential) => {
                let (min, max) = sequential.domain;
                let label = |v: f64| {
                    if has_domain {
                        format_tick(v, digits)
                    } else {
                        NOT_AVAILABLE.to_string()
                    }
                };
                LegendScale::Sequential {
                    gradient_css: generate_gradient_css(scale, min, max, GRADIENT_STEPS),
                    min: label(min),
                    max: label(max),
                }
            }
            _ => {
                let ticks = legend_ticks(scale).filter(|_| has_domain).unwrap_or_default();
                LegendScale::Discrete {
                    colors: scale.range().to_vec(),
                    ticks: ticks.iter().map(|t| format_tick(*t, digits)).collect(),
                }
            }
        }
    }
}

#[async_trait]
impl Consumer for Legend {
    fn view_type(&self) -> &str {
        "legend"
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
        if work.contains(Recompute::ColorScale) {
            self.update_model(state).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::dataset;
    use gv_color::ColorSchemeDefinition;
    use gv_core::{keys, DimensionValueDict};

    fn legend(config: LegendConfig) -> Legend {
        Legend::new(Arc::new(DataService::new(dataset())), config)
    }

    fn state() -> SharedState {
        SharedState::new()
            .with(keys::CURRENT_DATA_SOURCE, "ds1")
            .with(keys::CURRENT_VARIABLE_ID, 1_i64)
    }

    #[tokio::test]
    async fn test_sequential_legend_shows_extent() {
        let mut config = LegendConfig::default();
        config
            .data_source_dict
            .0
            .insert("Stations".into(), "ds1".into());
        let mut legend = legend(config);
        legend.on_state(&state()).await.unwrap();

        let model = legend.model();
        assert_eq!(model.header, "Legend");
        assert_eq!(model.data_source, "Stations");
        assert_eq!(model.variable, "temp");
        match &model.scale {
            Some(LegendScale::Sequential {
                gradient_css,
                min,
                max,
            }) => {
                assert_eq!(min, "0.00");
                assert_eq!(max, "12.00");
                assert!(gradient_css
                    .as_deref()
                    .is_some_and(|css| css.starts_with("linear-gradient(to right, #")));
            }
            other => panic!("unexpected legend scale {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_threshold_legend_ticks() {
        let mut config = LegendConfig {
            fraction_digits: 0,
            ..LegendConfig::default()
        };
        config.color_scheme.0.insert(
            String::new(),
            [(
                String::new(),
                ColorSchemeDefinition {
                    scale_type: Some(gv_color::ColorScaleType::Threshold),
                    thresholds: Some(vec![0.0, 5.0, 10.0]),
                    ..Default::default()
                },
            )]
            .into_iter()
            .collect(),
        );
        let mut legend = legend(config);
        legend.on_state(&state()).await.unwrap();
        match &legend.model().scale {
            Some(LegendScale::Discrete { colors, ticks }) => {
                assert_eq!(colors.len(), 3);
                assert_eq!(ticks, &["0", "5", "10", "~"]);
            }
            other => panic!("unexpected legend scale {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_legend_ignores_coordinates_and_handles_missing_variable() {
        let mut legend = legend(LegendConfig::default());
        legend.on_state(&state()).await.unwrap();

        let moved = state().with_object(
            keys::DIMENSION_VALUE_DICT,
            DimensionValueDict::new().with_coordinate("ds1", 1, 5, Some(2)),
        );
        assert!(legend.on_state(&moved).await.unwrap().is_empty());

        let unknown = moved.with(keys::CURRENT_VARIABLE_ID, 42_i64);
        legend.on_state(&unknown).await.unwrap();
        assert_eq!(legend.model().data_source, "ds1");
        assert_eq!(legend.model().variable, "N/A");
        assert_eq!(legend.model().scale, None);
    }
}
