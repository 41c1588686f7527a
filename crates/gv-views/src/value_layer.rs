//! Map layer coloring each location by its value

use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use geojson::{feature, Feature, FeatureCollection, Geometry, JsonObject};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use gv_color::{generate_color_scale_for, ColorScale, ColorScaleType, ColorSchemeConfig};
use gv_core::{
    keys, LocationId, LocationSelection, Recompute, RecomputeRegistry, RecomputeSet, SharedState,
    StateTracker,
};
use gv_data::resolve::{obtain_current_data_source, obtain_current_dimension_id_and_value_dict};
use gv_data::{DataFrom, DataService, LocationFilter, ValueFilter};

use crate::consumer::{bind_domain, resolve_target, Consumer};
use crate::ViewError;

pub const DEFAULT_BORDER_COLOR: &str = "hsl(0, 0%, 50%)";
pub const MISSING_FILL_COLOR: &str = "transparent";
pub const FILL_OPACITY: f64 = 0.7;

/// Configuration for a value layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValueLayerConfig {
    pub display_name: String,
    pub data_from: Option<DataFrom>,
    pub color_scheme: ColorSchemeConfig,
    /// Scale types this layer can draw
    pub supported_scales: Vec<ColorScaleType>,
}

fn all_scale_types() -> Vec<ColorScaleType> {
    vec![
        ColorScaleType::Sequential,
        ColorScaleType::Quantize,
        ColorScaleType::Quantile,
        ColorScaleType::Threshold,
    ]
}

impl Default for ValueLayerConfig {
    fn default() -> Self {
        Self {
            display_name: "value layer".to_string(),
            data_from: None,
            color_scheme: ColorSchemeConfig::default(),
            supported_scales: all_scale_types(),
        }
    }
}

/// Style of one location's feature
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureStyle {
    pub location_id: LocationId,
    pub fill_color: String,
    pub fill_opacity: f64,
    /// Border color
    pub color: String,
    /// Border weight
    pub weight: u32,
    /// Drawn above the other features
    pub front: bool,
    pub tooltip: String,
}

#[derive(Debug, Clone, Default)]
struct Highlights {
    selected: Option<LocationId>,
    pin_colors: AHashMap<LocationId, String>,
}

/// A map layer drawing the locations of a data source filled by value
pub struct ValueLayer {
    service: Arc<DataService>,
    config: ValueLayerConfig,
    registry: RecomputeRegistry,
    tracker: StateTracker,

    // State
    data_source: Option<String>,
    features: FeatureCollection,
    location_ids: Vec<LocationId>,
    values: Option<AHashMap<LocationId, Option<f64>>>,
    scale: Option<ColorScale>,
    highlights: Highlights,
}

impl ValueLayer {
    pub fn new(service: Arc<DataService>, config: ValueLayerConfig) -> Self {
        Self {
            service,
            config,
            registry: RecomputeRegistry::value_layer(),
            tracker: StateTracker::new(),
            data_source: None,
            features: empty_collection(),
            location_ids: Vec::new(),
            values: None,
            scale: None,
            highlights: Highlights::default(),
        }
    }

    pub fn config(&self) -> &ValueLayerConfig {
        &self.config
    }

    /// Features of the current data source, one per location
    pub fn features(&self) -> &FeatureCollection {
        &self.features
    }

    pub fn color_scale(&self) -> Option<&ColorScale> {
        self.scale.as_ref()
    }

    pub fn value(&self, location_id: LocationId) -> Option<f64> {
        self.values.as_ref()?.get(&location_id).copied().flatten()
    }

    /// Styles in drawing order; highlighted features come last
    pub fn styles(&self) -> Vec<FeatureStyle> {
        let mut styles: Vec<FeatureStyle> = self
            .location_ids
            .iter()
            .map(|id| self.style(*id))
            .collect();
        styles.sort_by_key(|style| style.front);
        styles
    }

    fn style(&self, location_id: LocationId) -> FeatureStyle {
        let value = self.value(location_id);
        let fill_color = value
            .zip(self.scale.as_ref())
            .and_then(|(value, scale)| scale.color(value))
            .map(|color| color.to_hex())
            .unwrap_or_else(|| MISSING_FILL_COLOR.to_string());

        let mut color = DEFAULT_BORDER_COLOR.to_string();
        let mut weight = 1;
        let mut front = false;
        if let Some(pin_color) = self.highlights.pin_colors.get(&location_id) {
            color = pin_color.clone();
            front = true;
        }
        if self.highlights.selected == Some(location_id) {
            weight = 3;
            front = true;
        }

        FeatureStyle {
            location_id,
            fill_color,
            fill_opacity: FILL_OPACITY,
            color,
            weight,
            front,
            tooltip: tooltip(location_id, value),
        }
    }

    /// Snapshot selecting `location_id` of the current data source
    pub fn select_location(&self, state: &SharedState, location_id: LocationId) -> Option<SharedState> {
        let data_source = self.data_source.clone()?;
        Some(state.with_object(
            keys::LOCATION_SELECTION,
            LocationSelection {
                data_source,
                location_id,
            },
        ))
    }

    async fn update_features(&mut self) -> Result<(), ViewError> {
        self.features = empty_collection();
        self.location_ids.clear();
        let Some(data_source) = self.data_source.as_deref() else {
            return Ok(());
        };
        let locations = self
            .service
            .locations(data_source, &LocationFilter::default())
            .await?;
        debug!(data_source, count = locations.len(), "loaded layer features");

        self.location_ids = locations.iter().map(|l| l.id).collect();
        self.features.features = locations
            .into_iter()
            .map(|location| {
                let geometry = Geometry::from_json_value(location.geometry)
                    .map_err(|e| warn!(location = location.id, "invalid geometry: {e}"))
                    .ok();
                let mut properties = JsonObject::new();
                properties.insert("id".to_string(), location.id.into());
                Feature {
                    bbox: None,
                    geometry,
                    id: Some(feature::Id::Number(location.id.into())),
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();
        Ok(())
    }

    async fn update_values(&mut self, state: &SharedState) -> Result<(), ViewError> {
        self.values = None;
        let data_from = self.config.data_from.as_ref();
        let Some(target) = resolve_target(&self.service, data_from, state).await? else {
            return Ok(());
        };
        let Some(coordinates) = obtain_current_dimension_id_and_value_dict(
            &target.data_source,
            &target.variable,
            data_from,
            state,
        ) else {
            debug!(variable = target.variable.id(), "no coordinates selected");
            return Ok(());
        };

        let filter = ValueFilter::for_variable(target.variable.id()).with_coordinates(&coordinates);
        let Some(records) = self.service.value_records(&target.data_source, &filter).await? else {
            return Ok(());
        };
        let mut values = AHashMap::with_capacity(records.len());
        for record in records {
            values.entry(record.location_id).or_insert(record.value);
        }
        self.values = Some(values);
        Ok(())
    }

    async fn update_color_scale(&mut self, state: &SharedState) -> Result<(), ViewError> {
        self.scale = None;
        let data_from = self.config.data_from.as_ref();
        let Some(target) = resolve_target(&self.service, data_from, state).await? else {
            return Ok(());
        };
        let definition = self
            .config
            .color_scheme
            .lookup(&target.data_source, target.variable.name());
        let scale = generate_color_scale_for(definition, &self.config.supported_scales)?;
        self.scale = bind_domain(&self.service, &target, scale).await?;
        Ok(())
    }

    fn update_highlights(&mut self, state: &SharedState) {
        let Some(data_source) = self.data_source.as_deref() else {
            self.highlights = Highlights::default();
            return;
        };
        let selected = state
            .location_selection()
            .filter(|selection| selection.data_source == data_source)
            .map(|selection| selection.location_id);
        let pin_colors = state
            .location_pins()
            .map(|pins| {
                pins.iter()
                    .filter(|pin| pin.data_source == data_source)
                    .filter_map(|pin| Some((pin.location_id, pin.color.clone()?)))
                    .collect()
            })
            .unwrap_or_default();
        self.highlights = Highlights {
            selected,
            pin_colors,
        };
    }
}

fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

fn tooltip(location_id: LocationId, value: Option<f64>) -> String {
    let value = value.map_or_else(|| "N/A".to_string(), |v| v.to_string());
    format!("Location ID: {location_id}<br/>Value: {value}")
}

#[async_trait]
impl Consumer for ValueLayer {
    fn view_type(&self) -> &str {
        "value-layer"
    }

    fn display_name(&self) -> &str {
        &self.config.display_name
    }

    fn registry(&self) -> &RecomputeRegistry {
        &self.registry
    }

    fn tracker_mut(&mut self) -> &mut StateTracker {
        &mut self.tracker
    }

    async fn recompute(&mut self, state: &SharedState, work: &RecomputeSet) -> Result<(), ViewError> {
        self.data_source = obtain_current_data_source(self.config.data_from.as_ref(), state);
        if work.contains(Recompute::Shape) {
            self.update_features().await?;
        }
        if work.contains(Recompute::Values) {
            self.update_values(state).await?;
        }
        if work.contains(Recompute::ColorScale) {
            self.update_color_scale(state).await?;
        }
        if work.contains(Recompute::Highlights) {
            self.update_highlights(state);
        }
        Ok(())
    }
}
