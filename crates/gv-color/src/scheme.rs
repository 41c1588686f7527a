//! Color scheme definitions and scale generation

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::palette::{self, Interpolator};
use crate::scale::{
    ColorScale, ColorScaleType, QuantileScale, QuantizeScale, SequentialScale, ThresholdScale,
};
use crate::{Color, ColorError};

/// Either a palette name or an explicit list of CSS colors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemeSpec {
    Named(String),
    Colors(Vec<String>),
}

/// Declarative description of a color scale.
///
/// ```json
/// { "type": "threshold", "scheme": "schemeBlues[5]", "thresholds": [0, 10, 20], "reverse": true }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorSchemeDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub scale_type: Option<ColorScaleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<SchemeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Vec<f64>>,
    #[serde(default)]
    pub reverse: bool,
}

impl ColorSchemeDefinition {
    pub fn from_json(json: &str) -> Result<Self, ColorError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn kind(&self) -> ColorScaleType {
        self.scale_type.unwrap_or_default()
    }
}

/// `data source -> variable name -> definition`; `""` matches anything at
/// either level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorSchemeConfig(pub HashMap<String, HashMap<String, ColorSchemeDefinition>>);

impl ColorSchemeConfig {
    /// Most specific definition for the pair, exact keys before `""`
    pub fn lookup(&self, data_source: &str, variable_name: &str) -> Option<&ColorSchemeDefinition> {
        [
            (data_source, variable_name),
            (data_source, ""),
            ("", variable_name),
            ("", ""),
        ]
        .into_iter()
        .find_map(|(ds, var)| self.0.get(ds)?.get(var))
    }
}

fn parse_colors(colors: &[String]) -> Result<Vec<Color>, ColorError> {
    colors.iter().map(|c| Color::parse(c)).collect()
}

fn discrete_colors(scheme: Option<&SchemeSpec>, reverse: bool) -> Result<Vec<Color>, ColorError> {
    let resolved = match scheme {
        Some(SchemeSpec::Colors(colors)) => Some(parse_colors(colors)?),
        Some(SchemeSpec::Named(name)) => {
            let colors = palette::scheme(name);
            if colors.is_none() {
                warn!(name, "unknown discrete color scheme, using fallback");
            }
            colors
        }
        None => None,
    };
    let mut colors = resolved
        .filter(|colors| !colors.is_empty())
        .unwrap_or_else(palette::fallback_scheme);
    if reverse {
        colors.reverse();
    }
    Ok(colors)
}

fn sequential_interpolator(scheme: Option<&SchemeSpec>) -> Result<Interpolator, ColorError> {
    let resolved = match scheme {
        Some(SchemeSpec::Colors(colors)) => {
            let colors = parse_colors(colors)?;
            (!colors.is_empty()).then_some(Interpolator::Piecewise(colors))
        }
        Some(SchemeSpec::Named(name)) => {
            let interpolator = palette::interpolator(name);
            if interpolator.is_none() {
                warn!(name, "unknown color interpolator, using fallback");
            }
            interpolator
        }
        None => None,
    };
    Ok(resolved.unwrap_or_else(palette::fallback_interpolator))
}

/// Build the scale a definition describes; `None` gives the default
/// sequential blue to red scale.
///
/// The result still needs its data domain, see [`ColorScale::with_domain`].
pub fn generate_color_scale(definition: Option<&ColorSchemeDefinition>) -> Result<ColorScale, ColorError> {
    let default = ColorSchemeDefinition::default();
    let definition = definition.unwrap_or(&default);
    let scheme = definition.scheme.as_ref();
    let reverse = definition.reverse;
    debug!(kind = %definition.kind(), reverse, "generating color scale");

    Ok(match definition.kind() {
        ColorScaleType::Sequential => ColorScale::Sequential(SequentialScale {
            reverse,
            ..SequentialScale::new(sequential_interpolator(scheme)?)
        }),
        ColorScaleType::Quantize => {
            ColorScale::Quantize(QuantizeScale::new(discrete_colors(scheme, reverse)?))
        }
        ColorScaleType::Quantile => {
            ColorScale::Quantile(QuantileScale::new(discrete_colors(scheme, reverse)?))
        }
        ColorScaleType::Threshold => {
            let thresholds = definition.thresholds.as_deref().unwrap_or(&[0.0, 1.0]);
            ColorScale::Threshold(ThresholdScale::new(
                thresholds,
                discrete_colors(scheme, reverse)?,
            ))
        }
    })
}

/// Like [`generate_color_scale`], for a consumer that only handles some
/// scale types
pub fn generate_color_scale_for(
    definition: Option<&ColorSchemeDefinition>,
    supported: &[ColorScaleType],
) -> Result<ColorScale, ColorError> {
    let kind = definition.map(ColorSchemeDefinition::kind).unwrap_or_default();
    if !supported.contains(&kind) {
        return Err(ColorError::UnsupportedForLayer { kind });
    }
    generate_color_scale(definition)
}
