//! Color scales for value cubes
//!
//! A [`ColorSchemeDefinition`] names a scale type and a palette; together
//! with the domain data its scale type asks for it becomes a [`ColorScale`]
//! mapping values to colors. Legends are derived from the same scale.

pub mod color;
pub mod legend;
pub mod palette;
pub mod scale;
pub mod scheme;

use thiserror::Error;

// Re-exports
pub use color::Color;
pub use legend::{format_tick, generate_gradient_css, legend_ticks};
pub use palette::Interpolator;
pub use scale::{
    ColorScale, ColorScaleType, DomainRequirement, QuantileScale, QuantizeScale, ScaleDomain,
    SequentialScale, ThresholdScale,
};
pub use scheme::{
    generate_color_scale, generate_color_scale_for, ColorSchemeConfig, ColorSchemeDefinition,
    SchemeSpec,
};

/// Errors that can occur while building color scales
#[derive(Error, Debug)]
pub enum ColorError {
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("{kind} color scale is not supported for this layer")]
    UnsupportedForLayer { kind: ColorScaleType },

    #[error("{kind} color scale needs {expected:?} domain data")]
    MissingDomain {
        kind: ColorScaleType,
        expected: DomainRequirement,
    },

    #[error("Invalid color scheme definition: {0}")]
    Definition(#[from] serde_json::Error),
}
