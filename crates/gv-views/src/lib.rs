//! Visual consumers of the shared state
//!
//! Each consumer diffs incoming snapshots, asks its registry what the
//! changed keys require, and rebuilds only that part of its render model.
//! Models are plain data; drawing them is left to the host.

mod consumer;
pub mod legend;
pub mod line_chart;
pub mod value_layer;

pub use consumer::Consumer;
pub use legend::{Legend, LegendConfig, LegendModel, LegendScale};
pub use line_chart::{
    ChartDataFor, LineChart, LineChartConfig, LineChartModel, LineSeries, LocationSeries,
    VariableSeries,
};
pub use value_layer::{FeatureStyle, ValueLayer, ValueLayerConfig};

use thiserror::Error;

use gv_color::ColorError;
use gv_data::DataError;

/// Errors that can occur while recomputing a view
#[derive(Error, Debug)]
pub enum ViewError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Color scale error: {0}")]
    Color(#[from] ColorError),
}
