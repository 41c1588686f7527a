//! Per-consumer data configuration

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use gv_core::Coordinate;

/// Where a consumer takes its data from, overriding shared state.
///
/// Every field is optional; a missing field falls back to the matching
/// shared-state key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFrom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,
    /// Coordinates keyed by dimension **name**
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_value_dict: Option<BTreeMap<String, Option<Coordinate>>>,
}

/// Display names of data sources, `display name -> data source`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSourceNameDict(pub HashMap<String, String>);

impl DataSourceNameDict {
    /// Display name registered for `data_source`, else the data source itself
    pub fn display_name<'a>(&'a self, data_source: &'a str) -> &'a str {
        self.0
            .iter()
            .filter(|(_, source)| source.as_str() == data_source)
            .map(|(name, _)| name.as_str())
            .min()
            .unwrap_or(data_source)
    }

    pub fn data_source(&self, display_name: &str) -> Option<&str> {
        self.0.get(display_name).map(String::as_str)
    }
}
