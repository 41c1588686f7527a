//! Name to id resolution against shared state and layer configuration
//!
//! A consumer's [`DataFrom`] wins over shared state; anything it leaves out
//! is read from the snapshot.

use std::collections::BTreeMap;

use tracing::debug;

use gv_core::{
    Coordinate, Dimension, DimensionIdAndValueDict, SharedState, VariableId, VariableWithDimensions,
};

use crate::config::DataFrom;
use crate::service::DataService;
use crate::DataError;

/// Data source from the configuration, else `currentDataSource`
pub fn obtain_current_data_source(data_from: Option<&DataFrom>, state: &SharedState) -> Option<String> {
    data_from
        .and_then(|d| d.data_source.clone())
        .or_else(|| state.current_data_source().map(str::to_string))
}

pub fn resolve_variable_id(variables: &[VariableWithDimensions], name: &str) -> Option<VariableId> {
    variables.iter().find(|v| v.name() == name).map(|v| v.id())
}

/// The variable a consumer displays.
///
/// A configured variable name is looked up in the metadata cache; when it
/// is absent or unknown the `currentVariableId` of the snapshot is used.
pub async fn obtain_current_variable(
    service: &DataService,
    data_source: &str,
    data_from: Option<&DataFrom>,
    state: &SharedState,
) -> Result<Option<VariableWithDimensions>, DataError> {
    let variables = service.available_variables(data_source).await?;
    let by_name = data_from
        .and_then(|d| d.variable_name.as_deref())
        .and_then(|name| {
            let id = resolve_variable_id(&variables, name);
            if id.is_none() {
                debug!(data_source, name, "configured variable name is unknown");
            }
            id
        });
    let Some(id) = by_name.or_else(|| state.current_variable_id()) else {
        return Ok(None);
    };
    Ok(variables.iter().find(|v| v.id() == id).cloned())
}

/// Translate a `dimension name -> coordinate` map into dimension ids.
///
/// Fails as a whole when any name is not a dimension of the variable.
pub fn obtain_dimension_id_and_value_dict(
    dimensions: &[Dimension],
    by_name: &BTreeMap<String, Option<Coordinate>>,
) -> Option<DimensionIdAndValueDict> {
    by_name
        .iter()
        .map(|(name, coordinate)| {
            let dimension = dimensions.iter().find(|d| &d.name == name)?;
            Some((dimension.id, *coordinate))
        })
        .collect()
}

/// Coordinates for the values a consumer displays.
///
/// Configured coordinates win; otherwise the snapshot's
/// `dimensionValueDict[data_source][variable]`. A variable without
/// dimensions needs no coordinates and resolves to an empty map.
pub fn obtain_current_dimension_id_and_value_dict(
    data_source: &str,
    variable: &VariableWithDimensions,
    data_from: Option<&DataFrom>,
    state: &SharedState,
) -> Option<DimensionIdAndValueDict> {
    let configured = data_from
        .and_then(|d| d.dimension_value_dict.as_ref())
        .and_then(|by_name| obtain_dimension_id_and_value_dict(&variable.dimensions, by_name));
    if configured.is_some() {
        return configured;
    }
    let from_state = state
        .dimension_value_dict()
        .and_then(|dict| dict.get(data_source, variable.id()).cloned());
    if from_state.is_some() {
        return from_state;
    }
    variable
        .dimensions
        .is_empty()
        .then(DimensionIdAndValueDict::new)
}
