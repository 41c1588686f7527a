//! Dimensional data model
//!
//! A data source holds a value cube: `(location, variable, coordinates) -> value`.
//! Every variable is indexed by an ordered list of dimensions, and each
//! dimension has `size` valid coordinates `0..size`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type VariableId = i64;
pub type DimensionId = i64;
pub type LocationId = i64;

/// Index along one dimension
pub type Coordinate = i64;

/// Coordinates of one value, keyed by dimension id.
///
/// `None` means the coordinate is intentionally unset (`IS NULL` in the
/// value table), which is different from the key being absent.
pub type DimensionIdAndValueDict = BTreeMap<DimensionId, Option<Coordinate>>;

/// A measured quantity such as temperature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One indexing axis of the value cube, e.g. "time" or "depth"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: DimensionId,
    pub name: String,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_labels: Option<Vec<String>>,
}

impl Dimension {
    /// Whether `coordinate` addresses an existing slot along this axis
    pub fn contains(&self, coordinate: Coordinate) -> bool {
        (0..self.size).contains(&coordinate)
    }

    /// Display label for a coordinate, falling back to the index itself
    pub fn label(&self, coordinate: Coordinate) -> String {
        usize::try_from(coordinate)
            .ok()
            .and_then(|index| self.value_labels.as_ref()?.get(index).cloned())
            .unwrap_or_else(|| coordinate.to_string())
    }

    /// Labels for every coordinate in order
    pub fn labels(&self) -> Vec<String> {
        (0..self.size).map(|c| self.label(c)).collect()
    }
}

/// A variable together with the dimensions that index its values.
///
/// Dimensions appear in join-table order. A malformed join table can attach
/// the same dimension twice; no deduplication happens here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableWithDimensions {
    #[serde(flatten)]
    pub variable: Variable,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
}

impl VariableWithDimensions {
    pub fn new(variable: Variable) -> Self {
        Self {
            variable,
            dimensions: Vec::new(),
        }
    }

    pub fn id(&self) -> VariableId {
        self.variable.id
    }

    pub fn name(&self) -> &str {
        &self.variable.name
    }

    pub fn dimension(&self, id: DimensionId) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.id == id)
    }

    pub fn dimension_by_name(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }
}

/// A spatial identity values are attached to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    /// GeoJSON geometry object
    #[serde(default)]
    pub geometry: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One cell of the value cube with its location and variable resolved
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub location: Location,
    pub variable: Variable,
    pub value: Option<f64>,
    pub dimension_id_and_value_dict: DimensionIdAndValueDict,
}

/// The location the user clicked last
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSelection {
    pub data_source: String,
    pub location_id: LocationId,
}

/// A location the user pinned for comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPin {
    pub data_source: String,
    pub location_id: LocationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Selected coordinates per data source and variable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionValueDict(pub HashMap<String, HashMap<VariableId, DimensionIdAndValueDict>>);

impl DimensionValueDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coordinates selected for a variable of a data source
    pub fn get(&self, data_source: &str, variable_id: VariableId) -> Option<&DimensionIdAndValueDict> {
        self.0.get(data_source)?.get(&variable_id)
    }

    /// Copy of this dictionary with one coordinate replaced.
    ///
    /// Shared-state values are never mutated in place, so edits always go
    /// through a fresh dictionary.
    pub fn with_coordinate(
        &self,
        data_source: &str,
        variable_id: VariableId,
        dimension_id: DimensionId,
        coordinate: Option<Coordinate>,
    ) -> Self {
        let mut next = self.clone();
        next.0
            .entry(data_source.to_string())
            .or_default()
            .entry(variable_id)
            .or_default()
            .insert(dimension_id, coordinate);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_dimension() -> Dimension {
        Dimension {
            id: 5,
            name: "time".to_string(),
            size: 3,
            description: None,
            value_labels: Some(vec!["jan".into(), "feb".into()]),
        }
    }

    #[test]
    fn test_dimension_bounds() {
        let dimension = time_dimension();
        assert!(dimension.contains(0));
        assert!(dimension.contains(2));
        assert!(!dimension.contains(3));
        assert!(!dimension.contains(-1));
    }

    #[test]
    fn test_dimension_labels_fall_back_to_index() {
        let dimension = time_dimension();
        assert_eq!(dimension.labels(), vec!["jan", "feb", "2"]);
    }

    #[test]
    fn test_variable_with_dimensions_json_is_flat() {
        let json = r#"{"id":1,"name":"temp","unit":"K","dimensions":[{"id":5,"name":"time","size":3}]}"#;
        let variable: VariableWithDimensions = serde_json::from_str(json).unwrap();
        assert_eq!(variable.id(), 1);
        assert_eq!(variable.variable.unit.as_deref(), Some("K"));
        assert_eq!(variable.dimension_by_name("time").map(|d| d.id), Some(5));
    }

    #[test]
    fn test_dimension_value_dict_copy_on_write() {
        let original = DimensionValueDict::new().with_coordinate("ds1", 1, 5, Some(0));
        let edited = original.with_coordinate("ds1", 1, 5, Some(2));

        assert_eq!(original.get("ds1", 1).unwrap()[&5], Some(0));
        assert_eq!(edited.get("ds1", 1).unwrap()[&5], Some(2));
    }
}
