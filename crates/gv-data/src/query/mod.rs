//! Query objects for the fixed query shapes of the visualization
//!
//! A query object is JSON-compatible:
//!
//! ```json
//! { "for": "values", "filter": { "variable": 1, "dimensionIdAndValueDict": { "5": 1 } } }
//! ```
//!
//! [`translate`] turns it into a parameterized [`Statement`]; [`decode`]
//! turns the provider's rows back into model types.

mod decode;
mod translate;

pub use decode::{
    decode_dimensions, decode_locations, decode_max_min, decode_value_records,
    decode_variable_dimension_links, decode_variables, MaxMin, ValueRecord,
};
pub use translate::{translate, variable_dimension_links, SqlParam, Statement};

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use gv_core::{Coordinate, DimensionId, DimensionIdAndValueDict, LocationId, VariableId};

/// One of the five query shapes, tagged by `for`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "for", rename_all = "kebab-case")]
pub enum QueryObject {
    Locations {
        #[serde(default)]
        filter: LocationFilter,
    },
    Dimensions {
        #[serde(default)]
        filter: MetadataFilter,
    },
    Variables {
        #[serde(default)]
        filter: MetadataFilter,
    },
    MaxMinValue {
        #[serde(default)]
        filter: MaxMinFilter,
    },
    Values {
        #[serde(default)]
        filter: ValueFilter,
    },
}

impl QueryObject {
    /// The `for` tag of this query
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Locations { .. } => "locations",
            Self::Dimensions { .. } => "dimensions",
            Self::Variables { .. } => "variables",
            Self::MaxMinValue { .. } => "max-min-value",
            Self::Values { .. } => "values",
        }
    }
}

/// A scalar or a list, as accepted by several filter fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }
}

impl From<i64> for OneOrMany<i64> {
    fn from(value: i64) -> Self {
        Self::One(value)
    }
}

impl From<Vec<i64>> for OneOrMany<i64> {
    fn from(values: Vec<i64>) -> Self {
        Self::Many(values)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<LocationId>>,
}

/// Filter for the `variables` and `dimensions` queries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaxMinFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<LocationId>>,
    /// Dimension-scoped extents are not supported; setting this makes the
    /// query untranslatable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<DimensionId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<VariableId>>,
}

impl MaxMinFilter {
    pub fn for_variable(variable: VariableId) -> Self {
        Self {
            variables: Some(vec![variable]),
            ..Self::default()
        }
    }
}

/// Constraint on one dimension column of the value table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionCondition {
    /// No constraint; the clause is omitted
    Unconstrained,
    /// `dimension_<id> IS NULL`
    IsNull,
    /// `dimension_<id> IN (...)`
    In(Vec<Coordinate>),
}

impl DimensionCondition {
    pub fn at(coordinate: Coordinate) -> Self {
        Self::In(vec![coordinate])
    }

    /// Coordinates this condition selects, if it selects by value
    pub fn coordinates(&self) -> Option<&[Coordinate]> {
        match self {
            Self::In(coordinates) => Some(coordinates),
            _ => None,
        }
    }
}

impl From<Option<Coordinate>> for DimensionCondition {
    fn from(value: Option<Coordinate>) -> Self {
        match value {
            Some(coordinate) => Self::at(coordinate),
            None => Self::IsNull,
        }
    }
}

impl Serialize for DimensionCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unconstrained | Self::IsNull => serializer.serialize_none(),
            Self::In(coordinates) if coordinates.len() == 1 => {
                serializer.serialize_i64(coordinates[0])
            }
            Self::In(coordinates) => coordinates.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DimensionCondition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<OneOrMany<Coordinate>>::deserialize(deserializer)?;
        Ok(match raw {
            None => Self::IsNull,
            Some(coordinates) => Self::In(coordinates.to_vec()),
        })
    }
}

pub type DimensionConditions = BTreeMap<DimensionId, DimensionCondition>;

/// Filter for the `values` query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<OneOrMany<LocationId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<OneOrMany<VariableId>>,
    #[serde(
        rename = "dimensionIdAndValueDict",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_conditions"
    )]
    pub dimension_id_and_value_dict: Option<DimensionConditions>,
}

impl ValueFilter {
    pub fn for_variable(variable: impl Into<OneOrMany<VariableId>>) -> Self {
        Self {
            variable: Some(variable.into()),
            ..Self::default()
        }
    }

    pub fn at_locations(mut self, location: impl Into<OneOrMany<LocationId>>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_condition(mut self, dimension: DimensionId, condition: DimensionCondition) -> Self {
        self.dimension_id_and_value_dict
            .get_or_insert_with(BTreeMap::new)
            .insert(dimension, condition);
        self
    }

    /// Constrain every dimension of `coordinates`, `None` meaning `IS NULL`
    pub fn with_coordinates(mut self, coordinates: &DimensionIdAndValueDict) -> Self {
        let conditions = self
            .dimension_id_and_value_dict
            .get_or_insert_with(BTreeMap::new);
        for (dimension, coordinate) in coordinates {
            conditions.insert(*dimension, DimensionCondition::from(*coordinate));
        }
        self
    }

    pub fn variables(&self) -> Vec<VariableId> {
        self.variable.as_ref().map(OneOrMany::to_vec).unwrap_or_default()
    }

    pub fn locations(&self) -> Option<Vec<LocationId>> {
        self.location.as_ref().map(OneOrMany::to_vec)
    }
}

// Unconstrained entries have no JSON form, so they are left out of the map.
fn serialize_conditions<S: Serializer>(
    conditions: &Option<DimensionConditions>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match conditions {
        Some(conditions) => serializer.collect_map(
            conditions
                .iter()
                .filter(|(_, condition)| **condition != DimensionCondition::Unconstrained),
        ),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values_query() {
        let json = r#"{
            "for": "values",
            "filter": {
                "location": [1, 2],
                "variable": 1,
                "dimensionIdAndValueDict": { "5": 1, "6": [0, 2], "7": null }
            }
        }"#;
        let query: QueryObject = serde_json::from_str(json).unwrap();
        let QueryObject::Values { filter } = query else {
            panic!("expected a values query");
        };
        assert_eq!(filter.variables(), vec![1]);
        assert_eq!(filter.locations(), Some(vec![1, 2]));
        let conditions = filter.dimension_id_and_value_dict.unwrap();
        assert_eq!(conditions[&5], DimensionCondition::at(1));
        assert_eq!(conditions[&6], DimensionCondition::In(vec![0, 2]));
        assert_eq!(conditions[&7], DimensionCondition::IsNull);
    }

    #[test]
    fn test_filter_is_optional() {
        let query: QueryObject = serde_json::from_str(r#"{"for": "locations"}"#).unwrap();
        assert_eq!(
            query,
            QueryObject::Locations {
                filter: LocationFilter::default()
            }
        );
        let query: QueryObject = serde_json::from_str(r#"{"for": "max-min-value"}"#).unwrap();
        assert_eq!(query.kind(), "max-min-value");
    }

    #[test]
    fn test_unconstrained_entries_are_not_serialized() {
        let filter = ValueFilter::for_variable(1_i64)
            .with_condition(5, DimensionCondition::Unconstrained)
            .with_condition(6, DimensionCondition::IsNull);
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "variable": 1, "dimensionIdAndValueDict": { "6": null } })
        );
    }

    #[test]
    fn test_unknown_query_shape_is_rejected() {
        let result = serde_json::from_str::<QueryObject>(r#"{"for": "everything"}"#);
        assert!(result.is_err());
    }
}
