//! Decoding provider rows into model types

use gv_core::{
    Dimension, DimensionId, DimensionIdAndValueDict, Location, LocationId, Variable, VariableId,
};
use serde::Serialize;

use crate::schema::parse_dimension_column;
use crate::sources::{QueryResult, SqlValue};
use crate::DataError;

/// Extent of a variable's values; both ends are `None` when nothing matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MaxMin {
    pub max: Option<f64>,
    pub min: Option<f64>,
}

impl MaxMin {
    /// `(min, max)` when both ends are known
    pub fn extent(&self) -> Option<(f64, f64)> {
        Some((self.min?, self.max?))
    }
}

/// One row of the value table with ids left unresolved
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRecord {
    pub location_id: LocationId,
    pub variable_id: VariableId,
    pub value: Option<f64>,
    pub dimension_id_and_value_dict: DimensionIdAndValueDict,
}

impl ValueRecord {
    /// Keep only the coordinates of `dimensions`.
    ///
    /// `SELECT *` returns every `dimension_<id>` column of the table, so the
    /// columns of other variables' dimensions show up as `NULL`.
    pub fn restricted_to(mut self, dimensions: &[DimensionId]) -> Self {
        self.dimension_id_and_value_dict
            .retain(|id, _| dimensions.contains(id));
        self
    }
}

struct Rows<'a> {
    result: &'a QueryResult,
}

impl<'a> Rows<'a> {
    fn column(&self, name: &str) -> Result<usize, DataError> {
        self.result
            .column_index(name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))
    }

    fn optional_column(&self, name: &str) -> Option<usize> {
        self.result.column_index(name)
    }
}

fn invalid(column: &str, value: &SqlValue) -> DataError {
    DataError::InvalidValue {
        column: column.to_string(),
        value: format!("{value:?}"),
    }
}

/// The cell of `column`; rows shorter than the column list count as missing it
fn cell<'r>(row: &'r [SqlValue], index: usize, column: &str) -> Result<&'r SqlValue, DataError> {
    row.get(index)
        .ok_or_else(|| DataError::MissingColumn(column.to_string()))
}

fn integer(row: &[SqlValue], index: usize, column: &str) -> Result<i64, DataError> {
    let value = cell(row, index, column)?;
    value.as_i64().ok_or_else(|| invalid(column, value))
}

fn optional_integer(row: &[SqlValue], index: usize, column: &str) -> Result<Option<i64>, DataError> {
    match cell(row, index, column)? {
        SqlValue::Null => Ok(None),
        value => value.as_i64().map(Some).ok_or_else(|| invalid(column, value)),
    }
}

fn text(row: &[SqlValue], index: usize, column: &str) -> Result<String, DataError> {
    let value = cell(row, index, column)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(column, value))
}

fn optional_text(row: &[SqlValue], index: Option<usize>, column: &str) -> Result<Option<String>, DataError> {
    let Some(index) = index else {
        return Ok(None);
    };
    match cell(row, index, column)? {
        SqlValue::Null => Ok(None),
        value => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| invalid(column, value)),
    }
}

fn optional_real(row: &[SqlValue], index: usize, column: &str) -> Result<Option<f64>, DataError> {
    match cell(row, index, column)? {
        SqlValue::Null => Ok(None),
        value => value.as_f64().map(Some).ok_or_else(|| invalid(column, value)),
    }
}

fn json<T: serde::de::DeserializeOwned>(
    row: &[SqlValue],
    index: Option<usize>,
    column: &str,
) -> Result<Option<T>, DataError> {
    let Some(raw) = optional_text(row, index, column)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| DataError::Json {
            column: column.to_string(),
            source,
        })
}

pub fn decode_locations(result: &QueryResult) -> Result<Vec<Location>, DataError> {
    if result.is_empty() {
        return Ok(Vec::new());
    }
    let rows = Rows { result };
    let id = rows.column("id")?;
    let geometry = rows.optional_column("geometry");
    let metadata = rows.optional_column("metadata");

    result
        .values
        .iter()
        .map(|row| {
            Ok(Location {
                id: integer(row, id, "id")?,
                geometry: json(row, geometry, "geometry")?.unwrap_or_default(),
                metadata: json(row, metadata, "metadata")?.unwrap_or_default(),
            })
        })
        .collect()
}

pub fn decode_dimensions(result: &QueryResult) -> Result<Vec<Dimension>, DataError> {
    if result.is_empty() {
        return Ok(Vec::new());
    }
    let rows = Rows { result };
    let id = rows.column("id")?;
    let name = rows.column("name")?;
    let size = rows.column("size")?;
    let description = rows.optional_column("description");
    let value_labels = rows.optional_column("value_labels");

    result
        .values
        .iter()
        .map(|row| {
            Ok(Dimension {
                id: integer(row, id, "id")?,
                name: text(row, name, "name")?,
                size: integer(row, size, "size")?,
                description: optional_text(row, description, "description")?,
                value_labels: json(row, value_labels, "value_labels")?,
            })
        })
        .collect()
}

pub fn decode_variables(result: &QueryResult) -> Result<Vec<Variable>, DataError> {
    if result.is_empty() {
        return Ok(Vec::new());
    }
    let rows = Rows { result };
    let id = rows.column("id")?;
    let name = rows.column("name")?;
    let unit = rows.optional_column("unit");
    let description = rows.optional_column("description");

    result
        .values
        .iter()
        .map(|row| {
            Ok(Variable {
                id: integer(row, id, "id")?,
                name: text(row, name, "name")?,
                unit: optional_text(row, unit, "unit")?,
                description: optional_text(row, description, "description")?,
            })
        })
        .collect()
}

pub fn decode_variable_dimension_links(
    result: &QueryResult,
) -> Result<Vec<(VariableId, DimensionId)>, DataError> {
    if result.is_empty() {
        return Ok(Vec::new());
    }
    let rows = Rows { result };
    let variable = rows.column("variable")?;
    let dimension = rows.column("dimension")?;

    result
        .values
        .iter()
        .map(|row| Ok((integer(row, variable, "variable")?, integer(row, dimension, "dimension")?)))
        .collect()
}

pub fn decode_max_min(result: &QueryResult) -> Result<MaxMin, DataError> {
    let Some(row) = result.values.first() else {
        return Ok(MaxMin::default());
    };
    let rows = Rows { result };
    let max = rows.column("max")?;
    let min = rows.column("min")?;
    Ok(MaxMin {
        max: optional_real(row, max, "max")?,
        min: optional_real(row, min, "min")?,
    })
}

pub fn decode_value_records(result: &QueryResult) -> Result<Vec<ValueRecord>, DataError> {
    if result.is_empty() {
        return Ok(Vec::new());
    }
    let rows = Rows { result };
    let location = rows.column("location")?;
    let variable = rows.column("variable")?;
    let value = rows.column("value")?;
    let dimension_columns: Vec<(usize, DimensionId, &str)> = result
        .columns
        .iter()
        .enumerate()
        .filter_map(|(index, column)| {
            parse_dimension_column(column).map(|id| (index, id, column.as_str()))
        })
        .collect();

    result
        .values
        .iter()
        .map(|row| {
            let mut coordinates = DimensionIdAndValueDict::new();
            for (index, dimension_id, column) in &dimension_columns {
                coordinates.insert(*dimension_id, optional_integer(row, *index, column)?);
            }
            Ok(ValueRecord {
                location_id: integer(row, location, "location")?,
                variable_id: integer(row, variable, "variable")?,
                value: optional_real(row, value, "value")?,
                dimension_id_and_value_dict: coordinates,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(columns: &[&str], values: Vec<Vec<SqlValue>>) -> QueryResult {
        QueryResult {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values,
        }
    }

    #[test]
    fn test_decode_value_records() {
        let result = result(
            &["location", "variable", "value", "dimension_5", "dimension_6"],
            vec![vec![
                SqlValue::Integer(1),
                SqlValue::Integer(2),
                SqlValue::Integer(3),
                SqlValue::Integer(0),
                SqlValue::Null,
            ]],
        );
        let records = decode_value_records(&result).unwrap();
        assert_eq!(records[0].value, Some(3.0));
        assert_eq!(
            records[0].dimension_id_and_value_dict,
            DimensionIdAndValueDict::from([(5, Some(0)), (6, None)])
        );

        let restricted = records[0].clone().restricted_to(&[5]);
        assert_eq!(
            restricted.dimension_id_and_value_dict,
            DimensionIdAndValueDict::from([(5, Some(0))])
        );
    }

    #[test]
    fn test_decode_dimensions_parses_value_labels() {
        let result = result(
            &["id", "name", "size", "description", "value_labels"],
            vec![vec![
                SqlValue::Integer(5),
                SqlValue::Text("time".into()),
                SqlValue::Integer(2),
                SqlValue::Null,
                SqlValue::Text(r#"["2020","2021"]"#.into()),
            ]],
        );
        let dimensions = decode_dimensions(&result).unwrap();
        assert_eq!(
            dimensions[0].value_labels,
            Some(vec!["2020".to_string(), "2021".to_string()])
        );
        assert_eq!(dimensions[0].description, None);
    }

    #[test]
    fn test_bad_json_names_the_column() {
        let result = result(
            &["id", "geometry", "metadata"],
            vec![vec![SqlValue::Integer(1), SqlValue::Text("{".into()), SqlValue::Null]],
        );
        let err = decode_locations(&result).unwrap_err();
        assert!(matches!(err, DataError::Json { ref column, .. } if column == "geometry"));
    }

    #[test]
    fn test_decode_max_min() {
        let empty = result(&["max", "min"], vec![vec![SqlValue::Null, SqlValue::Null]]);
        assert_eq!(decode_max_min(&empty).unwrap().extent(), None);

        let full = result(&["max", "min"], vec![vec![SqlValue::Real(9.5), SqlValue::Integer(-1)]]);
        assert_eq!(decode_max_min(&full).unwrap().extent(), Some((-1.0, 9.5)));

        assert_eq!(decode_max_min(&QueryResult::default()).unwrap(), MaxMin::default());
    }

    #[test]
    fn test_missing_column() {
        let result = result(&["id"], vec![vec![SqlValue::Integer(1)]]);
        assert!(matches!(
            decode_variables(&result),
            Err(DataError::MissingColumn(column)) if column == "name"
        ));
    }

    #[test]
    fn test_short_row_is_a_missing_column() {
        let short = result(
            &["location", "variable", "value", "dimension_5"],
            vec![vec![SqlValue::Integer(1), SqlValue::Integer(2)]],
        );
        assert!(matches!(
            decode_value_records(&short),
            Err(DataError::MissingColumn(column)) if column == "dimension_5"
        ));

        let short = result(&["id", "name", "unit"], vec![vec![SqlValue::Integer(1), SqlValue::Text("t".into())]]);
        assert!(matches!(
            decode_variables(&short),
            Err(DataError::MissingColumn(column)) if column == "unit"
        ));
    }
}
