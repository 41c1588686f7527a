//! Populating a dataset in the value-cube encoding

use ahash::AHashMap;
use rusqlite::{params, params_from_iter, types::Value as SqlInput, Connection};
use tracing::debug;

use gv_core::{
    Dimension, DimensionId, DimensionIdAndValueDict, Location, LocationId, VariableId,
    VariableWithDimensions,
};

use super::{create_schema_sql, dimension_column, VALUE_TABLE};
use crate::DataError;

/// Writes locations, variables and values into a fresh dataset.
///
/// Remembers each variable's dimensions so that every value row carries
/// exactly one coordinate per dimension of its variable.
pub struct SchemaWriter<'conn> {
    conn: &'conn Connection,
    variable_dimensions: AHashMap<VariableId, Vec<DimensionId>>,
}

impl<'conn> SchemaWriter<'conn> {
    /// Create the tables and insert the dimension rows
    pub fn create(conn: &'conn Connection, dimensions: &[Dimension]) -> Result<Self, DataError> {
        let ids: Vec<DimensionId> = dimensions.iter().map(|d| d.id).collect();
        conn.execute_batch(&create_schema_sql(&ids))?;

        for dimension in dimensions {
            let value_labels = dimension
                .value_labels
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|source| DataError::Json {
                    column: "value_labels".to_string(),
                    source,
                })?;
            conn.execute(
                "INSERT INTO dimension (id, name, size, description, value_labels) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    dimension.id,
                    dimension.name,
                    dimension.size,
                    dimension.description,
                    value_labels
                ],
            )?;
        }
        debug!(dimensions = dimensions.len(), "created value-cube schema");

        Ok(Self {
            conn,
            variable_dimensions: AHashMap::new(),
        })
    }

    pub fn insert_location(&self, location: &Location) -> Result<(), DataError> {
        let to_json = |column: &str, value: &serde_json::Value| {
            serde_json::to_string(value).map_err(|source| DataError::Json {
                column: column.to_string(),
                source,
            })
        };
        self.conn.execute(
            "INSERT INTO location (id, geometry, metadata) VALUES (?1, ?2, ?3)",
            params![
                location.id,
                to_json("geometry", &location.geometry)?,
                to_json("metadata", &location.metadata)?
            ],
        )?;
        Ok(())
    }

    /// Insert a variable and its rows in the join table, in dimension order
    pub fn insert_variable(&mut self, variable: &VariableWithDimensions) -> Result<(), DataError> {
        let v = &variable.variable;
        self.conn.execute(
            "INSERT INTO variable (id, name, unit, description) VALUES (?1, ?2, ?3, ?4)",
            params![v.id, v.name, v.unit, v.description],
        )?;
        for dimension in &variable.dimensions {
            self.conn.execute(
                "INSERT INTO variable_dimension (variable, dimension) VALUES (?1, ?2)",
                params![v.id, dimension.id],
            )?;
        }

        let mut ids: Vec<DimensionId> = variable.dimensions.iter().map(|d| d.id).collect();
        ids.sort_unstable();
        ids.dedup();
        self.variable_dimensions.insert(v.id, ids);
        Ok(())
    }

    /// Insert one cell of the value cube
    pub fn insert_value(
        &self,
        location: LocationId,
        variable: VariableId,
        value: Option<f64>,
        coordinates: &DimensionIdAndValueDict,
    ) -> Result<(), DataError> {
        let expected = self
            .variable_dimensions
            .get(&variable)
            .ok_or_else(|| DataError::InvalidValue {
                column: "variable".to_string(),
                value: variable.to_string(),
            })?;
        let actual: Vec<DimensionId> = coordinates.keys().copied().collect();
        if *expected != actual {
            return Err(DataError::IncompleteCoordinates {
                variable,
                expected: expected.clone(),
                actual,
            });
        }

        let mut columns = vec!["location".to_string(), "variable".to_string(), "value".to_string()];
        let mut inputs = vec![
            SqlInput::Integer(location),
            SqlInput::Integer(variable),
            value.map(SqlInput::Real).unwrap_or(SqlInput::Null),
        ];
        for (dimension_id, coordinate) in coordinates {
            columns.push(dimension_column(*dimension_id));
            inputs.push(coordinate.map(SqlInput::Integer).unwrap_or(SqlInput::Null));
        }
        let placeholders = vec!["?"; inputs.len()].join(", ");
        let sql = format!(
            "INSERT INTO {VALUE_TABLE} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );
        self.conn.execute(&sql, params_from_iter(inputs))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gv_core::Variable;

    fn time() -> Dimension {
        Dimension {
            id: 5,
            name: "time".to_string(),
            size: 3,
            description: None,
            value_labels: None,
        }
    }

    fn temp() -> VariableWithDimensions {
        VariableWithDimensions {
            variable: Variable {
                id: 1,
                name: "temp".to_string(),
                unit: None,
                description: None,
            },
            dimensions: vec![time()],
        }
    }

    #[test]
    fn test_rejects_partial_coordinate_tuples() {
        let conn = Connection::open_in_memory().unwrap();
        let mut writer = SchemaWriter::create(&conn, &[time()]).unwrap();
        writer.insert_variable(&temp()).unwrap();

        let err = writer
            .insert_value(1, 1, Some(2.0), &DimensionIdAndValueDict::new())
            .unwrap_err();
        assert!(matches!(err, DataError::IncompleteCoordinates { variable: 1, .. }));

        let coordinates = DimensionIdAndValueDict::from([(5, None)]);
        writer.insert_value(1, 1, Some(2.0), &coordinates).unwrap();
        let nulls: i64 = conn
            .query_row("SELECT COUNT(*) FROM value WHERE dimension_5 IS NULL", [], |row| row.get(0))
            .unwrap();
        assert_eq!(nulls, 1);
    }

    #[test]
    fn test_rejects_unknown_variable() {
        let conn = Connection::open_in_memory().unwrap();
        let writer = SchemaWriter::create(&conn, &[time()]).unwrap();
        let err = writer
            .insert_value(1, 42, None, &DimensionIdAndValueDict::from([(5, Some(0))]))
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidValue { .. }));
    }
}
