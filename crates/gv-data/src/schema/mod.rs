//! Relational encoding of the value cube
//!
//! ```text
//! location(id, geometry, metadata)               geometry/metadata are JSON text
//! variable(id, name, unit, description)
//! dimension(id, name, size, description, value_labels)   value_labels is JSON text
//! variable_dimension(variable, dimension)
//! value(location, variable, value, dimension_<id>...)
//! ```
//!
//! The value table has one `dimension_<id>` column per dimension. A row of a
//! variable fills exactly the columns of that variable's dimensions.

mod writer;

pub use writer::SchemaWriter;

use gv_core::DimensionId;

pub const LOCATION_TABLE: &str = "location";
pub const VARIABLE_TABLE: &str = "variable";
pub const DIMENSION_TABLE: &str = "dimension";
pub const VARIABLE_DIMENSION_TABLE: &str = "variable_dimension";
pub const VALUE_TABLE: &str = "value";

pub const LOCATION_COLUMNS: [&str; 3] = ["id", "geometry", "metadata"];
pub const VARIABLE_COLUMNS: [&str; 4] = ["id", "name", "unit", "description"];
pub const DIMENSION_COLUMNS: [&str; 5] = ["id", "name", "size", "description", "value_labels"];

const DIMENSION_COLUMN_PREFIX: &str = "dimension_";

/// Name of the value-table column holding coordinates along `id`
pub fn dimension_column(id: DimensionId) -> String {
    format!("{DIMENSION_COLUMN_PREFIX}{id}")
}

/// Dimension id encoded in a value-table column name
pub fn parse_dimension_column(column: &str) -> Option<DimensionId> {
    column.strip_prefix(DIMENSION_COLUMN_PREFIX)?.parse().ok()
}

/// DDL for an empty dataset whose value table covers `dimension_ids`
pub fn create_schema_sql(dimension_ids: &[DimensionId]) -> String {
    let dimension_columns: String = dimension_ids
        .iter()
        .map(|id| format!(",\n    {} INTEGER", dimension_column(*id)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {LOCATION_TABLE} (
    id INTEGER PRIMARY KEY,
    geometry TEXT,
    metadata TEXT
);
CREATE TABLE IF NOT EXISTS {VARIABLE_TABLE} (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    unit TEXT,
    description TEXT
);
CREATE TABLE IF NOT EXISTS {DIMENSION_TABLE} (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    size INTEGER NOT NULL,
    description TEXT,
    value_labels TEXT
);
CREATE TABLE IF NOT EXISTS {VARIABLE_DIMENSION_TABLE} (
    variable INTEGER NOT NULL,
    dimension INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS {VALUE_TABLE} (
    location INTEGER NOT NULL,
    variable INTEGER NOT NULL,
    value REAL{dimension_columns}
);
CREATE INDEX IF NOT EXISTS idx_value_variable ON {VALUE_TABLE}(variable);
CREATE INDEX IF NOT EXISTS idx_value_location ON {VALUE_TABLE}(location);
"
    )
}
