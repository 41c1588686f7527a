//! Create a sample value-cube database with demo data

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use gv_core::{
    Dimension, DimensionIdAndValueDict, Location, LocationId, Variable, VariableWithDimensions,
};
use gv_data::schema::SchemaWriter;

const TIME: i64 = 1;
const DEPTH: i64 = 2;
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Shape of the generated dataset
#[derive(Debug, Clone, Copy)]
pub struct SampleOptions {
    pub locations: i64,
    pub seed: u32,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            locations: 25,
            seed: 42,
        }
    }
}

/// Create the database file at `path`, replacing an existing one
pub fn create_sample_database(path: &Path, options: SampleOptions) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    populate(&conn, options)?;
    info!(path = %path.display(), locations = options.locations, "sample database created");
    Ok(())
}

/// Monitoring stations on a grid measuring temperature monthly and
/// salinity per depth layer; a few cells are left empty
pub fn populate(conn: &Connection, options: SampleOptions) -> Result<()> {
    let time = Dimension {
        id: TIME,
        name: "month".into(),
        size: MONTHS.len() as i64,
        description: Some("Month of the year".into()),
        value_labels: Some(MONTHS.iter().map(|m| m.to_string()).collect()),
    };
    let depth = Dimension {
        id: DEPTH,
        name: "depth".into(),
        size: 3,
        description: None,
        value_labels: Some(vec!["surface".into(), "middle".into(), "bottom".into()]),
    };

    let mut writer = SchemaWriter::create(conn, &[time.clone(), depth.clone()])?;
    let mut rng = options.seed;

    let side = (options.locations as f64).sqrt().ceil().max(1.0) as i64;
    for id in 1..=options.locations {
        let (row, col) = ((id - 1) / side, (id - 1) % side);
        writer.insert_location(&Location {
            id,
            geometry: serde_json::json!({
                "type": "Point",
                "coordinates": [10.0 + col as f64 * 0.5, 50.0 + row as f64 * 0.5],
            }),
            metadata: serde_json::json!({"name": format!("Station {id:03}")}),
        })?;
    }

    let mut temperature = VariableWithDimensions::new(Variable {
        id: 1,
        name: "temperature".into(),
        unit: Some("°C".into()),
        description: Some("Monthly mean water temperature".into()),
    });
    temperature.dimensions.push(time);
    writer.insert_variable(&temperature)?;

    let mut salinity = VariableWithDimensions::new(Variable {
        id: 2,
        name: "salinity".into(),
        unit: Some("PSU".into()),
        description: None,
    });
    salinity.dimensions.push(depth);
    writer.insert_variable(&salinity)?;

    conn.execute_batch("BEGIN")?;
    for location in 1..=options.locations {
        insert_location_values(&writer, location, &mut rng)?;
    }
    conn.execute_batch("COMMIT")?;
    Ok(())
}

fn insert_location_values(writer: &SchemaWriter<'_>, location: LocationId, rng: &mut u32) -> Result<()> {
    let offset = random_float(rng) * 4.0;
    for month in 0..MONTHS.len() as i64 {
        let season = (month as f64 / 12.0 * std::f64::consts::TAU).sin();
        let value = if random_float(rng) < 0.05 {
            None
        } else {
            Some(round(8.0 + offset + 6.0 * season + random_float(rng)))
        };
        writer.insert_value(location, 1, value, &DimensionIdAndValueDict::from([(TIME, Some(month))]))?;
    }

    let base = 30.0 + random_float(rng) * 5.0;
    for layer in 0..3 {
        let value = round(base + layer as f64 * 0.8 + random_float(rng) * 0.3);
        writer.insert_value(
            location,
            2,
            Some(value),
            &DimensionIdAndValueDict::from([(DEPTH, Some(layer))]),
        )?;
    }
    Ok(())
}

fn round(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn random_float(seed: &mut u32) -> f64 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    (*seed as f64) / (u32::MAX as f64)
}
