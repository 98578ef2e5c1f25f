use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::db::models::{VehicleRecord, MANUFACTURER, MODEL_YEAR, VEHICLE_TYPE};

/// Columns that make up a record's storage key
const REQUIRED_COLUMNS: [&str; 3] = [MANUFACTURER, MODEL_YEAR, VEHICLE_TYPE];

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to open dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset is missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// Parse auto-trends CSV rows into records, one flat column mapping per row
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<VehicleRecord>, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DatasetError::MissingColumn(column));
        }
    }

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        records.push(
            headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.as_str(), v))
                .collect::<VehicleRecord>(),
        );
    }

    debug!("Parsed {} dataset rows", records.len());
    Ok(records)
}

pub fn load_file(path: &Path) -> Result<Vec<VehicleRecord>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_csv(file)
}
