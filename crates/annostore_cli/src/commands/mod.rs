//! CLI command implementations.

pub mod inspect;
pub mod load;
pub mod merge;
pub mod save;

use annostore_model::Record;
use std::path::Path;

/// Reads a JSON array of records from a file.
pub fn read_records(path: &Path) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let records: Vec<Record> = serde_json::from_slice(&bytes)
        .map_err(|e| format!("{} is not a JSON array of objects: {e}", path.display()))?;
    Ok(records)
}
