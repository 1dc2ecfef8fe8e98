//! Merge command implementation.
//!
//! Previews a save offline: merges one JSON file of records into another
//! without touching any store.

use super::read_records;
use annostore_model::{validate_keys, Document, Record};
use std::path::Path;

/// Merges `incoming` into `existing` the same way the server does.
pub fn merge_files(
    existing: Vec<Record>,
    incoming: Vec<Record>,
) -> Result<Document, Box<dyn std::error::Error>> {
    validate_keys(&incoming)?;
    let document = Document::from_records(existing)?;
    Ok(document.merge(incoming))
}

/// Runs the merge command.
pub fn run(
    existing: &Path,
    incoming: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let merged = merge_files(read_records(existing)?, read_records(incoming)?)?;
    let json = serde_json::to_string_pretty(merged.records())?;

    match output {
        Some(output) => {
            std::fs::write(output, json)?;
            println!("Wrote {} records to {}", merged.len(), output.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
