//! Inspect command implementation.

use annostore_model::{DatasetId, Document};
use annostore_storage::{BlobStore, FileBlobStore};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store root.
    pub path: String,
    /// One entry per dataset document.
    pub datasets: Vec<DatasetStats>,
}

/// Statistics for a single dataset.
#[derive(Debug, Serialize)]
pub struct DatasetStats {
    /// Dataset id.
    pub dataset: String,
    /// Generation of the stored document.
    pub generation: u64,
    /// Document size in bytes.
    pub size: usize,
    /// Number of records, or `None` if the document does not decode.
    pub records: Option<usize>,
}

/// Runs the inspect command.
pub async fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    let store = FileBlobStore::open(path)?;

    let mut datasets = Vec::new();
    for object in store.list(annostore_model::DOCUMENT_PREFIX).await? {
        let Some(dataset) = DatasetId::from_object_path(&object) else {
            continue;
        };
        let Some(blob) = store.get(&object).await? else {
            continue;
        };
        datasets.push(DatasetStats {
            dataset: dataset.to_string(),
            generation: blob.generation.get(),
            size: blob.data.len(),
            records: Document::from_slice(&blob.data).ok().map(|d| d.len()),
        });
    }

    let result = InspectResult {
        path: path.display().to_string(),
        datasets,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("annostore Store Inspection");
    println!("==========================");
    println!();
    println!("Path: {}", result.path);
    println!();

    if result.datasets.is_empty() {
        println!("No datasets.");
        return;
    }
    println!("Datasets:");
    for stats in &result.datasets {
        let records = stats
            .records
            .map_or_else(|| "corrupt".to_string(), |n| format!("{n} records"));
        println!(
            "  {:<24} generation {:<6} {:>10}  {}",
            stats.dataset,
            stats.generation,
            format_size(stats.size as u64),
            records
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
