//! Load command implementation.

use annostore_model::{DatasetId, LoadResponse, LoadSource};
use annostore_server::{AnnotationServer, ServerConfig};
use annostore_storage::FileBlobStore;
use std::path::Path;
use std::sync::Arc;

/// Runs the load command.
pub async fn run(
    path: &Path,
    dataset: &str,
    fallback: Option<&Path>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetId::new(dataset)?;
    let mut server = AnnotationServer::new(ServerConfig::default(), Arc::new(FileBlobStore::open(path)?));
    if let Some(fallback) = fallback {
        server = server.with_fallback(Arc::new(FileBlobStore::open(fallback)?));
    }

    let (document, source) = server.load(&dataset).await?;
    let records = document.map(|d| d.into_records());

    match format {
        "json" => {
            let response = LoadResponse::success(records, source);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        _ => match records {
            None => println!("Dataset '{dataset}' has no document"),
            Some(records) => {
                let origin = match source {
                    LoadSource::Store => "store",
                    LoadSource::Fallback => "fallback store",
                };
                println!("Dataset '{dataset}' ({} records, from {origin})", records.len());
                for record in &records {
                    let position = record
                        .position()
                        .map_or_else(|| "-".to_string(), |p| p.to_string());
                    println!("  {position:>5}  {}", record.key().unwrap_or("<no key>"));
                }
            }
        },
    }

    Ok(())
}
