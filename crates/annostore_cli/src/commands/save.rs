//! Save command implementation.

use super::read_records;
use annostore_model::{DatasetId, SaveMode};
use annostore_server::{AnnotationServer, RetryConfig, ServerConfig};
use annostore_storage::FileBlobStore;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Runs the save command.
pub async fn run(
    path: &Path,
    dataset: &str,
    file: &Path,
    replace: bool,
    attempts: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetId::new(dataset)?;
    let records = read_records(file)?;
    debug!(file = %file.display(), records = records.len(), "read records");
    let mode = if replace {
        SaveMode::Replace
    } else {
        SaveMode::Merge
    };

    let config = ServerConfig::new().with_retry(RetryConfig::new(attempts));
    let server = AnnotationServer::new(config, Arc::new(FileBlobStore::open(path)?));
    let outcome = server.try_save(records, &dataset, mode).await?;

    println!(
        "{} {} records into '{dataset}' (generation {}, {} attempt{}, {} records total)",
        if outcome.merged { "Merged" } else { "Replaced with" },
        outcome.records_written,
        outcome.generation,
        outcome.attempts,
        if outcome.attempts == 1 { "" } else { "s" },
        outcome.document_len,
    );
    Ok(())
}
