//! Benchmark utilities.

use annostore_model::Record;
use rand::Rng;

/// Generates `count` records keyed `img_00000.jpg`, `img_00001.jpg`, ...
/// with a few random annotation fields.
pub fn generate_records(count: usize) -> Vec<Record> {
    generate_records_from(0, count)
}

/// Like [`generate_records`], starting at key index `start`.
pub fn generate_records_from(start: usize, count: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    (start..start + count)
        .map(|i| {
            Record::with_key(format!("img_{i:05}.jpg"))
                .with("label", ["cat", "dog", "bird"][rng.gen_range(0..3)])
                .with("confidence", rng.gen::<f64>())
                .with("reviewed", rng.gen::<bool>())
        })
        .collect()
}

/// Picks `count` random existing keys (with fresh content) plus `new`
/// records with unseen keys, shuffled together.
pub fn edit_batch(existing: usize, count: usize, new: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    let mut batch: Vec<Record> = (0..count)
        .map(|_| {
            Record::with_key(format!("img_{:05}.jpg", rng.gen_range(0..existing.max(1))))
                .with("label", "edited")
        })
        .collect();
    batch.extend(generate_records_from(existing, new));
    for i in (1..batch.len()).rev() {
        batch.swap(i, rng.gen_range(0..=i));
    }
    batch
}
