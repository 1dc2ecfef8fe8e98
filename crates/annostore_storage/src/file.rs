//! Directory-backed blob store for persistent storage.

use crate::backend::{Blob, BlobStore, Generation};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".lock";
const COUNTER_FILE: &str = ".generation";
const HEADER_PREFIX: &str = "annostore-gen ";

/// A blob store that keeps each object in its own file under a root
/// directory.
///
/// Each object file starts with a one-line header carrying its generation,
/// followed by the raw object bytes. Writes go to a temporary file that is
/// renamed over the target, so readers never observe a torn object.
///
/// # Concurrency
///
/// Every operation holds an exclusive advisory lock on `<root>/.lock`, so
/// the compare-and-swap in [`BlobStore::put_if_generation`] is atomic across
/// threads and processes sharing the directory. Generations come from a
/// store-wide counter in `<root>/.generation`.
///
/// # Example
///
/// ```no_run
/// use annostore_storage::FileBlobStore;
/// use std::path::Path;
///
/// let store = FileBlobStore::open(Path::new("data")).unwrap();
/// assert_eq!(store.root(), Path::new("data"));
/// ```
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn run_locked<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> StorageResult<T> + Send + 'static,
    {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let lock = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(root.join(LOCK_FILE))?;
            lock.lock_exclusive()?;
            let result = op(&root);
            lock.unlock()?;
            result
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("storage task failed: {e}")))?
    }
}

fn object_file(root: &Path, path: &str) -> StorageResult<PathBuf> {
    let valid = !path.is_empty()
        && path.split('/').all(|part| {
            !part.is_empty()
                && !part.starts_with('.')
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        });
    if !valid {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(path.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part)))
}

fn read_object(file: &Path) -> StorageResult<Option<Blob>> {
    let mut raw = Vec::new();
    match File::open(file) {
        Ok(mut f) => {
            f.read_to_end(&mut raw)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let newline = raw
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| StorageError::Corrupted(format!("missing header in {}", file.display())))?;
    let header = std::str::from_utf8(&raw[..newline])
        .map_err(|_| StorageError::Corrupted(format!("bad header in {}", file.display())))?;
    let generation = header
        .strip_prefix(HEADER_PREFIX)
        .and_then(|n| n.trim().parse::<u64>().ok())
        .ok_or_else(|| StorageError::Corrupted(format!("bad header in {}", file.display())))?;

    Ok(Some(Blob::new(
        raw[newline + 1..].to_vec(),
        Generation::new(generation),
    )))
}

fn current_generation(file: &Path) -> StorageResult<Generation> {
    Ok(read_object(file)?
        .map(|blob| blob.generation)
        .unwrap_or(Generation::ABSENT))
}

fn next_generation(root: &Path) -> StorageResult<Generation> {
    let counter = root.join(COUNTER_FILE);
    let last = match fs::read_to_string(&counter) {
        Ok(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|_| StorageError::Corrupted("bad generation counter".into()))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e.into()),
    };
    let next = last + 1;
    write_atomic(&counter, next.to_string().as_bytes())?;
    Ok(Generation::new(next))
}

fn write_atomic(target: &Path, contents: &[u8]) -> StorageResult<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = target.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    fs::rename(&tmp, target)?;
    Ok(())
}

fn write_object(root: &Path, file: &Path, data: &[u8]) -> StorageResult<Generation> {
    let generation = next_generation(root)?;
    let mut contents = format!("{HEADER_PREFIX}{generation}\n").into_bytes();
    contents.extend_from_slice(data);
    write_atomic(file, &contents)?;
    Ok(generation)
}

fn collect_objects(root: &Path, dir: &Path, out: &mut Vec<String>) -> StorageResult<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name.ends_with(".tmp") {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_objects(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(parts.join("/"));
        }
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, path: &str) -> StorageResult<Option<Blob>> {
        let file = object_file(&self.root, path)?;
        self.run_locked(move |_| read_object(&file)).await
    }

    async fn put_if_generation(
        &self,
        path: &str,
        data: &[u8],
        expected: Generation,
    ) -> StorageResult<Generation> {
        let file = object_file(&self.root, path)?;
        let data = data.to_vec();
        self.run_locked(move |root| {
            let actual = current_generation(&file)?;
            if actual != expected {
                return Err(StorageError::PreconditionFailed { expected, actual });
            }
            write_object(root, &file, &data)
        })
        .await
    }

    async fn put(&self, path: &str, data: &[u8]) -> StorageResult<Generation> {
        let file = object_file(&self.root, path)?;
        let data = data.to_vec();
        self.run_locked(move |root| write_object(root, &file, &data))
            .await
    }

    async fn delete(&self, path: &str) -> StorageResult<bool> {
        let file = object_file(&self.root, path)?;
        self.run_locked(move |_| match fs::remove_file(&file) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix = prefix.to_string();
        self.run_locked(move |root| {
            let mut paths = Vec::new();
            collect_objects(root, root, &mut paths)?;
            paths.retain(|p| p.starts_with(&prefix));
            paths.sort();
            Ok(paths)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_missing_object() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();
        assert!(store.get("annotations/a.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_round_trip_with_generation() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();

        let g1 = store
            .put_if_generation("annotations/a.json", b"[1]", Generation::ABSENT)
            .await
            .unwrap();
        let blob = store.get("annotations/a.json").await.unwrap().unwrap();
        assert_eq!(blob.data, b"[1]");
        assert_eq!(blob.generation, g1);

        let g2 = store
            .put_if_generation("annotations/a.json", b"[1,2]", g1)
            .await
            .unwrap();
        assert!(g2 > g1);
    }

    #[tokio::test]
    async fn file_stale_generation_rejected() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();
        let g1 = store.put("doc.json", b"old").await.unwrap();
        store.put_if_generation("doc.json", b"new", g1).await.unwrap();

        let result = store.put_if_generation("doc.json", b"lost", g1).await;
        assert!(result.unwrap_err().is_precondition_failed());
        let blob = store.get("doc.json").await.unwrap().unwrap();
        assert_eq!(blob.data, b"new");
    }

    #[tokio::test]
    async fn file_data_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let generation = {
            let store = FileBlobStore::open(dir.path()).unwrap();
            store.put("doc.json", b"persistent").await.unwrap()
        };

        let store = FileBlobStore::open(dir.path()).unwrap();
        let blob = store.get("doc.json").await.unwrap().unwrap();
        assert_eq!(blob.data, b"persistent");
        assert_eq!(blob.generation, generation);

        let next = store.put("other.json", b"x").await.unwrap();
        assert!(next > generation);
    }

    #[tokio::test]
    async fn file_rejects_escaping_paths() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();
        for bad in ["", "../x", "a//b", ".lock", "a/../b", "/abs"] {
            assert!(
                matches!(store.get(bad).await, Err(StorageError::InvalidPath(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn file_list_and_delete() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();
        store.put("annotations/b.json", b"[]").await.unwrap();
        store.put("annotations/a.json", b"[]").await.unwrap();
        store.put("seed.json", b"[]").await.unwrap();

        let listed = store.list("annotations/").await.unwrap();
        assert_eq!(listed, vec!["annotations/a.json", "annotations/b.json"]);

        assert!(store.delete("annotations/a.json").await.unwrap());
        assert!(!store.delete("annotations/a.json").await.unwrap());
        assert_eq!(store.list("annotations/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_corrupted_header() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("broken.json"), b"no header here").unwrap();
        assert!(matches!(
            store.get("broken.json").await,
            Err(StorageError::Corrupted(_))
        ));
    }
}
