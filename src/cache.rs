// Memoized dataset loading

use crate::csv_reader::{self, TextEncoding};
use crate::data::Dataset;
use crate::error::{DashboardError, Result};
use crate::spreadsheet;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// What a cached file load is keyed on besides its path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
    encodings: Vec<TextEncoding>,
}

/// Cache of parsed datasets.
///
/// Files are keyed by canonical path and revalidated against their
/// modification time and length on every lookup; a changed stamp replaces the
/// stale entry. Buffers are keyed by the SHA-256 of their bytes.
#[derive(Debug, Default)]
pub struct DatasetCache {
    files: HashMap<PathBuf, (FileStamp, Arc<Dataset>)>,
    buffers: HashMap<(String, Vec<TextEncoding>), Arc<Dataset>>,
    hits: usize,
    misses: usize,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a CSV or JSON file, reusing the parsed dataset when the file is unchanged.
    pub fn load_path(&mut self, path: &Path, encodings: &[TextEncoding]) -> Result<Arc<Dataset>> {
        let name = path.display().to_string();
        let canonical = path
            .canonicalize()
            .map_err(|e| DashboardError::data_load(&name, e.to_string()))?;
        let metadata = std::fs::metadata(&canonical)
            .map_err(|e| DashboardError::data_load(&name, e.to_string()))?;
        let stamp = FileStamp {
            modified: metadata.modified().ok(),
            len: metadata.len(),
            encodings: encodings.to_vec(),
        };

        if let Some((cached_stamp, dataset)) = self.files.get(&canonical) {
            if *cached_stamp == stamp {
                self.hits += 1;
                debug!(path = %canonical.display(), "dataset cache hit");
                return Ok(Arc::clone(dataset));
            }
            debug!(path = %canonical.display(), "dataset cache entry is stale");
        }

        self.misses += 1;
        let dataset = Arc::new(load_file(&canonical, encodings)?);
        self.files
            .insert(canonical, (stamp, Arc::clone(&dataset)));
        Ok(dataset)
    }

    /// Load CSV bytes, reusing the parsed dataset for identical content.
    pub fn load_buffer(
        &mut self,
        source_name: &str,
        bytes: &[u8],
        encodings: &[TextEncoding],
    ) -> Result<Arc<Dataset>> {
        let key = (hex::encode(Sha256::digest(bytes)), encodings.to_vec());
        if let Some(dataset) = self.buffers.get(&key) {
            self.hits += 1;
            debug!(source = source_name, digest = %key.0, "dataset cache hit");
            return Ok(Arc::clone(dataset));
        }

        self.misses += 1;
        let dataset = Arc::new(csv_reader::read_csv_bytes(source_name, bytes, encodings)?);
        self.buffers.insert(key, Arc::clone(&dataset));
        Ok(dataset)
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.buffers.clear();
    }
}

/// Uncached loader: `.json` files are read as an array of objects, workbooks
/// by their first sheet, anything else as CSV.
pub fn load_file(path: &Path, encodings: &[TextEncoding]) -> Result<Dataset> {
    if spreadsheet::is_spreadsheet(path) {
        return spreadsheet::read_spreadsheet(path);
    }

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let name = path.display().to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DashboardError::data_load(&name, e.to_string()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| DashboardError::data_load(&name, e.to_string()))?;
        Dataset::from_json(&value)
    } else {
        csv_reader::read_csv_file(path, encodings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_file_hit_and_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "prices.csv", "product,price\napple,1200\n");
        let encodings = TextEncoding::default_chain();

        let mut cache = DatasetCache::new();
        let first = cache.load_path(&path, &encodings).unwrap();
        let second = cache.load_path(&path, &encodings).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        // Different length changes the stamp even if mtime granularity is coarse
        write_file(&dir, "prices.csv", "product,price\napple,1200\nbanana,900\n");
        let third = cache.load_path(&path, &encodings).unwrap();
        assert_eq!(third.len(), 2);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_buffer_keyed_by_content() {
        let mut cache = DatasetCache::new();
        let encodings = TextEncoding::default_chain();
        let a = cache.load_buffer("upload", b"k,v\nA,1\n", &encodings).unwrap();
        let b = cache.load_buffer("upload-again", b"k,v\nA,1\n", &encodings).unwrap();
        let c = cache.load_buffer("upload", b"k,v\nB,2\n", &encodings).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!((cache.hits(), cache.misses()), (1, 2));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let mut cache = DatasetCache::new();
        let err = cache
            .load_path(Path::new("no/such/file.csv"), &TextEncoding::default_chain())
            .unwrap_err();
        assert!(matches!(err, DashboardError::DataLoad { .. }));
    }

    #[test]
    fn test_json_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "rows.json", r#"[{"k": "A", "v": 1}, {"k": "B", "v": 2}]"#);
        let data = load_file(&path, &TextEncoding::default_chain()).unwrap();
        assert_eq!(data.headers, vec!["k", "v"]);
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_load_spreadsheet_through_cache() {
        let mut cache = DatasetCache::new();
        let encodings = TextEncoding::default_chain();
        let path = Path::new("test/population.xlsx");
        let first = cache.load_path(path, &encodings).unwrap();
        assert_eq!(first.headers, vec!["행정동명", "총인구"]);
        assert_eq!(first.len(), 3);
        let second = cache.load_path(path, &encodings).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits(), 1);
    }
}
