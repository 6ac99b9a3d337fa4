//! Persistent build cache.
//!
//! One record per compiled source file: content hash, modification time,
//! dependency list and output path. The whole cache lives in a single JSON
//! file that is replaced atomically on save.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDetection {
    /// Trust an unchanged mtime; hash only files that look newer.
    #[default]
    MtimeThenHash,
    AlwaysHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub last_modified: DateTime<Utc>,
    pub hash: String,
    pub output_path: String,
    #[serde(default)]
    pub dependencies: Vec<PathBuf>,
}

impl CacheRecord {
    /// `last_modified` must be read before `bytes`, so an edit landing in
    /// between leaves the record older than the file.
    pub fn new(
        last_modified: DateTime<Utc>,
        bytes: &[u8],
        output_path: &Path,
        dependencies: Vec<PathBuf>,
    ) -> Self {
        CacheRecord {
            last_modified,
            hash: BuildCache::compute_hash(bytes),
            output_path: output_path.to_string_lossy().into_owned(),
            dependencies,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    files: IndexMap<PathBuf, CacheRecord>,
}

#[derive(Debug)]
pub struct BuildCache {
    path: PathBuf,
    files: IndexMap<PathBuf, CacheRecord>,
}

impl BuildCache {
    /// An empty cache that will be saved to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            files: IndexMap::new(),
        }
    }

    /// Reads the cache file. A missing or corrupt file yields an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "no build cache, starting cold");
                return Self::new(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "build cache unreadable, starting cold");
                return Self::new(path);
            }
        };

        match serde_json::from_str::<CacheFile>(&data) {
            Ok(file) => {
                tracing::debug!(path = %path.display(), records = file.files.len(), "loaded build cache");
                Self {
                    path,
                    files: file.files,
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "build cache corrupt, starting cold");
                Self::new(path)
            }
        }
    }

    /// Writes `<file>.tmp` next to the cache file, then renames it into place.
    pub fn save(&self) -> Result<(), CacheError> {
        let write_err = |source| CacheError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let snapshot = CacheFile {
            files: self.files.clone(),
        };
        let data = serde_json::to_string_pretty(&snapshot)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        tracing::debug!(path = %self.path.display(), records = self.files.len(), "saved build cache");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, path: &Path) -> Option<&CacheRecord> {
        self.files.get(path)
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, record: CacheRecord) {
        self.files.insert(path.into(), record);
    }

    pub fn remove(&mut self, path: &Path) -> Option<CacheRecord> {
        self.files.shift_remove(path)
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn records(&self) -> impl Iterator<Item = (&Path, &CacheRecord)> {
        self.files.iter().map(|(p, r)| (p.as_path(), r))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Path, &CacheRecord) -> bool) {
        self.files.retain(|p, r| keep(p, r));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FINGERPRINTS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn compute_hash(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    pub fn hash_file(path: &Path) -> Result<String, CacheError> {
        let bytes = fs::read(path).map_err(|source| CacheError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::compute_hash(&bytes))
    }

    /// A file with no record is changed. Under `MtimeThenHash` a file whose
    /// mtime is not newer than the record is unchanged without reading it.
    pub fn has_changed(&self, path: &Path, mode: ChangeDetection) -> Result<bool, CacheError> {
        let Some(record) = self.files.get(path) else {
            return Ok(true);
        };

        if mode == ChangeDetection::MtimeThenHash && modified_time(path)? <= record.last_modified {
            return Ok(false);
        }

        let changed = Self::hash_file(path)? != record.hash;
        tracing::trace!(path = %path.display(), changed, "compared content hash");
        Ok(changed)
    }
}

pub fn modified_time(path: &Path) -> Result<DateTime<Utc>, CacheError> {
    let read_err = |source| CacheError::Read {
        path: path.to_path_buf(),
        source,
    };
    let modified = fs::metadata(path).and_then(|m| m.modified()).map_err(read_err)?;
    Ok(DateTime::<Utc>::from(modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn touch_forward(path: &Path) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(10)).unwrap();
    }

    fn record_for(path: &Path) -> CacheRecord {
        let modified = modified_time(path).unwrap();
        let bytes = fs::read(path).unwrap();
        CacheRecord::new(modified, &bytes, Path::new("dist/a.html"), vec![])
    }

    #[test]
    fn test_compute_hash_is_lowercase_hex_sha256() {
        assert_eq!(
            BuildCache::compute_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_missing_and_corrupt_files_start_cold() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BuildCache::load(dir.path().join("none.json"));
        assert!(cache.is_empty());

        let corrupt = dir.path().join("cache.json");
        fs::write(&corrupt, "{ not json").unwrap();
        assert!(BuildCache::load(&corrupt).is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.jml");
        fs::write(&source, "page A {}").unwrap();

        let cache_path = dir.path().join(".jml/cache.json");
        let mut cache = BuildCache::new(&cache_path);
        let mut record = record_for(&source);
        record.dependencies = vec![dir.path().join("b.jml")];
        cache.insert(&source, record.clone());
        cache.save().unwrap();

        assert!(!cache_path.with_extension("json.tmp").exists());
        let loaded = BuildCache::load(&cache_path);
        assert_eq!(loaded.get(&source), Some(&record));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&cache_path).unwrap()).unwrap();
        let entry = &json["files"][source.to_str().unwrap()];
        assert_eq!(entry["hash"], record.hash.as_str());
        assert_eq!(entry["output_path"], "dist/a.html");
        assert!(entry["last_modified"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_has_changed_two_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.jml");
        fs::write(&source, "page A {}").unwrap();

        let mut cache = BuildCache::new(dir.path().join("cache.json"));
        assert!(cache.has_changed(&source, ChangeDetection::MtimeThenHash).unwrap());

        cache.insert(&source, record_for(&source));
        assert!(!cache.has_changed(&source, ChangeDetection::MtimeThenHash).unwrap());
        assert!(!cache.has_changed(&source, ChangeDetection::AlwaysHash).unwrap());

        // Newer mtime, same bytes: hash decides.
        touch_forward(&source);
        assert!(!cache.has_changed(&source, ChangeDetection::MtimeThenHash).unwrap());

        fs::write(&source, "page A { View {} }").unwrap();
        touch_forward(&source);
        assert!(cache.has_changed(&source, ChangeDetection::MtimeThenHash).unwrap());
    }

    #[test]
    fn test_edit_between_read_and_record_is_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.jml");
        fs::write(&source, "page A {}").unwrap();

        let modified = modified_time(&source).unwrap();
        let bytes = fs::read(&source).unwrap();

        // Rewritten while the old bytes are still being compiled.
        fs::write(&source, "page A { View {} }").unwrap();
        touch_forward(&source);

        let mut cache = BuildCache::new(dir.path().join("cache.json"));
        cache.insert(&source, CacheRecord::new(modified, &bytes, Path::new("dist/a.html"), vec![]));
        assert!(cache.has_changed(&source, ChangeDetection::MtimeThenHash).unwrap());
    }

    #[test]
    fn test_always_hash_ignores_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.jml");
        fs::write(&source, "page A {}").unwrap();

        let mut cache = BuildCache::new(dir.path().join("cache.json"));
        let mut record = record_for(&source);
        record.last_modified = Utc::now() + chrono::Duration::days(1);
        cache.insert(&source, record);

        fs::write(&source, "page B {}").unwrap();
        assert!(!cache.has_changed(&source, ChangeDetection::MtimeThenHash).unwrap());
        assert!(cache.has_changed(&source, ChangeDetection::AlwaysHash).unwrap());
    }

    #[test]
    fn test_retain_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jml");
        let b = dir.path().join("b.jml");
        fs::write(&a, "page A {}").unwrap();
        fs::write(&b, "page B {}").unwrap();

        let mut cache = BuildCache::new(dir.path().join("cache.json"));
        cache.insert(&a, record_for(&a));
        cache.insert(&b, record_for(&b));
        cache.retain(|path, _| path != a.as_path());
        assert_eq!(cache.records().map(|(p, _)| p.to_path_buf()).collect::<Vec<_>>(), vec![b.clone()]);
        assert!(cache.remove(&b).is_some());
        assert!(cache.is_empty());
    }
}
