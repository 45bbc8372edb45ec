//! Persistent caches that make reruns cheap (§4.8): the OCR/content-scan
//! cache and the rename map. Both are load-then-merge-then-save
//! `serde_json` documents; neither guarantees crash atomicity, and neither
//! needs to — every entry can be regenerated from source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::ReorgError;
use crate::vin::Vin;

/// One cached scan result for a single source PDF, keyed by its absolute
/// path. Staleness is keyed on `(size, mtime_ns)` rather than a content
/// hash — cheap to check, and good enough since the source archive is
/// read-only during a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OcrCacheEntry {
    /// File size in bytes at scan time.
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch at scan time.
    pub mtime_ns: u128,
    /// Whether OCR text contributed to this entry's VINs/categories.
    pub ocr_used: bool,
    /// VINs found in the PDF's text.
    pub vins: Vec<Vin>,
    /// Pre-scan critical categories found in the PDF's text (§4.2).
    pub cats: std::collections::BTreeSet<Category>,
    /// The reclassifier's single dominant category, once computed (§4.6).
    /// `None` until the reclassification pass has visited this file.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reclass_cat: Option<Category>,
}

/// Stat a file's current `(size, mtime_ns)` fingerprint.
///
/// # Errors
/// Returns an error if the file cannot be stat'd.
pub fn fingerprint(path: &Path) -> Result<(u64, u128), ReorgError> {
    let meta = std::fs::metadata(path)?;
    let mtime_ns = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    Ok((meta.len(), mtime_ns))
}

/// The persistent OCR/content-scan cache (§4.8), keyed by absolute source
/// path.
#[derive(Clone, Debug, Default)]
pub struct OcrCache {
    entries: BTreeMap<PathBuf, OcrCacheEntry>,
}

impl OcrCache {
    /// Load a cache from `path`. A missing file yields an empty cache, not
    /// an error; a malformed file yields [`ReorgError::CacheCorrupt`] —
    /// callers are expected to log it and continue with an empty cache
    /// rather than abort (§7).
    ///
    /// # Errors
    /// Returns [`ReorgError::CacheCorrupt`] if the file exists but does not
    /// parse as the expected JSON shape.
    pub fn load(path: &Path) -> Result<Self, ReorgError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let entries: BTreeMap<PathBuf, OcrCacheEntry> =
            serde_json::from_str(&contents).map_err(|e| ReorgError::CacheCorrupt {
                path: path.to_owned(),
                detail: e.to_string(),
            })?;
        Ok(Self { entries })
    }

    /// Write the cache to `path`, overwriting any previous contents.
    ///
    /// # Errors
    /// Returns an error on I/O failure.
    pub fn save(&self, path: &Path) -> Result<(), ReorgError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Look up a fresh (not stale) cache entry for `path`, given its
    /// current `(size, mtime_ns)` fingerprint.
    #[must_use]
    pub fn get_fresh(&self, path: &Path, size: u64, mtime_ns: u128) -> Option<&OcrCacheEntry> {
        self.entries
            .get(path)
            .filter(|e| e.size == size && e.mtime_ns == mtime_ns)
    }

    /// Insert or overwrite the cache entry for `path`.
    pub fn insert(&mut self, path: PathBuf, entry: OcrCacheEntry) {
        self.entries.insert(path, entry);
    }

    /// Record the reclassifier's dominant category for an already-cached
    /// path, leaving the rest of the entry untouched. No-op if `path` is
    /// not yet cached (the pre-scan always runs first).
    pub fn set_reclass_cat(&mut self, path: &Path, cat: Option<Category>) {
        if let Some(entry) = self.entries.get_mut(path) {
            entry.reclass_cat = cat;
        }
    }

    /// Number of cached paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The persistent rename map (§4.8): remembers, for each `(VIN, new
/// filename)` pair, the original filename it replaced — so a rerun can
/// report provenance without re-deriving it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RenameMap {
    entries: BTreeMap<String, String>,
}

impl RenameMap {
    /// Build the composite key used by the on-disk map.
    #[must_use]
    pub fn key(vin: &str, new_filename: &str) -> String {
        format!("{vin}||{new_filename}")
    }

    /// Load a rename map from `path`. A missing file yields an empty map.
    ///
    /// # Errors
    /// Returns [`ReorgError::CacheCorrupt`] if the file exists but does not
    /// parse.
    pub fn load(path: &Path) -> Result<Self, ReorgError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents).map_err(|e| ReorgError::CacheCorrupt {
            path: path.to_owned(),
            detail: e.to_string(),
        })
    }

    /// Write the map to `path`.
    ///
    /// # Errors
    /// Returns an error on I/O failure.
    pub fn save(&self, path: &Path) -> Result<(), ReorgError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Record a rename, overwriting any prior entry for the same key (the
    /// map always reflects the most recently observed canonical name).
    pub fn record(&mut self, vin: &str, new_filename: &str, original_filename: impl Into<String>) {
        self.entries
            .insert(Self::key(vin, new_filename), original_filename.into());
    }

    /// Look up the original filename recorded for a `(vin, new_filename)`
    /// pair, if any.
    #[must_use]
    pub fn original_for(&self, vin: &str, new_filename: &str) -> Option<&str> {
        self.entries.get(&Self::key(vin, new_filename)).map(String::as_str)
    }

    /// Merge `other` into `self`; entries in `other` win on key collision.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn sample_entry() -> OcrCacheEntry {
        OcrCacheEntry {
            size: 1024,
            mtime_ns: 123,
            ocr_used: false,
            vins: vec![Vin::new("AAAAAA12345678901").unwrap()],
            cats: BTreeSet::from([Category::Casco]),
            reclass_cat: None,
        }
    }

    #[test]
    fn missing_cache_file_yields_empty() {
        let cache = OcrCache::load(Path::new("/nonexistent/ocr_cache.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ocr_cache.json");
        let mut cache = OcrCache::default();
        cache.insert(PathBuf::from("/src/a.pdf"), sample_entry());
        cache.save(&path).unwrap();

        let reloaded = OcrCache::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        let entry = reloaded.get_fresh(Path::new("/src/a.pdf"), 1024, 123).unwrap();
        assert_eq!(entry.vins, vec![Vin::new("AAAAAA12345678901").unwrap()]);
    }

    #[test]
    fn stale_fingerprint_misses() {
        let mut cache = OcrCache::default();
        cache.insert(PathBuf::from("/src/a.pdf"), sample_entry());
        assert!(cache.get_fresh(Path::new("/src/a.pdf"), 9999, 123).is_none());
    }

    #[test]
    fn malformed_cache_file_is_cache_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ocr_cache.json");
        std::fs::write(&path, "not json").unwrap();
        let err = OcrCache::load(&path).unwrap_err();
        assert!(matches!(err, ReorgError::CacheCorrupt { .. }));
    }

    #[test]
    fn set_reclass_cat_updates_existing_entry_only() {
        let mut cache = OcrCache::default();
        cache.insert(PathBuf::from("/src/a.pdf"), sample_entry());
        cache.set_reclass_cat(Path::new("/src/a.pdf"), Some(Category::Rca));
        cache.set_reclass_cat(Path::new("/src/missing.pdf"), Some(Category::Rca));
        assert_eq!(
            cache.get_fresh(Path::new("/src/a.pdf"), 1024, 123).unwrap().reclass_cat,
            Some(Category::Rca)
        );
    }

    #[test]
    fn rename_map_records_and_looks_up() {
        let mut map = RenameMap::default();
        map.record("AAAAAA12345678901", "cc.pdf", "Contract Original.pdf");
        assert_eq!(
            map.original_for("AAAAAA12345678901", "cc.pdf"),
            Some("Contract Original.pdf")
        );
    }

    #[test]
    fn rename_map_merge_prefers_incoming() {
        let mut base = RenameMap::default();
        base.record("AAAAAA12345678901", "cc.pdf", "Old Name.pdf");
        let mut incoming = RenameMap::default();
        incoming.record("AAAAAA12345678901", "cc.pdf", "New Name.pdf");
        base.merge(incoming);
        assert_eq!(
            base.original_for("AAAAAA12345678901", "cc.pdf"),
            Some("New Name.pdf")
        );
    }

    #[test]
    fn rename_map_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rename_map.json");
        let mut map = RenameMap::default();
        map.record("AAAAAA12345678901", "cc.pdf", "Contract Original.pdf");
        map.save(&path).unwrap();
        let reloaded = RenameMap::load(&path).unwrap();
        assert_eq!(
            reloaded.original_for("AAAAAA12345678901", "cc.pdf"),
            Some("Contract Original.pdf")
        );
    }
}
