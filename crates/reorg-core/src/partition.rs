//! S1 — Partition Enumerator (§4.1).

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// A top-level source partition directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    /// Absolute path to the partition directory.
    pub path: PathBuf,
    /// The directory's raw name, unmodified.
    pub raw_name: String,
    /// The canonical name with a trailing `" - Part N"` stripped (§3); all
    /// partitions sharing a canonical name map to one output directory.
    pub canonical_name: String,
}

static PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^SIN(D|)ICALIZARE").unwrap());

static PART_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*-\s*Part\s*\d+\s*$").unwrap());

/// Does `name` begin (case-insensitively) with `SINDICALIZARE` or the
/// misspelled `SINICALIZARE` variant?
#[must_use]
pub fn is_partition_name(name: &str) -> bool {
    PREFIX_RE.is_match(name)
}

/// Strip a trailing `" - Part N"` suffix (case-insensitive, any digit
/// count) to compute the canonical partition name.
#[must_use]
pub fn canonical_partition_name(name: &str) -> String {
    PART_SUFFIX_RE.replace(name, "").trim().to_string()
}

/// List partition directories under `source_root`, filtered by the
/// `SINDICALIZARE`/`SINICALIZARE` prefix, sorted lexicographically by raw
/// name, then sliced by the optional 1-based inclusive `[range_start,
/// range_end]`.
///
/// Unreadable entries are silently skipped; the caller sees the shorter
/// list, matching the §4.1 guarantee that this step never fails outright.
#[must_use]
pub fn enumerate_partitions(
    source_root: &Path,
    range_start: Option<u32>,
    range_end: Option<u32>,
) -> Vec<Partition> {
    let mut partitions: Vec<Partition> = match std::fs::read_dir(source_root) {
        Ok(read_dir) => read_dir
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let raw_name = e.file_name().to_string_lossy().into_owned();
                is_partition_name(&raw_name).then(|| Partition {
                    path: e.path(),
                    canonical_name: canonical_partition_name(&raw_name),
                    raw_name,
                })
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    partitions.sort_by(|a, b| a.raw_name.cmp(&b.raw_name));

    let len = partitions.len();
    let start = range_start.map_or(1, |s| s.max(1)) as usize;
    let end = range_end.map_or(len, |e| e as usize).min(len);
    if start > end || start > len {
        return Vec::new();
    }
    partitions[(start - 1)..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn recognizes_standard_and_misspelled_prefix() {
        assert!(is_partition_name("SINDICALIZARE X"));
        assert!(is_partition_name("sindicalizare x"));
        assert!(is_partition_name("SINICALIZARE Y"));
        assert!(!is_partition_name("Other Folder"));
    }

    #[test]
    fn canonical_name_strips_part_suffix() {
        assert_eq!(
            canonical_partition_name("SINDICALIZARE X - Part 1"),
            "SINDICALIZARE X"
        );
        assert_eq!(
            canonical_partition_name("SINDICALIZARE X - part 12"),
            "SINDICALIZARE X"
        );
        assert_eq!(canonical_partition_name("SINDICALIZARE X"), "SINDICALIZARE X");
    }

    #[test]
    fn enumerate_sorts_and_filters() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("SINDICALIZARE B")).unwrap();
        std::fs::create_dir(dir.path().join("SINDICALIZARE A")).unwrap();
        std::fs::create_dir(dir.path().join("Not A Partition")).unwrap();

        let partitions = enumerate_partitions(dir.path(), None, None);
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].raw_name, "SINDICALIZARE A");
        assert_eq!(partitions[1].raw_name, "SINDICALIZARE B");
    }

    #[test]
    fn enumerate_applies_range_slice() {
        let dir = tempdir().unwrap();
        for name in ["SINDICALIZARE A", "SINDICALIZARE B", "SINDICALIZARE C"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        let partitions = enumerate_partitions(dir.path(), Some(2), Some(3));
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].raw_name, "SINDICALIZARE B");
        assert_eq!(partitions[1].raw_name, "SINDICALIZARE C");
    }

    #[test]
    fn enumerate_unreadable_root_returns_empty() {
        let partitions = enumerate_partitions(Path::new("/definitely/not/there"), None, None);
        assert!(partitions.is_empty());
    }

    #[test]
    fn two_partitions_share_canonical_name() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("SINDICALIZARE X - Part 1")).unwrap();
        std::fs::create_dir(dir.path().join("SINDICALIZARE X - Part 2")).unwrap();
        let partitions = enumerate_partitions(dir.path(), None, None);
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].canonical_name, "SINDICALIZARE X");
        assert_eq!(partitions[1].canonical_name, "SINDICALIZARE X");
    }
}
