//! S4 — Rename/Dedup Engine (§4.4): groups planned copies by `(VIN,
//! category)`, renames survivors to canonical short names, and collapses
//! identical-content duplicates by MD5.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use md5::{Digest, Md5};
use regex::Regex;

use crate::cache::RenameMap;
use crate::category::Category;
use crate::error::ReorgError;
use crate::ledger::{Action, Ledger, LedgerEntry};
use crate::vin::VinOrSentinel;

// TALON has no neighbor exclusion at all in the original tool — any filename
// containing the substring counts, even `seriectalon123.pdf`.
static TALON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)talon").unwrap());
// CIV excludes only alphabetic neighbors (`re.search(r'(?<![A-Za-z])CIV(?![A-Za-z])', ...)`),
// so `civ_2024.pdf` and `seriec_civ.pdf` both count, but `civil.pdf` does not.
// `regex` has no lookaround, so this scans each match and checks its
// immediate neighbors by hand instead of excluding them in the pattern.
static CIV_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)CIV").unwrap());

fn has_civ(name: &str) -> bool {
    CIV_RE.find_iter(name).any(|m| {
        let before_ok = name[..m.start()].chars().next_back().is_none_or(|c| !c.is_ascii_alphabetic());
        let after_ok = name[m.end()..].chars().next().is_none_or(|c| !c.is_ascii_alphabetic());
        before_ok && after_ok
    })
}

fn talon_civ_bucket(name: &str) -> &'static str {
    match (TALON_RE.is_match(name), has_civ(name)) {
        (true, true) => "TALON+CIV",
        (true, false) => "talon",
        (false, true) => "civ",
        (false, false) => "talon_civ",
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned())
}

fn md5_hex(path: &std::path::Path) -> Result<String, ReorgError> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Md5::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Run the rename/dedup pass over `ledger` in place, recording every
/// rename in `rename_map`. Entries with no discovered VIN (`_NO_VIN`) and
/// entries classified `Alte Documente` pass through untouched, per §4.4.
///
/// # Errors
/// Returns an error if a planned source file cannot be read for hashing;
/// such entries are reported rather than silently dropped, since a missing
/// source at this stage is unexpected (the executor, not the planner, is
/// responsible for tolerating vanished sources).
pub fn apply_rename_dedup(ledger: &mut Ledger, rename_map: &mut RenameMap) -> Result<(), ReorgError> {
    let entries = ledger.entries().to_vec();

    let mut passthrough = Vec::new();
    let mut groups: BTreeMap<(String, String), Vec<LedgerEntry>> = BTreeMap::new();

    for entry in entries {
        if entry.action != Action::CopyFile {
            passthrough.push(entry);
            continue;
        }
        let VinOrSentinel::Vin(vin) = &entry.vin else {
            passthrough.push(entry);
            continue;
        };
        match entry.category {
            None | Some(Category::AlteDocumente) => passthrough.push(entry),
            Some(Category::TalonCiv) => {
                let bucket = talon_civ_bucket(&file_name(&entry.source)).to_owned();
                groups.entry((vin.to_string(), bucket)).or_default().push(entry);
            }
            Some(cat) => {
                let base = cat.short_name().unwrap_or("doc").to_owned();
                groups.entry((vin.to_string(), base)).or_default().push(entry);
            }
        }
    }

    let mut result = passthrough;
    for ((vin, base), group_entries) in groups {
        result.extend(dedup_group(&vin, &base, group_entries, rename_map)?);
    }

    ledger.replace_entries(result);
    Ok(())
}

fn dedup_group(
    vin: &str,
    base: &str,
    entries: Vec<LedgerEntry>,
    rename_map: &mut RenameMap,
) -> Result<Vec<LedgerEntry>, ReorgError> {
    let mut by_hash: Vec<(String, Vec<LedgerEntry>)> = Vec::new();
    for entry in entries {
        let hash = md5_hex(&entry.source)?;
        if let Some((_, bucket)) = by_hash.iter_mut().find(|(h, _)| h == &hash) {
            bucket.push(entry);
        } else {
            by_hash.push((hash, vec![entry]));
        }
    }

    let mut survivors = Vec::new();
    let single_class = by_hash.len() == 1;
    for (index, (_, mut bucket)) in by_hash.into_iter().enumerate() {
        let keeper = bucket.remove(0);
        let new_name = if single_class {
            format!("{base}.pdf")
        } else {
            format!("{base}_{}.pdf", index + 1)
        };
        let original_name = file_name(&keeper.destination);
        rename_map.record(vin, &new_name, original_name);

        let new_destination = keeper
            .destination
            .parent()
            .map_or_else(|| PathBuf::from(&new_name), |p| p.join(&new_name));
        let mut renamed = keeper;
        renamed.destination = new_destination;
        survivors.push(renamed);
        // `bucket` (any remaining same-hash duplicates) is intentionally
        // dropped: they are byte-identical to the keeper, so copying them
        // would be redundant (§4.4 dedup step).
    }
    Ok(survivors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vin::Vin;
    use tempfile::tempdir;

    fn entry(source: PathBuf, destination: PathBuf, vin: &str, cat: Category) -> LedgerEntry {
        LedgerEntry::copy(
            source,
            destination,
            "test",
            PathBuf::from("/src"),
            VinOrSentinel::Vin(Vin::new(vin).unwrap()),
            Some(cat),
        )
    }

    #[test]
    fn single_hash_class_renames_to_base_name() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.pdf");
        std::fs::write(&src, b"same content").unwrap();

        let mut ledger = Ledger::new();
        ledger.push(entry(
            src.clone(),
            PathBuf::from("/out/V/casco original.pdf"),
            "AAAAAA12345678901",
            Category::Casco,
        ));
        let mut rename_map = RenameMap::default();
        apply_rename_dedup(&mut ledger, &mut rename_map).unwrap();

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries()[0].destination, PathBuf::from("/out/V/casco.pdf"));
        assert_eq!(
            rename_map.original_for("AAAAAA12345678901", "casco.pdf"),
            Some("casco original.pdf")
        );
    }

    #[test]
    fn identical_content_entries_are_deduped() {
        let dir = tempdir().unwrap();
        let src_a = dir.path().join("a.pdf");
        let src_b = dir.path().join("b.pdf");
        std::fs::write(&src_a, b"same content").unwrap();
        std::fs::write(&src_b, b"same content").unwrap();

        let mut ledger = Ledger::new();
        ledger.push(entry(src_a, PathBuf::from("/out/V/a.pdf"), "AAAAAA12345678901", Category::Casco));
        ledger.push(entry(src_b, PathBuf::from("/out/V/b.pdf"), "AAAAAA12345678901", Category::Casco));
        let mut rename_map = RenameMap::default();
        apply_rename_dedup(&mut ledger, &mut rename_map).unwrap();

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries()[0].destination, PathBuf::from("/out/V/casco.pdf"));
    }

    #[test]
    fn differing_content_entries_are_numbered() {
        let dir = tempdir().unwrap();
        let src_a = dir.path().join("a.pdf");
        let src_b = dir.path().join("b.pdf");
        std::fs::write(&src_a, b"content one").unwrap();
        std::fs::write(&src_b, b"content two").unwrap();

        let mut ledger = Ledger::new();
        ledger.push(entry(src_a, PathBuf::from("/out/V/a.pdf"), "AAAAAA12345678901", Category::Casco));
        ledger.push(entry(src_b, PathBuf::from("/out/V/b.pdf"), "AAAAAA12345678901", Category::Casco));
        let mut rename_map = RenameMap::default();
        apply_rename_dedup(&mut ledger, &mut rename_map).unwrap();

        assert_eq!(ledger.len(), 2);
        let names: Vec<String> = ledger.entries().iter().map(|e| file_name(&e.destination)).collect();
        assert!(names.contains(&"casco_1.pdf".to_owned()));
        assert!(names.contains(&"casco_2.pdf".to_owned()));
    }

    #[test]
    fn alte_documente_passes_through_untouched() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("notes.pdf");
        std::fs::write(&src, b"x").unwrap();

        let mut ledger = Ledger::new();
        ledger.push(entry(src, PathBuf::from("/out/V/notes.pdf"), "AAAAAA12345678901", Category::AlteDocumente));
        let mut rename_map = RenameMap::default();
        apply_rename_dedup(&mut ledger, &mut rename_map).unwrap();

        assert_eq!(ledger.entries()[0].destination, PathBuf::from("/out/V/notes.pdf"));
    }

    #[test]
    fn talon_civ_splits_into_sub_buckets() {
        let dir = tempdir().unwrap();
        let talon_src = dir.path().join("talon doc.pdf");
        let civ_src = dir.path().join("civ doc.pdf");
        std::fs::write(&talon_src, b"talon content").unwrap();
        std::fs::write(&civ_src, b"civ content").unwrap();

        let mut ledger = Ledger::new();
        ledger.push(entry(talon_src, PathBuf::from("/out/V/talon doc.pdf"), "AAAAAA12345678901", Category::TalonCiv));
        ledger.push(entry(civ_src, PathBuf::from("/out/V/civ doc.pdf"), "AAAAAA12345678901", Category::TalonCiv));
        let mut rename_map = RenameMap::default();
        apply_rename_dedup(&mut ledger, &mut rename_map).unwrap();

        let names: Vec<String> = ledger.entries().iter().map(|e| file_name(&e.destination)).collect();
        assert!(names.contains(&"talon.pdf".to_owned()));
        assert!(names.contains(&"civ.pdf".to_owned()));
    }

    #[test]
    fn talon_matches_as_unbounded_substring() {
        assert_eq!(talon_civ_bucket("seriectalon123.pdf"), "talon");
    }

    #[test]
    fn civ_excludes_only_alphabetic_neighbors() {
        assert_eq!(talon_civ_bucket("seriec_civ_2024.pdf"), "civ");
        assert_eq!(talon_civ_bucket("civil.pdf"), "talon_civ");
    }
}
