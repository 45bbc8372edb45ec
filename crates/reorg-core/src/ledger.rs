//! The planning ledger — an append-only (until rename/dedup) record of
//! planned filesystem operations, with the O(1) destination-uniqueness
//! index described in §3.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::vin::VinOrSentinel;

/// What a ledger entry does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Create a destination directory (idempotent).
    CreateFolder,
    /// Copy a single file.
    CopyFile,
}

/// Execution status of a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Not yet executed.
    Planned,
    /// Executed successfully.
    Done,
    /// Not executed: source vanished, or destination already byte-identical.
    Skipped,
    /// Execution attempted and failed.
    Failed,
}

/// A single planned (and later executed) filesystem operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// What this entry does.
    pub action: Action,
    /// Absolute source path (empty for `CreateFolder`).
    pub source: PathBuf,
    /// Absolute destination path.
    pub destination: PathBuf,
    /// Human-readable justification, used for audit and tests
    /// (e.g. `"PDF content VIN cross-copy"`, `"Gap-fill: CASCO"`).
    pub reason: String,
    /// The source folder this entry was planned from.
    pub parent_folder: PathBuf,
    /// The VIN (or `_NO_VIN`) this entry belongs to.
    pub vin: VinOrSentinel,
    /// Filename-derived category, when known at plan time (set for
    /// `CopyFile` entries; `None` for `CreateFolder`).
    pub category: Option<Category>,
    /// Current execution status.
    pub status: Status,
}

impl LedgerEntry {
    /// Construct a planned `copy_file` entry.
    #[must_use]
    pub fn copy(
        source: PathBuf,
        destination: PathBuf,
        reason: impl Into<String>,
        parent_folder: PathBuf,
        vin: VinOrSentinel,
        category: Option<Category>,
    ) -> Self {
        Self {
            action: Action::CopyFile,
            source,
            destination,
            reason: reason.into(),
            parent_folder,
            vin,
            category,
            status: Status::Planned,
        }
    }

    /// Construct a planned `create_folder` entry.
    #[must_use]
    pub fn create_folder(destination: PathBuf, parent_folder: PathBuf, vin: VinOrSentinel) -> Self {
        Self {
            action: Action::CreateFolder,
            source: PathBuf::new(),
            destination,
            reason: "create folder".to_owned(),
            parent_folder,
            vin,
            category: None,
            status: Status::Planned,
        }
    }
}

/// The planning ledger: an ordered list of entries plus the
/// destination-uniqueness index from §3.
///
/// Invariant: no two `copy_file` entries share a destination unless they
/// also share a source. On conflict the later entry is silently dropped, as
/// the spec specifies — this makes planning idempotent no matter how many
/// passes contribute entries for the same eventual destination.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    planned_destinations: BTreeMap<PathBuf, PathBuf>,
}

impl Ledger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to add an entry, enforcing the destination-uniqueness
    /// invariant for `copy_file` entries. Returns `true` if the entry was
    /// added, `false` if it was dropped as a duplicate destination.
    pub fn push(&mut self, entry: LedgerEntry) -> bool {
        if entry.action == Action::CopyFile {
            if let Some(existing_source) = self.planned_destinations.get(&entry.destination) {
                if existing_source != &entry.source {
                    return false;
                }
            } else {
                self.planned_destinations
                    .insert(entry.destination.clone(), entry.source.clone());
            }
        }
        self.entries.push(entry);
        true
    }

    /// All entries, in planning order.
    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Mutable access to entries, for the rename/dedup pass and the
    /// executor's status updates.
    pub fn entries_mut(&mut self) -> &mut Vec<LedgerEntry> {
        &mut self.entries
    }

    /// Number of entries currently in the ledger.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `destination` is already claimed by a planned copy, and if
    /// so, by which source.
    #[must_use]
    pub fn planned_source_for(&self, destination: &std::path::Path) -> Option<&PathBuf> {
        self.planned_destinations.get(destination)
    }

    /// Rebuild the destination index from the current entry list. Used
    /// after the rename/dedup pass removes dropped duplicate entries (§4.4).
    pub fn reindex(&mut self) {
        self.planned_destinations.clear();
        for entry in &self.entries {
            if entry.action == Action::CopyFile {
                self.planned_destinations
                    .insert(entry.destination.clone(), entry.source.clone());
            }
        }
    }

    /// Replace the entry list wholesale (used by rename/dedup, which
    /// produces a new entry list from the old one per the §9
    /// re-architecture note: no in-place mutation during the rename pass).
    pub fn replace_entries(&mut self, entries: Vec<LedgerEntry>) {
        self.entries = entries;
        self.reindex();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vin::Vin;

    fn vin(s: &str) -> VinOrSentinel {
        VinOrSentinel::Vin(Vin::new(s).unwrap())
    }

    #[test]
    fn duplicate_destination_same_source_is_allowed() {
        let mut ledger = Ledger::new();
        let e1 = LedgerEntry::copy(
            PathBuf::from("/src/a.pdf"),
            PathBuf::from("/out/V/a.pdf"),
            "r1",
            PathBuf::from("/src"),
            vin("AAAAAA12345678901"),
            None,
        );
        let e2 = e1.clone();
        assert!(ledger.push(e1));
        assert!(ledger.push(e2));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn duplicate_destination_different_source_is_dropped() {
        let mut ledger = Ledger::new();
        let e1 = LedgerEntry::copy(
            PathBuf::from("/src/a.pdf"),
            PathBuf::from("/out/V/a.pdf"),
            "r1",
            PathBuf::from("/src"),
            vin("AAAAAA12345678901"),
            None,
        );
        let e2 = LedgerEntry::copy(
            PathBuf::from("/src/b.pdf"),
            PathBuf::from("/out/V/a.pdf"),
            "r2",
            PathBuf::from("/src"),
            vin("AAAAAA12345678901"),
            None,
        );
        assert!(ledger.push(e1));
        assert!(!ledger.push(e2));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn reindex_reflects_post_dedup_entries() {
        let mut ledger = Ledger::new();
        ledger.push(LedgerEntry::copy(
            PathBuf::from("/src/a.pdf"),
            PathBuf::from("/out/V/a.pdf"),
            "r1",
            PathBuf::from("/src"),
            vin("AAAAAA12345678901"),
            None,
        ));
        ledger.replace_entries(vec![]);
        assert!(ledger.planned_source_for(std::path::Path::new("/out/V/a.pdf")).is_none());
    }
}
