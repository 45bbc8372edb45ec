//! Inventory assembly: reconciles the executed ledger and the rename map
//! into the flat row set an external writer turns into a spreadsheet.
//! `reorg-core` never links an Excel crate (§6a) — [`InventoryWriter`] is
//! the seam the binary crate implements with `rust_xlsxwriter`.

use std::path::Path;

use serde::Serialize;

use crate::cache::RenameMap;
use crate::error::ReorgError;
use crate::ledger::{Action, Ledger, Status};

/// One row of the inventory: a single file's final resting place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InventoryRow {
    /// Canonical partition name (post `" - Part N"` merge).
    pub partition: String,
    /// The VIN (or `_NO_VIN`) this row belongs to.
    pub vin: String,
    /// Document category label.
    pub category: String,
    /// Final filename in the output tree.
    pub filename: String,
    /// The file's name before the rename/dedup pass, when known.
    pub original_filename: Option<String>,
    /// Final execution status (`Done`, `Skipped`, `Failed`).
    pub status: String,
}

/// The full inventory: every copy entry the run produced.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Inventory {
    /// Rows, sorted by `(partition, vin, filename)`.
    pub rows: Vec<InventoryRow>,
}

impl Inventory {
    /// Build an inventory from an executed ledger and the rename map that
    /// recorded original filenames during the rename/dedup pass.
    #[must_use]
    pub fn build(ledger: &Ledger, rename_map: &RenameMap, output_root: &Path) -> Self {
        let mut rows: Vec<InventoryRow> = ledger
            .entries()
            .iter()
            .filter(|e| e.action == Action::CopyFile)
            .map(|e| {
                let rel = e.destination.strip_prefix(output_root).unwrap_or(&e.destination);
                let partition = rel
                    .components()
                    .next()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .unwrap_or_default();
                let vin = e.vin.to_string();
                let filename = e.destination.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
                let original_filename = rename_map.original_for(&vin, &filename).map(str::to_owned);
                let category = e.category.map_or_else(|| "Alte Documente".to_owned(), |c| c.label().to_owned());
                let status = match e.status {
                    Status::Planned => "Planned",
                    Status::Done => "Done",
                    Status::Skipped => "Skipped",
                    Status::Failed => "Failed",
                }
                .to_owned();
                InventoryRow {
                    partition,
                    vin,
                    category,
                    filename,
                    original_filename,
                    status,
                }
            })
            .collect();
        rows.sort_by(|a, b| (&a.partition, &a.vin, &a.filename).cmp(&(&b.partition, &b.vin, &b.filename)));
        Self { rows }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the inventory has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The output boundary for the inventory (§6a): `reorg-core` stays free of
/// any spreadsheet dependency so its domain logic can be tested and reused
/// without one.
pub trait InventoryWriter {
    /// Persist `inventory` to `path`.
    ///
    /// # Errors
    /// Returns an error if the inventory cannot be written.
    fn write(&self, inventory: &Inventory, path: &Path) -> Result<(), ReorgError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::ledger::LedgerEntry;
    use crate::vin::{Vin, VinOrSentinel};
    use std::path::PathBuf;

    #[test]
    fn build_derives_partition_and_original_name() {
        let output_root = PathBuf::from("/out");
        let mut ledger = Ledger::new();
        ledger.push(LedgerEntry::copy(
            PathBuf::from("/src/a.pdf"),
            output_root.join("SINDICALIZARE A").join("AAAAAA12345678901").join("casco.pdf"),
            "r",
            PathBuf::from("/src"),
            VinOrSentinel::Vin(Vin::new("AAAAAA12345678901").unwrap()),
            Some(Category::Casco),
        ));
        let mut rename_map = RenameMap::default();
        rename_map.record("AAAAAA12345678901", "casco.pdf", "Casco Original.pdf");

        let inventory = Inventory::build(&ledger, &rename_map, &output_root);
        assert_eq!(inventory.len(), 1);
        let row = &inventory.rows[0];
        assert_eq!(row.partition, "SINDICALIZARE A");
        assert_eq!(row.vin, "AAAAAA12345678901");
        assert_eq!(row.category, "CASCO");
        assert_eq!(row.original_filename.as_deref(), Some("Casco Original.pdf"));
    }

    #[test]
    fn create_folder_entries_are_excluded() {
        let output_root = PathBuf::from("/out");
        let mut ledger = Ledger::new();
        ledger.push(LedgerEntry::create_folder(
            output_root.join("SINDICALIZARE A").join("AAAAAA12345678901"),
            PathBuf::from("/src"),
            VinOrSentinel::Vin(Vin::new("AAAAAA12345678901").unwrap()),
        ));
        let rename_map = RenameMap::default();
        let inventory = Inventory::build(&ledger, &rename_map, &output_root);
        assert!(inventory.is_empty());
    }
}
