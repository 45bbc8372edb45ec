//! Core domain logic for the VIN-driven document reorganizer: partition
//! enumeration, PDF content scanning, planning, rename/dedup, execution,
//! reclassification, and inventory assembly. Free of CLI, progress-bar, and
//! spreadsheet dependencies so it can be driven and tested headlessly.

pub mod cache;
pub mod category;
pub mod config;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod ledger;
pub mod partition;
pub mod pdf_scan;
pub mod planner;
pub mod reclassify;
pub mod rename;
pub mod vin;

use std::path::PathBuf;

use serde::Serialize;

/// A human-readable count plus the accumulated non-fatal problems from one
/// run, serialized alongside the ledger into the run's `log_<ts>.json`
/// (§3 SUPPLEMENT, §4.8).
#[derive(Clone, Debug, Default, Serialize)]
pub struct Summary {
    /// Source root that was scanned.
    pub source_root: PathBuf,
    /// Output root that was written to (or would have been, in dry-run).
    pub output_root: PathBuf,
    /// Whether this was a dry run (no filesystem writes).
    pub dry_run: bool,
    /// Files copied.
    pub copied: usize,
    /// Files skipped (vanished source or identical destination).
    pub skipped: usize,
    /// Files that failed to copy.
    pub failed: usize,
    /// Duplicate files collapsed by the rename/dedup pass.
    pub deduped: usize,
    /// Every ledger entry from this run, for audit.
    pub entries: Vec<ledger::LedgerEntry>,
    /// Accumulated warnings (empty folders, unreadable directories, VINs
    /// over the cross-copy cap, etc.).
    pub warnings: Vec<String>,
}
