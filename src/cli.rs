//! Command-line surface (§6a). One flag per pipeline knob, plus a hidden
//! re-invocation subcommand used only by the PDF scan process pool.

use std::path::PathBuf;

use clap::Parser;

/// Reorganize a VIN-driven leasing document archive into a clean per-VIN
/// output tree.
#[derive(Parser, Debug)]
#[command(name = "vin-reorg", version, about, long_about = None)]
pub struct Cli {
    /// Source archive root.
    #[arg(long)]
    pub root: PathBuf,

    /// Output tree root.
    #[arg(long)]
    pub output: PathBuf,

    /// Optional `reorg.toml` with pipeline tuning overrides.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Actually write to disk. Without this flag the run is a dry-run: the
    /// plan and summary are produced but nothing is copied.
    #[arg(long)]
    pub execute: bool,

    /// Skip PDF content scanning (VIN/category extraction) entirely.
    #[arg(long)]
    pub no_pdf: bool,

    /// Skip the content reclassification pass (§4.6).
    #[arg(long)]
    pub no_content_scan: bool,

    /// Worker pool size override for both the copy thread pool and the
    /// PDF-scan process pool.
    #[arg(long)]
    pub workers: Option<usize>,

    /// 1-based inclusive first partition index.
    #[arg(long)]
    pub range_start: Option<u32>,

    /// 1-based inclusive last partition index.
    #[arg(long)]
    pub range_end: Option<u32>,

    /// Enable the rename/dedup pass (§4.4).
    #[arg(long)]
    pub rename_files: bool,

    /// Enable OCR fallback everywhere a PDF needs it.
    #[arg(long)]
    pub ocr: bool,

    /// Enable OCR only during `_NO_VIN` rescue, with boosted settings.
    #[arg(long)]
    pub ocr_rescue: bool,

    /// Run `_NO_VIN` rescue and re-apply renames against an existing
    /// output tree instead of a fresh plan.
    #[arg(long)]
    pub rescan: bool,

    /// Rebuild the inventory spreadsheet from the existing output tree and
    /// source archive without executing any copies.
    #[arg(long)]
    pub inventory_only: bool,

    /// Override the inventory spreadsheet path (defaults to
    /// `<output>/inventory.xlsx`).
    #[arg(long)]
    pub excel: Option<PathBuf>,

    /// Internal: scan a single PDF and print the result as JSON. Used by
    /// the parent process to re-invoke itself in a crash-isolated child;
    /// never intended to be run directly.
    #[arg(long, hide = true)]
    pub scan_pdf_worker: Option<PathBuf>,

    /// Internal: JSON-encoded `OcrSettings` for `--scan-pdf-worker`.
    #[arg(long, hide = true)]
    pub scan_settings: Option<String>,
}
