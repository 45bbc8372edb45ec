//! Orchestration: wires S1–S5 plus the two post-execution passes into one
//! run driven by the CLI, threading configuration and persistent caches
//! through in the order SPEC_FULL.md lays them out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reorg_core::cache::{fingerprint, OcrCache, OcrCacheEntry, RenameMap};
use reorg_core::category::{classify_by_filename, is_ignored_filename};
use reorg_core::config::ReorgConfig;
use reorg_core::error::ReorgError;
use reorg_core::executor::{execute, ExecutorConfig, JsonlLogger};
use reorg_core::inventory::{Inventory, InventoryWriter};
use reorg_core::ledger::{Action, Ledger, LedgerEntry, Status};
use reorg_core::partition::enumerate_partitions;
use reorg_core::pdf_scan::{OcrEngine, OcrSettings, PdfExtractBackend, PdfRasterizer, PdfiumRasterizer, PdfScanPool, TesseractEngine};
use reorg_core::planner::Planner;
use reorg_core::rename::apply_rename_dedup;
use reorg_core::vin::{extract_vins_from_name, VinOrSentinel};
use reorg_core::Summary;

use crate::cli::Cli;
use crate::excel::XlsxInventoryWriter;

const CACHE_DIR_NAME: &str = ".reorg-cache";
const OCR_CACHE_FILE: &str = "ocr_cache.json";
const RENAME_MAP_FILE: &str = "rename_map.json";

fn is_pdf(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn collect_pdfs(partitions: &[reorg_core::partition::Partition]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for partition in partitions {
        for entry in walkdir::WalkDir::new(&partition.path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if is_pdf(path) && !is_ignored_filename(&entry.file_name().to_string_lossy()) {
                out.push(path.to_owned());
            }
        }
    }
    out
}

fn prescan(
    pdfs: &[PathBuf],
    cfg: &ReorgConfig,
    ocr_enabled: bool,
    workers: usize,
    ocr_cache: &mut OcrCache,
    warnings: &mut Vec<String>,
) {
    let settings = OcrSettings::normal(&cfg.ocr, ocr_enabled);
    let timeout = Duration::from_secs(if ocr_enabled { cfg.ocr.ocr_timeout_secs } else { cfg.ocr.text_timeout_secs });
    let bar = progress_bar(pdfs.len() as u64, "scanning PDFs");

    let Ok(pool) = PdfScanPool::new(workers) else {
        sequential_prescan(pdfs, &settings, ocr_cache, warnings, &bar);
        bar.finish_with_message("prescan complete (sequential fallback)");
        return;
    };

    for (path, result) in pool.scan_many(pdfs, timeout, &settings) {
        bar.inc(1);
        match result {
            Ok(outcome) => {
                if let Ok((size, mtime_ns)) = fingerprint(&path) {
                    ocr_cache.insert(
                        path,
                        OcrCacheEntry {
                            size,
                            mtime_ns,
                            ocr_used: outcome.ocr_used,
                            vins: outcome.vins,
                            cats: outcome.categories,
                            reclass_cat: None,
                        },
                    );
                }
            }
            Err(e) => {
                let message = format!("prescan failed for {}: {e}", path.display());
                tracing::warn!("{message}");
                warnings.push(message);
            }
        }
    }
    bar.finish_with_message("prescan complete");
}

fn sequential_prescan(
    pdfs: &[PathBuf],
    settings: &OcrSettings,
    ocr_cache: &mut OcrCache,
    warnings: &mut Vec<String>,
    bar: &indicatif::ProgressBar,
) {
    let extractor = PdfExtractBackend;
    let engine = TesseractEngine;
    let rasterizer = PdfiumRasterizer;
    let ocr: Option<(&dyn OcrEngine, &dyn PdfRasterizer)> =
        settings.enabled.then_some((&engine as &dyn OcrEngine, &rasterizer as &dyn PdfRasterizer));
    for path in pdfs {
        bar.inc(1);
        match reorg_core::pdf_scan::scan_pdf(path, &extractor, ocr, settings) {
            Ok((_, outcome)) => {
                if let Ok((size, mtime_ns)) = fingerprint(path) {
                    ocr_cache.insert(
                        path.clone(),
                        OcrCacheEntry {
                            size,
                            mtime_ns,
                            ocr_used: outcome.ocr_used,
                            vins: outcome.vins,
                            cats: outcome.categories,
                            reclass_cat: None,
                        },
                    );
                }
            }
            Err(e) => {
                let message = format!("prescan failed for {}: {e}", path.display());
                tracing::warn!("{message}");
                warnings.push(message);
            }
        }
    }
}

fn progress_bar(len: u64, message: &'static str) -> indicatif::ProgressBar {
    let bar = indicatif::ProgressBar::new(len);
    bar.set_style(
        indicatif::ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message(message);
    bar
}

/// Reconstruct a minimal `Done` ledger by reading the existing output tree,
/// for `--inventory-only` reruns that skip planning and execution entirely.
fn rebuild_ledger_from_output(output_root: &Path) -> Ledger {
    let mut ledger = Ledger::new();
    let Ok(partitions) = std::fs::read_dir(output_root) else {
        return ledger;
    };
    for partition_entry in partitions.filter_map(Result::ok).filter(|e| e.path().is_dir()) {
        let Ok(vin_dirs) = std::fs::read_dir(partition_entry.path()) else {
            continue;
        };
        for vin_entry in vin_dirs.filter_map(Result::ok).filter(|e| e.path().is_dir()) {
            let vin_name = vin_entry.file_name().to_string_lossy().into_owned();
            let vin_tag = extract_vins_from_name(&vin_name).into_iter().next().map_or(VinOrSentinel::NoVin, VinOrSentinel::Vin);
            for file_entry in walkdir::WalkDir::new(vin_entry.path())
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let name = file_entry.file_name().to_string_lossy().into_owned();
                if is_ignored_filename(&name) {
                    continue;
                }
                let category = classify_by_filename(&name);
                let mut entry = LedgerEntry::copy(
                    file_entry.path().to_owned(),
                    file_entry.path().to_owned(),
                    "rebuilt from existing output tree",
                    vin_entry.path(),
                    vin_tag.clone(),
                    category,
                );
                entry.status = Status::Done;
                ledger.push(entry);
            }
        }
    }
    ledger
}

/// Run the full pipeline for one invocation of the CLI.
///
/// # Errors
/// Returns an error on fatal configuration problems or unrecoverable I/O
/// failures (audit log creation, cache persistence).
pub fn run(cli: &Cli) -> Result<Summary, ReorgError> {
    let cfg = ReorgConfig::load(cli.config.as_deref().unwrap_or_else(|| Path::new("reorg.toml")))?;
    tracing::info!(config = %cfg, "loaded configuration");

    let copy_workers = cli.workers.unwrap_or(cfg.workers.copy);
    let scan_workers = cli.workers.unwrap_or(cfg.workers.scan);

    std::fs::create_dir_all(&cli.output)?;
    let cache_dir = cli.output.join(CACHE_DIR_NAME);
    std::fs::create_dir_all(&cache_dir)?;
    let ocr_cache_path = cache_dir.join(OCR_CACHE_FILE);
    let rename_map_path = cache_dir.join(RENAME_MAP_FILE);

    let mut ocr_cache = OcrCache::load(&ocr_cache_path).unwrap_or_default();
    let mut rename_map = RenameMap::load(&rename_map_path).unwrap_or_default();
    let mut warnings: Vec<String> = Vec::new();
    let mut deduped = 0usize;
    let run_timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();

    let mut ledger = if cli.inventory_only {
        rebuild_ledger_from_output(&cli.output)
    } else {
        let partitions = enumerate_partitions(&cli.root, cli.range_start, cli.range_end);
        tracing::info!(count = partitions.len(), "enumerated partitions");

        if !cli.no_pdf {
            let pdfs = collect_pdfs(&partitions);
            tracing::info!(count = pdfs.len(), "prescanning PDFs");
            prescan(&pdfs, &cfg, cli.ocr, scan_workers, &mut ocr_cache, &mut warnings);
        }

        let mut ledger = Ledger::new();
        {
            let mut planner = Planner::new(&cli.output, &ocr_cache, &cfg.planner);
            for partition in &partitions {
                planner.plan_partition(partition, &mut ledger);
            }
            planner.cross_copy_pass(&mut ledger);
            planner.gap_fill_pass(&mut ledger);
            warnings.extend(planner.warnings().iter().cloned());
        }

        let planned_before_dedup = ledger.len();
        if cli.rename_files {
            apply_rename_dedup(&mut ledger, &mut rename_map)?;
        }
        deduped = planned_before_dedup.saturating_sub(ledger.len());

        let exec_cfg = ExecutorConfig {
            workers: copy_workers,
            backoff_secs: cfg.retry.backoff_secs.clone(),
            dry_run: !cli.execute,
        };
        let jsonl_log_path = cli.output.join(format!("log_{run_timestamp}.jsonl"));
        let logger = std::sync::Arc::new(JsonlLogger::create(&jsonl_log_path)?);
        let counts = execute(&mut ledger, &exec_cfg, &logger)?;
        tracing::info!(copied = counts.copied, skipped = counts.skipped, failed = counts.failed, "execution complete");

        ledger
    };

    if cli.execute && !cli.no_content_scan && !cli.inventory_only {
        let extractor = PdfExtractBackend;
        let engine = TesseractEngine;
        let rasterizer = PdfiumRasterizer;
        let ocr: Option<(&dyn OcrEngine, &dyn PdfRasterizer)> =
            cli.ocr.then_some((&engine as &dyn OcrEngine, &rasterizer as &dyn PdfRasterizer));
        let settings = OcrSettings::normal(&cfg.ocr, cli.ocr);
        let reclass_warnings = reorg_core::reclassify::reclassify_alte_documente(
            &cli.output,
            &extractor,
            ocr,
            &settings,
            &mut ocr_cache,
            &mut rename_map,
            cli.rename_files,
        )?;
        warnings.extend(reclass_warnings);
    }

    if cli.rescan && cli.execute {
        let extractor = PdfExtractBackend;
        let engine = TesseractEngine;
        let rasterizer = PdfiumRasterizer;
        let ocr: Option<(&dyn OcrEngine, &dyn PdfRasterizer)> = cli
            .ocr_rescue
            .then_some((&engine as &dyn OcrEngine, &rasterizer as &dyn PdfRasterizer));
        let settings = if cli.ocr_rescue { OcrSettings::rescue(&cfg.ocr) } else { OcrSettings::normal(&cfg.ocr, false) };
        let rescue_warnings = reorg_core::reclassify::rescue_no_vin(&cli.output, &extractor, ocr, &settings)?;
        warnings.extend(rescue_warnings);
    }

    ocr_cache.save(&ocr_cache_path)?;
    rename_map.save(&rename_map_path)?;

    let inventory = Inventory::build(&ledger, &rename_map, &cli.output);
    if cli.execute || cli.inventory_only {
        let excel_path = cli.excel.clone().unwrap_or_else(|| cli.output.join("inventory.xlsx"));
        XlsxInventoryWriter.write(&inventory, &excel_path)?;
        tracing::info!(path = %excel_path.display(), rows = inventory.len(), "wrote inventory");
    }

    let copied = ledger
        .entries()
        .iter()
        .filter(|e| e.action == Action::CopyFile && matches!(e.status, Status::Done | Status::Planned))
        .count();
    let skipped = ledger.entries().iter().filter(|e| e.status == Status::Skipped).count();
    let failed = ledger.entries().iter().filter(|e| e.status == Status::Failed).count();

    let summary = Summary {
        source_root: cli.root.clone(),
        output_root: cli.output.clone(),
        dry_run: !cli.execute,
        copied,
        skipped,
        failed,
        deduped,
        entries: ledger.entries().to_vec(),
        warnings,
    };

    if cli.execute && !cli.inventory_only {
        let summary_path = cli.output.join(format!("log_{run_timestamp}.json"));
        let serialized = serde_json::to_vec_pretty(&summary)?;
        std::fs::write(&summary_path, serialized)?;
        tracing::info!(path = %summary_path.display(), "wrote run summary");
    }

    Ok(summary)
}
