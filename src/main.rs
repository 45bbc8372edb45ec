//! `vin-reorg` — reorganize a VIN-driven leasing document archive into a
//! clean per-VIN output tree.

use clap::Parser;
use reorg_core::pdf_scan::OcrSettings;
use vin_reorg::cli::Cli;
use vin_reorg::{pipeline, telemetry};

fn main() {
    let cli = Cli::parse();

    if let Some(path) = cli.scan_pdf_worker.clone() {
        std::process::exit(run_scan_worker(&cli, &path));
    }

    telemetry::init();

    match pipeline::run(&cli) {
        Ok(summary) => {
            report(&summary);
            if summary.failed > 0 {
                std::process::exit(1);
            }
        }
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn run_scan_worker(cli: &Cli, path: &std::path::Path) -> i32 {
    let settings: OcrSettings = cli
        .scan_settings
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_else(|| OcrSettings {
            enabled: false,
            max_pages: 2,
            min_text_chars: 50,
            dpi: 150,
            lang: "ron+eng".to_owned(),
        });
    match reorg_core::pdf_scan::run_worker(path, &settings) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn report(summary: &reorg_core::Summary) {
    if summary.dry_run {
        println!("Dry run: {} planned copies, {} skipped, {} failed.", summary.copied, summary.skipped, summary.failed);
        println!("Re-run with --execute to write to disk.");
    } else {
        println!("Copied {}, skipped {}, failed {}.", summary.copied, summary.skipped, summary.failed);
    }
    for warning in &summary.warnings {
        eprintln!("warning: {warning}");
    }
}
