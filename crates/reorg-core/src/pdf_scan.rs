//! S2 — PDF Pre-Scanner (§4.2): text extraction, content classification, and
//! the OCR fallback, run in a crash-isolated process pool.

use std::collections::BTreeSet;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::category::{best_content_category, scan_prescan_categories, Category};
use crate::error::ReorgError;
use crate::vin::{extract_vins, Vin};

/// The pluggable PDF-text-extraction boundary (§6a). `reorg-core` ships one
/// implementation over `pdf-extract`; callers may substitute another.
pub trait TextExtractor: Send + Sync {
    /// Extract the PDF's text, one string per page.
    ///
    /// # Errors
    /// Returns [`ReorgError::PdfParseFailed`] if the library cannot open or
    /// parse the file.
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, ReorgError>;
}

/// Default [`TextExtractor`] backed by the `pdf-extract` crate.
#[derive(Debug, Default)]
pub struct PdfExtractBackend;

impl TextExtractor for PdfExtractBackend {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, ReorgError> {
        let bytes = std::fs::read(path)?;
        // pdf-extract exposes whole-document text, not a page iterator; we
        // treat the result as a single logical "page" for the VIN/category
        // regex passes below, which operate over the full text regardless.
        let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| {
            ReorgError::PdfParseFailed {
                path: path.to_owned(),
                detail: e.to_string(),
            }
        })?;
        Ok(vec![text])
    }
}

/// The OCR boundary (§6a): recognize text from a rendered page image.
pub trait OcrEngine: Send + Sync {
    /// Run OCR over the PNG bytes at `image_path`.
    ///
    /// # Errors
    /// Returns [`ReorgError::OcrUnavailable`] when the engine cannot run
    /// (missing binary, missing language pack); this is treated as "no text
    /// produced", not a fatal condition.
    fn recognize(&self, image_path: &Path, lang: &str) -> Result<String, ReorgError>;
}

/// Default [`OcrEngine`] backed by the `tesseract` crate bindings.
#[derive(Debug, Default)]
pub struct TesseractEngine;

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image_path: &Path, lang: &str) -> Result<String, ReorgError> {
        let path_str = image_path.to_string_lossy();
        tesseract::ocr(&path_str, lang).map_err(|e| ReorgError::OcrUnavailable {
            detail: e.to_string(),
        })
    }
}

/// Renders a PDF page to a rasterized image, the input to [`OcrEngine`].
pub trait PdfRasterizer: Send + Sync {
    /// Render `page_index` (0-based) of `path` to PNG bytes at `dpi`.
    ///
    /// # Errors
    /// Returns [`ReorgError::OcrUnavailable`] if rendering fails; OCR is a
    /// best-effort fallback, never a hard requirement.
    fn render_page_png(&self, path: &Path, page_index: usize, dpi: u32) -> Result<Vec<u8>, ReorgError>;
}

/// Default [`PdfRasterizer`] backed by `pdfium-render`.
#[derive(Debug, Default)]
pub struct PdfiumRasterizer;

impl PdfRasterizer for PdfiumRasterizer {
    fn render_page_png(&self, path: &Path, page_index: usize, dpi: u32) -> Result<Vec<u8>, ReorgError> {
        let pdfium = pdfium_render::prelude::Pdfium::default();
        let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
            ReorgError::OcrUnavailable {
                detail: format!("pdfium could not open {}: {e}", path.display()),
            }
        })?;
        let page = document.pages().get(page_index as u16).map_err(|e| {
            ReorgError::OcrUnavailable {
                detail: format!("page {page_index} unavailable: {e}"),
            }
        })?;
        let scale = dpi as f32 / 72.0;
        let config = pdfium_render::prelude::PdfRenderConfig::new()
            .set_target_width((page.width().value * scale) as i32)
            .set_maximum_height((page.height().value * scale) as i32);
        let bitmap = page.render_with_config(&config).map_err(|e| {
            ReorgError::OcrUnavailable {
                detail: format!("render failed: {e}"),
            }
        })?;
        let mut buf = Vec::new();
        {
            let mut cursor = std::io::Cursor::new(&mut buf);
            bitmap
                .as_image()
                .to_luma8()
                .write_to(&mut cursor, image::ImageFormat::Png)
                .map_err(|e| ReorgError::OcrUnavailable {
                    detail: format!("encode failed: {e}"),
                })?;
        }
        Ok(buf)
    }
}

/// OCR tuning passed per-task rather than read from process-global state
/// (§9 re-architecture note: no post-fork global config).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Whether OCR is enabled for this scan.
    pub enabled: bool,
    /// Pages inspected to decide OCR eligibility, and OCR'd if triggered.
    pub max_pages: usize,
    /// Alphanumeric-character floor for OCR eligibility.
    pub min_text_chars: usize,
    /// Raster DPI.
    pub dpi: u32,
    /// Tesseract language pack (e.g. `"ron+eng"`).
    pub lang: String,
}

impl OcrSettings {
    /// Settings for the normal (non-rescue) scan phase.
    #[must_use]
    pub fn normal(cfg: &crate::config::OcrConfig, enabled: bool) -> Self {
        Self {
            enabled,
            max_pages: cfg.max_ocr_pages,
            min_text_chars: cfg.min_text_chars,
            dpi: cfg.ocr_dpi,
            lang: cfg.lang.clone(),
        }
    }

    /// Boosted settings used during `_NO_VIN` rescue (§4.2, §4.7).
    #[must_use]
    pub fn rescue(cfg: &crate::config::OcrConfig) -> Self {
        Self {
            enabled: true,
            max_pages: cfg.rescue_ocr_pages,
            min_text_chars: cfg.min_text_chars,
            dpi: cfg.rescue_ocr_dpi,
            lang: cfg.lang.clone(),
        }
    }
}

/// Result of scanning one PDF: VINs found and (pre-scan) content categories.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// VINs discovered in the extracted text.
    pub vins: Vec<Vin>,
    /// Content categories matched by the pre-scan keyword groups.
    pub categories: BTreeSet<Category>,
    /// Whether OCR text was incorporated into this result.
    pub ocr_used: bool,
}

/// Is this PDF's leading text thin enough to warrant OCR (§4.2)?
#[must_use]
pub fn needs_ocr(pages: &[String], max_pages: usize, min_text_chars: usize) -> bool {
    let leading: usize = pages
        .iter()
        .take(max_pages)
        .map(|p| p.chars().filter(|c| c.is_alphanumeric()).count())
        .sum();
    leading < min_text_chars
}

/// Run the full S2 pre-scan algorithm over one PDF: extract text, decide
/// and apply OCR if eligible, then derive VINs and the pre-scan content
/// categories.
///
/// # Errors
/// Propagates [`ReorgError::PdfParseFailed`] if even the initial text
/// extraction fails; OCR failures degrade to "no OCR text" rather than
/// failing the whole scan.
pub fn scan_pdf(
    path: &Path,
    extractor: &dyn TextExtractor,
    ocr: Option<(&dyn OcrEngine, &dyn PdfRasterizer)>,
    settings: &OcrSettings,
) -> Result<(String, ScanOutcome), ReorgError> {
    let pages = extractor.extract_pages(path)?;
    let mut ocr_used = false;
    let mut full_text = pages.join("\n");

    if settings.enabled
        && needs_ocr(&pages, settings.max_pages, settings.min_text_chars)
        && let Some((engine, rasterizer)) = ocr
    {
        let mut tmp_dir = std::env::temp_dir();
        tmp_dir.push(format!("reorg-ocr-{}", std::process::id()));
        let _ = std::fs::create_dir_all(&tmp_dir);
        for page_index in 0..settings.max_pages {
            if let Ok(png_bytes) = rasterizer.render_page_png(path, page_index, settings.dpi) {
                let tmp_path = tmp_dir.join(format!("page-{page_index}.png"));
                if std::fs::write(&tmp_path, &png_bytes).is_ok()
                    && let Ok(text) = engine.recognize(&tmp_path, &settings.lang)
                {
                    full_text.push('\n');
                    full_text.push_str(&text);
                    ocr_used = true;
                }
                let _ = std::fs::remove_file(&tmp_path);
            }
        }
        let _ = std::fs::remove_dir(&tmp_dir);
    }

    let vins = extract_vins(&full_text);
    let categories = scan_prescan_categories(&full_text);
    Ok((
        full_text,
        ScanOutcome {
            vins,
            categories,
            ocr_used,
        },
    ))
}

/// Resolve the single dominant reclassification category for `text`
/// (§4.6), delegating to [`best_content_category`].
#[must_use]
pub fn reclassify_text(text: &str) -> Option<Category> {
    best_content_category(text)
}

// ---------------------------------------------------------------------------
// Process pool
// ---------------------------------------------------------------------------

/// Payload printed by a child worker invocation and read back by the parent.
#[derive(Debug, Serialize, Deserialize)]
struct WorkerOutput {
    vins: Vec<Vin>,
    categories: BTreeSet<Category>,
    ocr_used: bool,
}

/// Run the scan for one PDF inside a worker process and print the result as
/// a single JSON line to stdout. Invoked by the binary's hidden
/// `--scan-pdf-worker` subcommand; lives in `reorg-core` so both the parent
/// and the re-exec'd child call the identical scan code path.
///
/// # Errors
/// Returns an error if the PDF cannot be read or parsed; the parent treats
/// a non-zero exit identically to a timeout (empty result, failure counter).
pub fn run_worker(path: &Path, settings: &OcrSettings) -> Result<(), ReorgError> {
    let extractor = PdfExtractBackend;
    let engine = TesseractEngine;
    let rasterizer = PdfiumRasterizer;
    let ocr: Option<(&dyn OcrEngine, &dyn PdfRasterizer)> =
        settings.enabled.then_some((&engine as &dyn OcrEngine, &rasterizer as &dyn PdfRasterizer));
    let (_text, outcome) = scan_pdf(path, &extractor, ocr, settings)?;
    let payload = WorkerOutput {
        vins: outcome.vins,
        categories: outcome.categories,
        ocr_used: outcome.ocr_used,
    };
    let mut stdout = std::io::stdout();
    serde_json::to_writer(&mut stdout, &payload)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

/// A crash-isolated pool of PDF-scan workers, realized as real child
/// processes (§4.2, §9: "process pool with fallback to sequential").
pub struct PdfScanPool {
    self_exe: PathBuf,
    worker_count: usize,
}

impl PdfScanPool {
    /// Build a pool that re-invokes the current executable for each scan.
    ///
    /// # Errors
    /// Returns [`ReorgError::PoolBroken`] if the current executable path
    /// cannot be determined.
    pub fn new(worker_count: usize) -> Result<Self, ReorgError> {
        let self_exe = std::env::current_exe().map_err(|e| ReorgError::PoolBroken {
            detail: format!("could not determine current executable: {e}"),
        })?;
        Ok(Self {
            self_exe,
            worker_count: worker_count.max(1),
        })
    }

    /// Scan `paths` using up to `worker_count` concurrent child processes,
    /// enforcing `timeout` per PDF. If a child cannot even be spawned (the
    /// pool is broken), the remainder of `paths` falls back to an in-process
    /// sequential scan via `sequential`.
    pub fn scan_many(
        &self,
        paths: &[PathBuf],
        timeout: Duration,
        settings: &OcrSettings,
    ) -> Vec<(PathBuf, Result<ScanOutcome, ReorgError>)> {
        let pool = threadpool::ThreadPool::new(self.worker_count);
        let (tx, rx) = std::sync::mpsc::channel();

        // `current_exe` resolution is already validated in `new`; a spawn
        // failure here is a per-task condition handled inside
        // `scan_in_child`, which falls back to an in-process scan rather
        // than propagating and aborting the whole batch.
        for path in paths {
            let path = path.clone();
            let self_exe = self.self_exe.clone();
            let settings = settings.clone();
            let tx = tx.clone();
            pool.execute(move || {
                let result = scan_in_child(&self_exe, &path, &settings, timeout);
                tx.send((path, result)).ok();
            });
        }
        drop(tx);

        pool.join();
        rx.into_iter().collect()
    }
}

fn scan_in_child(
    self_exe: &Path,
    path: &Path,
    settings: &OcrSettings,
    timeout: Duration,
) -> Result<ScanOutcome, ReorgError> {
    let settings_json = serde_json::to_string(settings).unwrap_or_default();
    let spawn_result = Command::new(self_exe)
        .arg("--scan-pdf-worker")
        .arg(path)
        .arg("--scan-settings")
        .arg(&settings_json)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match spawn_result {
        Ok(c) => c,
        Err(e) => return sequential_scan(path, settings).map_err(|_| ReorgError::PoolBroken {
            detail: format!("failed to spawn scan worker: {e}"),
        }),
    };

    match child.wait_timeout(timeout) {
        Ok(Some(status)) if status.success() => {
            let mut out = String::new();
            if let Some(mut stdout) = child.stdout.take() {
                use std::io::Read as _;
                let _ = stdout.read_to_string(&mut out);
            }
            serde_json::from_str::<WorkerOutput>(out.trim()).map_or_else(
                |e| Err(ReorgError::PdfParseFailed {
                    path: path.to_owned(),
                    detail: format!("malformed worker output: {e}"),
                }),
                |payload| Ok(ScanOutcome {
                    vins: payload.vins,
                    categories: payload.categories,
                    ocr_used: payload.ocr_used,
                }),
            )
        }
        Ok(Some(_status)) => Err(ReorgError::PdfParseFailed {
            path: path.to_owned(),
            detail: "scan worker exited with a non-zero status".to_owned(),
        }),
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(ReorgError::PdfTimeout {
                path: path.to_owned(),
                timeout_secs: timeout.as_secs(),
            })
        }
        Err(e) => Err(ReorgError::PoolBroken {
            detail: format!("failed waiting on scan worker: {e}"),
        }),
    }
}

fn sequential_scan(path: &Path, settings: &OcrSettings) -> Result<ScanOutcome, ReorgError> {
    let extractor = PdfExtractBackend;
    let (_text, outcome) = scan_pdf(path, &extractor, None, settings)?;
    Ok(outcome)
}

/// Bring [`wait_timeout::ChildExt`] into scope without leaking the crate
/// name to every caller.
trait WaitTimeoutExt {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<std::process::ExitStatus>>;
}

impl WaitTimeoutExt for std::process::Child {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<std::process::ExitStatus>> {
        wait_timeout::ChildExt::wait_timeout(self, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubExtractor(Vec<String>);
    impl TextExtractor for StubExtractor {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<String>, ReorgError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn needs_ocr_true_for_thin_text() {
        assert!(needs_ocr(&["a".to_owned()], 2, 50));
    }

    #[test]
    fn needs_ocr_false_for_rich_text() {
        let page = "x".repeat(60);
        assert!(!needs_ocr(&[page], 2, 50));
    }

    #[test]
    fn scan_pdf_finds_vins_and_categories_without_ocr() {
        let extractor = StubExtractor(vec![
            "CONTRACT CADRU for AAAAAA12345678901".repeat(3),
        ]);
        let settings = OcrSettings {
            enabled: false,
            max_pages: 2,
            min_text_chars: 50,
            dpi: 150,
            lang: "ron+eng".to_owned(),
        };
        let (_text, outcome) =
            scan_pdf(Path::new("/fake.pdf"), &extractor, None, &settings).unwrap();
        assert!(outcome.vins.iter().any(|v| v.as_str() == "AAAAAA12345678901"));
        assert!(outcome.categories.contains(&Category::ContractCadru));
        assert!(!outcome.ocr_used);
    }

    #[test]
    fn scan_pdf_skips_ocr_when_disabled_even_if_thin() {
        let extractor = StubExtractor(vec!["x".to_owned()]);
        let settings = OcrSettings {
            enabled: false,
            max_pages: 2,
            min_text_chars: 50,
            dpi: 150,
            lang: "ron+eng".to_owned(),
        };
        let (_text, outcome) =
            scan_pdf(Path::new("/fake.pdf"), &extractor, None, &settings).unwrap();
        assert!(!outcome.ocr_used);
    }

    #[test]
    fn reclassify_text_delegates_to_best_content_category() {
        assert_eq!(
            reclassify_text("CONTRACT CADRU then CASCO"),
            Some(Category::ContractCadru)
        );
    }
}
