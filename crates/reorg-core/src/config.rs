//! Pipeline tuning configuration, loaded from an optional `reorg.toml`.
//!
//! Every field has a built-in default matching the spec's hard-coded
//! constants; the file only needs to mention fields the operator wants to
//! override. Unknown fields are rejected rather than silently ignored so
//! typos in the config file surface immediately.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ReorgError;

/// Top-level pipeline configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReorgConfig {
    /// Worker pool sizing.
    #[serde(default)]
    pub workers: WorkersConfig,
    /// OCR thresholds and boosted-rescue settings.
    #[serde(default)]
    pub ocr: OcrConfig,
    /// Copy retry/backoff schedule.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Planner tuning (cross-copy cap, etc.).
    #[serde(default)]
    pub planner: PlannerConfig,
}

/// Worker pool sizes for the two concurrent phases (§5).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkersConfig {
    /// Thread pool size for copy execution. Defaults to `min(8, cores)`.
    #[serde(default = "default_copy_workers")]
    pub copy: usize,
    /// Process pool size for PDF scanning. Defaults to `min(8, cores)`.
    #[serde(default = "default_scan_workers")]
    pub scan: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            copy: default_copy_workers(),
            scan: default_scan_workers(),
        }
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get).min(8)
}

fn default_copy_workers() -> usize {
    default_worker_count()
}

fn default_scan_workers() -> usize {
    default_worker_count()
}

/// OCR fallback thresholds (§4.2).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OcrConfig {
    /// Pages inspected when deciding whether a PDF needs OCR.
    #[serde(default = "default_max_ocr_pages")]
    pub max_ocr_pages: usize,
    /// Alphanumeric-character floor under which a page is OCR-eligible.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    /// Raster DPI for normal OCR.
    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,
    /// Raster DPI during `_NO_VIN` rescue (boosted).
    #[serde(default = "default_rescue_ocr_dpi")]
    pub rescue_ocr_dpi: u32,
    /// Pages scanned during `_NO_VIN` rescue (boosted).
    #[serde(default = "default_rescue_ocr_pages")]
    pub rescue_ocr_pages: usize,
    /// Tesseract language pack.
    #[serde(default = "default_ocr_lang")]
    pub lang: String,
    /// Per-PDF timeout for text-only scans, in seconds.
    #[serde(default = "default_text_timeout_secs")]
    pub text_timeout_secs: u64,
    /// Per-PDF timeout when OCR is enabled, in seconds.
    #[serde(default = "default_ocr_timeout_secs")]
    pub ocr_timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            max_ocr_pages: default_max_ocr_pages(),
            min_text_chars: default_min_text_chars(),
            ocr_dpi: default_ocr_dpi(),
            rescue_ocr_dpi: default_rescue_ocr_dpi(),
            rescue_ocr_pages: default_rescue_ocr_pages(),
            lang: default_ocr_lang(),
            text_timeout_secs: default_text_timeout_secs(),
            ocr_timeout_secs: default_ocr_timeout_secs(),
        }
    }
}

const fn default_max_ocr_pages() -> usize {
    2
}
const fn default_min_text_chars() -> usize {
    50
}
const fn default_ocr_dpi() -> u32 {
    150
}
const fn default_rescue_ocr_dpi() -> u32 {
    300
}
const fn default_rescue_ocr_pages() -> usize {
    5
}
fn default_ocr_lang() -> String {
    "ron+eng".to_owned()
}
const fn default_text_timeout_secs() -> u64 {
    120
}
const fn default_ocr_timeout_secs() -> u64 {
    30
}

/// Copy collision retry/backoff schedule (§4.5).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Backoff delays in seconds, tried in order.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: Vec<f64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_secs: default_backoff_secs(),
        }
    }
}

fn default_backoff_secs() -> Vec<f64> {
    vec![0.1, 0.2, 0.4, 0.8, 1.6]
}

/// Planner tuning (§4.3.4).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerConfig {
    /// Maximum content-VIN count before a PDF is excluded from cross-copy.
    #[serde(default = "default_max_cross_copy_vins")]
    pub max_cross_copy_vins: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_cross_copy_vins: default_max_cross_copy_vins(),
        }
    }
}

const fn default_max_cross_copy_vins() -> usize {
    100
}

impl ReorgConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields all defaults, not an error; a malformed file
    /// yields a [`ReorgError::Config`] with a line number when the parser
    /// can determine one.
    ///
    /// # Errors
    /// Returns an error on I/O failures other than not-found, or on invalid
    /// TOML / unknown fields.
    pub fn load(path: &Path) -> Result<Self, ReorgError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ReorgError::Config {
                    path: Some(path.to_owned()),
                    detail: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|err| match err {
            ReorgError::Config { detail, .. } => ReorgError::Config {
                path: Some(path.to_owned()),
                detail,
            },
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns an error on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ReorgError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start].chars().filter(|&c| c == '\n').count() + 1;
                message = format!("line {line}: {message}");
            }
            ReorgError::Config {
                path: None,
                detail: message,
            }
        })
    }
}

impl fmt::Display for ReorgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workers(copy={}, scan={}) ocr(dpi={}) retry({} steps) cross_copy_cap={}",
            self.workers.copy,
            self.workers.scan,
            self.ocr.ocr_dpi,
            self.retry.backoff_secs.len(),
            self.planner.max_cross_copy_vins
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = ReorgConfig::default();
        assert_eq!(cfg.ocr.max_ocr_pages, 2);
        assert_eq!(cfg.ocr.min_text_chars, 50);
        assert_eq!(cfg.ocr.ocr_dpi, 150);
        assert_eq!(cfg.ocr.rescue_ocr_dpi, 300);
        assert_eq!(cfg.ocr.rescue_ocr_pages, 5);
        assert_eq!(cfg.ocr.lang, "ron+eng");
        assert_eq!(cfg.ocr.text_timeout_secs, 120);
        assert_eq!(cfg.ocr.ocr_timeout_secs, 30);
        assert_eq!(cfg.retry.backoff_secs, vec![0.1, 0.2, 0.4, 0.8, 1.6]);
        assert_eq!(cfg.planner.max_cross_copy_vins, 100);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = ReorgConfig::load(Path::new("/nonexistent/reorg.toml")).unwrap();
        assert_eq!(cfg, ReorgConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_given_fields() {
        let cfg = ReorgConfig::parse("[ocr]\nocr_dpi = 200\n").unwrap();
        assert_eq!(cfg.ocr.ocr_dpi, 200);
        assert_eq!(cfg.ocr.max_ocr_pages, 2);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = ReorgConfig::parse("[ocr]\nbogus = 1\n").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("bogus") || msg.contains("unknown"));
    }

    #[test]
    fn parse_error_reports_line_number() {
        let err = ReorgConfig::parse("[ocr]\nocr_dpi = not_a_number\n").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("line 2"));
    }

    #[test]
    fn display_is_compact() {
        let cfg = ReorgConfig::default();
        let s = format!("{cfg}");
        assert!(s.contains("workers"));
        assert!(s.contains("cross_copy_cap=100"));
    }
}
