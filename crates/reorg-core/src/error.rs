//! Unified error type for the reorganizer pipeline.
//!
//! Mirrors the §7 error taxonomy: most variants are *recoverable* and are
//! collected into [`crate::ledger::Ledger`] warnings rather than propagated;
//! only [`ReorgError::FatalConfig`] aborts a run. Every variant carries
//! enough context for an operator to act on it without re-reading the log.

use std::fmt;
use std::path::PathBuf;

/// Unified error type covering every recoverable and fatal condition the
/// pipeline can encounter.
#[derive(Debug)]
pub enum ReorgError {
    /// A planned source file vanished between planning and execution.
    SourceMissing {
        /// The path that disappeared.
        path: PathBuf,
    },

    /// A directory could not be read (permission denied, etc.).
    Unreadable {
        /// The directory that could not be listed.
        path: PathBuf,
        /// The underlying I/O error, stringified (kept `Send + 'static`).
        detail: String,
    },

    /// PDF text extraction failed outright.
    PdfParseFailed {
        /// The PDF that failed to parse.
        path: PathBuf,
        /// Library-reported reason.
        detail: String,
    },

    /// A per-PDF scan exceeded its wall-clock deadline.
    PdfTimeout {
        /// The PDF that timed out.
        path: PathBuf,
        /// The deadline that was exceeded, in seconds.
        timeout_secs: u64,
    },

    /// The scan worker pool died; the caller should fall back to sequential.
    PoolBroken {
        /// Human-readable cause (e.g. "child process spawn failed").
        detail: String,
    },

    /// A copy hit a transient OS-level sharing violation.
    CopyLocked {
        /// Destination path that was locked.
        path: PathBuf,
        /// Number of retries already attempted.
        attempts: u32,
    },

    /// A copy failed for a non-transient reason.
    CopyFailed {
        /// Source path.
        source: PathBuf,
        /// Destination path.
        destination: PathBuf,
        /// Underlying OS error, stringified.
        detail: String,
    },

    /// A persistent cache file (OCR cache or rename map) was malformed.
    CacheCorrupt {
        /// The cache file path.
        path: PathBuf,
        /// Parse failure detail.
        detail: String,
    },

    /// OCR was requested but the engine is unavailable (missing language
    /// data, missing `tesseract` installation, etc.). Treated as "OCR
    /// produced no text": the pipeline continues without it.
    OcrUnavailable {
        /// Human-readable cause.
        detail: String,
    },

    /// Pre-flight configuration failure; this is the only variant that
    /// aborts a run.
    FatalConfig {
        /// What was wrong.
        detail: String,
    },

    /// A configuration file could not be loaded or parsed.
    Config {
        /// Path to the configuration file, if known.
        path: Option<PathBuf>,
        /// Human-readable description, with line number when available.
        detail: String,
    },

    /// An I/O error not otherwise classified above.
    Io(std::io::Error),

    /// A JSON (de)serialization error from a cache or log file.
    Json(serde_json::Error),
}

impl fmt::Display for ReorgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceMissing { path } => {
                write!(
                    f,
                    "source file vanished before it could be copied: {}\n  To fix: rerun; the plan will skip it again harmlessly.",
                    path.display()
                )
            }
            Self::Unreadable { path, detail } => {
                write!(
                    f,
                    "cannot read directory {}: {detail}\n  To fix: check permissions; the subtree is skipped, not fatal.",
                    path.display()
                )
            }
            Self::PdfParseFailed { path, detail } => {
                write!(
                    f,
                    "failed to extract text from {}: {detail}\n  Treated as zero VINs/categories found; rerun with --ocr if the PDF is scanned.",
                    path.display()
                )
            }
            Self::PdfTimeout { path, timeout_secs } => {
                write!(
                    f,
                    "scanning {} exceeded the {timeout_secs}s deadline; treated as empty.",
                    path.display()
                )
            }
            Self::PoolBroken { detail } => {
                write!(
                    f,
                    "worker pool failed: {detail}\n  Falling back to sequential processing for the remainder of this phase."
                )
            }
            Self::CopyLocked { path, attempts } => {
                write!(
                    f,
                    "destination {} is locked by another process after {attempts} attempts.",
                    path.display()
                )
            }
            Self::CopyFailed {
                source,
                destination,
                detail,
            } => {
                write!(
                    f,
                    "copy failed: {} -> {}: {detail}",
                    source.display(),
                    destination.display()
                )
            }
            Self::CacheCorrupt { path, detail } => {
                write!(
                    f,
                    "cache file {} is malformed: {detail}\n  To fix: delete the file; it will be rebuilt on the next run.",
                    path.display()
                )
            }
            Self::OcrUnavailable { detail } => {
                write!(
                    f,
                    "OCR engine unavailable: {detail}\n  Continuing without OCR text for this file."
                )
            }
            Self::FatalConfig { detail } => {
                write!(f, "cannot start: {detail}")
            }
            Self::Config { path, detail } => {
                if let Some(p) = path {
                    write!(f, "{}: {detail}", p.display())
                } else {
                    write!(f, "config error: {detail}")
                }
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl std::error::Error for ReorgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReorgError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ReorgError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// Returns `true` for [`ReorgError`] variants that §7 classifies as
/// recoverable — the caller should log and continue rather than abort.
#[must_use]
pub const fn is_recoverable(err: &ReorgError) -> bool {
    !matches!(err, ReorgError::FatalConfig { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_source_missing_mentions_path_and_fix() {
        let err = ReorgError::SourceMissing {
            path: PathBuf::from("/src/a.pdf"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("/src/a.pdf"));
        assert!(msg.contains("To fix"));
    }

    #[test]
    fn display_copy_failed_includes_both_paths() {
        let err = ReorgError::CopyFailed {
            source: PathBuf::from("/src/a.pdf"),
            destination: PathBuf::from("/out/a.pdf"),
            detail: "disk full".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("/src/a.pdf"));
        assert!(msg.contains("/out/a.pdf"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn fatal_config_is_not_recoverable() {
        let err = ReorgError::FatalConfig {
            detail: "missing source root".to_owned(),
        };
        assert!(!is_recoverable(&err));
    }

    #[test]
    fn copy_locked_is_recoverable() {
        let err = ReorgError::CopyLocked {
            path: PathBuf::from("/out/a.pdf"),
            attempts: 5,
        };
        assert!(is_recoverable(&err));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::other("disk full");
        let err: ReorgError = io_err.into();
        assert!(matches!(err, ReorgError::Io(_)));
    }

    #[test]
    fn error_source_io() {
        let err = ReorgError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn error_source_non_io_is_none() {
        let err = ReorgError::FatalConfig {
            detail: "x".to_owned(),
        };
        assert!(std::error::Error::source(&err).is_none());
    }
}
