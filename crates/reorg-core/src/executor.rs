//! S5 — Executor (§4.5): drains the ledger through a bounded thread pool,
//! resolves destination collisions by content hash, retries transient
//! sharing violations with backoff, and streams a JSONL audit log.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use md5::{Digest, Md5};
use serde::Serialize;

use crate::error::ReorgError;
use crate::ledger::{Action, Ledger, LedgerEntry, Status};

/// Tuning for one executor run.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Thread pool size for copy execution.
    pub workers: usize,
    /// Backoff delays (seconds) tried in order on a sharing-violation retry.
    pub backoff_secs: Vec<f64>,
    /// When true, resolve collisions and advance progress but write nothing.
    pub dry_run: bool,
}

/// Aggregate outcome counts for one executor run (feeds the run [`Summary`](crate::ledger::Ledger)).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionCounts {
    /// Entries copied successfully.
    pub copied: usize,
    /// Entries skipped (vanished source or byte-identical destination).
    pub skipped: usize,
    /// Entries that failed after exhausting retries.
    pub failed: usize,
}

/// One line of the streaming JSONL audit log (§4.8).
#[derive(Serialize)]
struct LogRecord<'a> {
    action: &'a Action,
    source: &'a Path,
    destination: &'a Path,
    reason: &'a str,
    parent_folder: &'a Path,
    vin: String,
    status: &'a Status,
}

/// A mutex-guarded, line-flushed JSONL writer (§4.8, §9 ambient note:
/// the same mutex-guarded-append idiom used for every other shared sink in
/// this codebase).
pub struct JsonlLogger {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlLogger {
    /// Create (or truncate) the log file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, ReorgError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one ledger entry as a JSON line, flushing immediately so the
    /// file stays parseable after a crash.
    ///
    /// # Errors
    /// Returns an error on serialization or I/O failure.
    pub fn log(&self, entry: &LedgerEntry) -> Result<(), ReorgError> {
        let record = LogRecord {
            action: &entry.action,
            source: &entry.source,
            destination: &entry.destination,
            reason: &entry.reason,
            parent_folder: &entry.parent_folder,
            vin: entry.vin.to_string(),
            status: &entry.status,
        };
        let line = serde_json::to_string(&record)?;
        let mut guard = self.writer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        writeln!(guard, "{line}")?;
        guard.flush()?;
        Ok(())
    }
}

fn md5_hex(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Md5::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

fn files_identical(a: &Path, b: &Path) -> bool {
    let (Ok(ma), Ok(mb)) = (std::fs::metadata(a), std::fs::metadata(b)) else {
        return false;
    };
    if ma.len() != mb.len() {
        return false;
    }
    matches!((md5_hex(a), md5_hex(b)), (Ok(ha), Ok(hb)) if ha == hb)
}

fn strip_numeric_suffix(stem: &str) -> &str {
    stem.rsplit_once('_')
        .filter(|(_, n)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .map_or(stem, |(base, _)| base)
}

/// Outcome of collision resolution: where to actually write, or that the
/// copy should be skipped because an identical file already exists there.
enum Resolution {
    WriteTo(PathBuf),
    Skip,
}

fn resolve_collision(source: &Path, destination: &Path) -> Resolution {
    if !destination.exists() {
        return Resolution::WriteTo(destination.to_owned());
    }
    if files_identical(source, destination) {
        return Resolution::Skip;
    }

    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let stem = destination
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    let stem = strip_numeric_suffix(&stem).to_owned();
    let ext = destination.extension().map_or_else(String::new, |e| e.to_string_lossy().into_owned());

    let mut n = 1u32;
    loop {
        let candidate_name = if ext.is_empty() {
            format!("{stem}_{n}")
        } else {
            format!("{stem}_{n}.{ext}")
        };
        let candidate = parent.join(candidate_name);
        if !candidate.exists() {
            return Resolution::WriteTo(candidate);
        }
        if files_identical(source, &candidate) {
            return Resolution::Skip;
        }
        n += 1;
    }
}

fn is_sharing_violation(err: &std::io::Error) -> bool {
    if cfg!(windows) && err.raw_os_error() == Some(32) {
        return true;
    }
    err.to_string().to_lowercase().contains("being used")
}

fn copy_one(entry: &LedgerEntry, cfg: &ExecutorConfig) -> (Status, Option<PathBuf>) {
    if !entry.source.exists() {
        return (Status::Skipped, None);
    }
    let resolved = match resolve_collision(&entry.source, &entry.destination) {
        Resolution::Skip => return (Status::Skipped, None),
        Resolution::WriteTo(path) => path,
    };

    if cfg.dry_run {
        return (Status::Planned, Some(resolved));
    }

    if let Some(parent) = resolved.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return (Status::Failed, None);
        }
    }

    let mut attempt = 0usize;
    loop {
        match std::fs::copy(&entry.source, &resolved) {
            Ok(_) => return (Status::Done, Some(resolved)),
            Err(e) if is_sharing_violation(&e) && attempt < cfg.backoff_secs.len() => {
                std::thread::sleep(Duration::from_secs_f64(cfg.backoff_secs[attempt]));
                attempt += 1;
            }
            Err(_) => return (Status::Failed, None),
        }
    }
}

/// Execute `ledger` in place: runs consecutive `copy_file` entries through
/// a thread pool of `cfg.workers`, executing any other action sequentially
/// between batches (there are none today besides `create_folder`, which
/// this executor treats as a no-op since every copy ensures its own parent
/// directory exists).
///
/// # Errors
/// Returns an error only if the audit log itself cannot be written;
/// individual copy failures are recorded as entry status, never propagated.
pub fn execute(ledger: &mut Ledger, cfg: &ExecutorConfig, logger: &Arc<JsonlLogger>) -> Result<ExecutionCounts, ReorgError> {
    let pool = threadpool::ThreadPool::new(cfg.workers.max(1));
    let entries = std::mem::take(ledger.entries_mut());
    let results: Arc<Mutex<Vec<LedgerEntry>>> = Arc::new(Mutex::new(Vec::with_capacity(entries.len())));
    let counts = Arc::new(Mutex::new(ExecutionCounts::default()));

    for mut entry in entries {
        if entry.action != Action::CopyFile {
            entry.status = Status::Done;
            logger.log(&entry)?;
            results.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(entry);
            continue;
        }
        let cfg = cfg.clone();
        let results = Arc::clone(&results);
        let counts = Arc::clone(&counts);
        let logger = Arc::clone(logger);
        pool.execute(move || {
            let (status, resolved) = copy_one(&entry, &cfg);
            entry.status = status;
            if let Some(resolved) = resolved {
                entry.destination = resolved;
            }
            let mut c = counts.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            match entry.status {
                Status::Done | Status::Planned => c.copied += 1,
                Status::Skipped => c.skipped += 1,
                Status::Failed => {
                    c.failed += 1;
                    tracing::warn!(source = %entry.source.display(), destination = %entry.destination.display(), "copy failed");
                }
            }
            drop(c);
            // Logged here, inside the closure, rather than after `pool.join()`:
            // the audit log must reflect every completed copy as it happens so
            // a crash mid-run still leaves a parseable, up-to-date trail (§4.8).
            if let Err(e) = logger.log(&entry) {
                tracing::error!(error = %e, "failed to write audit log entry");
            }
            results.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(entry);
        });
    }
    pool.join();

    let mut final_entries = Arc::try_unwrap(results)
        .map(|m| m.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner))
        .unwrap_or_default();
    final_entries.sort_by(|a, b| a.destination.cmp(&b.destination));
    ledger.replace_entries(final_entries);

    let counts = *counts.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vin::{Vin, VinOrSentinel};
    use tempfile::tempdir;

    fn copy_entry(source: PathBuf, destination: PathBuf) -> LedgerEntry {
        LedgerEntry::copy(
            source,
            destination,
            "test",
            PathBuf::from("/src"),
            VinOrSentinel::Vin(Vin::new("AAAAAA12345678901").unwrap()),
            None,
        )
    }

    #[test]
    fn strip_numeric_suffix_removes_trailing_number() {
        assert_eq!(strip_numeric_suffix("casco_2"), "casco");
        assert_eq!(strip_numeric_suffix("casco"), "casco");
    }

    #[test]
    fn missing_source_is_skipped() {
        let dir = tempdir().unwrap();
        let cfg = ExecutorConfig {
            workers: 2,
            backoff_secs: vec![],
            dry_run: false,
        };
        let logger = Arc::new(JsonlLogger::create(&dir.path().join("log.jsonl")).unwrap());
        let mut ledger = Ledger::new();
        ledger.push(copy_entry(
            dir.path().join("missing.pdf"),
            dir.path().join("out").join("missing.pdf"),
        ));
        let counts = execute(&mut ledger, &cfg, &logger).unwrap();
        assert_eq!(counts.skipped, 1);
        assert_eq!(ledger.entries()[0].status, Status::Skipped);
    }

    #[test]
    fn fresh_copy_succeeds_and_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.pdf");
        std::fs::write(&src, b"hello").unwrap();
        let dest = dir.path().join("out").join("nested").join("a.pdf");

        let cfg = ExecutorConfig {
            workers: 2,
            backoff_secs: vec![],
            dry_run: false,
        };
        let logger = Arc::new(JsonlLogger::create(&dir.path().join("log.jsonl")).unwrap());
        let mut ledger = Ledger::new();
        ledger.push(copy_entry(src, dest.clone()));
        let counts = execute(&mut ledger, &cfg, &logger).unwrap();
        assert_eq!(counts.copied, 1);
        assert!(dest.exists());
    }

    #[test]
    fn identical_existing_destination_is_skipped() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.pdf");
        let dest_dir = dir.path().join("out");
        std::fs::create_dir_all(&dest_dir).unwrap();
        let dest = dest_dir.join("a.pdf");
        std::fs::write(&src, b"same").unwrap();
        std::fs::write(&dest, b"same").unwrap();

        let cfg = ExecutorConfig {
            workers: 1,
            backoff_secs: vec![],
            dry_run: false,
        };
        let logger = Arc::new(JsonlLogger::create(&dir.path().join("log.jsonl")).unwrap());
        let mut ledger = Ledger::new();
        ledger.push(copy_entry(src, dest));
        let counts = execute(&mut ledger, &cfg, &logger).unwrap();
        assert_eq!(counts.skipped, 1);
    }

    #[test]
    fn differing_existing_destination_gets_suffixed() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.pdf");
        let dest_dir = dir.path().join("out");
        std::fs::create_dir_all(&dest_dir).unwrap();
        let dest = dest_dir.join("a.pdf");
        std::fs::write(&src, b"new content").unwrap();
        std::fs::write(&dest, b"old content").unwrap();

        let cfg = ExecutorConfig {
            workers: 1,
            backoff_secs: vec![],
            dry_run: false,
        };
        let logger = Arc::new(JsonlLogger::create(&dir.path().join("log.jsonl")).unwrap());
        let mut ledger = Ledger::new();
        ledger.push(copy_entry(src, dest));
        let counts = execute(&mut ledger, &cfg, &logger).unwrap();
        assert_eq!(counts.copied, 1);
        assert!(dest_dir.join("a_1.pdf").exists());
    }

    #[test]
    fn log_file_has_one_line_per_copy() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.pdf");
        std::fs::write(&src, b"hello").unwrap();
        let log_path = dir.path().join("log.jsonl");

        let cfg = ExecutorConfig {
            workers: 1,
            backoff_secs: vec![],
            dry_run: false,
        };
        let logger = Arc::new(JsonlLogger::create(&log_path).unwrap());
        let mut ledger = Ledger::new();
        ledger.push(copy_entry(src, dir.path().join("out").join("a.pdf")));
        execute(&mut ledger, &cfg, &logger).unwrap();

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(serde_json::from_str::<serde_json::Value>(contents.lines().next().unwrap()).is_ok());
    }
}
