//! §4.6 Content Reclassifier and §4.7 `_NO_VIN` Rescue. Both run after the
//! executor has finished and operate directly on the output tree rather
//! than on the in-memory ledger.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::cache::{fingerprint, OcrCache, OcrCacheEntry, RenameMap};
use crate::category::{classify_by_filename, is_ignored_filename, Category};
use crate::error::ReorgError;
use crate::pdf_scan::{scan_pdf, OcrEngine, OcrSettings, PdfRasterizer, TextExtractor};
use crate::vin::{extract_vins_from_name, Vin};

static SHORT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(cc|subct|ces|fl|casco|rca|op|fact|TALON\+CIV|talon_civ|talon|civ)(_\d+)?\.").unwrap()
});

/// Whether `name` already carries a canonical short-name stem, i.e. the
/// rename/dedup pass (or a prior reclassification) has already classified
/// it. Anything else is an `Alte Documente` leftover.
#[must_use]
pub fn is_already_classified(name: &str) -> bool {
    SHORT_NAME_RE.is_match(name)
}

fn unique_destination(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let plain = dir.join(format!("{stem}.{ext}"));
    if !plain.exists() {
        return plain;
    }
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}_{n}.{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

fn scan_or_cached(
    path: &Path,
    extractor: &dyn TextExtractor,
    ocr: Option<(&dyn OcrEngine, &dyn PdfRasterizer)>,
    settings: &OcrSettings,
    ocr_cache: &mut OcrCache,
) -> Result<Option<Category>, ReorgError> {
    let (size, mtime_ns) = fingerprint(path)?;
    if let Some(entry) = ocr_cache.get_fresh(path, size, mtime_ns) {
        if entry.reclass_cat.is_some() {
            return Ok(entry.reclass_cat);
        }
    }
    let (text, outcome) = scan_pdf(path, extractor, ocr, settings)?;
    let reclass_cat = crate::pdf_scan::reclassify_text(&text);
    ocr_cache.insert(
        path.to_owned(),
        OcrCacheEntry {
            size,
            mtime_ns,
            ocr_used: outcome.ocr_used,
            vins: outcome.vins,
            cats: outcome.categories,
            reclass_cat,
        },
    );
    Ok(reclass_cat)
}

/// Run the §4.6 content reclassifier over every VIN directory under
/// `output_root` (immediate children of each partition, excluding
/// `_NO_VIN`). Returns accumulated warnings.
///
/// # Errors
/// Propagates I/O errors reading the output tree; individual PDF scan
/// failures are absorbed (treated as "no reclassification") rather than
/// aborting the pass.
pub fn reclassify_alte_documente(
    output_root: &Path,
    extractor: &dyn TextExtractor,
    ocr: Option<(&dyn OcrEngine, &dyn PdfRasterizer)>,
    ocr_settings: &OcrSettings,
    ocr_cache: &mut OcrCache,
    rename_map: &mut RenameMap,
    rename_on_disk: bool,
) -> Result<Vec<String>, ReorgError> {
    let mut warnings = Vec::new();
    let Ok(partitions) = std::fs::read_dir(output_root) else {
        return Ok(warnings);
    };

    for partition_entry in partitions.filter_map(Result::ok).filter(|e| e.path().is_dir()) {
        let Ok(vin_dirs) = std::fs::read_dir(partition_entry.path()) else {
            continue;
        };
        for vin_entry in vin_dirs.filter_map(Result::ok).filter(|e| e.path().is_dir()) {
            let vin_name = vin_entry.file_name().to_string_lossy().into_owned();
            if vin_name == "_NO_VIN" {
                continue;
            }
            reclassify_one_vin_dir(
                &vin_entry.path(),
                &vin_name,
                extractor,
                ocr,
                ocr_settings,
                ocr_cache,
                rename_map,
                rename_on_disk,
                &mut warnings,
            )?;
        }
    }
    Ok(warnings)
}

#[allow(clippy::too_many_arguments)]
fn reclassify_one_vin_dir(
    vin_dir: &Path,
    vin_name: &str,
    extractor: &dyn TextExtractor,
    ocr: Option<(&dyn OcrEngine, &dyn PdfRasterizer)>,
    ocr_settings: &OcrSettings,
    ocr_cache: &mut OcrCache,
    rename_map: &mut RenameMap,
    rename_on_disk: bool,
    warnings: &mut Vec<String>,
) -> Result<(), ReorgError> {
    let Ok(read_dir) = std::fs::read_dir(vin_dir) else {
        return Ok(());
    };
    let mut present = BTreeSet::new();
    let mut leftovers = Vec::new();
    for entry in read_dir.filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_ignored_filename(&name) {
            continue;
        }
        if is_already_classified(&name) {
            if let Some(cat) = classify_by_filename(&name) {
                present.insert(cat);
            }
        } else if name.to_lowercase().ends_with(".pdf") {
            leftovers.push(path);
        }
    }

    let mut missing: BTreeSet<Category> = Category::RECLASSIFY_CRITICAL
        .into_iter()
        .filter(|c| !present.contains(c))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    for path in leftovers {
        if missing.is_empty() {
            break;
        }
        let cat = match scan_or_cached(&path, extractor, ocr, ocr_settings, ocr_cache) {
            Ok(c) => c,
            Err(e) => {
                let message = format!("reclassify scan failed for {}: {e}", path.display());
                tracing::warn!("{message}");
                warnings.push(message);
                continue;
            }
        };
        let Some(cat) = cat else { continue };
        if !missing.contains(&cat) {
            continue;
        }
        let Some(short) = cat.short_name() else { continue };

        if rename_on_disk {
            let dest = unique_destination(vin_dir, short, "pdf");
            let original_name = path.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            if std::fs::rename(&path, &dest).is_ok() {
                rename_map.record(
                    vin_name,
                    &dest.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
                    original_name,
                );
            }
        }
        missing.remove(&cat);
    }
    Ok(())
}

fn place_copy(dest_dir: &Path, source: &Path, category: Option<Category>) -> Result<PathBuf, ReorgError> {
    std::fs::create_dir_all(dest_dir)?;
    let original_name = source.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let dest = category.and_then(Category::short_name).map_or_else(
        || dest_dir.join(&original_name),
        |short| unique_destination(dest_dir, short, "pdf"),
    );
    std::fs::copy(source, &dest)?;
    Ok(dest)
}

/// Run the §4.7 `_NO_VIN` rescue pass over every
/// `output/<partition>/_NO_VIN/<folder>` directory: discover VINs per
/// folder (content, falling back to the folder name), move files into the
/// lexicographically first VIN's directory, and cross-copy into every
/// other discovered VIN. Empty `_NO_VIN` folders (and an empty `_NO_VIN`
/// itself) are removed afterward.
///
/// # Errors
/// Propagates I/O errors reading the output tree.
pub fn rescue_no_vin(
    output_root: &Path,
    extractor: &dyn TextExtractor,
    ocr: Option<(&dyn OcrEngine, &dyn PdfRasterizer)>,
    ocr_settings: &OcrSettings,
) -> Result<Vec<String>, ReorgError> {
    let mut warnings = Vec::new();
    let Ok(partitions) = std::fs::read_dir(output_root) else {
        return Ok(warnings);
    };

    for partition_entry in partitions.filter_map(Result::ok).filter(|e| e.path().is_dir()) {
        let no_vin_root = partition_entry.path().join("_NO_VIN");
        if !no_vin_root.is_dir() {
            continue;
        }
        let Ok(folders) = std::fs::read_dir(&no_vin_root) else {
            continue;
        };
        for folder_entry in folders.filter_map(Result::ok).filter(|e| e.path().is_dir()) {
            rescue_one_folder(&partition_entry.path(), &folder_entry.path(), extractor, ocr, ocr_settings, &mut warnings)?;
        }
        if std::fs::read_dir(&no_vin_root).is_ok_and(|mut it| it.next().is_none()) {
            let _ = std::fs::remove_dir(&no_vin_root);
        }
    }
    Ok(warnings)
}

fn rescue_one_folder(
    partition_dir: &Path,
    folder: &Path,
    extractor: &dyn TextExtractor,
    ocr: Option<(&dyn OcrEngine, &dyn PdfRasterizer)>,
    ocr_settings: &OcrSettings,
    warnings: &mut Vec<String>,
) -> Result<(), ReorgError> {
    let Ok(read_dir) = std::fs::read_dir(folder) else {
        return Ok(());
    };
    let mut files = Vec::new();
    let mut folder_vins: BTreeSet<Vin> = BTreeSet::new();
    for entry in read_dir.filter_map(Result::ok).filter(|e| e.path().is_file()) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().ends_with(".pdf") {
            match scan_pdf(&path, extractor, ocr, ocr_settings) {
                Ok((_, outcome)) => folder_vins.extend(outcome.vins),
                Err(e) => {
                    let message = format!("rescue scan failed for {}: {e}", path.display());
                    tracing::warn!("{message}");
                    warnings.push(message);
                }
            }
        }
        files.push(path);
    }

    if folder_vins.is_empty() {
        let folder_name = folder.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        folder_vins.extend(extract_vins_from_name(&folder_name));
    }
    let Some(primary) = folder_vins.iter().min().cloned() else {
        let message = format!("rescue found no VIN for {}", folder.display());
        tracing::warn!("{message}");
        warnings.push(message);
        return Ok(());
    };

    let primary_dir = partition_dir.join(primary.as_str());
    std::fs::create_dir_all(&primary_dir)?;
    for source in &files {
        let name = source.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        let category = classify_by_filename(&name);
        let dest = category.and_then(Category::short_name).map_or_else(
            || primary_dir.join(&name),
            |short| unique_destination(&primary_dir, short, "pdf"),
        );
        if std::fs::rename(source, &dest).is_err() {
            std::fs::copy(source, &dest)?;
            let _ = std::fs::remove_file(source);
        }
        for other in folder_vins.iter().filter(|v| **v != primary) {
            let other_dir = partition_dir.join(other.as_str());
            if let Err(e) = place_copy(&other_dir, &dest, category) {
                let message = format!("rescue cross-copy to {} failed: {e}", other_dir.display());
                tracing::warn!("{message}");
                warnings.push(message);
            }
        }
    }

    if std::fs::read_dir(folder).is_ok_and(|mut it| it.next().is_none()) {
        let _ = std::fs::remove_dir(folder);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classified_names_are_recognized() {
        assert!(is_already_classified("cc.pdf"));
        assert!(is_already_classified("casco_2.pdf"));
        assert!(is_already_classified("talon_civ.pdf"));
        assert!(!is_already_classified("random notes.pdf"));
    }

    #[test]
    fn unique_destination_avoids_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rca.pdf"), b"x").unwrap();
        let dest = unique_destination(dir.path(), "rca", "pdf");
        assert_eq!(dest, dir.path().join("rca_1.pdf"));
    }
}
