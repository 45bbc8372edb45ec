//! S3 — Planner (§4.3): walks each partition's immediate child folders,
//! applies one of three folder-shape strategies, and appends planned
//! `copy_file`/`create_folder` entries to the ledger. Two follow-up passes
//! (PDF content cross-copy, contract gap-fill) then widen the plan.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::cache::{fingerprint, OcrCache};
use crate::category::{classify_by_filename, is_ignored_filename, Category};
use crate::config::PlannerConfig;
use crate::ledger::{Action, Ledger, LedgerEntry};
use crate::partition::Partition;
use crate::vin::{extract_vins_from_name, Vin, VinOrSentinel};

static FL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^FL\s*-.*-\s*([A-Z0-9]{17})\.pdf$").unwrap());

static SERIEC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^seriec_([A-Z0-9]{17})_").unwrap());

static PREFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Z0-9]{17})[\s_-]").unwrap());

/// One directory entry read from a source folder, split up front into files
/// and subdirectories so every strategy can reuse the same listing.
struct FolderListing {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

fn list_folder(path: &Path, warnings: &mut Vec<String>) -> FolderListing {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    match std::fs::read_dir(path) {
        Ok(read_dir) => {
            for entry in read_dir.filter_map(Result::ok) {
                let p = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_ignored_filename(&name) {
                    continue;
                }
                if p.is_dir() {
                    dirs.push(p);
                } else {
                    files.push(p);
                }
            }
        }
        Err(e) => {
            let message = format!("cannot read {}: {e}", path.display());
            tracing::warn!("{message}");
            warnings.push(message);
        }
    }
    files.sort();
    dirs.sort();
    FolderListing { files, dirs }
}

fn is_vin_named(path: &Path) -> Option<Vin> {
    let name = path.file_name()?.to_string_lossy();
    (name.len() == crate::vin::VIN_LEN)
        .then(|| Vin::new(&name).ok())
        .flatten()
}

/// Elect the "parent VIN" referenced by a folder's loose filenames (§4.3.2,
/// §4.3.3), trying the FL, `seriec_`, and bare-prefix pools in order and
/// taking the mode of the first non-empty pool. Ties are broken
/// lexicographically for determinism.
fn get_parent_vin(filenames: &[String]) -> Option<Vin> {
    let pools: [Vec<Vin>; 3] = [
        filenames
            .iter()
            .filter_map(|f| FL_PATTERN.captures(f))
            .filter_map(|c| Vin::new(&c[1].to_uppercase()).ok())
            .collect(),
        filenames
            .iter()
            .filter_map(|f| SERIEC_PATTERN.captures(f))
            .filter_map(|c| Vin::new(&c[1].to_uppercase()).ok())
            .collect(),
        filenames
            .iter()
            .filter_map(|f| PREFIX_PATTERN.captures(f))
            .filter_map(|c| Vin::new(&c[1].to_uppercase()).ok())
            .collect(),
    ];
    for pool in pools {
        if !pool.is_empty() {
            return Some(mode(&pool));
        }
    }
    None
}

fn mode(vins: &[Vin]) -> Vin {
    let mut counts: BTreeMap<&Vin, usize> = BTreeMap::new();
    for v in vins {
        *counts.entry(v).or_insert(0) += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    counts
        .into_iter()
        .filter(|(_, c)| *c == max)
        .map(|(v, _)| v.clone())
        .min()
        .expect("non-empty pool")
}

/// The planner's working state across all partitions: where to look up
/// cached PDF content results, tuning, and the VIN-to-output-partition map
/// consulted by the cross-copy and gap-fill passes.
pub struct Planner<'a> {
    output_root: &'a Path,
    ocr_cache: &'a OcrCache,
    planner_cfg: &'a PlannerConfig,
    vin_partition: BTreeMap<Vin, PathBuf>,
    warnings: Vec<String>,
}

impl<'a> Planner<'a> {
    /// Construct a planner over the given output root and PDF scan cache.
    #[must_use]
    pub fn new(output_root: &'a Path, ocr_cache: &'a OcrCache, planner_cfg: &'a PlannerConfig) -> Self {
        Self {
            output_root,
            ocr_cache,
            planner_cfg,
            vin_partition: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Warnings accumulated across every planning call so far.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn partition_output_dir(&self, partition: &Partition) -> PathBuf {
        self.output_root.join(&partition.canonical_name)
    }

    fn record_vin_partition(&mut self, vin: &Vin, partition_dir: &Path) {
        self.vin_partition
            .entry(vin.clone())
            .or_insert_with(|| partition_dir.to_owned());
    }

    fn content_vins(&self, path: &Path) -> Vec<Vin> {
        let Ok((size, mtime_ns)) = fingerprint(path) else {
            return Vec::new();
        };
        self.ocr_cache
            .get_fresh(path, size, mtime_ns)
            .map(|e| e.vins.clone())
            .unwrap_or_default()
    }

    fn content_cats(&self, path: &Path) -> BTreeSet<Category> {
        let Ok((size, mtime_ns)) = fingerprint(path) else {
            return BTreeSet::new();
        };
        self.ocr_cache
            .get_fresh(path, size, mtime_ns)
            .map(|e| e.cats.clone())
            .unwrap_or_default()
    }

    /// Recursively plan copies of every file under `src_dir` into
    /// `dest_dir`, preserving relative paths.
    fn plan_subtree(
        &self,
        ledger: &mut Ledger,
        src_dir: &Path,
        dest_dir: &Path,
        parent_folder: &Path,
        vin: &VinOrSentinel,
        reason: &str,
    ) {
        for entry in walkdir::WalkDir::new(src_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_ignored_filename(&name) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(src_dir) else {
                continue;
            };
            let category = classify_by_filename(&name);
            ledger.push(LedgerEntry::copy(
                entry.path().to_owned(),
                dest_dir.join(rel),
                reason.to_owned(),
                parent_folder.to_owned(),
                vin.clone(),
                category,
            ));
        }
    }

    /// Plan all copies for one partition's immediate child folders (§4.3.1–3).
    pub fn plan_partition(&mut self, partition: &Partition, ledger: &mut Ledger) {
        let out_partition = self.partition_output_dir(partition);
        let top = list_folder(&partition.path, &mut self.warnings);
        for folder in &top.dirs {
            self.plan_folder(folder, &out_partition, ledger);
        }
        for file in &top.files {
            // A loose file directly under a partition has no folder context
            // to derive a VIN from beyond its own name; treat its containing
            // partition as the folder for `_NO_VIN` bookkeeping.
            self.plan_loose_partition_file(file, &out_partition, &partition.path, ledger);
        }
    }

    fn plan_loose_partition_file(
        &mut self,
        file: &Path,
        out_partition: &Path,
        parent_folder: &Path,
        ledger: &mut Ledger,
    ) {
        let name = file.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        let vins = extract_vins_from_name(&name);
        let vin = vins.into_iter().min();
        let category = classify_by_filename(&name);
        let (dest, vin_tag) = vin.map_or_else(
            || {
                (
                    out_partition.join("_NO_VIN").join(&name),
                    VinOrSentinel::NoVin,
                )
            },
            |v| {
                let dest = out_partition.join(v.as_str()).join(&name);
                self.record_vin_partition(&v, out_partition);
                (dest, VinOrSentinel::Vin(v))
            },
        );
        ledger.push(LedgerEntry::copy(
            file.to_owned(),
            dest,
            "loose partition-level file",
            parent_folder.to_owned(),
            vin_tag,
            category,
        ));
    }

    fn plan_folder(&mut self, folder: &Path, out_partition: &Path, ledger: &mut Ledger) {
        let folder_name = folder.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        if let Ok(v) = Vin::new(&folder_name.to_uppercase()) {
            self.plan_strategy_a(folder, &v, out_partition, ledger);
            return;
        }

        let listing = list_folder(folder, &mut self.warnings);
        let vin_subdirs: Vec<(PathBuf, Vin)> = listing
            .dirs
            .iter()
            .filter_map(|d| is_vin_named(d).map(|v| (d.clone(), v)))
            .collect();

        if vin_subdirs.is_empty() {
            self.plan_strategy_c(folder, &listing, out_partition, ledger);
        } else {
            self.plan_strategy_b(folder, &listing, &vin_subdirs, out_partition, ledger);
        }
    }

    /// §4.3.1 Strategy A — the folder name itself is a VIN.
    fn plan_strategy_a(&mut self, folder: &Path, vin: &Vin, out_partition: &Path, ledger: &mut Ledger) {
        self.record_vin_partition(vin, out_partition);
        let vin_tag = VinOrSentinel::Vin(vin.clone());
        let listing = list_folder(folder, &mut self.warnings);
        let keeper_dir = out_partition.join(vin.as_str());

        for file in &listing.files {
            let name = file.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            let category = classify_by_filename(&name);
            ledger.push(LedgerEntry::copy(
                file.clone(),
                keeper_dir.join(&name),
                "direct file under VIN-named folder",
                folder.to_owned(),
                vin_tag.clone(),
                category,
            ));
        }
        for dir in &listing.dirs {
            let dir_name = dir.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            if let Some(inner_vin) = is_vin_named(dir) {
                self.record_vin_partition(&inner_vin, out_partition);
                let dest = out_partition.join(inner_vin.as_str());
                self.plan_subtree(
                    ledger,
                    dir,
                    &dest,
                    folder,
                    &VinOrSentinel::Vin(inner_vin),
                    "VIN subdirectory elevated to partition level",
                );
            } else {
                let dest = keeper_dir.join(&dir_name);
                self.plan_subtree(ledger, dir, &dest, folder, &vin_tag, "subtree preserved under keeper");
            }
        }
    }

    /// §4.3.2 Strategy B — multi-VIN container.
    fn plan_strategy_b(
        &mut self,
        folder: &Path,
        listing: &FolderListing,
        vin_subdirs: &[(PathBuf, Vin)],
        out_partition: &Path,
        ledger: &mut Ledger,
    ) {
        let loose_names: Vec<String> = listing
            .files
            .iter()
            .map(|f| f.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned()))
            .collect();
        let parent_vin = get_parent_vin(&loose_names).unwrap_or_else(|| {
            vin_subdirs.iter().map(|(_, v)| v).min().cloned().expect("non-empty vin_subdirs")
        });
        self.record_vin_partition(&parent_vin, out_partition);
        let parent_tag = VinOrSentinel::Vin(parent_vin.clone());
        let parent_dir = out_partition.join(parent_vin.as_str());

        for (dir, vin) in vin_subdirs {
            self.record_vin_partition(vin, out_partition);
            let dest = out_partition.join(vin.as_str());
            self.plan_subtree(
                ledger,
                dir,
                &dest,
                folder,
                &VinOrSentinel::Vin(vin.clone()),
                "VIN subdirectory elevated to partition level",
            );
        }

        for (file, name) in listing.files.iter().zip(loose_names.iter()) {
            let category = classify_by_filename(name);
            ledger.push(LedgerEntry::copy(
                file.clone(),
                parent_dir.join(name),
                "loose file in multi-VIN container",
                folder.to_owned(),
                parent_tag.clone(),
                category,
            ));
        }

        let vin_dir_set: BTreeSet<&Path> = vin_subdirs.iter().map(|(d, _)| d.as_path()).collect();
        for dir in &listing.dirs {
            if vin_dir_set.contains(dir.as_path()) {
                continue;
            }
            let dir_name = dir.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            let dest = parent_dir.join(&dir_name);
            self.plan_subtree(
                ledger,
                dir,
                &dest,
                folder,
                &parent_tag,
                "non-VIN subdirectory under elected parent",
            );
        }
    }

    /// §4.3.3 Strategy C — flat descriptive folder, no VIN-named subdirs.
    fn plan_strategy_c(&mut self, folder: &Path, listing: &FolderListing, out_partition: &Path, ledger: &mut Ledger) {
        let mut filename_vins: BTreeMap<PathBuf, Vec<Vin>> = BTreeMap::new();
        let mut all_election: BTreeSet<Vin> = BTreeSet::new();
        let mut filename_counts: BTreeMap<Vin, usize> = BTreeMap::new();
        let mut names = Vec::new();

        for file in &listing.files {
            let name = file.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            let vins = extract_vins_from_name(&name);
            for v in &vins {
                *filename_counts.entry(v.clone()).or_insert(0) += 1;
                all_election.insert(v.clone());
            }
            if name.to_lowercase().ends_with(".pdf") {
                for v in self.content_vins(file) {
                    all_election.insert(v);
                }
            }
            names.push(name);
            filename_vins.insert(file.clone(), vins);
        }

        let keeper = self
            .elect_keeper(folder, &names, &filename_vins, &all_election, &filename_counts);

        let Some(keeper) = keeper else {
            if listing.files.is_empty() && listing.dirs.is_empty() {
                let message = format!("empty folder with no VIN: {}", folder.display());
                tracing::warn!("{message}");
                self.warnings.push(message);
            } else {
                let folder_name = folder.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
                let dest = out_partition.join("_NO_VIN").join(&folder_name);
                let message = format!("no VIN discoverable for {}", folder.display());
                tracing::warn!("{message}");
                self.warnings.push(message);
                self.plan_subtree(ledger, folder, &dest, folder, &VinOrSentinel::NoVin, "no VIN discoverable");
            }
            return;
        };

        self.record_vin_partition(&keeper, out_partition);
        let keeper_tag = VinOrSentinel::Vin(keeper.clone());
        let keeper_dir = out_partition.join(keeper.as_str());

        for (file, name) in listing.files.iter().zip(names.iter()) {
            let f_vins = filename_vins.get(file).cloned().unwrap_or_default();
            let others: Vec<&Vin> = f_vins.iter().filter(|v| **v != keeper).collect();
            let category = classify_by_filename(name);

            if others.is_empty() {
                ledger.push(LedgerEntry::copy(
                    file.clone(),
                    keeper_dir.join(name),
                    "flat descriptive folder, keeper placement",
                    folder.to_owned(),
                    keeper_tag.clone(),
                    category,
                ));
                continue;
            }

            if !f_vins.contains(&keeper) {
                let primary = f_vins.iter().min().expect("non-empty");
                self.record_vin_partition(primary, out_partition);
                let primary_dir = out_partition.join(primary.as_str());
                ledger.push(LedgerEntry::copy(
                    file.clone(),
                    primary_dir.join(name),
                    "filename-VIN cross-copy, primary recipient",
                    folder.to_owned(),
                    VinOrSentinel::Vin((*primary).clone()),
                    category,
                ));
                for v in f_vins.iter().filter(|v| *v != primary) {
                    self.record_vin_partition(v, out_partition);
                    let dir = out_partition.join(v.as_str());
                    ledger.push(LedgerEntry::copy(
                        file.clone(),
                        dir.join(name),
                        "filename-VIN cross-copy",
                        folder.to_owned(),
                        VinOrSentinel::Vin(v.clone()),
                        category,
                    ));
                }
            } else {
                ledger.push(LedgerEntry::copy(
                    file.clone(),
                    keeper_dir.join(name),
                    "flat descriptive folder, keeper placement",
                    folder.to_owned(),
                    keeper_tag.clone(),
                    category,
                ));
                for v in &others {
                    self.record_vin_partition(v, out_partition);
                    let dir = out_partition.join(v.as_str());
                    ledger.push(LedgerEntry::copy(
                        file.clone(),
                        dir.join(name),
                        "filename-VIN cross-copy",
                        folder.to_owned(),
                        VinOrSentinel::Vin((*v).clone()),
                        category,
                    ));
                }
            }
        }

        for dir in &listing.dirs {
            let dir_name = dir.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            if let Some(inner_vin) = is_vin_named(dir) {
                self.record_vin_partition(&inner_vin, out_partition);
                let dest = out_partition.join(inner_vin.as_str());
                self.plan_subtree(
                    ledger,
                    dir,
                    &dest,
                    folder,
                    &VinOrSentinel::Vin(inner_vin),
                    "VIN subdirectory elevated to partition level",
                );
            } else {
                let dest = keeper_dir.join(&dir_name);
                self.plan_subtree(ledger, dir, &dest, folder, &keeper_tag, "subtree preserved under keeper");
            }
        }
    }

    fn elect_keeper(
        &self,
        folder: &Path,
        names: &[String],
        filename_vins: &BTreeMap<PathBuf, Vec<Vin>>,
        all_election: &BTreeSet<Vin>,
        filename_counts: &BTreeMap<Vin, usize>,
    ) -> Option<Vin> {
        if let Some(parent) = get_parent_vin(names) {
            let in_sets = filename_vins.values().any(|v| v.contains(&parent)) || all_election.contains(&parent);
            if in_sets {
                return Some(parent);
            }
        }
        if let Some(max) = filename_counts.values().copied().max() {
            if let Some(v) = filename_counts
                .iter()
                .filter(|(_, c)| **c == max)
                .map(|(v, _)| v.clone())
                .min()
            {
                return Some(v);
            }
        }
        if let Some(v) = all_election.iter().next() {
            return Some(v.clone());
        }
        let folder_name = folder.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        extract_vins_from_name(&folder_name).into_iter().min()
    }

    /// §4.3.4 PDF Content Cross-Copy Pass. Run once after every partition
    /// has been planned with [`Self::plan_partition`].
    pub fn cross_copy_pass(&mut self, ledger: &mut Ledger) {
        let candidates: Vec<LedgerEntry> = ledger
            .entries()
            .iter()
            .filter(|e| e.action == Action::CopyFile && is_pdf(&e.source))
            .cloned()
            .collect();

        for entry in candidates {
            let content_vins = self.content_vins(&entry.source);
            if content_vins.len() > self.planner_cfg.max_cross_copy_vins {
                let message = format!(
                    "{} references {} VINs, over the cross-copy cap; skipped",
                    entry.source.display(),
                    content_vins.len()
                );
                tracing::warn!("{message}");
                self.warnings.push(message);
                continue;
            }
            let name = entry.source.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            for v in content_vins {
                let Some(partition_dir) = self.vin_partition.get(&v).cloned() else {
                    continue;
                };
                let dest = partition_dir.join(v.as_str()).join(&name);
                if ledger.planned_source_for(&dest) == Some(&entry.source) {
                    continue;
                }
                ledger.push(LedgerEntry::copy(
                    entry.source.clone(),
                    dest,
                    "PDF content VIN cross-copy",
                    entry.parent_folder.clone(),
                    VinOrSentinel::Vin(v),
                    entry.category,
                ));
            }
        }
    }

    /// §4.3.5 Contract Gap-Fill Pass. Run once after [`Self::cross_copy_pass`].
    pub fn gap_fill_pass(&mut self, ledger: &mut Ledger) {
        let entries: Vec<LedgerEntry> = ledger.entries().to_vec();
        let mut by_vin: BTreeMap<Vin, Vec<&LedgerEntry>> = BTreeMap::new();
        for e in &entries {
            if let VinOrSentinel::Vin(v) = &e.vin {
                by_vin.entry(v.clone()).or_default().push(e);
            }
        }

        let mut additions = Vec::new();
        for (vin, vin_entries) in &by_vin {
            let mut present: BTreeSet<Category> = BTreeSet::new();
            for e in vin_entries {
                if let Some(c) = e.category {
                    present.insert(c);
                }
                if is_pdf(&e.source) {
                    present.extend(self.content_cats(&e.source));
                }
            }
            let mut missing: BTreeSet<Category> = Category::GAP_FILL_CRITICAL
                .into_iter()
                .filter(|c| !present.contains(c))
                .collect();
            if missing.is_empty() {
                continue;
            }

            for e in &entries {
                if missing.is_empty() {
                    break;
                }
                if !is_pdf(&e.source) {
                    continue;
                }
                let content_cats = self.content_cats(&e.source);
                let candidate_cats: BTreeSet<Category> = e
                    .category
                    .into_iter()
                    .chain(content_cats.iter().copied())
                    .filter(|c| missing.contains(c))
                    .collect();
                if candidate_cats.is_empty() {
                    continue;
                }
                if !self.content_vins(&e.source).contains(vin) {
                    continue;
                }
                let Some(partition_dir) = self.vin_partition.get(vin).cloned() else {
                    continue;
                };
                let name = e.source.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
                let dest = partition_dir.join(vin.as_str()).join(&name);
                if ledger.planned_source_for(&dest) == Some(&e.source) {
                    continue;
                }
                for cat in &candidate_cats {
                    additions.push(LedgerEntry::copy(
                        e.source.clone(),
                        dest.clone(),
                        format!("Gap-fill: {cat}"),
                        e.parent_folder.clone(),
                        VinOrSentinel::Vin(vin.clone()),
                        Some(*cat),
                    ));
                    missing.remove(cat);
                }
            }
        }

        for entry in additions {
            ledger.push(entry);
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn strategy_a_places_direct_files_under_vin_folder() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("SINDICALIZARE A");
        let vin_folder = src_root.join("AAAAAA12345678901");
        std::fs::create_dir_all(&vin_folder).unwrap();
        touch(&vin_folder.join("contract cadru.pdf"));

        let partition = Partition {
            path: src_root.clone(),
            raw_name: "SINDICALIZARE A".to_owned(),
            canonical_name: "SINDICALIZARE A".to_owned(),
        };
        let output_root = dir.path().join("out");
        let cache = OcrCache::default();
        let cfg = PlannerConfig::default();
        let mut planner = Planner::new(&output_root, &cache, &cfg);
        let mut ledger = Ledger::new();
        planner.plan_partition(&partition, &mut ledger);

        assert_eq!(ledger.len(), 1);
        let entry = &ledger.entries()[0];
        assert_eq!(entry.category, Some(Category::ContractCadru));
        assert_eq!(
            entry.destination,
            output_root.join("SINDICALIZARE A").join("AAAAAA12345678901").join("contract cadru.pdf")
        );
    }

    #[test]
    fn strategy_a_elevates_nested_vin_subdir() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("SINDICALIZARE A");
        let outer = src_root.join("AAAAAA12345678901");
        let inner = outer.join("BBBBBB98765432109");
        std::fs::create_dir_all(&inner).unwrap();
        touch(&inner.join("casco.pdf"));

        let partition = Partition {
            path: src_root.clone(),
            raw_name: "SINDICALIZARE A".to_owned(),
            canonical_name: "SINDICALIZARE A".to_owned(),
        };
        let output_root = dir.path().join("out");
        let cache = OcrCache::default();
        let cfg = PlannerConfig::default();
        let mut planner = Planner::new(&output_root, &cache, &cfg);
        let mut ledger = Ledger::new();
        planner.plan_partition(&partition, &mut ledger);

        assert_eq!(ledger.len(), 1);
        assert_eq!(
            ledger.entries()[0].destination,
            output_root.join("SINDICALIZARE A").join("BBBBBB98765432109").join("casco.pdf")
        );
    }

    #[test]
    fn strategy_c_no_vin_anywhere_uses_no_vin_sentinel() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("SINDICALIZARE A");
        let folder = src_root.join("Misc Documents");
        std::fs::create_dir_all(&folder).unwrap();
        touch(&folder.join("random.pdf"));

        let partition = Partition {
            path: src_root.clone(),
            raw_name: "SINDICALIZARE A".to_owned(),
            canonical_name: "SINDICALIZARE A".to_owned(),
        };
        let output_root = dir.path().join("out");
        let cache = OcrCache::default();
        let cfg = PlannerConfig::default();
        let mut planner = Planner::new(&output_root, &cache, &cfg);
        let mut ledger = Ledger::new();
        planner.plan_partition(&partition, &mut ledger);

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries()[0].vin, VinOrSentinel::NoVin);
        assert!(ledger.entries()[0].destination.starts_with(output_root.join("SINDICALIZARE A").join("_NO_VIN")));
    }

    #[test]
    fn strategy_c_elects_keeper_by_filename_frequency() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("SINDICALIZARE A");
        let folder = src_root.join("Descriptive Folder");
        std::fs::create_dir_all(&folder).unwrap();
        touch(&folder.join("AAAAAA12345678901_doc1.pdf"));
        touch(&folder.join("AAAAAA12345678901_doc2.pdf"));
        touch(&folder.join("BBBBBB98765432109_doc.pdf"));

        let partition = Partition {
            path: src_root.clone(),
            raw_name: "SINDICALIZARE A".to_owned(),
            canonical_name: "SINDICALIZARE A".to_owned(),
        };
        let output_root = dir.path().join("out");
        let cache = OcrCache::default();
        let cfg = PlannerConfig::default();
        let mut planner = Planner::new(&output_root, &cache, &cfg);
        let mut ledger = Ledger::new();
        planner.plan_partition(&partition, &mut ledger);

        let keeper_copies = ledger
            .entries()
            .iter()
            .filter(|e| e.destination.starts_with(output_root.join("SINDICALIZARE A").join("AAAAAA12345678901")))
            .count();
        assert_eq!(keeper_copies, 2);
    }

    #[test]
    fn get_parent_vin_prefers_fl_pool_then_mode() {
        let names = vec![
            "FL - delivery - AAAAAA12345678901.pdf".to_owned(),
            "FL - delivery - AAAAAA12345678901.pdf".to_owned(),
        ];
        assert_eq!(get_parent_vin(&names), Vin::new("AAAAAA12345678901").ok());
    }
}
