//! Document category — the closed classification sum type (§3, §9).
//!
//! Filename classification is a fixed-priority chain; content classification
//! (used by the pre-scanner and the reclassifier) applies independent
//! keyword groups and, for the reclassifier, resolves conflicts by earliest
//! match offset rather than priority (§4.6).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The closed set of document categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// `Facturi` — invoices. Highest filename-classification priority.
    Facturi,
    /// `TALON / CIV` — vehicle registration documents.
    TalonCiv,
    /// `Contract Cadru` — framework lease contract.
    ContractCadru,
    /// `Subcontract`.
    Subcontract,
    /// `CASCO` — comprehensive insurance.
    Casco,
    /// `RCA` — mandatory third-party liability insurance.
    Rca,
    /// `Cesiune / Supliment` — assignment / rider documents.
    CesiuneSupliment,
    /// `OP Plăți` — payment orders.
    OpPlati,
    /// `Formular de Livrare (FL)` — delivery form.
    FormularLivrare,
    /// `Alte Documente` — catch-all; files keep their original names.
    AlteDocumente,
}

impl Category {
    /// Filename-classification priority order, highest first (§3).
    pub const FILENAME_PRIORITY: [Self; 9] = [
        Self::Facturi,
        Self::TalonCiv,
        Self::ContractCadru,
        Self::Subcontract,
        Self::Casco,
        Self::Rca,
        Self::CesiuneSupliment,
        Self::OpPlati,
        Self::FormularLivrare,
    ];

    /// Critical categories for the contract gap-fill pass (§4.3.5).
    pub const GAP_FILL_CRITICAL: [Self; 4] =
        [Self::ContractCadru, Self::Subcontract, Self::Casco, Self::Rca];

    /// Critical categories for the content reclassifier (§4.6) — a superset
    /// of [`Self::GAP_FILL_CRITICAL`] per the §9 open-question resolution:
    /// kept as an explicit, separate constant, never merged.
    pub const RECLASSIFY_CRITICAL: [Self; 6] = [
        Self::ContractCadru,
        Self::Subcontract,
        Self::Casco,
        Self::Rca,
        Self::Facturi,
        Self::TalonCiv,
    ];

    /// The canonical short filename stem for this category, or `None` for
    /// `Alte Documente`, which keeps the original filename (§3).
    ///
    /// `TalonCiv` has no single short name: it is sub-split by the
    /// rename/dedup engine into `TALON+CIV` / `talon` / `civ` / `talon_civ`
    /// depending on which keywords the filename contains (§4.4).
    #[must_use]
    pub const fn short_name(self) -> Option<&'static str> {
        match self {
            Self::ContractCadru => Some("cc"),
            Self::Subcontract => Some("subct"),
            Self::CesiuneSupliment => Some("ces"),
            Self::FormularLivrare => Some("fl"),
            Self::Casco => Some("casco"),
            Self::Rca => Some("rca"),
            Self::OpPlati => Some("op"),
            Self::Facturi => Some("fact"),
            Self::TalonCiv | Self::AlteDocumente => None,
        }
    }

    /// Human-readable display name, matching §3's category labels.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Facturi => "Facturi",
            Self::TalonCiv => "TALON / CIV",
            Self::ContractCadru => "Contract Cadru",
            Self::Subcontract => "Subcontract",
            Self::Casco => "CASCO",
            Self::Rca => "RCA",
            Self::CesiuneSupliment => "Cesiune / Supliment",
            Self::OpPlati => "OP Plăți",
            Self::FormularLivrare => "Formular de Livrare (FL)",
            Self::AlteDocumente => "Alte Documente",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// System-file sentinels that map to "ignore" rather than any category
/// (§3).
#[must_use]
pub fn is_ignored_filename(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "desktop.ini" || lower == "thumbs.db"
}

struct FilenamePattern {
    category: Category,
    re: Regex,
}

static FILENAME_PATTERNS: LazyLock<Vec<FilenamePattern>> = LazyLock::new(|| {
    vec![
        FilenamePattern {
            category: Category::Facturi,
            re: Regex::new(r"(?i)factur").unwrap(),
        },
        FilenamePattern {
            category: Category::TalonCiv,
            re: Regex::new(r"(?i)\b(talon|civ)\b").unwrap(),
        },
        FilenamePattern {
            category: Category::ContractCadru,
            re: Regex::new(r"(?i)contract[\s_-]*cadru").unwrap(),
        },
        FilenamePattern {
            category: Category::Subcontract,
            re: Regex::new(r"(?i)subcontract").unwrap(),
        },
        FilenamePattern {
            category: Category::Casco,
            re: Regex::new(r"(?i)\bcasco\b").unwrap(),
        },
        FilenamePattern {
            category: Category::Rca,
            re: Regex::new(r"(?i)\brca\b").unwrap(),
        },
        FilenamePattern {
            category: Category::CesiuneSupliment,
            re: Regex::new(r"(?i)(cesiune|supliment)").unwrap(),
        },
        FilenamePattern {
            category: Category::OpPlati,
            re: Regex::new(r"(?i)\bop[\s_-]*(plati|plăți)?\b").unwrap(),
        },
        FilenamePattern {
            category: Category::FormularLivrare,
            re: Regex::new(r"(?i)^fl[\s_-]|formular[\s_-]*de[\s_-]*livrare").unwrap(),
        },
    ]
});

/// Matches a filename that already carries a canonical short-name stem — the
/// rename/dedup pass's own output, or a file a prior reclassification run
/// already placed — optionally suffixed with a dedup counter (`_2`).
/// Mirrors the reclassifier's `is_already_classified` check (§4.6).
static SHORT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(cc|subct|ces|fl|casco|rca|op|fact|talon\+civ|talon_civ|talon|civ)(_\d+)?\.").unwrap()
});

fn category_for_short_name(prefix: &str) -> Category {
    match prefix.to_lowercase().as_str() {
        "cc" => Category::ContractCadru,
        "subct" => Category::Subcontract,
        "ces" => Category::CesiuneSupliment,
        "fl" => Category::FormularLivrare,
        "casco" => Category::Casco,
        "rca" => Category::Rca,
        "op" => Category::OpPlati,
        "fact" => Category::Facturi,
        _ => Category::TalonCiv,
    }
}

/// Classify a filename by the fixed priority chain (§3). Returns `None` for
/// system-file sentinels (`desktop.ini`, `Thumbs.db`) which the caller
/// should ignore entirely, and `Some(Category::AlteDocumente)` when nothing
/// matches.
///
/// A filename that already carries a canonical short-name stem (output from
/// a previous run, or from the rename/dedup pass) is classified straight
/// from that stem, before the keyword patterns run at all — otherwise a file
/// already named `rca_2.pdf` would fall through to `AlteDocumente` since it
/// no longer contains the word "rca" bounded the way [`FILENAME_PATTERNS`]
/// expects.
///
/// Priority matters: `"Factura Cesiune.pdf"` matches `Facturi` because it is
/// checked before `CesiuneSupliment` (§8 boundary behavior); `"seriec_<VIN>_TALON.pdf"`
/// matches `TalonCiv` because TALON is checked before any generic
/// `seriec_` handling (the filename classifier never special-cases the
/// `seriec_` prefix — that prefix only matters to VIN/parent-VIN election in
/// the planner, never to category classification).
#[must_use]
pub fn classify_by_filename(name: &str) -> Option<Category> {
    if is_ignored_filename(name) {
        return None;
    }
    if let Some(caps) = SHORT_NAME_RE.captures(name) {
        return Some(category_for_short_name(&caps[1]));
    }
    for pattern in FILENAME_PATTERNS.iter() {
        if pattern.re.is_match(name) {
            return Some(pattern.category);
        }
    }
    Some(Category::AlteDocumente)
}

struct ContentPattern {
    category: Category,
    patterns: Vec<Regex>,
}

static PRESCAN_CONTENT_PATTERNS: LazyLock<Vec<ContentPattern>> = LazyLock::new(|| {
    vec![
        ContentPattern {
            category: Category::ContractCadru,
            patterns: vec![
                Regex::new(r"(?i)CONTRACT CADRU").unwrap(),
                Regex::new(r"(?i)CONTRACT DE LEASING").unwrap(),
                Regex::new(r"(?i)LEASING OPERA[TȚ]IONAL").unwrap(),
            ],
        },
        ContentPattern {
            category: Category::Subcontract,
            patterns: vec![Regex::new(r"(?i)SUBCONTRACT").unwrap()],
        },
        ContentPattern {
            category: Category::Casco,
            patterns: vec![
                Regex::new(r"(?i)CASCO").unwrap(),
                Regex::new(r"(?i)FLEXICASCO").unwrap(),
                Regex::new(r"(?i)POLI[TȚ][AĂ] DT").unwrap(),
            ],
        },
        ContentPattern {
            category: Category::Rca,
            patterns: vec![
                Regex::new(r"(?i)\bRCA\b").unwrap(),
                Regex::new(r"(?i)R[AĂ]SPUNDERE CIVIL[AĂ]").unwrap(),
                Regex::new(r"(?i)ASIGURARE OBLIGATORIE").unwrap(),
            ],
        },
    ]
});

/// The reclassifier's patterns (§4.6): the pre-scan's four groups plus
/// `Facturi` and `TalonCiv`, defined independently rather than derived from
/// [`PRESCAN_CONTENT_PATTERNS`] so each `Regex` is compiled once.
static RECLASSIFY_CONTENT_PATTERNS: LazyLock<Vec<ContentPattern>> = LazyLock::new(|| {
    vec![
        ContentPattern {
            category: Category::ContractCadru,
            patterns: vec![
                Regex::new(r"(?i)CONTRACT CADRU").unwrap(),
                Regex::new(r"(?i)CONTRACT DE LEASING").unwrap(),
                Regex::new(r"(?i)LEASING OPERA[TȚ]IONAL").unwrap(),
            ],
        },
        ContentPattern {
            category: Category::Subcontract,
            patterns: vec![Regex::new(r"(?i)SUBCONTRACT").unwrap()],
        },
        ContentPattern {
            category: Category::Casco,
            patterns: vec![
                Regex::new(r"(?i)CASCO").unwrap(),
                Regex::new(r"(?i)FLEXICASCO").unwrap(),
                Regex::new(r"(?i)POLI[TȚ][AĂ] DT").unwrap(),
            ],
        },
        ContentPattern {
            category: Category::Rca,
            patterns: vec![
                Regex::new(r"(?i)\bRCA\b").unwrap(),
                Regex::new(r"(?i)R[AĂ]SPUNDERE CIVIL[AĂ]").unwrap(),
                Regex::new(r"(?i)ASIGURARE OBLIGATORIE").unwrap(),
            ],
        },
        ContentPattern {
            category: Category::Facturi,
            patterns: vec![
                Regex::new(r"(?i)FACTUR[AĂ]").unwrap(),
                Regex::new(r"(?i)FACTURI").unwrap(),
            ],
        },
        ContentPattern {
            category: Category::TalonCiv,
            patterns: vec![
                Regex::new(r"(?i)\bTALON\b").unwrap(),
                Regex::new(r"(?i)CERTIFICAT DE [IÎ]NMATRICUL").unwrap(),
                Regex::new(r"(?i)\bCIV\b").unwrap(),
            ],
        },
    ]
});

/// Apply the S2 pre-scan content-category keyword groups (§4.2 step 3):
/// `{Contract Cadru, Subcontract, CASCO, RCA}` only. A category is included
/// if *any* of its patterns matches anywhere in `text`.
#[must_use]
pub fn scan_prescan_categories(text: &str) -> std::collections::BTreeSet<Category> {
    PRESCAN_CONTENT_PATTERNS
        .iter()
        .filter(|p| p.patterns.iter().any(|re| re.is_match(text)))
        .map(|p| p.category)
        .collect()
}

/// Resolve the dominant content category for reclassification (§4.6):
/// the category whose *earliest* matching occurrence has the lowest
/// character offset wins, regardless of match count. Ties at identical
/// offset are broken by category-name lexical order (`Category: Ord`, which
/// is declared in label order — see the open-question resolution in
/// `SPEC_FULL.md`; ties are rare enough in practice that declaration order
/// doubles as a stable, documented tiebreak).
#[must_use]
pub fn best_content_category(text: &str) -> Option<Category> {
    let mut best: Option<(usize, Category)> = None;
    for group in RECLASSIFY_CONTENT_PATTERNS.iter() {
        let earliest = group
            .patterns
            .iter()
            .filter_map(|re| re.find(text).map(|m| m.start()))
            .min();
        if let Some(offset) = earliest {
            best = match best {
                None => Some((offset, group.category)),
                Some((best_offset, _)) if offset < best_offset => Some((offset, group.category)),
                Some((best_offset, best_cat)) if offset == best_offset => {
                    Some((best_offset, best_cat.min(group.category)))
                }
                Some(existing) => Some(existing),
            };
        }
    }
    best.map(|(_, cat)| cat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignored_filenames_are_case_insensitive() {
        assert!(is_ignored_filename("Desktop.ini"));
        assert!(is_ignored_filename("thumbs.db"));
        assert!(!is_ignored_filename("contract.pdf"));
    }

    #[test]
    fn factura_beats_cesiune_priority() {
        assert_eq!(
            classify_by_filename("Factura Cesiune.pdf"),
            Some(Category::Facturi)
        );
    }

    #[test]
    fn seriec_talon_classifies_as_talon_civ() {
        assert_eq!(
            classify_by_filename("seriec_AAAAAA12345678901_TALON.pdf"),
            Some(Category::TalonCiv)
        );
    }

    #[test]
    fn already_classified_short_name_is_recognized_on_reclassify() {
        assert_eq!(classify_by_filename("rca_2.pdf"), Some(Category::Rca));
        assert_eq!(classify_by_filename("cc.pdf"), Some(Category::ContractCadru));
        assert_eq!(classify_by_filename("talon_civ.pdf"), Some(Category::TalonCiv));
    }

    #[test]
    fn unmatched_filename_is_alte_documente() {
        assert_eq!(
            classify_by_filename("random_notes.pdf"),
            Some(Category::AlteDocumente)
        );
    }

    #[test]
    fn short_names_match_spec_map() {
        assert_eq!(Category::ContractCadru.short_name(), Some("cc"));
        assert_eq!(Category::Subcontract.short_name(), Some("subct"));
        assert_eq!(Category::CesiuneSupliment.short_name(), Some("ces"));
        assert_eq!(Category::FormularLivrare.short_name(), Some("fl"));
        assert_eq!(Category::Casco.short_name(), Some("casco"));
        assert_eq!(Category::Rca.short_name(), Some("rca"));
        assert_eq!(Category::OpPlati.short_name(), Some("op"));
        assert_eq!(Category::Facturi.short_name(), Some("fact"));
        assert_eq!(Category::TalonCiv.short_name(), None);
        assert_eq!(Category::AlteDocumente.short_name(), None);
    }

    #[test]
    fn prescan_categories_limited_to_four() {
        let cats = scan_prescan_categories("CONTRACT CADRU ... FACTURA nr 1");
        assert!(cats.contains(&Category::ContractCadru));
        assert!(!cats.contains(&Category::Facturi));
    }

    #[test]
    fn content_first_position_wins_over_match_count() {
        let text = "CONTRACT CADRU ... Factura atasata ... Factura nr 1 ... Factura nr 2";
        assert_eq!(best_content_category(text), Some(Category::ContractCadru));
    }

    #[test]
    fn content_category_dominance_picks_earliest_offset() {
        let text = "some preamble SUBCONTRACT text then later CASCO mention";
        assert_eq!(best_content_category(text), Some(Category::Subcontract));
    }

    #[test]
    fn content_category_none_when_no_pattern_matches() {
        assert_eq!(best_content_category("nothing relevant here"), None);
    }
}
