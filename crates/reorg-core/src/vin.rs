//! VIN value type and extraction from free text.
//!
//! Replaces the duck-typed "VIN string" of the original tool with a value
//! type that validates on construction (§9 re-architecture note). `_NO_VIN`
//! is represented separately as [`VinOrSentinel::NoVin`], not as a string
//! that happens to fail the VIN shape check.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A validated 17-character VIN: uppercase alphanumeric, at least one letter
/// and one digit.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Vin(String);

/// Length of every valid VIN.
pub const VIN_LEN: usize = 17;

impl Vin {
    /// Construct a `Vin`, validating shape.
    ///
    /// # Errors
    /// Returns [`VinError`] if `s` is not exactly 17 uppercase alphanumeric
    /// characters containing at least one letter and one digit.
    pub fn new(s: &str) -> Result<Self, VinError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// The VIN text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), VinError> {
        if s.len() != VIN_LEN {
            return Err(VinError {
                value: s.to_owned(),
                reason: format!("expected {VIN_LEN} characters, got {}", s.len()),
            });
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(VinError {
                value: s.to_owned(),
                reason: "must contain only ASCII letters and digits".to_owned(),
            });
        }
        if s.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(VinError {
                value: s.to_owned(),
                reason: "must be uppercase".to_owned(),
            });
        }
        if !s.chars().any(|c| c.is_ascii_alphabetic()) {
            return Err(VinError {
                value: s.to_owned(),
                reason: "must contain at least one letter".to_owned(),
            });
        }
        if !s.chars().any(|c| c.is_ascii_digit()) {
            return Err(VinError {
                value: s.to_owned(),
                reason: "must contain at least one digit".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Vin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Vin {
    type Err = VinError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Vin {
    type Error = VinError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<Vin> for String {
    fn from(vin: Vin) -> Self {
        vin.0
    }
}

/// A VIN failed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VinError {
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for VinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid VIN {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for VinError {}

/// The sentinel output destination for folders where no VIN could be
/// inferred anywhere (filename, content, or folder name).
pub const NO_VIN_SENTINEL: &str = "_NO_VIN";

/// Either a real VIN or the `_NO_VIN` sentinel — the keeper of a folder that
/// truly has no discoverable VIN (§4.3.3 step 5, §9 re-architecture note).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VinOrSentinel {
    /// A real, validated VIN.
    Vin(Vin),
    /// The `_NO_VIN` rescue sentinel.
    NoVin,
}

impl fmt::Display for VinOrSentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vin(v) => fmt::Display::fmt(v, f),
            Self::NoVin => f.write_str(NO_VIN_SENTINEL),
        }
    }
}

impl TryFrom<String> for VinOrSentinel {
    type Error = VinError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == NO_VIN_SENTINEL {
            Ok(Self::NoVin)
        } else {
            Vin::try_from(s).map(Self::Vin)
        }
    }
}

impl From<VinOrSentinel> for String {
    fn from(v: VinOrSentinel) -> Self {
        v.to_string()
    }
}

static ALNUM_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z0-9]+").expect("static alnum-run regex is valid"));

/// Extract all 17-character alphanumeric runs from `text` that pass VIN
/// validity (≥1 letter, ≥1 digit), uppercased and deduplicated.
///
/// `regex` has no lookaround, so this can't be one pattern the way the
/// original's `(?<![A-Z0-9])([A-Z0-9]{17})(?![A-Z0-9])` is, and `\b` is the
/// wrong substitute: `_` counts as a word character, so a `\b`-bounded
/// pattern refuses to separate a VIN from the dominant `seriec_<VIN>_...`
/// filename shape. Instead this scans for maximal alphanumeric runs and
/// keeps only the ones that are exactly 17 characters long — a run any
/// longer never has a 17-char window whose neighbors (still inside the same
/// run, hence still alphanumeric) fall outside it, so "exactly 17" is the
/// only case a lookaround-free scan needs to check.
#[must_use]
pub fn extract_vins(text: &str) -> Vec<Vin> {
    let upper = text.to_uppercase();
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    for m in ALNUM_RUN_RE.find_iter(&upper) {
        if m.as_str().chars().count() != VIN_LEN {
            continue;
        }
        if let Ok(vin) = Vin::new(m.as_str())
            && seen.insert(vin.clone())
        {
            out.push(vin);
        }
    }
    out
}

/// Extract VINs from a filename or folder name (same regex, same validity
/// rule as [`extract_vins`] — filenames are just shorter free text).
#[must_use]
pub fn extract_vins_from_name(name: &str) -> Vec<Vin> {
    extract_vins(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vin(s: &str) -> Vin {
        Vin::new(s).unwrap()
    }

    #[test]
    fn valid_vin_accepted() {
        assert!(Vin::new("AAAAAA12345678901").is_ok());
    }

    #[test]
    fn too_short_rejected() {
        let err = Vin::new("AAAA123").unwrap_err();
        assert!(err.reason.contains("17 characters"));
    }

    #[test]
    fn all_letters_rejected() {
        let err = Vin::new("AAAAAAAAAAAAAAAAA").unwrap_err();
        assert!(err.reason.contains("digit"));
    }

    #[test]
    fn all_digits_rejected() {
        let err = Vin::new("12345678901234567").unwrap_err();
        assert!(err.reason.contains("letter"));
    }

    #[test]
    fn lowercase_rejected() {
        let err = Vin::new("aaaaaa12345678901").unwrap_err();
        assert!(err.reason.contains("uppercase"));
    }

    #[test]
    fn non_alphanumeric_rejected() {
        let err = Vin::new("AAAAAA-2345678901").unwrap_err();
        assert!(err.reason.contains("letters and digits"));
    }

    #[test]
    fn extract_finds_vin_bounded_by_underscores() {
        let vins = extract_vins("see seriec_AAAAAA12345678901_doc.pdf for details");
        assert_eq!(vins, vec![vin("AAAAAA12345678901")]);
    }

    #[test]
    fn extract_is_case_insensitive_and_uppercases() {
        let vins = extract_vins("file aaaaaa12345678901.pdf");
        assert_eq!(vins, vec![vin("AAAAAA12345678901")]);
    }

    #[test]
    fn extract_does_not_match_inside_longer_run() {
        // 18 alphanumerics: no 17-char VIN should be pulled out of the middle.
        let vins = extract_vins("XAAAAAA123456789012X");
        assert!(vins.is_empty());
    }

    #[test]
    fn extract_dedupes_and_preserves_first_seen_order() {
        let text = "BBBBBB98765432109 then AAAAAA12345678901 then BBBBBB98765432109";
        let vins = extract_vins(text);
        assert_eq!(
            vins,
            vec![vin("BBBBBB98765432109"), vin("AAAAAA12345678901")]
        );
    }

    #[test]
    fn extract_from_name_matches_extract_vins() {
        assert_eq!(
            extract_vins_from_name("AAAAAA12345678901"),
            vec![vin("AAAAAA12345678901")]
        );
    }

    #[test]
    fn sentinel_display() {
        assert_eq!(VinOrSentinel::NoVin.to_string(), "_NO_VIN");
        assert_eq!(
            VinOrSentinel::Vin(vin("AAAAAA12345678901")).to_string(),
            "AAAAAA12345678901"
        );
    }
}
