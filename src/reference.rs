//! Canonical reference tables: the region whitelist and the region/district
//! correction maps.
//!
//! Tables are plain TOML so they can be revised without touching the
//! pipeline. A default set for the public extracts is compiled in from
//! `reference/india.toml`.
use crate::error::{PulseError, Result};
use crate::util::title_case;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

const EMBEDDED_TABLES: &str = include_str!("../reference/india.toml");

static TRAILING_STARS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\*+\s*$").unwrap());
static PARENTHETICAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());
static MULTI_WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

static SHARED: OnceCell<ReferenceTables> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTables {
    #[serde(default)]
    pub version: String,
    pub valid_regions: BTreeSet<String>,
    #[serde(default)]
    pub region_corrections: BTreeMap<String, String>,
    #[serde(default)]
    pub district_corrections: BTreeMap<String, String>,
}

/// Outcome of canonicalizing one region cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionVerdict {
    Valid(String),
    /// Purely numeric junk, e.g. a shifted column.
    Numeric,
    /// Not on the whitelist after correction; carries the cleaned name.
    Unrecognized(String),
}

impl ReferenceTables {
    /// The tables shipped with the crate.
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(EMBEDDED_TABLES)
    }

    /// The embedded tables, parsed and validated once per process.
    pub fn shared() -> Result<&'static ReferenceTables> {
        SHARED.get_or_try_init(Self::embedded)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PulseError::Config(format!(
                "Failed to read reference tables '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let tables: ReferenceTables = toml::from_str(content)?;
        tables.validate()?;
        Ok(tables)
    }

    /// Rejects tables whose corrections do not settle or whose keys are not
    /// in the cleaned form lookups use.
    ///
    /// Region corrections are applied once, so a target must be whitelisted
    /// and must not itself be a correction key. District corrections get two
    /// passes; every key must land on a name that one more cleanup and
    /// correction round leaves unchanged, otherwise variants of the same
    /// district would not converge.
    pub fn validate(&self) -> Result<()> {
        // Lookups only ever see cleaned names, so any other key is dead.
        for key in self.region_corrections.keys() {
            let looked_up = title_case(key.trim());
            if *key != looked_up {
                return Err(PulseError::Config(format!(
                    "region correction key '{}' can never match; write it as '{}'",
                    key, looked_up
                )));
            }
        }
        for key in self.district_corrections.keys() {
            let looked_up = clean_district(key);
            if *key != looked_up {
                return Err(PulseError::Config(format!(
                    "district correction key '{}' can never match; write it as '{}'",
                    key, looked_up
                )));
            }
        }
        for (key, target) in &self.region_corrections {
            if self.region_corrections.contains_key(target) {
                return Err(PulseError::CorrectionCycle {
                    table: "region".to_string(),
                    key: key.clone(),
                    trail: vec![key.clone(), target.clone(), self.region_corrections[target].clone()],
                });
            }
            if !self.valid_regions.contains(target) {
                return Err(PulseError::Config(format!(
                    "region correction '{}' -> '{}' targets a name outside the whitelist",
                    key, target
                )));
            }
        }
        for key in self.district_corrections.keys() {
            let settled = self.canonical_district(key);
            let next = self.correct_district(clean_district(&settled));
            if next != settled {
                return Err(PulseError::CorrectionCycle {
                    table: "district".to_string(),
                    key: key.clone(),
                    trail: vec![key.clone(), settled, next],
                });
            }
        }
        Ok(())
    }

    pub fn is_valid_region(&self, name: &str) -> bool {
        self.valid_regions.contains(name)
    }

    /// Trim, title-case, drop numeric junk, correct, then whitelist.
    pub fn canonical_region(&self, raw: &str) -> RegionVerdict {
        let name = title_case(raw.trim());
        if NUMERIC_RE.is_match(&name) {
            return RegionVerdict::Numeric;
        }
        let name = self
            .region_corrections
            .get(&name)
            .cloned()
            .unwrap_or(name);
        if self.valid_regions.contains(&name) {
            RegionVerdict::Valid(name)
        } else {
            RegionVerdict::Unrecognized(name)
        }
    }

    /// Two rounds of cleanup and correction. The second round catches
    /// corrections that reintroduce decoration and corrections whose output
    /// is itself a key.
    pub fn canonical_district(&self, raw: &str) -> String {
        let first = self.correct_district(clean_district(raw));
        self.correct_district(clean_district(&first))
    }

    fn correct_district(&self, name: String) -> String {
        match self.district_corrections.get(&name) {
            Some(fixed) => fixed.clone(),
            None => name,
        }
    }
}

/// Trim, title-case, strip trailing `*` markers and `(...)` notes, collapse
/// whitespace.
pub fn clean_district(raw: &str) -> String {
    let name = title_case(raw.trim());
    let name = TRAILING_STARS_RE.replace(&name, "");
    let name = PARENTHETICAL_RE.replace_all(&name, "");
    let name = MULTI_WS_RE.replace_all(&name, " ");
    name.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tables() -> ReferenceTables {
        ReferenceTables::embedded().expect("embedded tables are valid")
    }

    #[test]
    fn embedded_tables_load() {
        let t = tables();
        assert_eq!(t.valid_regions.len(), 36);
        assert!(t.is_valid_region("West Bengal"));
        assert!(!t.district_corrections.is_empty());

        let shared = ReferenceTables::shared().unwrap();
        assert_eq!(shared, &t);
        assert!(std::ptr::eq(shared, ReferenceTables::shared().unwrap()));
    }

    #[test]
    fn region_typos_are_corrected() {
        let t = tables();
        for raw in ["Westbengal", "west bangal", "  WEST BENGLI ", "West  Bengal"] {
            assert_eq!(
                t.canonical_region(raw),
                RegionVerdict::Valid("West Bengal".to_string()),
                "{raw}"
            );
        }
        assert_eq!(
            t.canonical_region("jammu and kashmir"),
            RegionVerdict::Valid("Jammu & Kashmir".to_string())
        );
    }

    #[test]
    fn keys_outside_the_lookup_form_are_rejected() {
        let region = r#"
            valid_regions = ["West Bengal"]
            [region_corrections]
            "WESTBENGAL" = "West Bengal"
        "#;
        match ReferenceTables::from_toml_str(region) {
            Err(PulseError::Config(msg)) => assert!(msg.contains("'Westbengal'"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }

        let district = r#"
            valid_regions = ["West Bengal"]
            [district_corrections]
            "Haora (Wb)" = "Howrah"
        "#;
        match ReferenceTables::from_toml_str(district) {
            Err(PulseError::Config(msg)) => assert!(msg.contains("'Haora'"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }

        let padded = r#"
            valid_regions = ["Odisha"]
            [region_corrections]
            " Orissa" = "Odisha"
        "#;
        assert!(ReferenceTables::from_toml_str(padded).is_err());
    }

    #[test]
    fn numeric_regions_are_junk() {
        let t = tables();
        assert_eq!(t.canonical_region("100000"), RegionVerdict::Numeric);
        assert_eq!(t.canonical_region(" 7 "), RegionVerdict::Numeric);
    }

    #[test]
    fn cities_are_not_regions() {
        let t = tables();
        assert_eq!(
            t.canonical_region("jaipur"),
            RegionVerdict::Unrecognized("Jaipur".to_string())
        );
    }

    #[test]
    fn district_decorations_are_stripped() {
        let t = tables();
        assert_eq!(t.canonical_district("  bokaro * "), "Bokaro");
        assert_eq!(t.canonical_district("Aurangabad(Bh)"), "Chhatrapati Sambhaji Nagar");
        assert_eq!(t.canonical_district("east   singhbum (urban)"), "East Singhbum");
        assert_eq!(t.canonical_district("MIDNAPORE"), "Paschim Medinipur");
    }

    #[test]
    fn decoration_exposed_by_paren_strip_is_removed_on_second_pass() {
        let t = tables();
        assert_eq!(t.canonical_district("Dhanbad * (R)"), "Dhanbad");
    }

    #[test]
    fn every_variant_converges_to_its_canonical_form() {
        let t = tables();
        for (variant, target) in &t.district_corrections {
            let canonical = t.canonical_district(variant);
            assert_eq!(canonical, t.canonical_district(target), "{variant}");
            assert_eq!(t.canonical_district(&canonical), canonical, "{variant}");
        }
    }

    #[test]
    fn two_step_chain_resolves_within_two_passes() {
        let t = ReferenceTables::from_toml_str(
            r#"
            valid_regions = ["Goa"]
            [district_corrections]
            "Old Town" = "Mid Town"
            "Mid Town" = "New Town"
            "#,
        )
        .unwrap();
        assert_eq!(t.canonical_district("old town"), "New Town");
    }

    #[test]
    fn contradictory_pair_is_rejected() {
        let err = ReferenceTables::from_toml_str(
            r#"
            valid_regions = ["Gujarat"]
            [district_corrections]
            "Banas Kantha" = "Banaskantha"
            "Banaskantha" = "Banas Kantha"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, PulseError::CorrectionCycle { .. }));
    }

    #[test]
    fn three_step_chain_is_rejected() {
        let err = ReferenceTables::from_toml_str(
            r#"
            valid_regions = ["Goa"]
            [district_corrections]
            "A" = "B"
            "B" = "C"
            "C" = "D"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, PulseError::CorrectionCycle { .. }));
    }

    #[test]
    fn region_target_outside_whitelist_is_rejected() {
        let err = ReferenceTables::from_toml_str(
            r#"
            valid_regions = ["Goa"]
            [region_corrections]
            "Orissa" = "Odisha"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, PulseError::Config(_)));
    }

    proptest! {
        #[test]
        fn canonical_district_is_idempotent(raw in "[a-zA-Z ]{0,24}") {
            let t = tables();
            let once = t.canonical_district(&raw);
            prop_assert_eq!(t.canonical_district(&once), once);
        }
    }
}
