//! Document catalogue.
//!
//! Maps document types to their physical format and default extraction
//! rules, and lists the countries supported out of the box. The
//! catalogue is embedded at compile time from `contrib/doc/*.toml` and
//! can be extended per-country at runtime via configuration.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use vita_core::types::{CountryDocTypes, DocRule};

/// Compile-time embedded country and document-type catalogue.
const CATALOGUE_TOML: &str = include_str!("../../../contrib/doc/countries.toml");

static CATALOGUE: OnceLock<Catalogue> = OnceLock::new();

/// Top-level catalogue file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalogue {
    #[serde(default)]
    pub countries: Vec<CountryEntry>,
    #[serde(default)]
    pub doc_types: Vec<DocTypeEntry>,
}

/// One `[[countries]]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CountryEntry {
    pub code: String,
    pub doc_types: Vec<String>,
}

/// One `[[doc_types]]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DocTypeEntry {
    pub name: String,
    /// Physical format, e.g. "td1" (cards) or "td3" (passports).
    pub format: String,
    pub rules: Vec<DocRule>,
}

fn catalogue() -> &'static Catalogue {
    CATALOGUE.get_or_init(|| match toml::from_str::<Catalogue>(CATALOGUE_TOML) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("vitad: bad catalogue TOML: {e}");
            Catalogue::default()
        }
    })
}

/// Look up a document type by name.
/// Returns a `'static` reference into the embedded catalogue.
pub fn lookup_doc_type(name: &str) -> Option<&'static DocTypeEntry> {
    catalogue().doc_types.iter().find(|d| d.name == name)
}

/// Merged country listing: embedded entries plus configured extras,
/// doc types unioned per country, everything sorted for stable output.
pub fn country_listing(extras: &[(String, Vec<String>)]) -> Vec<CountryDocTypes> {
    let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in &catalogue().countries {
        merged.insert(entry.code.clone(), entry.doc_types.clone());
    }
    for (code, types) in extras {
        let slot = merged.entry(code.clone()).or_default();
        for t in types {
            if !slot.contains(t) {
                slot.push(t.clone());
            }
        }
    }
    merged
        .into_iter()
        .map(|(country, mut doc_types)| {
            doc_types.sort();
            CountryDocTypes {
                country,
                doc_types,
            }
        })
        .collect()
}
