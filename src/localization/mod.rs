//! Localized catalogs for resources, symptoms, and behaviors.
//!
//! The catalog for a language is built once on first access and kept in
//! a process-wide read-mostly table; nothing is ever evicted. Languages
//! without a translation fall back to English, and `zh` is treated as
//! `zh_tw` for historic reasons.

mod resources;

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::domain::rating::Resource;
use crate::domain::report::{Behavior, Symptom, OFFICIAL_BEHAVIORS, OFFICIAL_SYMPTOMS, SUGGESTED_SYMPTOMS};

pub use resources::{DEFAULT_RESOURCE_COUNT, IMPORTANT_RESOURCE_IDS};

/// One language's resolved catalog.
#[derive(Debug, Clone)]
struct Catalog {
    resources: Vec<Resource>,
    important_resources: Vec<Resource>,
    resource_names: HashMap<String, String>,
    symptom_names: HashMap<String, String>,
    behavior_names: HashMap<String, String>,
}

static CATALOGS: Lazy<RwLock<HashMap<String, Catalog>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Normalizes a client language tag into a catalog key.
fn normalize_lang(lang: &str) -> String {
    let lang = if lang.is_empty() { "en" } else { lang };
    let lang = lang.to_lowercase().replace('-', "_");
    if lang == "zh" {
        "zh_tw".to_string()
    } else {
        lang
    }
}

fn build_catalog(lang: &str) -> Catalog {
    // Only the English table ships in-process today; other languages
    // resolve through it until their translation tables land.
    let _ = lang;

    let mut resources = Vec::with_capacity(DEFAULT_RESOURCE_COUNT);
    let mut important_resources = Vec::with_capacity(IMPORTANT_RESOURCE_IDS.len());
    let mut resource_names = HashMap::with_capacity(DEFAULT_RESOURCE_COUNT);
    for (i, name) in resources::RESOURCE_NAMES_EN.iter().enumerate() {
        let id = format!("resource_{}", i + 1);
        let important = IMPORTANT_RESOURCE_IDS.contains(&id.as_str());
        let resource = Resource {
            id: id.clone(),
            name: (*name).to_string(),
            important,
        };
        if important {
            important_resources.push(resource.clone());
        }
        resource_names.insert(id, (*name).to_string());
        resources.push(resource);
    }

    let symptom_names = OFFICIAL_SYMPTOMS
        .iter()
        .chain(SUGGESTED_SYMPTOMS.iter())
        .map(|s| (s.id.clone(), s.name.clone()))
        .collect();
    let behavior_names = OFFICIAL_BEHAVIORS
        .iter()
        .map(|b| (b.id.clone(), b.name.clone()))
        .collect();

    Catalog {
        resources,
        important_resources,
        resource_names,
        symptom_names,
        behavior_names,
    }
}

fn with_catalog<T>(lang: &str, f: impl Fn(&Catalog) -> T) -> T {
    let key = normalize_lang(lang);
    {
        let catalogs = CATALOGS.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(catalog) = catalogs.get(&key) {
            return f(catalog);
        }
    }

    let catalog = build_catalog(&key);
    let mut catalogs = CATALOGS
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let entry = catalogs.entry(key).or_insert(catalog);
    f(entry)
}

/// Resolves localized names by id for a given language.
///
/// Handlers construct one per request with the client's `lang` query
/// parameter; all lookups go through the shared catalog table.
#[derive(Debug, Clone)]
pub struct Localizer {
    lang: String,
}

impl Localizer {
    /// Creates a localizer for a client language tag.
    #[must_use]
    pub fn new(lang: &str) -> Self {
        Self {
            lang: normalize_lang(lang),
        }
    }

    /// The full official resource list (126 entries) in catalog order.
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        with_catalog(&self.lang, |c| c.resources.clone())
    }

    /// The ~30 resources flagged as important.
    #[must_use]
    pub fn important_resources(&self) -> Vec<Resource> {
        with_catalog(&self.lang, |c| c.important_resources.clone())
    }

    /// Localized name for an official resource id; `None` for unknown or
    /// customized ids.
    #[must_use]
    pub fn resource_name(&self, id: &str) -> Option<String> {
        with_catalog(&self.lang, |c| c.resource_names.get(id).cloned())
    }

    /// Localized name for an official or suggested symptom id.
    #[must_use]
    pub fn symptom_name(&self, id: &str) -> Option<String> {
        with_catalog(&self.lang, |c| c.symptom_names.get(id).cloned())
    }

    /// Localized name for an official behavior id.
    #[must_use]
    pub fn behavior_name(&self, id: &str) -> Option<String> {
        with_catalog(&self.lang, |c| c.behavior_names.get(id).cloned())
    }

    /// Localized official symptom catalog.
    #[must_use]
    pub fn official_symptoms(&self) -> Vec<Symptom> {
        OFFICIAL_SYMPTOMS.clone()
    }

    /// Localized suggested symptom catalog.
    #[must_use]
    pub fn suggested_symptoms(&self) -> Vec<Symptom> {
        SUGGESTED_SYMPTOMS.clone()
    }

    /// Localized official behavior catalog.
    #[must_use]
    pub fn official_behaviors(&self) -> Vec<Behavior> {
        OFFICIAL_BEHAVIORS.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_exactly_126_resources() {
        let localizer = Localizer::new("en");
        assert_eq!(localizer.resources().len(), DEFAULT_RESOURCE_COUNT);
    }

    #[test]
    fn important_subset_matches_flag_list() {
        let localizer = Localizer::new("en");
        let important = localizer.important_resources();
        assert_eq!(important.len(), IMPORTANT_RESOURCE_IDS.len());
        assert!(important.iter().all(|r| r.important));
    }

    #[test]
    fn resource_name_resolves_by_id() {
        let localizer = Localizer::new("en");
        assert!(localizer.resource_name("resource_1").is_some());
        assert!(localizer.resource_name("resource_126").is_some());
        assert!(localizer.resource_name("resource_127").is_none());
        assert!(localizer.resource_name("deadbeef").is_none());
    }

    #[test]
    fn zh_normalizes_to_zh_tw() {
        let a = Localizer::new("zh");
        let b = Localizer::new("zh_tw");
        assert_eq!(a.lang, b.lang);
    }

    #[test]
    fn empty_lang_falls_back_to_english() {
        let localizer = Localizer::new("");
        assert_eq!(localizer.lang, "en");
    }

    #[test]
    fn symptom_and_behavior_names_resolve() {
        let localizer = Localizer::new("en");
        assert_eq!(localizer.symptom_name("fever").as_deref(), Some("Fever"));
        assert!(localizer.behavior_name("clean_hand").is_some());
        assert!(localizer.symptom_name("nope").is_none());
    }
}
