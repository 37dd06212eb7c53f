//! Symptom and behavior catalogs plus the append-only report documents.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::location::GeoPoint;

/// Which report collection a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Symptom,
    Behavior,
}

/// Origin of a catalog entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    #[default]
    Official,
    Suggested,
    Customized,
}

/// A symptom definition. Official symptoms have stable snake_case ids;
/// customized symptoms get a content-derived id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default, skip_serializing)]
    pub source: CatalogSource,
}

impl Symptom {
    /// Derives the stable id for a customized symptom from its name and
    /// description.
    #[must_use]
    pub fn customized_id(name: &str, desc: &str) -> String {
        content_id(name, desc)
    }
}

/// A preventive-behavior definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Behavior {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default, skip_serializing)]
    pub source: CatalogSource,
}

impl Behavior {
    /// Derives the stable id for a customized behavior.
    #[must_use]
    pub fn customized_id(name: &str, desc: &str) -> String {
        content_id(name, desc)
    }
}

fn content_id(name: &str, desc: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{name}=:={desc}").as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Official behavior ids.
pub const CLEAN_HAND: &str = "clean_hand";
pub const SOCIAL_DISTANCING: &str = "social_distancing";
pub const TOUCH_FACE: &str = "touch_face";
pub const WEAR_MASK: &str = "wear_mask";
pub const COVERING_COUGH: &str = "covering_coughs";
pub const CLEAN_SURFACE: &str = "clean_surface";

/// Sum of the official behavior weights (one per official behavior).
pub const TOTAL_OFFICIAL_BEHAVIOR_WEIGHT: f64 = 6.0;

/// The six official preventive behaviors.
pub static OFFICIAL_BEHAVIORS: Lazy<Vec<Behavior>> = Lazy::new(|| {
    vec![
        behavior(CLEAN_HAND, "Frequent hand cleaning",
            "Washing hands thoroughly with soap and water for at least 20 seconds or applying an alcohol-based hand sanitizer"),
        behavior(SOCIAL_DISTANCING, "Social & physical distancing",
            "Avoiding crowds, working from home, and maintaining at least 6 feet of distance from others whenever possible"),
        behavior(TOUCH_FACE, "Avoiding touching face",
            "Restraining from touching your eyes, nose, or mouth, especially with unwashed hands"),
        behavior(WEAR_MASK, "Wearing a face mask or covering",
            "Covering your nose and mouth when in public or whenever social distancing measures are difficult to maintain"),
        behavior(COVERING_COUGH, "Covering coughs and sneezes",
            "Covering your mouth with the inside of your elbow or a tissue whenever you cough or sneeze"),
        behavior(CLEAN_SURFACE, "Cleaning and disinfecting surfaces",
            "Cleaning and disinfecting frequently touched surfaces daily, such as doorknobs, tables, light switches, and keyboards"),
    ]
});

fn behavior(id: &str, name: &str, desc: &str) -> Behavior {
    Behavior {
        id: id.to_string(),
        name: name.to_string(),
        desc: desc.to_string(),
        source: CatalogSource::Official,
    }
}

/// Per-behavior weights. Every official behavior currently weighs 1.
pub static DEFAULT_BEHAVIOR_WEIGHTS: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    OFFICIAL_BEHAVIORS
        .iter()
        .map(|b| (b.id.clone(), 1.0))
        .collect()
});

/// Official symptom ids.
pub const FEVER: &str = "fever";
pub const COUGH: &str = "cough";
pub const BREATH: &str = "breath";
pub const CHILLS: &str = "chills";
pub const MUSCLE_PAIN: &str = "muscle_pain";
pub const THROAT: &str = "throat";
pub const NASAL: &str = "nasal";
pub const TASTE_SMELL: &str = "taste_smell";
pub const NAUSEA: &str = "nausea";
pub const DIARRHEA: &str = "diarrhea";

/// The official symptom catalog, in catalog order.
pub static OFFICIAL_SYMPTOMS: Lazy<Vec<Symptom>> = Lazy::new(|| {
    vec![
        symptom(FEVER, "Fever", "Body temperature above 38°C / 100.4°F"),
        symptom(COUGH, "Dry cough", "Persistent cough without phlegm"),
        symptom(BREATH, "Shortness of breath", "Difficulty breathing or chest tightness"),
        symptom(CHILLS, "Chills", "Repeated shaking with chills"),
        symptom(MUSCLE_PAIN, "Muscle pain", "Unexplained muscle aches"),
        symptom(THROAT, "Sore throat", "Pain or irritation in the throat"),
        symptom(NASAL, "Nasal congestion", "Runny or stuffy nose"),
        symptom(TASTE_SMELL, "Loss of taste or smell", "New loss of taste or smell"),
        symptom(NAUSEA, "Nausea", "Nausea or vomiting"),
        symptom(DIARRHEA, "Diarrhea", "Loose or watery stools"),
    ]
});

/// Additional symptoms offered in the report UI but excluded from the
/// weighted score table (they score with the customized weight of 1).
pub static SUGGESTED_SYMPTOMS: Lazy<Vec<Symptom>> = Lazy::new(|| {
    vec![
        suggested("headache", "Headache", "Persistent or unusual headache"),
        suggested("fatigue", "Fatigue", "Unusual tiredness or exhaustion"),
        suggested("rash", "Skin rash", "New rash or discoloration of fingers or toes"),
        suggested("red_eyes", "Red eyes", "Conjunctivitis or eye irritation"),
        suggested("appetite_loss", "Loss of appetite", "Reduced desire to eat"),
        suggested("dizziness", "Dizziness", "Lightheadedness or vertigo"),
    ]
});

fn symptom(id: &str, name: &str, desc: &str) -> Symptom {
    Symptom {
        id: id.to_string(),
        name: name.to_string(),
        desc: desc.to_string(),
        source: CatalogSource::Official,
    }
}

fn suggested(id: &str, name: &str, desc: &str) -> Symptom {
    Symptom {
        source: CatalogSource::Suggested,
        ..symptom(id, name, desc)
    }
}

/// Fixed per-symptom weights used by the symptom score.
pub static DEFAULT_SYMPTOM_WEIGHTS: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    HashMap::from([
        (FEVER.to_string(), 3.0),
        (COUGH.to_string(), 2.0),
        (BREATH.to_string(), 3.0),
        (CHILLS.to_string(), 1.0),
        (MUSCLE_PAIN.to_string(), 1.0),
        (THROAT.to_string(), 1.0),
        (NASAL.to_string(), 1.0),
        (TASTE_SMELL.to_string(), 2.0),
        (NAUSEA.to_string(), 1.0),
        (DIARRHEA.to_string(), 1.0),
    ])
});

/// Symptoms that trigger the 7-day follow-up workflow when self-reported.
pub static HIGH_RISK_SYMPTOMS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec![FEVER, COUGH, BREATH]);

/// True when the id belongs to the official weighted catalog.
#[must_use]
pub fn is_official_symptom(id: &str) -> bool {
    DEFAULT_SYMPTOM_WEIGHTS.contains_key(id)
}

/// Splits a mixed list into `(official, customized)` by catalog membership.
#[must_use]
pub fn split_symptoms(symptoms: Vec<Symptom>) -> (Vec<Symptom>, Vec<Symptom>) {
    symptoms
        .into_iter()
        .partition(|s| is_official_symptom(&s.id))
}

/// Splits a mixed list into `(official, customized)` by catalog membership.
#[must_use]
pub fn split_behaviors(behaviors: Vec<Behavior>) -> (Vec<Behavior>, Vec<Behavior>) {
    behaviors
        .into_iter()
        .partition(|b| DEFAULT_BEHAVIOR_WEIGHTS.contains_key(&b.id))
}

/// An immutable symptom self-report.
///
/// Unique by `(profile_id, ts)`: the same user cannot submit two reports
/// in the same second, and duplicate inserts are coalesced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomReport {
    pub profile_id: String,
    pub account_number: String,
    #[serde(default)]
    pub official_symptoms: Vec<Symptom>,
    #[serde(default)]
    pub customized_symptoms: Vec<Symptom>,
    pub location: GeoPoint,
    pub ts: i64,
}

/// An immutable preventive-behavior self-report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorReport {
    pub profile_id: String,
    pub account_number: String,
    #[serde(default)]
    pub official_behaviors: Vec<Behavior>,
    #[serde(default)]
    pub customized_behaviors: Vec<Behavior>,
    pub location: GeoPoint,
    pub ts: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn official_behavior_weights_sum_to_total() {
        let sum: f64 = DEFAULT_BEHAVIOR_WEIGHTS.values().sum();
        assert!((sum - TOTAL_OFFICIAL_BEHAVIOR_WEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn every_official_symptom_has_a_weight() {
        for s in OFFICIAL_SYMPTOMS.iter() {
            assert!(
                DEFAULT_SYMPTOM_WEIGHTS.contains_key(&s.id),
                "missing weight for {}",
                s.id
            );
        }
    }

    #[test]
    fn suggested_symptoms_are_not_weighted() {
        for s in SUGGESTED_SYMPTOMS.iter() {
            assert!(!is_official_symptom(&s.id));
        }
    }

    #[test]
    fn split_symptoms_partitions_by_catalog() {
        let mixed = vec![
            Symptom {
                id: FEVER.to_string(),
                ..Symptom::default()
            },
            Symptom {
                id: "something_else".to_string(),
                ..Symptom::default()
            },
        ];
        let (official, customized) = split_symptoms(mixed);
        assert_eq!(official.len(), 1);
        assert_eq!(customized.len(), 1);
        assert_eq!(official[0].id, FEVER);
    }

    #[test]
    fn customized_ids_are_stable() {
        let a = Symptom::customized_id("itchy eyes", "eyes feel itchy");
        let b = Symptom::customized_id("itchy eyes", "eyes feel itchy");
        let c = Symptom::customized_id("itchy eyes", "different description");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
