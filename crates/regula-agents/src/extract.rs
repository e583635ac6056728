//! Query feature extraction.
//!
//! Research agents shape their searches from what the query mentions:
//! issuing authorities, cited instruments (RDC, Lei, Decreto, ...), broad
//! regulatory topics, salient keywords, and which research strategies the
//! wording calls for. Portuguese and English phrasings are both recognized.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Brazilian authorities (and the data-protection law) a query may target.
pub const REGULATORY_BODIES: [&str; 19] = [
    "ANVISA", "ANATEL", "ANAC", "ANEEL", "ANS", "ANP", "ANCINE", "ANTAQ", "ANTT", "CVM", "BACEN",
    "INMETRO", "MAPA", "CADE", "INPI", "ANPD", "SUSEP", "PREVIC", "LGPD",
];

static BODY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = REGULATORY_BODIES.join("|");
    Regex::new(&format!(r"(?i)\b({alternation})\b")).expect("body alternation is a valid regex")
});

static FRAMEWORK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bRDC\s*(?:n[ºo°.]?\s*)?\d+/\d{2,4}",
        r"(?i)\bLei\s*(?:n[ºo°.]?\s*)?\d{1,2}\.?\d{3}/\d{2,4}",
        r"(?i)\bDecreto\s*(?:n[ºo°.]?\s*)?\d{1,2}\.?\d{3}/\d{2,4}",
        r"(?i)\bPortaria\s*(?:n[ºo°.]?\s*)?\d+/\d{2,4}",
        r"\bIN\s*(?:n[ºo°.]?\s*)?\d+/\d{2,4}",
        r"(?i)\bResolu[çc][ãa]o\s*(?:n[ºo°.]?\s*)?\d+/\d{2,4}",
        r"\bMP\s*(?:n[ºo°.]?\s*)?\d+/\d{2,4}",
        r"(?i)\bAto\s*(?:n[ºo°.]?\s*)?\d+/\d{2,4}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("framework pattern is a valid regex"))
    .collect()
});

const STOP_WORDS: [&str; 44] = [
    "o", "a", "de", "da", "do", "para", "com", "em", "que", "e", "é", "os", "as", "dos", "das",
    "um", "uma", "sobre", "como", "por", "quais", "qual", "são", "pelo", "pela", "the", "and",
    "for", "with", "what", "which", "from", "that", "this", "into", "about", "does", "must",
    "should", "are", "how", "when", "where", "under",
];

/// Broad regulatory subject areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    MedicalDevices,
    Drugs,
    Cosmetics,
    Food,
    Telecom,
    DataProtection,
    HealthSurveillance,
}

impl Topic {
    pub const ALL: [Topic; 7] = [
        Topic::MedicalDevices,
        Topic::Drugs,
        Topic::Cosmetics,
        Topic::Food,
        Topic::Telecom,
        Topic::DataProtection,
        Topic::HealthSurveillance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::MedicalDevices => "medical_devices",
            Topic::Drugs => "drugs",
            Topic::Cosmetics => "cosmetics",
            Topic::Food => "food",
            Topic::Telecom => "telecom",
            Topic::DataProtection => "data_protection",
            Topic::HealthSurveillance => "health_surveillance",
        }
    }

    fn markers(&self) -> &'static [&'static str] {
        match self {
            Topic::MedicalDevices => &["dispositivo", "device", "equipamento médico", "produto para saúde"],
            Topic::Drugs => &["medicamento", "fármaco", "farmac", "drug", "pharma"],
            Topic::Cosmetics => &["cosmétic", "cosmetic"],
            Topic::Food => &["aliment", "food", "suplemento", "supplement"],
            Topic::Telecom => &["telecom", "radiofrequência", "radio frequency", "homologação"],
            Topic::DataProtection => &["dados pessoais", "data protection", "privacy", "privacidade", "lgpd"],
            Topic::HealthSurveillance => &["sanitár", "sanitary", "vigilância"],
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a research agent should spread its searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStrategy {
    General,
    RegulatoryUpdates,
    ComplianceAnalysis,
    InternationalHarmonization,
}

impl ResearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchStrategy::General => "general",
            ResearchStrategy::RegulatoryUpdates => "regulatory_updates",
            ResearchStrategy::ComplianceAnalysis => "compliance_analysis",
            ResearchStrategy::InternationalHarmonization => "international_harmonization",
        }
    }

    fn triggers(&self) -> &'static [&'static str] {
        match self {
            ResearchStrategy::General => &[],
            ResearchStrategy::RegulatoryUpdates => {
                &["mudança", "atualização", "novidade", "recente", "update", "recent", "change"]
            }
            ResearchStrategy::ComplianceAnalysis => &[
                "conformidade",
                "requisito",
                "compliance",
                "adequação",
                "requirement",
                "registro",
                "registration",
            ],
            ResearchStrategy::InternationalHarmonization => &[
                "internacional",
                "exportação",
                "importação",
                "harmoniza",
                "international",
                "export",
                "import",
                "mercosul",
            ],
        }
    }
}

impl fmt::Display for ResearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorities named in `text`, uppercased, in first-mention order.
pub fn regulatory_bodies(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut bodies: Vec<String> = BODY_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_uppercase())
        .filter(|b| seen.insert(b.clone()))
        .collect();
    if text.to_lowercase().contains("banco central") && seen.insert("BACEN".to_string()) {
        bodies.push("BACEN".to_string());
    }
    bodies
}

/// Normative instruments cited in `text` (e.g. "RDC 751/2022"), in order.
pub fn framework_references(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = FRAMEWORK_PATTERNS
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| (m.start(), m.as_str().trim().to_string())))
        .collect();
    found.sort_by_key(|(start, _)| *start);
    let mut seen = BTreeSet::new();
    found
        .into_iter()
        .map(|(_, reference)| reference)
        .filter(|r| seen.insert(r.to_lowercase()))
        .collect()
}

pub fn topics(text: &str) -> Vec<Topic> {
    let lower = text.to_lowercase();
    Topic::ALL
        .into_iter()
        .filter(|t| t.markers().iter().any(|m| lower.contains(m)))
        .collect()
}

/// Up to ten salient words, lowercased, longer than three characters.
pub fn keywords(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(w))
        .filter(|w| seen.insert(w.to_string()))
        .take(10)
        .map(str::to_string)
        .collect()
}

/// `General` always, plus every strategy the wording triggers.
pub fn strategies(text: &str) -> Vec<ResearchStrategy> {
    let lower = text.to_lowercase();
    let mut out = vec![ResearchStrategy::General];
    for strategy in [
        ResearchStrategy::RegulatoryUpdates,
        ResearchStrategy::ComplianceAnalysis,
        ResearchStrategy::InternationalHarmonization,
    ] {
        if strategy.triggers().iter().any(|t| lower.contains(t)) {
            out.push(strategy);
        }
    }
    out
}

/// Everything extracted from one query and its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFeatures {
    pub bodies: Vec<String>,
    pub frameworks: Vec<String>,
    pub topics: Vec<Topic>,
    pub keywords: Vec<String>,
    pub strategies: Vec<ResearchStrategy>,
}

impl QueryFeatures {
    /// Context contributes bodies, frameworks, and topics; keywords and
    /// strategies come from the query alone.
    pub fn extract(query: &str, context: Option<&str>) -> Self {
        let combined = match context {
            Some(ctx) if !ctx.trim().is_empty() => format!("{query}\n{ctx}"),
            _ => query.to_string(),
        };
        Self {
            bodies: regulatory_bodies(&combined),
            frameworks: framework_references(&combined),
            topics: topics(&combined),
            keywords: keywords(query),
            strategies: strategies(query),
        }
    }

    pub fn topic_names(&self) -> Vec<String> {
        self.topics.iter().map(|t| t.as_str().to_string()).collect()
    }
}
