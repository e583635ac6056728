//! Offline Brazilian regulatory corpus for the REGULA reference runtime.
//!
//! Summaries are paraphrased and abridged. Nothing here is legal advice and
//! no external system is contacted. This module stands in for a real
//! regulatory search index in a production deployment.

/// One indexed normative instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Document {
    pub id: &'static str,
    /// Citation form, e.g. "RDC 751/2022".
    pub title: &'static str,
    pub url: &'static str,
    /// Authority that issues or enforces the instrument.
    pub body: &'static str,
    pub summary: &'static str,
    /// Lowercase phrases that make the document relevant when a query
    /// contains them.
    pub keywords: &'static [&'static str],
    /// Obligations the instrument imposes.
    pub requirements: &'static [&'static str],
}

// ── Documents ────────────────────────────────────────────────────────────────

pub const CORPUS: [Document; 6] = [
    Document {
        id: "rdc-751-2022",
        title: "RDC 751/2022",
        url: "https://www.in.gov.br/en/web/dou/-/resolucao-rdc-n-751-de-15-de-setembro-de-2022",
        body: "ANVISA",
        summary: "Classifies medical devices into risk classes I to IV; classes I and II are \
                  regularized by notification and classes III and IV by registration.",
        keywords: &[
            "dispositivo",
            "device",
            "registration",
            "registro",
            "notification",
            "notificação",
            "class",
            "medical",
            "751",
        ],
        requirements: &[
            "risk classification of the device under RDC 751/2022",
            "notification dossier for class I and II devices",
            "registration dossier for class III and IV devices",
            "Brazilian registration holder with ANVISA company authorization",
        ],
    },
    Document {
        id: "rdc-665-2022",
        title: "RDC 665/2022",
        url: "https://www.in.gov.br/en/web/dou/-/resolucao-rdc-n-665-de-30-de-marco-de-2022",
        body: "ANVISA",
        summary: "Sets Good Manufacturing Practices for medical devices and in vitro \
                  diagnostic products, including quality management and complaint handling.",
        keywords: &[
            "manufacturing",
            "fabricação",
            "boas práticas",
            "gmp",
            "bpf",
            "device",
            "dispositivo",
            "665",
        ],
        requirements: &["Good Manufacturing Practices certificate for the manufacturing site"],
    },
    Document {
        id: "rdc-830-2023",
        title: "RDC 830/2023",
        url: "https://www.in.gov.br/en/web/dou/-/resolucao-rdc-n-830-de-6-de-dezembro-de-2023",
        body: "ANVISA",
        summary: "Classifies in vitro diagnostic devices by risk and defines their \
                  notification and registration routes.",
        keywords: &["in vitro", "diagnóstico", "diagnostic", "ivd", "device", "830"],
        requirements: &["IVD risk classification under RDC 830/2023"],
    },
    Document {
        id: "lei-6360-1976",
        title: "Lei 6.360/1976",
        url: "https://www.planalto.gov.br/ccivil_03/leis/l6360.htm",
        body: "ANVISA",
        summary: "Subjects drugs, cosmetics, sanitizing products and health products to \
                  sanitary surveillance; no such product may be sold before it is registered.",
        keywords: &[
            "vigilância sanitária",
            "health surveillance",
            "sanitary",
            "registration",
            "registro",
            "medicamento",
            "drug",
            "cosmetic",
            "cosmético",
            "6.360",
        ],
        requirements: &["product registration with the health authority before sale"],
    },
    Document {
        id: "lei-13709-2018",
        title: "Lei 13.709/2018",
        url: "https://www.planalto.gov.br/ccivil_03/_ato2015-2018/2018/lei/l13709.htm",
        body: "ANPD",
        summary: "The LGPD: personal data may only be processed on a legal basis, with \
                  stricter conditions for sensitive health data.",
        keywords: &[
            "dados pessoais",
            "personal data",
            "lgpd",
            "privacy",
            "privacidade",
            "13.709",
            "data protection",
        ],
        requirements: &[
            "legal basis documented for each personal data processing activity",
            "data protection officer appointed",
        ],
    },
    Document {
        id: "anatel-ato-77-2021",
        title: "Ato 77/2021",
        url: "https://informacoes.anatel.gov.br/legislacao/atos-de-certificacao-de-produtos/2021/1500-ato-77",
        body: "ANATEL",
        summary: "Technical requirements for conformity assessment of radio-frequency \
                  equipment before homologation by ANATEL.",
        keywords: &[
            "telecom",
            "anatel",
            "homologação",
            "radio",
            "wireless",
            "bluetooth",
            "wi-fi",
        ],
        requirements: &["ANATEL conformity certification and homologation"],
    },
];

/// Look up a document by id.
pub fn document(id: &str) -> Option<&'static Document> {
    CORPUS.iter().find(|d| d.id == id)
}

impl Document {
    /// Number of this document's keywords found in `text_lower`.
    pub fn matches(&self, text_lower: &str) -> usize {
        self.keywords.iter().filter(|k| text_lower.contains(*k)).count()
    }
}
