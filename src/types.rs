use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Canonical domain-context flags. The consensus result always carries the
/// full set, defaulted to `false`; per-provider results may be sparse.
pub const DOMAIN_CONTEXT_KEYS: &[&str] = &[
    "hurricane_related",
    "flood_related",
    "storm_surge",
    "emergency_repair",
];

// ──────────────────────────────────────────────
// Enums
// ──────────────────────────────────────────────

/// Document category tag as classified by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Invoice,
    Receipt,
    Policy,
    Contract,
    Report,
    Legal,
    Medical,
    General,
}

impl DocumentType {
    /// Complex categories benefit from maximum cross-checking: every
    /// registered provider is consulted for them.
    pub fn is_complex(&self) -> bool {
        matches!(self, DocumentType::Policy | DocumentType::Legal)
    }
}

/// Damage severity reported in a damage assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
    Catastrophic,
}

/// Severity of a flagged anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
}

// ──────────────────────────────────────────────
// Result components
// ──────────────────────────────────────────────

/// A monetary amount detected in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amount {
    pub value: f64,
    #[serde(rename = "type")]
    pub amount_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub confidence: f32,
}

impl Amount {
    /// Composite dedup key: two amounts with the same `(value, type)` are
    /// the same finding regardless of currency/confidence disagreement.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.value, self.amount_type)
    }
}

/// A named entity detected in the document, keyed by role in the result map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub value: String,
    pub confidence: f32,
}

/// Structured damage assessment for storm/disaster documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageAssessment {
    pub severity: Severity,
    #[serde(default)]
    pub types: BTreeSet<String>,
    pub estimated_cost: f64,
    pub confidence: f32,
}

/// A potential fraud or inconsistency flag.
///
/// Deserialization is strict: every field is required and `severity` must
/// be one of low/medium/high. Entries that do not conform are filtered out
/// during consensus building, never surfaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub anomaly_type: String,
    pub description: String,
    pub confidence: f32,
    pub severity: AnomalySeverity,
}

/// A link from the document to another domain object (claim, property, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    #[serde(rename = "type")]
    pub assoc_type: String,
    pub id: String,
    pub confidence: f32,
}

/// Per-provider facts that did not survive into the consensus, recorded for
/// audit/debugging. Derived during consensus building, never stored by the
/// adapters themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInsight {
    pub provider: String,
    pub unique_findings: Vec<UniqueFinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueFinding {
    pub field: String,
    pub value: serde_json::Value,
}

// ──────────────────────────────────────────────
// Analysis result
// ──────────────────────────────────────────────

/// The per-provider and consensus output shape. All fields are sparse —
/// providers fill what they can detect.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// ISO dates found in the document, sorted ascending.
    #[serde(default)]
    pub dates: BTreeSet<String>,
    #[serde(default)]
    pub amounts: Vec<Amount>,
    /// Entity-role → entity. Keys are unique per result.
    #[serde(default)]
    pub entities: BTreeMap<String, Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_assessment: Option<DamageAssessment>,
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_name: Option<String>,
    #[serde(default)]
    pub associations: Vec<Association>,
    /// Domain-specific boolean flags (see [`DOMAIN_CONTEXT_KEYS`]).
    #[serde(default)]
    pub domain_context: BTreeMap<String, bool>,
    /// Overall confidence the provider/consensus attaches to its own output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Consensus-only; empty in per-provider results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_insights: Vec<ProviderInsight>,
}

// ──────────────────────────────────────────────
// Orchestration envelopes
// ──────────────────────────────────────────────

/// One adapter invocation's outcome. Exactly one of a non-empty `result`
/// or `error` is meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAnalysis {
    pub provider: String,
    pub result: DocumentAnalysisResult,
    pub processing_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderAnalysis {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The orchestrator's final return value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConsensus {
    pub consensus: DocumentAnalysisResult,
    /// Successful invocations only, in selection-priority order.
    pub providers: Vec<ProviderAnalysis>,
    pub confidence: f32,
    pub processing_time_ms: u64,
}

// ──────────────────────────────────────────────
// Input
// ──────────────────────────────────────────────

/// Caller-supplied contextual flags used for provider selection and
/// specialist-override rules, not for merge logic generally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainHints {
    #[serde(default)]
    pub hurricane: bool,
    #[serde(default)]
    pub flood: bool,
}

impl DomainHints {
    /// High-severity/disaster scenario: disaster-response providers are
    /// ranked first and the fan-out is capped.
    pub fn is_disaster(&self) -> bool {
        self.hurricane || self.flood
    }
}

/// One document to analyze. The blob is shared read-only across all
/// concurrently running adapter invocations.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub document: Arc<Vec<u8>>,
    pub mime_type: String,
    pub document_type_hint: Option<DocumentType>,
    pub domain_hints: DomainHints,
}

impl AnalysisInput {
    pub fn new(document: Vec<u8>, mime_type: &str) -> Self {
        Self {
            document: Arc::new(document),
            mime_type: mime_type.to_string(),
            document_type_hint: None,
            domain_hints: DomainHints::default(),
        }
    }

    pub fn with_document_type_hint(mut self, hint: DocumentType) -> Self {
        self.document_type_hint = Some(hint);
        self
    }

    pub fn with_domain_hints(mut self, hints: DomainHints) -> Self {
        self.domain_hints = hints;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_types_are_policy_and_legal() {
        assert!(DocumentType::Policy.is_complex());
        assert!(DocumentType::Legal.is_complex());
        assert!(!DocumentType::Invoice.is_complex());
        assert!(!DocumentType::General.is_complex());
    }

    #[test]
    fn document_type_serializes_lowercase() {
        let json = serde_json::to_string(&DocumentType::Invoice).unwrap();
        assert_eq!(json, "\"invoice\"");
        let parsed: DocumentType = serde_json::from_str("\"legal\"").unwrap();
        assert_eq!(parsed, DocumentType::Legal);
    }

    #[test]
    fn amount_dedup_key_ignores_currency_and_confidence() {
        let a = Amount {
            value: 1500.0,
            amount_type: "total".into(),
            currency: Some("USD".into()),
            confidence: 0.9,
        };
        let b = Amount {
            value: 1500.0,
            amount_type: "total".into(),
            currency: None,
            confidence: 0.95,
        };
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn amount_dedup_key_distinguishes_type() {
        let total = Amount {
            value: 1500.0,
            amount_type: "total".into(),
            currency: None,
            confidence: 0.9,
        };
        let deductible = Amount {
            value: 1500.0,
            amount_type: "deductible".into(),
            currency: None,
            confidence: 0.9,
        };
        assert_ne!(total.dedup_key(), deductible.dedup_key());
    }

    #[test]
    fn anomaly_rejects_missing_fields() {
        let missing = serde_json::json!({"type": "duplicate", "confidence": 0.8});
        assert!(serde_json::from_value::<Anomaly>(missing).is_err());
    }

    #[test]
    fn anomaly_rejects_invalid_severity() {
        let bad = serde_json::json!({
            "type": "duplicate",
            "description": "seen twice",
            "confidence": 0.8,
            "severity": "critical"
        });
        assert!(serde_json::from_value::<Anomaly>(bad).is_err());
    }

    #[test]
    fn domain_hints_disaster_detection() {
        assert!(!DomainHints::default().is_disaster());
        assert!(DomainHints { hurricane: true, flood: false }.is_disaster());
        assert!(DomainHints { hurricane: false, flood: true }.is_disaster());
    }

    #[test]
    fn result_round_trips_camel_case() {
        let mut result = DocumentAnalysisResult {
            document_type: Some(DocumentType::Invoice),
            suggested_name: Some("roof-repair-invoice.pdf".into()),
            ..Default::default()
        };
        result.dates.insert("2024-01-15".into());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["documentType"], "invoice");
        assert_eq!(json["suggestedName"], "roof-repair-invoice.pdf");

        let back: DocumentAnalysisResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn dates_stay_sorted() {
        let mut result = DocumentAnalysisResult::default();
        result.dates.insert("2024-03-01".into());
        result.dates.insert("2024-01-15".into());
        let ordered: Vec<_> = result.dates.iter().cloned().collect();
        assert_eq!(ordered, vec!["2024-01-15", "2024-03-01"]);
    }
}
