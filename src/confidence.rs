//! Cross-provider agreement scoring.
//!
//! The consensus confidence measures how much the successful providers
//! agreed, not how confident any one of them felt. For each scored field
//! the agreement ratio is `(n - distinct + 1) / n` over `n` provider
//! values; the final score is the mean across fields, with a flat boost
//! when a specialist contributed and a hard ceiling below 1.0 so the
//! score never reads as certainty.

use std::collections::HashSet;

use serde_json::Value;

use crate::types::ProviderAnalysis;

/// No score may reach 1.0, however unanimous the providers were.
pub const MAX_CONFIDENCE: f32 = 0.99;

/// Fallback when a lone provider did not report its own confidence.
pub const DEFAULT_SELF_CONFIDENCE: f32 = 0.7;

/// Flat bonus when a disaster specialist is among the successes.
pub const SPECIALIST_BOOST: f32 = 0.1;

/// Result fields scored for agreement, by wire name.
const AGREEMENT_FIELDS: &[&str] = &["documentType", "category", "dates", "amounts"];

/// Score the agreement among successful analyses.
///
/// With one success there is nothing to compare, so its self-reported
/// confidence (or the default) is used. The slice must not be empty.
pub fn score(successes: &[ProviderAnalysis], specialists: &[String]) -> f32 {
    debug_assert!(!successes.is_empty());

    if successes.len() == 1 {
        let self_reported = successes[0]
            .result
            .confidence
            .unwrap_or(DEFAULT_SELF_CONFIDENCE);
        return self_reported.min(MAX_CONFIDENCE);
    }

    let serialized: Vec<Value> = successes
        .iter()
        .map(|s| serde_json::to_value(&s.result).unwrap_or(Value::Null))
        .collect();

    let n = serialized.len() as f32;
    let mut total = 0.0f32;
    for field in AGREEMENT_FIELDS {
        let distinct: HashSet<String> = serialized
            .iter()
            .map(|result| {
                result
                    .get(field)
                    .cloned()
                    .unwrap_or(Value::Null)
                    .to_string()
            })
            .collect();
        total += (n - distinct.len() as f32 + 1.0) / n;
    }
    let mut confidence = total / AGREEMENT_FIELDS.len() as f32;

    let has_specialist = successes
        .iter()
        .any(|s| specialists.contains(&s.provider));
    if has_specialist {
        confidence += SPECIALIST_BOOST;
    }

    confidence.min(MAX_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, DocumentAnalysisResult, DocumentType};

    fn success(provider: &str, result: DocumentAnalysisResult) -> ProviderAnalysis {
        ProviderAnalysis {
            provider: provider.to_string(),
            result,
            processing_time_ms: 10,
            error: None,
        }
    }

    fn typed(doc_type: DocumentType) -> DocumentAnalysisResult {
        DocumentAnalysisResult {
            document_type: Some(doc_type),
            ..Default::default()
        }
    }

    #[test]
    fn single_provider_uses_self_reported_confidence() {
        let result = DocumentAnalysisResult {
            confidence: Some(0.85),
            ..Default::default()
        };
        assert_eq!(score(&[success("solo", result)], &[]), 0.85);
    }

    #[test]
    fn single_provider_without_confidence_uses_default() {
        let outcome = score(&[success("solo", DocumentAnalysisResult::default())], &[]);
        assert_eq!(outcome, DEFAULT_SELF_CONFIDENCE);
    }

    #[test]
    fn single_provider_self_report_is_capped() {
        let result = DocumentAnalysisResult {
            confidence: Some(1.0),
            ..Default::default()
        };
        assert_eq!(score(&[success("solo", result)], &[]), MAX_CONFIDENCE);
    }

    #[test]
    fn full_agreement_caps_at_max() {
        let a = typed(DocumentType::Invoice);
        let outcome = score(&[success("a", a.clone()), success("b", a)], &[]);
        // Unanimous across every scored field: raw ratio is 1.0, capped.
        assert_eq!(outcome, MAX_CONFIDENCE);
    }

    #[test]
    fn disagreement_lowers_the_score() {
        let agree = score(
            &[
                success("a", typed(DocumentType::Invoice)),
                success("b", typed(DocumentType::Invoice)),
            ],
            &[],
        );
        let disagree = score(
            &[
                success("a", typed(DocumentType::Invoice)),
                success("b", typed(DocumentType::Receipt)),
            ],
            &[],
        );
        assert!(disagree < agree);
        // One of four fields fully split between two providers:
        // (3 * 1.0 + 0.5) / 4 = 0.875.
        assert!((disagree - 0.875).abs() < 1e-6);
    }

    #[test]
    fn more_disagreement_scores_lower() {
        let mild = score(
            &[
                success("a", typed(DocumentType::Invoice)),
                success("b", typed(DocumentType::Receipt)),
            ],
            &[],
        );

        let mut with_amounts = typed(DocumentType::Invoice);
        with_amounts.amounts.push(Amount {
            value: 100.0,
            amount_type: "total".into(),
            currency: None,
            confidence: 0.9,
        });
        let worse = score(
            &[
                success("a", with_amounts),
                success("b", typed(DocumentType::Receipt)),
            ],
            &[],
        );
        assert!(worse < mild);
    }

    #[test]
    fn specialist_presence_boosts_score() {
        let a = typed(DocumentType::Invoice);
        let b = typed(DocumentType::Receipt);
        let without = score(&[success("a", a.clone()), success("b", b.clone())], &[]);
        let with = score(
            &[success("a", a), success("spec", b)],
            &["spec".to_string()],
        );
        assert!((with - without - SPECIALIST_BOOST).abs() < 1e-6);
    }

    #[test]
    fn boost_never_exceeds_max() {
        let a = typed(DocumentType::Invoice);
        let outcome = score(
            &[success("a", a.clone()), success("spec", a)],
            &["spec".to_string()],
        );
        assert_eq!(outcome, MAX_CONFIDENCE);
    }

    #[test]
    fn absent_fields_count_as_shared_null() {
        // Both providers omit every scored field: they "agree" on nothing
        // being present, which is still full agreement.
        let outcome = score(
            &[
                success("a", DocumentAnalysisResult::default()),
                success("b", DocumentAnalysisResult::default()),
            ],
            &[],
        );
        assert_eq!(outcome, MAX_CONFIDENCE);
    }
}
