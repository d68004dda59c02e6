//! Field-by-field consensus over successful provider analyses.
//!
//! Each field of [`DocumentAnalysisResult`] has its own merge rule:
//! majority vote for classifications, union for dates and entities,
//! first-occurrence dedup for amounts, specialist override for damage
//! assessments and anomalies. Per-provider values that did not survive the
//! merge are preserved as provider insights for audit.
//!
//! Merge order follows the order of the `successes` slice, which the
//! orchestrator keeps in selection-priority order. With that fixed, the
//! whole merge is deterministic.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use tracing::debug;

use crate::types::{
    Amount, Anomaly, Association, DamageAssessment, DocumentAnalysisResult, Entity,
    ProviderAnalysis, ProviderInsight, Severity, UniqueFinding, DOMAIN_CONTEXT_KEYS,
};

/// Fields excluded from insight extraction: confidence is stamped after the
/// merge and insights are themselves consensus-only.
const INSIGHT_EXCLUDED_FIELDS: &[&str] = &["confidence", "providerInsights"];

/// Merge one or more successful analyses into a single consensus result.
///
/// `specialists` names the providers that were selected as disaster
/// specialists; their damage assessments and anomaly lists override the
/// generalist merge when present.
///
/// A single success passes through verbatim. The slice must not be empty.
pub fn build_consensus(
    successes: &[ProviderAnalysis],
    specialists: &[String],
) -> DocumentAnalysisResult {
    debug_assert!(!successes.is_empty());

    if successes.len() == 1 {
        return successes[0].result.clone();
    }

    let results: Vec<&DocumentAnalysisResult> = successes.iter().map(|s| &s.result).collect();

    let mut consensus = DocumentAnalysisResult {
        document_type: majority_vote(results.iter().filter_map(|r| r.document_type)),
        category: majority_vote(results.iter().filter_map(|r| r.category.clone())),
        dates: results.iter().flat_map(|r| r.dates.iter().cloned()).collect(),
        amounts: merge_amounts(&results),
        entities: merge_entities(&results),
        damage_assessment: merge_damage(successes, specialists),
        anomalies: merge_anomalies(successes, specialists),
        suggested_name: longest_suggested_name(&results),
        associations: merge_associations(&results),
        domain_context: merge_domain_context(&results),
        confidence: None,
        provider_insights: Vec::new(),
    };
    consensus.provider_insights = extract_insights(successes, &consensus);
    consensus
}

/// Drop raw anomaly entries that do not conform to the [`Anomaly`] shape.
/// Providers occasionally emit prose or partial objects here; those are
/// filtered, never surfaced.
pub fn sanitize_anomalies(values: &[Value]) -> Vec<Anomaly> {
    values
        .iter()
        .filter_map(|value| match serde_json::from_value(value.clone()) {
            Ok(anomaly) => Some(anomaly),
            Err(err) => {
                debug!(error = %err, "dropping malformed anomaly entry");
                None
            }
        })
        .collect()
}

// ──────────────────────────────────────────────
// Field merge rules
// ──────────────────────────────────────────────

/// Most frequent value wins; ties go to the value seen first.
fn majority_vote<T: PartialEq>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut candidates: Vec<(T, usize)> = Vec::new();
    for value in values {
        match candidates.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => candidates.push((value, 1)),
        }
    }
    // Candidates are in first-seen order; only a strictly higher count may
    // displace the current winner, so ties stay with the earlier value.
    let mut winner: Option<(T, usize)> = None;
    for (value, count) in candidates {
        if winner.as_ref().map_or(true, |(_, best)| count > *best) {
            winner = Some((value, count));
        }
    }
    winner.map(|(value, _)| value)
}

/// First occurrence of each `(value, type)` pair wins, in provider order.
fn merge_amounts(results: &[&DocumentAnalysisResult]) -> Vec<Amount> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    for result in results {
        for amount in &result.amounts {
            if seen.insert(amount.dedup_key()) {
                merged.push(amount.clone());
            }
        }
    }
    merged
}

/// Union by role key; a later provider's entry replaces an earlier one.
fn merge_entities(results: &[&DocumentAnalysisResult]) -> BTreeMap<String, Entity> {
    let mut merged = BTreeMap::new();
    for result in results {
        merged.extend(result.entities.clone());
    }
    merged
}

/// First specialist assessment wins outright. Otherwise average the costs
/// and confidences, union the damage types, and vote on severity.
fn merge_damage(
    successes: &[ProviderAnalysis],
    specialists: &[String],
) -> Option<DamageAssessment> {
    if let Some(assessment) = successes
        .iter()
        .filter(|s| specialists.contains(&s.provider))
        .find_map(|s| s.result.damage_assessment.clone())
    {
        return Some(assessment);
    }

    let assessments: Vec<&DamageAssessment> = successes
        .iter()
        .filter_map(|s| s.result.damage_assessment.as_ref())
        .collect();
    if assessments.is_empty() {
        return None;
    }

    let n = assessments.len() as f64;
    let severity = majority_vote(assessments.iter().map(|a| a.severity))
        .unwrap_or(Severity::Minor);
    Some(DamageAssessment {
        severity,
        types: assessments
            .iter()
            .flat_map(|a| a.types.iter().cloned())
            .collect(),
        estimated_cost: assessments.iter().map(|a| a.estimated_cost).sum::<f64>() / n,
        confidence: assessments.iter().map(|a| a.confidence).sum::<f32>() / n as f32,
    })
}

/// A specialist's non-empty anomaly list replaces the generalist union.
fn merge_anomalies(successes: &[ProviderAnalysis], specialists: &[String]) -> Vec<Anomaly> {
    if let Some(list) = successes
        .iter()
        .filter(|s| specialists.contains(&s.provider))
        .map(|s| &s.result.anomalies)
        .find(|list| !list.is_empty())
    {
        return list.clone();
    }

    let mut merged: Vec<Anomaly> = Vec::new();
    for success in successes {
        for anomaly in &success.result.anomalies {
            if !merged.contains(anomaly) {
                merged.push(anomaly.clone());
            }
        }
    }
    merged
}

/// Keyed by `(type, id)`; the higher-confidence duplicate wins.
fn merge_associations(results: &[&DocumentAnalysisResult]) -> Vec<Association> {
    let mut merged: Vec<Association> = Vec::new();
    for result in results {
        for assoc in &result.associations {
            match merged
                .iter_mut()
                .find(|existing| existing.assoc_type == assoc.assoc_type && existing.id == assoc.id)
            {
                Some(existing) => {
                    if assoc.confidence > existing.confidence {
                        *existing = assoc.clone();
                    }
                }
                None => merged.push(assoc.clone()),
            }
        }
    }
    merged
}

/// Full canonical key set defaulted to `false`, then shallow-merged in
/// provider order: the last provider reporting a flag wins.
fn merge_domain_context(results: &[&DocumentAnalysisResult]) -> BTreeMap<String, bool> {
    let mut merged: BTreeMap<String, bool> = DOMAIN_CONTEXT_KEYS
        .iter()
        .map(|key| (key.to_string(), false))
        .collect();
    for result in results {
        for (key, value) in &result.domain_context {
            merged.insert(key.clone(), *value);
        }
    }
    merged
}

/// The longest suggestion is assumed the most descriptive.
fn longest_suggested_name(results: &[&DocumentAnalysisResult]) -> Option<String> {
    let mut best: Option<&String> = None;
    for result in results {
        if let Some(name) = &result.suggested_name {
            if best.map_or(true, |b| name.len() > b.len()) {
                best = Some(name);
            }
        }
    }
    best.cloned()
}

// ──────────────────────────────────────────────
// Provider insights
// ──────────────────────────────────────────────

/// Record, per provider, the fields where its result diverged from the
/// consensus. Empty/null provider values are not divergences.
fn extract_insights(
    successes: &[ProviderAnalysis],
    consensus: &DocumentAnalysisResult,
) -> Vec<ProviderInsight> {
    let consensus_value = match serde_json::to_value(consensus) {
        Ok(Value::Object(map)) => map,
        _ => return Vec::new(),
    };

    let mut insights = Vec::new();
    for success in successes {
        let provider_value = match serde_json::to_value(&success.result) {
            Ok(Value::Object(map)) => map,
            _ => continue,
        };
        let unique_findings: Vec<UniqueFinding> = provider_value
            .into_iter()
            .filter(|(field, value)| {
                !INSIGHT_EXCLUDED_FIELDS.contains(&field.as_str())
                    && !is_empty_value(value)
                    && consensus_value.get(field) != Some(value)
            })
            .map(|(field, value)| UniqueFinding { field, value })
            .collect();
        if !unique_findings.is_empty() {
            insights.push(ProviderInsight {
                provider: success.provider.clone(),
                unique_findings,
            });
        }
    }
    insights
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
