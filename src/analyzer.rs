//! Top-level analysis orchestrator.
//!
//! Ties the pipeline together: select adapters for the document, dispatch
//! to all of them concurrently, merge the successes into a consensus, and
//! stamp the cross-provider agreement score onto it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, info_span, Instrument};

use crate::config::CredentialStore;
use crate::consensus::build_consensus;
use crate::dispatch::dispatch;
use crate::error::OrchestrationError;
use crate::registry::ProviderRegistry;
use crate::confidence;
use crate::types::{AnalysisConsensus, AnalysisInput};

/// Multi-provider document analyzer. Cheap to share behind an `Arc`.
pub struct DocumentAnalyzer {
    registry: ProviderRegistry,
}

impl DocumentAnalyzer {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Wire up the stock adapters for every credential present.
    pub fn from_credentials(credentials: &CredentialStore) -> Self {
        Self::new(ProviderRegistry::from_credentials(credentials))
    }

    /// Analyze one document with no overall deadline.
    pub async fn analyze(
        &self,
        input: AnalysisInput,
    ) -> Result<AnalysisConsensus, OrchestrationError> {
        self.analyze_with_deadline(input, None).await
    }

    /// Analyze one document, bounding the provider fan-out by `deadline`.
    ///
    /// Fails only when no selected provider produced a usable result;
    /// individual provider failures are absorbed into the consensus path.
    pub async fn analyze_with_deadline(
        &self,
        input: AnalysisInput,
        deadline: Option<Duration>,
    ) -> Result<AnalysisConsensus, OrchestrationError> {
        let span = info_span!(
            "document_analysis",
            mime_type = %input.mime_type,
            size = input.document.len(),
        );
        async move {
            let started = Instant::now();

            let selected = self
                .registry
                .select(input.document_type_hint, input.domain_hints);
            let attempted = selected.len();
            let specialists: Vec<String> = selected
                .iter()
                .filter(|a| a.metadata().is_disaster_specialist())
                .map(|a| a.metadata().name.to_string())
                .collect();
            info!(
                providers = attempted,
                specialists = specialists.len(),
                "dispatching analysis"
            );

            let outcomes = dispatch(&selected, Arc::new(input), deadline).await;
            let successes: Vec<_> = outcomes
                .into_iter()
                .filter(|outcome| outcome.is_success())
                .collect();
            if successes.is_empty() {
                return Err(OrchestrationError::AllProvidersFailed { attempted });
            }

            let mut consensus = build_consensus(&successes, &specialists);
            let confidence = confidence::score(&successes, &specialists);
            consensus.confidence = Some(confidence);

            let processing_time_ms = started.elapsed().as_millis() as u64;
            info!(
                successes = successes.len(),
                confidence,
                processing_time_ms,
                "analysis complete"
            );
            Ok(AnalysisConsensus {
                consensus,
                providers: successes,
                confidence,
                processing_time_ms,
            })
        }
        .instrument(span)
        .await
    }

    /// Adapters currently registered, in registration order.
    pub fn provider_count(&self) -> usize {
        self.registry.len()
    }
}
