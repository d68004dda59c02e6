//! Concurrent provider dispatch.
//!
//! Fans one analysis input out to every selected adapter at once and waits
//! for all of them to settle. A failing adapter never aborts the batch: its
//! outcome is recorded as a failed [`ProviderAnalysis`] and the rest keep
//! running. Results come back in selection order regardless of which
//! adapter finished first.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{info_span, warn, Instrument};

use crate::error::ProviderError;
use crate::provider::ProviderAdapter;
use crate::types::{AnalysisInput, ProviderAnalysis};

/// Run `input` against every adapter concurrently and collect all outcomes.
///
/// `deadline` bounds the whole batch: adapters still running when it fires
/// are aborted and recorded as cancelled failures.
pub async fn dispatch(
    adapters: &[Arc<dyn ProviderAdapter>],
    input: Arc<AnalysisInput>,
    deadline: Option<Duration>,
) -> Vec<ProviderAnalysis> {
    let deadline_at = deadline.map(|d| Instant::now() + d);

    let handles: Vec<_> = adapters
        .iter()
        .map(|adapter| {
            let adapter = Arc::clone(adapter);
            let input = Arc::clone(&input);
            let name = adapter.metadata().name;
            tokio::spawn(
                async move { run_provider(adapter.as_ref(), &input).await }
                    .instrument(info_span!("provider_analysis", provider = name)),
            )
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (handle, adapter) in handles.into_iter().zip(adapters) {
        let name = adapter.metadata().name;
        let abort = handle.abort_handle();
        let outcome = match await_settled(handle, deadline_at).await {
            Ok(Ok(analysis)) => analysis,
            Ok(Err(join_err)) => {
                warn!(provider = name, error = %join_err, "provider task panicked");
                failure(name, &ProviderError::Transport(join_err.to_string()))
            }
            Err(_) => {
                abort.abort();
                warn!(provider = name, "provider aborted at batch deadline");
                failure(name, &ProviderError::Cancelled)
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

async fn await_settled(
    handle: tokio::task::JoinHandle<ProviderAnalysis>,
    deadline_at: Option<Instant>,
) -> Result<Result<ProviderAnalysis, tokio::task::JoinError>, tokio::time::error::Elapsed> {
    match deadline_at {
        Some(at) => timeout_at(at, handle).await,
        None => Ok(handle.await),
    }
}

async fn run_provider(adapter: &dyn ProviderAdapter, input: &AnalysisInput) -> ProviderAnalysis {
    let name = adapter.metadata().name;
    let started = Instant::now();
    match adapter.analyze(input).await {
        Ok(result) => ProviderAnalysis {
            provider: name.to_string(),
            result,
            processing_time_ms: started.elapsed().as_millis() as u64,
            error: None,
        },
        Err(err) => {
            warn!(provider = name, error = %err, "provider analysis failed");
            ProviderAnalysis {
                provider: name.to_string(),
                result: Default::default(),
                processing_time_ms: started.elapsed().as_millis() as u64,
                error: Some(err.to_string()),
            }
        }
    }
}

fn failure(name: &str, err: &ProviderError) -> ProviderAnalysis {
    ProviderAnalysis {
        provider: name.to_string(),
        result: Default::default(),
        processing_time_ms: 0,
        error: Some(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use crate::types::{DocumentAnalysisResult, DocumentType};

    fn input() -> Arc<AnalysisInput> {
        Arc::new(AnalysisInput::new(vec![1, 2, 3], "application/pdf"))
    }

    fn result_with_type(doc_type: DocumentType) -> DocumentAnalysisResult {
        DocumentAnalysisResult {
            document_type: Some(doc_type),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn all_successes_settle_in_selection_order() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(
                MockProvider::succeeding("slow", 0.8, result_with_type(DocumentType::Invoice))
                    .with_delay(Duration::from_millis(50)),
            ),
            Arc::new(MockProvider::succeeding(
                "fast",
                0.8,
                result_with_type(DocumentType::Receipt),
            )),
        ];

        let outcomes = dispatch(&adapters, input(), None).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].provider, "slow");
        assert_eq!(outcomes[1].provider, "fast");
        assert!(outcomes.iter().all(ProviderAnalysis::is_success));
    }

    #[tokio::test]
    async fn failure_is_isolated_from_other_providers() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(MockProvider::failing("broken", 0.8, "connection refused")),
            Arc::new(MockProvider::succeeding(
                "ok",
                0.8,
                result_with_type(DocumentType::Invoice),
            )),
        ];

        let outcomes = dispatch(&adapters, input(), None).await;
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_success());
        assert!(outcomes[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("connection refused")));
        assert!(outcomes[1].is_success());
        assert_eq!(
            outcomes[1].result.document_type,
            Some(DocumentType::Invoice)
        );
    }

    #[tokio::test]
    async fn all_failures_still_yield_one_outcome_each() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(MockProvider::failing("a", 0.8, "down")),
            Arc::new(MockProvider::failing("b", 0.7, "also down")),
        ];

        let outcomes = dispatch(&adapters, input(), None).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| !o.is_success()));
    }

    #[tokio::test]
    async fn deadline_cancels_stragglers() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(MockProvider::succeeding(
                "quick",
                0.8,
                result_with_type(DocumentType::Invoice),
            )),
            Arc::new(
                MockProvider::succeeding("stuck", 0.8, result_with_type(DocumentType::Receipt))
                    .with_delay(Duration::from_secs(30)),
            ),
        ];

        let outcomes = dispatch(&adapters, input(), Some(Duration::from_millis(100))).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_success());
        assert!(!outcomes[1].is_success());
        assert!(outcomes[1]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("cancelled")));
    }

    #[tokio::test]
    async fn empty_adapter_list_yields_no_outcomes() {
        let outcomes = dispatch(&[], input(), None).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn records_processing_time() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![Arc::new(
            MockProvider::succeeding("timed", 0.8, result_with_type(DocumentType::Invoice))
                .with_delay(Duration::from_millis(20)),
        )];

        let outcomes = dispatch(&adapters, input(), None).await;
        assert!(outcomes[0].processing_time_ms >= 20);
    }
}
