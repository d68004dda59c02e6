use thiserror::Error;

/// Per-adapter failure. Always recovered locally by the dispatch engine
/// into a `ProviderAnalysis.error` — never propagated out of orchestration.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("provider quota exceeded")]
    QuotaExceeded,

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("cancelled before completion")]
    Cancelled,
}

impl ProviderError {
    /// Classify a reqwest error the way the backends distinguish them:
    /// timeouts and connection failures are named, the rest is transport.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout { secs: timeout_secs }
        } else if err.is_connect() {
            ProviderError::Transport(format!("connection failed: {err}"))
        } else {
            ProviderError::Transport(err.to_string())
        }
    }

    /// Classify a non-2xx upstream status. 429 is quota exhaustion.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        if status == 429 {
            ProviderError::QuotaExceeded
        } else {
            ProviderError::Upstream { status, body }
        }
    }
}

/// The only fatal orchestration condition: every selected provider failed.
/// All other error information is preserved per-provider for observability
/// without failing the call.
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("all {attempted} selected providers failed")]
    AllProvidersFailed { attempted: usize },
}
