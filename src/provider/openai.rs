//! OpenAI chat-completions vision adapter.

use base64::Engine as _;

use super::{
    build_analysis_prompt, chat_completion_body, parse_analysis_payload, ChatCompletionResponse,
    ProviderAdapter, ProviderMetadata,
};
use crate::config::DEFAULT_PROVIDER_TIMEOUT_SECS;
use crate::error::ProviderError;
use crate::types::{AnalysisInput, DocumentAnalysisResult};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const MODEL: &str = "gpt-4o";

static METADATA: ProviderMetadata = ProviderMetadata {
    name: "openai",
    base_confidence: 0.85,
    specialties: &["invoice", "receipt", "contract", "general"],
};

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl OpenAiProvider {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_OPENAI_BASE_URL, DEFAULT_PROVIDER_TIMEOUT_SECS)
    }

    /// Endpoint and timeout are configuration-injected, not contract.
    pub fn with_base_url(api_key: &str, base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout_secs,
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &METADATA
    }

    async fn analyze(
        &self,
        input: &AnalysisInput,
    ) -> Result<DocumentAnalysisResult, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let encoded = base64::engine::general_purpose::STANDARD.encode(input.document.as_slice());
        let prompt = build_analysis_prompt(input);
        let body = chat_completion_body(MODEL, &prompt, &input.mime_type, &encoded);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        parse_analysis_payload(&parsed.content()?)
    }
}
