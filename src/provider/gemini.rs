//! Google Gemini generateContent adapter.
//!
//! Unlike the OpenAI-compatible backends, Gemini takes the document as an
//! `inline_data` part and the API key as a query parameter.

use base64::Engine as _;
use serde::Deserialize;

use super::{
    build_analysis_prompt, parse_analysis_payload, ProviderAdapter, ProviderMetadata,
    ANALYSIS_SYSTEM_PROMPT,
};
use crate::config::DEFAULT_PROVIDER_TIMEOUT_SECS;
use crate::error::ProviderError;
use crate::types::{AnalysisInput, DocumentAnalysisResult};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MODEL: &str = "gemini-1.5-pro";

static METADATA: ProviderMetadata = ProviderMetadata {
    name: "gemini",
    base_confidence: 0.80,
    specialties: &["policy", "legal", "report"],
};

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl GeminiProvider {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_GEMINI_BASE_URL, DEFAULT_PROVIDER_TIMEOUT_SECS)
    }

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

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

#[async_trait::async_trait]
impl ProviderAdapter for GeminiProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &METADATA
    }

    async fn analyze(
        &self,
        input: &AnalysisInput,
    ) -> Result<DocumentAnalysisResult, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, MODEL, self.api_key
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(input.document.as_slice());
        let prompt = format!("{ANALYSIS_SYSTEM_PROMPT}\n\n{}", build_analysis_prompt(input));

        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    {
                        "inline_data": {
                            "mime_type": input.mime_type,
                            "data": encoded
                        }
                    }
                ]
            }],
            "generationConfig": {
                "temperature": 0,
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| {
                ProviderError::MalformedResponse("response had no candidates".into())
            })?;

        parse_analysis_payload(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_declares_complex_document_specialties() {
        let provider = GeminiProvider::new("key");
        let meta = provider.metadata();
        assert_eq!(meta.name, "gemini");
        assert!(meta.specialties.contains(&"legal"));
        assert!(!meta.is_disaster_specialist());
    }

    #[test]
    fn candidate_response_deserializes() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "{\"documentType\": \"policy\"}"}]}}
            ]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert!(parsed.candidates[0].content.parts[0].text.contains("policy"));
    }
}
