//! Provider adapters — uniform wrappers around external AI backends.
//!
//! Each adapter encodes the document for its backend's transport, builds
//! the backend-specific request (including hint payload), invokes the
//! backend with a bounded timeout, and parses the response into a
//! [`DocumentAnalysisResult`]. Adapters declare static metadata used only
//! by the selector: name, a prior reliability weight, and specialty tags.

pub mod gemini;
pub mod grok;
pub mod openai;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::consensus::sanitize_anomalies;
use crate::error::ProviderError;
use crate::types::{
    AnalysisInput, DamageAssessment, DocumentAnalysisResult, DocumentType, Entity,
};

pub use gemini::GeminiProvider;
pub use grok::GrokProvider;
pub use openai::OpenAiProvider;

/// Specialty tag that marks an adapter as the disaster specialist.
pub const DISASTER_TAG: &str = "disaster";

// ──────────────────────────────────────────────
// Adapter contract
// ──────────────────────────────────────────────

/// Static adapter metadata, used only by the selector.
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub name: &'static str,
    /// Prior reliability weight; higher ranks earlier in default selection.
    pub base_confidence: f32,
    /// Document-type/domain tags the adapter is strong at.
    pub specialties: &'static [&'static str],
}

impl ProviderMetadata {
    pub fn is_disaster_specialist(&self) -> bool {
        self.specialties.contains(&DISASTER_TAG)
    }
}

/// Uniform interface over one AI backend (allows mocking).
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn metadata(&self) -> &ProviderMetadata;

    /// Analyze one document. A response that cannot be parsed as valid
    /// structured data is an error, not a best-effort partial result.
    async fn analyze(
        &self,
        input: &AnalysisInput,
    ) -> Result<DocumentAnalysisResult, ProviderError>;
}

// ──────────────────────────────────────────────
// Shared prompt
// ──────────────────────────────────────────────

pub(crate) const ANALYSIS_SYSTEM_PROMPT: &str = "\
You are an insurance-claim document analyst. Examine the attached document \
image and respond with a single JSON object, no prose.";

const ANALYSIS_SCHEMA_PROMPT: &str = "\
Analyze the document and return JSON with these optional fields: \
documentType (one of invoice, receipt, policy, contract, report, legal, medical, general), \
category (free text, e.g. \"repair\"), \
dates (array of YYYY-MM-DD strings found in the document), \
amounts (array of {value, type, currency, confidence}), \
entities (object mapping role, e.g. \"contractor\", to {type, value, confidence}), \
damageAssessment ({severity: minor|moderate|severe|catastrophic, types, estimatedCost, confidence}), \
anomalies (array of {type, description, confidence, severity: low|medium|high}), \
suggestedName (a descriptive filename), \
associations (array of {type, id, confidence}), \
domainContext (object of boolean flags such as hurricane_related, flood_related), \
confidence (overall 0-1). Omit fields you cannot detect.";

/// Build the analysis prompt, appending a hint clause when the caller
/// supplied typed hints.
pub(crate) fn build_analysis_prompt(input: &AnalysisInput) -> String {
    let mut prompt = ANALYSIS_SCHEMA_PROMPT.to_string();

    if let Some(hint) = input.document_type_hint {
        let tag = serde_json::to_value(hint)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        prompt.push_str(&format!(" The caller believes this is a {tag} document."));
    }
    if input.domain_hints.hurricane {
        prompt.push_str(" Context: this document relates to a hurricane claim.");
    }
    if input.domain_hints.flood {
        prompt.push_str(" Context: this document relates to a flood claim.");
    }

    prompt
}

// ──────────────────────────────────────────────
// Response parsing
// ──────────────────────────────────────────────

/// Parse a backend's text response into a [`DocumentAnalysisResult`].
///
/// The JSON object may be bare or wrapped in a ```json fence. Individual
/// list entries that fail to deserialize are skipped; a response without a
/// parseable object at all is a [`ProviderError::MalformedResponse`].
pub(crate) fn parse_analysis_payload(
    text: &str,
) -> Result<DocumentAnalysisResult, ProviderError> {
    let json_str = extract_json_object(text)?;

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RawPayload {
        document_type: Option<Value>,
        category: Option<String>,
        dates: Option<Vec<Value>>,
        amounts: Option<Vec<Value>>,
        entities: Option<serde_json::Map<String, Value>>,
        damage_assessment: Option<Value>,
        anomalies: Option<Vec<Value>>,
        suggested_name: Option<String>,
        associations: Option<Vec<Value>>,
        domain_context: Option<serde_json::Map<String, Value>>,
        confidence: Option<f32>,
    }

    let raw: RawPayload = serde_json::from_str(&json_str)
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    let mut result = DocumentAnalysisResult {
        document_type: raw
            .document_type
            .and_then(|v| serde_json::from_value::<DocumentType>(v).ok()),
        category: raw.category,
        amounts: parse_array_lenient(raw.amounts.as_deref()),
        damage_assessment: raw
            .damage_assessment
            .and_then(|v| serde_json::from_value::<DamageAssessment>(v).ok()),
        anomalies: sanitize_anomalies(raw.anomalies.as_deref().unwrap_or_default()),
        suggested_name: raw.suggested_name,
        associations: parse_array_lenient(raw.associations.as_deref()),
        confidence: raw.confidence.map(|c| c.clamp(0.0, 1.0)),
        ..Default::default()
    };

    // Keep only well-formed ISO dates.
    for value in raw.dates.unwrap_or_default() {
        if let Some(date) = value.as_str() {
            if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() {
                result.dates.insert(date.to_string());
            }
        }
    }

    for (role, value) in raw.entities.unwrap_or_default() {
        if let Ok(entity) = serde_json::from_value::<Entity>(value) {
            result.entities.insert(role, entity);
        }
    }

    for (flag, value) in raw.domain_context.unwrap_or_default() {
        if let Some(b) = value.as_bool() {
            result.domain_context.insert(flag, b);
        }
    }

    Ok(result)
}

/// Extract the JSON object from a response that may wrap it in a
/// ```json fence or surround it with prose.
fn extract_json_object(text: &str) -> Result<String, ProviderError> {
    if let Some(fence_start) = text.find("```json") {
        let content_start = fence_start + 7;
        if let Some(fence_end) = text[content_start..].find("```") {
            return Ok(text[content_start..content_start + fence_end]
                .trim()
                .to_string());
        }
        return Err(ProviderError::MalformedResponse(
            "unclosed JSON fence".into(),
        ));
    }

    let start = text
        .find('{')
        .ok_or_else(|| ProviderError::MalformedResponse("no JSON object found".into()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| ProviderError::MalformedResponse("no JSON object found".into()))?;
    if end < start {
        return Err(ProviderError::MalformedResponse(
            "no JSON object found".into(),
        ));
    }
    Ok(text[start..=end].to_string())
}

/// Parse an array leniently — skip items that fail to deserialize.
fn parse_array_lenient<T: for<'de> Deserialize<'de>>(items: Option<&[Value]>) -> Vec<T> {
    match items {
        None => vec![],
        Some(arr) => arr
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
    }
}

// ──────────────────────────────────────────────
// OpenAI-compatible chat plumbing (openai, grok)
// ──────────────────────────────────────────────

/// Build an OpenAI-compatible chat-completions body carrying the prompt
/// and the base64-encoded document as an inline image.
pub(crate) fn chat_completion_body(
    model: &str,
    prompt: &str,
    mime_type: &str,
    base64_document: &str,
) -> Value {
    serde_json::json!({
        "model": model,
        "temperature": 0,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": ANALYSIS_SYSTEM_PROMPT },
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:{mime_type};base64,{base64_document}")
                        }
                    }
                ]
            }
        ]
    })
}

#[derive(Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Deserialize)]
pub(crate) struct ChatMessage {
    pub content: String,
}

impl ChatCompletionResponse {
    /// First choice's content, or a malformed-response error.
    pub(crate) fn content(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("response had no choices".into()))
    }
}

// ──────────────────────────────────────────────
// MockProvider (testing)
// ──────────────────────────────────────────────

/// Mock adapter for tests — returns a configured result or failure,
/// optionally after a delay.
pub struct MockProvider {
    metadata: ProviderMetadata,
    result: Option<DocumentAnalysisResult>,
    error_message: String,
    delay: Option<std::time::Duration>,
}

impl MockProvider {
    pub fn succeeding(
        name: &'static str,
        base_confidence: f32,
        result: DocumentAnalysisResult,
    ) -> Self {
        Self {
            metadata: ProviderMetadata {
                name,
                base_confidence,
                specialties: &[],
            },
            result: Some(result),
            error_message: String::new(),
            delay: None,
        }
    }

    pub fn failing(name: &'static str, base_confidence: f32, message: &str) -> Self {
        Self {
            metadata: ProviderMetadata {
                name,
                base_confidence,
                specialties: &[],
            },
            result: None,
            error_message: message.to_string(),
            delay: None,
        }
    }

    pub fn with_specialties(mut self, specialties: &'static [&'static str]) -> Self {
        self.metadata.specialties = specialties;
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn analyze(
        &self,
        _input: &AnalysisInput,
    ) -> Result<DocumentAnalysisResult, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.result {
            Some(result) => Ok(result.clone()),
            None => Err(ProviderError::Transport(self.error_message.clone())),
        }
    }
}
