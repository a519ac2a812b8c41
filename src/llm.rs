use crate::config::AppConfig;
use crate::error::GenerateError;
use crate::sections::{self, SectionValue};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub const MIN_SOURCE_CHARS: usize = 100;

const PROMPT_TEMPLATE: &str = r#"=== SECTION 1: ASSISTANT TASK ===
You are an analytical assistant. Analyze the text below and RETURN A SINGLE VALID JSON OBJECT with exactly three keys:
  1. "summary" (string): a concise, coherent summary of the entire text.
  2. "conclusions" (array[string]): a list of discrete, key conclusions drawn from the text.
  3. "keyData" (array[string]): every critical data point as a list of separate items.

=== SECTION 2: MANDATORY CONTENT ===
You MUST NOT OMIT any information about:
  • Dates: exact days, months, years, or time ranges
  • Amounts: quantities, currencies, units
  • Tasks & Actions: what needs to be done
  • Decisions: what decisions remain to be made
  • Deadlines: final dates or timeframes
  • Responsibilities: people, departments, or roles in charge
  • Locations: venues, addresses, or places
  • Reference IDs: numbers, codes, or identifiers
  • Conditions & Requirements: execution criteria, prerequisites, or KPIs

Each item in keyData must include its full context, for example:
  - "project deadline – 30 April 2025"
  - "budget increase request – 200 000 EUR"
  - "John Kowalski (IT Dept.) – responsible for server upgrade"

=== SECTION 3: TEXT TO ANALYZE ===
---
{text}
---

IMPORTANT NOTES:
1. ONLY output the JSON object, no extra comments and no wrapper text.
2. The JSON MUST be syntactically valid.
3. The JSON values (strings, arrays) MUST be in {language}.
4. keyData must be an array of strings, NOT a single string."#;

/// Preview returned by the model, before the user edits it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    pub original_text: String,
    pub summary: String,
    pub conclusions: SectionValue,
    pub key_data: SectionValue,
}

pub fn build_prompt(original_text: &str, language: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{language}", language)
        .replace("{text}", original_text)
}

fn request_headers(api_key: &str) -> Result<HeaderMap, GenerateError> {
    let mut headers = HeaderMap::new();
    let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
        .map_err(|_| GenerateError::InvalidApiKey)?;
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn map_api_error(status: reqwest::StatusCode, body: &str) -> GenerateError {
    let message = match status.as_u16() {
        401 => "Invalid API key. Check the key in config.json or OPENAI_API_KEY.".to_string(),
        402 => "Insufficient credits on the AI account.".to_string(),
        429 => "Rate limited. Please wait a moment and try again.".to_string(),
        400 if body.contains("model_not_found") || body.contains("does not exist") => {
            "Model not found. Check the model name in config.json.".to_string()
        }
        500 | 502 | 503 => "The AI service is temporarily unavailable. Try again in a moment.".to_string(),
        _ => format!("API error ({}): {}", status, body),
    };
    GenerateError::Api {
        status: status.as_u16(),
        message,
    }
}

fn request_body(config: &AppConfig, prompt: &str) -> Value {
    json!({
        "model": config.model,
        "messages": [
            {"role": "system", "content": prompt},
        ],
        "temperature": 0.5,
        "response_format": {"type": "json_object"},
    })
}

/// Text of the first choice of a chat completion response.
fn completion_content(response: &Value) -> Result<&str, GenerateError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .filter(|content| !content.trim().is_empty())
        .ok_or(GenerateError::EmptyContent)
}

fn section_field(payload: &Value, field: &'static str) -> Result<SectionValue, GenerateError> {
    let invalid = || GenerateError::InvalidField {
        field,
        expected: "a string or an array of strings",
    };
    match &payload[field] {
        Value::String(text) => Ok(SectionValue::Text(sections::strip_marker(text.trim()).to_string())),
        Value::Array(values) => values
            .iter()
            .map(|v| v.as_str().map(|item| sections::strip_marker(item.trim()).to_string()).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()
            .map(SectionValue::Items),
        _ => Err(invalid()),
    }
}

/// Validate the model's JSON payload and normalize it into a preview.
pub fn parse_generation(content: &str, original_text: &str) -> Result<GeneratedReport, GenerateError> {
    let payload: Value = serde_json::from_str(content).map_err(GenerateError::MalformedJson)?;

    let summary = payload["summary"]
        .as_str()
        .ok_or(GenerateError::InvalidField {
            field: "summary",
            expected: "a string",
        })?
        .trim()
        .to_string();

    Ok(GeneratedReport {
        original_text: original_text.to_string(),
        summary,
        conclusions: section_field(&payload, "conclusions")?,
        key_data: section_field(&payload, "keyData")?,
    })
}

pub async fn generate_report_preview(config: &AppConfig, original_text: &str) -> Result<GeneratedReport, GenerateError> {
    let actual = original_text.trim().chars().count();
    if actual < MIN_SOURCE_CHARS {
        return Err(GenerateError::SourceTooShort {
            min: MIN_SOURCE_CHARS,
            actual,
        });
    }
    if !config.api_key_set() {
        tracing::error!("generation requested without an API key");
        return Err(GenerateError::MissingApiKey);
    }

    let headers = request_headers(&config.api_key)?;
    let prompt = build_prompt(original_text, &config.output_language);
    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    tracing::info!(model = %config.model, chars = actual, "requesting report generation");
    let response = client
        .post(&config.api_url)
        .headers(headers)
        .json(&request_body(config, &prompt))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        tracing::error!(status = status.as_u16(), body = %error_text, "generation request failed");
        return Err(map_api_error(status, &error_text));
    }

    let result: Value = response.json().await?;
    let content = completion_content(&result)?;
    let report = parse_generation(content, original_text).inspect_err(|e| {
        tracing::warn!(error = %e, "model returned an unusable payload");
    })?;
    tracing::info!(status = status.as_u16(), "report generated");
    Ok(report)
}
