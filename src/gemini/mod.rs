//! Google Generative Language API client (generateContent plus the file
//! store used for uploaded audio).
//!
//! All HTTP-level failures are classified here, once, into [`GeminiError`];
//! strategies map those onto outcomes without ever inspecting messages.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::json;

const BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model tiers exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Faster and cheaper.
    Flash,
    /// Better quality, the default.
    #[default]
    Pro,
}

impl ModelTier {
    pub fn model_id(&self) -> &'static str {
        match self {
            ModelTier::Flash => "gemini-2.5-flash",
            ModelTier::Pro => "gemini-2.5-pro",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelTier::Flash => f.write_str("flash"),
            ModelTier::Pro => f.write_str("pro"),
        }
    }
}

/// Classified API failure.
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    /// Overloaded or rate limited; safe to retry.
    #[error("service overloaded: {0}")]
    Overloaded(String),

    /// The input exceeds the model's token budget.
    #[error("input too large: {0}")]
    InputTooLarge(String),

    /// Transport failure (DNS, TLS, timeout); safe to retry.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Anything the API rejects outright: bad key, bad request, failed
    /// remote processing.
    #[error("api error: {0}")]
    Api(String),
}

/// Handle to a file in the service's file store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Resource name, `files/...`.
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: FileState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    #[default]
    Processing,
    Active,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model_id: &'static str,
}

impl GeminiClient {
    pub fn new(api_key: String, model: ModelTier, request_timeout: Duration) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            model_id: model.model_id(),
        })
    }

    pub fn model_id(&self) -> &str {
        self.model_id
    }

    /// Ask the model to process a remote video URL directly.
    pub async fn generate_from_video_url(
        &self,
        video_url: &str,
        instruction: &str,
    ) -> Result<String, GeminiError> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": instruction },
                    { "file_data": { "file_uri": video_url } },
                ]
            }]
        });
        self.generate(body).await
    }

    /// Ask the model to process a previously uploaded file.
    pub async fn generate_from_file(
        &self,
        file: &RemoteFile,
        instruction: &str,
    ) -> Result<String, GeminiError> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": instruction },
                    { "file_data": { "mime_type": file.mime_type, "file_uri": file.uri } },
                ]
            }]
        });
        self.generate(body).await
    }

    async fn generate(&self, body: serde_json::Value) -> Result<String, GeminiError> {
        let url = format!("{BASE_URL}/v1beta/models/{}:generateContent", self.model_id);
        tracing::debug!(model = self.model_id, "sending generateContent request");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let payload = response.text().await?;
        if !status.is_success() {
            return Err(classify_api_error(status, &payload));
        }
        extract_text(&payload)
    }

    /// Upload a local file through the two-step resumable protocol.
    pub async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<RemoteFile, GeminiError> {
        let content =
            fs_err::read(path).map_err(|e| GeminiError::Api(format!("could not read upload source: {e}")))?;
        let display_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("audio");

        // Step 1: open a resumable upload session.
        let response = self
            .http
            .post(format!("{BASE_URL}/upload/v1beta/files"))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", content.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let payload = response.text().await?;
            return Err(classify_api_error(status, &payload));
        }
        let upload_url = response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| {
                GeminiError::Api("upload session response missing x-goog-upload-url".to_string())
            })?;

        // Step 2: send the bytes and finalize in one request.
        tracing::debug!(bytes = content.len(), mime_type, "uploading file content");
        let response = self
            .http
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(content)
            .send()
            .await?;
        let status = response.status();
        let payload = response.text().await?;
        if !status.is_success() {
            return Err(classify_api_error(status, &payload));
        }
        let envelope: UploadEnvelope = serde_json::from_str(&payload)
            .map_err(|e| GeminiError::Api(format!("unexpected upload response: {e}")))?;
        Ok(envelope.file)
    }

    /// Current state of an uploaded file.
    pub async fn file_status(&self, name: &str) -> Result<RemoteFile, GeminiError> {
        let response = self
            .http
            .get(format!("{BASE_URL}/v1beta/{name}"))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let status = response.status();
        let payload = response.text().await?;
        if !status.is_success() {
            return Err(classify_api_error(status, &payload));
        }
        serde_json::from_str(&payload)
            .map_err(|e| GeminiError::Api(format!("unexpected file status response: {e}")))
    }

    /// Poll until the uploaded file is ready, bounded by `interval` between
    /// checks and an overall `timeout`. Exceeding the timeout is an API
    /// error, not a transient one.
    pub async fn wait_until_active(
        &self,
        file: &RemoteFile,
        interval: Duration,
        timeout: Duration,
    ) -> Result<RemoteFile, GeminiError> {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        progress.set_message("Waiting for remote processing...");

        let start_time = tokio::time::Instant::now();
        let mut check_count = 0;
        let mut current = file.clone();

        loop {
            match current.state {
                FileState::Active => {
                    progress.finish_with_message("Remote processing complete");
                    return Ok(current);
                }
                FileState::Failed => {
                    progress.finish_with_message("Remote processing failed");
                    return Err(GeminiError::Api(format!(
                        "remote processing of {} failed",
                        current.name
                    )));
                }
                FileState::Processing | FileState::Unknown => {
                    if start_time.elapsed() >= timeout {
                        progress.finish_with_message("Remote processing timed out");
                        return Err(GeminiError::Api(format!(
                            "uploaded file {} was not ready within {}s",
                            current.name,
                            timeout.as_secs()
                        )));
                    }
                    check_count += 1;
                    progress.set_message(format!(
                        "Waiting for remote processing... ({}s elapsed, check #{})",
                        start_time.elapsed().as_secs(),
                        check_count
                    ));
                    tokio::time::sleep(interval).await;
                    current = self.file_status(&current.name).await?;
                }
            }
        }
    }

    /// Delete an uploaded file from the remote store.
    pub async fn delete_file(&self, name: &str) -> Result<(), GeminiError> {
        let response = self
            .http
            .delete(format!("{BASE_URL}/v1beta/{name}"))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let payload = response.text().await?;
            return Err(classify_api_error(status, &payload));
        }
        Ok(())
    }
}

/// Map a non-success API response onto [`GeminiError`].
///
/// Overload and rate-limit responses (429, 5xx, UNAVAILABLE,
/// RESOURCE_EXHAUSTED) are retryable; a 400 complaining about the token
/// budget marks the input as too large; everything else is a plain API
/// error.
fn classify_api_error(status: reqwest::StatusCode, body: &str) -> GeminiError {
    let parsed = error_details(body);
    let message = parsed
        .as_ref()
        .map(|details| details.message.clone())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| truncate_body(body));
    let grpc_status = parsed.map(|details| details.status).unwrap_or_default();

    if matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
        || grpc_status == "UNAVAILABLE"
        || grpc_status == "RESOURCE_EXHAUSTED"
    {
        return GeminiError::Overloaded(format!("HTTP {}: {message}", status.as_u16()));
    }
    if status.as_u16() == 400 && is_token_budget_message(&message) {
        return GeminiError::InputTooLarge(message);
    }
    GeminiError::Api(format!("HTTP {}: {message}", status.as_u16()))
}

fn is_token_budget_message(message: &str) -> bool {
    message.contains("exceeds the maximum number of tokens")
        || message.contains("token count exceeds")
        || message.contains("too large")
}

fn error_details(body: &str) -> Option<ErrorBody> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error)
}

fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.len() <= LIMIT {
        return body.to_string();
    }
    let cut: String = body.chars().take(LIMIT).collect();
    format!("{cut}...")
}

/// Pull the concatenated text parts out of a generateContent response.
fn extract_text(payload: &str) -> Result<String, GeminiError> {
    let response: GenerateContentResponse = serde_json::from_str(payload)
        .map_err(|e| GeminiError::Api(format!("unexpected generateContent response: {e}")))?;
    let text: String = response
        .candidates
        .into_iter()
        .flat_map(|candidate| candidate.content.map(|content| content.parts).unwrap_or_default())
        .filter_map(|part| part.text)
        .collect();
    if text.is_empty() {
        return Err(GeminiError::Api(
            "generateContent response contained no text".to_string(),
        ));
    }
    Ok(text)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    file: RemoteFile,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn overload_response_is_retryable() {
        let body = r#"{"error":{"code":503,"message":"The model is overloaded. Please try again later.","status":"UNAVAILABLE"}}"#;
        let error = classify_api_error(status(503), body);
        assert!(matches!(error, GeminiError::Overloaded(_)), "{error:?}");
    }

    #[test]
    fn rate_limit_is_retryable() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            classify_api_error(status(429), body),
            GeminiError::Overloaded(_)
        ));
    }

    #[test]
    fn token_budget_rejection_is_input_too_large() {
        let body = r#"{"error":{"code":400,"message":"The input video exceeds the maximum number of tokens.","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            classify_api_error(status(400), body),
            GeminiError::InputTooLarge(_)
        ));
    }

    #[test]
    fn bad_api_key_is_a_plain_api_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let error = classify_api_error(status(400), body);
        assert!(matches!(error, GeminiError::Api(_)), "{error:?}");
    }

    #[test]
    fn permission_denied_is_a_plain_api_error() {
        let body = r#"{"error":{"code":403,"message":"Permission denied","status":"PERMISSION_DENIED"}}"#;
        assert!(matches!(
            classify_api_error(status(403), body),
            GeminiError::Api(_)
        ));
    }

    #[test]
    fn unparseable_error_body_falls_back_to_raw_text() {
        let error = classify_api_error(status(500), "<html>Internal error</html>");
        match error {
            GeminiError::Overloaded(message) => assert!(message.contains("Internal error")),
            other => panic!("expected overloaded, got {other:?}"),
        }
    }

    #[test]
    fn extracts_concatenated_candidate_text() {
        let payload = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}],"role":"model"},"finishReason":"STOP"}]}"#;
        assert_eq!(extract_text(payload).unwrap(), "Hello world");
    }

    #[test]
    fn empty_candidates_are_an_api_error() {
        assert!(matches!(
            extract_text(r#"{"candidates":[]}"#),
            Err(GeminiError::Api(_))
        ));
    }

    #[test]
    fn file_states_deserialize_from_screaming_snake_case() {
        let file: RemoteFile = serde_json::from_str(
            r#"{"name":"files/abc123","uri":"https://generativelanguage.googleapis.com/v1beta/files/abc123","mimeType":"audio/mpeg","state":"ACTIVE"}"#,
        )
        .unwrap();
        assert_eq!(file.state, FileState::Active);
        assert_eq!(file.name, "files/abc123");
        assert_eq!(file.mime_type, "audio/mpeg");
    }

    #[test]
    fn unknown_file_state_does_not_fail_deserialization() {
        let file: RemoteFile = serde_json::from_str(
            r#"{"name":"files/abc","uri":"u","state":"SOMETHING_NEW"}"#,
        )
        .unwrap();
        assert_eq!(file.state, FileState::Unknown);
    }

    #[test]
    fn model_tiers_map_to_model_ids() {
        assert_eq!(ModelTier::Flash.model_id(), "gemini-2.5-flash");
        assert_eq!(ModelTier::Pro.model_id(), "gemini-2.5-pro");
    }
}
