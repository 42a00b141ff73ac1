use anyhow::{Context, Result};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client as HttpClient;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::audio::NormalizedAudio;
use crate::config::EngineConfig;
use crate::http::{api_error_message, build_client, error_chain_text, send_with_retry, truncate_text};

/// What came back from transcription. The two failure kinds both stop the
/// pipeline but are logged differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    Text(String),
    /// The service answered but recognized no speech.
    NotUnderstood,
    /// The service could not be reached or refused the request.
    Unreachable(String),
}

pub trait Transcriber: Send + Sync {
    fn model(&self) -> &str;
    fn transcribe(&self, audio: &NormalizedAudio) -> Transcript;
}

pub struct OpenAiTranscriber {
    api_base: String,
    api_key: String,
    model: String,
    http: HttpClient,
}

impl OpenAiTranscriber {
    pub fn new(config: &EngineConfig, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_base: config.openai_api_base.clone(),
            api_key: config.require_openai_key()?.to_string(),
            model: model.into(),
            http: build_client(config.http_timeout)?,
        })
    }

    fn request(&self, audio: &NormalizedAudio) -> Result<Transcript> {
        let endpoint = format!("{}/audio/transcriptions", self.api_base);
        let response = send_with_retry("OpenAI transcription", || {
            let file = Part::bytes(audio.bytes.clone())
                .file_name(audio.file_name())
                .mime_str(audio.mime())
                .context("invalid audio mime type")?;
            let form = Form::new()
                .text("model", self.model.clone())
                .text("response_format", "json")
                .part("file", file);
            Ok(self
                .http
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .multipart(form))
        })?;

        let status = response.status();
        let body = response
            .text()
            .context("OpenAI transcription response body read failed")?;
        if rejected_as_unintelligible(status) {
            warn!(
                "Transcription rejected audio ({}): {}",
                status.as_u16(),
                truncate_text(&api_error_message(&body), 300)
            );
            return Ok(Transcript::NotUnderstood);
        }
        if !status.is_success() {
            return Ok(Transcript::Unreachable(format!(
                "OpenAI transcription request failed ({}): {}",
                status.as_u16(),
                truncate_text(&api_error_message(&body), 300)
            )));
        }

        let value: Value = serde_json::from_str(&body)
            .context("OpenAI transcription returned invalid JSON payload")?;
        Ok(transcript_from_response(&value))
    }
}

impl Transcriber for OpenAiTranscriber {
    fn model(&self) -> &str {
        &self.model
    }

    fn transcribe(&self, audio: &NormalizedAudio) -> Transcript {
        match self.request(audio) {
            Ok(Transcript::NotUnderstood) => {
                warn!("Could not understand audio");
                Transcript::NotUnderstood
            }
            Ok(transcript) => transcript,
            Err(err) => {
                let detail = error_chain_text(&err, 400);
                error!("Could not request results from transcription service: {detail}");
                Transcript::Unreachable(detail)
            }
        }
    }
}

// 400/415/422 mean the payload was read and refused, not that the service is down.
fn rejected_as_unintelligible(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNSUPPORTED_MEDIA_TYPE | StatusCode::UNPROCESSABLE_ENTITY
    )
}

pub(crate) fn transcript_from_response(value: &Value) -> Transcript {
    match value.get("text").and_then(Value::as_str).map(str::trim) {
        Some(text) if !text.is_empty() => {
            info!("Transcription: {}", truncate_text(text, 120));
            Transcript::Text(text.to_string())
        }
        _ => Transcript::NotUnderstood,
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use super::{rejected_as_unintelligible, transcript_from_response, Transcript};

    #[test]
    fn blank_text_is_not_understood() {
        assert_eq!(
            transcript_from_response(&json!({"text": "  a red fox at dawn \n"})),
            Transcript::Text("a red fox at dawn".to_string())
        );
        assert_eq!(
            transcript_from_response(&json!({"text": "   "})),
            Transcript::NotUnderstood
        );
        assert_eq!(transcript_from_response(&json!({})), Transcript::NotUnderstood);
    }

    #[test]
    fn only_payload_rejections_count_as_not_understood() {
        assert!(rejected_as_unintelligible(StatusCode::BAD_REQUEST));
        assert!(rejected_as_unintelligible(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!rejected_as_unintelligible(StatusCode::UNAUTHORIZED));
        assert!(!rejected_as_unintelligible(StatusCode::SERVICE_UNAVAILABLE));
    }
}
