use anyhow::{bail, Result};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use tracing::info;

use salesvox_contracts::pipeline::{ImageQuality, RenderOptions};

use crate::config::EngineConfig;
use crate::http::{build_client, response_json_or_error, send_with_retry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub prompt: String,
    pub model: String,
    pub options: RenderOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// Hosted URL, or a `data:` URL when the service returned inline bytes.
    pub url: String,
    pub revised_prompt: Option<String>,
}

pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn render(&self, request: &RenderRequest) -> Result<RenderedImage>;
}

pub struct OpenAiImages {
    api_base: String,
    api_key: String,
    http: HttpClient,
}

impl OpenAiImages {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            api_base: config.openai_api_base.clone(),
            api_key: config.require_openai_key()?.to_string(),
            http: build_client(config.http_timeout)?,
        })
    }
}

impl ImageGenerator for OpenAiImages {
    fn name(&self) -> &str {
        "openai"
    }

    fn render(&self, request: &RenderRequest) -> Result<RenderedImage> {
        let endpoint = format!("{}/images/generations", self.api_base);
        let payload = image_payload(request);
        let response = send_with_retry("OpenAI images", || {
            Ok(self
                .http
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&payload))
        })?;
        let value = response_json_or_error("OpenAI images", response)?;
        let image = parse_image(&value)?;
        info!("Image generated successfully");
        Ok(image)
    }
}

pub(crate) fn image_payload(request: &RenderRequest) -> Value {
    let mut payload = json!({
        "model": request.model,
        "prompt": request.prompt,
        "n": 1,
        "size": request.options.size.as_str(),
    });
    // dall-e-2 rejects the quality field outright.
    if request.model != "dall-e-2" || request.options.quality != ImageQuality::Standard {
        payload["quality"] = json!(request.options.quality.as_str());
    }
    payload
}

pub(crate) fn parse_image(value: &Value) -> Result<RenderedImage> {
    let Some(first) = value.pointer("/data/0") else {
        bail!("OpenAI images response had no data");
    };
    let revised_prompt = first
        .get("revised_prompt")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(url) = first.get("url").and_then(Value::as_str) {
        return Ok(RenderedImage {
            url: url.to_string(),
            revised_prompt,
        });
    }
    if let Some(b64) = first.get("b64_json").and_then(Value::as_str) {
        return Ok(RenderedImage {
            url: format!("data:image/png;base64,{b64}"),
            revised_prompt,
        });
    }
    bail!("OpenAI images response missing url");
}
