use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::StageError;

pub const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

/// Sample rate and channel count the transcription service is fed.
pub const TRANSCRIBE_SAMPLE_RATE: u32 = 16_000;
pub const TRANSCRIBE_CHANNELS: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Normalize,
    Transcribe,
    Expand,
    Render,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Normalize => "normalize",
            Stage::Transcribe => "transcribe",
            Stage::Expand => "expand",
            Stage::Render => "render",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1792x1024")]
    Landscape,
    #[serde(rename = "1024x1792")]
    Portrait,
}

impl ImageSize {
    pub const ALL: [ImageSize; 3] = [ImageSize::Square, ImageSize::Landscape, ImageSize::Portrait];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square => "1024x1024",
            ImageSize::Landscape => "1792x1024",
            ImageSize::Portrait => "1024x1792",
        }
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unsupported image size '{raw}' (expected one of: {})",
                    Self::ALL.map(|size| size.as_str()).join(", ")
                )
            })
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::Standard => "standard",
            ImageQuality::Hd => "hd",
        }
    }
}

impl FromStr for ImageQuality {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ImageQuality::Standard),
            "hd" => Ok(ImageQuality::Hd),
            _ => Err(format!(
                "unsupported image quality '{raw}' (expected standard or hd)"
            )),
        }
    }
}

impl fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderOptions {
    pub size: ImageSize,
    pub quality: ImageQuality,
}

/// How the audio handed to transcription was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSource {
    /// Decoded under the sniffed container format.
    Decoded,
    /// Decoded only after retrying as the fallback container.
    DecodedViaFallback,
    /// Neither attempt decoded; original bytes passed through.
    Unchanged,
    /// No audio at all; the transcript was typed.
    TextInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub transcript: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
    pub audio: Option<AudioSource>,
    pub transcription_model: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub image_size: ImageSize,
    pub image_quality: ImageQuality,
    pub error: Option<String>,
    pub failed_stage: Option<Stage>,
}

impl PipelineResult {
    pub fn new(text_model: &str, image_model: &str, options: RenderOptions) -> Self {
        Self {
            transcript: String::new(),
            description: None,
            image_url: None,
            revised_prompt: None,
            audio: None,
            transcription_model: None,
            text_model: text_model.to_string(),
            image_model: image_model.to_string(),
            image_size: options.size,
            image_quality: options.quality,
            error: None,
            failed_stage: None,
        }
    }

    /// Records a halt. Fields filled by earlier stages stay as they are.
    pub fn fail(&mut self, err: StageError) {
        self.failed_stage = Some(err.stage);
        self.error = Some(err.message);
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.image_url.is_some()
    }
}
