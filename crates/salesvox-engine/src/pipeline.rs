//! Voice to image: normalize, transcribe, expand, render.
//!
//! Each stage may halt the run. A halted [`PipelineResult`] keeps whatever
//! earlier stages produced and names the failing stage.

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use salesvox_contracts::chat::Turn;
use salesvox_contracts::errors::{InputError, StageError};
use salesvox_contracts::events::ActivityLog;
use salesvox_contracts::pipeline::{
    AudioSource, PipelineResult, RenderOptions, Stage, MAX_AUDIO_BYTES,
};

use crate::audio;
use crate::completion::{CompletionProvider, CompletionRequest};
use crate::http::{error_chain_text, truncate_text};
use crate::imagery::{ImageGenerator, RenderRequest};
use crate::transcribe::{Transcriber, Transcript};

pub const EXPANSION_SYSTEM_PROMPT: &str =
    "You are an expert at creating detailed image descriptions for AI image generation.";
const EXPANSION_TEMPERATURE: f32 = 0.7;
const EXPANSION_MAX_TOKENS: u32 = 200;

pub fn expansion_prompt(transcript: &str) -> String {
    format!(
        "Convert the following voice transcript into a detailed, professional image description suitable for AI image generation.

Transcript: {transcript}

Requirements:
- Create a vivid, detailed description
- Include visual elements: colors, composition, mood, style
- Be specific about the scene, objects, and atmosphere
- Keep it concise but descriptive (2-3 sentences)
- Focus on visual details that will help generate a beautiful image

Image Description:"
    )
}

/// Rejects input before any collaborator sees it.
pub fn validate_audio(raw: &[u8]) -> Result<(), InputError> {
    if raw.is_empty() {
        return Err(InputError::EmptyAudio);
    }
    if raw.len() > MAX_AUDIO_BYTES {
        return Err(InputError::AudioTooLarge {
            size: raw.len(),
            limit: MAX_AUDIO_BYTES,
        });
    }
    Ok(())
}

pub struct VoicePipeline {
    transcriber: Box<dyn Transcriber>,
    completions: Box<dyn CompletionProvider>,
    images: Box<dyn ImageGenerator>,
    text_model: String,
    image_model: String,
    options: RenderOptions,
    log: ActivityLog,
}

impl VoicePipeline {
    pub fn new(
        transcriber: Box<dyn Transcriber>,
        completions: Box<dyn CompletionProvider>,
        images: Box<dyn ImageGenerator>,
        text_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        Self {
            transcriber,
            completions,
            images,
            text_model: text_model.into(),
            image_model: image_model.into(),
            options: RenderOptions::default(),
            log: ActivityLog::disabled(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_activity_log(mut self, log: ActivityLog) -> Self {
        self.log = log;
        self
    }

    pub fn run(&self, raw_audio: &[u8]) -> PipelineResult {
        let mut result = PipelineResult::new(&self.text_model, &self.image_model, self.options);
        result.transcription_model = Some(self.transcriber.model().to_string());
        let outcome = self
            .listen(raw_audio, &mut result)
            .and_then(|()| self.imagine(&mut result));
        self.finish(result, outcome)
    }

    /// Typed description instead of audio; starts at the expand stage.
    pub fn run_text(&self, text: &str) -> PipelineResult {
        let mut result = PipelineResult::new(&self.text_model, &self.image_model, self.options);
        result.audio = Some(AudioSource::TextInput);
        let outcome = match text.trim() {
            "" => Err(StageError::from(InputError::EmptyText)),
            trimmed => {
                result.transcript = trimmed.to_string();
                self.imagine(&mut result)
            }
        };
        self.finish(result, outcome)
    }

    fn listen(&self, raw_audio: &[u8], result: &mut PipelineResult) -> Result<(), StageError> {
        validate_audio(raw_audio)?;

        let normalized = audio::normalize(raw_audio);
        result.audio = Some(normalized.source);
        self.stage_done(Stage::Normalize, json!({"audio": normalized.source}));

        match self.transcriber.transcribe(&normalized) {
            Transcript::Text(text) if !text.trim().is_empty() => {
                result.transcript = text.trim().to_string();
                self.stage_done(Stage::Transcribe, json!({"chars": result.transcript.len()}));
                Ok(())
            }
            Transcript::Text(_) | Transcript::NotUnderstood => {
                warn!("Transcription produced no text");
                Err(StageError::new(
                    Stage::Transcribe,
                    "Could not transcribe audio: no speech was understood",
                ))
            }
            Transcript::Unreachable(detail) => {
                error!("Transcription service error: {detail}");
                Err(StageError::new(
                    Stage::Transcribe,
                    format!("Could not transcribe audio: transcription service unavailable ({detail})"),
                ))
            }
        }
    }

    fn imagine(&self, result: &mut PipelineResult) -> Result<(), StageError> {
        let description = self.expand(&result.transcript)?;
        result.description = Some(description.clone());
        self.stage_done(Stage::Expand, json!({"chars": description.len()}));

        let request = RenderRequest {
            prompt: description,
            model: self.image_model.clone(),
            options: self.options,
        };
        let image = self.images.render(&request).map_err(|err| {
            let detail = error_chain_text(&err, 400);
            error!("Image generation via {} failed: {detail}", self.images.name());
            StageError::new(Stage::Render, detail)
        })?;
        result.image_url = Some(image.url);
        result.revised_prompt = image.revised_prompt;
        self.stage_done(Stage::Render, json!({"size": self.options.size, "quality": self.options.quality}));
        Ok(())
    }

    fn expand(&self, transcript: &str) -> Result<String, StageError> {
        let request = CompletionRequest::new(
            &self.text_model,
            vec![
                Turn::system(EXPANSION_SYSTEM_PROMPT),
                Turn::user(expansion_prompt(transcript)),
            ],
        )
        .with_temperature(EXPANSION_TEMPERATURE)
        .with_max_tokens(EXPANSION_MAX_TOKENS);

        let completion = self
            .completions
            .complete(&request)
            .map_err(|err| {
                let detail = error_chain_text(&err, 400);
                error!("Prompt expansion via {} failed: {detail}", self.completions.name());
                StageError::new(Stage::Expand, detail)
            })?;
        match completion.trimmed_text() {
            Some(text) => {
                info!("Generated image description from transcript");
                Ok(text.to_string())
            }
            None => Err(StageError::new(
                Stage::Expand,
                "language model returned an empty description",
            )),
        }
    }

    fn finish(&self, mut result: PipelineResult, outcome: Result<(), StageError>) -> PipelineResult {
        match outcome {
            Ok(()) => info!("Pipeline completed successfully"),
            Err(err) => {
                error!("Pipeline error: {err}");
                result.fail(err);
            }
        }
        self.note(
            "pipeline_finished",
            json!({
                "complete": result.is_complete(),
                "failed_stage": result.failed_stage,
                "error": result.error.as_deref().map(|text| truncate_text(text, 300)),
            }),
        );
        result
    }

    fn stage_done(&self, stage: Stage, detail: serde_json::Value) {
        info!("Stage {stage} finished");
        self.note("pipeline_stage", json!({"stage": stage, "detail": detail}));
    }

    fn note(&self, event_type: &str, payload: serde_json::Value) {
        if let Err(err) = self.log.record(event_type, payload) {
            warn!("activity log write failed: {err:#}");
        }
    }
}

pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Processed(PipelineResult),
    /// Same bytes as the last accepted input; nothing ran.
    Duplicate,
}

/// Session state around the pipeline: newest-first history of successful
/// runs, and the fingerprint of the last accepted audio.
pub struct VoiceSession {
    pipeline: VoicePipeline,
    history: Vec<PipelineResult>,
    last_fingerprint: Option<String>,
}

impl VoiceSession {
    pub fn new(pipeline: VoicePipeline) -> Self {
        Self {
            pipeline,
            history: Vec::new(),
            last_fingerprint: None,
        }
    }

    pub fn submit_audio(&mut self, raw_audio: &[u8]) -> Submission {
        let print = fingerprint(raw_audio);
        if self.last_fingerprint.as_deref() == Some(print.as_str()) {
            info!("Skipping audio identical to the last input");
            return Submission::Duplicate;
        }
        self.last_fingerprint = Some(print);
        let result = self.pipeline.run(raw_audio);
        Submission::Processed(self.record(result))
    }

    pub fn submit_text(&mut self, text: &str) -> PipelineResult {
        let result = self.pipeline.run_text(text);
        self.record(result)
    }

    fn record(&mut self, result: PipelineResult) -> PipelineResult {
        if result.is_complete() {
            self.history.insert(0, result.clone());
        } else {
            // A failed input may be retried as-is.
            self.last_fingerprint = None;
        }
        result
    }

    pub fn history(&self) -> &[PipelineResult] {
        &self.history
    }

    pub fn latest(&self) -> Option<&PipelineResult> {
        self.history.first()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.last_fingerprint = None;
    }
}
