//! Scripted collaborators for unit tests. Clones share state, so a test can
//! hand one clone to the code under test and inspect the other.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use serde_json::Value;

use salesvox_contracts::records::{Row, TicketOutcome, TicketRequest};

use crate::audio::NormalizedAudio;
use crate::completion::{Completion, CompletionProvider, CompletionRequest};
use crate::imagery::{ImageGenerator, RenderRequest, RenderedImage};
use crate::store::QueryStore;
use crate::tracker::IssueTracker;
use crate::transcribe::{Transcriber, Transcript};

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedCompletions {
    replies: Arc<Mutex<VecDeque<Result<Completion, String>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedCompletions {
    pub(crate) fn new(replies: Vec<Result<Completion, String>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        locked(&self.requests).clone()
    }
}

impl CompletionProvider for ScriptedCompletions {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        locked(&self.requests).push(request.clone());
        match locked(&self.replies).pop_front() {
            Some(Ok(completion)) => Ok(completion),
            Some(Err(message)) => Err(anyhow!(message)),
            None => bail!("no scripted completion left"),
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingStore {
    rows: Vec<Row>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl RecordingStore {
    pub(crate) fn with_rows(rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|value| serde_json::from_value::<Row>(value).ok())
            .collect();
        Self {
            rows,
            queries: Arc::default(),
        }
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        locked(&self.queries).clone()
    }
}

impl QueryStore for RecordingStore {
    fn execute(&self, select_text: &str) -> Result<Vec<Row>> {
        locked(&self.queries).push(select_text.to_string());
        Ok(self.rows.clone())
    }
}

#[derive(Clone)]
pub(crate) struct RecordingTracker {
    outcome: std::result::Result<String, String>,
    requests: Arc<Mutex<Vec<TicketRequest>>>,
}

impl RecordingTracker {
    pub(crate) fn succeeding(url: &str) -> Self {
        Self {
            outcome: Ok(url.to_string()),
            requests: Arc::default(),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            requests: Arc::default(),
        }
    }

    pub(crate) fn requests(&self) -> Vec<TicketRequest> {
        locked(&self.requests).clone()
    }
}

impl IssueTracker for RecordingTracker {
    fn name(&self) -> &str {
        "recording"
    }

    fn open(&self, request: &TicketRequest) -> Result<TicketOutcome> {
        locked(&self.requests).push(request.clone());
        match &self.outcome {
            Ok(url) => Ok(TicketOutcome::created(url.clone(), Some(1))),
            Err(message) => Err(anyhow!(message.clone())),
        }
    }
}

pub(crate) struct CannedTranscriber {
    transcript: Transcript,
}

impl CannedTranscriber {
    pub(crate) fn new(transcript: Transcript) -> Self {
        Self { transcript }
    }
}

impl Transcriber for CannedTranscriber {
    fn model(&self) -> &str {
        "whisper-1"
    }

    fn transcribe(&self, _audio: &NormalizedAudio) -> Transcript {
        self.transcript.clone()
    }
}

#[derive(Clone)]
pub(crate) struct StaticImages {
    outcome: std::result::Result<String, String>,
    requests: Arc<Mutex<Vec<RenderRequest>>>,
}

impl StaticImages {
    pub(crate) fn succeeding(url: &str) -> Self {
        Self {
            outcome: Ok(url.to_string()),
            requests: Arc::default(),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            requests: Arc::default(),
        }
    }

    pub(crate) fn requests(&self) -> Vec<RenderRequest> {
        locked(&self.requests).clone()
    }
}

impl ImageGenerator for StaticImages {
    fn name(&self) -> &str {
        "static"
    }

    fn render(&self, request: &RenderRequest) -> Result<RenderedImage> {
        locked(&self.requests).push(request.clone());
        match &self.outcome {
            Ok(url) => Ok(RenderedImage {
                url: url.clone(),
                revised_prompt: None,
            }),
            Err(message) => Err(anyhow!(message.clone())),
        }
    }
}

/// 16-bit PCM sine tone at 440 Hz.
pub(crate) fn tone_wav(sample_rate: u32, channels: u16, seconds: f32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
        let frames = (sample_rate as f32 * seconds) as u32;
        for frame in 0..frames {
            let t = frame as f32 / sample_rate as f32;
            let value = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
            for _ in 0..channels {
                writer.write_sample((value * i16::MAX as f32) as i16)?;
            }
        }
        writer.finalize()?;
    }
    Ok(bytes)
}
