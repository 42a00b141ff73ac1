pub mod agent;
pub mod audio;
pub mod completion;
pub mod config;
mod http;
pub mod imagery;
pub mod pipeline;
pub mod store;
pub mod tracker;
pub mod transcribe;

#[cfg(test)]
mod fakes;

pub use agent::{ChatSession, DataAgent};
pub use audio::{normalize, Container, NormalizedAudio};
pub use completion::{
    Completion, CompletionProvider, CompletionRequest, OpenAiChat, ToolChoice,
};
pub use config::{EngineConfig, GitHubConfig};
pub use imagery::{ImageGenerator, OpenAiImages, RenderRequest, RenderedImage};
pub use pipeline::{Submission, VoicePipeline, VoiceSession};
pub use store::{BusinessOverview, QueryStore, SalesStore, TableInfo};
pub use tracker::{tracker_from_config, GitHubIssues, IssueTracker, MockTracker};
pub use transcribe::{OpenAiTranscriber, Transcriber, Transcript};
