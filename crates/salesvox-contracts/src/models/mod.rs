mod registry;
mod selectors;

pub use registry::{ModelRegistry, ModelSpec, IMAGE, TEXT, TRANSCRIPTION};
pub use selectors::{ModelSelection, ModelSelector, NoModelForCapability};
