use indexmap::IndexMap;

pub const TEXT: &str = "text";
pub const IMAGE: &str = "image";
pub const TRANSCRIPTION: &str = "transcription";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
    pub context_window: Option<u64>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

/// Known hosted models, in preference order per capability.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(default_models())
    }
}

impl ModelRegistry {
    pub fn new(models: IndexMap<String, ModelSpec>) -> Self {
        Self { models }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<&ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<&ModelSpec> {
        self.get(name).filter(|model| model.supports(capability))
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let rows: &[(&str, &[&str], Option<u64>)] = &[
        ("gpt-4", &[TEXT], Some(8192)),
        ("gpt-4o", &[TEXT], Some(128_000)),
        ("gpt-4o-mini", &[TEXT], Some(128_000)),
        ("gpt-3.5-turbo", &[TEXT], Some(16_385)),
        ("dall-e-3", &[IMAGE], None),
        ("dall-e-2", &[IMAGE], None),
        ("whisper-1", &[TRANSCRIPTION], None),
        ("gpt-4o-transcribe", &[TRANSCRIPTION], None),
        ("gpt-4o-mini-transcribe", &[TRANSCRIPTION], None),
    ];

    rows.iter()
        .map(|(name, capabilities, context_window)| {
            (
                (*name).to_string(),
                ModelSpec {
                    name: (*name).to_string(),
                    provider: "openai".to_string(),
                    capabilities: capabilities.iter().map(|cap| (*cap).to_string()).collect(),
                    context_window: *context_window,
                },
            )
        })
        .collect()
}
