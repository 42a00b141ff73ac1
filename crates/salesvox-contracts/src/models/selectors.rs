use thiserror::Error;

use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No models available for capability '{0}'.")]
pub struct NoModelForCapability(pub String);

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    /// Resolves a requested model for `capability`, falling back to the first
    /// registered model with that capability and saying why.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, NoModelForCapability> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        if let Some(name) = requested {
            if let Some(model) = self.registry.ensure(name, capability) {
                return Ok(ModelSelection {
                    model: model.clone(),
                    requested: Some(name.to_string()),
                    fallback_reason: None,
                });
            }
        }

        let model = self
            .registry
            .by_capability(capability)
            .first()
            .map(|model| (*model).clone())
            .ok_or_else(|| NoModelForCapability(capability.to_string()))?;
        let fallback_reason = match requested {
            Some(name) => format!(
                "Requested model '{name}' unavailable for capability '{capability}'; using '{}'.",
                model.name
            ),
            None => format!("No model specified; using default '{}'.", model.name),
        };
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use crate::models::{ModelRegistry, ModelSelector, ModelSpec, IMAGE, TEXT, TRANSCRIPTION};

    #[test]
    fn known_model_is_selected_without_fallback() {
        let selection = ModelSelector::default()
            .select(Some("gpt-4o-mini"), TEXT)
            .unwrap();
        assert_eq!(selection.model.name, "gpt-4o-mini");
        assert_eq!(selection.fallback_reason, None);
    }

    #[test]
    fn wrong_capability_falls_back_to_first_model() {
        let selection = ModelSelector::default()
            .select(Some("whisper-1"), IMAGE)
            .unwrap();
        assert_eq!(selection.model.name, "dall-e-3");
        assert_eq!(selection.requested.as_deref(), Some("whisper-1"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'whisper-1' unavailable for capability 'image'; using 'dall-e-3'.")
        );
    }

    #[test]
    fn missing_request_uses_default_with_explanation() {
        let selection = ModelSelector::default()
            .select(Some("  "), TRANSCRIPTION)
            .unwrap();
        assert_eq!(selection.model.name, "whisper-1");
        assert_eq!(selection.requested, None);
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("No model specified; using default 'whisper-1'.")
        );
    }

    #[test]
    fn empty_capability_is_an_error() {
        let mut models = IndexMap::new();
        models.insert(
            "text-only".to_string(),
            ModelSpec {
                name: "text-only".to_string(),
                provider: "openai".to_string(),
                capabilities: vec![TEXT.to_string()],
                context_window: None,
            },
        );
        let err = ModelSelector::new(ModelRegistry::new(models))
            .select(Some("dall-e-3"), IMAGE)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'image'.");
    }
}
