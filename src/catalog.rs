//! The provider and model catalog.
//!
//! The catalog is a static table mapping each [`Provider`] to the ordered list
//! of models the backend can route to.  [`Selection`] holds the active pair and
//! implements the switching policy: switching provider always lands on that
//! provider's first model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A selectable model within a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOption {
    /// Human-readable label.
    pub label: &'static str,
    /// Identifier sent to the backend.
    pub value: &'static str,
}

const OPENAI_MODELS: &[ModelOption] = &[
    ModelOption {
        label: "GPT-3.5 Turbo (Fast, 4K tokens)",
        value: "gpt-3.5-turbo",
    },
    ModelOption {
        label: "GPT-4 (Slow, High Quality)",
        value: "gpt-4",
    },
    ModelOption {
        label: "GPT-4 Turbo (Faster, 128K tokens)",
        value: "gpt-4-turbo",
    },
];

const HUGGINGFACE_MODELS: &[ModelOption] = &[
    ModelOption {
        label: "Flan-T5 Small (Fast, Tiny)",
        value: "google/flan-t5-small",
    },
    ModelOption {
        label: "Falcon RW 1B (Slow, Stronger)",
        value: "tiiuae/falcon-rw-1b",
    },
    ModelOption {
        label: "GPT2 (Old, Fast)",
        value: "gpt2",
    },
];

const LOCAL_MODELS: &[ModelOption] = &[ModelOption {
    label: "Mock Local Model (Fast, offline)",
    value: "local-mock",
}];

/// A completion provider the backend knows how to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI chat completions.
    #[default]
    #[serde(rename = "openai")]
    OpenAi,

    /// Hugging Face inference.
    #[serde(rename = "huggingface")]
    HuggingFace,

    /// A model served on the backend host.
    Local,
}

impl Provider {
    /// All providers, in display order.
    pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::HuggingFace, Provider::Local];

    /// The identifier used on the wire and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::HuggingFace => "huggingface",
            Provider::Local => "local",
        }
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::HuggingFace => "Hugging Face",
            Provider::Local => "Local",
        }
    }

    /// The ordered models this provider offers.  Never empty.
    pub fn models(&self) -> &'static [ModelOption] {
        match self {
            Provider::OpenAi => OPENAI_MODELS,
            Provider::HuggingFace => HUGGINGFACE_MODELS,
            Provider::Local => LOCAL_MODELS,
        }
    }

    /// The model selected when switching to this provider.
    pub fn default_model(&self) -> &'static ModelOption {
        &self.models()[0]
    }

    /// Looks up a model of this provider by its identifier.
    pub fn find_model(&self, value: &str) -> Option<&'static ModelOption> {
        self.models().iter().find(|m| m.value == value)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::validation(
                    format!("unknown provider {s:?} (expected openai, huggingface or local)"),
                    Some("provider".to_string()),
                )
            })
    }
}

/// The active provider and model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    provider: Provider,
    model: &'static ModelOption,
}

impl Selection {
    /// Selects a provider and one of its models.
    pub fn new(provider: Provider, model: &str) -> Result<Self> {
        let model = provider.find_model(model).ok_or_else(|| unknown_model(provider, model))?;
        Ok(Self { provider, model })
    }

    /// Selects a provider with its first model.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            model: provider.default_model(),
        }
    }

    /// The active provider.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The active model identifier.
    pub fn model(&self) -> &'static str {
        self.model.value
    }

    /// The active model's label.
    pub fn model_label(&self) -> &'static str {
        self.model.label
    }

    /// Switches provider and resets the model to the provider's first entry.
    pub fn switch_provider(&mut self, provider: Provider) {
        *self = Self::for_provider(provider);
    }

    /// Switches to another model of the active provider.
    pub fn switch_model(&mut self, model: &str) -> Result<()> {
        self.model = self
            .provider
            .find_model(model)
            .ok_or_else(|| unknown_model(self.provider, model))?;
        Ok(())
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::for_provider(Provider::default())
    }
}

fn unknown_model(provider: Provider, model: &str) -> Error {
    Error::validation(
        format!("provider {provider} has no model {model:?}"),
        Some("model".to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selection() {
        let selection = Selection::default();
        assert_eq!(selection.provider(), Provider::OpenAi);
        assert_eq!(selection.model(), "gpt-3.5-turbo");
    }

    #[test]
    fn every_provider_has_models() {
        for provider in Provider::ALL {
            assert!(!provider.models().is_empty(), "{provider} has no models");
        }
    }

    #[test]
    fn switch_provider_takes_first_model() {
        let mut selection = Selection::default();
        selection.switch_provider(Provider::HuggingFace);
        assert_eq!(selection.provider(), Provider::HuggingFace);
        assert_eq!(selection.model(), "google/flan-t5-small");

        selection.switch_provider(Provider::Local);
        assert_eq!(selection.model(), "local-mock");
    }

    #[test]
    fn switch_model_within_provider() {
        let mut selection = Selection::default();
        selection.switch_model("gpt-4-turbo").unwrap();
        assert_eq!(selection.model(), "gpt-4-turbo");
        assert_eq!(selection.model_label(), "GPT-4 Turbo (Faster, 128K tokens)");
    }

    #[test]
    fn switch_model_rejects_foreign_model() {
        let mut selection = Selection::default();
        let err = selection.switch_model("gpt2").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(selection.model(), "gpt-3.5-turbo");
    }

    #[test]
    fn parse_provider() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(
            "HuggingFace".parse::<Provider>().unwrap(),
            Provider::HuggingFace
        );
        assert_eq!(" local ".parse::<Provider>().unwrap(), Provider::Local);
        assert!("anthropic".parse::<Provider>().is_err());
    }

    #[test]
    fn provider_wire_names() {
        assert_eq!(
            serde_json::to_string(&Provider::HuggingFace).unwrap(),
            r#""huggingface""#
        );
        assert_eq!(serde_json::to_string(&Provider::OpenAi).unwrap(), r#""openai""#);
        assert_eq!(serde_json::to_string(&Provider::Local).unwrap(), r#""local""#);
    }

    #[test]
    fn selection_new_validates() {
        assert!(Selection::new(Provider::HuggingFace, "gpt2").is_ok());
        assert!(Selection::new(Provider::Local, "gpt-4").is_err());
    }
}
