use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{Display, EnumString};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Language of the system prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    /// `zh` and its regional variants are Chinese, anything else is English
    pub fn parse(value: &str) -> Self {
        let primary = value.trim().split(['-', '_']).next().unwrap_or_default();
        if primary.eq_ignore_ascii_case("zh") {
            Language::Zh
        } else {
            Language::En
        }
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Language::parse(&value))
    }
}

/// Settings read once at the start of a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub language: Language,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::new(),
            model: default_model(),
            language: Language::En,
        }
    }
}

impl ConfigSnapshot {
    /// Turns need a key to reach the model
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// The configured base URL, if one was set
    pub fn base_url(&self) -> Option<&str> {
        let trimmed = self.base_url.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}
