use anyhow::Result;
use strum_macros::Display;

use super::{base::Provider, configs::OpenAiProviderConfig, openai::OpenAiProvider};
use crate::config::ConfigSnapshot;

pub const OPENAI_HOST: &str = "https://api.openai.com/v1";
pub const GOOGLE_HOST: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Model family, which decides the default endpoint
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAi,
    Google,
}

impl ProviderType {
    pub fn for_model(model: &str) -> Self {
        if model.contains("gpt") {
            ProviderType::OpenAi
        } else {
            ProviderType::Google
        }
    }

    pub fn default_host(&self) -> &'static str {
        match self {
            ProviderType::OpenAi => OPENAI_HOST,
            ProviderType::Google => GOOGLE_HOST,
        }
    }
}

/// Endpoint settings for a snapshot. A configured base URL wins over the
/// model family's default.
pub fn provider_config(snapshot: &ConfigSnapshot) -> OpenAiProviderConfig {
    let host = snapshot
        .base_url()
        .unwrap_or_else(|| ProviderType::for_model(&snapshot.model).default_host());
    OpenAiProviderConfig::new(host, snapshot.api_key.clone(), snapshot.model.clone())
}

pub fn get_provider(snapshot: &ConfigSnapshot) -> Result<Box<dyn Provider>> {
    Ok(Box::new(OpenAiProvider::new(provider_config(snapshot))?))
}
