use crate::error::{to_env_var, ConfigError, ENV_PREFIX};
use baize::agent::TurnConfig;
use baize::bridge::DEFAULT_TIMEOUT;
use baize::config::{ConfigSnapshot, DEFAULT_MODEL};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct PageSettings {
    /// How long a command waits for the page agent
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Address the page is served from, used to resolve its links
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            url: None,
        }
    }
}

impl PageSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_true")]
    pub concurrent_tools: bool,
    /// Offer the page HTML tool to the model
    #[serde(default)]
    pub expose_html: bool,
    #[serde(default)]
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            concurrent_tools: true,
            expose_html: false,
            system_prompt_path: None,
        }
    }
}

impl AgentSettings {
    pub fn turn_config(&self) -> TurnConfig {
        TurnConfig {
            max_rounds: self.max_rounds,
            concurrent_tools: self.concurrent_tools,
            system_prompt_path: self.system_prompt_path.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub provider: ConfigSnapshot,
    #[serde(default)]
    pub page: PageSettings,
    #[serde(default)]
    pub agent: AgentSettings,
}

impl Settings {
    /// Defaults, then the config file, then `BAIZE_*` environment variables.
    ///
    /// An explicit `config_file` must exist; the default one is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("provider.model", DEFAULT_MODEL)?
            .set_default("provider.language", "en")?
            .set_default("page.timeout_ms", default_timeout_ms() as i64)?
            .set_default("agent.max_rounds", default_max_rounds() as i64)?;

        match config_file {
            Some(path) => builder = builder.add_source(File::from(path).required(true)),
            None => {
                if let Some(path) = default_config_file() {
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = match config.try_deserialize() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    return Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    });
                } else if let config::ConfigError::NotFound(field) = &err {
                    return Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    });
                }
                return Err(ConfigError::Other(err));
            }
        };

        // Turns cannot reach the model without a key
        if !settings.provider.has_api_key() {
            return Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("provider.api_key"),
            });
        }
        Ok(settings)
    }
}

/// `~/.config/baize/config.toml` or the platform equivalent
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("baize").join("config.toml"))
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_max_rounds() -> usize {
    TurnConfig::default().max_rounds
}

fn default_true() -> bool {
    true
}
