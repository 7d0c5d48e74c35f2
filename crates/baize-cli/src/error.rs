use thiserror::Error;

pub const ENV_PREFIX: &str = "BAIZE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration, set {env_var} or add it to the config file")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// The environment variable that sets a dotted settings field,
/// e.g. `provider.api_key` is `BAIZE_PROVIDER__API_KEY`
pub fn to_env_var(field_path: &str) -> String {
    let path = field_path
        .split('.')
        .map(|part| part.to_uppercase())
        .collect::<Vec<_>>()
        .join("__");
    format!("{}_{}", ENV_PREFIX, path)
}
