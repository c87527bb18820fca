use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Repository behavior settings.
///
/// Loaded from `config/config.toml` (section `[repository]`) with
/// `MAPGUARD__`-prefixed environment variables layered on top, or built
/// with [`RepositorySettings::default`] when no configuration exists.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySettings {
    /// Wrap saves and deletes in a transaction (when a provider is set).
    #[serde(default = "default_use_transactions")]
    pub use_transactions: bool,
    /// Strict mode: propagate save/delete failures instead of recording
    /// them into the repository's error accumulator.
    #[serde(default = "default_throw_exceptions")]
    pub throw_exceptions: bool,
    /// Batch size for streamed and batched iteration.
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,
}

fn default_use_transactions() -> bool {
    true
}

fn default_throw_exceptions() -> bool {
    false
}

fn default_batch_size() -> usize {
    100
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            use_transactions: default_use_transactions(),
            throw_exceptions: default_throw_exceptions(),
            default_batch_size: default_batch_size(),
        }
    }
}

impl RepositorySettings {
    /// Load settings from `config/config.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/config.toml").required(false))
            .add_source(Environment::with_prefix("MAPGUARD").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new("config/config.toml").exists() {
                    log::warn!("failed to load config file, falling back to env: {err}");
                }
                // Retry using only environment variables as source
                Config::builder()
                    .add_source(Environment::with_prefix("MAPGUARD").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "failed to load configuration from file and env: {err}, \
                             then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        // A missing [repository] section means "all defaults".
        match settings.get::<RepositorySettings>("repository") {
            Ok(loaded) => Ok(loaded),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(err) => Err(ConfigError::Message(format!(
                "repository settings could not be loaded from file or environment: {err}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RepositorySettings::default();
        assert!(settings.use_transactions);
        assert!(!settings.throw_exceptions);
        assert_eq!(settings.default_batch_size, 100);
    }
}
