use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "PULSE_";

/// Config file read when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from a TOML file layered over defaults, then
    /// `PULSE_`-prefixed environment variables. A missing file falls back to
    /// defaults.
    ///
    /// Nested keys in the environment use `__`, e.g. `PULSE_DATABASE__URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or environment cannot be parsed, or the
    /// result fails [`AppConfig::validate`].
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }
}
