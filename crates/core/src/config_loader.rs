use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from built-in defaults, `config/Config.toml`,
    /// `OPTDESK_` environment variables (`__` separates sections, e.g.
    /// `OPTDESK_RISK__MAX_LOTS=2`) and `config/Config.json`, then validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed, or if
    /// a value fails validation.
    pub fn load() -> Result<AppConfig> {
        Self::extract(Self::base("config/Config.toml"))
    }

    /// Same as [`load`](Self::load) with `config/Config.{profile}.toml` layered
    /// over the base file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed, or if
    /// a value fails validation.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        let figment = Self::base("config/Config.toml")
            .merge(Toml::file(format!("config/Config.{profile}.toml")));
        Self::extract(figment)
    }

    /// Loads from an explicit TOML file instead of `config/Config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// fails validation.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("config file {} not found", path.display());
        }
        Self::extract(Self::base(path))
    }

    fn base(toml: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(toml.as_ref()))
    }

    fn extract(figment: Figment) -> Result<AppConfig> {
        let config: AppConfig = figment
            .merge(Env::prefixed("OPTDESK_").split("__"))
            .join(Json::file("config/Config.json"))
            .extract()
            .context("failed to parse configuration")?;

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}
