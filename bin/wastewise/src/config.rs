//! Runtime settings.
//!
//! Layered lowest to highest: built-in defaults, an optional `wastewise.toml`
//! in the working directory, then `WASTEWISE__SECTION__KEY` environment
//! variables (e.g. `WASTEWISE__SERVER__PORT=9000`).

use config::{Config, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;

pub const DEFAULT_CLASSIFIER_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/google/vit-base-patch16-224";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub classifier: ClassifierSettings,
    pub registry: RegistrySettings,
    pub media: MediaSettings,
    pub navigation: NavigationSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct StoreSettings {
    /// sqlx connection URL; ignored by the in-memory store.
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ClassifierSettings {
    pub endpoint: String,
    pub api_token: SecretString,
    pub min_score: f64,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct RegistrySettings {
    pub duplicate_radius_m: f64,
}

#[derive(Debug, Deserialize)]
pub struct MediaSettings {
    pub max_width: u32,
    pub quality: u8,
}

#[derive(Debug, Deserialize)]
pub struct NavigationSettings {
    pub base_url: String,
}

pub fn load() -> Result<Settings, ConfigError> {
    Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080_i64)?
        .set_default("store.url", "sqlite:wastewise.db")?
        .set_default("classifier.endpoint", DEFAULT_CLASSIFIER_ENDPOINT)?
        .set_default("classifier.api_token", "")?
        .set_default("classifier.min_score", 0.5)?
        .set_default("classifier.timeout_secs", 30_i64)?
        .set_default("registry.duplicate_radius_m", 6.0)?
        .set_default("media.max_width", 800_i64)?
        .set_default("media.quality", 70_i64)?
        .set_default("navigation.base_url", "http://maps.apple.com/")?
        .add_source(File::with_name("wastewise").required(false))
        .add_source(Environment::with_prefix("WASTEWISE").separator("__"))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_cover_every_key() {
        let settings = load().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.registry.duplicate_radius_m, 6.0);
        assert_eq!(settings.media.max_width, 800);
        assert_eq!(settings.navigation.base_url, "http://maps.apple.com/");
        assert!(settings.classifier.api_token.expose_secret().is_empty());
    }
}
