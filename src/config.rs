use anyhow::{Context, Result};
use serde::Deserialize;

/// Process configuration: an optional `habr.toml` next to the binary plus
/// `HABR_`-prefixed environment overrides (e.g. `HABR_GIGACHAT__AUTH`).
/// The loaded value is handed into the collaborators' constructors; nothing
/// reads configuration from ambient globals.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub scrape: ScrapeSettings,
    #[serde(default)]
    pub gigachat: GigaChatSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeSettings {
    #[serde(default = "default_listing_url")]
    pub base_url: String,
    /// Pause between listing pages; one site, no reason to hammer it.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GigaChatSettings {
    /// Base64 client credentials for the OAuth Basic header.
    #[serde(default)]
    pub auth: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_api_url")]
    pub base_url: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Extra root certificate (PEM) for the API endpoints, which sit behind
    /// a national CA that is not in the default store.
    #[serde(default)]
    pub cert_path: Option<String>,
}

fn default_db_path() -> String {
    "habr_vacancies.db".into()
}

fn default_listing_url() -> String {
    "https://career.habr.com/vacancies".into()
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_auth_url() -> String {
    "https://ngw.devices.sberbank.ru:9443/api/v2/oauth".into()
}

fn default_api_url() -> String {
    "https://gigachat.devices.sberbank.ru".into()
}

fn default_scope() -> String {
    "GIGACHAT_API_PERS".into()
}

fn default_model() -> String {
    "GigaChat".into()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
        }
    }
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        ScrapeSettings {
            base_url: default_listing_url(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl Default for GigaChatSettings {
    fn default() -> Self {
        GigaChatSettings {
            auth: String::new(),
            auth_url: default_auth_url(),
            base_url: default_api_url(),
            scope: default_scope(),
            model: default_model(),
            cert_path: None,
        }
    }
}

pub fn load() -> Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("habr").required(false))
        .add_source(config::Environment::with_prefix("HABR").separator("__"))
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;
    Ok(settings)
}
