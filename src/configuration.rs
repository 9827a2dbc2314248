use std::{
    net::{SocketAddr, ToSocketAddrs},
    path::PathBuf,
};

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::domain::{ApiPrefix, ParseApiPrefixError};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub assets: AssetSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub api_prefix: String,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl ApplicationSettings {
    pub fn address(&self) -> Result<SocketAddr, std::io::Error> {
        format!("{}:{}", self.host, self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("No address resolved for {}", self.host),
                )
            })
    }

    pub fn api_prefix(&self) -> Result<ApiPrefix, ParseApiPrefixError> {
        ApiPrefix::parse(&self.api_prefix)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetSettings {
    pub root: PathBuf,
    pub spa_fallback: bool,
    pub fallback_document: String,
}

#[derive(Debug, PartialEq, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Environment {
    Local,
    Production,
}

pub fn get_environment() -> Environment {
    std::env::var("APP_ENVIRONMENT")
        .ok()
        .and_then(|e| e.parse().ok())
        .unwrap_or(Environment::Local)
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| config::ConfigError::Foreign(e.into()))?;
    let configuration_directory = base_path.join("configuration");
    let environment_filename = format!("{}.yaml", get_environment());

    // Initialize configuration reader
    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename))
                .required(false),
        )
        // E.g. `APP_APPLICATION__PORT=5001` would set `Settings.application.port`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    // Deserialize configuration values into Settings
    settings.try_deserialize::<Settings>()
}
