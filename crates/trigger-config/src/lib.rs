//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, CalendarSettings, DesktopSettings, EngineConfig, LoggingConfig,
    PaperSettings, PathSettings, StopSettings, StreamingSettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    build(Some(path))
}

/// Load configuration from an optional file; defaults plus environment otherwise.
pub fn load_config_or_default(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    build(path)
}

fn build(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    let config = builder
        .add_source(
            Environment::with_prefix("TRIGGER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}
