//! The `config` module loads `Settings` from an optional file and the
//! environment.
//!
//! Environment variables use the `POLLPACK_` prefix and `__` between nested
//! keys, e.g. `POLLPACK_SESSION__BATCH_SIZE=8`.

mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{LogSettings, PartialSettings, SessionSettings, Settings, StoreSettings};

/// Loads the configuration from `config/default` and environment variables,
/// merged over default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Like `load_config`, reading the file at `path` (extension optional). A
/// missing file is not an error.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("POLLPACK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge_with_defaults())
}

#[cfg(test)]
mod tests;
