use abtest_core::{CoreError, EngineConfig, Result};
use config::{Config as ConfigLoader, Environment, File};
use std::path::Path;
use validator::Validate;

/// Prefix of environment variables overriding file settings, e.g. `ABTEST_ALPHA`.
pub const ENV_PREFIX: &str = "ABTEST";

/// Load engine settings from `config/default`, `config/local` and the
/// environment, later sources overriding earlier ones.
pub fn load_config() -> Result<EngineConfig> {
    load_config_from("config")
}

/// Same as [`load_config`] with the two optional files looked up in `dir`.
///
/// Keys read from files are lowercased by the loader, so labels used in an
/// `expected_allocation` table must be written in lowercase to match.
pub fn load_config_from(dir: impl AsRef<Path>) -> Result<EngineConfig> {
    let dir = dir.as_ref();

    let config = ConfigLoader::builder()
        .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
        .add_source(File::with_name(&dir.join("local").to_string_lossy()).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX))
        .build()
        .map_err(|e| CoreError::Configuration(e.to_string()))?;

    let engine_config: EngineConfig = config
        .try_deserialize()
        .map_err(|e| CoreError::Configuration(e.to_string()))?;
    engine_config.validate()?;

    tracing::info!(
        "Engine configuration loaded: alpha={}, variant_column={}",
        engine_config.alpha,
        engine_config.variant_column
    );

    Ok(engine_config)
}
