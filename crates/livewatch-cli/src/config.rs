//! Configuration layering for the CLI.
//!
//! Priority: CLI args > environment variables > config file > defaults.

use crate::error::{ConfigError, Result};
use figment::{
    providers::{Env, Format as _, Json, Serialized, Toml},
    Figment,
};
use livewatch::Options;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "livewatch.config.json";

/// Prefix for environment overrides (`LIVEWATCH_PORT`, ...).
pub const ENV_PREFIX: &str = "LIVEWATCH_";

/// Scalar options that may come from the environment.
const ENV_KEYS: &[&str] = &["port", "host", "delay", "debug"];

/// Load options from every source, looking for the default config file in
/// the working directory.
///
/// # Arguments
///
/// * `config_path` - Explicit config file; must exist when given
/// * `cli` - Options set on the command line
///
/// # Errors
///
/// Returns error if an explicit config file is missing or any source fails
/// to parse into [`Options`]
pub fn load(config_path: Option<&Path>, cli: Options) -> Result<Options> {
    load_in(Path::new("."), config_path, cli)
}

/// Like [`load`], with the default config file looked up in `dir`.
pub fn load_in(dir: &Path, config_path: Option<&Path>, cli: Options) -> Result<Options> {
    let config_file = match config_path {
        Some(path) if !path.exists() => {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default_path = dir.join(DEFAULT_CONFIG_FILE);
            default_path.exists().then_some(default_path)
        }
    };

    figment(config_file, cli)
        .extract()
        .map_err(|e| ConfigError::Invalid(Box::new(e)).into())
}

fn figment(config_file: Option<PathBuf>, cli: Options) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(Options::default()));

    if let Some(path) = config_file {
        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        figment = if is_toml {
            figment.merge(Toml::file(path))
        } else {
            figment.merge(Json::file(path))
        };
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).only(ENV_KEYS))
        .merge(Serialized::defaults(cli))
}
