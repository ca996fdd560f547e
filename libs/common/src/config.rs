use std::path::PathBuf;

use anyhow::Context;
use serde::de::DeserializeOwned;

/// Loads a `serde_yaml` config from an explicit `--config` path, falling
/// back to `~/<default_filename>` when present, or `T::default()` when
/// neither exists — the same resolution order as the teacher's
/// `apps/rsmqttd::run`.
pub fn load_config<T: DeserializeOwned + Default>(
    explicit_path: Option<String>,
    default_filename: &str,
) -> anyhow::Result<T> {
    let config_filename = match explicit_path {
        Some(path) => Some(PathBuf::from(path)),
        None => dirs::home_dir()
            .map(|home_dir| home_dir.join(default_filename))
            .filter(|path| path.exists()),
    };

    match config_filename {
        Some(config_filename) => {
            tracing::info!(filename = %config_filename.display(), "load config file");
            serde_yaml::from_str(
                &std::fs::read_to_string(&config_filename).with_context(|| {
                    format!("load config file '{}'.", config_filename.display())
                })?,
            )
            .with_context(|| format!("parse config file '{}'.", config_filename.display()))
        }
        None => {
            tracing::info!("use the default config");
            Ok(T::default())
        }
    }
}
