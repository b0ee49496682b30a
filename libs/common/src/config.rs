//! Layered configuration loading

use crate::{Error, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Load configuration from multiple sources
///
/// Priority (highest to lowest):
/// 1. Environment variables prefixed `{NAME}_` (`__` separates nested keys)
/// 2. Service-specific file (`config/{name}.toml|yaml`)
/// 3. Default config file (`config/default.toml|yaml`)
/// 4. `T::default()`
pub fn load_config<T>(service_name: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Serialize + Default,
{
    figment_for::<T>(service_name)
        .extract()
        .map_err(|e| Error::Config(format!("Failed to load configuration: {}", e)))
}

/// The merged provider chain used by [`load_config`]
pub fn figment_for<T>(service_name: &str) -> Figment
where
    T: Serialize + Default,
{
    Figment::from(Serialized::defaults(T::default()))
        .merge(Toml::file("config/default.toml"))
        .merge(Yaml::file("config/default.yaml"))
        .merge(Toml::file(format!("config/{}.toml", service_name)))
        .merge(Yaml::file(format!("config/{}.yaml", service_name)))
        .merge(Env::prefixed(&format!("{}_", env_prefix(service_name))).split("__"))
}

fn env_prefix(service_name: &str) -> String {
    service_name.to_uppercase().replace('-', "_")
}

/// Load configuration from a specific file, on top of `T::default()`
pub fn load_config_from_file<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Serialize + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Config("Config file must have an extension".to_string()))?;

    let base = Figment::from(Serialized::defaults(T::default()));
    let figment = match extension {
        "toml" => base.merge(Toml::file(path)),
        "yaml" | "yml" => base.merge(Yaml::file(path)),
        "json" => base.merge(Json::file(path)),
        _ => {
            return Err(Error::Config(format!(
                "Unsupported config file format: {}",
                extension
            )))
        },
    };

    figment
        .extract()
        .map_err(|e| Error::Config(format!("Failed to load configuration from file: {}", e)))
}
