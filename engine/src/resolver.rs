//! Fills the gaps in a user supplied config from a model's declared defaults.

use std::{fs, path::Path};

use color_eyre::{
    Result,
    eyre::{WrapErr as _, eyre},
};
use log::{info, warn};
use serde_json::{Map, Value};

use crate::{error::MissingDefaultError, model::ModelRequirements};

pub type ConfigMap = Map<String, Value>;

/// The json config a user points the tool at.
#[derive(Debug, Clone, PartialEq)]
pub struct UserConfig {
    pub model: String,
    pub params: ConfigMap,
}

impl UserConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let src = fs::read_to_string(path)
            .wrap_err_with(|| format!("Reading config file {}", path.display()))?;
        let params: ConfigMap = serde_json::from_str(&src)
            .wrap_err_with(|| format!("Parsing config file {}", path.display()))?;
        Self::from_map(params)
    }

    pub fn from_map(params: ConfigMap) -> Result<Self> {
        let model = params
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| eyre!("Config has no string entry `model`"))?
            .to_string();
        Ok(Self { model, params })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub config: ConfigMap,
    /// Keys that were filled from defaults, in requirement order.
    pub defaulted: Vec<String>,
}

pub fn resolve(
    user_config: &ConfigMap,
    requirements: &ModelRequirements,
) -> Result<Resolved, MissingDefaultError> {
    let mut config = user_config.clone();
    let mut defaulted = vec![];
    let mut missing = vec![];

    for key in &requirements.keys {
        if config.contains_key(key) {
            continue;
        }
        warn!("Entry {key} not found in provided config, looking for a default");

        match requirements.default_for(key) {
            Some(value) => {
                info!("Default value {value} added for entry {key}");
                config.insert(key.clone(), value.clone());
                defaulted.push(key.clone());
            }
            None => missing.push(key.clone()),
        }
    }

    if missing.is_empty() {
        Ok(Resolved { config, defaulted })
    } else {
        Err(MissingDefaultError {
            keys: missing,
            partial: config,
        })
    }
}
