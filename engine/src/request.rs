use std::num::NonZeroU32;

use serde_json::Value;

use crate::{error::ConfigError, resolver::ConfigMap};

/// A fully resolved set of generation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub width: NonZeroU32,
    pub height: NonZeroU32,
    pub strength: f64,
    pub num_interference_steps: NonZeroU32,
    pub guidance_scale: f64,
    pub use_compel: bool,
}

impl GenerationRequest {
    pub fn from_config(
        prompt: impl Into<String>,
        width: NonZeroU32,
        height: NonZeroU32,
        config: &ConfigMap,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            prompt: prompt.into(),
            width,
            height,
            strength: field(config, "strength", Value::as_f64, "a number")?,
            num_interference_steps: field(
                config,
                "num_interference_steps",
                |v| v.as_u64().and_then(|n| u32::try_from(n).ok()).and_then(NonZeroU32::new),
                "a positive integer",
            )?,
            guidance_scale: field(config, "guidance_scale", Value::as_f64, "a number")?,
            use_compel: field(config, "use_compel", Value::as_bool, "a boolean")?,
        })
    }
}

fn field<T>(
    config: &ConfigMap,
    key: &str,
    extract: impl Fn(&Value) -> Option<T>,
    expected: &'static str,
) -> Result<T, ConfigError> {
    let value = config.get(key).ok_or_else(|| ConfigError::MissingField {
        key: key.to_string(),
    })?;
    extract(value).ok_or_else(|| ConfigError::InvalidField {
        key: key.to_string(),
        expected,
    })
}
