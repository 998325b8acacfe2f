use log::info;
use serde_json::Value;
use thiserror::Error;

use crate::{
    client::checked,
    error::{CallStage, TransportError},
    transport::Transport,
};

#[derive(Debug, Error)]
pub enum VersionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Model info for {model} is not valid JSON")]
    MalformedBody {
        model: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Model info for {model} has no version")]
    MissingVersion { model: String },
}

/// Looks up the version string the inference endpoint expects for `model_id`.
pub async fn resolve_version(
    transport: &impl Transport,
    base_url: &str,
    model_id: &str,
) -> Result<String, VersionError> {
    let url = format!("{}/models/{model_id}", base_url.trim_end_matches('/'));
    let resp = checked(CallStage::VersionLookup, transport.get(&url)).await?;

    let info: Value =
        serde_json::from_slice(&resp.body).map_err(|source| VersionError::MalformedBody {
            model: model_id.to_string(),
            source,
        })?;
    let version = info["version"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| VersionError::MissingVersion {
            model: model_id.to_string(),
        })?;
    info!("Version: {version}");
    Ok(version)
}
