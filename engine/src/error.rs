use strum::Display;
use thiserror::Error;

use crate::resolver::ConfigMap;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Required keys that neither the user config nor the model defaults provide.
#[derive(Debug, Error)]
#[error("No value or default for required key(s): {}", .keys.join(", "))]
pub struct MissingDefaultError {
    pub keys: Vec<String>,
    /// Everything that could be resolved. The missing keys are absent.
    pub partial: ConfigMap,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing config entry `{key}`")]
    MissingField { key: String },

    #[error("Config entry `{key}` must be {expected}")]
    InvalidField { key: String, expected: &'static str },
}

/// Which network call of an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CallStage {
    #[strum(to_string = "inference call")]
    Inference,
    #[strum(to_string = "image fetch")]
    ImageFetch,
    #[strum(to_string = "version lookup")]
    VersionLookup,
}

#[derive(Debug, Error)]
#[error("{stage} failed: {kind}")]
pub struct TransportError {
    pub stage: CallStage,
    #[source]
    pub kind: TransportErrorKind,
}

#[derive(Debug, Error)]
pub enum TransportErrorKind {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("connection error")]
    Connection(#[source] BoxError),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Response body is not valid JSON")]
    MalformedBody(#[source] serde_json::Error),

    #[error("Response is missing field `{0}`")]
    MissingField(String),

    #[error("Response field `{0}` holds no images")]
    EmptyOutput(String),

    #[error("First element of `{0}` is not a string")]
    NotAString(String),

    #[error("Inline image data has no `,` separator")]
    MissingSeparator,

    #[error("Inline image data is not valid base64")]
    InvalidEncoding(#[source] base64::DecodeError),
}

impl DecodeError {
    /// True when the response was well formed but its image payload could not be decoded.
    pub fn is_encoding_error(&self) -> bool {
        matches!(self, Self::MissingSeparator | Self::InvalidEncoding(_))
    }
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl InferenceError {
    pub fn stage(&self) -> Option<CallStage> {
        match self {
            Self::Transport(e) => Some(e.stage),
            Self::Decode(_) => None,
        }
    }
}
