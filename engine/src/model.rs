use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{Result, eyre::WrapErr as _};
use serde::Deserialize;
use serde_json::Value;
use strum::Display;

use crate::resolver::ConfigMap;

/// Where the image lives in a successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ImageEncoding {
    /// The output field holds URLs that have to be fetched.
    #[strum(to_string = "url")]
    Url,
    /// The output field holds `data:<mime>;base64,<payload>` strings.
    #[strum(to_string = "inline")]
    Inline,
}

impl ImageEncoding {
    pub fn from_has_url(has_url: bool) -> Self {
        if has_url { Self::Url } else { Self::Inline }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    pub version: String,
    pub output_path: String,
    pub encoding: ImageEncoding,
}

impl ModelDescriptor {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        output_path: impl Into<String>,
        has_url: bool,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            output_path: output_path.into(),
            encoding: ImageEncoding::from_has_url(has_url),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRequirements {
    pub keys: Vec<String>,
    /// Ordered; the first entry containing a key provides its default.
    pub defaults: Vec<ConfigMap>,
}

impl ModelRequirements {
    pub fn default_for(&self, key: &str) -> Option<&Value> {
        self.defaults.iter().find_map(|entry| entry.get(key))
    }
}

/// On-disk description of a model, one json file per model.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDefinition {
    pub keys: Vec<String>,
    #[serde(default)]
    pub defaults: Vec<ConfigMap>,
    pub output_path: String,
    pub has_url: bool,
}

impl ModelDefinition {
    pub fn load(models_dir: &Path, model_id: &str) -> Result<Self> {
        let path = Self::path_for(models_dir, model_id);
        let src = fs::read_to_string(&path)
            .wrap_err_with(|| format!("Reading model definition {}", path.display()))?;
        serde_json::from_str(&src)
            .wrap_err_with(|| format!("Parsing model definition {}", path.display()))
    }

    /// `stability-ai/sdxl-turbo` lives in `<models_dir>/sdxl-turbo.json`.
    pub fn path_for(models_dir: &Path, model_id: &str) -> PathBuf {
        let short_name = model_id.rsplit('/').next().unwrap_or(model_id);
        models_dir.join(format!("{short_name}.json"))
    }

    pub fn requirements(&self) -> ModelRequirements {
        ModelRequirements {
            keys: self.keys.clone(),
            defaults: self.defaults.clone(),
        }
    }

    pub fn descriptor(&self, model_id: &str, version: &str) -> ModelDescriptor {
        ModelDescriptor::new(model_id, version, &self.output_path, self.has_url)
    }
}
