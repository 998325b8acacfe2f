use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use color_eyre::{Result, eyre::WrapErr as _};
use log::info;
use tti_engine::{
    ClientConfig, GenerationRequest, HttpTransport, InferenceClient, ModelDefinition, Transport,
    UserConfig, resolve, resolve_version,
};

pub mod cli;

use crate::cli::Cli;

pub async fn run(args: Cli) -> Result<PathBuf> {
    let mut client_config = ClientConfig {
        timeout: args.timeout.map(Duration::from_secs),
        ..Default::default()
    };
    if let Some(headers) = &args.headers {
        client_config.load_headers(headers)?;
    }
    let client = InferenceClient::with_base_url(HttpTransport::new(&client_config)?, &args.api_base);

    let image = generate(&args, &client).await?;
    save_image(&args.output_dir, &args.output_name, &image)
}

/// Everything between reading the config and holding the image bytes.
pub async fn generate<T: Transport>(args: &Cli, client: &InferenceClient<T>) -> Result<Vec<u8>> {
    info!("Loading config file {}", args.config.display());
    let user_config = UserConfig::load(&args.config)?;
    let definition = ModelDefinition::load(&args.models_dir, &user_config.model)?;
    let resolved = resolve(&user_config.params, &definition.requirements())?;
    info!("Config file loaded");

    let version = match &args.version {
        Some(v) => v.clone(),
        None => {
            info!("Retrieving version of {}", user_config.model);
            resolve_version(client.transport(), client.base_url(), &user_config.model)
                .await
                .wrap_err("Retrieving model version")?
        }
    };

    let model = definition.descriptor(&user_config.model, &version);
    let request =
        GenerationRequest::from_config(&args.prompt, args.width, args.height, &resolved.config)?;
    let result = client.generate(&model, &request).await?;
    info!("Image generated in {} ms", result.runtime_ms);

    Ok(result.data)
}

/// Writes `bytes` to `dir/name`, creating `dir` if needed.
pub fn save_image(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    if !dir.exists() {
        info!("Output directory {} does not exist, creating it", dir.display());
        fs::create_dir_all(dir)
            .wrap_err_with(|| format!("Creating output directory {}", dir.display()))?;
    }
    let path = dir.join(name);
    fs::write(&path, bytes).wrap_err_with(|| format!("Writing {}", path.display()))?;
    info!("Saved image to {}", path.display());
    Ok(path)
}
