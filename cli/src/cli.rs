use std::{num::NonZeroU32, path::PathBuf};

use tti_engine::client::DEFAULT_API_BASE;

/// Generate an image from a text prompt with a hosted inference model
#[derive(Debug, clap::Parser)]
pub struct Cli {
    /// Prompt to generate the image from
    #[arg(long)]
    pub prompt: String,

    /// Json config naming the model and its generation parameters
    #[arg(long)]
    pub config: PathBuf,

    #[arg(long)]
    pub width: NonZeroU32,

    #[arg(long)]
    pub height: NonZeroU32,

    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "generated-output.png")]
    pub output_name: String,

    /// Directory with one model definition file per model
    #[arg(long, default_value = "models")]
    pub models_dir: PathBuf,

    /// Json object of extra request headers
    #[arg(long)]
    pub headers: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Model version, looked up from the api when omitted
    #[arg(long)]
    pub version: Option<String>,

    /// Request timeout in seconds, no timeout by default
    #[arg(long)]
    pub timeout: Option<u64>,
}
