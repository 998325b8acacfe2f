pub mod client;
pub mod error;
pub mod model;
pub mod payload;
pub mod request;
pub mod resolver;
pub mod transport;
pub mod version;

pub use client::{InferenceClient, InferenceResult};
pub use model::{ModelDefinition, ModelDescriptor, ModelRequirements};
pub use request::GenerationRequest;
pub use resolver::{UserConfig, resolve};
pub use transport::{ClientConfig, HttpTransport, Transport};
pub use version::resolve_version;
