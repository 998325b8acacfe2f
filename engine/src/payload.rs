use serde_json::{Value, json};
use strum::Display;

use crate::request::GenerationRequest;

/// Layout of the inference request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PayloadShape {
    /// All fields at the top level.
    Flat,
    /// All fields wrapped in a single `input` object.
    Nested,
}

/// Model families whose payload is not flat, matched as substrings of the model id.
/// The first matching entry wins.
const FAMILY_SHAPES: &[(&str, PayloadShape)] = &[("stability-ai/sdxl", PayloadShape::Nested)];

impl PayloadShape {
    pub fn for_model(model_id: &str) -> Self {
        FAMILY_SHAPES
            .iter()
            .find(|(family, _)| model_id.contains(family))
            .map(|(_, shape)| *shape)
            .unwrap_or(Self::Flat)
    }

    pub fn wrap(self, fields: Value) -> Value {
        match self {
            Self::Flat => fields,
            Self::Nested => json!({ "input": fields }),
        }
    }
}

pub fn build_payload(model_id: &str, request: &GenerationRequest) -> Value {
    let fields = json!({
        "prompt": request.prompt,
        "width": request.width.get(),
        "height": request.height.get(),
        "strength": request.strength,
        "num_interference_steps": request.num_interference_steps.get(),
        "guidance_scale": request.guidance_scale,
        "use_compel": request.use_compel,
    });
    PayloadShape::for_model(model_id).wrap(fields)
}
