use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use log::{debug, info, warn};
use serde_json::Value;

use crate::{
    error::{CallStage, DecodeError, InferenceError, TransportError, TransportErrorKind},
    model::{ImageEncoding, ModelDescriptor},
    payload::build_payload,
    request::GenerationRequest,
    transport::{HttpResponse, Transport, TransportFuture},
};

pub const DEFAULT_API_BASE: &str = "https://api.deepinfra.com";

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    pub data: Vec<u8>,
    /// Server reported generation time, zero if the response did not carry one.
    pub runtime_ms: u64,
}

pub struct InferenceClient<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> InferenceClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_base_url(transport, DEFAULT_API_BASE)
    }

    pub fn with_base_url(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, model: &ModelDescriptor) -> String {
        format!(
            "{}/v1/inference/{}?version={}",
            self.base_url, model.name, model.version
        )
    }

    pub async fn generate(
        &self,
        model: &ModelDescriptor,
        request: &GenerationRequest,
    ) -> Result<InferenceResult, InferenceError> {
        let payload = build_payload(&model.name, request);
        let url = self.endpoint(model);
        debug!("Inference payload for {url}: {payload}");

        let resp = checked(
            CallStage::Inference,
            self.transport.post_json(&url, &payload),
        )
        .await?;
        let body: Value = serde_json::from_slice(&resp.body).map_err(DecodeError::MalformedBody)?;

        let image_ref = first_output(&body, &model.output_path)?;
        let runtime_ms = runtime_ms(&body);

        let data = match model.encoding {
            ImageEncoding::Url => {
                debug!("Fetching image from {image_ref}");
                checked(CallStage::ImageFetch, self.transport.get(&image_ref))
                    .await?
                    .body
                    .to_vec()
            }
            ImageEncoding::Inline => decode_inline(&image_ref)?,
        };

        info!("Received {} image bytes from {}", data.len(), model.name);
        Ok(InferenceResult { data, runtime_ms })
    }
}

pub(crate) async fn checked(
    stage: CallStage,
    call: TransportFuture<'_>,
) -> Result<HttpResponse, TransportError> {
    let resp = call.await.map_err(|e| TransportError {
        stage,
        kind: TransportErrorKind::Connection(e),
    })?;
    if !resp.is_success() {
        return Err(TransportError {
            stage,
            kind: TransportErrorKind::Status {
                status: resp.status,
                body: resp.text(),
            },
        });
    }
    Ok(resp)
}

fn first_output(body: &Value, output_path: &str) -> Result<String, DecodeError> {
    let items = body
        .get(output_path)
        .and_then(Value::as_array)
        .ok_or_else(|| DecodeError::MissingField(output_path.to_string()))?;
    items
        .first()
        .ok_or_else(|| DecodeError::EmptyOutput(output_path.to_string()))?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DecodeError::NotAString(output_path.to_string()))
}

fn runtime_ms(body: &Value) -> u64 {
    let reported = &body["inference_status"]["runtime_ms"];
    let ms = reported.as_u64().or_else(|| {
        reported
            .as_f64()
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms.round() as u64)
    });
    match ms {
        Some(ms) => ms,
        None => {
            warn!("Response carries no inference_status.runtime_ms, reporting 0");
            0
        }
    }
}

/// Decodes `<prefix>,<base64 payload>`, ignoring the prefix.
pub fn decode_inline(value: &str) -> Result<Vec<u8>, DecodeError> {
    let (_meta, payload) = value
        .split_once(',')
        .ok_or(DecodeError::MissingSeparator)?;
    BASE64
        .decode(payload.trim().as_bytes())
        .map_err(DecodeError::InvalidEncoding)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use serde_json::json;

    use super::*;
    use crate::transport::fake::{Call, FakeTransport};

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "cat".into(),
            width: NonZeroU32::new(512).unwrap(),
            height: NonZeroU32::new(512).unwrap(),
            strength: 0.5,
            num_interference_steps: NonZeroU32::new(20).unwrap(),
            guidance_scale: 7.5,
            use_compel: false,
        }
    }

    fn model(name: &str, has_url: bool) -> ModelDescriptor {
        ModelDescriptor::new(name, "v1", "images", has_url)
    }

    #[tokio::test]
    async fn url_variant_fetches_image() {
        let png = b"\x89PNG\r\n\x1a\nrest".to_vec();
        let transport = FakeTransport::default()
            .respond(
                200,
                json!({"images": ["http://example/x.png"], "inference_status": {"runtime_ms": 1200}})
                    .to_string(),
            )
            .respond(200, png.clone());
        let client = InferenceClient::with_base_url(transport, "http://api.test/");

        let result = client
            .generate(&model("owner/model", true), &request())
            .await
            .unwrap();
        assert_eq!(result.data, png);
        assert_eq!(result.runtime_ms, 1200);

        let calls = client.transport().calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(
            &calls[0],
            Call::Post { url, body } if url == "http://api.test/v1/inference/owner/model?version=v1"
                && body["prompt"] == "cat"
        ));
        assert_eq!(
            calls[1],
            Call::Get {
                url: "http://example/x.png".into()
            }
        );
    }

    #[tokio::test]
    async fn inline_variant_decodes() {
        let transport = FakeTransport::default()
            .respond(200, json!({"images": ["data:image/png;base64,aGVsbG8="]}).to_string());
        let client = InferenceClient::new(transport);

        let result = client
            .generate(&model("owner/model", false), &request())
            .await
            .unwrap();
        assert_eq!(result.data, b"hello");
        assert_eq!(result.runtime_ms, 0);
        assert_eq!(client.transport().calls().len(), 1);
    }

    #[tokio::test]
    async fn nested_family_payload_on_wire() {
        let transport = FakeTransport::default()
            .respond(200, json!({"images": ["x,aGVsbG8="]}).to_string());
        let client = InferenceClient::new(transport);
        client
            .generate(&model("stability-ai/sdxl-turbo", false), &request())
            .await
            .unwrap();

        let Call::Post { body, .. } = &client.transport().calls()[0] else {
            panic!("expected a post");
        };
        let obj = body.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["input"].as_object().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn empty_or_missing_output_is_decode_error() {
        for body in [
            json!({"images": []}),
            json!({"other": ["x"]}),
            json!({"images": "not a list"}),
        ] {
            let transport = FakeTransport::default().respond(200, body.to_string());
            let client = InferenceClient::new(transport);
            let err = client
                .generate(&model("owner/model", true), &request())
                .await
                .unwrap_err();
            match err {
                InferenceError::Decode(e) => assert!(!e.is_encoding_error()),
                other => panic!("expected decode error, got {other:?}"),
            }
            // never reaches the image fetch
            assert_eq!(client.transport().calls().len(), 1);
        }
    }

    #[tokio::test]
    async fn bad_inline_data() {
        for (image, missing_separator) in [("aGVsbG8=", true), ("data:x,@@not base64@@", false)] {
            let transport =
                FakeTransport::default().respond(200, json!({"images": [image]}).to_string());
            let client = InferenceClient::new(transport);
            let err = client
                .generate(&model("owner/model", false), &request())
                .await
                .unwrap_err();
            match err {
                InferenceError::Decode(DecodeError::MissingSeparator) => assert!(missing_separator),
                InferenceError::Decode(e @ DecodeError::InvalidEncoding(_)) => {
                    assert!(!missing_separator);
                    assert!(e.is_encoding_error());
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn non_json_body_is_decode_error() {
        let transport = FakeTransport::default().respond(200, "<html>");
        let client = InferenceClient::new(transport);
        let err = client
            .generate(&model("owner/model", false), &request())
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Decode(DecodeError::MalformedBody(_))));
    }

    #[tokio::test]
    async fn primary_status_failure() {
        let transport = FakeTransport::default().respond(422, "bad input");
        let client = InferenceClient::new(transport);
        let err = client
            .generate(&model("owner/model", true), &request())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(CallStage::Inference));
        assert_eq!(err.to_string(), "inference call failed: HTTP 422: bad input");
        assert_eq!(client.transport().calls().len(), 1);
    }

    #[tokio::test]
    async fn image_fetch_failure_is_labeled() {
        let transport = FakeTransport::default()
            .respond(200, json!({"images": ["http://example/x.png"]}).to_string())
            .respond(404, "gone");
        let client = InferenceClient::new(transport);
        let err = client
            .generate(&model("owner/model", true), &request())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(CallStage::ImageFetch));
    }

    #[tokio::test]
    async fn connection_failure() {
        let transport = FakeTransport::default().fail("connection refused");
        let client = InferenceClient::new(transport);
        let err = client
            .generate(&model("owner/model", true), &request())
            .await
            .unwrap_err();
        match err {
            InferenceError::Transport(TransportError {
                stage: CallStage::Inference,
                kind: TransportErrorKind::Connection(source),
            }) => assert_eq!(source.to_string(), "connection refused"),
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fractional_runtime_is_kept() {
        let transport = FakeTransport::default().respond(
            200,
            json!({"images": ["x,aGVsbG8="], "inference_status": {"runtime_ms": 1200.0}}).to_string(),
        );
        let client = InferenceClient::new(transport);
        let result = client
            .generate(&model("owner/model", false), &request())
            .await
            .unwrap();
        assert_eq!(result.runtime_ms, 1200);
    }

    #[test]
    fn runtime_metric_parsing() {
        let body = |ms: Value| json!({"inference_status": {"runtime_ms": ms}});
        assert_eq!(runtime_ms(&body(json!(1200))), 1200);
        assert_eq!(runtime_ms(&body(json!(87.6))), 88);
        assert_eq!(runtime_ms(&body(json!(-5.0))), 0);
        assert_eq!(runtime_ms(&body(json!("1200"))), 0);
        assert_eq!(runtime_ms(&json!({})), 0);
    }

    #[test]
    fn inline_prefix_split_once() {
        assert_eq!(decode_inline("data:image/png;base64,aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_inline(",aGVsbG8=").unwrap(), b"hello");
        // a second comma is part of the payload and therefore invalid base64
        assert!(decode_inline("a,aGVs,bG8=").is_err());
    }
}
