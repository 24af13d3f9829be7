use std::time::Duration;

use redline_logging::redline_debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::{InferenceError, InferenceFailure};

/// One generation request as the backend sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeRequest {
    pub model_id: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub stop: Vec<String>,
}

#[async_trait::async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InferenceError>;
}

#[derive(Serialize)]
struct InvokeBody<'a> {
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    stop: &'a [String],
}

/// JSON-over-HTTP backend: `POST {endpoint}/model/{model_id}/invoke`.
#[derive(Debug, Clone)]
pub struct HttpInferenceBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpInferenceBackend {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InferenceError::new(InferenceFailure::ServiceUnavailable, err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn invoke_url(&self, model_id: &str) -> String {
        format!("{}/model/{}/invoke", self.endpoint, model_id)
    }
}

#[async_trait::async_trait]
impl InferenceBackend for HttpInferenceBackend {
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InferenceError> {
        let body = serde_json::to_vec(&InvokeBody {
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            top_k: request.top_k,
            stop: &request.stop,
        })
        .map_err(|err| InferenceError::new(InferenceFailure::MalformedResponse, err.to_string()))?;

        let mut builder = self
            .client
            .post(self.invoke_url(&request.model_id))
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;
        redline_debug!(
            "Inference backend answered {status} with {} bytes",
            text.len()
        );

        if !status.is_success() {
            return Err(InferenceError::new(
                classify_status(status, &text),
                format!("{status}: {}", truncate(&text, 200)),
            ));
        }

        let value: Value = serde_json::from_str(&text).map_err(|err| {
            InferenceError::new(InferenceFailure::MalformedResponse, err.to_string())
        })?;
        parse_generation(&value).ok_or_else(|| {
            InferenceError::new(
                InferenceFailure::MalformedResponse,
                format!("unexpected response shape: {}", truncate(&text, 200)),
            )
        })
    }
}

fn classify_status(status: StatusCode, body: &str) -> InferenceFailure {
    if body.contains("ModelNotReady") {
        return InferenceFailure::ModelNotReady;
    }
    match status.as_u16() {
        429 => InferenceFailure::RateLimited,
        401 | 403 => InferenceFailure::CredentialOrAuth,
        500..=599 => InferenceFailure::ServiceUnavailable,
        _ => InferenceFailure::MalformedResponse,
    }
}

/// Pull generated text out of the response shapes model families use.
pub fn parse_generation(value: &Value) -> Option<String> {
    let text = value
        .pointer("/outputs/0/text")
        .or_else(|| value.get("generation"))
        .or_else(|| value.pointer("/content/0/text"))
        .or_else(|| value.get("text"))?;
    text.as_str().map(str::to_string)
}

fn map_reqwest_error(err: reqwest::Error) -> InferenceError {
    InferenceError::new(InferenceFailure::ServiceUnavailable, err.to_string())
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_response_shapes() {
        let shapes = [
            json!({"outputs": [{"text": "a", "stop_reason": "stop"}]}),
            json!({"generation": "a"}),
            json!({"content": [{"type": "text", "text": "a"}]}),
            json!({"text": "a"}),
        ];
        for shape in shapes {
            assert_eq!(parse_generation(&shape).as_deref(), Some("a"), "{shape}");
        }
        assert_eq!(parse_generation(&json!({"result": "a"})), None);
    }

    #[test]
    fn status_classes() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            InferenceFailure::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, ""),
            InferenceFailure::CredentialOrAuth
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            InferenceFailure::ServiceUnavailable
        );
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, "{}"),
            InferenceFailure::MalformedResponse
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "ModelNotReadyException"),
            InferenceFailure::ModelNotReady
        );
    }
}
