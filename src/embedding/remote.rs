use crate::embedding::Embedder;
use crate::error::{AppError, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

const PROBE_TEXT: &str = "dimension probe";

/// Blocking client for OpenAI-compatible `/embeddings` endpoints
#[derive(Debug, Clone)]
pub struct RemoteEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    max_retries: usize,
}

impl RemoteEmbedder {
    /// Build the client and probe the endpoint once to learn the vector dimension.
    pub fn connect(
        base_url: &str,
        model: &str,
        api_key: Option<&str>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let auth = format!("Bearer {}", key.trim());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth)
                    .map_err(|_| AppError::embedder(model, "invalid API key"))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::embedder(model, format!("failed to build HTTP client: {}", e)))?;

        let mut embedder = Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimension: 0,
            max_retries: max_retries.max(1),
        };

        let probe = embedder.request(&[PROBE_TEXT])?;
        embedder.dimension = probe.first().map(Vec::len).unwrap_or(0);
        if embedder.dimension == 0 {
            return Err(AppError::embedder(model, "endpoint returned an empty embedding"));
        }
        Ok(embedder)
    }

    fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0usize;
        loop {
            let body = EmbeddingRequest {
                model: &self.model,
                input: inputs,
            };
            match self.client.post(&self.endpoint).json(&body).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp.json().map_err(|e| {
                            AppError::embedder(&self.model, format!("invalid response: {}", e))
                        })?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        if parsed.data.len() != inputs.len() {
                            return Err(AppError::embedder(
                                &self.model,
                                format!(
                                    "endpoint returned {} embeddings for {} inputs",
                                    parsed.data.len(),
                                    inputs.len()
                                ),
                            ));
                        }
                        return Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect());
                    }

                    let text = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if Self::should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!(status = %status, attempt, "Retrying embeddings request");
                        thread::sleep(Self::retry_backoff(attempt));
                        continue;
                    }
                    return Err(AppError::embedder(
                        &self.model,
                        format!("request failed ({}): {}", status, text),
                    ));
                }
                Err(err) => {
                    if (err.is_timeout() || err.is_connect()) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!(error = %err, attempt, "Retrying embeddings request");
                        thread::sleep(Self::retry_backoff(attempt));
                        continue;
                    }
                    return Err(AppError::embedder(&self.model, err.to_string()));
                }
            }
        }
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn retry_backoff(attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        Duration::from_millis(250 * (1 << capped))
    }
}

impl Embedder for RemoteEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            let inputs: Vec<&str> = batch.iter().map(String::as_str).collect();
            let vectors = self.request(&inputs)?;
            if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
                return Err(AppError::embedder(
                    &self.model,
                    format!(
                        "inconsistent embedding dimension: expected {}, got {}",
                        self.dimension,
                        bad.len()
                    ),
                ));
            }
            tracing::debug!(batch = inputs.len(), "Embedded batch");
            out.extend(vectors);
        }
        Ok(out)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn response(vectors: &[(usize, [f32; 3])]) -> String {
        let data: Vec<_> = vectors
            .iter()
            .map(|(index, v)| json!({ "index": index, "embedding": v }))
            .collect();
        json!({ "data": data }).to_string()
    }

    #[test]
    fn test_connect_probes_dimension_and_embeds_in_order() {
        let mut server = mockito::Server::new();
        let _probe = server
            .mock("POST", "/v1/embeddings")
            .match_body(Matcher::PartialJson(json!({ "input": [PROBE_TEXT] })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response(&[(0, [0.0, 0.0, 1.0])]))
            .create();
        let _batch = server
            .mock("POST", "/v1/embeddings")
            .match_body(Matcher::PartialJson(json!({ "input": ["a", "b"] })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response(&[(1, [0.0, 1.0, 0.0]), (0, [1.0, 0.0, 0.0])]))
            .create();

        let base = format!("{}/v1", server.url());
        let embedder =
            RemoteEmbedder::connect(&base, "test-model", None, Duration::from_secs(5), 1).unwrap();
        assert_eq!(embedder.dimension(), 3);

        let vectors = embedder
            .embed(&["a".to_string(), "b".to_string()], 8)
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_connect_fails_on_error_status() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(404)
            .with_body("model not found")
            .create();

        let err = RemoteEmbedder::connect(
            &server.url(),
            "missing-model",
            None,
            Duration::from_secs(5),
            1,
        )
        .err()
        .unwrap();

        assert_eq!(err.error_code(), "EMBEDDER_ERROR");
        assert!(err.to_string().contains("404"));
    }
}
