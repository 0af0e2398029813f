//! Embedding collaborator interface and the OpenAI-compatible client

use std::future::Future;

use super::error::{RetrievalError, RetrievalResult};
use super::types::Embedding;

/// Maps a text to a fixed-length vector
///
/// Implementations must return an error rather than a placeholder vector
/// when the underlying service fails.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> impl Future<Output = RetrievalResult<Embedding>> + Send;
}

/// Adapter turning a synchronous function into an [`Embedder`]
pub struct FnEmbedder<F> {
    func: F,
}

impl<F> FnEmbedder<F>
where
    F: Fn(&str) -> RetrievalResult<Embedding> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Embedder for FnEmbedder<F>
where
    F: Fn(&str) -> RetrievalResult<Embedding> + Send + Sync,
{
    async fn embed(&self, text: &str) -> RetrievalResult<Embedding> {
        (self.func)(text)
    }
}

#[cfg(feature = "openai")]
pub use client::EmbeddingClient;

#[cfg(feature = "openai")]
mod client {
    use reqwest::Client;
    use serde::{Deserialize, Serialize};

    use super::{Embedder, Embedding, RetrievalError, RetrievalResult};
    use crate::retrieval::config::EmbeddingConfig;

    /// Inputs are cut to this many characters before sending; most
    /// embedding APIs reject anything much past ~8K tokens.
    const MAX_CHARS: usize = 8000;

    /// OpenAI / Azure OpenAI embedding API client
    pub struct EmbeddingClient {
        config: EmbeddingConfig,
        api_key: String,
        client: Client,
    }

    #[derive(Debug, Serialize)]
    struct EmbeddingRequest<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<&'a str>,
        input: Vec<String>,
        /// Only sent for models that support it (text-embedding-3-*)
        #[serde(skip_serializing_if = "Option::is_none")]
        dimensions: Option<usize>,
    }

    #[derive(Debug, Deserialize)]
    struct EmbeddingResponse {
        data: Vec<EmbeddingData>,
    }

    #[derive(Debug, Deserialize)]
    struct EmbeddingData {
        embedding: Vec<f32>,
    }

    #[derive(Debug, Deserialize)]
    struct ErrorResponse {
        error: ErrorDetail,
    }

    #[derive(Debug, Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    impl EmbeddingClient {
        /// Create a new embedding client
        pub fn new(config: EmbeddingConfig) -> RetrievalResult<Self> {
            let api_key = config.get_api_key()?;

            let client = Client::builder()
                .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
                .build()
                .map_err(|e| RetrievalError::Embedding(format!("HTTP client: {}", e)))?;

            Ok(Self {
                config,
                api_key,
                client,
            })
        }

        /// Expected vector width
        pub fn dimensions(&self) -> usize {
            self.config.dimensions
        }

        fn url(&self) -> String {
            let base = self.config.api_base.trim_end_matches('/');
            match self.config.api_version {
                Some(ref version) => format!(
                    "{}/openai/deployments/{}/embeddings?api-version={}",
                    base, self.config.model, version
                ),
                None => format!("{}/embeddings", base),
            }
        }

        async fn request(&self, text: &str) -> RetrievalResult<Embedding> {
            let input = if text.chars().count() > MAX_CHARS {
                text.chars().take(MAX_CHARS).collect()
            } else {
                text.to_string()
            };

            let dimensions = if self.config.model.starts_with("text-embedding-3") {
                Some(self.config.dimensions)
            } else {
                None
            };

            // Azure routes by deployment in the URL, not by model field
            let request = EmbeddingRequest {
                model: if self.config.is_azure() {
                    None
                } else {
                    Some(self.config.model.as_str())
                },
                input: vec![input],
                dimensions,
            };

            let builder = self.client.post(self.url()).json(&request);
            let builder = if self.config.is_azure() {
                builder.header("api-key", &self.api_key)
            } else {
                builder.header("Authorization", format!("Bearer {}", self.api_key))
            };

            let response = builder
                .send()
                .await
                .map_err(|e| RetrievalError::Embedding(format!("request failed: {}", e)))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| RetrievalError::Embedding(format!("reading response: {}", e)))?;

            if !status.is_success() {
                if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&body) {
                    return Err(RetrievalError::Embedding(error_response.error.message));
                }
                return Err(RetrievalError::Embedding(format!(
                    "API error ({}): {}",
                    status, body
                )));
            }

            let response: EmbeddingResponse = serde_json::from_str(&body)
                .map_err(|e| RetrievalError::Embedding(format!("malformed response: {}", e)))?;

            let embedding = response
                .data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .ok_or_else(|| RetrievalError::Embedding("No embedding returned".to_string()))?;

            if embedding.len() != self.config.dimensions {
                return Err(RetrievalError::Embedding(format!(
                    "expected {}-dimensional embedding, got {}",
                    self.config.dimensions,
                    embedding.len()
                )));
            }

            Ok(embedding)
        }
    }

    impl Embedder for EmbeddingClient {
        async fn embed(&self, text: &str) -> RetrievalResult<Embedding> {
            self.request(text).await
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_embedder_passes_errors_through() {
        let embedder = FnEmbedder::new(|text: &str| {
            if text.is_empty() {
                Err(RetrievalError::Embedding("empty input".into()))
            } else {
                Ok(vec![text.len() as f32])
            }
        });

        assert_eq!(embedder.embed("abc").await.unwrap(), vec![3.0]);
        assert!(matches!(
            embedder.embed("").await,
            Err(RetrievalError::Embedding(_))
        ));
    }
}
