use std::time::Duration;

use async_trait::async_trait;
use outfitter_core::config::EmbeddingConfig;
use outfitter_core::domain::product::Embedding;
use outfitter_core::signals::{EmbeddingError, EmbeddingService, EmbeddingSpace};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// `EmbeddingService` backed by a JSON embedding endpoint.
///
/// `POST {base_url}/embed/image` and `POST {base_url}/embed/text` both answer
/// with `{"embedding": [...]}`.
#[derive(Clone)]
pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    visual_model: String,
    text_model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    image_url: &'a str,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    model: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Embedding,
}

impl HttpEmbeddingClient {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            visual_model: config.visual_model.clone(),
            text_model: config.text_model.clone(),
            timeout,
        })
    }

    fn model_for(&self, space: EmbeddingSpace) -> &str {
        match space {
            EmbeddingSpace::Visual => &self.visual_model,
            EmbeddingSpace::Semantic => &self.text_model,
        }
    }

    async fn post_embedding<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Embedding, EmbeddingError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                EmbeddingError::Timeout(self.timeout)
            } else {
                EmbeddingError::Unavailable(format!("{url}: {error}"))
            }
        })?;

        if !response.status().is_success() {
            return Err(EmbeddingError::Unavailable(format!(
                "{url} returned {}",
                response.status()
            )));
        }

        let payload: EmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingError::Malformed(format!("failed to decode embedding response: {error}"))
        })?;
        if payload.embedding.is_empty() {
            return Err(EmbeddingError::Malformed("endpoint returned an empty vector".to_string()));
        }
        Ok(payload.embedding)
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingClient {
    async fn embed_image(&self, image_url: &str) -> Result<Embedding, EmbeddingError> {
        self.post_embedding(
            "/embed/image",
            &ImageRequest { model: &self.visual_model, image_url },
        )
        .await
    }

    async fn embed_text(
        &self,
        space: EmbeddingSpace,
        text: &str,
    ) -> Result<Embedding, EmbeddingError> {
        self.post_embedding("/embed/text", &TextRequest { model: self.model_for(space), text })
            .await
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use outfitter_core::config::AppConfig;
    use outfitter_core::signals::{EmbeddingError, EmbeddingService, EmbeddingSpace};
    use serde_json::{json, Value};

    use super::HttpEmbeddingClient;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}")
    }

    fn client(base_url: String, api_key: Option<&str>) -> HttpEmbeddingClient {
        let mut config = AppConfig::default().embedding;
        config.base_url = base_url;
        config.api_key = api_key.map(|key| key.to_string().into());
        config.timeout_secs = 5;
        HttpEmbeddingClient::from_config(&config).expect("client")
    }

    #[tokio::test]
    async fn image_and_text_requests_carry_model_and_key() {
        let router = Router::new()
            .route(
                "/embed/image",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    let authorized = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        == Some("Bearer sk-test");
                    let first = if authorized && body["image_url"] == "http://img/a.jpg" {
                        1.0
                    } else {
                        0.0
                    };
                    Json(json!({ "embedding": [first, 0.5] }))
                }),
            )
            .route(
                "/embed/text",
                post(|Json(body): Json<Value>| async move {
                    let marker = if body["model"] == "all-MiniLM-L6-v2" { 2.0 } else { 3.0 };
                    Json(json!({ "embedding": [marker] }))
                }),
            );
        let client = client(serve(router).await, Some("sk-test"));

        let image = client.embed_image("http://img/a.jpg").await.expect("image embedding");
        assert_eq!(image, vec![1.0, 0.5]);

        let semantic =
            client.embed_text(EmbeddingSpace::Semantic, "linen shirt").await.expect("semantic");
        assert_eq!(semantic, vec![2.0]);
        let visual =
            client.embed_text(EmbeddingSpace::Visual, "a photo of a shirt").await.expect("visual");
        assert_eq!(visual, vec![3.0]);
    }

    #[tokio::test]
    async fn error_status_maps_to_unavailable() {
        let router = Router::new().route(
            "/embed/image",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "warming up") }),
        );
        let client = client(serve(router).await, None);

        let error = client.embed_image("http://img/a.jpg").await.expect_err("503");
        assert!(matches!(error, EmbeddingError::Unavailable(_)));
    }

    #[tokio::test]
    async fn empty_or_undecodable_payload_is_malformed() {
        let router = Router::new()
            .route("/embed/image", post(|| async { Json(json!({ "embedding": [] })) }))
            .route("/embed/text", post(|| async { Json(json!({ "vector": [1.0] })) }));
        let client = client(serve(router).await, None);

        let empty = client.embed_image("http://img/a.jpg").await.expect_err("empty");
        assert!(matches!(empty, EmbeddingError::Malformed(_)));

        let undecodable =
            client.embed_text(EmbeddingSpace::Semantic, "text").await.expect_err("bad shape");
        assert!(matches!(undecodable, EmbeddingError::Malformed(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        drop(listener);

        let client = client(format!("http://{address}"), None);
        let error = client.embed_image("http://img/a.jpg").await.expect_err("refused");
        assert!(matches!(error, EmbeddingError::Unavailable(_)));
    }
}
