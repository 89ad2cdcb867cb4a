use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use outfitter_core::config::{AppConfig, ConfigError, LoadOptions};
use outfitter_core::engine::{CompatibilityEngine, OutfitRecommender, ProductProcessor};
use outfitter_core::signals::{SignalConfig, SignalExtractor};
use outfitter_db::{
    connect_with_config, migrations, DbPool, SqlCatalogRepository, SqlUserProfileRepository,
};
use thiserror::Error;
use tracing::info;

use crate::embedding::HttpEmbeddingClient;
use crate::routes::ApiState;
use crate::worker::{ProcessWorker, RetryPolicy};
use crate::{health, routes};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("embedding client could not be built: {0}")]
    EmbeddingClient(#[source] reqwest::Error),
}

impl Application {
    pub fn router(&self) -> Router {
        routes::router(self.state.clone()).merge(health::router(self.db_pool.clone()))
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let embeddings = HttpEmbeddingClient::from_config(&config.embedding)
        .map_err(BootstrapError::EmbeddingClient)?;
    let signals = SignalConfig {
        image_base_url: config.embedding.image_base_url.clone(),
        call_timeout: Duration::from_secs(config.embedding.timeout_secs),
        ..SignalConfig::default()
    };
    let processor = ProductProcessor::new(
        SignalExtractor::new(Arc::new(embeddings), signals),
        CompatibilityEngine::from_config(&config.engine),
    );

    let catalog = Arc::new(SqlCatalogRepository::new(db_pool.clone()));
    let worker = ProcessWorker::new(
        processor,
        catalog.clone(),
        RetryPolicy::new(config.embedding.max_retries),
    );
    let state = ApiState {
        catalog,
        users: Arc::new(SqlUserProfileRepository::new(db_pool.clone())),
        recommender: Arc::new(OutfitRecommender::from_config(&config.engine)),
        worker,
    };

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use outfitter_core::config::{ConfigOverrides, LoadOptions};
    use outfitter_core::domain::product::ProductId;
    use outfitter_core::engine::CompatibilityEngine;
    use outfitter_db::DemoCatalog;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::bootstrap::bootstrap;

    fn in_memory() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_embedding_url() {
        let mut options = in_memory();
        options.overrides.embedding_base_url = Some("ftp://embeddings.local".to_string());

        let result = bootstrap(options).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("embedding.base_url"), "{message}");
    }

    #[tokio::test]
    async fn bootstrapped_router_serves_seeded_recommendations() {
        let app = bootstrap(in_memory()).await.expect("bootstrap should succeed");
        DemoCatalog::load(&app.db_pool).await.expect("seed");

        let base_id = DemoCatalog::product_ids()[0];
        let engine = CompatibilityEngine::from_config(&app.config.engine);
        let base: ProductId = base_id.parse().expect("seed id");
        engine
            .recompute_by_id(app.state.catalog.as_ref(), &base)
            .await
            .expect("recompute");

        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .uri(format!("/recommendations/{base_id}?user_id={}", DemoCatalog::USER_ID))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(
            &to_bytes(response.into_body(), usize::MAX).await.expect("body"),
        )
        .expect("json");
        assert_eq!(body["outfits"].as_array().map(Vec::len), Some(3));

        let health = app
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(health.status(), StatusCode::OK);

        app.db_pool.close().await;
    }
}
