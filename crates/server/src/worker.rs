use std::sync::Arc;
use std::time::Duration;

use outfitter_core::catalog::CatalogStore;
use outfitter_core::domain::product::ProductId;
use outfitter_core::engine::{ProductProcessor, RecomputeReport};
use outfitter_core::errors::ApplicationError;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries, base_delay: Duration::from_secs(1) }
    }

    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Runs `ProductProcessor::process` off the request path and retries
/// retryable failures.
#[derive(Clone)]
pub struct ProcessWorker {
    processor: Arc<ProductProcessor>,
    catalog: Arc<dyn CatalogStore>,
    policy: RetryPolicy,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl ProcessWorker {
    pub fn new(
        processor: ProductProcessor,
        catalog: Arc<dyn CatalogStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            processor: Arc::new(processor),
            catalog,
            policy,
            tasks: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub async fn enqueue(&self, product_id: ProductId) {
        let worker = self.clone();
        let mut tasks = self.tasks.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let _ = worker.run(product_id).await;
        });
    }

    pub async fn run(&self, product_id: ProductId) -> Result<RecomputeReport, ApplicationError> {
        let mut attempt = 0;
        loop {
            match self.processor.process(self.catalog.as_ref(), &product_id).await {
                Ok(report) => {
                    info!(
                        event_name = "worker.process.completed",
                        product_id = %product_id,
                        attempts = attempt + 1,
                        edges = report.edges,
                        "product processed"
                    );
                    return Ok(report);
                }
                Err(error) if error.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        event_name = "worker.process.retry",
                        product_id = %product_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "product processing failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    error!(
                        event_name = "worker.process.failed",
                        product_id = %product_id,
                        attempts = attempt + 1,
                        retryable = error.is_retryable(),
                        error = %error,
                        "product processing abandoned"
                    );
                    return Err(error);
                }
            }
        }
    }

    /// Waits for queued tasks, giving up after `grace`. Returns whether every
    /// task finished.
    pub async fn drain(&self, grace: Duration) -> bool {
        let mut tasks = self.tasks.lock().await;
        let finished = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_ok();
        if !finished {
            warn!(
                event_name = "worker.drain.timeout",
                remaining = tasks.len(),
                "shutdown grace period elapsed with tasks still running"
            );
            tasks.abort_all();
        }
        finished
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use outfitter_core::catalog::{CatalogStore, InMemoryCatalog};
    use outfitter_core::domain::product::{Embedding, Product, ProductId};
    use outfitter_core::engine::{CompatibilityEngine, ProductProcessor};
    use outfitter_core::errors::{ApplicationError, DomainError};
    use outfitter_core::signals::{
        EmbeddingError, EmbeddingService, EmbeddingSpace, SignalConfig, SignalExtractor,
    };

    use super::{ProcessWorker, RetryPolicy};

    /// Fails the first `failures` image calls, then answers with a fixed vector.
    pub(crate) struct FlakyEmbeddings {
        pub failures: u32,
        pub image_calls: AtomicU32,
    }

    #[async_trait]
    impl EmbeddingService for FlakyEmbeddings {
        async fn embed_image(&self, _image_url: &str) -> Result<Embedding, EmbeddingError> {
            let call = self.image_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(EmbeddingError::Unavailable("connection refused".to_string()));
            }
            Ok(vec![1.0, 0.0, 0.0])
        }

        async fn embed_text(
            &self,
            _space: EmbeddingSpace,
            _text: &str,
        ) -> Result<Embedding, EmbeddingError> {
            Ok(vec![0.5, 0.5, 0.0])
        }
    }

    pub(crate) fn raw_product(sub_category: &str, images: Vec<String>) -> Product {
        Product {
            id: ProductId::new(),
            name: format!("{sub_category} item"),
            brand: "Stride".to_string(),
            gender: "Women".to_string(),
            master_category: "Apparel".to_string(),
            sub_category: sub_category.to_string(),
            article_type: "Generic".to_string(),
            primary_colour: "Black".to_string(),
            fit: None,
            season: None,
            price: 40.0,
            occasion_tags: Vec::new(),
            formality_score: 0.5,
            style_archetype: None,
            images,
            style_embedding: None,
            complementary_embedding: None,
            semantic_embedding: None,
        }
    }

    fn worker(
        catalog: Arc<InMemoryCatalog>,
        embeddings: Arc<FlakyEmbeddings>,
        max_retries: u32,
    ) -> ProcessWorker {
        let processor = ProductProcessor::new(
            SignalExtractor::new(embeddings, SignalConfig::default()),
            CompatibilityEngine::default(),
        );
        ProcessWorker::new(
            processor,
            catalog,
            RetryPolicy { max_retries, base_delay: Duration::from_millis(1) },
        )
    }

    #[test]
    fn retry_delay_doubles_from_base() {
        let policy = RetryPolicy::new(3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn transient_embedding_failure_is_retried_until_success() {
        let product = raw_product("Topwear", vec!["tops/a.jpg".to_string()]);
        let catalog = Arc::new(InMemoryCatalog::new(vec![product.clone()]));
        let embeddings = Arc::new(FlakyEmbeddings { failures: 2, image_calls: AtomicU32::new(0) });

        let report = worker(catalog.clone(), embeddings.clone(), 3)
            .run(product.id)
            .await
            .expect("third attempt succeeds");

        assert_eq!(report.base_product_id, product.id);
        assert_eq!(embeddings.image_calls.load(Ordering::SeqCst), 3);
        let stored = catalog.find(&product.id).await.expect("product kept");
        assert_eq!(stored.style_embedding, Some(vec![1.0, 0.0, 0.0]));
    }

    #[tokio::test]
    async fn retries_stop_at_the_configured_limit() {
        let product = raw_product("Topwear", vec!["tops/a.jpg".to_string()]);
        let catalog = Arc::new(InMemoryCatalog::new(vec![product.clone()]));
        let embeddings = Arc::new(FlakyEmbeddings { failures: 10, image_calls: AtomicU32::new(0) });

        let error = worker(catalog.clone(), embeddings.clone(), 2)
            .run(product.id)
            .await
            .expect_err("exhausts retries");

        assert!(matches!(error, ApplicationError::Integration(_)));
        assert_eq!(embeddings.image_calls.load(Ordering::SeqCst), 3);
        let stored = catalog.find(&product.id).await.expect("product kept");
        assert_eq!(stored.style_embedding, None);
    }

    #[tokio::test]
    async fn non_retryable_failure_is_not_retried() {
        let product = raw_product("Topwear", Vec::new());
        let catalog = Arc::new(InMemoryCatalog::new(vec![product.clone()]));
        let embeddings = Arc::new(FlakyEmbeddings { failures: 0, image_calls: AtomicU32::new(0) });

        let error = worker(catalog, embeddings.clone(), 5)
            .run(product.id)
            .await
            .expect_err("product without images");

        assert!(matches!(error, ApplicationError::Domain(DomainError::InvariantViolation(_))));
        assert_eq!(embeddings.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn enqueued_tasks_finish_before_drain_returns() {
        let product = raw_product("Shoes", vec!["shoes/a.jpg".to_string()]);
        let catalog = Arc::new(InMemoryCatalog::new(vec![product.clone()]));
        let embeddings = Arc::new(FlakyEmbeddings { failures: 1, image_calls: AtomicU32::new(0) });
        let worker = worker(catalog.clone(), embeddings, 3);

        worker.enqueue(product.id).await;
        assert!(worker.drain(Duration::from_secs(5)).await);

        let edges = catalog.fetch_compatibility_edges(&product.id).await.expect("edges");
        assert!(edges.is_empty(), "no complements in a one-product catalog");
        let stored = catalog.find(&product.id).await.expect("product kept");
        assert!(stored.complementary_embedding.is_some());
    }
}
