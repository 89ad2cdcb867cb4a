use std::sync::Arc;

use outfitter_core::catalog::CatalogStore;
use outfitter_core::domain::product::ProductId;
use outfitter_core::engine::{CompatibilityEngine, RecomputeReport};
use outfitter_db::SqlCatalogRepository;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::commands::{
    application_failure, invalid_input, open_database, prepare, CommandResult, Failure,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecomputeTarget {
    Product(String),
    All,
}

#[derive(Debug, Serialize)]
pub struct ProductFailure {
    pub product_id: ProductId,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkReport {
    pub products: usize,
    pub edges: usize,
    pub failures: Vec<ProductFailure>,
}

pub fn run(target: RecomputeTarget) -> CommandResult {
    let (config, runtime) = match prepare("recompute") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let engine = Arc::new(CompatibilityEngine::from_config(&config.engine));
    let concurrency = config.engine.worker_concurrency;

    match target {
        RecomputeTarget::Product(raw_id) => {
            let result = runtime.block_on(async {
                let product_id: ProductId = raw_id
                    .parse()
                    .map_err(|_| invalid_input(format!("invalid product id `{raw_id}`")))?;
                let pool = open_database(&config).await?;
                let catalog = SqlCatalogRepository::new(pool.clone());
                let report = engine
                    .recompute_by_id(&catalog, &product_id)
                    .await
                    .map_err(|error| application_failure(&error));
                pool.close().await;
                report
            });

            match result {
                Ok(report) => CommandResult::success_with_data(
                    "recompute",
                    format!("{} edges stored for {}", report.edges, report.base_product_id),
                    &report,
                ),
                Err(failure) => CommandResult::from_failure("recompute", failure),
            }
        }
        RecomputeTarget::All => {
            let result = runtime.block_on(async {
                let pool = open_database(&config).await?;
                let catalog = Arc::new(SqlCatalogRepository::new(pool.clone()));
                let report = recompute_all(catalog, engine, concurrency).await;
                pool.close().await;
                report
            });

            match result {
                Ok(report) if report.failures.is_empty() => CommandResult::success_with_data(
                    "recompute",
                    format!("{} products recomputed, {} edges stored", report.products, report.edges),
                    &report,
                ),
                Ok(report) => CommandResult::failure_with_data(
                    "recompute",
                    "recompute_partial",
                    format!(
                        "{} of {} products failed to recompute",
                        report.failures.len(),
                        report.products
                    ),
                    9,
                    &report,
                ),
                Err(failure) => CommandResult::from_failure("recompute", failure),
            }
        }
    }
}

/// Recomputes every product with at most `concurrency` passes in flight.
///
/// One product failing does not stop the others.
pub async fn recompute_all(
    catalog: Arc<dyn CatalogStore>,
    engine: Arc<CompatibilityEngine>,
    concurrency: usize,
) -> Result<BulkReport, Failure> {
    let ids = catalog.list_product_ids().await.map_err(|error| application_failure(&error))?;
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for product_id in ids {
        let permit = permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|error| ("runtime_init", error.to_string(), 3u8))?;
        let catalog = catalog.clone();
        let engine = engine.clone();
        tasks.spawn(async move {
            let outcome = engine.recompute_by_id(catalog.as_ref(), &product_id).await;
            drop(permit);
            (product_id, outcome)
        });
    }

    let mut report = BulkReport::default();
    while let Some(joined) = tasks.join_next().await {
        let (product_id, outcome): (ProductId, Result<RecomputeReport, _>) =
            joined.map_err(|error| ("runtime_init", error.to_string(), 3u8))?;
        report.products += 1;
        match outcome {
            Ok(single) => report.edges += single.edges,
            Err(error) => report.failures.push(ProductFailure { product_id, error: error.to_string() }),
        }
    }
    report.failures.sort_by(|a, b| a.product_id.cmp(&b.product_id));

    Ok(report)
}
