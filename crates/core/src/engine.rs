//! Offline compatibility recompute and online outfit recommendation
//!
//! `CompatibilityEngine` owns the write side of the compatibility graph,
//! `OutfitRecommender` only reads it. Both take the store per call.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::CatalogStore;
use crate::config::EngineConfig;
use crate::diversity::{DiversitySelector, ScoredCandidate};
use crate::domain::compatibility::CompatibilityEdge;
use crate::domain::outfit::Outfit;
use crate::domain::product::{Product, ProductId};
use crate::domain::user::UserProfile;
use crate::errors::{ApplicationError, DomainError};
use crate::outfits::{BudgetScorer, OutfitAssembler, SlotTemplate};
use crate::personalization::PersonalizationRanker;
use crate::retrieval::{CandidateRetriever, CategoryMap};
use crate::scoring::{CompatibilityScorer, CompatibilityWeights};
use crate::signals::SignalExtractor;

/// Outcome of one recompute pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecomputeReport {
    pub base_product_id: ProductId,
    pub candidates: usize,
    pub skipped: usize,
    pub edges: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CompatibilityEngine {
    retriever: CandidateRetriever,
    scorer: CompatibilityScorer,
    selector: DiversitySelector,
}

impl CompatibilityEngine {
    pub fn new(
        retriever: CandidateRetriever,
        scorer: CompatibilityScorer,
        selector: DiversitySelector,
    ) -> Self {
        Self { retriever, scorer, selector }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            CandidateRetriever::new(CategoryMap::default(), config.retrieval_tiers.clone()),
            CompatibilityScorer::with_weights(
                CompatibilityWeights::default().with_colour(config.colour_weight),
            ),
            DiversitySelector::new(config.diversity_cap),
        )
    }

    pub fn categories(&self) -> &CategoryMap {
        self.retriever.categories()
    }

    /// Scores `pool` against `base` and returns the selected edges in rank order.
    ///
    /// Candidates that cannot be scored are skipped and counted.
    pub fn score_pool(&self, base: &Product, pool: Vec<Product>) -> (Vec<CompatibilityEdge>, usize) {
        let mut skipped = 0;
        let mut scored = Vec::with_capacity(pool.len());
        for candidate in pool {
            match self.scorer.score(base, &candidate) {
                Ok(breakdown) => scored.push(ScoredCandidate { product: candidate, breakdown }),
                Err(error) => {
                    skipped += 1;
                    warn!(
                        event_name = "engine.recompute.candidate_skipped",
                        base_product_id = %base.id,
                        candidate_id = %candidate.id,
                        error = %error,
                        "candidate excluded from compatibility scoring"
                    );
                }
            }
        }

        let occasion_context = base.occasion_context();
        let edges = self
            .selector
            .select(scored)
            .into_iter()
            .enumerate()
            .map(|(rank, candidate)| CompatibilityEdge {
                base_product_id: base.id,
                recommended_product_id: candidate.product.id,
                compatibility_score: candidate.breakdown.total,
                occasion_context: occasion_context.clone(),
                rank: u32::try_from(rank).unwrap_or(u32::MAX),
            })
            .collect();

        (edges, skipped)
    }

    /// Rebuilds and atomically replaces every outgoing edge of `base`.
    pub async fn recompute<S>(&self, store: &S, base: &Product) -> Result<RecomputeReport, ApplicationError>
    where
        S: CatalogStore + ?Sized,
    {
        if base.complementary_embedding.is_none() {
            return Err(DomainError::MissingEmbedding {
                product_id: base.id,
                field: "complementary_embedding",
            }
            .into());
        }

        let started = Instant::now();
        let pool = self.retriever.retrieve(store, base).await?;
        let candidates = pool.len();
        let (edges, skipped) = self.score_pool(base, pool);
        store.replace_compatibility_edges(&base.id, &edges).await?;

        info!(
            event_name = "engine.recompute.completed",
            base_product_id = %base.id,
            candidates,
            skipped,
            edges = edges.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compatibility edges replaced"
        );

        Ok(RecomputeReport { base_product_id: base.id, candidates, skipped, edges: edges.len() })
    }

    pub async fn recompute_by_id<S>(
        &self,
        store: &S,
        product_id: &ProductId,
    ) -> Result<RecomputeReport, ApplicationError>
    where
        S: CatalogStore + ?Sized,
    {
        let base = store
            .fetch_product(product_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("product {product_id}")))?;
        self.recompute(store, &base).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutfitRecommender {
    categories: CategoryMap,
    ranker: PersonalizationRanker,
    assembler: OutfitAssembler,
    budget: BudgetScorer,
}

impl OutfitRecommender {
    pub fn new(
        categories: CategoryMap,
        ranker: PersonalizationRanker,
        assembler: OutfitAssembler,
        budget: BudgetScorer,
    ) -> Self {
        Self { categories, ranker, assembler, budget }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            assembler: OutfitAssembler::new(config.max_outfits),
            ..Self::default()
        }
    }

    /// Complete outfits for `base_product_id`, best first.
    ///
    /// A product without edges, or whose slots cannot all be filled, yields
    /// fewer outfits or none. Only an unknown base product is an error.
    pub async fn recommend<S>(
        &self,
        store: &S,
        base_product_id: &ProductId,
        user: &UserProfile,
    ) -> Result<Vec<Outfit>, ApplicationError>
    where
        S: CatalogStore + ?Sized,
    {
        let base = store
            .fetch_product(base_product_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("product {base_product_id}")))?;

        let edges = store.fetch_compatibility_edges(&base.id).await?;
        let mut candidates = Vec::with_capacity(edges.len());
        for edge in edges {
            match store.fetch_product(&edge.recommended_product_id).await? {
                Some(product) => candidates.push((product, edge.compatibility_score)),
                None => debug!(
                    base_product_id = %base.id,
                    recommended_product_id = %edge.recommended_product_id,
                    "edge points at a product no longer in the catalog"
                ),
            }
        }

        let ranked = self.ranker.rank(user, candidates);
        let template = SlotTemplate::for_base(&self.categories, &base);
        let assembly = self.assembler.assemble(&base.id, &template, &ranked);

        let mut outfits: Vec<Outfit> = assembly
            .outfits
            .into_iter()
            .map(|slots| self.budget.score(&base, slots, user.budget))
            .collect();
        outfits.sort_by(|a, b| b.outfit_score.total_cmp(&a.outfit_score));

        Ok(outfits)
    }
}

/// Background path for a newly ingested product.
#[derive(Clone)]
pub struct ProductProcessor {
    extractor: SignalExtractor,
    engine: CompatibilityEngine,
}

impl ProductProcessor {
    pub fn new(extractor: SignalExtractor, engine: CompatibilityEngine) -> Self {
        Self { extractor, engine }
    }

    /// Derives signals, stores them, then rebuilds the product's edges.
    pub async fn process<S>(&self, store: &S, product_id: &ProductId) -> Result<RecomputeReport, ApplicationError>
    where
        S: CatalogStore + ?Sized,
    {
        let product = store
            .fetch_product(product_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("product {product_id}")))?;

        let product = self.extractor.extract(product).await?;
        store.save_product(&product).await?;
        self.engine.recompute(store, &product).await
    }
}
