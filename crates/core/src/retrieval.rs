//! Bounded candidate pools drawn from complementary categories
//!
//! A product is only ever scored against categories it can be worn with.
//! Each target category contributes at most the cap of its tier, so the pool
//! stays bounded however large the catalog grows.

use crate::catalog::CatalogStore;
use crate::domain::product::Product;
use crate::errors::ApplicationError;

/// Default per-position caps for the adjacency list.
pub const DEFAULT_RETRIEVAL_TIERS: [usize; 3] = [500, 300, 200];

/// Complementary sub-categories for each base sub-category, in priority order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMap {
    entries: Vec<(String, Vec<String>)>,
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self::new([
            ("topwear", &["bottomwear", "shoes", "accessories"][..]),
            ("bottomwear", &["topwear", "shoes", "accessories"][..]),
            ("shoes", &["bottomwear", "topwear", "accessories"][..]),
            ("accessories", &["topwear", "bottomwear", "shoes"][..]),
        ])
    }
}

impl CategoryMap {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a [&'a str])>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(base, targets)| {
                    (
                        base.trim().to_lowercase(),
                        targets.iter().map(|target| target.trim().to_lowercase()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Lower-cased target categories, or `None` for an unmapped sub-category.
    pub fn targets(&self, sub_category: &str) -> Option<&[String]> {
        let key = sub_category.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(base, _)| *base == key)
            .map(|(_, targets)| targets.as_slice())
    }
}

/// Outfit slot name for a target category.
pub fn slot_name(category: &str) -> String {
    match category.trim().to_lowercase().as_str() {
        "topwear" => "top".to_owned(),
        "bottomwear" => "bottom".to_owned(),
        "shoes" => "shoe".to_owned(),
        "accessories" => "accessory".to_owned(),
        other => other.to_owned(),
    }
}

#[derive(Debug, Clone)]
pub struct CandidateRetriever {
    categories: CategoryMap,
    tiers: Vec<usize>,
}

impl Default for CandidateRetriever {
    fn default() -> Self {
        Self::new(CategoryMap::default(), DEFAULT_RETRIEVAL_TIERS.to_vec())
    }
}

impl CandidateRetriever {
    pub fn new(categories: CategoryMap, tiers: Vec<usize>) -> Self {
        Self { categories, tiers }
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    /// Target categories with their caps. Positions past the last tier reuse its cap.
    pub fn plan(&self, sub_category: &str) -> Vec<(String, usize)> {
        let Some(targets) = self.categories.targets(sub_category) else {
            return Vec::new();
        };
        let last = self.tiers.last().copied().unwrap_or(0);

        targets
            .iter()
            .enumerate()
            .map(|(position, target)| {
                (target.clone(), self.tiers.get(position).copied().unwrap_or(last))
            })
            .collect()
    }

    /// Candidate pool for `base` in target order, then catalog order.
    pub async fn retrieve<S>(&self, store: &S, base: &Product) -> Result<Vec<Product>, ApplicationError>
    where
        S: CatalogStore + ?Sized,
    {
        let mut pool = Vec::new();
        for (category, cap) in self.plan(&base.sub_category) {
            if cap == 0 {
                continue;
            }
            let products = store.fetch_products_by_category(&category, &base.id, cap).await?;
            pool.extend(products.into_iter().filter(|product| product.id != base.id));
        }
        Ok(pool)
    }
}
