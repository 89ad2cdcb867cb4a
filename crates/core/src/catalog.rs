use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::compatibility::CompatibilityEdge;
use crate::domain::product::{Product, ProductId};
use crate::domain::user::{UserId, UserProfile};
use crate::errors::ApplicationError;

/// Catalog and compatibility-graph collaborator consumed by the engine.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, ApplicationError>;

    /// Products of one sub-category (case-insensitive) in catalog order.
    async fn fetch_products_by_category(
        &self,
        sub_category: &str,
        exclude: &ProductId,
        limit: usize,
    ) -> Result<Vec<Product>, ApplicationError>;

    async fn save_product(&self, product: &Product) -> Result<(), ApplicationError>;

    async fn list_product_ids(&self) -> Result<Vec<ProductId>, ApplicationError>;

    /// Atomically supersede every outgoing edge of `base`.
    async fn replace_compatibility_edges(
        &self,
        base: &ProductId,
        edges: &[CompatibilityEdge],
    ) -> Result<(), ApplicationError>;

    /// Outgoing edges of `base` in rank order.
    async fn fetch_compatibility_edges(
        &self,
        base: &ProductId,
    ) -> Result<Vec<CompatibilityEdge>, ApplicationError>;
}

#[async_trait]
pub trait UserProfileStore: Send + Sync {
    async fn fetch_user_profile(&self, id: &UserId)
        -> Result<Option<UserProfile>, ApplicationError>;

    async fn save_user_profile(&self, profile: &UserProfile) -> Result<(), ApplicationError>;
}

#[derive(Default)]
struct CatalogState {
    products: Vec<Product>,
    edges: HashMap<ProductId, Vec<CompatibilityEdge>>,
    users: HashMap<UserId, UserProfile>,
}

/// Process-local catalog, used by tests and the demo tooling.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { state: RwLock::new(CatalogState { products, ..CatalogState::default() }) }
    }

    pub async fn find(&self, product_id: &ProductId) -> Option<Product> {
        let state = self.state.read().await;
        state.products.iter().find(|product| &product.id == product_id).cloned()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, ApplicationError> {
        Ok(self.find(id).await)
    }

    async fn fetch_products_by_category(
        &self,
        sub_category: &str,
        exclude: &ProductId,
        limit: usize,
    ) -> Result<Vec<Product>, ApplicationError> {
        let state = self.state.read().await;
        Ok(state
            .products
            .iter()
            .filter(|product| &product.id != exclude && product.is_sub_category(sub_category))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn save_product(&self, product: &Product) -> Result<(), ApplicationError> {
        let mut state = self.state.write().await;
        match state.products.iter_mut().find(|existing| existing.id == product.id) {
            Some(existing) => *existing = product.clone(),
            None => state.products.push(product.clone()),
        }
        Ok(())
    }

    async fn list_product_ids(&self) -> Result<Vec<ProductId>, ApplicationError> {
        let state = self.state.read().await;
        Ok(state.products.iter().map(|product| product.id).collect())
    }

    async fn replace_compatibility_edges(
        &self,
        base: &ProductId,
        edges: &[CompatibilityEdge],
    ) -> Result<(), ApplicationError> {
        let mut state = self.state.write().await;
        state.edges.insert(*base, edges.to_vec());
        Ok(())
    }

    async fn fetch_compatibility_edges(
        &self,
        base: &ProductId,
    ) -> Result<Vec<CompatibilityEdge>, ApplicationError> {
        let state = self.state.read().await;
        let mut edges = state.edges.get(base).cloned().unwrap_or_default();
        edges.sort_by_key(|edge| edge.rank);
        Ok(edges)
    }
}

#[async_trait]
impl UserProfileStore for InMemoryCatalog {
    async fn fetch_user_profile(
        &self,
        id: &UserId,
    ) -> Result<Option<UserProfile>, ApplicationError> {
        let state = self.state.read().await;
        Ok(state.users.get(id).cloned())
    }

    async fn save_user_profile(&self, profile: &UserProfile) -> Result<(), ApplicationError> {
        profile.validate()?;
        let mut state = self.state.write().await;
        state.users.insert(profile.id, profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{CatalogStore, InMemoryCatalog, UserProfileStore};
    use crate::domain::compatibility::CompatibilityEdge;
    use crate::domain::product::{Product, ProductId};
    use crate::domain::user::{SpendRange, UserId, UserProfile};
    use crate::errors::{ApplicationError, DomainError};

    fn product(sub_category: &str) -> Product {
        Product {
            id: ProductId::new(),
            name: format!("{sub_category} piece"),
            brand: "Harbor".to_owned(),
            gender: "Unisex".to_owned(),
            master_category: "Apparel".to_owned(),
            sub_category: sub_category.to_owned(),
            article_type: "Generic".to_owned(),
            primary_colour: "Black".to_owned(),
            fit: None,
            season: None,
            price: 30.0,
            occasion_tags: vec![],
            formality_score: 0.5,
            style_archetype: None,
            images: vec![],
            style_embedding: None,
            complementary_embedding: None,
            semantic_embedding: None,
        }
    }

    #[tokio::test]
    async fn category_fetch_excludes_base_and_honors_limit() {
        let base = product("Bottomwear");
        let tops = [product("Topwear"), product("topwear"), product("TOPWEAR")];
        let mut all = vec![base.clone()];
        all.extend(tops.iter().cloned());
        all.push(product("Shoes"));
        let catalog = InMemoryCatalog::new(all);

        let fetched =
            catalog.fetch_products_by_category("Topwear", &base.id, 2).await.expect("fetch");
        assert_eq!(fetched.iter().map(|p| p.id).collect::<Vec<_>>(), vec![tops[0].id, tops[1].id]);

        let bottoms =
            catalog.fetch_products_by_category("bottomwear", &base.id, 10).await.expect("fetch");
        assert!(bottoms.is_empty());
    }

    #[tokio::test]
    async fn edges_are_replaced_not_merged() {
        let catalog = InMemoryCatalog::default();
        let base = ProductId::new();
        let edge = |rank: u32| CompatibilityEdge {
            base_product_id: base,
            recommended_product_id: ProductId::new(),
            compatibility_score: 0.5,
            occasion_context: "General".to_owned(),
            rank,
        };

        catalog.replace_compatibility_edges(&base, &[edge(0), edge(1)]).await.expect("first");
        let replacement = vec![edge(0)];
        catalog.replace_compatibility_edges(&base, &replacement).await.expect("second");

        let edges = catalog.fetch_compatibility_edges(&base).await.expect("fetch edges");
        assert_eq!(edges, replacement);
    }

    #[tokio::test]
    async fn user_profiles_are_validated_on_save() {
        let catalog = InMemoryCatalog::default();
        let profile = UserProfile {
            id: UserId::new(),
            spending_profile: HashMap::from([("shoes".to_owned(), SpendRange::new(120.0, 60.0))]),
            price_sensitivity_score: 0.5,
            style_embedding: None,
            budget: 300.0,
        };

        let error = catalog.save_user_profile(&profile).await.expect_err("inverted range");
        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::InvalidSpendRange { category: "shoes".to_owned() })
        );
        assert_eq!(catalog.fetch_user_profile(&profile.id).await.expect("fetch"), None);
    }
}
