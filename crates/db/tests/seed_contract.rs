use std::collections::HashSet;

use outfitter_core::catalog::{CatalogStore, UserProfileStore};
use outfitter_core::domain::outfit::BASE_SLOT;
use outfitter_core::domain::product::ProductId;
use outfitter_core::domain::user::UserId;
use outfitter_core::engine::{CompatibilityEngine, OutfitRecommender};
use outfitter_db::{connect_with_settings, migrations, DemoCatalog, SqlCatalogRepository, SqlUserProfileRepository};

type SeedContractTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
    ($left:expr, $right:expr, $($arg:tt)*) => {
        if $left != $right {
            return Err(format!($($arg)*));
        }
    };
}

async fn seeded_pool() -> SeedContractTestResult<sqlx::SqlitePool> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate: {error}"))?;
    DemoCatalog::load(&pool).await.map_err(|error| format!("seed: {error}"))?;
    Ok(pool)
}

fn parse_id(raw: &str) -> SeedContractTestResult<ProductId> {
    raw.parse().map_err(|error| format!("seed id `{raw}` should parse: {error}"))
}

#[tokio::test]
async fn seeded_catalog_recomputes_every_product() -> SeedContractTestResult {
    let pool = seeded_pool().await?;
    let catalog = SqlCatalogRepository::new(pool);
    let engine = CompatibilityEngine::default();

    let ids = catalog.list_product_ids().await.map_err(|error| error.to_string())?;
    let expected = DemoCatalog::product_ids()
        .into_iter()
        .map(parse_id)
        .collect::<SeedContractTestResult<Vec<_>>>()?;
    require_eq!(ids, expected, "catalog order should follow fixture order");

    for id in &ids {
        let report = engine.recompute_by_id(&catalog, id).await.map_err(|error| error.to_string())?;
        require_eq!(report.candidates, 9, "each product should see three complements per slot");
        require_eq!(report.skipped, 0);
        require_eq!(report.edges, 9);

        let edges =
            catalog.fetch_compatibility_edges(id).await.map_err(|error| error.to_string())?;
        let ranks = edges.iter().map(|edge| edge.rank).collect::<Vec<_>>();
        require_eq!(ranks, (0..9).collect::<Vec<u32>>());
        require!(
            edges.iter().all(|edge| edge.recommended_product_id != *id),
            "a product must never be recommended for itself"
        );
    }

    Ok(())
}

#[tokio::test]
async fn demo_shopper_receives_complete_outfits() -> SeedContractTestResult {
    let pool = seeded_pool().await?;
    let catalog = SqlCatalogRepository::new(pool.clone());
    let users = SqlUserProfileRepository::new(pool);
    let engine = CompatibilityEngine::default();
    let recommender = OutfitRecommender::default();

    let base_id = parse_id(DemoCatalog::product_ids()[0])?;
    engine.recompute_by_id(&catalog, &base_id).await.map_err(|error| error.to_string())?;

    let user_id: UserId =
        DemoCatalog::USER_ID.parse().map_err(|error| format!("user id should parse: {error}"))?;
    let user = users
        .fetch_user_profile(&user_id)
        .await
        .map_err(|error| error.to_string())?
        .ok_or_else(|| "demo shopper should be seeded".to_string())?;

    let outfits =
        recommender.recommend(&catalog, &base_id, &user).await.map_err(|error| error.to_string())?;
    require_eq!(outfits.len(), 3, "nine complements fill exactly three three-slot outfits");

    let mut used = HashSet::new();
    for outfit in &outfits {
        require_eq!(outfit.base.id, base_id);
        require!(outfit.slot(BASE_SLOT).is_some());
        let slots = outfit.items.iter().map(|item| item.slot.as_str()).collect::<Vec<_>>();
        require_eq!(slots, vec!["bottom", "shoe", "accessory"]);
        for item in &outfit.items {
            require!(used.insert(item.product.id), "{} reused across outfits", item.product.id);
        }
        let total: f64 = outfit.products().map(|product| product.price).sum();
        require!((outfit.total_price - total).abs() < 1e-9);
    }

    require!(
        outfits.windows(2).all(|pair| pair[0].outfit_score >= pair[1].outfit_score),
        "outfits should be ordered best first"
    );

    Ok(())
}

#[tokio::test]
async fn recommendation_without_recompute_is_empty() -> SeedContractTestResult {
    let pool = seeded_pool().await?;
    let catalog = SqlCatalogRepository::new(pool.clone());
    let users = SqlUserProfileRepository::new(pool);

    let user_id: UserId =
        DemoCatalog::USER_ID.parse().map_err(|error| format!("user id should parse: {error}"))?;
    let user = users
        .fetch_user_profile(&user_id)
        .await
        .map_err(|error| error.to_string())?
        .ok_or_else(|| "demo shopper should be seeded".to_string())?;

    let base_id = parse_id(DemoCatalog::product_ids()[4])?;
    let outfits = OutfitRecommender::default()
        .recommend(&catalog, &base_id, &user)
        .await
        .map_err(|error| error.to_string())?;
    require!(outfits.is_empty());

    Ok(())
}
