use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Deterministic demo catalog used by the CLI `seed` command and the
/// end-to-end tests: three processed products in each of four sub-categories
/// and one shopper with partial spend history.
pub struct DemoCatalog;

struct SeedCategory {
    sub_category: &'static str,
    product_ids: &'static [&'static str],
}

const SEED_CATEGORIES: &[SeedCategory] = &[
    SeedCategory {
        sub_category: "Topwear",
        product_ids: &[
            "7b0c1a10-0000-4000-8000-000000000101",
            "7b0c1a10-0000-4000-8000-000000000102",
            "7b0c1a10-0000-4000-8000-000000000103",
        ],
    },
    SeedCategory {
        sub_category: "Bottomwear",
        product_ids: &[
            "7b0c1a10-0000-4000-8000-000000000201",
            "7b0c1a10-0000-4000-8000-000000000202",
            "7b0c1a10-0000-4000-8000-000000000203",
        ],
    },
    SeedCategory {
        sub_category: "Shoes",
        product_ids: &[
            "7b0c1a10-0000-4000-8000-000000000301",
            "7b0c1a10-0000-4000-8000-000000000302",
            "7b0c1a10-0000-4000-8000-000000000303",
        ],
    },
    SeedCategory {
        sub_category: "Accessories",
        product_ids: &[
            "7b0c1a10-0000-4000-8000-000000000401",
            "7b0c1a10-0000-4000-8000-000000000402",
            "7b0c1a10-0000-4000-8000-000000000403",
        ],
    },
];

impl DemoCatalog {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_catalog.sql");

    pub const USER_ID: &str = "7b0c1a10-0000-4000-8000-000000000900";

    /// Every seeded product id, in catalog order.
    pub fn product_ids() -> Vec<&'static str> {
        SEED_CATEGORIES.iter().flat_map(|category| category.product_ids.iter().copied()).collect()
    }

    /// Loads the fixture. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            products_seeded: Self::product_ids().len(),
            users_seeded: 1,
            sub_categories: SEED_CATEGORIES.iter().map(|category| category.sub_category).collect(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for category in SEED_CATEGORIES {
            let quoted = sql_array_from_ids(category.product_ids);
            let processed: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(1) FROM product
                 WHERE id IN {quoted}
                   AND sub_category = ?
                   AND complementary_embedding_json IS NOT NULL"
            ))
            .bind(category.sub_category)
            .fetch_one(pool)
            .await?;
            let expected = i64::try_from(category.product_ids.len()).unwrap_or(i64::MAX);
            checks.push((category.sub_category, processed == expected));
        }

        let user_present: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user_profile WHERE id = ?1)")
                .bind(Self::USER_ID)
                .fetch_one(pool)
                .await?;
        checks.push(("demo-shopper", user_present == 1));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded rows. Compatibility edges go with their products.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_products = sql_array_from_ids(&Self::product_ids());
        sqlx::query(&format!("DELETE FROM product WHERE id IN {quoted_products}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_profile WHERE id = ?1")
            .bind(Self::USER_ID)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub products_seeded: usize,
    pub users_seeded: usize,
    pub sub_categories: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[test]
    fn sql_fixture_mentions_every_seeded_id() {
        for id in DemoCatalog::product_ids() {
            assert!(DemoCatalog::SQL.contains(id), "{id} missing from fixture");
        }
        assert!(DemoCatalog::SQL.contains(DemoCatalog::USER_ID));
    }

    #[tokio::test]
    async fn load_is_idempotent_and_verifiable() {
        let pool = migrated_pool().await;

        let first = DemoCatalog::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoCatalog::verify(&pool).await.expect("verify");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.products_seeded, 12);

        DemoCatalog::load(&pool).await.expect("reload seed fixtures");
        let second_verification = DemoCatalog::verify(&pool).await.expect("re-verify");
        assert_eq!(first_verification.checks, second_verification.checks);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM product")
            .fetch_one(&pool)
            .await
            .expect("count products");
        assert_eq!(count, 12);
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = migrated_pool().await;
        DemoCatalog::load(&pool).await.expect("load seed fixtures");

        DemoCatalog::clean(&pool).await.expect("clean");

        let verification = DemoCatalog::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        assert!(verification.checks.iter().all(|(_, present)| !present));
    }
}
