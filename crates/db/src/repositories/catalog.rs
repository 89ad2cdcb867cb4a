use async_trait::async_trait;
use sqlx::Row;

use outfitter_core::catalog::CatalogStore;
use outfitter_core::domain::compatibility::CompatibilityEdge;
use outfitter_core::domain::product::{Embedding, Product, ProductId};
use outfitter_core::errors::ApplicationError;

use super::{decode_json, encode_json, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, name, brand, gender, master_category, sub_category, article_type,
    primary_colour, fit, season, price, occasion_tags_json, formality_score, style_archetype,
    images_json, style_embedding_json, complementary_embedding_json, semantic_embedding_json";

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_category(
        &self,
        sub_category: &str,
        exclude: &ProductId,
        limit: usize,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product
             WHERE sub_category = ? COLLATE NOCASE AND id <> ?
             ORDER BY rowid ASC
             LIMIT ?"
        ))
        .bind(sub_category.trim())
        .bind(exclude.to_string())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product (id, name, brand, gender, master_category, sub_category,
                                  article_type, primary_colour, fit, season, price,
                                  occasion_tags_json, formality_score, style_archetype, images_json,
                                  style_embedding_json, complementary_embedding_json,
                                  semantic_embedding_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 brand = excluded.brand,
                 gender = excluded.gender,
                 master_category = excluded.master_category,
                 sub_category = excluded.sub_category,
                 article_type = excluded.article_type,
                 primary_colour = excluded.primary_colour,
                 fit = excluded.fit,
                 season = excluded.season,
                 price = excluded.price,
                 occasion_tags_json = excluded.occasion_tags_json,
                 formality_score = excluded.formality_score,
                 style_archetype = excluded.style_archetype,
                 images_json = excluded.images_json,
                 style_embedding_json = excluded.style_embedding_json,
                 complementary_embedding_json = excluded.complementary_embedding_json,
                 semantic_embedding_json = excluded.semantic_embedding_json,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(product.id.to_string())
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.gender)
        .bind(&product.master_category)
        .bind(&product.sub_category)
        .bind(&product.article_type)
        .bind(&product.primary_colour)
        .bind(&product.fit)
        .bind(&product.season)
        .bind(product.price)
        .bind(encode_json("occasion_tags_json", &product.occasion_tags)?)
        .bind(product.formality_score)
        .bind(&product.style_archetype)
        .bind(encode_json("images_json", &product.images)?)
        .bind(encode_embedding("style_embedding_json", product.style_embedding.as_ref())?)
        .bind(encode_embedding(
            "complementary_embedding_json",
            product.complementary_embedding.as_ref(),
        )?)
        .bind(encode_embedding("semantic_embedding_json", product.semantic_embedding.as_ref())?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn product_ids(&self) -> Result<Vec<ProductId>, RepositoryError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM product ORDER BY rowid ASC")
            .fetch_all(&self.pool)
            .await?;
        ids.iter().map(|id| parse_product_id("id", id)).collect()
    }

    async fn replace_edges(
        &self,
        base: &ProductId,
        edges: &[CompatibilityEdge],
    ) -> Result<(), RepositoryError> {
        if let Some(foreign) = edges.iter().find(|edge| &edge.base_product_id != base) {
            return Err(RepositoryError::Decode(format!(
                "edge from {} cannot be stored under base {base}",
                foreign.base_product_id
            )));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM product_compatibility WHERE base_product_id = ?")
            .bind(base.to_string())
            .execute(&mut *tx)
            .await?;

        for edge in edges {
            sqlx::query(
                "INSERT INTO product_compatibility (base_product_id, recommended_product_id,
                                                   compatibility_score, occasion_context, edge_rank)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(base.to_string())
            .bind(edge.recommended_product_id.to_string())
            .bind(edge.compatibility_score)
            .bind(&edge.occasion_context)
            .bind(i64::from(edge.rank))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn edges_for(&self, base: &ProductId) -> Result<Vec<CompatibilityEdge>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT base_product_id, recommended_product_id, compatibility_score,
                    occasion_context, edge_rank
             FROM product_compatibility
             WHERE base_product_id = ?
             ORDER BY edge_rank ASC",
        )
        .bind(base.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_edge).collect::<Result<Vec<_>, _>>()
    }
}

fn parse_product_id(column: &str, raw: &str) -> Result<ProductId, RepositoryError> {
    raw.parse()
        .map_err(|error| RepositoryError::Decode(format!("column `{column}`: {error}")))
}

fn encode_embedding(
    column: &str,
    embedding: Option<&Embedding>,
) -> Result<Option<String>, RepositoryError> {
    embedding.map(|vector| encode_json(column, vector)).transpose()
}

fn decode_embedding(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<Embedding>, RepositoryError> {
    let raw: Option<String> =
        row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    raw.map(|text| decode_json(column, &text)).transpose()
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let occasion_tags_json: String =
        row.try_get("occasion_tags_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let images_json: String =
        row.try_get("images_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product {
        id: parse_product_id("id", &id)?,
        name: row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        brand: row.try_get("brand").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        gender: row.try_get("gender").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        master_category: row
            .try_get("master_category")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        sub_category: row
            .try_get("sub_category")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        article_type: row
            .try_get("article_type")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        primary_colour: row
            .try_get("primary_colour")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        fit: row.try_get("fit").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        season: row.try_get("season").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        price: row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        occasion_tags: decode_json("occasion_tags_json", &occasion_tags_json)?,
        formality_score: row
            .try_get("formality_score")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        style_archetype: row
            .try_get("style_archetype")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        images: decode_json("images_json", &images_json)?,
        style_embedding: decode_embedding(row, "style_embedding_json")?,
        complementary_embedding: decode_embedding(row, "complementary_embedding_json")?,
        semantic_embedding: decode_embedding(row, "semantic_embedding_json")?,
    })
}

fn row_to_edge(row: &sqlx::sqlite::SqliteRow) -> Result<CompatibilityEdge, RepositoryError> {
    let base: String =
        row.try_get("base_product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let recommended: String = row
        .try_get("recommended_product_id")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rank: i64 = row.try_get("edge_rank").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(CompatibilityEdge {
        base_product_id: parse_product_id("base_product_id", &base)?,
        recommended_product_id: parse_product_id("recommended_product_id", &recommended)?,
        compatibility_score: row
            .try_get("compatibility_score")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        occasion_context: row
            .try_get("occasion_context")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        rank: u32::try_from(rank)
            .map_err(|_| RepositoryError::Decode(format!("edge_rank out of range: {rank}")))?,
    })
}

#[async_trait]
impl CatalogStore for SqlCatalogRepository {
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, ApplicationError> {
        Ok(self.find_product(id).await?)
    }

    async fn fetch_products_by_category(
        &self,
        sub_category: &str,
        exclude: &ProductId,
        limit: usize,
    ) -> Result<Vec<Product>, ApplicationError> {
        Ok(self.find_by_category(sub_category, exclude, limit).await?)
    }

    async fn save_product(&self, product: &Product) -> Result<(), ApplicationError> {
        Ok(self.upsert_product(product).await?)
    }

    async fn list_product_ids(&self) -> Result<Vec<ProductId>, ApplicationError> {
        Ok(self.product_ids().await?)
    }

    async fn replace_compatibility_edges(
        &self,
        base: &ProductId,
        edges: &[CompatibilityEdge],
    ) -> Result<(), ApplicationError> {
        Ok(self.replace_edges(base, edges).await?)
    }

    async fn fetch_compatibility_edges(
        &self,
        base: &ProductId,
    ) -> Result<Vec<CompatibilityEdge>, ApplicationError> {
        Ok(self.edges_for(base).await?)
    }
}
