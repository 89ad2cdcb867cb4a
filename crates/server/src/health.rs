use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use outfitter_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub catalog: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let catalog = catalog_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        catalog,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

/// Reports how much of the catalog has been processed. An empty or
/// unprocessed catalog is reported but does not make the service unready.
async fn catalog_check(pool: &DbPool) -> HealthCheck {
    let counts = sqlx::query_as::<_, (i64, i64)>(
        "SELECT COUNT(1), COUNT(complementary_embedding_json) FROM product",
    )
    .fetch_one(pool)
    .await;

    match counts {
        Ok((total, processed)) => HealthCheck {
            status: "ready",
            detail: format!("{processed} of {total} products processed"),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("catalog query failed: {error}") }
        }
    }
}
