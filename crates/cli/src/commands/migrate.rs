use crate::commands::{open_database, prepare, CommandResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("migrate") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let applied: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM _sqlx_migrations")
            .fetch_one(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<i64, (&'static str, String, u8)>(applied)
    });

    match result {
        Ok(applied) => CommandResult::success(
            "migrate",
            format!("applied pending migrations ({applied} recorded)"),
        ),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}
