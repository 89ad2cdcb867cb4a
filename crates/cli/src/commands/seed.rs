use outfitter_db::DemoCatalog;
use serde::Serialize;

use crate::commands::{open_database, prepare, CommandResult};

#[derive(Debug, Serialize)]
struct SeedOutput {
    products: usize,
    users: usize,
    sub_categories: Vec<&'static str>,
    demo_user_id: &'static str,
}

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let seed_result = DemoCatalog::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoCatalog::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<SeedOutput, (&'static str, String, u8)> =
            if verification.all_present {
                Ok(SeedOutput {
                    products: seed_result.products_seeded,
                    users: seed_result.users_seeded,
                    sub_categories: seed_result.sub_categories,
                    demo_user_id: DemoCatalog::USER_ID,
                })
            } else {
                Err(("seed_verification", verification_message(&verification.checks), 6u8))
            };

        pool.close().await;
        run_result
    });

    match result {
        Ok(output) => CommandResult::success_with_data(
            "seed",
            format!(
                "demo catalog loaded: {} products across {}",
                output.products,
                output.sub_categories.join(", ")
            ),
            &output,
        ),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn verification_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
