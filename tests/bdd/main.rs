//! Feature suite for the step vocabulary, run against an in-process fixture
//! server.
//!
//! Run with: cargo test --test bdd
//! Set `RUST_LOG=api_steps=debug` (and `API_STEPS_DEBUG=1`) to see traffic.

#[path = "../common/mod.rs"]
mod common;

use api_steps::{ApiConfig, ApiWorld};
use cucumber::World;

const SCHEMAS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/schemas");
const FEATURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/features");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .init();

    let base_url = common::start_server().await;

    ApiWorld::cucumber()
        .before(move |_feature, _rule, scenario, world| {
            let config = ApiConfig::from_env()
                .expect("API_STEPS_* environment is valid")
                .with_base_url(base_url.clone())
                .with_schemas_path(SCHEMAS);
            Box::pin(async move {
                tracing::debug!(scenario = %scenario.name, "starting scenario");
                world.context_mut().configure(config);
            })
        })
        .fail_on_skipped()
        .run_and_exit(FEATURES)
        .await;
}
