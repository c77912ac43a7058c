mod common;

use beacon_harness::{LocalDeployment, TestHarness};

// One deployment for the whole suite; containers are slow to start.
#[tokio::test]
#[ignore = "requires a container runtime"]
async fn networked_harness_matches_simulated_behaviour() {
    let deployment = LocalDeployment::start().await.unwrap();
    let harness = deployment.harness();

    common::empty_system_has_empty_ranking(harness).await;
    harness.reset().await.unwrap();
    common::shortening_is_idempotent(harness).await;
    harness.reset().await.unwrap();
    common::different_urls_get_different_codes(harness).await;
    harness.reset().await.unwrap();
    common::invalid_urls_are_rejected(harness).await;
    harness.reset().await.unwrap();
    common::resolving_counts_one_access(harness).await;
    harness.reset().await.unwrap();
    common::unknown_code_is_not_found(harness).await;
    harness.reset().await.unwrap();
    common::ranking_orders_by_access_count(harness).await;
    harness.reset().await.unwrap();
    common::non_positive_limit_is_rejected(harness).await;
    harness.reset().await.unwrap();
    common::popular_url_outranks_less_popular(harness).await;
    harness.reset().await.unwrap();
    common::reset_forgets_everything(harness).await;
}
