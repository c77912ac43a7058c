//! Use cases shared by every harness. Each one starts from an empty system.

use std::time::Duration;

use beacon_harness::{HarnessError, TestHarness};

pub const POPULAR: &str = "https://example.com/popular";
pub const LESS_POPULAR: &str = "https://example.com/less-popular";

const PROCESSING_TIMEOUT: Duration = Duration::from_secs(10);

async fn access<H: TestHarness>(harness: &H, long_url: &str, times: usize) -> String {
    let short_code = harness.shorten_url(long_url).await.unwrap().short_code;
    for _ in 0..times {
        assert_eq!(harness.resolve_url(short_code.as_str()).await.unwrap(), long_url);
    }
    short_code.as_str().to_owned()
}

pub async fn shortening_is_idempotent<H: TestHarness>(harness: &H) {
    let first = harness.shorten_url(POPULAR).await.unwrap();
    let second = harness.shorten_url(POPULAR).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.short_code.as_str(), "9241e624");
    assert!(first.short_url.ends_with("/9241e624"));
    assert_eq!(first.long_url, POPULAR);
}

pub async fn different_urls_get_different_codes<H: TestHarness>(harness: &H) {
    let popular = harness.shorten_url(POPULAR).await.unwrap();
    let less_popular = harness.shorten_url(LESS_POPULAR).await.unwrap();
    assert_ne!(popular.short_code, less_popular.short_code);
}

pub async fn invalid_urls_are_rejected<H: TestHarness>(harness: &H) {
    for url in ["", "   ", "not-a-valid-url", "ftp://example.com/file"] {
        let err = harness.shorten_url(url).await.unwrap_err();
        assert!(matches!(err, HarnessError::InvalidUrl(_)), "{url:?}: {err}");
    }
}

pub async fn resolving_counts_one_access<H: TestHarness>(harness: &H) {
    let short_code = access(harness, POPULAR, 1).await;
    harness
        .wait_for_events_processed(PROCESSING_TIMEOUT)
        .await
        .unwrap();

    let events = harness.get_published_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].short_code.as_str(), short_code);
    assert_eq!(events[0].long_url, POPULAR);

    let top = harness.get_top_urls(10).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].short_code, short_code);
    assert_eq!(top[0].access_count, 1);
}

pub async fn unknown_code_is_not_found<H: TestHarness>(harness: &H) {
    let err = harness.resolve_url("nonexistent").await.unwrap_err();
    assert!(matches!(err, HarnessError::UrlNotFound(_)), "{err}");
    assert!(harness.get_published_events().await.unwrap().is_empty());
}

pub async fn ranking_orders_by_access_count<H: TestHarness>(harness: &H) {
    access(harness, "https://example.com/one", 1).await;
    access(harness, "https://example.com/three", 3).await;
    access(harness, "https://example.com/two", 2).await;
    harness
        .wait_for_events_processed(PROCESSING_TIMEOUT)
        .await
        .unwrap();

    let top = harness.get_top_urls(10).await.unwrap();
    let counts: Vec<u64> = top.iter().map(|url| url.access_count).collect();
    assert_eq!(counts, vec![3, 2, 1]);

    let top = harness.get_top_urls(2).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].long_url, "https://example.com/three");
}

pub async fn empty_system_has_empty_ranking<H: TestHarness>(harness: &H) {
    assert!(harness.get_top_urls(10).await.unwrap().is_empty());
    assert!(harness.get_published_events().await.unwrap().is_empty());
}

pub async fn non_positive_limit_is_rejected<H: TestHarness>(harness: &H) {
    for limit in [0, -1] {
        let err = harness.get_top_urls(limit).await.unwrap_err();
        assert!(matches!(err, HarnessError::InvalidLimit(_)), "{limit}: {err}");
    }
}

pub async fn popular_url_outranks_less_popular<H: TestHarness>(harness: &H) {
    access(harness, POPULAR, 3).await;
    access(harness, LESS_POPULAR, 1).await;
    harness
        .wait_for_events_processed(PROCESSING_TIMEOUT)
        .await
        .unwrap();

    let top = harness.get_top_urls(10).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].long_url, POPULAR);
    assert_eq!(top[0].access_count, 3);
    assert_eq!(top[1].long_url, LESS_POPULAR);
    assert_eq!(top[1].access_count, 1);
}

pub async fn reset_forgets_everything<H: TestHarness>(harness: &H) {
    let short_code = access(harness, POPULAR, 2).await;
    harness
        .wait_for_events_processed(PROCESSING_TIMEOUT)
        .await
        .unwrap();

    harness.reset().await.unwrap();

    assert!(harness.get_top_urls(10).await.unwrap().is_empty());
    assert!(harness.get_published_events().await.unwrap().is_empty());
    let err = harness.resolve_url(&short_code).await.unwrap_err();
    assert!(matches!(err, HarnessError::UrlNotFound(_)), "{err}");
}

/// Generates one test per use case. `$harness` builds a fresh harness.
#[allow(unused_macros)]
macro_rules! use_case_tests {
    ($harness:expr; $($case:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $case() {
                let harness = $harness;
                common::$case(&harness).await;
            }
        )*
    };
}
