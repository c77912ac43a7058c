use beacon_core::{NewUrlMapping, ShortCode};
use beacon_storage::{
    AccessCounterStore, MySqlAccessCounterStore, MySqlUrlMappingStore, StorageError,
    UrlMappingStore,
};
use beacon_test_infra::mysql::{MySqlServer, MysqlConfig};
use jiff::{SignedDuration, Timestamp};

struct Fixture {
    mysql: MySqlServer,
    mappings: MySqlUrlMappingStore,
    counters: MySqlAccessCounterStore,
}

impl Fixture {
    async fn start() -> Self {
        let mysql = MySqlServer::new(MysqlConfig::builder().build())
            .await
            .expect("start mysql");
        let pool = mysql.connect_pool().await.expect("connect mysql");

        let mappings = MySqlUrlMappingStore::new(pool.clone());
        let counters = MySqlAccessCounterStore::new(pool);
        mappings.ensure_schema().await.expect("create url_mappings");
        counters.ensure_schema().await.expect("create url_access_stats");

        Self {
            mysql,
            mappings,
            counters,
        }
    }

    /// A second, independent pool onto the same database.
    async fn reopen(&self) -> (MySqlUrlMappingStore, MySqlAccessCounterStore) {
        let pool = self.mysql.connect_pool().await.expect("reconnect mysql");
        (
            MySqlUrlMappingStore::new(pool.clone()),
            MySqlAccessCounterStore::new(pool),
        )
    }
}

fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn mapping_round_trips_through_a_fresh_pool() {
    let fixture = Fixture::start().await;

    let mut tx = fixture.mappings.begin().await.unwrap();
    let saved = tx
        .save(NewUrlMapping::new(code("abc123"), "https://example.com"))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let (mappings, _) = fixture.reopen().await;
    let mut tx = mappings.begin().await.unwrap();
    let by_code = tx.find_by_short_code(&code("abc123")).await.unwrap();
    let by_url = tx.find_by_long_url("https://example.com").await.unwrap();
    assert_eq!(by_code, Some(saved.clone()));
    assert_eq!(by_url, Some(saved));
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn uncommitted_mapping_is_rolled_back_on_drop() {
    let fixture = Fixture::start().await;

    let mut writer = fixture.mappings.begin().await.unwrap();
    writer
        .save(NewUrlMapping::new(code("abc123"), "https://example.com"))
        .await
        .unwrap();

    let mut reader = fixture.mappings.begin().await.unwrap();
    assert!(reader
        .find_by_short_code(&code("abc123"))
        .await
        .unwrap()
        .is_none());
    drop(reader);
    drop(writer);

    let mut tx = fixture.mappings.begin().await.unwrap();
    assert!(tx
        .find_by_long_url("https://example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn save_conflicts_on_taken_code_or_url() {
    let fixture = Fixture::start().await;

    let mut tx = fixture.mappings.begin().await.unwrap();
    tx.save(NewUrlMapping::new(code("abc123"), "https://one.example"))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = fixture.mappings.begin().await.unwrap();
    let err = tx
        .save(NewUrlMapping::new(code("abc123"), "https://two.example"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));

    let err = tx
        .save(NewUrlMapping::new(code("zzz999"), "https://one.example"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn short_codes_are_case_sensitive() {
    let fixture = Fixture::start().await;

    let mut tx = fixture.mappings.begin().await.unwrap();
    tx.save(NewUrlMapping::new(code("abc"), "https://lower.example"))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = fixture.mappings.begin().await.unwrap();
    assert!(tx.find_by_short_code(&code("ABC")).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn upsert_counts_and_keeps_latest_access_time() {
    let fixture = Fixture::start().await;
    let later = Timestamp::from_millisecond(Timestamp::now().as_millisecond()).unwrap();
    let earlier = later - SignedDuration::from_secs(60);

    let mut tx = fixture.counters.begin().await.unwrap();
    tx.increment_access_count(&code("abc123"), "https://example.com", later)
        .await
        .unwrap();
    tx.increment_access_count(&code("abc123"), "https://example.com", earlier)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let (_, counters) = fixture.reopen().await;
    let mut tx = counters.begin().await.unwrap();
    let stats = tx.find_by_short_code(&code("abc123")).await.unwrap().unwrap();
    assert_eq!(stats.access_count, 2);
    assert_eq!(stats.last_accessed_at, Some(later));
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn concurrent_upserts_lose_no_updates() {
    let fixture = Fixture::start().await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let counters = fixture.counters.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                let mut tx = counters.begin().await.unwrap();
                tx.increment_access_count(&code("hot"), "https://hot.example", Timestamp::now())
                    .await
                    .unwrap();
                tx.commit().await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut tx = fixture.counters.begin().await.unwrap();
    let stats = tx.find_by_short_code(&code("hot")).await.unwrap().unwrap();
    assert_eq!(stats.access_count, 80);
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn ranking_orders_by_count_then_insertion() {
    let fixture = Fixture::start().await;

    for (c, times) in [("first", 1), ("second", 3), ("third", 1)] {
        for _ in 0..times {
            let mut tx = fixture.counters.begin().await.unwrap();
            tx.increment_access_count(&code(c), "https://example.com", Timestamp::now())
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }
    }

    let mut tx = fixture.counters.begin().await.unwrap();
    let top = tx.top_by_access_count(10).await.unwrap();
    let codes: Vec<_> = top.iter().map(|s| s.short_code.as_str()).collect();
    assert_eq!(codes, vec!["second", "first", "third"]);
    assert_eq!(tx.top_by_access_count(1).await.unwrap().len(), 1);
}
