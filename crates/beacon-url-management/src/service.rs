use crate::error::UrlManagementError;
use crate::model::{ResolvedUrl, ShortenOutcome, ShortenedUrl};
use async_trait::async_trait;
use beacon_core::{
    DomainEvent, EventChannel, EventChannelExt, Generator, NewUrlMapping, Sha256Generator,
    ShortCode, StorageError, UrlAccessedEvent, UrlMapping, UrlMappingStore,
};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error, info, warn};

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://[^\s/$.?#].[^\s]*$").expect("valid url pattern"));

/// Longest accepted long URL, in bytes. Every store must be able to hold it.
pub const MAX_URL_LENGTH: usize = 2048;

/// Candidate codes tried per long URL: the canonical code plus salted retries.
const MAX_SHORTEN_ATTEMPTS: u32 = 4;

#[async_trait]
pub trait UrlManagement: Send + Sync + 'static {
    /// Idempotent: shortening an already-known URL returns the stored code
    /// without writing.
    async fn shorten_url(&self, long_url: &str) -> Result<ShortenOutcome, UrlManagementError>;

    /// Resolves a code and publishes one access event.
    async fn resolve_url(&self, short_code: &str) -> Result<ResolvedUrl, UrlManagementError>;
}

/// Implementation of [`UrlManagement`] over a mapping store and an event
/// channel.
///
/// A failed publish is logged and reported through
/// [`ResolvedUrl::event_published`]; it never fails the resolution.
pub struct UrlManagementService<S, C: ?Sized, G = Sha256Generator> {
    store: Arc<S>,
    channel: Arc<C>,
    generator: Arc<G>,
    base_url: String,
}

impl<S, C> UrlManagementService<S, C>
where
    S: UrlMappingStore,
    C: EventChannel + ?Sized,
{
    pub fn new(store: S, channel: Arc<C>, base_url: impl Into<String>) -> Self {
        Self::with_generator(store, channel, Sha256Generator::new(), base_url)
    }
}

impl<S, C, G> UrlManagementService<S, C, G>
where
    S: UrlMappingStore,
    C: EventChannel + ?Sized,
    G: Generator,
{
    pub fn with_generator(
        store: S,
        channel: Arc<C>,
        generator: G,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store: Arc::new(store),
            channel,
            generator: Arc::new(generator),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn validate_url(url: &str) -> Result<(), UrlManagementError> {
        if url.trim().is_empty() {
            return Err(UrlManagementError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }
        if url.len() > MAX_URL_LENGTH {
            return Err(UrlManagementError::InvalidUrl(format!(
                "URL must be at most {MAX_URL_LENGTH} bytes, got {}",
                url.len()
            )));
        }
        if !URL_PATTERN.is_match(url) {
            return Err(UrlManagementError::InvalidUrl(format!(
                "URL must be an absolute http(s) URL: {url}"
            )));
        }
        Ok(())
    }

    fn shortened(&self, mapping: UrlMapping) -> ShortenedUrl {
        ShortenedUrl {
            short_url: mapping.short_code.to_url(&self.base_url),
            short_code: mapping.short_code,
            long_url: mapping.long_url,
        }
    }

    async fn existing(&self, long_url: &str) -> Result<Option<ShortenOutcome>, UrlManagementError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.find_by_long_url(long_url).await?.map(|mapping| ShortenOutcome {
            url: self.shortened(mapping),
            created: false,
        }))
    }
}

#[async_trait]
impl<S, C, G> UrlManagement for UrlManagementService<S, C, G>
where
    S: UrlMappingStore,
    C: EventChannel + ?Sized,
    G: Generator,
{
    async fn shorten_url(&self, long_url: &str) -> Result<ShortenOutcome, UrlManagementError> {
        Self::validate_url(long_url)?;

        for attempt in 0..MAX_SHORTEN_ATTEMPTS {
            let mut tx = self.store.begin().await?;

            if let Some(mapping) = tx.find_by_long_url(long_url).await? {
                debug!(short_code = %mapping.short_code, "long url already shortened");
                return Ok(ShortenOutcome {
                    url: self.shortened(mapping),
                    created: false,
                });
            }

            let code = self.generator.generate_salted(long_url, attempt);
            if let Some(owner) = tx.find_by_short_code(&code).await? {
                warn!(
                    short_code = %code,
                    attempt,
                    owner = %owner.long_url,
                    "short code collision, retrying with salt"
                );
                continue;
            }

            let saved = match tx.save(NewUrlMapping::new(code, long_url)).await {
                Ok(mapping) => tx.commit().await.map(|()| mapping),
                Err(err) => Err(err),
            };

            match saved {
                Ok(mapping) => {
                    info!(short_code = %mapping.short_code, "short url created");
                    return Ok(ShortenOutcome {
                        url: self.shortened(mapping),
                        created: true,
                    });
                }
                // A concurrent session took the URL or the code; the next
                // attempt re-reads by long URL first.
                Err(StorageError::Conflict(reason)) => {
                    debug!(attempt, reason = %reason, "save conflicted");
                }
                Err(err) => return Err(err.into()),
            }
        }

        if let Some(outcome) = self.existing(long_url).await? {
            return Ok(outcome);
        }
        error!(long_url, "exhausted short code candidates");
        Err(UrlManagementError::ShortCodeCollision(long_url.to_string()))
    }

    async fn resolve_url(&self, short_code: &str) -> Result<ResolvedUrl, UrlManagementError> {
        // A malformed code cannot exist in storage.
        let Ok(code) = ShortCode::new(short_code) else {
            return Err(UrlManagementError::UrlNotFound(short_code.to_string()));
        };

        let mapping = {
            let mut tx = self.store.begin().await?;
            tx.find_by_short_code(&code).await?
        };
        let Some(mapping) = mapping else {
            debug!(short_code = %code, "short code not found");
            return Err(UrlManagementError::UrlNotFound(short_code.to_string()));
        };

        let event = UrlAccessedEvent::now(mapping.short_code, mapping.long_url.as_str());
        let event_published = match self
            .channel
            .publish_event(&event, UrlAccessedEvent::ROUTING_KEY)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!(short_code = %code, error = %err, "failed to publish access event");
                false
            }
        };

        Ok(ResolvedUrl {
            long_url: mapping.long_url,
            event_published,
        })
    }
}
