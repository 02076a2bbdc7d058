use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};

/// Computes the key of a document: the hex SHA-256 of the query that produced it.
pub fn cache_key(query: &str) -> String {
    hex::encode(Sha256::digest(query.as_bytes()))
}

/// A cached Web API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub hash: String,
    /// The service the document was fetched for.
    pub service: Option<String>,
    pub fetch_date: DateTime<Utc>,
    /// `None` keeps the entry forever.
    pub expires_at: Option<DateTime<Utc>>,
    pub query: String,
    pub payload: String,
}

impl CacheEntry {
    /// Creates an entry fetched now, expiring after `ttl`.
    pub fn new(
        query: &str,
        service: Option<&str>,
        payload: impl Into<String>,
        ttl: Option<Duration>,
    ) -> Self {
        let fetch_date = Utc::now();
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| fetch_date.checked_add_signed(ttl));
        Self {
            hash: cache_key(query),
            service: service.map(ToOwned::to_owned),
            fetch_date,
            expires_at,
            query: query.to_owned(),
            payload: payload.into(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// A key-document store with per-entry expiration.
///
/// Implementations never return an expired entry: it is removed when it is read.
#[async_trait]
pub trait DocumentCache: Send + Sync {
    /// Returns the unexpired document stored for `query`.
    async fn read(&self, query: &str) -> Option<CacheEntry>;

    async fn write(&self, entry: CacheEntry);

    async fn remove(&self, query: &str);
}

/// A [`DocumentCache`] living in the gateway process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn read_at(&self, query: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let hash = cache_key(query);
        let removed = self
            .entries
            .remove_if(&hash, |_, entry| entry.is_expired_at(now));
        if removed.is_some() {
            info!("Cached document found but has expired, removing it");
            return None;
        }
        self.entries.get(&hash).map(|entry| entry.clone())
    }

    /// Stores `entry` after removing every entry expired at `now`.
    fn write_at(&self, entry: CacheEntry, now: DateTime<Utc>) {
        let before = self.entries.len();
        self.entries.retain(|_, stored| !stored.is_expired_at(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!("{purged} expired documents removed from the cache");
        }
        debug!("Caching the document of query {}", entry.hash);
        self.entries.insert(entry.hash.clone(), entry);
    }
}

#[async_trait]
impl DocumentCache for MemoryCache {
    async fn read(&self, query: &str) -> Option<CacheEntry> {
        self.read_at(query, Utc::now())
    }

    async fn write(&self, entry: CacheEntry) {
        self.write_at(entry, Utc::now());
    }

    async fn remove(&self, query: &str) {
        self.entries.remove(&cache_key(query));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_sha256_of_query() {
        assert_eq!(
            cache_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn round_trip_before_expiry() {
        let cache = MemoryCache::new();
        let query = "https://api.example.org/q?name=Delphinus";
        cache
            .write(CacheEntry::new(
                query,
                Some("test/svc"),
                r#"{"a":1}"#,
                Some(Duration::from_secs(3600)),
            ))
            .await;

        let entry = cache.read(query).await.unwrap();
        assert_eq!(entry.payload, r#"{"a":1}"#);
        assert_eq!(entry.service.as_deref(), Some("test/svc"));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_is_removed() {
        let cache = MemoryCache::new();
        let query = "https://api.example.org/q";
        let entry = CacheEntry::new(query, None, "{}", Some(Duration::from_secs(10)));
        let expires_at = entry.expires_at.unwrap();
        cache.write(entry).await;

        assert!(cache.read_at(query, expires_at - chrono::Duration::seconds(1)).is_some());
        assert!(cache.read_at(query, expires_at).is_none());
        assert!(cache.is_empty());
        assert!(cache.read(query).await.is_none());
    }

    #[test]
    fn writes_purge_expired_entries() {
        let cache = MemoryCache::new();
        let stale = CacheEntry::new("stale", None, "{}", Some(Duration::from_secs(10)));
        let expires_at = stale.expires_at.unwrap();
        cache.write_at(stale, Utc::now());
        cache.write_at(CacheEntry::new("kept", None, "{}", None), Utc::now());
        assert_eq!(cache.len(), 2);

        cache.write_at(CacheEntry::new("fresh", None, "{}", None), expires_at);
        assert_eq!(cache.len(), 2);
        assert!(cache.read_at("stale", expires_at).is_none());
        assert!(cache.read_at("kept", expires_at).is_some());
        assert!(cache.read_at("fresh", expires_at).is_some());
    }

    #[tokio::test]
    async fn entry_without_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache.write(CacheEntry::new("q", None, "{}", None)).await;
        let far_future = Utc::now() + chrono::Duration::days(3650);
        assert!(cache.read_at("q", far_future).is_some());
    }
}
