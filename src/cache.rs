use moka::sync::Cache;
use moka::Expiry;
use std::borrow::Borrow;
use std::hash::Hash;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }
}

/// Hands moka the deadline stored on each entry, so every write carries its own TTL.
struct EntryDeadline;

impl<K, V> Expiry<K, CacheEntry<V>> for EntryDeadline {
    fn expire_after_create(
        &self,
        _key: &K,
        entry: &CacheEntry<V>,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.expires_at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &K,
        entry: &CacheEntry<V>,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.expires_at.saturating_duration_since(updated_at))
    }
}

/// Key/value store with a per-entry time-to-live.
///
/// Once an entry's deadline passes, moka's expiry policy hides it and a read reports
/// absence. There is no capacity bound, so the key space has to stay small. Values
/// come back as clones; mutating one never touches the stored snapshot.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    entries: Cache<K, CacheEntry<V>>,
    default_ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        let entries = Cache::builder().expire_after(EntryDeadline).build();
        Self {
            entries,
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| entry.value)
    }

    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Last write wins. A zero TTL removes any previous entry and stores nothing.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        if ttl.is_zero() {
            self.entries.invalidate(&key);
            return;
        }
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    pub fn invalidate<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.invalidate(key);
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Entry count after applying pending writes. Expired entries may still be
    /// counted until moka's housekeeping evicts them.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
