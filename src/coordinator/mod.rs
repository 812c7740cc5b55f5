//! Read-through query cache with logic-version invalidation.
//!
//! [`QueryCache`] sits between callers and a [`RecordSource`]. Each request is
//! validated, the logic fingerprint is checked, and the page is then served
//! from the [`CacheStore`] or fetched from the source and stored.
//!
//! ## Logic fingerprint
//!
//! The fingerprint of the source's [`QueryLogic`](crate::query::QueryLogic)
//! is computed once when the cache is built. Before every lookup the cache
//! compares it with the value stored under
//! [`CacheConfig::fingerprint_key`]; when that value is missing or differs,
//! every key in the cache's namespace is removed and the new fingerprint is
//! stored. Pages produced by other logic are therefore never served.
//!
//! ## Concurrency
//!
//! The cache is `Send + Sync` and meant to be shared behind an [`Arc`].
//!
//! - The fingerprint check and the invalidation that may follow are not
//!   atomic. Two callers can both see a stale fingerprint and both invalidate
//!   and re-store it. Both steps are idempotent and the store stays consistent,
//!   so this race is accepted.
//! - Concurrent misses on the same key may each query the source. The last
//!   write wins; there is no request coalescing.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::{CacheConfig, ConfigError};
use crate::database::RecordSource;
use crate::query::{CacheKey, LogicFingerprint, PageQuery, PageRequest, QueryError};

pub mod stats;

pub use stats::{CacheStats, CacheStatsSnapshot};

/// A page of records as returned to callers. Shared with the cache entry.
pub type Page<R> = Arc<Vec<R>>;

/// Errors produced while building a [`QueryCache`].
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid cache configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to fingerprint query logic: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Errors returned by [`QueryCache::fetch_page`].
#[derive(Debug, Error)]
pub enum FetchError<E> {
    /// The request was rejected before touching the cache or the source.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] QueryError),

    /// The record source failed. The source's error is carried unchanged.
    #[error(transparent)]
    Upstream(E),
}

impl<E> FetchError<E> {
    /// Recover the record source's error, if that is what this is.
    pub fn into_upstream(self) -> Option<E> {
        match self {
            Self::Upstream(e) => Some(e),
            Self::InvalidArgument(_) => None,
        }
    }
}

/// Read-through cache over a [`RecordSource`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use qcache::cache::CacheStore;
/// use qcache::config::CacheConfig;
/// use qcache::coordinator::QueryCache;
/// use qcache::database::{Employee, EmployeeTable};
/// use qcache::query::PageRequest;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Arc::new(CacheStore::new());
///     let table = EmployeeTable::new(vec![Employee::new(1, "Ann", "Engineer")]);
///     let cache = QueryCache::new(store, table, CacheConfig::default())?;
///
///     let request = PageRequest::new(0, 10).filter("designation", "Eng");
///     let first = cache.fetch_page(&request).await?;
///     let second = cache.fetch_page(&request).await?;
///
///     assert_eq!(first, second);
///     assert_eq!(cache.stats().hits, 1);
///     Ok(())
/// }
/// ```
pub struct QueryCache<S: RecordSource> {
    store: Arc<CacheStore>,
    source: S,
    config: CacheConfig,
    key_prefix: String,
    fingerprint: LogicFingerprint,
    stats: CacheStats,
}

impl<S: RecordSource> QueryCache<S> {
    /// Build a cache over `source`, storing pages in `store`.
    ///
    /// The logic fingerprint is computed here, once, from `source.logic()`.
    ///
    /// # Errors
    ///
    /// - [`BuildError::Config`] if `config` fails [`CacheConfig::validate`].
    /// - [`BuildError::Fingerprint`] if the source's rule table cannot be serialized.
    pub fn new(store: Arc<CacheStore>, source: S, config: CacheConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let fingerprint = source.logic().fingerprint()?;

        debug!(
            namespace = %config.namespace,
            fingerprint = %fingerprint,
            enabled = config.enabled,
            "query cache ready"
        );

        Ok(Self {
            key_prefix: config.key_prefix(),
            store,
            source,
            config,
            fingerprint,
            stats: CacheStats::new(),
        })
    }

    /// Return the requested page, from the cache when possible.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidArgument`] for a negative page, non-positive page
    ///   size or empty filter field. Neither the cache nor the source is touched.
    /// - [`FetchError::Upstream`] when the record source fails. Nothing is cached.
    pub async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> Result<Page<S::Record>, FetchError<S::Error>> {
        let query = request.validate()?;
        self.fetch_query(&query).await
    }

    /// Like [`fetch_page`](Self::fetch_page) for an already validated query.
    pub async fn fetch_query(
        &self,
        query: &PageQuery,
    ) -> Result<Page<S::Record>, FetchError<S::Error>> {
        if !self.config.enabled {
            self.stats.record_bypass();
            let records = self.query_source(query).await?;
            return Ok(Arc::new(records));
        }

        self.ensure_logic_current();

        let key = self.key_for(query);
        if let Some(page) = self.store.get::<Vec<S::Record>>(key.as_str()) {
            self.stats.record_hit();
            debug!(key = %key, "cache hit");
            return Ok(page);
        }

        self.stats.record_miss();
        debug!(key = %key, "cache miss — querying record source");

        let page = Arc::new(self.query_source(query).await?);

        // Another cache with different logic may have taken over the store
        // while the source was running.
        if self.stored_fingerprint_matches() {
            self.store.set_shared(key.into_string(), Arc::clone(&page));
        } else {
            debug!(key = %key, "logic fingerprint changed during fetch — page not stored");
        }

        Ok(page)
    }

    /// Remove every cached page in this cache's namespace.
    ///
    /// Use this after the underlying records change. The stored fingerprint
    /// is left in place.
    pub fn invalidate_all(&self) -> usize {
        let removed = self.store.invalidate_prefix(&self.key_prefix);
        info!(namespace = %self.config.namespace, removed, "cached pages invalidated");
        removed
    }

    /// The key under which `query`'s page is cached.
    pub fn key_for(&self, query: &PageQuery) -> CacheKey {
        CacheKey::derive(&self.config.namespace, query)
    }

    /// Fingerprint of the source's current query logic.
    pub fn fingerprint(&self) -> &LogicFingerprint {
        &self.fingerprint
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn stored_fingerprint_matches(&self) -> bool {
        self.store
            .get::<LogicFingerprint>(&self.config.fingerprint_key)
            .is_some_and(|stored| *stored == self.fingerprint)
    }

    // Check-then-act: see the module docs for why this is not atomic.
    fn ensure_logic_current(&self) {
        let stored = self
            .store
            .get::<LogicFingerprint>(&self.config.fingerprint_key);
        if stored.as_deref() == Some(&self.fingerprint) {
            return;
        }

        let removed = self.store.invalidate_prefix(&self.key_prefix);
        self.store
            .set(self.config.fingerprint_key.clone(), self.fingerprint.clone());
        self.stats.record_logic_invalidation();

        info!(
            namespace = %self.config.namespace,
            previous = stored.as_deref().map(LogicFingerprint::as_str).unwrap_or("<none>"),
            current = %self.fingerprint,
            removed,
            "query logic fingerprint changed — cached pages invalidated"
        );
    }

    async fn query_source(&self, query: &PageQuery) -> Result<Vec<S::Record>, FetchError<S::Error>> {
        self.source.query(query).await.map_err(|e| {
            warn!(query = %query, error = %e, "record source query failed");
            FetchError::Upstream(e)
        })
    }
}

impl<S: RecordSource> std::fmt::Debug for QueryCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.config)
            .field("fingerprint", &self.fingerprint)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
