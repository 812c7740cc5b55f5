//! # qcache
//!
//! A read-through cache for paginated, filtered and sorted record queries,
//! with automatic invalidation when the query logic itself changes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use qcache::{CacheConfig, CacheStore, Employee, EmployeeTable, PageRequest, QueryCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(CacheStore::new());
//!     let table = EmployeeTable::new(vec![Employee::new(1, "Ann", "Engineer")]);
//!     let cache = QueryCache::new(store, table, CacheConfig::default())?;
//!
//!     let page = cache
//!         .fetch_page(&PageRequest::new(0, 20).sort_by("name", true))
//!         .await?;
//!     println!("{} employees", page.len());
//!     Ok(())
//! }
//! ```

// ── Storage ───────────────────────────────────────────────────────────────────
pub mod cache;
pub mod database;

// ── Query model and coordination ──────────────────────────────────────────────
pub mod config;
pub mod coordinator;
pub mod query;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::CacheStore;
pub use config::{CacheConfig, ConfigError};
pub use coordinator::{BuildError, FetchError, Page, QueryCache};
pub use database::{Employee, EmployeeTable, RecordSource};
pub use query::{CacheKey, LogicFingerprint, PageQuery, PageRequest, QueryError, QueryLogic};
