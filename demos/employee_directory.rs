//! Serves a few pages from an in-memory employee directory through the cache.
//!
//! Run with `RUST_LOG=qcache=debug cargo run --example employee_directory`
//! to watch hits, misses and invalidations.

use std::sync::Arc;

use qcache::{CacheConfig, CacheStore, Employee, EmployeeTable, PageRequest, QueryCache};
use tracing_subscriber::EnvFilter;

const EMPLOYEES: &str = r#"[
    {"id": 1, "name": "Asha", "designation": "Engineer"},
    {"id": 2, "name": "Bruno", "designation": "Manager"},
    {"id": 3, "name": "Chen", "designation": "Engineer"},
    {"id": 4, "name": "Dana", "designation": "Analyst"},
    {"id": 5, "name": "Eli", "designation": "Senior Engineer"}
]"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store = Arc::new(CacheStore::new());
    let table = EmployeeTable::from_json(EMPLOYEES)?;
    let cache = QueryCache::new(Arc::clone(&store), table, CacheConfig::default())?;

    let engineers = PageRequest::new(0, 2)
        .filter("designation", "Engineer")
        .sort_by("name", false);

    for _ in 0..2 {
        let page = cache.fetch_page(&engineers).await?;
        let names: Vec<_> = page.iter().map(|e| e.name.as_str()).collect();
        println!("engineers page 0: {names:?}");
    }

    cache.source().insert(Employee::new(6, "Farah", "Engineer"));
    println!("invalidated {} cached page(s)", cache.invalidate_all());

    let page = cache.fetch_page(&engineers).await?;
    let names: Vec<_> = page.iter().map(|e| e.name.as_str()).collect();
    println!("engineers page 0 after insert: {names:?}");

    if let Err(e) = cache.fetch_page(&PageRequest::new(-1, 10)).await {
        println!("rejected: {e}");
    }

    let stats = cache.stats();
    println!(
        "hits={} misses={} logic_invalidations={} hit_rate={:.2}",
        stats.hits,
        stats.misses,
        stats.logic_invalidations,
        stats.hit_rate()
    );
    println!("fingerprint {}", cache.fingerprint());

    Ok(())
}
