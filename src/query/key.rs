//! Cache key derivation.
//!
//! A key is `"{namespace}:{document}"` where the document is a canonical JSON
//! object built from the validated query. Filter pairs are emitted in field
//! order and string values are JSON-escaped, so equal queries always produce
//! the same key and delimiter characters inside values cannot collide.

use std::fmt;

use serde_json::json;

use super::PageQuery;

/// Separator between the namespace tag and the parameter document.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Deterministic cache key for one page query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `query` inside `namespace`.
    ///
    /// # Examples
    ///
    /// ```
    /// use qcache::query::{CacheKey, PageRequest};
    ///
    /// let a = PageRequest::new(1, 10).filter("name", "Ann").filter("designation", "Dev");
    /// let b = PageRequest::new(1, 10).filter("designation", "Dev").filter("name", "Ann");
    ///
    /// let ka = CacheKey::derive("GetEmployees", &a.validate().unwrap());
    /// let kb = CacheKey::derive("GetEmployees", &b.validate().unwrap());
    /// assert_eq!(ka, kb);
    /// assert!(ka.as_str().starts_with("GetEmployees:"));
    /// ```
    pub fn derive(namespace: &str, query: &PageQuery) -> Self {
        let document = json!({
            "filters": query.filters(),
            "page_no": query.page_no(),
            "page_size": query.page_size(),
            "sort_field": query.sort_field(),
            "ascending": query.ascending(),
        });
        Self(format!("{namespace}{NAMESPACE_SEPARATOR}{document}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Prefix shared by every key derived inside `namespace`.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{namespace}{NAMESPACE_SEPARATOR}")
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::PageRequest;

    fn key(request: PageRequest) -> CacheKey {
        CacheKey::derive("GetEmployees", &request.validate().unwrap())
    }

    #[test]
    fn filter_order_does_not_change_key() {
        let mut forward = PageRequest::new(0, 10);
        let mut backward = PageRequest::new(0, 10);
        let pairs = [("name", "a"), ("designation", "b"), ("department", "c")];
        for (f, v) in pairs {
            forward = forward.filter(f, v);
        }
        for (f, v) in pairs.iter().rev() {
            backward = backward.filter(*f, *v);
        }
        assert_eq!(key(forward), key(backward));
    }

    #[test]
    fn every_parameter_is_part_of_the_key() {
        let base = key(PageRequest::new(1, 10).sort_by("name", true));
        assert_ne!(base, key(PageRequest::new(2, 10).sort_by("name", true)));
        assert_ne!(base, key(PageRequest::new(1, 20).sort_by("name", true)));
        assert_ne!(base, key(PageRequest::new(1, 10).sort_by("id", true)));
        assert_ne!(base, key(PageRequest::new(1, 10).sort_by("name", false)));
        assert_ne!(
            base,
            key(PageRequest::new(1, 10).sort_by("name", true).filter("name", "x"))
        );
    }

    #[test]
    fn delimiters_in_values_do_not_collide() {
        let joined = key(PageRequest::new(0, 10).filter("name", "a_designation=b"));
        let split = key(
            PageRequest::new(0, 10)
                .filter("name", "a")
                .filter("designation", "b"),
        );
        assert_ne!(joined, split);
    }

    #[test]
    fn key_is_namespaced() {
        let k = key(PageRequest::default());
        assert!(k.as_str().starts_with(&namespace_prefix("GetEmployees")));
        assert_eq!(
            k.as_str(),
            r#"GetEmployees:{"ascending":true,"filters":{},"page_no":0,"page_size":10,"sort_field":"id"}"#
        );
    }
}
