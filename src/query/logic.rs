//! Versioned description of query-construction logic and its fingerprint.
//!
//! A record source publishes the rules it applies as a [`QueryLogic`] table:
//! which filter fields it recognises and how they match, which sort fields it
//! supports, the fallback ordering, and how pages are cut. The table carries
//! an explicit `version` that must be bumped whenever the code behind a rule
//! changes without the table itself changing.
//!
//! [`LogicFingerprint`] is the SHA-256 of the table's canonical JSON form.
//! Cached pages are only trusted while the stored fingerprint matches.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// How a filter value is matched against a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// Field contains the value as a substring.
    Contains,
    /// Field equals the value exactly.
    Equals,
}

/// A filter field recognised by a record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterRule {
    pub field: &'static str,
    pub matcher: Matcher,
    pub case_sensitive: bool,
}

/// A sort field recognised by a record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortRule {
    pub field: &'static str,
    /// Whether the ascending flag is honoured for this field.
    pub honours_direction: bool,
}

/// How a page window is cut from the ordered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PagingRule {
    /// Skip `page_no * page_size`, take `page_size`.
    SkipTake,
}

/// The complete rule table behind a record source's queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryLogic {
    pub version: u32,
    pub filters: Vec<FilterRule>,
    pub sorts: Vec<SortRule>,
    pub default_sort: &'static str,
    pub paging: PagingRule,
}

impl QueryLogic {
    /// Compute the fingerprint of this rule table.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the table cannot be rendered as JSON.
    pub fn fingerprint(&self) -> Result<LogicFingerprint, serde_json::Error> {
        LogicFingerprint::compute(self)
    }
}

/// Hex-encoded SHA-256 digest identifying one version of query logic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicFingerprint(String);

impl LogicFingerprint {
    /// Hash the canonical JSON rendering of `logic`.
    ///
    /// # Examples
    ///
    /// ```
    /// use qcache::database::employee_logic;
    ///
    /// let a = employee_logic().fingerprint().unwrap();
    /// let mut bumped = employee_logic();
    /// bumped.version += 1;
    ///
    /// assert_eq!(a.as_str().len(), 64);
    /// assert_ne!(a, bumped.fingerprint().unwrap());
    /// ```
    pub fn compute(logic: &QueryLogic) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_vec(logic)?;
        let digest = Sha256::digest(&canonical);
        Ok(Self(hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
