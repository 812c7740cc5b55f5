//! Query parameters, validation and cache-key derivation.
//!
//! A caller describes the page it wants with a [`PageRequest`]: filter pairs,
//! page number, page size, sort field and direction. The request is checked
//! once by [`PageRequest::validate`], producing a [`PageQuery`] whose
//! invariants (non-negative page, positive size, sorted filters) the rest of
//! the crate relies on.
//!
//! [`logic`] describes the filter/sort/paging rules a record source applies
//! and turns them into a [`LogicFingerprint`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod key;
pub mod logic;

pub use key::CacheKey;
pub use logic::{FilterRule, LogicFingerprint, Matcher, PagingRule, QueryLogic, SortRule};

/// Default page size used by [`PageRequest::default`].
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Reasons a [`PageRequest`] is rejected before it reaches the cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("page number must not be negative, got {page_no}")]
    NegativePage { page_no: i64 },

    #[error("page size must be positive, got {page_size}")]
    NonPositivePageSize { page_size: i64 },

    #[error("page window ({page_no} x {page_size}) does not fit in memory addressing")]
    WindowOutOfRange { page_no: i64, page_size: i64 },

    #[error("filter field name must not be empty")]
    EmptyFilterField,
}

/// Raw page request as supplied by a caller.
///
/// Filters are an unordered map; two requests with the same pairs in a
/// different insertion order describe the same page.
///
/// # Examples
///
/// ```
/// use qcache::query::PageRequest;
///
/// let request = PageRequest::new(0, 20)
///     .filter("designation", "Engineer")
///     .sort_by("name", true);
///
/// let query = request.validate().unwrap();
/// assert_eq!(query.offset(), 0);
/// assert_eq!(query.page_size(), 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub filters: HashMap<String, String>,
    pub page_no: i64,
    pub page_size: i64,
    pub sort_field: String,
    pub ascending: bool,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            filters: HashMap::new(),
            page_no: 0,
            page_size: DEFAULT_PAGE_SIZE,
            sort_field: String::from("id"),
            ascending: true,
        }
    }
}

impl PageRequest {
    /// Request page `page_no` (zero based) holding up to `page_size` records,
    /// sorted ascending by id.
    pub fn new(page_no: i64, page_size: i64) -> Self {
        Self {
            page_no,
            page_size,
            ..Self::default()
        }
    }

    /// Add a filter pair, replacing an earlier value for the same field.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    /// Set the sort field and direction.
    pub fn sort_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.sort_field = field.into();
        self.ascending = ascending;
        self
    }

    /// Check the request and convert it into a [`PageQuery`].
    ///
    /// # Errors
    ///
    /// - [`QueryError::NegativePage`] when `page_no < 0`.
    /// - [`QueryError::NonPositivePageSize`] when `page_size <= 0`.
    /// - [`QueryError::WindowOutOfRange`] when the skip offset overflows `usize`.
    /// - [`QueryError::EmptyFilterField`] when a filter has an empty field name.
    pub fn validate(&self) -> Result<PageQuery, QueryError> {
        if self.page_no < 0 {
            return Err(QueryError::NegativePage {
                page_no: self.page_no,
            });
        }
        if self.page_size <= 0 {
            return Err(QueryError::NonPositivePageSize {
                page_size: self.page_size,
            });
        }

        let out_of_range = || QueryError::WindowOutOfRange {
            page_no: self.page_no,
            page_size: self.page_size,
        };
        let page_no = usize::try_from(self.page_no).map_err(|_| out_of_range())?;
        let page_size = usize::try_from(self.page_size)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(out_of_range)?;
        page_no
            .checked_mul(page_size.get())
            .ok_or_else(out_of_range)?;

        if self.filters.keys().any(|field| field.trim().is_empty()) {
            return Err(QueryError::EmptyFilterField);
        }

        Ok(PageQuery {
            filters: self
                .filters
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect(),
            page_no,
            page_size,
            sort_field: self.sort_field.clone(),
            ascending: self.ascending,
        })
    }
}

/// A validated page request.
///
/// Filters are held in a [`BTreeMap`], so iteration is always ordered by
/// field name regardless of how the caller built the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageQuery {
    filters: BTreeMap<String, String>,
    page_no: usize,
    page_size: NonZeroUsize,
    sort_field: String,
    ascending: bool,
}

impl PageQuery {
    /// Filter pairs ordered by field name.
    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn page_no(&self) -> usize {
        self.page_no
    }

    pub fn page_size(&self) -> usize {
        self.page_size.get()
    }

    pub fn sort_field(&self) -> &str {
        &self.sort_field
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    /// Number of records to skip: `page_no * page_size`.
    pub fn offset(&self) -> usize {
        // Overflow was ruled out in `PageRequest::validate`.
        self.page_no * self.page_size.get()
    }
}

impl fmt::Display for PageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {} x {} by {} {}",
            self.page_no,
            self.page_size,
            self.sort_field,
            if self.ascending { "asc" } else { "desc" }
        )?;
        for (field, value) in &self.filters {
            write!(f, " [{field}~{value}]")?;
        }
        Ok(())
    }
}
