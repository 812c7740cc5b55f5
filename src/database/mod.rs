//! Record sources — the backing store a [`QueryCache`](crate::coordinator::QueryCache)
//! reads through to.
//!
//! [`RecordSource`] is the contract the cache consumes: run one page query
//! and describe the rules used to run it. [`EmployeeTable`] is an in-memory
//! source over [`Employee`] records implementing the employee directory rules:
//!
//! | Parameter   | Recognised values         | Unknown values          |
//! |-------------|---------------------------|-------------------------|
//! | filter      | `name`, `designation`     | ignored                 |
//! | sort field  | `id`, `name`, `designation` | ordered by `id`       |
//!
//! Field names are matched case-insensitively; filter values are matched as
//! case-sensitive substrings. Sorting is stable and honours the direction
//! flag for every field.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::future::Future;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::query::{FilterRule, Matcher, PageQuery, PagingRule, QueryLogic, SortRule};

/// Bump whenever the behaviour behind [`employee_logic`] changes without the
/// rule table itself changing.
pub const EMPLOYEE_LOGIC_VERSION: u32 = 2;

/// The backing store queried on a cache miss.
///
/// Implementations apply filters, sort and pagination themselves. The
/// [`QueryLogic`] they return from [`logic`](Self::logic) must describe those
/// rules faithfully: it is the only signal the cache has that previously
/// cached pages were produced by different code.
///
/// # Contract
///
/// - `query` must return at most `query.page_size()` records.
/// - Errors are handed back to the caller unchanged and are never cached.
pub trait RecordSource: Send + Sync {
    /// The record type produced by this source.
    type Record: Send + Sync + 'static;

    /// The error type produced when a query fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Describe the filter/sort/paging rules this source applies.
    fn logic(&self) -> QueryLogic;

    /// Run one page query.
    fn query(
        &self,
        query: &PageQuery,
    ) -> impl Future<Output = Result<Vec<Self::Record>, Self::Error>> + Send;
}

/// Errors produced while building an [`EmployeeTable`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to decode employee records: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One employee directory record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub designation: String,
}

impl Employee {
    pub fn new(id: i64, name: impl Into<String>, designation: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            designation: designation.into(),
        }
    }
}

/// Filter fields understood by [`EmployeeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmployeeFilter {
    Name,
    Designation,
}

impl EmployeeFilter {
    /// Resolve a filter field name, case-insensitively. Unknown names yield `None`.
    pub fn parse(field: &str) -> Option<Self> {
        match field.to_ascii_lowercase().as_str() {
            "name" => Some(Self::Name),
            "designation" => Some(Self::Designation),
            _ => None,
        }
    }

    fn matches(self, employee: &Employee, value: &str) -> bool {
        match self {
            Self::Name => employee.name.contains(value),
            Self::Designation => employee.designation.contains(value),
        }
    }
}

/// Sort fields understood by [`EmployeeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmployeeSort {
    #[default]
    Id,
    Name,
    Designation,
}

impl EmployeeSort {
    /// Resolve a sort field name, case-insensitively, falling back to [`EmployeeSort::Id`].
    pub fn parse(field: &str) -> Self {
        match field.to_ascii_lowercase().as_str() {
            "name" => Self::Name,
            "designation" => Self::Designation,
            _ => Self::Id,
        }
    }

    fn compare(self, a: &Employee, b: &Employee) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::Name => a.name.cmp(&b.name),
            Self::Designation => a.designation.cmp(&b.designation),
        }
    }
}

/// The rule table implemented by [`EmployeeTable`].
pub fn employee_logic() -> QueryLogic {
    QueryLogic {
        version: EMPLOYEE_LOGIC_VERSION,
        filters: vec![
            FilterRule {
                field: "name",
                matcher: Matcher::Contains,
                case_sensitive: true,
            },
            FilterRule {
                field: "designation",
                matcher: Matcher::Contains,
                case_sensitive: true,
            },
        ],
        sorts: vec![
            SortRule {
                field: "name",
                honours_direction: true,
            },
            SortRule {
                field: "designation",
                honours_direction: true,
            },
            SortRule {
                field: "id",
                honours_direction: true,
            },
        ],
        default_sort: "id",
        paging: PagingRule::SkipTake,
    }
}

/// In-memory employee source.
///
/// # Examples
///
/// ```
/// use qcache::database::{Employee, EmployeeTable};
/// use qcache::query::PageRequest;
///
/// let table = EmployeeTable::new(vec![
///     Employee::new(2, "Bo", "Engineer"),
///     Employee::new(1, "Al", "Manager"),
/// ]);
///
/// let query = PageRequest::new(0, 10).validate().unwrap();
/// let ids: Vec<_> = table.select(&query).into_iter().map(|e| e.id).collect();
/// assert_eq!(ids, vec![1, 2]);
/// ```
#[derive(Debug, Default)]
pub struct EmployeeTable {
    rows: RwLock<Vec<Employee>>,
}

impl EmployeeTable {
    pub fn new(rows: Vec<Employee>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Build a table from a JSON array of employee objects.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Decode`] if `json` is not an array of employees.
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        let rows: Vec<Employee> = serde_json::from_str(json)?;
        Ok(Self::new(rows))
    }

    /// Append a record. Cached pages are not touched; callers that mutate the
    /// table are responsible for invalidating them.
    pub fn insert(&self, employee: Employee) {
        self.rows.write().push(employee);
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Apply filters, sort and paging to the current rows.
    pub fn select(&self, query: &PageQuery) -> Vec<Employee> {
        let filters: Vec<(EmployeeFilter, &str)> = query
            .filters()
            .iter()
            .filter_map(|(field, value)| {
                let filter = EmployeeFilter::parse(field);
                if filter.is_none() {
                    debug!(field = %field, "ignoring unknown filter field");
                }
                filter.map(|f| (f, value.as_str()))
            })
            .collect();

        let sort = EmployeeSort::parse(query.sort_field());
        let ascending = query.ascending();

        let rows = self.rows.read();
        let mut selected: Vec<&Employee> = rows
            .iter()
            .filter(|e| filters.iter().all(|(f, value)| f.matches(e, value)))
            .collect();

        // `sort_by` is stable; reversing the comparator keeps ties in input order.
        selected.sort_by(|a, b| {
            let ord = sort.compare(a, b);
            if ascending { ord } else { ord.reverse() }
        });

        selected
            .into_iter()
            .skip(query.offset())
            .take(query.page_size())
            .cloned()
            .collect()
    }
}

impl RecordSource for EmployeeTable {
    type Record = Employee;
    type Error = Infallible;

    fn logic(&self) -> QueryLogic {
        employee_logic()
    }

    async fn query(&self, query: &PageQuery) -> Result<Vec<Employee>, Infallible> {
        Ok(self.select(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::PageRequest;

    fn table(count: i64) -> EmployeeTable {
        let designations = ["Engineer", "Manager", "Analyst"];
        EmployeeTable::new(
            (1..=count)
                .map(|id| {
                    Employee::new(
                        id,
                        format!("Employee {id:02}"),
                        designations[(id as usize) % designations.len()],
                    )
                })
                .collect(),
        )
    }

    fn ids(rows: &[Employee]) -> Vec<i64> {
        rows.iter().map(|e| e.id).collect()
    }

    fn select(table: &EmployeeTable, request: PageRequest) -> Vec<Employee> {
        table.select(&request.validate().unwrap())
    }

    #[test]
    fn second_page_skips_first() {
        let rows = select(&table(25), PageRequest::new(1, 10));
        assert_eq!(ids(&rows), (11..=20).collect::<Vec<_>>());
    }

    #[test]
    fn last_page_is_partial() {
        let rows = select(&table(25), PageRequest::new(2, 10));
        assert_eq!(ids(&rows), (21..=25).collect::<Vec<_>>());
    }

    #[test]
    fn page_past_the_end_is_empty() {
        assert!(select(&table(25), PageRequest::new(5, 10)).is_empty());
    }

    #[test]
    fn unknown_filter_is_ignored() {
        let t = table(25);
        let plain = select(&t, PageRequest::new(0, 30));
        let with_unknown = select(&t, PageRequest::new(0, 30).filter("department", "Sales"));
        assert_eq!(plain, with_unknown);
    }

    #[test]
    fn filters_use_substring_match() {
        let t = table(25);
        let rows = select(&t, PageRequest::new(0, 30).filter("designation", "Manag"));
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|e| e.designation == "Manager"));

        let rows = select(&t, PageRequest::new(0, 30).filter("NAME", "Employee 1"));
        assert_eq!(ids(&rows), (10..=19).collect::<Vec<_>>());
    }

    #[test]
    fn filter_values_are_case_sensitive() {
        let rows = select(&table(5), PageRequest::new(0, 10).filter("name", "employee"));
        assert!(rows.is_empty());
    }

    #[test]
    fn unknown_sort_falls_back_to_id() {
        let t = table(12);
        for ascending in [true, false] {
            let by_unknown = select(&t, PageRequest::new(0, 20).sort_by("unknown", ascending));
            let by_id = select(&t, PageRequest::new(0, 20).sort_by("id", ascending));
            assert_eq!(by_unknown, by_id);
        }
    }

    #[test]
    fn descending_id_reverses_order() {
        let rows = select(&table(5), PageRequest::new(0, 10).sort_by("Id", false));
        assert_eq!(ids(&rows), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn designation_sort_honours_both_directions() {
        let t = table(6);
        let asc = select(&t, PageRequest::new(0, 10).sort_by("designation", true));
        let desc = select(&t, PageRequest::new(0, 10).sort_by("designation", false));

        assert_eq!(asc.first().map(|e| e.designation.as_str()), Some("Analyst"));
        assert_eq!(desc.first().map(|e| e.designation.as_str()), Some("Manager"));
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let t = table(9);
        let rows = select(&t, PageRequest::new(0, 10).sort_by("designation", true));
        let analysts: Vec<_> = rows
            .iter()
            .filter(|e| e.designation == "Analyst")
            .map(|e| e.id)
            .collect();
        assert_eq!(analysts, vec![2, 5, 8]);
    }

    #[test]
    fn name_sort_descending() {
        let rows = select(&table(3), PageRequest::new(0, 10).sort_by("name", false));
        assert_eq!(ids(&rows), vec![3, 2, 1]);
    }

    #[test]
    fn from_json_round_trips_records() {
        let t = EmployeeTable::from_json(
            r#"[{"id":1,"name":"Al","designation":"Dev"},{"id":2,"name":"Bo","designation":"Ops"}]"#,
        )
        .unwrap();
        assert_eq!(t.len(), 2);
        assert!(matches!(
            EmployeeTable::from_json("{}"),
            Err(SourceError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn record_source_query_matches_select() {
        let t = table(25);
        let query = PageRequest::new(1, 10).validate().unwrap();
        let rows = t.query(&query).await.unwrap();
        assert_eq!(rows, t.select(&query));
    }
}
