//! Classification of raw search parameters into typed criteria.
//!
//! The transport layer hands over an unordered bag of `(key, values)` pairs.
//! Keys are case-insensitive; `search`, `tag`, `logbook`, `page`, `limit`,
//! `start` and `end` are reserved and every other key names a property.
//! The result is a [`SearchCriteria`]: one [`Criterion`] per kind (one per
//! property name for properties), immutable once built.

use core::hash::BuildHasherDefault;
use std::collections::HashMap;

use seahash::SeaHasher;

use crate::error::{OlogError, Result};
use crate::glob::is_pattern;
use crate::store::RecordId;

// parameter names are short strings, so a fast non-cryptographic hash will do
type KeyHasher = BuildHasherDefault<SeaHasher>;

/// Raw request parameters: each key with all the values it was given.
pub type Params = Vec<(String, Vec<String>)>;

const SEARCH: &str = "search";
const TAG: &str = "tag";
const LOGBOOK: &str = "logbook";
const PAGE: &str = "page";
const LIMIT: &str = "limit";
const START: &str = "start";
const END: &str = "end";

/// A page of results: `limit` records starting at page `page` (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    limit: u64,
    page: u64,
}
impl Pagination {
    pub fn new(limit: u64, page: u64) -> Result<Self> {
        if limit == 0 {
            return Err(OlogError::InvalidParameter("limit must be at least 1".into()));
        }
        if page == 0 {
            return Err(OlogError::InvalidParameter("page numbers start at 1".into()));
        }
        Ok(Self { limit, page })
    }
    pub fn limit(&self) -> u64 {
        self.limit
    }
    pub fn page(&self) -> u64 {
        self.page
    }
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Inclusive range of creation times, in seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: i64,
    end: i64,
}
impl DateRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }
    pub fn start(&self) -> i64 {
        self.start
    }
    pub fn end(&self) -> i64 {
        self.end
    }
    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    /// Globs over the log subject, applied when records are fetched.
    NameGlob(Vec<String>),
    /// Tag names without wildcards.
    TagExact(Vec<String>),
    /// Tag names containing `*` or `?`.
    TagPattern(Vec<String>),
    Logbook(Vec<String>),
    /// Value globs for one property name (matched case-insensitively).
    Property { name: String, values: Vec<String> },
    DateRange(DateRange),
    Pagination(Pagination),
    /// Explicitly requested records; added to the result rather than filtering it.
    DirectId(Vec<RecordId>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    criteria: Vec<Criterion>,
}

impl SearchCriteria {
    pub fn builder() -> CriteriaBuilder {
        CriteriaBuilder::default()
    }
    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }
    /// True when no criterion of any kind is present.
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
    pub fn name_globs(&self) -> &[String] {
        self.criteria
            .iter()
            .find_map(|c| match c {
                Criterion::NameGlob(globs) => Some(globs.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
    pub fn tags(&self) -> &[String] {
        self.criteria
            .iter()
            .find_map(|c| match c {
                Criterion::TagExact(tags) => Some(tags.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
    pub fn tag_patterns(&self) -> &[String] {
        self.criteria
            .iter()
            .find_map(|c| match c {
                Criterion::TagPattern(patterns) => Some(patterns.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
    pub fn logbooks(&self) -> &[String] {
        self.criteria
            .iter()
            .find_map(|c| match c {
                Criterion::Logbook(logbooks) => Some(logbooks.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
    /// Property name and value globs, in the order the names were first seen.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.criteria.iter().filter_map(|c| match c {
            Criterion::Property { name, values } => Some((name.as_str(), values.as_slice())),
            _ => None,
        })
    }
    pub fn date_range(&self) -> Option<DateRange> {
        self.criteria.iter().find_map(|c| match c {
            Criterion::DateRange(range) => Some(*range),
            _ => None,
        })
    }
    pub fn pagination(&self) -> Option<Pagination> {
        self.criteria.iter().find_map(|c| match c {
            Criterion::Pagination(pagination) => Some(*pagination),
            _ => None,
        })
    }
    pub fn ids(&self) -> &[RecordId] {
        self.criteria
            .iter()
            .find_map(|c| match c {
                Criterion::DirectId(ids) => Some(ids.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}

/// Accumulates criteria before freezing them into a [`SearchCriteria`].
#[derive(Debug, Default)]
pub struct CriteriaBuilder {
    name_globs: Vec<String>,
    tags: Vec<String>,
    tag_patterns: Vec<String>,
    logbooks: Vec<String>,
    properties: Vec<(String, Vec<String>)>,
    property_index: HashMap<String, usize, KeyHasher>,
    date_range: Option<DateRange>,
    pagination: Option<Pagination>,
    ids: Vec<RecordId>,
}

impl CriteriaBuilder {
    pub fn search(mut self, glob: impl Into<String>) -> Self {
        self.name_globs.push(glob.into());
        self
    }
    /// Adds a tag, as a pattern if it carries a wildcard and as an exact name otherwise.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if is_pattern(&tag) {
            self.tag_patterns.push(tag);
        } else {
            self.tags.push(tag);
        }
        self
    }
    pub fn logbook(mut self, logbook: impl Into<String>) -> Self {
        self.logbooks.push(logbook.into());
        self
    }
    /// Names group case-insensitively; the first spelling seen is kept.
    pub fn property(mut self, name: &str, value: impl Into<String>) -> Self {
        let key = name.to_lowercase();
        let slot = match self.property_index.get(&key) {
            Some(slot) => *slot,
            None => {
                self.properties.push((name.to_string(), Vec::new()));
                self.property_index.insert(key, self.properties.len() - 1);
                self.properties.len() - 1
            }
        };
        self.properties[slot].1.push(value.into());
        self
    }
    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }
    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
    pub fn id(mut self, id: RecordId) -> Self {
        self.ids.push(id);
        self
    }
    pub fn ids(mut self, ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.ids.extend(ids);
        self
    }
    pub fn build(self) -> SearchCriteria {
        let mut criteria = Vec::new();
        if !self.name_globs.is_empty() {
            criteria.push(Criterion::NameGlob(self.name_globs));
        }
        if !self.tags.is_empty() {
            criteria.push(Criterion::TagExact(self.tags));
        }
        if !self.tag_patterns.is_empty() {
            criteria.push(Criterion::TagPattern(self.tag_patterns));
        }
        if !self.logbooks.is_empty() {
            criteria.push(Criterion::Logbook(self.logbooks));
        }
        for (name, values) in self.properties {
            criteria.push(Criterion::Property { name, values });
        }
        if let Some(range) = self.date_range {
            criteria.push(Criterion::DateRange(range));
        }
        if let Some(pagination) = self.pagination {
            criteria.push(Criterion::Pagination(pagination));
        }
        if !self.ids.is_empty() {
            criteria.push(Criterion::DirectId(self.ids));
        }
        SearchCriteria { criteria }
    }
}

/// Buckets raw request parameters into typed criteria.
///
/// Pagination must be complete: `limit` without `page` (or the reverse) is an
/// [`OlogError::InvalidParameter`]. A date range with only one bound is
/// ignored. When a scalar key carries several values the first one wins.
pub fn classify<I, K>(params: I) -> Result<SearchCriteria>
where
    I: IntoIterator<Item = (K, Vec<String>)>,
    K: AsRef<str>,
{
    let mut builder = CriteriaBuilder::default();
    let mut scalars: HashMap<&'static str, String, KeyHasher> = HashMap::default();
    for (key, values) in params {
        let name = key.as_ref();
        let key = name.to_lowercase();
        match key.as_str() {
            SEARCH => {
                for value in values {
                    builder = builder.search(value);
                }
            }
            TAG => {
                for value in values {
                    builder = builder.tag(value);
                }
            }
            LOGBOOK => {
                for value in values {
                    builder = builder.logbook(value);
                }
            }
            PAGE => keep_first(&mut scalars, PAGE, values),
            LIMIT => keep_first(&mut scalars, LIMIT, values),
            START => keep_first(&mut scalars, START, values),
            END => keep_first(&mut scalars, END, values),
            _ => {
                for value in values {
                    builder = builder.property(name, value);
                }
            }
        }
    }

    match (scalars.get(LIMIT), scalars.get(PAGE)) {
        (Some(limit), Some(page)) => {
            let pagination = Pagination::new(parse_scalar(LIMIT, limit)?, parse_scalar(PAGE, page)?)?;
            builder = builder.pagination(pagination);
        }
        (None, None) => (),
        (Some(_), None) => {
            return Err(OlogError::InvalidParameter("'limit' requires 'page'".into()));
        }
        (None, Some(_)) => {
            return Err(OlogError::InvalidParameter("'page' requires 'limit'".into()));
        }
    }

    let start = scalars.get(START).map(|v| parse_scalar::<i64>(START, v)).transpose()?;
    let end = scalars.get(END).map(|v| parse_scalar::<i64>(END, v)).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        builder = builder.date_range(DateRange::new(start, end));
    }

    Ok(builder.build())
}

fn keep_first(scalars: &mut HashMap<&'static str, String, KeyHasher>, key: &'static str, values: Vec<String>) {
    if let Some(first) = values.into_iter().next() {
        scalars.entry(key).or_insert(first);
    }
}

fn parse_scalar<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        OlogError::InvalidParameter(format!("'{key}' expects an integer, got '{value}'"))
    })
}
