//! The backing store as seen by the search core.
//!
//! Resolvers only ever ask three kinds of question ("which logs carry a tag /
//! belong to a logbook / have a property matching this pattern") plus one
//! fetch of full records. [`LogStore`] is that surface; [`StoreProvider`]
//! hands out one session per query.

use std::fmt;

use chrono::{DateTime, Utc};
use roaring::RoaringTreemap;
use serde::Serialize;

use crate::criteria::{DateRange, Pagination};
use crate::error::Result;

/// Identity of a stored log entry.
pub type RecordId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Log {
    pub id: RecordId,
    pub subject: String,
    pub owner: String,
    pub created: DateTime<Utc>,
    pub logbooks: Vec<String>,
    pub tags: Vec<String>,
    pub properties: Vec<Property>,
}

// compact form used when logging: subject(owner):[logbooks|tags]
impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}({}):[{}|{}]",
            self.subject,
            self.owner,
            self.logbooks.join(","),
            self.tags.join(",")
        )
    }
}

/// Display adapter for a result list; an empty list renders as `[None]`.
pub struct LogList<'a>(pub &'a [Log]);

impl fmt::Display for LogList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "[None]");
        }
        let mut s = String::new();
        for log in self.0 {
            s += &(log.to_string() + ",");
        }
        s.pop();
        write!(f, "[{}]", s)
    }
}

/// Everything the executor hands to the store in one fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    /// Restrict to these records; `None` means the whole collection.
    pub ids: Option<RoaringTreemap>,
    /// `LIKE` patterns over the subject, any of which may match.
    pub subject_patterns: Vec<String>,
    pub date_range: Option<DateRange>,
    pub pagination: Option<Pagination>,
}

pub trait LogStore {
    /// Logs carrying a tag whose name matches the `LIKE` pattern.
    fn ids_by_tag(&self, pattern: &str) -> Result<RoaringTreemap>;
    /// Logs belonging to a logbook whose name matches the `LIKE` pattern.
    fn ids_by_logbook(&self, pattern: &str) -> Result<RoaringTreemap>;
    /// Logs whose property `name` has a value matching the `LIKE` pattern.
    fn ids_by_property(&self, name: &str, pattern: &str) -> Result<RoaringTreemap>;
    /// Full records, newest first, filtered and paginated per the request.
    fn fetch(&self, request: &FetchRequest) -> Result<Vec<Log>>;
}

/// Source of store sessions. A session lives for exactly one query and is
/// released when dropped.
pub trait StoreProvider {
    type Session<'s>: LogStore
    where
        Self: 's;
    fn session(&self) -> Result<Self::Session<'_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(subject: &str, logbooks: &[&str], tags: &[&str]) -> Log {
        Log {
            id: 1,
            subject: subject.into(),
            owner: "operator".into(),
            created: DateTime::from_timestamp(0, 0).unwrap(),
            logbooks: logbooks.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            properties: Vec::new(),
        }
    }

    #[test]
    fn compact_display() {
        let entry = log("Beam dump", &["ops", "cryo"], &["urgent"]);
        assert_eq!(entry.to_string(), "Beam dump(operator):[ops,cryo|urgent]");
    }

    #[test]
    fn list_display() {
        assert_eq!(LogList(&[]).to_string(), "[None]");
        let logs = [log("a", &["ops"], &[]), log("b", &[], &["t"])];
        assert_eq!(LogList(&logs).to_string(), "[a(operator):[ops|],b(operator):[|t]]");
    }
}
