//! Query execution: from criteria to records.
//!
//! A search opens one store session, resolves the set-valued criteria into a
//! [`Selection`], and fetches the selected records with the fetch-time
//! filters (subject globs, date range) and pagination applied. The session is
//! dropped on every exit path, errors included.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::criteria::{Params, SearchCriteria, classify};
use crate::error::Result;
use crate::glob::translate;
use crate::interface::{CancelToken, QueryContext};
use crate::resolve::{Selection, resolve_selection};
use crate::store::{FetchRequest, Log, LogList, LogStore, RecordId, StoreProvider};

/// Fetches the records of `selection`, applying the fetch-time parts of
/// `criteria`. An empty selection returns no records without a store call.
pub fn execute<S: LogStore>(
    store: &S,
    context: &QueryContext,
    selection: Selection,
    criteria: &SearchCriteria,
) -> Result<Vec<Log>> {
    let ids = match selection {
        Selection::Nothing => return Ok(Vec::new()),
        Selection::All => None,
        Selection::Ids(ids) => Some(ids),
    };
    context.check("fetch")?;
    let request = FetchRequest {
        ids,
        subject_patterns: criteria.name_globs().iter().map(|glob| translate(glob)).collect(),
        date_range: criteria.date_range(),
        pagination: criteria.pagination(),
    };
    store.fetch(&request)
}

pub struct SearchEngine<'p, P> {
    provider: &'p P,
    cancel: CancelToken,
    timeout: Option<Duration>,
}

impl<'p, P: StoreProvider> SearchEngine<'p, P> {
    pub fn new(provider: &'p P) -> Self {
        Self { provider, cancel: CancelToken::new(), timeout: None }
    }
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the full pipeline for already classified criteria.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Log>> {
        let started = Instant::now();
        let outcome = self.run(criteria);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &outcome {
            Ok(logs) => {
                info!(ms = elapsed_ms, rows = logs.len(), "search complete");
                debug!(logs = %LogList(logs), "search results");
            }
            Err(e) => warn!(ms = elapsed_ms, error = %e, "search failed"),
        }
        outcome
    }

    fn run(&self, criteria: &SearchCriteria) -> Result<Vec<Log>> {
        let context = QueryContext::new(self.cancel.clone(), self.timeout);
        context.check("session")?;
        let session = self.provider.session()?;
        let selection = resolve_selection(&session, &context, criteria)?;
        debug!(?selection, "criteria resolved");
        execute(&session, &context, selection, criteria)
    }

    /// Classifies raw request parameters and searches with them.
    pub fn search_params(&self, params: Params) -> Result<Vec<Log>> {
        let criteria = classify(params)?;
        self.search(&criteria)
    }

    pub fn find_by_id(&self, id: RecordId) -> Result<Option<Log>> {
        let criteria = SearchCriteria::builder().id(id).build();
        Ok(self.search(&criteria)?.into_iter().next())
    }

    pub fn find_by_logbook(&self, logbook: &str) -> Result<Vec<Log>> {
        self.search(&SearchCriteria::builder().logbook(logbook).build())
    }

    /// Tags with wildcards are matched as patterns.
    pub fn find_by_tag(&self, tag: &str) -> Result<Vec<Log>> {
        self.search(&SearchCriteria::builder().tag(tag).build())
    }
}
