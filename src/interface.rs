//! Threaded interface for submitting and controlling log searches.
//!
//! Every search gets a [`QueryId`] and a [`CancelToken`] registered here, so a
//! caller can cancel it from another thread. Cancellation is cooperative: the
//! engine checks the token (and the optional deadline) before each store
//! access, so a cancelled query stops at the next resolver boundary.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::criteria::Params;
use crate::error::{OlogError, Result};
use crate::persist::Persistor;
use crate::search::SearchEngine;
use crate::store::{Log, RecordId, StoreProvider};

/// Cancellation token shared with the worker running a query.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-query execution context threaded through every resolver.
#[derive(Debug, Clone)]
pub struct QueryContext {
    cancel: CancelToken,
    deadline: Option<Instant>,
}
impl QueryContext {
    pub fn new(cancel: CancelToken, timeout: Option<Duration>) -> Self {
        Self { cancel, deadline: timeout.map(|t| Instant::now() + t) }
    }
    pub fn unbounded() -> Self {
        Self::new(CancelToken::new(), None)
    }
    /// Fails with [`OlogError::Cancelled`] once the token is tripped or the deadline has passed.
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(OlogError::Cancelled(format!("cancelled before {stage}")));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(OlogError::Cancelled(format!("deadline exceeded before {stage}")));
            }
        }
        Ok(())
    }
}

/// Opaque query identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(u64);

/// Handle to a query running on a background thread.
pub struct QueryHandle {
    pub id: QueryId,
    cancel: CancelToken,
    started: Instant,
    join: Option<JoinHandle<()>>,
    results: Receiver<Result<Vec<Log>>>,
}
impl QueryHandle {
    /// Request cancellation (cooperative).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
    /// Elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
    /// Wait for the query to finish and take its outcome.
    pub fn wait(mut self) -> Result<Vec<Log>> {
        let outcome = self
            .results
            .recv()
            .map_err(|_| OlogError::Invariant("query worker exited without a result".into()));
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
        outcome?
    }
}

/// Query submission options.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Overrides the interface-wide timeout when set.
    pub timeout: Option<Duration>,
}

type Registry = Arc<Mutex<HashMap<QueryId, CancelToken>>>;

/// Registry managing query lifecycles over a shared store.
pub struct QueryInterface<P = Persistor> {
    provider: Arc<P>,
    default_timeout: Option<Duration>,
    next_id: Mutex<u64>,
    active: Registry,
}

impl<P> QueryInterface<P>
where
    P: StoreProvider + Send + Sync + 'static,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            default_timeout: None,
            next_id: Mutex::new(0),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }
    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn allocate_id(&self) -> Result<QueryId> {
        let mut g = self.next_id.lock().map_err(|e| OlogError::Lock(e.to_string()))?;
        *g += 1;
        Ok(QueryId(*g))
    }

    fn register(&self) -> Result<(QueryId, CancelToken)> {
        let id = self.allocate_id()?;
        let cancel = CancelToken::new();
        self.active
            .lock()
            .map_err(|e| OlogError::Lock(e.to_string()))?
            .insert(id, cancel.clone());
        Ok((id, cancel))
    }

    fn timeout(&self, options: &QueryOptions) -> Option<Duration> {
        options.timeout.or(self.default_timeout)
    }

    /// Submit a search for execution on a background thread.
    pub fn start_query(&self, params: Params, options: QueryOptions) -> Result<QueryHandle> {
        let (id, cancel) = self.register()?;
        let (tx, rx) = mpsc::channel();
        let provider = Arc::clone(&self.provider);
        let active = Arc::clone(&self.active);
        let cancel_for_thread = cancel.clone();
        let timeout = self.timeout(&options);
        let join = std::thread::spawn(move || {
            let outcome = SearchEngine::new(&*provider)
                .with_cancel_token(cancel_for_thread)
                .with_timeout(timeout)
                .search_params(params);
            if let Ok(mut active) = active.lock() {
                active.remove(&id);
            }
            // the receiver may already be gone if the handle was dropped
            let _ = tx.send(outcome);
        });
        debug!(query = id.0, "query started");
        Ok(QueryHandle { id, cancel, started: Instant::now(), join: Some(join), results: rx })
    }

    // Runs `f` on the current thread while registered for cancellation.
    fn tracked<T>(&self, timeout: Option<Duration>, f: impl FnOnce(SearchEngine<'_, P>) -> Result<T>) -> Result<T> {
        let (id, cancel) = self.register()?;
        let outcome = f(SearchEngine::new(&*self.provider).with_cancel_token(cancel).with_timeout(timeout));
        self.active.lock().map_err(|e| OlogError::Lock(e.to_string()))?.remove(&id);
        outcome
    }

    /// Run a search synchronously on the current thread, still registered for cancellation.
    pub fn run_sync(&self, params: Params, options: QueryOptions) -> Result<Vec<Log>> {
        self.tracked(self.timeout(&options), |engine| engine.search_params(params))
    }

    pub fn find_by_id(&self, id: RecordId) -> Result<Option<Log>> {
        self.tracked(self.default_timeout, |engine| engine.find_by_id(id))
    }

    /// Cancel a query by id.
    pub fn cancel(&self, id: QueryId) -> bool {
        match self.active.lock() {
            Ok(active) => match active.get(&id) {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn active_queries(&self) -> usize {
        self.active.lock().map(|active| active.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tripped_token_fails_the_check() {
        let token = CancelToken::new();
        let context = QueryContext::new(token.clone(), None);
        assert!(context.check("tags").is_ok());
        token.cancel();
        let err = context.check("tags").unwrap_err();
        assert!(matches!(err, OlogError::Cancelled(_)));
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn zero_timeout_is_already_expired() {
        let context = QueryContext::new(CancelToken::new(), Some(Duration::ZERO));
        assert!(matches!(context.check("fetch"), Err(OlogError::Cancelled(_))));
    }

    #[test]
    fn unbounded_context_never_expires() {
        assert!(QueryContext::unbounded().check("fetch").is_ok());
    }
}
