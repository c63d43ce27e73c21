use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use roaring::RoaringTreemap;

use olog::criteria::{Params, SearchCriteria};
use olog::error::{OlogError, Result, StoreStatus};
use olog::interface::CancelToken;
use olog::search::SearchEngine;
use olog::store::{FetchRequest, Log, LogStore, StoreProvider};

/// Store whose every call fails, counting how often it was asked.
#[derive(Default)]
struct BrokenStore {
    calls: AtomicUsize,
    sessions: AtomicUsize,
}

struct BrokenSession<'s>(&'s BrokenStore);

impl BrokenSession<'_> {
    fn fail<T>(&self) -> Result<T> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        Err(OlogError::store("connection reset"))
    }
}

impl LogStore for BrokenSession<'_> {
    fn ids_by_tag(&self, _pattern: &str) -> Result<RoaringTreemap> {
        self.fail()
    }
    fn ids_by_logbook(&self, _pattern: &str) -> Result<RoaringTreemap> {
        self.fail()
    }
    fn ids_by_property(&self, _name: &str, _pattern: &str) -> Result<RoaringTreemap> {
        self.fail()
    }
    fn fetch(&self, _request: &FetchRequest) -> Result<Vec<Log>> {
        self.fail()
    }
}

impl StoreProvider for BrokenStore {
    type Session<'s> = BrokenSession<'s>;
    fn session(&self) -> Result<BrokenSession<'_>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(BrokenSession(self))
    }
}

fn setup() -> BrokenStore {
    BrokenStore::default()
}

fn params(key: &str, value: &str) -> Params {
    vec![(key.to_string(), vec![value.to_string()])]
}

#[test]
fn store_failures_surface_as_backing_store_errors() {
    let store = setup();
    let engine = SearchEngine::new(&store);
    for (key, value) in [("tag", "urgent"), ("tag", "urg*"), ("logbook", "ops"), ("shift", "day"), ("search", "*")] {
        let err = engine.search_params(params(key, value)).unwrap_err();
        assert!(
            matches!(err, OlogError::BackingStore { status: StoreStatus::InternalError, .. }),
            "{key}={value} gave {err}"
        );
    }
    // one session per query
    assert_eq!(store.sessions.load(Ordering::SeqCst), 5);
}

#[test]
fn first_failure_stops_resolution() {
    let store = setup();
    let criteria = SearchCriteria::builder().tag("urgent").tag("trip").logbook("ops").build();
    assert!(SearchEngine::new(&store).search(&criteria).is_err());
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn cancelled_query_never_touches_the_store() {
    let store = setup();
    let token = CancelToken::new();
    token.cancel();
    let err = SearchEngine::new(&store)
        .with_cancel_token(token)
        .search_params(params("tag", "urgent"))
        .unwrap_err();
    assert!(matches!(err, OlogError::Cancelled(_)));
    assert_eq!(store.sessions.load(Ordering::SeqCst), 0);
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn expired_deadline_cancels() {
    let store = setup();
    let err = SearchEngine::new(&store)
        .with_timeout(Some(Duration::ZERO))
        .search(&SearchCriteria::default())
        .unwrap_err();
    assert!(matches!(err, OlogError::Cancelled(_)));
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn invalid_parameters_fail_before_any_session() {
    let store = setup();
    let err = SearchEngine::new(&store).search_params(params("page", "1")).unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(store.sessions.load(Ordering::SeqCst), 0);
}
