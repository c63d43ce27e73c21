use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use olog::criteria::Params;
use olog::error::OlogError;
use olog::interface::{QueryInterface, QueryOptions};
use olog::persist::{PersistenceMode, Persistor};
use olog::store::StoreProvider;

fn setup() -> QueryInterface {
    let persistor = Persistor::new(PersistenceMode::InMemory).unwrap();
    for i in 1..=3i64 {
        let log = persistor
            .create_log(&format!("entry {i}"), "operator", DateTime::from_timestamp(i, 0).unwrap())
            .unwrap();
        persistor.attach_logbook(log, "ops", None).unwrap();
    }
    QueryInterface::new(Arc::new(persistor))
}

fn params(key: &str, value: &str) -> Params {
    vec![(key.to_string(), vec![value.to_string()])]
}

#[test]
fn background_query_delivers_results() {
    let interface = setup();
    let handle = interface.start_query(params("logbook", "ops"), QueryOptions::default()).unwrap();
    let logs = handle.wait().unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(interface.active_queries(), 0);
}

#[test]
fn sync_queries_unregister_when_done() {
    let interface = setup();
    let logs = interface.run_sync(params("logbook", "nomatch"), QueryOptions::default()).unwrap();
    assert!(logs.is_empty());
    assert_eq!(interface.active_queries(), 0);
    assert!(interface.run_sync(params("limit", "1"), QueryOptions::default()).is_err());
    assert_eq!(interface.active_queries(), 0);
}

#[test]
fn per_query_timeout_overrides_default() {
    let interface = setup().with_timeout(Some(Duration::from_secs(60)));
    let err = interface
        .run_sync(params("logbook", "ops"), QueryOptions { timeout: Some(Duration::ZERO) })
        .unwrap_err();
    assert!(matches!(err, OlogError::Cancelled(_)));
}

#[test]
fn finished_queries_cannot_be_cancelled() {
    let interface = setup();
    let handle = interface.start_query(params("logbook", "ops"), QueryOptions::default()).unwrap();
    let id = handle.id;
    handle.wait().unwrap();
    assert!(!interface.cancel(id));
}

#[test]
fn find_by_id_through_the_interface() {
    let interface = setup();
    assert_eq!(interface.find_by_id(2).unwrap().map(|l| l.subject), Some("entry 2".to_string()));
    assert!(interface.find_by_id(7).unwrap().is_none());
}

#[test]
fn cancelling_through_the_handle_stops_a_waiting_query() {
    let interface = setup();
    // holding the connection keeps the worker from reaching the store
    let held = interface.provider().session().unwrap();
    let handle = interface.start_query(params("logbook", "ops"), QueryOptions::default()).unwrap();
    assert_eq!(interface.active_queries(), 1);
    let before = handle.elapsed();
    std::thread::sleep(Duration::from_millis(5));
    assert!(handle.elapsed() > before);

    handle.cancel();
    drop(held);
    let err = handle.wait().unwrap_err();
    assert!(matches!(err, OlogError::Cancelled(_)));
    assert_eq!(interface.active_queries(), 0);
}

#[test]
fn running_queries_can_be_cancelled_by_id() {
    let interface = setup();
    let held = interface.provider().session().unwrap();
    let handle = interface.start_query(params("logbook", "ops"), QueryOptions::default()).unwrap();
    assert!(interface.cancel(handle.id));
    drop(held);
    assert!(matches!(handle.wait(), Err(OlogError::Cancelled(_))));
}

#[test]
fn lookups_by_id_are_registered_while_running() {
    let interface = setup();
    let held = interface.provider().session().unwrap();
    std::thread::scope(|scope| {
        let lookup = scope.spawn(|| interface.find_by_id(1));
        let mut waited = Duration::ZERO;
        while interface.active_queries() == 0 && waited < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(1));
            waited += Duration::from_millis(1);
        }
        assert_eq!(interface.active_queries(), 1);
        drop(held);
        let log = lookup.join().unwrap().unwrap();
        assert_eq!(log.map(|l| l.id), Some(1));
    });
    assert_eq!(interface.active_queries(), 0);
}
