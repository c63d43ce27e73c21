use chrono::DateTime;
use olog::persist::{PersistenceMode, Persistor};
use olog::search::SearchEngine;

#[test]
fn in_memory_mode_allows_basic_operations() {
    let persistor = Persistor::new(PersistenceMode::InMemory).expect("store");
    let log = persistor
        .create_log("Quench", "operator", DateTime::from_timestamp(10, 0).unwrap())
        .unwrap();
    persistor.attach_logbook(log, "ops", None).unwrap();
    let found = SearchEngine::new(&persistor).find_by_logbook("ops").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].owner, "operator");
}

#[test]
fn file_mode_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("olog.db").to_string_lossy().into_owned();
    {
        let persistor = Persistor::new(PersistenceMode::File(path.clone())).expect("store");
        let log = persistor
            .create_log("Cryo trip", "cryo", DateTime::from_timestamp(20, 0).unwrap())
            .unwrap();
        persistor.attach_tag(log, "urgent").unwrap();
        persistor.set_property(log, "shift", "night").unwrap();
    }
    // schema creation is idempotent, so reopening keeps the data
    let persistor = Persistor::new(PersistenceMode::File(path)).expect("reopen");
    let found = SearchEngine::new(&persistor).find_by_tag("urgent").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].subject, "Cryo trip");
    assert_eq!(found[0].properties[0].value, "night");
}
