//! Olog – a logbook service: log entries organized by logbooks, tags and
//! free-form properties, searchable by any combination of them.
//!
//! A search takes an unordered bag of `(key, values)` parameters and turns it
//! into a list of matching log entries:
//! * [`criteria`] classifies the parameters into typed criteria (subject globs,
//!   tags, logbooks, properties, a date range, pagination).
//! * [`resolve`] resolves each set-valued criterion to the identifiers it
//!   matches and combines them: tags, tag patterns and properties pool by
//!   union, logbook membership intersects that pool, and any criterion that
//!   matches nothing empties the whole result.
//! * [`search`] fetches the selected records with the remaining filters and
//!   pagination applied.
//!
//! User wildcards (`*`, `?`) are translated to SQL `LIKE` patterns by [`glob`].
//!
//! ## Persistence
//! The [`persist::Persistor`] owns the SQLite schema and a single connection.
//! Each query borrows it through one session for its whole duration, see
//! [`store::StoreProvider`].
//!
//! ## Serving
//! [`interface::QueryInterface`] tracks running queries so they can be
//! cancelled, and [`server`] exposes it over HTTP.
//!
//! ## Quick Start
//! ```
//! use chrono::Utc;
//! use olog::persist::{PersistenceMode, Persistor};
//! use olog::search::SearchEngine;
//! let persistor = Persistor::new(PersistenceMode::InMemory).unwrap();
//! let log = persistor.create_log("Magnet quench", "operator", Utc::now()).unwrap();
//! persistor.attach_tag(log, "urgent").unwrap();
//! let found = SearchEngine::new(&persistor).find_by_tag("urg*").unwrap();
//! assert_eq!(found.len(), 1);
//! ```

pub mod criteria;
pub mod error;
pub mod glob;
pub mod interface;
pub mod persist;
pub mod resolve;
pub mod search;
pub mod server;
pub mod settings;
pub mod store;
