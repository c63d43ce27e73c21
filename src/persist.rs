// used for persistence
use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::Value};
use std::sync::{Mutex, MutexGuard};
use chrono::{DateTime, Utc};
use roaring::RoaringTreemap;
use tracing::{debug, warn};

use crate::error::{OlogError, Result};
use crate::store::{FetchRequest, Log, LogStore, Property, RecordId, StoreProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

// The "STRICT" keyword introduced in 3.37.0 breaks JDBC connections, which makes
// debugging using an external tool like DBeaver impossible
const SCHEMA: &str = "
    create table if not exists Log (
        Log_Identity integer not null,
        Subject text not null,
        Owner text not null,
        Created integer not null,
        constraint referenceable_Log_Identity primary key (
            Log_Identity
        )
    );-- STRICT;
    create index if not exists Log_by_Created on Log (Created);
    create table if not exists Logbook (
        Logbook_Identity integer not null,
        Logbook text not null,
        Owner text null,
        constraint referenceable_Logbook_Identity primary key (
            Logbook_Identity
        ),
        constraint unique_Logbook unique (
            Logbook
        )
    );-- STRICT;
    create table if not exists Tag (
        Tag_Identity integer not null,
        Tag text not null,
        constraint referenceable_Tag_Identity primary key (
            Tag_Identity
        ),
        constraint unique_Tag unique (
            Tag
        )
    );-- STRICT;
    create table if not exists Log_Logbook (
        Log_Identity integer not null,
        Logbook_Identity integer not null,
        constraint Log_Logbook_has_Log foreign key (
            Log_Identity
        ) references Log(Log_Identity),
        constraint Log_Logbook_has_Logbook foreign key (
            Logbook_Identity
        ) references Logbook(Logbook_Identity),
        constraint unique_Log_Logbook primary key (
            Log_Identity,
            Logbook_Identity
        )
    );-- STRICT;
    create table if not exists Log_Tag (
        Log_Identity integer not null,
        Tag_Identity integer not null,
        constraint Log_Tag_has_Log foreign key (
            Log_Identity
        ) references Log(Log_Identity),
        constraint Log_Tag_has_Tag foreign key (
            Tag_Identity
        ) references Tag(Tag_Identity),
        constraint unique_Log_Tag primary key (
            Log_Identity,
            Tag_Identity
        )
    );-- STRICT;
    create table if not exists Property (
        Log_Identity integer not null,
        Property text not null,
        Property_Key text not null,
        Value text null,
        constraint Property_has_Log foreign key (
            Log_Identity
        ) references Log(Log_Identity),
        constraint unique_Property primary key (
            Log_Identity,
            Property_Key
        )
    );-- STRICT;
    create index if not exists Property_by_Key on Property (Property_Key);
";

// SQLite's lower() only folds ASCII, so property names are folded here instead
fn property_key(name: &str) -> String {
    name.to_lowercase()
}

// SQLite reads a negative LIMIT as unbounded and a negative OFFSET as zero
fn sql_bound(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// ------------- Persistence -------------
/// SQLite-backed log store. All access goes through one connection, so a
/// [`Session`] holds it exclusively for the duration of a query.
pub struct Persistor {
    connection: Mutex<Connection>,
}

impl Persistor {
    pub fn new(mode: PersistenceMode) -> Result<Self> {
        let connection = match &mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        debug!(?mode, "opened log database");
        Self::with_connection(connection)
    }
    pub fn with_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch("pragma foreign_keys = on;")?;
        connection.execute_batch(SCHEMA)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|e| OlogError::Lock(e.to_string()))
    }

    fn require_log(connection: &Connection, log: RecordId) -> Result<()> {
        let found = connection
            .query_row("select 1 from Log where Log_Identity = ?1", [log as i64], |_| Ok(()))
            .optional()?;
        match found {
            Some(()) => Ok(()),
            None => Err(OlogError::not_found(format!("A log with identity {log} does not exist"))),
        }
    }

    pub fn create_log(&self, subject: &str, owner: &str, created: DateTime<Utc>) -> Result<RecordId> {
        let connection = self.lock()?;
        connection.execute(
            "insert into Log (Subject, Owner, Created) values (?1, ?2, ?3)",
            params![subject, owner, created.timestamp()],
        )?;
        Ok(connection.last_insert_rowid() as RecordId)
    }

    /// Adds the log to the logbook, creating the logbook (or updating its owner) as needed.
    pub fn attach_logbook(&self, log: RecordId, logbook: &str, owner: Option<&str>) -> Result<()> {
        let connection = self.lock()?;
        Self::require_log(&connection, log)?;
        connection.execute(
            "insert into Logbook (Logbook, Owner) values (?1, ?2)
                on conflict (Logbook) do update set Owner = coalesce(excluded.Owner, Owner)",
            params![logbook, owner],
        )?;
        connection.execute(
            "insert or ignore into Log_Logbook (Log_Identity, Logbook_Identity)
                select ?1, Logbook_Identity from Logbook where Logbook = ?2",
            params![log as i64, logbook],
        )?;
        Ok(())
    }

    pub fn attach_tag(&self, log: RecordId, tag: &str) -> Result<()> {
        let connection = self.lock()?;
        Self::require_log(&connection, log)?;
        connection.execute("insert or ignore into Tag (Tag) values (?1)", [tag])?;
        connection.execute(
            "insert or ignore into Log_Tag (Log_Identity, Tag_Identity)
                select ?1, Tag_Identity from Tag where Tag = ?2",
            params![log as i64, tag],
        )?;
        Ok(())
    }

    /// Sets (or replaces) the value of a property on a log. Names differing
    /// only in case denote the same property; the latest spelling is kept.
    pub fn set_property(&self, log: RecordId, name: &str, value: &str) -> Result<()> {
        let connection = self.lock()?;
        Self::require_log(&connection, log)?;
        connection.execute(
            "insert into Property (Log_Identity, Property, Property_Key, Value) values (?1, ?2, ?3, ?4)
                on conflict (Log_Identity, Property_Key) do update
                set Property = excluded.Property, Value = excluded.Value",
            params![log as i64, name, property_key(name), value],
        )?;
        Ok(())
    }
}

impl StoreProvider for Persistor {
    type Session<'s> = Session<'s>;
    fn session(&self) -> Result<Session<'_>> {
        Ok(Session { connection: self.lock()? })
    }
}

/// Exclusive use of the connection for one query; released on drop.
pub struct Session<'p> {
    connection: MutexGuard<'p, Connection>,
}

impl Session<'_> {
    fn collect_ids<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<RoaringTreemap> {
        let mut statement = self.connection.prepare_cached(sql)?;
        let rows = statement.query_map(params, |row| row.get::<_, i64>(0))?;
        let mut ids = RoaringTreemap::new();
        for id in rows {
            ids.insert(id? as RecordId);
        }
        Ok(ids)
    }

    fn names(&self, sql: &str, log: RecordId) -> Result<Vec<String>> {
        let mut statement = self.connection.prepare_cached(sql)?;
        let rows = statement.query_map([log as i64], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn properties(&self, log: RecordId) -> Result<Vec<Property>> {
        let mut statement = self.connection.prepare_cached(
            "select Property, Value from Property where Log_Identity = ?1 order by Property",
        )?;
        let rows = statement.query_map([log as i64], |row| {
            Ok(Property {
                name: row.get(0)?,
                value: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl LogStore for Session<'_> {
    fn ids_by_tag(&self, pattern: &str) -> Result<RoaringTreemap> {
        self.collect_ids(
            r"
            select lt.Log_Identity
                from Log_Tag lt
                join Tag t
                on t.Tag_Identity = lt.Tag_Identity
                where t.Tag like ?1 escape '\'
            ",
            [pattern],
        )
    }

    fn ids_by_logbook(&self, pattern: &str) -> Result<RoaringTreemap> {
        self.collect_ids(
            r"
            select lb.Log_Identity
                from Log_Logbook lb
                join Logbook b
                on b.Logbook_Identity = lb.Logbook_Identity
                where b.Logbook like ?1 escape '\'
            ",
            [pattern],
        )
    }

    fn ids_by_property(&self, name: &str, pattern: &str) -> Result<RoaringTreemap> {
        self.collect_ids(
            r"
            select Log_Identity
                from Property
                where Property_Key = ?1
                and Value like ?2 escape '\'
            ",
            [property_key(name).as_str(), pattern],
        )
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Vec<Log>> {
        let mut sql = String::from("select Log_Identity, Subject, Owner, Created from Log where 1 = 1");
        let mut values: Vec<Value> = Vec::new();
        if let Some(ids) = &request.ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            // a single JSON array parameter sidesteps the bound-variable limit
            let ids: Vec<RecordId> = ids.iter().collect();
            let ids = serde_json::to_string(&ids)
                .map_err(|e| OlogError::Invariant(format!("could not encode identities: {e}")))?;
            sql.push_str(" and Log_Identity in (select value from json_each(?))");
            values.push(Value::Text(ids));
        }
        if !request.subject_patterns.is_empty() {
            let alternatives = vec![r"Subject like ? escape '\'"; request.subject_patterns.len()];
            sql.push_str(&format!(" and ({})", alternatives.join(" or ")));
            values.extend(request.subject_patterns.iter().cloned().map(Value::Text));
        }
        if let Some(range) = request.date_range {
            sql.push_str(" and Created between ? and ?");
            values.push(Value::Integer(range.start()));
            values.push(Value::Integer(range.end()));
        }
        sql.push_str(" order by Created desc, Log_Identity desc");
        if let Some(pagination) = request.pagination {
            sql.push_str(" limit ? offset ?");
            values.push(Value::Integer(sql_bound(pagination.limit())));
            values.push(Value::Integer(sql_bound(pagination.offset())));
        }

        let rows: Vec<(i64, String, String, i64)> = {
            let mut statement = self.connection.prepare(&sql)?;
            let rows = statement.query_map(params_from_iter(values.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut logs = Vec::with_capacity(rows.len());
        for (id, subject, owner, created) in rows {
            let id = id as RecordId;
            let Some(created) = DateTime::<Utc>::from_timestamp(created, 0) else {
                warn!(log = id, created, "creation time out of range");
                return Err(OlogError::store(format!("Log {id} has an unreadable creation time")));
            };
            logs.push(Log {
                id,
                subject,
                owner,
                created,
                logbooks: self.names(
                    "select b.Logbook from Log_Logbook lb join Logbook b on b.Logbook_Identity = lb.Logbook_Identity where lb.Log_Identity = ?1 order by b.Logbook",
                    id,
                )?,
                tags: self.names(
                    "select t.Tag from Log_Tag lt join Tag t on t.Tag_Identity = lt.Tag_Identity where lt.Log_Identity = ?1 order by t.Tag",
                    id,
                )?,
                properties: self.properties(id)?,
            });
        }
        Ok(logs)
    }
}
