//! SQLite-backed storage engine.
//!
//! One connection per engine, opened lazily on first use and guarded by a
//! mutex so the engine can be shared across threads. Cross-process
//! coordination is left to SQLite's own file locking (WAL + busy timeout).

use super::StorageEngine;
use crate::connection::{StoreConfig, StoreLocation};
use crate::core::naming::{ID_COLUMN, quote_identifier};
use crate::core::{Attributes, Result, StoreError, Value};
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use std::sync::{Mutex, MutexGuard};
use tracing::{Level, event};

pub struct SqliteEngine {
    config: StoreConfig,
    conn: Mutex<Option<Connection>>,
}

impl SqliteEngine {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn open_connection(&self) -> Result<Connection> {
        self.config.validate().map_err(StoreError::Connection)?;

        let conn = match &self.config.location {
            StoreLocation::Memory => Connection::open_in_memory()?,
            StoreLocation::File(path) => {
                if self.config.create_dirs
                    && let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::Connection(format!(
                            "cannot create directory '{}': {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
                Connection::open(path).map_err(|e| {
                    StoreError::Connection(format!("cannot open '{}': {}", path.display(), e))
                })?
            }
            StoreLocation::Unset => {
                return Err(StoreError::Connection("Backing file path is not set".into()));
            }
        };

        conn.busy_timeout(self.config.busy_timeout)?;
        if self.config.location != StoreLocation::Memory {
            // journal_mode returns the resulting mode as a row
            let mode: String = conn.query_row(
                &format!("PRAGMA journal_mode = {}", self.config.journal_mode.as_pragma()),
                [],
                |row| row.get(0),
            )?;
            event!(Level::DEBUG, journal_mode = %mode, "backing store opened");
        }

        Ok(conn)
    }

    /// Runs `f` on the shared connection, opening it first if needed.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut guard: MutexGuard<'_, Option<Connection>> = self.conn.lock()?;
        if guard.is_none() {
            *guard = Some(self.open_connection()?);
        }
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(StoreError::Connection("connection unavailable".into())),
        }
    }
}

impl StorageEngine for SqliteEngine {
    fn list_tables(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND substr(name, 1, 7) <> 'sqlite_' ORDER BY name",
            )?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(names)
        })
    }

    fn create_table(&self, table: &str) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} TEXT PRIMARY KEY NOT NULL)",
            quote_identifier(table),
            ID_COLUMN
        );
        self.with_conn(|conn| {
            conn.execute(&sql, [])?;
            Ok(())
        })
    }

    fn columns(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(table));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            if names.is_empty() {
                return Err(StoreError::Storage(format!("no such table: {}", table)));
            }
            Ok(names
                .into_iter()
                .filter(|name| !name.eq_ignore_ascii_case(ID_COLUMN))
                .collect())
        })
    }

    fn add_column(&self, table: &str, column: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_identifier(table),
            quote_identifier(column)
        );
        self.with_conn(|conn| {
            conn.execute(&sql, [])?;
            Ok(())
        })
    }

    fn insert(&self, table: &str, id: &str) -> Result<()> {
        let sql = format!("INSERT INTO {} ({}) VALUES (?1)", quote_identifier(table), ID_COLUMN);
        self.with_conn(|conn| {
            conn.execute(&sql, [id])?;
            Ok(())
        })
    }

    fn update(&self, table: &str, id: &str, values: &Attributes) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let assignments: Vec<String> = values
            .keys()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", quote_identifier(column), i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_identifier(table),
            assignments.join(", "),
            ID_COLUMN,
            values.len() + 1
        );

        let id_param = Value::Text(id.to_string());
        let params = values.values().chain(std::iter::once(&id_param));
        self.with_conn(|conn| {
            let changed = conn.execute(&sql, params_from_iter(params))?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("{} '{}'", table, id)));
            }
            Ok(())
        })
    }

    fn fetch(&self, table: &str, id: &str) -> Result<Option<Attributes>> {
        let sql = format!("SELECT * FROM {} WHERE {} = ?1", quote_identifier(table), ID_COLUMN);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let row = stmt
                .query_row([id], |row| {
                    let mut attributes = Attributes::new();
                    for (i, name) in names.iter().enumerate() {
                        if name.eq_ignore_ascii_case(ID_COLUMN) {
                            continue;
                        }
                        attributes.insert(name.clone(), row.get::<_, Value>(i)?);
                    }
                    Ok(attributes)
                })
                .optional()?;
            Ok(row)
        })
    }

    fn select_ids(&self, table: &str, filter: &[(String, Value)]) -> Result<Vec<String>> {
        let mut sql = format!("SELECT {} FROM {}", ID_COLUMN, quote_identifier(table));
        if !filter.is_empty() {
            let predicates: Vec<String> = filter
                .iter()
                .enumerate()
                .map(|(i, (column, _))| format!("{} IS ?{}", quote_identifier(column), i + 1))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map(params_from_iter(filter.iter().map(|(_, v)| v)), |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock()?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, err)| StoreError::from(err))?;
            event!(Level::DEBUG, "backing store closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SqliteEngine {
        SqliteEngine::new(StoreConfig::in_memory())
    }

    #[test]
    fn test_connection_is_lazy() {
        let engine = engine();
        assert!(!engine.is_open());
        engine.list_tables().unwrap();
        assert!(engine.is_open());
        engine.close().unwrap();
        assert!(!engine.is_open());
    }

    #[test]
    fn test_unset_path_is_connection_error() {
        let engine = SqliteEngine::new(StoreConfig::default());
        assert!(matches!(engine.list_tables(), Err(StoreError::Connection(_))));
    }

    #[test]
    fn test_table_lifecycle() {
        let engine = engine();
        engine.create_table("person").unwrap();
        engine.create_table("person").unwrap();
        assert_eq!(engine.list_tables().unwrap(), vec!["person".to_string()]);
        assert!(engine.columns("person").unwrap().is_empty());

        engine.add_column("person", "name").unwrap();
        assert_eq!(engine.columns("person").unwrap(), vec!["name".to_string()]);
        assert!(engine.add_column("person", "NAME").is_err());
    }

    #[test]
    fn test_rows_round_trip_untyped() {
        let engine = engine();
        engine.create_table("item").unwrap();
        engine.add_column("item", "label").unwrap();
        engine.add_column("item", "weight").unwrap();
        engine.insert("item", "a").unwrap();

        let bare = engine.fetch("item", "a").unwrap().unwrap();
        assert_eq!(bare.get("label"), Some(&Value::Null));

        let mut values = Attributes::new();
        values.insert("label".into(), Value::Text("42".into()));
        values.insert("weight".into(), Value::Float(1.5));
        engine.update("item", "a", &values).unwrap();

        let row = engine.fetch("item", "a").unwrap().unwrap();
        assert_eq!(row, values);
        assert!(engine.fetch("item", "missing").unwrap().is_none());
        assert!(matches!(
            engine.update("item", "missing", &values),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_select_ids_filters_conjunctively() {
        let engine = engine();
        engine.create_table("item").unwrap();
        engine.add_column("item", "color").unwrap();
        engine.add_column("item", "size").unwrap();
        for (id, color, size) in [("a", "red", 1), ("b", "red", 2), ("c", "blue", 1)] {
            engine.insert("item", id).unwrap();
            let mut values = Attributes::new();
            values.insert("color".into(), Value::from(color));
            values.insert("size".into(), Value::from(size));
            engine.update("item", id, &values).unwrap();
        }
        engine.insert("item", "d").unwrap();

        let mut red = engine
            .select_ids("item", &[("color".into(), Value::from("red"))])
            .unwrap();
        red.sort();
        assert_eq!(red, vec!["a", "b"]);

        let one = engine
            .select_ids(
                "item",
                &[("color".into(), Value::from("red")), ("size".into(), Value::from(2))],
            )
            .unwrap();
        assert_eq!(one, vec!["b"]);

        let nulls = engine.select_ids("item", &[("color".into(), Value::Null)]).unwrap();
        assert_eq!(nulls, vec!["d"]);

        assert_eq!(engine.select_ids("item", &[]).unwrap().len(), 4);
        assert!(engine.select_ids("item", &[("nope".into(), Value::Null)]).is_err());
        assert!(engine.select_ids("item", &[("nope".into(), Value::from("nope"))]).is_err());
    }

    #[test]
    fn test_sqlite_prefixed_user_tables_are_listed() {
        let engine = engine();
        engine.create_table("sqlitex").unwrap();
        engine.create_table("sqlites").unwrap();
        assert_eq!(
            engine.list_tables().unwrap(),
            vec!["sqlites".to_string(), "sqlitex".to_string()]
        );
    }
}
