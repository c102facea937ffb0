use super::StorageEngine;
use crate::core::{Attributes, Result, StoreError, Value};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct MemRow {
    id: String,
    /// Aligned with `MemTable::columns`
    values: Vec<Value>,
}

#[derive(Debug, Clone)]
struct MemTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<MemRow>,
    /// id -> position in `rows`
    index: HashMap<String, usize>,
}

impl MemTable {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Column lookup is case-insensitive, like SQLite identifiers.
    fn column_position(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| StoreError::Storage(format!("no such column: {}", column)))
    }

    fn row_attributes(&self, row: &MemRow) -> Attributes {
        self.columns
            .iter()
            .cloned()
            .zip(row.values.iter().cloned())
            .collect()
    }
}

/// Process-local storage engine
///
/// Mirrors the SQLite engine's observable behavior (case-insensitive
/// identifiers, duplicate-column failures, `IS` equality in filters)
/// without touching the filesystem. Contents vanish with the engine.
pub struct MemoryEngine {
    /// Keyed by lower-cased table name
    tables: RwLock<HashMap<String, MemTable>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Number of rows in a table
    pub fn row_count(&self, table: &str) -> Result<usize> {
        let tables = self.tables.read()?;
        Ok(Self::table(&tables, table)?.rows.len())
    }

    fn table<'a>(tables: &'a HashMap<String, MemTable>, name: &str) -> Result<&'a MemTable> {
        tables
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| StoreError::Storage(format!("no such table: {}", name)))
    }

    fn table_mut<'a>(
        tables: &'a mut HashMap<String, MemTable>,
        name: &str,
    ) -> Result<&'a mut MemTable> {
        tables
            .get_mut(&name.to_ascii_lowercase())
            .ok_or_else(|| StoreError::Storage(format!("no such table: {}", name)))
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for MemoryEngine {
    fn list_tables(&self) -> Result<Vec<String>> {
        let tables = self.tables.read()?;
        let mut names: Vec<String> = tables.values().map(|t| t.name.clone()).collect();
        names.sort();
        Ok(names)
    }

    fn create_table(&self, table: &str) -> Result<()> {
        let mut tables = self.tables.write()?;
        tables
            .entry(table.to_ascii_lowercase())
            .or_insert_with(|| MemTable::new(table));
        Ok(())
    }

    fn columns(&self, table: &str) -> Result<Vec<String>> {
        let tables = self.tables.read()?;
        Ok(Self::table(&tables, table)?.columns.clone())
    }

    fn add_column(&self, table: &str, column: &str) -> Result<()> {
        let mut tables = self.tables.write()?;
        let t = Self::table_mut(&mut tables, table)?;
        if t.column_position(column).is_ok() {
            return Err(StoreError::Storage(format!("duplicate column name: {}", column)));
        }
        t.columns.push(column.to_string());
        for row in &mut t.rows {
            row.values.push(Value::Null);
        }
        Ok(())
    }

    fn insert(&self, table: &str, id: &str) -> Result<()> {
        let mut tables = self.tables.write()?;
        let t = Self::table_mut(&mut tables, table)?;
        if t.index.contains_key(id) {
            return Err(StoreError::Storage(format!(
                "UNIQUE constraint failed: {}.id",
                t.name
            )));
        }
        let row = MemRow {
            id: id.to_string(),
            values: vec![Value::Null; t.columns.len()],
        };
        t.index.insert(id.to_string(), t.rows.len());
        t.rows.push(row);
        Ok(())
    }

    fn update(&self, table: &str, id: &str, values: &Attributes) -> Result<()> {
        let mut tables = self.tables.write()?;
        let t = Self::table_mut(&mut tables, table)?;

        let positions = values
            .iter()
            .map(|(column, value)| Ok((t.column_position(column)?, value.clone())))
            .collect::<Result<Vec<_>>>()?;

        let row_pos = *t
            .index
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("{} '{}'", table, id)))?;
        let row = &mut t.rows[row_pos];
        for (pos, value) in positions {
            row.values[pos] = value;
        }
        Ok(())
    }

    fn fetch(&self, table: &str, id: &str) -> Result<Option<Attributes>> {
        let tables = self.tables.read()?;
        let t = Self::table(&tables, table)?;
        Ok(t.index.get(id).map(|&pos| t.row_attributes(&t.rows[pos])))
    }

    fn select_ids(&self, table: &str, filter: &[(String, Value)]) -> Result<Vec<String>> {
        let tables = self.tables.read()?;
        let t = Self::table(&tables, table)?;

        let predicates = filter
            .iter()
            .map(|(column, value)| Ok((t.column_position(column)?, value)))
            .collect::<Result<Vec<_>>>()?;

        Ok(t.rows
            .iter()
            .filter(|row| predicates.iter().all(|(pos, value)| is_match(&row.values[*pos], value)))
            .map(|row| row.id.clone())
            .collect())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// `IS` comparison as SQLite applies it to untyped columns: integers and
/// reals compare numerically, everything else by storage class.
fn is_match(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
            *i as f64 == *f
        }
        _ => stored == wanted,
    }
}
