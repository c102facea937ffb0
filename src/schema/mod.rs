//! Additive schema evolution: attribute columns appear on first write.

use crate::core::naming::attribute_name;
use crate::core::{Attributes, Result};
use crate::storage::StorageEngine;
use std::sync::Arc;
use tracing::{Level, event};

/// Outcome of [`SchemaEvolver::ensure_column`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    /// The snapshot already carried the column
    Present,
    /// This call added the column
    Added,
    /// Someone else added it between our snapshot and our DDL
    Raced,
}

pub struct SchemaEvolver {
    engine: Arc<dyn StorageEngine>,
}

impl SchemaEvolver {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    /// Makes sure `attribute` exists as a column of `table`.
    ///
    /// The instance's loaded snapshot is the source of truth: a key that is
    /// present, even with a null value, counts as provisioned. Otherwise an
    /// additive column is created. If that fails because another writer got
    /// there first, the live schema is consulted and the call succeeds;
    /// any other failure propagates unchanged.
    pub fn ensure_column(
        &self,
        table: &str,
        attribute: &str,
        snapshot: &Attributes,
    ) -> Result<Provisioning> {
        let column = attribute_name(attribute)?;
        if snapshot.contains_key(&column) {
            return Ok(Provisioning::Present);
        }

        match self.engine.add_column(table, &column) {
            Ok(()) => {
                event!(Level::INFO, table = %table, column = %column, "column provisioned");
                Ok(Provisioning::Added)
            }
            Err(err) => {
                let exists = self
                    .columns(table)
                    .map(|cols| cols.iter().any(|c| c.eq_ignore_ascii_case(&column)))
                    .unwrap_or(false);
                if exists {
                    event!(Level::DEBUG, table = %table, column = %column, "column added concurrently");
                    Ok(Provisioning::Raced)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Live column set of `table`, identifier column excluded.
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        self.engine.columns(table)
    }
}
