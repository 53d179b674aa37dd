//! The persisted per-DB table list.
//!
//! Every physical DB records, under the reserved tables key, which logical
//! requests live in it and under which table prefix. The union of these
//! records across all physical DBs is the previous layout the migration
//! planner diffs against the route table.

use crate::core::error::Result;
use crate::kvdb::KvStore;
use serde::{Deserialize, Serialize};

/// One request's placement within its containing physical DB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    /// Logical request name.
    pub req: String,
    /// Table prefix within this DB.
    pub table: String,
}

/// Read the table list of a physical DB; absent means empty.
pub fn read_tables_list(db: &dyn KvStore, tables_key: &[u8]) -> Result<Vec<TableRecord>> {
    match db.get(tables_key)? {
        Some(raw) => Ok(bincode::deserialize(&raw)?),
        None => Ok(Vec::new()),
    }
}

/// Replace the table list of a physical DB.
pub fn write_tables_list(
    db: &dyn KvStore,
    tables_key: &[u8],
    records: &[TableRecord],
) -> Result<()> {
    let raw = bincode::serialize(records)?;
    db.put(tables_key, &raw)
}
