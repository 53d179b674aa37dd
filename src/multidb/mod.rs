//! Logical-to-physical routing.
//!
//! Application subsystems address their data through logical *request*
//! names. The route table maps each request to a [`Route`]: which backend
//! type, physical DB name, and table prefix the request's data lives under.
//! [`producer::MultiProducer`] resolves requests at open time and records the
//! placement in the per-DB table list, so a later run can diff the on-disk
//! layout against a changed route table (see `migrate`).
//!
//! # Modules
//!
//! - [`pattern`] - `%d`-parameterized request-pattern matching
//! - [`router`] - route resolution (exact, pattern, catch-all)
//! - [`tables`] - the persisted per-DB table list
//! - [`producer`] - the routing DB producer and layout verification

pub mod pattern;
pub mod producer;
pub mod router;
pub mod tables;

use serde::{Deserialize, Serialize};

// Re-exports for convenience
pub use producer::MultiProducer;
pub use router::Router;
pub use tables::{read_tables_list, write_tables_list, TableRecord};

/// Backend type tag ("rocksdb", "memory", ...).
pub type TypeName = String;

/// Physical placement of one logical request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Backend type.
    #[serde(rename = "type")]
    pub db_type: TypeName,

    /// Physical DB name; an empty name resolves to the request name.
    #[serde(default)]
    pub name: String,

    /// Table prefix within the physical DB.
    #[serde(default)]
    pub table: String,

    /// Keep the data even if its physical DB becomes eligible for deletion
    /// (consensus history kept per-epoch).
    #[serde(default)]
    pub no_drop: bool,
}

impl Route {
    /// The physical DB this route points into.
    pub fn db_locator(&self) -> DbLocator {
        DbLocator {
            db_type: self.db_type.clone(),
            name: self.name.clone(),
        }
    }

    /// The table this route points at.
    pub fn table_locator(&self) -> TableLocator {
        TableLocator {
            db_type: self.db_type.clone(),
            name: self.name.clone(),
            table: self.table.clone(),
        }
    }
}

/// Identity of one physical database instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DbLocator {
    pub db_type: TypeName,
    pub name: String,
}

/// Identity of one table within a physical database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableLocator {
    pub db_type: TypeName,
    pub name: String,
    pub table: String,
}
