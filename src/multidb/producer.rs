//! The routing DB producer.
//!
//! [`MultiProducer`] is the producer handed to application subsystems: it
//! opens *logical requests* instead of physical names. Opening a request
//! resolves its route, opens the physical DB through the backend's producer,
//! records the placement in the DB's table list on first open, and returns a
//! table-scoped store. [`MultiProducer::verify`] cross-checks every persisted
//! record against the route table; a mismatch means the layout on disk
//! predates the current configuration and `db migrate` must run first.

use crate::core::error::{Result, StrataError};
use crate::kvdb::{DbProducer, KvStore, Table};
use crate::multidb::{
    read_tables_list, write_tables_list, Route, Router, TableRecord, TypeName,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Routes logical requests onto physical DBs of multiple backend types.
pub struct MultiProducer {
    producers: HashMap<TypeName, Arc<dyn DbProducer>>,
    router: Router,
    tables_key: Vec<u8>,
}

impl MultiProducer {
    /// Build a routing producer over per-type backend producers.
    pub fn new(
        producers: HashMap<TypeName, Arc<dyn DbProducer>>,
        routing_table: &HashMap<String, Route>,
        tables_key: Vec<u8>,
    ) -> Result<Self> {
        Ok(Self {
            producers,
            router: Router::new(routing_table)?,
            tables_key,
        })
    }

    /// The compiled route table.
    pub fn router(&self) -> &Router {
        &self.router
    }

    fn producer_for(&self, db_type: &str) -> Result<&Arc<dyn DbProducer>> {
        self.producers.get(db_type).ok_or_else(|| {
            StrataError::config(format!("unsupported DB type {:?}", db_type))
        })
    }

    /// Check every persisted table record against the route table.
    pub fn verify(&self) -> Result<()> {
        for (db_type, producer) in &self.producers {
            for name in producer.names() {
                let db = producer.open_db(&name)?;
                for record in read_tables_list(db.as_ref(), &self.tables_key)? {
                    let route = self.router.route_of(&record.req);
                    if route.db_type != *db_type
                        || route.name != name
                        || route.table != record.table
                    {
                        return Err(StrataError::IncompatibleLayout {
                            message: format!(
                                "request {:?} is stored in {}/{} table {:?} but routed to {}/{} table {:?}",
                                record.req, db_type, name, record.table,
                                route.db_type, route.name, route.table,
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Delete a logical request's data and unregister it.
    ///
    /// Routes flagged `no_drop` are left untouched.
    pub fn drop_db(&self, req: &str) -> Result<()> {
        let route = self.router.route_of(req);
        if route.no_drop {
            tracing::debug!(req = %req, "skipping drop of a no-drop route");
            return Ok(());
        }
        let db = self.producer_for(&route.db_type)?.open_db(&route.name)?;
        let mut batch = db.batch();
        for item in db.iterator(route.table.as_bytes(), &[]) {
            let (key, _) = item?;
            batch.delete(&key)?;
        }
        batch.write()?;
        let mut records = read_tables_list(db.as_ref(), &self.tables_key)?;
        records.retain(|r| r.req != req);
        write_tables_list(db.as_ref(), &self.tables_key, &records)
    }
}

impl DbProducer for MultiProducer {
    fn open_db(&self, req: &str) -> Result<Arc<dyn KvStore>> {
        let route = self.router.route_of(req);
        let db = self.producer_for(&route.db_type)?.open_db(&route.name)?;

        let mut records = read_tables_list(db.as_ref(), &self.tables_key)?;
        match records.iter().find(|r| r.req == req) {
            Some(record) if record.table != route.table => {
                return Err(StrataError::IncompatibleLayout {
                    message: format!(
                        "request {:?} is recorded under table {:?} but routed to table {:?}",
                        req, record.table, route.table,
                    ),
                });
            }
            Some(_) => {}
            None => {
                records.push(TableRecord {
                    req: req.to_string(),
                    table: route.table.clone(),
                });
                write_tables_list(db.as_ref(), &self.tables_key, &records)?;
            }
        }

        if route.table.is_empty() {
            Ok(db)
        } else {
            Ok(Arc::new(Table::new(db, route.table.as_bytes())))
        }
    }

    /// Logical enumeration: every request recorded in any physical DB.
    fn names(&self) -> Vec<String> {
        let mut reqs = Vec::new();
        for producer in self.producers.values() {
            for name in producer.names() {
                let Ok(db) = producer.open_db(&name) else {
                    continue;
                };
                if let Ok(records) = read_tables_list(db.as_ref(), &self.tables_key) {
                    reqs.extend(records.into_iter().map(|r| r.req));
                }
            }
        }
        reqs.sort();
        reqs.dedup();
        reqs
    }

    fn destroy_db(&self, req: &str) -> Result<()> {
        self.drop_db(req)
    }
}
