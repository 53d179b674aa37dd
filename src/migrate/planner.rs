//! Migration planning.
//!
//! The planner diffs the previous layout (table records read from every
//! existing physical DB) against the configured route table, weeds out DB
//! groups that need no work, rejects contradictory target layouts before
//! anything is mutated, and partitions the surviving entries into
//! inter-linked components.
//!
//! All of it is a pure function of the entry set: adjacency is built from
//! explicit shared-locator lookups, so the resulting partition does not
//! depend on map iteration order.

use crate::core::error::{Result, StrataError};
use crate::kvdb::DbProducer;
use crate::multidb::{read_tables_list, DbLocator, Route, Router, TypeName};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One logical request that may need attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEntry {
    /// Logical request name.
    pub req: String,
    /// Where the request's data lives now.
    pub old: Route,
    /// Where the route table wants it.
    pub new: Route,
}

/// A maximal set of entries connected through shared physical DBs; the unit
/// of atomic migration.
pub type Component = HashMap<String, MigrationEntry>;

/// The full migration plan.
#[derive(Debug, Default)]
pub struct Plan {
    /// Components touch disjoint physical DBs and may run in any order.
    pub components: Vec<Component>,
}

impl Plan {
    /// Check whether any migration work is needed.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Read the previous layout and pair every record with its target route.
///
/// `new.no_drop` is forced false: drop-eligibility is re-evaluated fresh each
/// run and must not by itself make a route look changed.
pub fn read_entries(
    producers: &HashMap<TypeName, Arc<dyn DbProducer>>,
    router: &Router,
    tables_key: &[u8],
) -> Result<HashMap<String, MigrationEntry>> {
    let mut by_req = HashMap::new();
    for (db_type, producer) in producers {
        for name in producer.names() {
            let records = {
                let db = producer.open_db(&name)?;
                read_tables_list(db.as_ref(), tables_key)?
            };
            for record in records {
                let old = Route {
                    db_type: db_type.clone(),
                    name: name.clone(),
                    table: record.table,
                    no_drop: false,
                };
                let mut new = router.route_of(&record.req);
                new.no_drop = false;
                by_req.insert(
                    record.req.clone(),
                    MigrationEntry {
                        req: record.req,
                        old,
                        new,
                    },
                );
            }
        }
    }
    Ok(by_req)
}

/// Index entries by every physical DB they touch, through old or new route.
pub fn group_by_db(entries: &HashMap<String, MigrationEntry>) -> HashMap<DbLocator, Vec<String>> {
    let mut by_db: HashMap<DbLocator, Vec<String>> = HashMap::new();
    for entry in entries.values() {
        for locator in [entry.old.db_locator(), entry.new.db_locator()] {
            let reqs = by_db.entry(locator).or_default();
            if !reqs.contains(&entry.req) {
                reqs.push(entry.req.clone());
            }
        }
    }
    by_db
}

/// Build the migration plan from the raw entry set.
pub fn build_plan(mut entries: HashMap<String, MigrationEntry>) -> Result<Plan> {
    weed_unchanged(&mut entries);
    if entries.is_empty() {
        return Ok(Plan::default());
    }
    check_contradictions(&entries)?;

    // Partition into inter-linked components by depth-first traversal over
    // the shared-locator adjacency.
    let by_db = group_by_db(&entries);
    let mut components = Vec::new();
    while let Some(seed) = entries.keys().next().cloned() {
        let mut component = Component::new();
        let mut stack = vec![seed];
        while let Some(req) = stack.pop() {
            let Some(entry) = entries.remove(&req) else {
                continue;
            };
            for locator in [entry.old.db_locator(), entry.new.db_locator()] {
                if let Some(reqs) = by_db.get(&locator) {
                    stack.extend(reqs.iter().cloned());
                }
            }
            component.insert(req, entry);
        }
        components.push(component);
    }
    Ok(Plan { components })
}

/// Drop every DB group in which no entry changed.
///
/// An unchanged entry sharing a physical DB with a changed one is retained:
/// its data must ride along when the DB is rebuilt or renamed.
fn weed_unchanged(entries: &mut HashMap<String, MigrationEntry>) {
    let by_db = group_by_db(entries);
    let mut unchanged = HashSet::new();
    for reqs in by_db.values() {
        let all_match = reqs
            .iter()
            .all(|req| entries.get(req).is_some_and(|e| e.old == e.new));
        if all_match {
            unchanged.extend(reqs.iter().cloned());
        }
    }
    for req in unchanged {
        entries.remove(&req);
    }
}

/// Reject target layouts where two requests would overlap under iteration.
///
/// Runs over the full candidate set before any mutation.
fn check_contradictions(entries: &HashMap<String, MigrationEntry>) -> Result<()> {
    for e0 in entries.values() {
        for e1 in entries.values() {
            if e0.req == e1.req {
                continue;
            }
            if e0.new.db_locator() == e1.new.db_locator()
                && e0.new.table.starts_with(&e1.new.table)
            {
                return Err(StrataError::ContradictoryLayout {
                    req0: e0.req.clone(),
                    req1: e1.req.clone(),
                    db_type: e0.new.db_type.clone(),
                    db_name: e0.new.name.clone(),
                    table0: e0.new.table.clone(),
                    table1: e1.new.table.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(db_type: &str, name: &str, table: &str) -> Route {
        Route {
            db_type: db_type.to_string(),
            name: name.to_string(),
            table: table.to_string(),
            no_drop: false,
        }
    }

    fn entry(req: &str, old: Route, new: Route) -> (String, MigrationEntry) {
        (
            req.to_string(),
            MigrationEntry {
                req: req.to_string(),
                old,
                new,
            },
        )
    }

    #[test]
    fn unchanged_groups_are_weeded_out() {
        let entries = HashMap::from([
            entry("a", route("m", "solo", "A"), route("m", "solo", "A")),
            entry("b", route("m", "x", "B"), route("m", "y", "B")),
        ]);
        let plan = build_plan(entries).unwrap();
        assert_eq!(plan.components.len(), 1);
        assert!(plan.components[0].contains_key("b"));
        assert!(!plan.components[0].contains_key("a"));
    }

    #[test]
    fn unchanged_entry_rides_along_with_its_db() {
        // "evm" does not move, but "gossip" moves into evm's DB, so evm must
        // stay in the plan and end up in the same component.
        let entries = HashMap::from([
            entry("evm", route("m", "main", "M"), route("m", "main", "M")),
            entry("gossip", route("m", "gossip", ""), route("m", "main", "G")),
        ]);
        let plan = build_plan(entries).unwrap();
        assert_eq!(plan.components.len(), 1);
        let component = &plan.components[0];
        assert_eq!(component.len(), 2);
        assert!(component.contains_key("evm"));
        assert!(component.contains_key("gossip"));
    }

    #[test]
    fn no_work_means_empty_plan() {
        let entries = HashMap::from([
            entry("a", route("m", "a", ""), route("m", "a", "")),
            entry("b", route("m", "b", ""), route("m", "b", "")),
        ]);
        let plan = build_plan(entries).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn contradictory_layout_is_fatal() {
        // "" is a prefix of "G": iteration under "" would leak G's entries.
        let entries = HashMap::from([
            entry("a", route("m", "a", ""), route("m", "main", "G")),
            entry("b", route("m", "b", ""), route("m", "main", "")),
        ]);
        let err = build_plan(entries).unwrap_err();
        assert!(matches!(err, StrataError::ContradictoryLayout { .. }));
    }

    #[test]
    fn equal_tables_in_one_db_are_contradictory() {
        let entries = HashMap::from([
            entry("a", route("m", "a", ""), route("m", "main", "T")),
            entry("b", route("m", "b", ""), route("m", "main", "T")),
        ]);
        assert!(build_plan(entries).is_err());
    }

    #[test]
    fn partition_is_complete_and_disjoint() {
        let entries = HashMap::from([
            // component 1: chained through "mid" and "dst"
            entry("a", route("m", "src", "A"), route("m", "mid", "A")),
            entry("b", route("m", "mid", "B"), route("m", "dst", "B")),
            entry("c", route("m", "dst", "C"), route("m", "dst", "C2")),
            // component 2: isolated pair
            entry("d", route("m", "left", "D"), route("m", "right", "D")),
            entry("e", route("m", "right", "E"), route("m", "right", "E2")),
        ]);
        let plan = build_plan(entries.clone()).unwrap();

        let mut seen = HashSet::new();
        for component in &plan.components {
            for req in component.keys() {
                assert!(seen.insert(req.clone()), "request {req} in two components");
            }
        }
        assert_eq!(seen.len(), entries.len());

        let mut sizes: Vec<usize> = plan.components.iter().map(|c| c.len()).collect();
        sizes.sort();
        assert_eq!(sizes, vec![2, 3]);
    }

    #[test]
    fn partition_ignores_iteration_order() {
        let make = || {
            HashMap::from([
                entry("a", route("m", "src", "A"), route("m", "mid", "A")),
                entry("b", route("m", "mid", "B"), route("m", "dst", "B")),
                entry("d", route("m", "left", "D"), route("m", "right", "D")),
            ])
        };
        let as_sets = |plan: &Plan| {
            let mut sets: Vec<Vec<String>> = plan
                .components
                .iter()
                .map(|c| {
                    let mut reqs: Vec<String> = c.keys().cloned().collect();
                    reqs.sort();
                    reqs
                })
                .collect();
            sets.sort();
            sets
        };
        let first = build_plan(make()).unwrap();
        for _ in 0..16 {
            let other = build_plan(make()).unwrap();
            assert_eq!(as_sets(&first), as_sets(&other));
        }
    }
}
