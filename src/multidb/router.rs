//! Route resolution.
//!
//! Matching tries, in order: an exact literal entry, then `%d`-parameterized
//! entries (the captured integer is substituted into the route's name and
//! table), then the `""` catch-all. Exactly one route is always returned;
//! colliding placements produced by over-broad patterns are caught later by
//! the planner's contradiction check.

use crate::core::error::Result;
use crate::multidb::{pattern, Route};
use std::collections::HashMap;

/// Compiled route table.
#[derive(Debug, Clone)]
pub struct Router {
    exact: HashMap<String, Route>,
    /// Sorted by pattern string so resolution is deterministic.
    patterns: Vec<(String, Route)>,
    fallback: Route,
}

impl Router {
    /// Compile a route table. Pattern syntax is validated here.
    pub fn new(table: &HashMap<String, Route>) -> Result<Self> {
        let mut exact = HashMap::new();
        let mut patterns = Vec::new();
        let mut fallback = Route::default();
        for (key, route) in table {
            pattern::validate_pattern(key)?;
            pattern::validate_pattern(&route.name)?;
            pattern::validate_pattern(&route.table)?;
            if key.is_empty() {
                fallback = route.clone();
            } else if key.contains('%') {
                patterns.push((key.clone(), route.clone()));
            } else {
                exact.insert(key.clone(), route.clone());
            }
        }
        patterns.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(Self {
            exact,
            patterns,
            fallback,
        })
    }

    /// Resolve the configured route of a logical request.
    pub fn route_of(&self, req: &str) -> Route {
        let mut route = if let Some(route) = self.exact.get(req) {
            route.clone()
        } else if let Some((route, value)) = self
            .patterns
            .iter()
            .find_map(|(p, route)| pattern::match_pattern(p, req).map(|v| (route, v)))
        {
            let mut route = route.clone();
            route.name = pattern::render(&route.name, value);
            route.table = pattern::render(&route.table, value);
            route
        } else {
            self.fallback.clone()
        };
        // An empty DB name places the request in its own DB.
        if route.name.is_empty() {
            route.name = req.to_string();
        }
        route
    }
}
