//! Configuration parsing and validation.
//!
//! Strata configuration is loaded from TOML files with CLI overrides.
//! The `[routing]` section is the route table: a map from logical-request
//! patterns (literal, `%d`-parameterized, or the `""` catch-all) to physical
//! placements. The `[cache]` section sizes each physical DB's block cache by
//! the same pattern scheme.

use crate::core::error::Result;
use crate::multidb::{pattern, Route};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Hex form of the reserved metadata key prefix.
///
/// A long random byte string; application keyspace never collides with it in
/// practice, and the skip-keys wrapper hides it from iteration anyway.
const METADATA_PREFIX_HEX: &str = "00c5f1b4937a02e1d38f66a3c0e58b2d41f7ba9c6f10d44e8a25c97303be61\
                                   d8a90f5e7c4428d1bb63aa187f02c9e45d16";

/// Reserved in-DB key layout, derived from the metadata prefix.
///
/// Constructed once and injected into the components that touch reserved
/// keys; never a process-wide global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedKeys {
    /// Prefix shared by every reserved key.
    pub metadata_prefix: Vec<u8>,
    /// Key of the flush-id record (`[marker byte][8-byte big-endian id]`).
    pub flush_id_key: Vec<u8>,
    /// Key of the serialized table-list record.
    pub tables_key: Vec<u8>,
}

impl ReservedKeys {
    /// Derive the reserved key set from a metadata prefix.
    pub fn new(metadata_prefix: Vec<u8>) -> Self {
        let mut flush_id_key = metadata_prefix.clone();
        flush_id_key.push(0x0c);
        let mut tables_key = metadata_prefix.clone();
        tables_key.push(0x0d);
        Self {
            metadata_prefix,
            flush_id_key,
            tables_key,
        }
    }
}

impl Default for ReservedKeys {
    fn default() -> Self {
        Self::new(hex::decode(METADATA_PREFIX_HEX).expect("static metadata prefix is valid hex"))
    }
}

/// Top-level Strata configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Filesystem paths.
    #[serde(default)]
    pub paths: PathConfig,

    /// Logical-to-physical route table.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Per-DB cache sizing.
    #[serde(default)]
    pub cache: DbCacheConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Filesystem paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Node data directory; live DBs go under `<data_dir>/chaindata`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Route table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Pattern to route mapping; `""` is the catch-all.
    #[serde(default = "default_routing_table")]
    pub table: HashMap<String, Route>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            table: default_routing_table(),
        }
    }
}

/// Per-DB cache sizing, in bytes, keyed by DB-name pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbCacheConfig {
    /// Pattern to cache-size mapping; `""` is the catch-all.
    #[serde(default = "default_cache_table")]
    pub table: HashMap<String, u64>,
}

impl Default for DbCacheConfig {
    fn default() -> Self {
        Self {
            table: default_cache_table(),
        }
    }
}

impl DbCacheConfig {
    /// Resolve the cache size for a physical DB name.
    ///
    /// Tries an exact match, then `%d` patterns, then the `""` default.
    pub fn resolve(&self, name: &str) -> u64 {
        if let Some(size) = self.table.get(name) {
            return *size;
        }
        let mut patterns: Vec<(&String, &u64)> = self
            .table
            .iter()
            .filter(|(p, _)| p.contains('%'))
            .collect();
        patterns.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (p, size) in patterns {
            if pattern::match_pattern(p, name).is_some() {
                return *size;
            }
        }
        self.table.get("").copied().unwrap_or(0)
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("failed to parse config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate pattern syntax in the routing and cache tables.
    pub fn validate(&self) -> Result<()> {
        for p in self.routing.table.keys() {
            pattern::validate_pattern(p)?;
        }
        for route in self.routing.table.values() {
            pattern::validate_pattern(&route.name)?;
            pattern::validate_pattern(&route.table)?;
        }
        for p in self.cache.table.keys() {
            pattern::validate_pattern(p)?;
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_routing_table() -> HashMap<String, Route> {
    // Catch-all with an empty name: every request gets its own physical DB,
    // named after the request.
    HashMap::from([(
        String::new(),
        Route {
            db_type: "rocksdb".to_string(),
            ..Route::default()
        },
    )])
}

fn default_cache_table() -> HashMap<String, u64> {
    const MIB: u64 = 1024 * 1024;
    HashMap::from([
        ("gossip".to_string(), 128 * MIB),
        ("gossip-%d".to_string(), 8 * MIB),
        ("lachesis".to_string(), 4 * MIB),
        ("lachesis-%d".to_string(), 8 * MIB),
        (String::new(), 2 * MIB),
    ])
}

fn default_log_level() -> String {
    "info".to_string()
}
