//! Strata - logical-to-physical storage routing and online schema migration
//! for a blockchain node's persistence tier.
//!
//! Application subsystems (chain state, consensus metadata, indexed logs, EVM
//! state) address their data through logical *request* names. Strata decides
//! which physical key-value database, DB name, and table prefix each request
//! currently lives in, and can change that mapping between software versions:
//! the migration engine detects when the configured layout differs from the
//! layout recorded on disk, computes the minimal-risk transformation, and
//! applies it exactly once, crash-consistently.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Application Subsystems                        │
//! │   chain state │ consensus metadata │ indexed logs │ EVM state   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │ logical request names
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Routing Layer                              │
//! │   route table │ multi-producer │ table records │ skip-keys      │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Migration Engine                            │
//! │   planner (components) │ executor (rename / move / rebuild)     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    KV Store Backends                            │
//! │   flushable pool │ cached handles │ rocksdb │ in-memory         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::error`] - Error types
//! - [`core::runtime`] - Node store assembly and startup consistency
//!
//! ## KV Store
//! - [`kvdb`] - Backend contract and the rocksdb / in-memory backends
//! - [`kvdb::flushable`] - Write buffering and the dirty/clean protocol
//! - [`kvdb::table`] - Prefix-delimited namespaces
//! - [`kvdb::skipkeys`] - Reserved-key hiding
//!
//! ## Routing
//! - [`multidb::router`] - Request-pattern route resolution
//! - [`multidb::producer`] - Logical-request DB producer
//! - [`multidb::tables`] - Persisted per-DB table lists
//!
//! ## Migration
//! - [`migrate::planner`] - Layout diffing and component partition
//! - [`migrate::executor`] - The three migration strategies
//!
//! ## CLI
//! - [`cli::commands`] - `db migrate` and `db compact`
//!
//! # Key Invariants
//!
//! - Every physical DB belongs to exactly one migration component
//! - Contradictory target layouts fail before any on-disk mutation
//! - A dirty flush marker condemns the whole DB set, never parts of it
//! - Reserved metadata keys never appear in application-level iteration

// Core infrastructure
pub mod core;

// Key-value store contract, backends, and wrappers
pub mod kvdb;

// Logical-to-physical routing
pub mod multidb;

// Online schema migration
pub mod migrate;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::error::{Result, StrataError};
pub use self::core::{config, error, runtime};
