//! Storage layer: the in-memory catalog and its disk snapshots.
//!
//! Data lives in-memory in a [`Catalog`]. Durability is provided by bincode
//! snapshots (CRC32 footer, atomic temp-file + rename) written periodically
//! and on shutdown.

/// Catalog data structures and write/read operations.
pub mod catalog;
/// Disk persistence: snapshot save/load with atomic writes.
pub mod persistence;

pub use catalog::{Catalog, CatalogCounts, CatalogData, NaturalKey, RecordPage};
pub use persistence::{load_catalog, load_or_default, save_catalog, snapshot_path};
