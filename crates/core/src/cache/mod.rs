//! SQLite-backed named cache stores.
//!
//! This module provides persistent request/response storage using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named stores, one per version-qualified partition
//! - Entries keyed by a SHA-256 hash of method and URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Whole-store deletion, age-based purge and size accounting

pub mod connection;
pub mod entries;
pub mod hash;
pub mod meta;
pub mod migrations;
pub mod partition;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use partition::{Partition, Strategy};
pub use stores::{Store, StoreStats};
