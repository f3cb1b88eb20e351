//! Core types and shared functionality for the SIG offline cache engine.
//!
//! This crate provides:
//! - Request/response snapshots shared by the engine and its storage
//! - Named cache stores with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CachedEntry, Partition, Store, Strategy};
pub use config::{AppConfig, ConfigError, StrategyTable};
pub use error::Error;
pub use http::{Destination, Request, Response, ResponseKind};
