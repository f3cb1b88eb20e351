//! Offline cache engine for the SIG Sénégal map application.
//!
//! Intercepts GET requests, routes each to a cache partition and strategy,
//! serves offline fallbacks, and runs the install/activate lifecycle.

pub mod classify;
pub mod engine;
pub mod fallback;
pub mod fetch;
pub mod lifecycle;
pub mod message;
pub mod observer;
pub mod push;
pub mod registry;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use classify::{Classifier, ResourceClass, Route};
pub use engine::{ActivateReport, Engine, EngineStatus, FetchDisposition, InstallReport};
pub use fallback::FallbackProvider;
pub use fetch::{FetchClient, FetchConfig, Fetcher};
pub use lifecycle::WorkerState;
pub use message::{Location, Message, Reply};
pub use observer::{Observer, TracingObserver};
pub use push::{ClickAction, ClientWindow, Notification};
pub use registry::{PartitionRegistry, PartitionUsage};
pub use strategy::{Executed, ResponseSource, StrategyExecutor};
