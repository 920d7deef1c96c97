//! Object storage layer
//!
//! Everything the log engine knows about the backing store: the narrow
//! `ObjectStore` trait and its backends, the retry/timeout boundary where
//! `std::io` failures become `LogStoreError`s, clocks, and configuration.
//!
//! ## Backends
//!
//! - `InMemoryObjectStore`: tests and simulation
//! - `LocalFsObjectStore`: local development
//! - `S3ObjectStore`: AWS S3, MinIO, SeaweedFS (feature `s3`)
//! - `SimulatedObjectStore`: fault-injecting wrapper around any of the above

pub mod clock;
pub mod config;
pub mod object_store;
pub mod retry;
#[cfg(feature = "s3")]
pub mod s3_store;
pub mod simulated_store;

pub use clock::{LogClock, LogTimestamp, ProductionClock, SimulatedClock};
pub use config::{LogStoreConfig, ObjectStoreType, RetryConfig, S3Config, WriterConfig};
pub use object_store::{
    InMemoryObjectStore, ListResult, LocalFsObjectStore, ObjectMeta, ObjectStore, StoreFuture,
};
pub use retry::with_retry;
#[cfg(feature = "s3")]
pub use s3_store::S3ObjectStore;
pub use simulated_store::{SimulatedObjectStore, SimulatedStoreConfig, SimulatedStoreStats};
