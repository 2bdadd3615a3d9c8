//! # dedup_storage - Deduplicating File Storage
//!
//! Stores uploaded files once per distinct content. Identical uploads share a
//! single blob record whose reference count tracks how many uploads point at
//! it, and a singleton metadata row keeps store-wide counters in step.
//!
//! ## Architecture Layers
//!
//! - **Domain**: blob records, aggregate metadata, value objects, validation
//! - **Application**: the deduplication engine, query use cases and ports
//! - **Infrastructure**: Postgres and in-memory repositories, local filesystem storage
//! - **API**: axum handlers and middleware
//!
//! ## Key Features
//!
//! - SHA-256 content fingerprints as the deduplication key
//! - Serializable transactions with bounded retries on contention
//! - Reference-counted release plus an explicit purge
//! - Background sweeping of orphaned bytes
//!
//! ## Example Usage
//!
//! ```no_run
//! use dedup_storage::{application::builder::ApplicationBuilder, Config};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let builder = ApplicationBuilder::new(Config::from_env())
//!     .with_database()
//!     .await?
//!     .with_infrastructure()
//!     .await?;
//! let state = builder.build()?;
//! let stats = state.engine.stats().await?;
//! println!("{} unique blobs", stats.unique_blobs);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export key types explicitly to avoid ambiguity
pub use api::errors as api_errors;
pub use application::engine::{DeduplicationEngine, IngestOutcome, ReleaseOutcome};
pub use application::{dto, ports, use_cases};
pub use config::Config;
pub use domain::errors as domain_errors;
pub use domain::{entities, value_objects};
