//! # Color Census
//!
//! Fetches a date range of daily picture records from a metadata endpoint,
//! downloads each image, and reports the number of distinct pixel colors
//! per picture. The batch runs under one of four interchangeable
//! concurrency engines (sequential, cooperative, threaded, or process),
//! all satisfying the same contract: bounded concurrency, per-item failure
//! isolation, and results in input order regardless of completion order.
//!
//! ## Features
//!
//! - **Pluggable engines**: one orchestrator, four execution strategies
//! - **Bounded concurrency**: every engine caps its fan-out via configuration
//! - **Partial-failure isolation**: a failed download or decode is recorded
//!   for that record only; siblings are unaffected
//! - **Deterministic output**: results always match the input record order
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use color_census::{compose_endpoint_url, Config, EngineKind, Pipeline};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let endpoint = compose_endpoint_url(
//!         "https://api.example.com/pictures?key=DEMO",
//!         "2024-05-01",
//!         "2024-05-10",
//!     );
//!
//!     let pipeline = Pipeline::from_config(EngineKind::Cooperative, &config);
//!     let summary = pipeline.run(&endpoint).await;
//!     for result in &summary.results {
//!         println!("{}: {:?}", result.record, result.outcome);
//!     }
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! API_URL="https://api.example.com/pictures?key=DEMO" \
//!     color-census cooperative -s 2024-05-01 -e 2024-05-10
//! ```

/// Configuration for endpoints and concurrency bounds
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Catalog records and metadata retrieval
pub mod metadata;

/// Per-record content download
pub mod content;

/// Distinct-color counting
pub mod colors;

/// Pipeline orchestration and per-item outcomes
pub mod pipeline;

/// Concurrency engines and the process-worker protocol
pub mod engine;

/// Command-line interface implementation
pub mod cli;

/// Utility functions and helpers
pub mod utils;


pub use cli::*;
pub use colors::*;
pub use config::*;
pub use content::*;
pub use engine::*;
pub use error::*;
pub use metadata::*;
pub use pipeline::*;
pub use utils::*;
