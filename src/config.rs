//! Configuration management with serde serialization/deserialization
//!
//! This module provides the configuration structure for the census run,
//! covering the metadata endpoint and the concurrency bounds of each engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for a census run
///
/// Controls the metadata endpoint and the resource bounds of the
/// concurrency engines. Every engine is bounded: the cooperative engine by
/// `concurrency_limit`, the threaded engine by `thread_workers`, and the
/// process engine by `process_workers`.
///
/// # Examples
///
/// ```rust
/// use color_census::Config;
///
/// // Use default configuration
/// let config = Config::default();
///
/// // Create custom configuration
/// let config = Config {
///     concurrency_limit: 8,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the metadata endpoint (default: none)
    ///
    /// Taken from the `API_URL` environment variable when not set in a
    /// configuration file. The date-range query parameters are appended to
    /// this value at run time.
    pub api_url: Option<String>,

    /// Maximum in-flight content fetches for the cooperative engine
    /// (default: 32)
    ///
    /// Bounds the fan-out of concurrently suspended downloads so large
    /// date ranges cannot exhaust sockets.
    pub concurrency_limit: usize,

    /// Worker thread count for the threaded engine (default: logical cores)
    pub thread_workers: usize,

    /// Worker subprocess count for the process engine
    /// (default: `max(1, logical cores - 1)`)
    pub process_workers: usize,

    /// Bounded wait for the metadata fetch under the process engine
    /// (default: 10 seconds)
    ///
    /// The whole batch fails if the metadata call does not complete within
    /// this window. Only applied when the process engine is selected.
    pub metadata_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            concurrency_limit: 32,
            thread_workers: num_cpus::get(),
            process_workers: num_cpus::get().saturating_sub(1).max(1),
            metadata_timeout: Duration::from_secs(10),
        }
    }
}
