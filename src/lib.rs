//! # dork-search
//!
//! Runs a batch of search-engine queries in parallel, routing every request
//! through a rotating pool of proxies, and aggregates the structured leads
//! extracted from the result pages.
//!
//! - Niche-driven query generation from fixed templates
//! - Balanced, order-preserving sharding across workers
//! - Proxy pool with failure tracking and quarantine cooldowns
//! - Per-query failure isolation and cooperative cancellation
//! - Pluggable result extraction
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dork_search::{
//!     proxy::{PoolSettings, ProxyConfig, ProxyPool},
//!     Coordinator, HtmlLeadExtractor, HttpTransport,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = ProxyPool::with_proxies(
//!         vec![ProxyConfig::new("127.0.0.1", 8080)],
//!         PoolSettings::default(),
//!     )
//!     .await?;
//!
//!     let coordinator = Coordinator::new(
//!         Arc::new(pool),
//!         HttpTransport::default(),
//!         HtmlLeadExtractor::new(),
//!     );
//!
//!     let run = coordinator.execute("example.com", 4).await?;
//!     for lead in run.leads() {
//!         println!("{}: {}", lead.title, lead.url);
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod partition;
mod query;
mod result;

pub mod config;
pub mod coordinator;
pub mod extractor;
pub mod proxy;
pub mod transport;
pub mod worker;

pub use config::{DorkConfig, ProxySource, ProxySourceConfig, RequestConfig};
pub use coordinator::{execute, Coordinator};
pub use error::{DorkError, ExtractionError, Result, TransportError};
pub use extractor::{FnExtractor, HtmlLeadExtractor, Lead, ResultExtractor};
pub use partition::{partition, WorkShard, MAX_WORKERS};
pub use query::{Query, QueryGenerator, DEFAULT_TEMPLATES};
pub use result::{ExecutionResult, RunResult};
pub use transport::{HttpTransport, Transport};
pub use worker::WorkerState;
