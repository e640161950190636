//! # Restock Sentinel
//!
//! Concurrency and scheduling core for a product-availability monitor.
//!
//! Two groups of long-lived tasks poll a shop through a shared pool of egress
//! proxies:
//!
//! - the **normal** group walks the monitored SKUs in fair, round-robin
//!   batches and alerts when sizes appear, prices drop or a product comes back
//!   for sale;
//! - the **discovery** group watches the new-arrivals listing, promotes every
//!   unseen product into the next normal batch and alerts when it matches a
//!   keyword query.
//!
//! ## Key pieces
//!
//! - [`core::ProxyPool`]: per-proxy lease cap, blocking acquisition,
//!   bad-proxy eviction.
//! - [`core::TaskLifecycle`] / [`core::TaskGroup`]: start/stop/recover of
//!   worker threads, staggered starts, termination latch.
//! - [`core::SkuScheduler`]: batch cursor, promoted fast lane, unload
//!   counting.
//! - [`core::StateMatcher`]: diff between observations and persisted state.
//! - [`core::KeywordQuery`]: `+include -exclude /either/or` queries.
//!
//! Fetching, notification transport and storage are ports
//! ([`core::PageFetcher`], [`core::Notifier`], [`core::StateStore`],
//! [`core::ProxyStore`]).
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use restock_sentinel::builders::MonitorBuilder;
//! use restock_sentinel::core::QueryKind;
//! use restock_sentinel::infra::{JsonStateStore, ProxyFile};
//!
//! restock_sentinel::util::init_tracing();
//! let monitor = MonitorBuilder::from_config_file("config.json")?
//!     .with_fetcher(Arc::new(my_fetcher))
//!     .with_state_store(Arc::new(JsonStateStore::new("productStates.json")))
//!     .with_proxy_store(Arc::new(ProxyFile::new("proxies")))
//!     .build()?;
//! monitor.control().add_query(QueryKind::Sku, "DD1391-100")?;
//! monitor.start()?;
//! monitor.wait();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Monitor core: pool, tasks, scheduling, matching, keyword queries.
pub mod core;
/// Configuration file model.
pub mod config;
/// Builders to assemble the monitor.
pub mod builders;
/// Storage and notification adapters.
pub mod infra;
/// Assembled monitor and config hot reload.
pub mod runtime;
/// Shared utilities.
pub mod util;
