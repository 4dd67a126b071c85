//! Resilient, cache-backed fetching of public GitHub activity statistics.
//!
//! [`client::PulseClient`] wraps every request with a read-through
//! [`cache::ResponseCache`], bounded retries with exponential backoff,
//! `Retry-After` handling and a per-attempt timeout.

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod domain;
pub mod logging;
pub mod result;
