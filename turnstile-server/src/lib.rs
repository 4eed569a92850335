//! # Turnstile Server
//!
//! An HTTP admission gateway built on the [`turnstile`] admission controller.
//!
//! ## Purpose
//!
//! Turnstile Server puts a per-client rate limit in front of HTTP traffic.
//! Each client is identified by its IP address and admitted or rejected
//! according to one policy shared by all clients:
//!
//! - **Token bucket**: bursts up to a capacity, refilled continuously
//! - **Fixed window**: a fixed number of admissions per interval
//!
//! Idle clients are forgotten by a background reaper, so memory follows the
//! number of recently active clients.
//!
//! ## Installation
//!
//! ```bash
//! cargo install turnstile-server
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! turnstile --help
//!
//! # Five request burst, one request per second sustained
//! turnstile --algorithm token-bucket --capacity 5 --rate 1
//!
//! # Ten requests per one second window, shared by all clients
//! turnstile --algorithm fixed-window --capacity 10 --rate 1 --scope global
//! ```
//!
//! ## Configuration
//!
//! Configure via CLI arguments, environment variables or a configuration
//! file (CLI takes precedence, then environment, then file):
//!
//! ```bash
//! # Via CLI
//! turnstile --port 9090 --entry-ttl 60
//!
//! # Via environment variables
//! export TURNSTILE_PORT=9090
//! export TURNSTILE_ENTRY_TTL=60
//! turnstile
//!
//! # Via configuration file
//! turnstile --config turnstile.yaml
//!
//! # List all available environment variables
//! turnstile --list-env-vars
//! ```
//!
//! ## Endpoints
//!
//! ```bash
//! # Admission keyed by the caller's IP, 429 when over the limit
//! curl -i http://localhost:8080/admit
//!
//! # Admission for an explicit key
//! curl -i -X POST http://localhost:8080/admit/user:123
//!
//! # Counters
//! curl http://localhost:8080/stats
//! ```
//!
//! See [`http`] for the response formats.

pub mod config;
pub mod http;
pub mod middleware;

#[cfg(test)]
mod http_test;
