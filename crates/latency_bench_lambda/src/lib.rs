//! AWS-oriented adapters and handlers for the runtime latency benchmark.
//!
//! This crate owns runtime integration details (Lambda handlers, the record
//! store and invoker seams, env configuration and log setup). Contracts,
//! planning and aggregation come from `latency_bench_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod telemetry;
