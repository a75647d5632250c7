//! Shared runtime latency benchmark domain primitives.
//!
//! This crate owns request/response contracts, invocation planning, key
//! generation and timing aggregation. It intentionally excludes AWS SDK and
//! Lambda runtime concerns, which live in `latency_bench_lambda`.

pub mod contract;
pub mod error;
pub mod keys;
pub mod outcome;
pub mod plan;
pub mod stats;
