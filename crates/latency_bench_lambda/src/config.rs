//! Cold-start configuration read from the function environment.
//!
//! Both loaders take a lookup function instead of reading `std::env` directly
//! so they can be exercised without mutating process state.

use std::str::FromStr;

use latency_bench_core::contract::{
    BatchOrder, BenchmarkRequest, ValidationError, Variant, VariantTarget,
    DEFAULT_CONCURRENCY, DEFAULT_FILLER_BYTES, DEFAULT_INVOCATIONS_PER_VARIANT,
    DEFAULT_INVOCATION_TIMEOUT_MS, DEFAULT_RUN_BUDGET_MS, DEFAULT_STORE_TIMEOUT_MS,
};

use crate::handlers::workload::WorkloadConfig;

pub const TABLE_ENV: &str = "TABLE";
pub const VARIANT_ENV: &str = "VARIANT";
pub const FILLER_BYTES_ENV: &str = "FILLER_BYTES";
pub const CONSISTENT_READ_ENV: &str = "CONSISTENT_READ";
pub const STORE_TIMEOUT_MS_ENV: &str = "STORE_TIMEOUT_MS";

pub const VARIANT_A_FUNCTION_ENV: &str = "VARIANT_A_FUNCTION";
pub const VARIANT_B_FUNCTION_ENV: &str = "VARIANT_B_FUNCTION";
pub const VARIANT_A_LABEL_ENV: &str = "VARIANT_A_LABEL";
pub const VARIANT_B_LABEL_ENV: &str = "VARIANT_B_LABEL";
pub const INVOCATIONS_PER_VARIANT_ENV: &str = "INVOCATIONS_PER_VARIANT";
pub const CONCURRENCY_ENV: &str = "CONCURRENCY";
pub const INVOCATION_TIMEOUT_MS_ENV: &str = "INVOCATION_TIMEOUT_MS";
pub const RUN_BUDGET_MS_ENV: &str = "RUN_BUDGET_MS";
pub const BENCHMARK_ORDER_ENV: &str = "BENCHMARK_ORDER";

pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

pub fn workload_config_from_env(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<WorkloadConfig, ValidationError> {
    Ok(WorkloadConfig {
        table_name: required(&lookup, TABLE_ENV)?,
        variant: required(&lookup, VARIANT_ENV)?.parse::<Variant>()?,
        filler_bytes: parsed_or(&lookup, FILLER_BYTES_ENV, DEFAULT_FILLER_BYTES)?,
        consistent_read: parse_flag(&lookup, CONSISTENT_READ_ENV)?,
        store_timeout_ms: positive_or(&lookup, STORE_TIMEOUT_MS_ENV, DEFAULT_STORE_TIMEOUT_MS)?,
    })
}

/// Deployment defaults for a benchmark run; trigger events may override them.
pub fn benchmark_defaults_from_env(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<BenchmarkRequest, ValidationError> {
    let target = |function_env: &str, label_env: &str| -> Result<VariantTarget, ValidationError> {
        Ok(VariantTarget {
            function_name: required(&lookup, function_env)?,
            label: optional(&lookup, label_env),
        })
    };

    let mut request = BenchmarkRequest::new(
        target(VARIANT_A_FUNCTION_ENV, VARIANT_A_LABEL_ENV)?,
        target(VARIANT_B_FUNCTION_ENV, VARIANT_B_LABEL_ENV)?,
    );
    request.invocations_per_variant = parsed_or(
        &lookup,
        INVOCATIONS_PER_VARIANT_ENV,
        DEFAULT_INVOCATIONS_PER_VARIANT,
    )?;
    request.concurrency = parsed_or(&lookup, CONCURRENCY_ENV, DEFAULT_CONCURRENCY)?;
    request.invocation_timeout_ms = parsed_or(
        &lookup,
        INVOCATION_TIMEOUT_MS_ENV,
        DEFAULT_INVOCATION_TIMEOUT_MS,
    )?;
    request.run_budget_ms = parsed_or(&lookup, RUN_BUDGET_MS_ENV, DEFAULT_RUN_BUDGET_MS)?;
    request.order = parsed_or(&lookup, BENCHMARK_ORDER_ENV, BatchOrder::default())?;
    Ok(request)
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<String, ValidationError> {
    optional(lookup, name).ok_or_else(|| ValidationError::new(format!("{name} must be configured")))
}

fn parsed_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ValidationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, name) {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|error| ValidationError::new(format!("{name}='{value}' is invalid: {error}"))),
    }
}

fn positive_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64, ValidationError> {
    match parsed_or(lookup, name, default)? {
        0 => Err(ValidationError::new(format!("{name} must be a positive integer"))),
        value => Ok(value),
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<bool, ValidationError> {
    match optional(lookup, name).map(|value| value.to_ascii_lowercase()) {
        None => Ok(false),
        Some(value) => match value.as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ValidationError::new(format!(
                "{name}='{value}' is invalid: expected true or false"
            ))),
        },
    }
}
