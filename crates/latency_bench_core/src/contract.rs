use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const BENCHMARK_SCHEMA_VERSION: &str = "v1";
pub const DEFAULT_INVOCATIONS_PER_VARIANT: usize = 10;
pub const MAX_INVOCATIONS_PER_VARIANT: usize = 10_000;
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_INVOCATION_TIMEOUT_MS: u64 = 30_000;
/// Leaves headroom under the 15 minute Lambda ceiling for aggregation and logging.
pub const DEFAULT_RUN_BUDGET_MS: u64 = 870_000;
pub const DEFAULT_FILLER_BYTES: usize = 100;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// One of the two compute backends being compared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    A,
    B,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::A, Variant::B];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            other => Err(ValidationError::new(format!(
                "Unknown variant '{other}', expected 'a' or 'b'"
            ))),
        }
    }
}

/// How invocations of the two variants are scheduled against each other.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchOrder {
    /// All invocations of A, then all of B.
    #[default]
    Sequential,
    /// A and B alternate inside a single batch.
    Interleaved,
}

impl BatchOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Interleaved => "interleaved",
        }
    }
}

impl FromStr for BatchOrder {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "interleaved" => Ok(Self::Interleaved),
            other => Err(ValidationError::new(format!(
                "Unknown benchmark order '{other}', expected 'sequential' or 'interleaved'"
            ))),
        }
    }
}

/// The record written and read back by every workload invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BenchmarkRecord {
    pub key: String,
    pub timestamp: String,
    pub variant: Variant,
    pub filler_payload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvocationResult {
    pub variant: Variant,
    pub key: String,
    pub write_duration_ms: f64,
    pub read_duration_ms: f64,
    pub total_duration_ms: f64,
    /// Invoke latency seen by the driver; absent when produced inside the handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_trip_ms: Option<f64>,
    pub timestamp: String,
}

impl InvocationResult {
    pub fn with_round_trip(mut self, round_trip_ms: f64) -> Self {
        self.round_trip_ms = Some(round_trip_ms);
        self
    }

    pub fn has_valid_durations(&self) -> bool {
        let mut durations = vec![
            self.write_duration_ms,
            self.read_duration_ms,
            self.total_duration_ms,
        ];
        durations.extend(self.round_trip_ms);
        durations
            .into_iter()
            .all(|value| value.is_finite() && value >= 0.0)
    }
}

/// Payload sent by the driver to a workload handler. Every field is optional
/// so a bare `{}` trigger is accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandlerEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<usize>,
    #[serde(default)]
    pub inject_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandlerResponse {
    pub status: String,
    pub key: String,
    pub result: InvocationResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantTarget {
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl VariantTarget {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            label: None,
        }
    }

    pub fn labelled(function_name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            label: Some(label.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BenchmarkRequest {
    #[serde(default)]
    pub run_id: Option<String>,
    pub variant_a: VariantTarget,
    pub variant_b: VariantTarget,
    #[serde(default = "default_invocations_per_variant")]
    pub invocations_per_variant: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_invocation_timeout_ms")]
    pub invocation_timeout_ms: u64,
    #[serde(default = "default_run_budget_ms")]
    pub run_budget_ms: u64,
    #[serde(default)]
    pub order: BatchOrder,
    #[serde(default)]
    pub failure_injection: Vec<usize>,
}

impl BenchmarkRequest {
    pub fn new(variant_a: VariantTarget, variant_b: VariantTarget) -> Self {
        Self {
            run_id: None,
            variant_a,
            variant_b,
            invocations_per_variant: DEFAULT_INVOCATIONS_PER_VARIANT,
            concurrency: DEFAULT_CONCURRENCY,
            invocation_timeout_ms: DEFAULT_INVOCATION_TIMEOUT_MS,
            run_budget_ms: DEFAULT_RUN_BUDGET_MS,
            order: BatchOrder::default(),
            failure_injection: Vec::new(),
        }
    }

    /// Applies per-run overrides on top of deployment defaults.
    pub fn with_overrides(mut self, overrides: BenchmarkOverrides) -> Self {
        if let Some(run_id) = overrides.run_id {
            self.run_id = Some(run_id);
        }
        if let Some(target) = overrides.variant_a {
            self.variant_a = target;
        }
        if let Some(target) = overrides.variant_b {
            self.variant_b = target;
        }
        if let Some(count) = overrides.invocations_per_variant {
            self.invocations_per_variant = count;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(timeout_ms) = overrides.invocation_timeout_ms {
            self.invocation_timeout_ms = timeout_ms;
        }
        if let Some(budget_ms) = overrides.run_budget_ms {
            self.run_budget_ms = budget_ms;
        }
        if let Some(order) = overrides.order {
            self.order = order;
        }
        if let Some(failure_injection) = overrides.failure_injection {
            self.failure_injection = failure_injection;
        }
        self
    }
}

/// Partial request carried by a driver trigger event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkOverrides {
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub variant_a: Option<VariantTarget>,
    #[serde(default)]
    pub variant_b: Option<VariantTarget>,
    #[serde(default)]
    pub invocations_per_variant: Option<usize>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub invocation_timeout_ms: Option<u64>,
    #[serde(default)]
    pub run_budget_ms: Option<u64>,
    #[serde(default)]
    pub order: Option<BatchOrder>,
    #[serde(default)]
    pub failure_injection: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub function_name: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedBenchmarkRequest {
    pub run_id: String,
    pub variant_a: ResolvedTarget,
    pub variant_b: ResolvedTarget,
    pub invocations_per_variant: usize,
    pub concurrency: usize,
    pub invocation_timeout_ms: u64,
    pub run_budget_ms: u64,
    pub order: BatchOrder,
    pub failure_injection: Vec<usize>,
}

impl NormalizedBenchmarkRequest {
    pub fn target(&self, variant: Variant) -> &ResolvedTarget {
        match variant {
            Variant::A => &self.variant_a,
            Variant::B => &self.variant_b,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    pub schema_version: String,
    pub request_fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn default_invocations_per_variant() -> usize {
    DEFAULT_INVOCATIONS_PER_VARIANT
}

pub fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

pub fn default_invocation_timeout_ms() -> u64 {
    DEFAULT_INVOCATION_TIMEOUT_MS
}

pub fn default_run_budget_ms() -> u64 {
    DEFAULT_RUN_BUDGET_MS
}

pub fn normalize_request(
    payload: BenchmarkRequest,
) -> Result<NormalizedBenchmarkRequest, ValidationError> {
    let run_id = match payload.run_id.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    let variant_a = resolve_target(Variant::A, payload.variant_a)?;
    let variant_b = resolve_target(Variant::B, payload.variant_b)?;
    if variant_a.function_name == variant_b.function_name {
        return Err(ValidationError::new(
            "variant_a and variant_b must target different functions",
        ));
    }

    if payload.invocations_per_variant == 0 {
        return Err(ValidationError::new(
            "invocations_per_variant must be a positive integer",
        ));
    }

    if payload.invocations_per_variant > MAX_INVOCATIONS_PER_VARIANT {
        return Err(ValidationError::new(format!(
            "invocations_per_variant exceeds MAX_INVOCATIONS_PER_VARIANT={MAX_INVOCATIONS_PER_VARIANT}"
        )));
    }

    if payload.concurrency == 0 {
        return Err(ValidationError::new("concurrency must be a positive integer"));
    }

    if payload.invocation_timeout_ms == 0 {
        return Err(ValidationError::new(
            "invocation_timeout_ms must be a positive integer",
        ));
    }

    if payload.run_budget_ms == 0 {
        return Err(ValidationError::new(
            "run_budget_ms must be a positive integer",
        ));
    }

    if payload.invocation_timeout_ms > payload.run_budget_ms {
        return Err(ValidationError::new(format!(
            "invocation_timeout_ms={} exceeds run_budget_ms={}",
            payload.invocation_timeout_ms, payload.run_budget_ms
        )));
    }

    let mut failure_injection = payload.failure_injection;
    failure_injection.sort_unstable();
    failure_injection.dedup();
    if let Some(&sequence) = failure_injection.last() {
        if sequence >= payload.invocations_per_variant {
            return Err(ValidationError::new(format!(
                "failure_injection sequence {sequence} is out of range for invocations_per_variant={}",
                payload.invocations_per_variant
            )));
        }
    }

    Ok(NormalizedBenchmarkRequest {
        run_id,
        variant_a,
        variant_b,
        invocations_per_variant: payload.invocations_per_variant,
        concurrency: payload.concurrency.min(payload.invocations_per_variant),
        invocation_timeout_ms: payload.invocation_timeout_ms,
        run_budget_ms: payload.run_budget_ms,
        order: payload.order,
        failure_injection,
    })
}

fn resolve_target(variant: Variant, target: VariantTarget) -> Result<ResolvedTarget, ValidationError> {
    let function_name = target.function_name.trim().to_string();
    if function_name.is_empty() {
        return Err(ValidationError::new(format!(
            "variant_{variant} function_name cannot be empty"
        )));
    }

    let label = target
        .label
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| variant.as_str().to_string());

    Ok(ResolvedTarget {
        function_name,
        label,
    })
}

pub fn request_fingerprint(request: &NormalizedBenchmarkRequest) -> Result<String, ValidationError> {
    let body = serde_json::to_vec(request)
        .map_err(|error| ValidationError::new(format!("failed to encode request: {error}")))?;
    let mut hasher = Sha256::new();
    hasher.update(body);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn build_run_context(request: &NormalizedBenchmarkRequest) -> Result<RunContext, ValidationError> {
    Ok(RunContext {
        run_id: request.run_id.clone(),
        schema_version: BENCHMARK_SCHEMA_VERSION.to_string(),
        request_fingerprint: request_fingerprint(request)?,
    })
}
