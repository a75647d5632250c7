use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use latency_bench_core::contract::{
    build_run_context, normalize_request, BenchmarkOverrides, BenchmarkRequest, HandlerEvent,
    HandlerResponse, InvocationResult, NormalizedBenchmarkRequest, ValidationError, Variant,
};
use latency_bench_core::error::BenchError;
use latency_bench_core::outcome::{InvocationOutcome, InvocationState};
use latency_bench_core::plan::{compute_invocation_plan, InvocationBatch};
use latency_bench_core::stats::{aggregate_outcomes, duration_ms, BenchmarkReport};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::adapters::invoke::HandlerInvoker;

/// Entry point for a driver trigger event.
///
/// The event carries optional per-run overrides merged over `defaults`.
/// `budget_ceiling` caps the run budget, typically to the time the hosting
/// function has left.
pub async fn handle_driver_event<I>(
    event: Value,
    defaults: BenchmarkRequest,
    budget_ceiling: Option<Duration>,
    invoker: Arc<I>,
) -> Result<BenchmarkReport, BenchError>
where
    I: HandlerInvoker + 'static,
{
    let overrides = parse_overrides(event)?;
    let mut request = normalize_request(defaults.with_overrides(overrides))?;

    if let Some(ceiling) = budget_ceiling {
        clamp_to_ceiling(&mut request, ceiling);
    }

    run_benchmark(request, invoker).await
}

/// Shrinks the run budget to `ceiling`, pulling the per-call timeout down with
/// it so no single call can outlive the run.
fn clamp_to_ceiling(request: &mut NormalizedBenchmarkRequest, ceiling: Duration) {
    let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX).max(1);
    if ceiling_ms >= request.run_budget_ms {
        return;
    }

    warn!(
        component = "benchmark_driver",
        event = "run_budget_clamped",
        requested_ms = request.run_budget_ms,
        ceiling_ms,
    );
    request.run_budget_ms = ceiling_ms;
    request.invocation_timeout_ms = request.invocation_timeout_ms.min(ceiling_ms);
}

/// Issues every planned invocation and aggregates the outcomes per variant.
///
/// Individual failures are downgraded to failure counts. The run itself only
/// fails when the plan is invalid or nothing succeeded at all.
pub async fn run_benchmark<I>(
    request: NormalizedBenchmarkRequest,
    invoker: Arc<I>,
) -> Result<BenchmarkReport, BenchError>
where
    I: HandlerInvoker + 'static,
{
    let run_context = build_run_context(&request)?;
    let plan = compute_invocation_plan(&request)?;

    let started_at = Utc::now();
    let started = Instant::now();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(request.run_budget_ms);

    info!(
        component = "benchmark_driver",
        event = "run_started",
        run_id = %run_context.run_id,
        request_fingerprint = %run_context.request_fingerprint,
        order = request.order.as_str(),
        invocations_per_variant = request.invocations_per_variant,
        concurrency = request.concurrency,
        invocation_timeout_ms = request.invocation_timeout_ms,
        run_budget_ms = request.run_budget_ms,
        variant_a = %request.variant_a.function_name,
        variant_b = %request.variant_b.function_name,
    );

    let request = Arc::new(request);
    let mut outcomes = Vec::with_capacity(request.invocations_per_variant * Variant::ALL.len());
    for batch in plan {
        outcomes.extend(run_batch(&request, &run_context.run_id, batch, &invoker, deadline).await);
    }

    let reports: Vec<_> = Variant::ALL
        .iter()
        .map(|&variant| aggregate_outcomes(variant, &request.target(variant).label, &outcomes))
        .collect();

    for report in &reports {
        info!(
            component = "benchmark_driver",
            event = "variant_aggregated",
            run_id = %run_context.run_id,
            variant = %report.variant,
            label = %report.label,
            count = report.count,
            failed = report.failures.failed,
            timed_out = report.failures.timed_out,
            report = %report_json(report),
        );
    }

    let report = BenchmarkReport {
        run_context,
        order: request.order,
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        elapsed_ms: duration_ms(started.elapsed()),
        reports,
    };

    if report.total_successes() == 0 {
        let attempted = report.total_attempted();
        error!(
            component = "benchmark_driver",
            event = "run_failed",
            run_id = %report.run_context.run_id,
            attempted,
            report = %report_json(&report),
        );
        return Err(BenchError::NoSuccessfulInvocations { attempted });
    }

    info!(
        component = "benchmark_driver",
        event = "run_completed",
        run_id = %report.run_context.run_id,
        elapsed_ms = report.elapsed_ms,
        successes = report.total_successes(),
        attempted = report.total_attempted(),
        report = %report_json(&report),
    );
    Ok(report)
}

async fn run_batch<I>(
    request: &Arc<NormalizedBenchmarkRequest>,
    run_id: &str,
    batch: InvocationBatch,
    invoker: &Arc<I>,
    deadline: tokio::time::Instant,
) -> Vec<InvocationOutcome>
where
    I: HandlerInvoker + 'static,
{
    let mut outcomes: Vec<InvocationOutcome> = batch
        .assignments
        .iter()
        .map(|assignment| InvocationOutcome::pending(assignment.variant, assignment.sequence))
        .collect();

    let mut expired = tokio::time::Instant::now() >= deadline;
    if !expired {
        let semaphore = Arc::new(Semaphore::new(request.concurrency));
        let timeout = Duration::from_millis(request.invocation_timeout_ms);
        let mut tasks = JoinSet::new();

        for (index, assignment) in batch.assignments.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let invoker = Arc::clone(invoker);
            let function_name = request.target(assignment.variant).function_name.clone();
            let event = HandlerEvent {
                run_id: Some(run_id.to_string()),
                variant: Some(assignment.variant),
                sequence: Some(assignment.sequence),
                inject_failure: assignment.inject_failure,
            };

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (
                        index,
                        InvocationState::Failed(BenchError::InvocationFailed {
                            variant: assignment.variant,
                            message: "concurrency limiter closed".to_string(),
                        }),
                    );
                };
                let state = invoke_once(
                    invoker.as_ref(),
                    &function_name,
                    assignment.variant,
                    &event,
                    timeout,
                )
                .await;
                (index, state)
            });
        }

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, state)))) => {
                    outcomes[index].resolve(state);
                    log_invocation(run_id, &outcomes[index]);
                }
                Ok(Some(Err(join_error))) => {
                    warn!(
                        component = "benchmark_driver",
                        event = "invocation_task_aborted",
                        run_id,
                        error = %join_error,
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    tasks.abort_all();
                    expired = true;
                    break;
                }
            }
        }
    }

    let pending = outcomes
        .iter()
        .filter(|outcome| !outcome.state().is_terminal())
        .count();
    if pending > 0 {
        if expired {
            warn!(
                component = "benchmark_driver",
                event = "run_budget_exhausted",
                run_id,
                pending,
            );
        }
        for outcome in outcomes
            .iter_mut()
            .filter(|outcome| !outcome.state().is_terminal())
        {
            let error = if expired {
                BenchError::DriverTimeout { pending }
            } else {
                BenchError::InvocationFailed {
                    variant: outcome.variant,
                    message: "invocation task ended without a result".to_string(),
                }
            };
            outcome.resolve(InvocationState::from_error(error));
        }
    }

    outcomes
}

async fn invoke_once<I>(
    invoker: &I,
    function_name: &str,
    variant: Variant,
    event: &HandlerEvent,
    timeout: Duration,
) -> InvocationState
where
    I: HandlerInvoker + ?Sized,
{
    let payload = match serde_json::to_vec(event) {
        Ok(value) => value,
        Err(error) => {
            return InvocationState::Failed(BenchError::InvocationFailed {
                variant,
                message: format!("failed to encode handler event: {error}"),
            });
        }
    };

    let started = Instant::now();
    let body = match tokio::time::timeout(timeout, invoker.invoke(function_name, payload)).await {
        Ok(Ok(body)) => body,
        Ok(Err(message)) => {
            return InvocationState::Failed(BenchError::InvocationFailed { variant, message });
        }
        Err(_) => {
            return InvocationState::TimedOut(BenchError::InvocationTimeout {
                variant,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
    };
    let round_trip_ms = duration_ms(started.elapsed());

    match decode_handler_response(variant, &body) {
        Ok(result) => InvocationState::Succeeded(result.with_round_trip(round_trip_ms)),
        Err(error) => InvocationState::Failed(error),
    }
}

fn decode_handler_response(variant: Variant, body: &[u8]) -> Result<InvocationResult, BenchError> {
    let failed = |message: String| BenchError::InvocationFailed { variant, message };

    let response: HandlerResponse = serde_json::from_slice(body)
        .map_err(|error| failed(format!("malformed handler response: {error}")))?;

    if response.status != "ok" {
        return Err(failed(format!(
            "handler reported status '{}'",
            response.status
        )));
    }
    if response.result.variant != variant {
        return Err(failed(format!(
            "handler answered for variant {}",
            response.result.variant
        )));
    }
    if !response.result.has_valid_durations() {
        return Err(failed("handler reported invalid durations".to_string()));
    }

    Ok(response.result)
}

fn report_json(report: &impl serde::Serialize) -> String {
    serde_json::to_string(report).unwrap_or_else(|error| format!("<unserializable report: {error}>"))
}

fn log_invocation(run_id: &str, outcome: &InvocationOutcome) {
    if let Some(result) = outcome.result() {
        info!(
            component = "benchmark_driver",
            event = "invocation_succeeded",
            run_id,
            variant = %outcome.variant,
            sequence = outcome.sequence,
            key = %result.key,
            write_duration_ms = result.write_duration_ms,
            read_duration_ms = result.read_duration_ms,
            total_duration_ms = result.total_duration_ms,
            round_trip_ms = result.round_trip_ms,
        );
    } else if let Some(error) = outcome.error() {
        warn!(
            component = "benchmark_driver",
            event = "invocation_dropped",
            run_id,
            variant = %outcome.variant,
            sequence = outcome.sequence,
            outcome = outcome.state().as_str(),
            error_code = error.code(),
            error = %error,
        );
    }
}

/// Extracts per-run overrides from a raw trigger event.
///
/// Accepts a plain JSON object, an API Gateway proxy event whose `body` holds
/// the overrides, or an EventBridge scheduled event whose `detail` does.
pub fn parse_overrides(event: Value) -> Result<BenchmarkOverrides, ValidationError> {
    let payload = normalize_trigger_event(event)?;
    serde_json::from_value(payload)
        .map_err(|error| ValidationError::new(format!("Malformed request: {error}")))
}

fn normalize_trigger_event(event: Value) -> Result<Value, ValidationError> {
    let object = match event {
        Value::Null => return Ok(json!({})),
        Value::Object(object) => object,
        _ => {
            return Err(ValidationError::new(
                "Request payload must be a JSON object",
            ))
        }
    };

    if object.contains_key("detail-type") {
        return match object.get("detail") {
            None | Some(Value::Null) => Ok(json!({})),
            Some(detail @ Value::Object(_)) => Ok(detail.clone()),
            Some(_) => Err(ValidationError::new("Event detail must be a JSON object")),
        };
    }

    if !object.contains_key("body") {
        return Ok(Value::Object(object));
    }
    let body = object.get("body").cloned().unwrap_or(Value::Null);

    match &body {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(body.clone()),
        Value::String(text) if text.trim().is_empty() => Ok(json!({})),
        Value::String(text) => serde_json::from_str(text)
            .map_err(|error| ValidationError::new(format!("Malformed JSON body: {error}"))),
        _ => Err(ValidationError::new("Request body must be a JSON object")),
    }
}
