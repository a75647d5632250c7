use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::types::InvocationType;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use latency_bench_core::contract::BenchmarkRequest;
use latency_bench_core::stats::BenchmarkReport;
use latency_bench_lambda::adapters::invoke::HandlerInvoker;
use latency_bench_lambda::config::{benchmark_defaults_from_env, process_env};
use latency_bench_lambda::handlers::driver::handle_driver_event;
use latency_bench_lambda::telemetry::init_tracing;
use serde_json::Value;

/// Time reserved after the run budget for aggregation and the final log line.
const DEADLINE_MARGIN: Duration = Duration::from_secs(10);

struct AwsLambdaInvoker {
    lambda_client: aws_sdk_lambda::Client,
}

#[async_trait]
impl HandlerInvoker for AwsLambdaInvoker {
    async fn invoke(&self, function_name: &str, payload: Vec<u8>) -> Result<Vec<u8>, String> {
        let output = self
            .lambda_client
            .invoke()
            .function_name(function_name)
            .invocation_type(InvocationType::RequestResponse)
            .set_payload(Some(payload.into()))
            .send()
            .await
            .map_err(|error| {
                format!(
                    "failed to invoke workload lambda: {}",
                    DisplayErrorContext(error)
                )
            })?;

        let body = output
            .payload()
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default();

        if let Some(function_error) = output.function_error() {
            return Err(format!(
                "workload lambda reported {function_error}: {}",
                String::from_utf8_lossy(&body)
            ));
        }

        Ok(body)
    }
}

/// Remaining function time minus a safety margin, or `None` when the
/// deadline is unknown.
fn remaining_budget(deadline_ms: u64, now: SystemTime) -> Option<Duration> {
    let now_ms = u64::try_from(now.duration_since(UNIX_EPOCH).ok()?.as_millis()).ok()?;
    if deadline_ms == 0 {
        return None;
    }
    let remaining = Duration::from_millis(deadline_ms.saturating_sub(now_ms));
    Some(remaining.saturating_sub(DEADLINE_MARGIN))
}

async fn handle_request(
    event: LambdaEvent<Value>,
    defaults: &BenchmarkRequest,
    invoker: Arc<AwsLambdaInvoker>,
) -> Result<BenchmarkReport, Error> {
    let ceiling = remaining_budget(event.context.deadline, SystemTime::now());
    handle_driver_event(event.payload, defaults.clone(), ceiling, invoker)
        .await
        .map_err(|error| Error::from(format!("{}: {error}", error.code())))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let defaults = benchmark_defaults_from_env(process_env)?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let invoker = Arc::new(AwsLambdaInvoker {
        lambda_client: aws_sdk_lambda::Client::new(&aws_config),
    });

    let defaults = &defaults;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let invoker = Arc::clone(&invoker);
        async move { handle_request(event, defaults, invoker).await }
    }))
    .await
}
