use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use latency_bench_core::contract::{
    BenchmarkRecord, HandlerEvent, HandlerResponse, InvocationResult, Variant,
};
use latency_bench_core::error::{BenchError, StoreOperation};
use latency_bench_core::keys::RecordKeyGenerator;
use latency_bench_core::stats::duration_ms;
use rand::RngCore;
use tracing::{error, info};

use crate::adapters::record_store::{RecordStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub table_name: String,
    pub variant: Variant,
    pub filler_bytes: usize,
    pub consistent_read: bool,
    pub store_timeout_ms: u64,
}

/// Per-container state built once at cold start and shared by every invocation.
#[derive(Debug)]
pub struct WorkloadContext {
    pub config: WorkloadConfig,
    keys: RecordKeyGenerator,
    filler: Vec<u8>,
}

impl WorkloadContext {
    pub fn new(config: WorkloadConfig) -> Self {
        let mut filler = vec![0u8; config.filler_bytes];
        rand::thread_rng().fill_bytes(&mut filler);
        let keys = RecordKeyGenerator::new();
        info!(
            component = "workload_handler",
            event = "container_initialized",
            instance = keys.instance(),
            variant = %config.variant,
            table = %config.table_name,
            filler_bytes = config.filler_bytes,
            store_timeout_ms = config.store_timeout_ms,
        );
        Self::with_parts(config, keys, filler)
    }

    /// Identifies the container; every key it writes starts with this id.
    pub fn instance(&self) -> &str {
        self.keys.instance()
    }

    pub fn with_parts(config: WorkloadConfig, keys: RecordKeyGenerator, filler: Vec<u8>) -> Self {
        Self {
            config,
            keys,
            filler,
        }
    }

    pub fn filler(&self) -> &[u8] {
        &self.filler
    }
}

/// Runs one write-then-read cycle and reports its timings.
///
/// Store failures, store calls exceeding `store_timeout_ms`, a missing
/// read-back and a mismatched read-back all surface as `StoreUnavailable`.
/// Nothing is retried.
pub async fn handle_workload(
    event: &HandlerEvent,
    context: &WorkloadContext,
    store: &impl RecordStore,
) -> Result<HandlerResponse, BenchError> {
    let variant = context.config.variant;
    if let Some(requested) = event.variant {
        if requested != variant {
            return Err(BenchError::InvocationFailed {
                variant: requested,
                message: format!("handler is configured for variant {variant}"),
            });
        }
    }

    let started_at = Instant::now();
    let key = context.keys.next_key();
    info!(
        component = "workload_handler",
        event = "invocation_started",
        instance = context.instance(),
        run_id = event.run_id.as_deref().unwrap_or_default(),
        sequence = event.sequence,
        variant = %variant,
        table = %context.config.table_name,
        key = %key,
    );

    match write_then_read(event, context, store, &key, started_at).await {
        Ok(result) => {
            info!(
                component = "workload_handler",
                event = "invocation_completed",
                variant = %variant,
                key = %key,
                write_duration_ms = result.write_duration_ms,
                read_duration_ms = result.read_duration_ms,
                total_duration_ms = result.total_duration_ms,
            );
            Ok(HandlerResponse {
                status: "ok".to_string(),
                key,
                result,
            })
        }
        Err(failure) => {
            error!(
                component = "workload_handler",
                event = "invocation_failed",
                variant = %variant,
                key = %key,
                duration_ms = duration_ms(started_at.elapsed()),
                error_code = failure.code(),
                error = %failure,
            );
            Err(failure)
        }
    }
}

async fn write_then_read(
    event: &HandlerEvent,
    context: &WorkloadContext,
    store: &impl RecordStore,
    key: &str,
    started_at: Instant,
) -> Result<InvocationResult, BenchError> {
    if event.inject_failure {
        return Err(BenchError::store_unavailable(
            StoreOperation::Write,
            key,
            "Injected store failure for verification",
        ));
    }

    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let record = BenchmarkRecord {
        key: key.to_string(),
        timestamp: timestamp.clone(),
        variant: context.config.variant,
        filler_payload: context.filler.clone(),
    };

    let store_timeout = Duration::from_millis(context.config.store_timeout_ms);

    let write_started = Instant::now();
    bounded(StoreOperation::Write, key, store_timeout, store.put(key, &record)).await?;
    let write_duration_ms = duration_ms(write_started.elapsed());

    let read_started = Instant::now();
    let fetched = bounded(StoreOperation::Read, key, store_timeout, store.get(key)).await?;
    let read_duration_ms = duration_ms(read_started.elapsed());

    let fetched = fetched.ok_or_else(|| {
        BenchError::store_unavailable(StoreOperation::Read, key, "record not found after write")
    })?;
    if fetched.key != record.key || fetched.filler_payload != record.filler_payload {
        return Err(BenchError::store_unavailable(
            StoreOperation::Read,
            key,
            "read-back record does not match written record",
        ));
    }

    Ok(InvocationResult {
        variant: context.config.variant,
        key: key.to_string(),
        write_duration_ms,
        read_duration_ms,
        total_duration_ms: duration_ms(started_at.elapsed()),
        round_trip_ms: None,
        timestamp,
    })
}

async fn bounded<T>(
    operation: StoreOperation,
    key: &str,
    limit: Duration,
    call: impl std::future::Future<Output = Result<T, StoreError>>,
) -> Result<T, BenchError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => {
            result.map_err(|error| BenchError::store_unavailable(operation, key, error.to_string()))
        }
        Err(_) => Err(BenchError::store_unavailable(
            operation,
            key,
            format!("timed out after {}ms", limit.as_millis()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::adapters::record_store::InMemoryRecordStore;

    use super::*;

    struct NotFoundStore;

    #[async_trait]
    impl RecordStore for NotFoundStore {
        async fn put(&self, _key: &str, _record: &BenchmarkRecord) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get(&self, _key: &str) -> Result<Option<BenchmarkRecord>, StoreError> {
            Ok(None)
        }
    }

    struct FailingWriteStore {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for FailingWriteStore {
        async fn put(&self, _key: &str, _record: &BenchmarkRecord) -> Result<(), StoreError> {
            Err(StoreError::Request("throttled".to_string()))
        }

        async fn get(&self, _key: &str) -> Result<Option<BenchmarkRecord>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    struct HangingStore {
        hang_on_write: bool,
        inner: InMemoryRecordStore,
    }

    #[async_trait]
    impl RecordStore for HangingStore {
        async fn put(&self, key: &str, record: &BenchmarkRecord) -> Result<(), StoreError> {
            if self.hang_on_write {
                std::future::pending::<()>().await;
            }
            self.inner.put(key, record).await
        }

        async fn get(&self, _key: &str) -> Result<Option<BenchmarkRecord>, StoreError> {
            std::future::pending().await
        }
    }

    struct CorruptingStore {
        inner: InMemoryRecordStore,
    }

    #[async_trait]
    impl RecordStore for CorruptingStore {
        async fn put(&self, key: &str, record: &BenchmarkRecord) -> Result<(), StoreError> {
            let mut corrupted = record.clone();
            corrupted.filler_payload.reverse();
            corrupted.filler_payload.push(0);
            self.inner.put(key, &corrupted).await
        }

        async fn get(&self, key: &str) -> Result<Option<BenchmarkRecord>, StoreError> {
            self.inner.get(key).await
        }
    }

    fn sample_context() -> WorkloadContext {
        WorkloadContext::new(WorkloadConfig {
            table_name: "bench-table".to_string(),
            variant: Variant::A,
            filler_bytes: 100,
            consistent_read: false,
            store_timeout_ms: 250,
        })
    }

    #[tokio::test]
    async fn written_record_reads_back_with_same_key_and_filler() {
        let store = InMemoryRecordStore::new();
        let context = sample_context();

        let response = handle_workload(&HandlerEvent::default(), &context, &store)
            .await
            .expect("workload should succeed");

        let stored = store
            .get(&response.key)
            .await
            .expect("get should succeed")
            .expect("record should exist");
        assert_eq!(stored.key, response.key);
        assert_eq!(stored.filler_payload, context.filler());
        assert_eq!(stored.filler_payload.len(), 100);
        assert_eq!(stored.variant, Variant::A);
        assert_eq!(response.status, "ok");
        assert_eq!(response.result.key, response.key);
        assert!(response.result.has_valid_durations());
        assert!(response.result.round_trip_ms.is_none());
    }

    #[tokio::test]
    async fn each_invocation_uses_a_new_key() {
        let store = InMemoryRecordStore::new();
        let context = sample_context();

        let first = handle_workload(&HandlerEvent::default(), &context, &store)
            .await
            .expect("workload should succeed");
        let second = handle_workload(&HandlerEvent::default(), &context, &store)
            .await
            .expect("workload should succeed");

        assert_ne!(first.key, second.key);
        assert!(first.key.starts_with(context.instance()));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn missing_read_back_is_store_unavailable() {
        let error = handle_workload(&HandlerEvent::default(), &sample_context(), &NotFoundStore)
            .await
            .expect_err("not-found read should fail");

        match error {
            BenchError::StoreUnavailable {
                operation, message, ..
            } => {
                assert_eq!(operation, StoreOperation::Read);
                assert_eq!(message, "record not found after write");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_failure_skips_read() {
        let store = FailingWriteStore {
            reads: AtomicUsize::new(0),
        };
        let error = handle_workload(&HandlerEvent::default(), &sample_context(), &store)
            .await
            .expect_err("write failure should fail");

        assert_eq!(error.code(), "store_unavailable");
        assert!(error.to_string().contains("throttled"));
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_write_is_store_unavailable() {
        let store = HangingStore {
            hang_on_write: true,
            inner: InMemoryRecordStore::new(),
        };
        let error = handle_workload(&HandlerEvent::default(), &sample_context(), &store)
            .await
            .expect_err("hung write should fail");

        match error {
            BenchError::StoreUnavailable {
                operation, message, ..
            } => {
                assert_eq!(operation, StoreOperation::Write);
                assert_eq!(message, "timed out after 250ms");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_read_is_store_unavailable() {
        let store = HangingStore {
            hang_on_write: false,
            inner: InMemoryRecordStore::new(),
        };
        let error = handle_workload(&HandlerEvent::default(), &sample_context(), &store)
            .await
            .expect_err("hung read should fail");

        match error {
            BenchError::StoreUnavailable { operation, .. } => {
                assert_eq!(operation, StoreOperation::Read);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.inner.len().await, 1);
    }

    #[tokio::test]
    async fn total_duration_covers_write_and_read() {
        let context = sample_context();
        let response = handle_workload(&HandlerEvent::default(), &context, &InMemoryRecordStore::new())
            .await
            .expect("workload should succeed");

        let result = response.result;
        assert!(result.total_duration_ms + 1e-6 >= result.write_duration_ms + result.read_duration_ms);
    }

    #[tokio::test]
    async fn mismatched_read_back_is_store_unavailable() {
        let store = CorruptingStore {
            inner: InMemoryRecordStore::new(),
        };
        let error = handle_workload(&HandlerEvent::default(), &sample_context(), &store)
            .await
            .expect_err("mismatched read should fail");

        assert!(error
            .to_string()
            .contains("read-back record does not match written record"));
    }

    #[tokio::test]
    async fn injected_failure_does_not_touch_store() {
        let store = InMemoryRecordStore::new();
        let event = HandlerEvent {
            inject_failure: true,
            ..HandlerEvent::default()
        };

        let error = handle_workload(&event, &sample_context(), &store)
            .await
            .expect_err("injected failure should fail");

        assert_eq!(error.code(), "store_unavailable");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn rejects_event_for_other_variant() {
        let store = InMemoryRecordStore::new();
        let event = HandlerEvent {
            variant: Some(Variant::B),
            ..HandlerEvent::default()
        };

        let error = handle_workload(&event, &sample_context(), &store)
            .await
            .expect_err("misrouted event should fail");

        assert_eq!(error.code(), "invocation_failed");
        assert!(store.is_empty().await);
    }
}
