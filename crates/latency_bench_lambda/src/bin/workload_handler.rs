use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use latency_bench_core::contract::{BenchmarkRecord, HandlerEvent, HandlerResponse};
use latency_bench_lambda::adapters::record_store::{RecordStore, StoreError};
use latency_bench_lambda::config::{process_env, workload_config_from_env};
use latency_bench_lambda::handlers::workload::{handle_workload, WorkloadContext};
use latency_bench_lambda::telemetry::init_tracing;
use serde_json::Value;

const PARTITION_KEY: &str = "pk";
const TIMESTAMP_ATTRIBUTE: &str = "timestamp";
const VARIANT_ATTRIBUTE: &str = "variant";
const FILLER_ATTRIBUTE: &str = "filler";

struct DynamoDbRecordStore {
    table_name: String,
    consistent_read: bool,
    client: aws_sdk_dynamodb::Client,
}

#[async_trait]
impl RecordStore for DynamoDbRecordStore {
    async fn put(&self, key: &str, record: &BenchmarkRecord) -> Result<(), StoreError> {
        let mut item = record_to_item(record);
        item.insert(PARTITION_KEY.to_string(), AttributeValue::S(key.to_string()));

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map(|_| ())
            .map_err(|error| {
                StoreError::Request(format!(
                    "failed to put item into dynamodb: {}",
                    DisplayErrorContext(error)
                ))
            })
    }

    async fn get(&self, key: &str) -> Result<Option<BenchmarkRecord>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(PARTITION_KEY, AttributeValue::S(key.to_string()))
            .consistent_read(self.consistent_read)
            .send()
            .await
            .map_err(|error| {
                StoreError::Request(format!(
                    "failed to get item from dynamodb: {}",
                    DisplayErrorContext(error)
                ))
            })?;

        output.item().map(item_to_record).transpose()
    }
}

fn record_to_item(record: &BenchmarkRecord) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            PARTITION_KEY.to_string(),
            AttributeValue::S(record.key.clone()),
        ),
        (
            TIMESTAMP_ATTRIBUTE.to_string(),
            AttributeValue::S(record.timestamp.clone()),
        ),
        (
            VARIANT_ATTRIBUTE.to_string(),
            AttributeValue::S(record.variant.as_str().to_string()),
        ),
        (
            FILLER_ATTRIBUTE.to_string(),
            AttributeValue::B(Blob::new(record.filler_payload.clone())),
        ),
    ])
}

fn item_to_record(item: &HashMap<String, AttributeValue>) -> Result<BenchmarkRecord, StoreError> {
    let string_attribute = |name: &str| -> Result<String, StoreError> {
        item.get(name)
            .and_then(|value| value.as_s().ok())
            .cloned()
            .ok_or_else(|| StoreError::Malformed(format!("missing string attribute '{name}'")))
    };

    let variant = string_attribute(VARIANT_ATTRIBUTE)?
        .parse()
        .map_err(|error| StoreError::Malformed(format!("invalid variant attribute: {error}")))?;
    let filler_payload = item
        .get(FILLER_ATTRIBUTE)
        .and_then(|value| value.as_b().ok())
        .map(|blob| blob.as_ref().to_vec())
        .ok_or_else(|| {
            StoreError::Malformed(format!("missing binary attribute '{FILLER_ATTRIBUTE}'"))
        })?;

    Ok(BenchmarkRecord {
        key: string_attribute(PARTITION_KEY)?,
        timestamp: string_attribute(TIMESTAMP_ATTRIBUTE)?,
        variant,
        filler_payload,
    })
}

fn decode_event(payload: Value) -> Result<HandlerEvent, Error> {
    match payload {
        Value::Null => Ok(HandlerEvent::default()),
        other => serde_json::from_value(other)
            .map_err(|error| Error::from(format!("invalid handler event: {error}"))),
    }
}

async fn handle_request(
    event: LambdaEvent<Value>,
    context: &WorkloadContext,
    store: &DynamoDbRecordStore,
) -> Result<HandlerResponse, Error> {
    let handler_event = decode_event(event.payload)?;
    handle_workload(&handler_event, context, store)
        .await
        .map_err(|error| Error::from(format!("{}: {error}", error.code())))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = workload_config_from_env(process_env)?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = DynamoDbRecordStore {
        table_name: config.table_name.clone(),
        consistent_read: config.consistent_read,
        client: aws_sdk_dynamodb::Client::new(&aws_config),
    };
    let context = WorkloadContext::new(config);

    let context = &context;
    let store = &store;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(event, context, store).await
    }))
    .await
}

#[cfg(test)]
mod tests {
    use latency_bench_core::contract::Variant;
    use serde_json::json;

    use super::*;

    fn sample_record() -> BenchmarkRecord {
        BenchmarkRecord {
            key: "instance-000000000001".to_string(),
            timestamp: "2026-02-14T00:00:00.000Z".to_string(),
            variant: Variant::B,
            filler_payload: vec![0xde, 0xad, 0xbe, 0xef],
        }
    }

    #[test]
    fn record_item_reads_back_unchanged() {
        let record = sample_record();
        let item = record_to_item(&record);

        assert_eq!(
            item.get(PARTITION_KEY).and_then(|value| value.as_s().ok()),
            Some(&record.key)
        );
        assert_eq!(item_to_record(&item).expect("item should decode"), record);
    }

    #[test]
    fn rejects_item_without_filler() {
        let mut item = record_to_item(&sample_record());
        item.remove(FILLER_ATTRIBUTE);

        let error = item_to_record(&item).expect_err("missing filler should fail");
        assert_eq!(
            error,
            StoreError::Malformed("missing binary attribute 'filler'".to_string())
        );
    }

    #[test]
    fn rejects_item_with_unknown_variant() {
        let mut item = record_to_item(&sample_record());
        item.insert(
            VARIANT_ATTRIBUTE.to_string(),
            AttributeValue::S("c".to_string()),
        );

        let error = item_to_record(&item).expect_err("unknown variant should fail");
        assert!(error.to_string().contains("invalid variant attribute"));
    }

    #[test]
    fn null_event_decodes_to_default_trigger() {
        assert_eq!(
            decode_event(Value::Null).expect("event should decode"),
            HandlerEvent::default()
        );
    }

    #[test]
    fn driver_event_decodes_with_sequence() {
        let event = decode_event(json!({
            "run_id": "run-1",
            "variant": "a",
            "sequence": 4,
            "inject_failure": false
        }))
        .expect("event should decode");

        assert_eq!(event.sequence, Some(4));
        assert_eq!(event.variant, Some(Variant::A));
    }

    #[test]
    fn rejects_non_object_event() {
        let error = decode_event(json!("ping")).expect_err("string event should fail");
        assert!(error.to_string().contains("invalid handler event"));
    }
}
