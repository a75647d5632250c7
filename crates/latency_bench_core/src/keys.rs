//! Record key generation.
//!
//! Keys combine a random per-generator instance id with a monotonically
//! increasing sequence, so keys from one generator never repeat and keys from
//! different generators only collide if their UUIDs do.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

#[derive(Debug)]
pub struct RecordKeyGenerator {
    instance: String,
    sequence: AtomicU64,
}

impl RecordKeyGenerator {
    pub fn new() -> Self {
        Self::with_instance(Uuid::new_v4().simple().to_string())
    }

    pub fn with_instance(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn next_key(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{sequence:012}", self.instance)
    }
}

impl Default for RecordKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}
