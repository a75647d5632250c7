use crate::contract::{ValidationError, Variant};

/// Which half of the write-then-read cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Write,
    Read,
}

impl StoreOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Read => "read",
        }
    }
}

impl std::fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BenchError {
    #[error("record store unavailable during {operation} of key '{key}': {message}")]
    StoreUnavailable {
        operation: StoreOperation,
        key: String,
        message: String,
    },

    #[error("invocation of variant {variant} timed out after {timeout_ms}ms")]
    InvocationTimeout { variant: Variant, timeout_ms: u64 },

    #[error("run budget exhausted with {pending} invocation(s) pending")]
    DriverTimeout { pending: usize },

    #[error("invocation of variant {variant} failed: {message}")]
    InvocationFailed { variant: Variant, message: String },

    #[error("invalid benchmark configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("no successful invocations out of {attempted} attempted")]
    NoSuccessfulInvocations { attempted: usize },
}

impl BenchError {
    /// Stable machine-readable code used in logs and handler error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::InvocationTimeout { .. } => "invocation_timeout",
            Self::DriverTimeout { .. } => "driver_timeout",
            Self::InvocationFailed { .. } => "invocation_failed",
            Self::Validation(_) => "validation_error",
            Self::NoSuccessfulInvocations { .. } => "no_successful_invocations",
        }
    }

    /// Timeouts are tallied separately from other failures in aggregate reports.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::InvocationTimeout { .. } | Self::DriverTimeout { .. }
        )
    }

    pub fn store_unavailable(
        operation: StoreOperation,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::StoreUnavailable {
            operation,
            key: key.into(),
            message: message.into(),
        }
    }
}
