use crate::contract::{InvocationResult, Variant};
use crate::error::BenchError;

/// Lifecycle of a single invocation: `Pending -> Succeeded | Failed | TimedOut`.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationState {
    Pending,
    Succeeded(InvocationResult),
    Failed(BenchError),
    TimedOut(BenchError),
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
            Self::TimedOut(_) => "timed_out",
        }
    }

    /// Routes an error to `TimedOut` or `Failed` by its kind.
    pub fn from_error(error: BenchError) -> Self {
        if error.is_timeout() {
            Self::TimedOut(error)
        } else {
            Self::Failed(error)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationOutcome {
    pub variant: Variant,
    pub sequence: usize,
    state: InvocationState,
}

impl InvocationOutcome {
    pub fn pending(variant: Variant, sequence: usize) -> Self {
        Self {
            variant,
            sequence,
            state: InvocationState::Pending,
        }
    }

    pub fn state(&self) -> &InvocationState {
        &self.state
    }

    /// Moves a pending invocation into a terminal state.
    ///
    /// Returns `false` and leaves the state untouched when the invocation has
    /// already resolved or `next` is not terminal.
    pub fn resolve(&mut self, next: InvocationState) -> bool {
        if self.state.is_terminal() || !next.is_terminal() {
            return false;
        }
        self.state = next;
        true
    }

    pub fn result(&self) -> Option<&InvocationResult> {
        match &self.state {
            InvocationState::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&BenchError> {
        match &self.state {
            InvocationState::Failed(error) | InvocationState::TimedOut(error) => Some(error),
            _ => None,
        }
    }
}
