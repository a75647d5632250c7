use async_trait::async_trait;

/// Synchronously invokes a deployed workload handler and returns its response body.
#[async_trait]
pub trait HandlerInvoker: Send + Sync {
    async fn invoke(&self, function_name: &str, payload: Vec<u8>) -> Result<Vec<u8>, String>;
}
