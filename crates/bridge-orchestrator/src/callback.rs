//! Adapter from result-returning operations to the host's success/failure sink.

use std::future::Future;

use tracing::error;

use crate::error::{OrchestratorError, OrchestratorResult};

type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
type FailureFn = Box<dyn FnOnce(OrchestratorError) + Send>;

/// One-shot result sink.
pub struct Callback<T> {
    on_success: SuccessFn<T>,
    on_failure: FailureFn,
}

impl<T> Callback<T> {
    pub fn new(
        on_success: impl FnOnce(T) + Send + 'static,
        on_failure: impl FnOnce(OrchestratorError) + Send + 'static,
    ) -> Self {
        Self {
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        }
    }

    pub fn complete(self, result: OrchestratorResult<T>) {
        match result {
            Ok(value) => (self.on_success)(value),
            Err(e) => {
                error!(error = %e, "orchestrator operation failed");
                (self.on_failure)(e)
            }
        }
    }
}

/// Await `operation` and hand its result to `callback`.
pub async fn with_callback<T, Fut>(operation: Fut, callback: Callback<T>)
where
    Fut: Future<Output = OrchestratorResult<T>>,
{
    callback.complete(operation.await);
}
