//! A backend that replays pre-recorded responses.
//!
//! Used by tests across the workspace to drive the conversation engine
//! deterministically, and to observe exactly what was sent to the model.

use crate::backend::{LlmBackend, LlmProvider, LlmRequest, LlmResponse};
use crate::error::LlmError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A mock backend that returns queued responses in order.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    queue: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    /// Returned once the queue is drained. Without it, a drained queue fails.
    fallback: Option<LlmResponse>,
    delay: Option<Duration>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedBackend {
    /// Creates a backend that replays the given responses.
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = LlmResponse>) -> Self {
        Self {
            queue: Mutex::new(responses.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// Creates a backend that answers every request with the same response.
    #[must_use]
    pub fn always(response: LlmResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    /// Queues a failure after the responses already queued.
    #[must_use]
    pub fn then_fail(self, error: LlmError) -> Self {
        self.lock_queue().push_back(Err(error));
        self
    }

    /// Queues a response after the responses already queued.
    #[must_use]
    pub fn then_respond(self, response: LlmResponse) -> Self {
        self.lock_queue().push_back(Ok(response));
        self
    }

    /// Waits this long before answering each request.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<LlmResponse, LlmError>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.lock_queue().pop_front();
        match next {
            Some(result) => result,
            None => self.fallback.clone().ok_or_else(|| LlmError::RequestFailed {
                reason: "scripted backend has no more responses".to_string(),
            }),
        }
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Scripted
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatMessage;

    #[tokio::test]
    async fn replays_in_order_then_fails() {
        let backend = ScriptedBackend::new([LlmResponse::text("one"), LlmResponse::text("two")]);
        let request = LlmRequest::new(vec![ChatMessage::user("hi")]);

        assert_eq!(backend.generate(&request).await.unwrap().content, "one");
        assert_eq!(backend.generate(&request).await.unwrap().content, "two");
        assert!(backend.generate(&request).await.is_err());
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn always_repeats_fallback() {
        let backend = ScriptedBackend::always(LlmResponse::text("again"));
        let request = LlmRequest::default();

        for _ in 0..3 {
            assert_eq!(backend.generate(&request).await.unwrap().content, "again");
        }
    }

    #[tokio::test]
    async fn queued_failure_is_returned() {
        let backend = ScriptedBackend::new([]).then_fail(LlmError::Timeout);
        let err = backend.generate(&LlmRequest::default()).await.unwrap_err();
        assert_eq!(err, LlmError::Timeout);
    }
}
