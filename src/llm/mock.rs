use super::client::LLMClient;
use super::error::BackendError;
use super::types::{LLMRequest, LLMResponse, ToolCall};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Arc<dyn Fn(&LLMRequest) -> MockResponse + Send + Sync>;

/// Scripted inference client for tests.
///
/// Queued responses are served first, in order. Once the queue is empty the
/// optional responder closure answers; without one, the call fails.
pub struct MockLLMClient {
    responses: Mutex<VecDeque<MockResponse>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<LLMRequest>>,
    calls: AtomicUsize,
    name: String,
    delay: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub error: Option<BackendError>,
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            error: None,
        }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self::text(value.to_string())
    }

    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            error: None,
        }
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            content: String::new(),
            tool_calls: Vec::new(),
            error: Some(error),
        }
    }
}

impl MockLLMClient {
    pub fn new() -> Self {
        Self::with_name("MockLLM")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            name: name.into(),
            delay: None,
        }
    }

    /// Answer every request not covered by the queue with `responder`.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&LLMRequest) -> MockResponse + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Sleep before answering, to exercise timeouts and concurrency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn add_response(&self, response: MockResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.extend(responses);
        }
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Number of `chat` calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn get_commit_call(call_id: impl Into<String>, sha: impl Into<String>) -> ToolCall {
        ToolCall {
            call_id: call_id.into(),
            name: "get_commit".to_string(),
            arguments: serde_json::json!({ "sha": sha.into() }),
        }
    }

    pub fn list_batch_commits_call(call_id: impl Into<String>) -> ToolCall {
        ToolCall {
            call_id: call_id.into(),
            name: "list_batch_commits".to_string(),
            arguments: serde_json::json!({}),
        }
    }
}

impl Default for MockLLMClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .responses
            .lock()
            .map_err(|_| BackendError::Other {
                message: "MockLLMClient: queue poisoned".to_string(),
            })?
            .pop_front();

        let response = match (queued, &self.responder) {
            (Some(response), _) => response,
            (None, Some(responder)) => responder(&request),
            (None, None) => {
                return Err(BackendError::Other {
                    message: "MockLLMClient: No more responses in queue".to_string(),
                })
            }
        };

        if let Some(error) = response.error {
            return Err(error);
        }

        Ok(LLMResponse::with_tool_calls(
            response.content,
            response.tool_calls,
            Duration::from_millis(10),
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("mock/{}", self.name))
    }
}

impl std::fmt::Debug for MockLLMClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLLMClient")
            .field("name", &self.name)
            .field("remaining_responses", &self.remaining_responses())
            .field("calls", &self.call_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_basic() {
        let client = MockLLMClient::new();
        client.add_response(MockResponse::text("Hello!"));

        let response = client.chat(LLMRequest::new(vec![])).await.unwrap();

        assert_eq!(response.content, "Hello!");
        assert!(!response.has_tool_calls());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_client_with_tool_calls() {
        let client = MockLLMClient::new();

        let tool_call = MockLLMClient::get_commit_call("call_1", "abc123");
        client.add_response(MockResponse::with_tool_calls(
            "Let me look at that commit",
            vec![tool_call],
        ));

        let response = client.chat(LLMRequest::new(vec![])).await.unwrap();

        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].name, "get_commit");
    }

    #[tokio::test]
    async fn test_mock_client_error() {
        let client = MockLLMClient::new();
        client.add_response(MockResponse::error(BackendError::TimeoutError {
            seconds: 30,
        }));

        let result = client.chat(LLMRequest::new(vec![])).await;

        assert_eq!(result.unwrap_err(), BackendError::TimeoutError { seconds: 30 });
    }

    #[tokio::test]
    async fn test_mock_client_no_responses() {
        let client = MockLLMClient::new();

        let result = client.chat(LLMRequest::new(vec![])).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_queue_then_responder() {
        let client = MockLLMClient::new().with_responder(|_| MockResponse::text("fallback"));
        client.add_responses(vec![MockResponse::text("First"), MockResponse::text("Second")]);

        assert_eq!(client.remaining_responses(), 2);

        let r1 = client.chat(LLMRequest::new(vec![])).await.unwrap();
        let r2 = client.chat(LLMRequest::new(vec![])).await.unwrap();
        let r3 = client.chat(LLMRequest::new(vec![])).await.unwrap();

        assert_eq!(r1.content, "First");
        assert_eq!(r2.content, "Second");
        assert_eq!(r3.content, "fallback");
        assert_eq!(client.requests().len(), 3);
    }

    #[test]
    fn test_custom_name() {
        let client = MockLLMClient::with_name("TestClient");
        assert_eq!(client.name(), "TestClient");
    }
}
