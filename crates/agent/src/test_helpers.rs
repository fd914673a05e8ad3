//! Shared test helpers for reasoning loop tests.

use std::sync::Mutex;
use std::time::Duration;

use stepwise_core::error::ProviderError;
use stepwise_core::message::Message;
use stepwise_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// One scripted reply: how long the call takes and what it returns.
pub struct Scripted {
    pub delay: Duration,
    pub result: Result<String, ProviderError>,
}

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `complete` sleeps for the scripted delay (on the tokio
/// clock, so paused-time tests are deterministic) and returns the next
/// reply. Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Mutex<Vec<Scripted>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Scripted>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let (delay, result) = {
            let mut requests = self.requests.lock().unwrap();
            let mut replies = self.replies.lock().unwrap();
            let call = requests.len();
            if replies.is_empty() {
                panic!("ScriptedProvider: no more replies (call #{call})");
            }
            requests.push(request);
            let next = replies.remove(0);
            (next.delay, next.result)
        };

        tokio::time::sleep(delay).await;

        result.map(|text| ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

/// A well-formed step reply.
pub fn step_json(title: &str, next_action: &str) -> String {
    serde_json::json!({
        "title": title,
        "content": format!("Reasoning for {title}"),
        "next_action": next_action,
    })
    .to_string()
}

pub fn ok_after(ms: u64, text: impl Into<String>) -> Scripted {
    Scripted {
        delay: Duration::from_millis(ms),
        result: Ok(text.into()),
    }
}

pub fn err_after(ms: u64, err: ProviderError) -> Scripted {
    Scripted {
        delay: Duration::from_millis(ms),
        result: Err(err),
    }
}
