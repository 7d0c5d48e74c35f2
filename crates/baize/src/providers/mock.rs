use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream;
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::fragment::Fragment;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{FragmentStream, Provider};

/// One scripted model response
#[derive(Debug, Clone)]
pub enum MockResponse {
    Fragments(Vec<Fragment>),
    /// Yields the fragments, then fails
    FailsAfter(Vec<Fragment>, String),
    /// Fails before streaming anything
    Unavailable(String),
}

/// What the provider was asked for
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
}

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Responses made of fragments only
    pub fn with_fragments(responses: Vec<Vec<Fragment>>) -> Self {
        Self::new(responses.into_iter().map(MockResponse::Fragments).collect())
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<FragmentStream> {
        self.requests.lock().unwrap().push(MockRequest {
            system: system.to_string(),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });

        let mut responses = self.responses.lock().unwrap();
        let response = if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            MockResponse::Fragments(vec![Fragment::text("")])
        } else {
            responses.remove(0)
        };

        let items: Vec<Result<Fragment>> = match response {
            MockResponse::Fragments(fragments) => fragments.into_iter().map(Ok).collect(),
            MockResponse::FailsAfter(fragments, error) => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(anyhow!(error))))
                .collect(),
            MockResponse::Unavailable(error) => return Err(anyhow!(error)),
        };
        Ok(Box::pin(stream::iter(items)))
    }
}
