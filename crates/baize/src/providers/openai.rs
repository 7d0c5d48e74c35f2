use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::base::{FragmentStream, Provider};
use super::configs::OpenAiProviderConfig;
use super::utils::{messages_to_openai_spec, tools_to_openai_spec, ChunkDecoder, SseLines};
use crate::models::message::Message;
use crate::models::tool::Tool;

const DONE: &str = "[DONE]";

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiProviderConfig {
        &self.config
    }

    fn payload(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
            "stream": true,
        });

        if !tools.is_empty() {
            payload["tools"] = json!(tools_to_openai_spec(tools)?);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }
        Ok(payload)
    }

    async fn post(&self, payload: Value) -> Result<reqwest::Response> {
        let url = format!(
            "{}/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(anyhow!("Request failed: {}\n{}", status, body))
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<FragmentStream> {
        let payload = self.payload(system, messages, tools)?;
        debug!(model = %self.config.model, messages = messages.len(), "starting completion stream");
        let mut body = self.post(payload).await?.bytes_stream();

        Ok(Box::pin(async_stream::try_stream! {
            let mut lines = SseLines::new();
            let mut decoder = ChunkDecoder::new();
            let mut done = false;

            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                for data in lines.push(&chunk) {
                    if data == DONE {
                        done = true;
                        break;
                    }
                    let value: Value = serde_json::from_str(&data)?;
                    for fragment in decoder.decode(&value)? {
                        yield fragment;
                    }
                }
                if done {
                    break;
                }
            }

            if !done {
                if let Some(data) = lines.finish().filter(|data| data != DONE) {
                    let value: Value = serde_json::from_str(&data)?;
                    for fragment in decoder.decode(&value)? {
                        yield fragment;
                    }
                }
            }
        }))
    }
}
