use chrono::Utc;
use serde_json::Value;

use super::content::{Content, ContentPart};
use super::role::Role;
use super::tool::{ToolCall, ToolResult};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Content,
}

impl Message {
    pub fn new(role: Role, content: Content) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            content,
        }
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::new(Role::User, Content::default())
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::new(Role::Assistant, Content::default())
    }

    /// Create a new tool message with the current timestamp
    pub fn tool() -> Self {
        Self::new(Role::Tool, Content::default())
    }

    /// Add any ContentPart to the message
    pub fn with_part(mut self, part: ContentPart) -> Self {
        self.content.push(part);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_part(ContentPart::text(text))
    }

    /// Add a tool call to the message
    pub fn with_tool_call<I: Into<String>, N: Into<String>>(
        self,
        id: I,
        name: N,
        arguments: Value,
    ) -> Self {
        self.with_part(ContentPart::tool_call(id, name, arguments))
    }

    /// Add a tool result to the message
    pub fn with_tool_result<I, N, R>(self, id: I, name: N, result: R) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        R: Into<String>,
    {
        self.with_part(ContentPart::tool_result(id, name, result))
    }

    pub fn text(&self) -> String {
        self.content.text_content()
    }

    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.content.tool_calls().collect()
    }

    pub fn tool_results(&self) -> Vec<&ToolResult> {
        self.content.tool_results().collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.content.tool_calls().next().is_some()
    }
}
