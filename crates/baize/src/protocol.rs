//! Wire protocol between the coordinating side and the page agent.
//!
//! Requests and replies cross the boundary as JSON values. A request is
//! `{"type": "CLICK_ELEMENT", "payload": {"selector": "#login"}}`, a reply is
//! `{"success": false, "error": "not found"}` with absent fields omitted. Every
//! request gets at most one reply, carried on a one-shot channel.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::IntoStaticStr;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PageCommand {
    #[serde(alias = "read_content")]
    ReadContent,
    #[serde(alias = "get_html")]
    GetHtml,
    #[serde(alias = "click_element")]
    ClickElement { selector: String },
    #[serde(alias = "input_text")]
    InputText { selector: String, text: String },
    #[serde(alias = "go_back")]
    GoBack,
    #[serde(alias = "navigate_to_url")]
    NavigateToUrl { url: String },
}

const PAYLOAD_FIELDS: [&str; 3] = ["selector", "text", "url"];

impl PageCommand {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn to_wire(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Parse a request value.
    ///
    /// Accepts the legacy form too, where the command is named by `action` and the
    /// payload fields sit next to it: `{"action": "click_element", "selector": "#a"}`.
    pub fn from_wire(request: Value) -> serde_json::Result<Self> {
        let request = match request {
            Value::Object(mut fields) => {
                if !fields.contains_key("type") {
                    if let Some(action) = fields.remove("action") {
                        fields.insert("type".to_string(), action);
                    }
                }
                if !fields.contains_key("payload") {
                    let payload: Map<String, Value> = PAYLOAD_FIELDS
                        .iter()
                        .filter_map(|key| fields.remove(*key).map(|v| (key.to_string(), v)))
                        .collect();
                    if !payload.is_empty() {
                        fields.insert("payload".to_string(), Value::Object(payload));
                    }
                }
                Value::Object(fields)
            }
            other => other,
        };
        serde_json::from_value(request)
    }
}

/// A page agent reply as it appears on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResponse {
    pub fn ok() -> Self {
        Self {
            success: Some(true),
            ..Default::default()
        }
    }

    pub fn failure<S: Into<String>>(error: S) -> Self {
        Self {
            success: Some(false),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_content<S: Into<String>>(mut self, content: S) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Typed view of the reply. A reply without `success` counts as successful
    /// unless it carries an error.
    pub fn into_result(self) -> CommandResult {
        let success = self.success.unwrap_or(self.error.is_none());
        if success {
            CommandResult::Success {
                content: self.content,
                message: self.message,
            }
        } else {
            let error = self
                .error
                .or(self.message)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "unknown error".to_string());
            CommandResult::Failure { error }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Success {
        content: Option<String>,
        message: Option<String>,
    },
    Failure {
        error: String,
    },
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            CommandResult::Success { content, .. } => content.as_deref(),
            CommandResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CommandResult::Failure { error } => Some(error),
            CommandResult::Success { .. } => None,
        }
    }
}

/// A request in flight to a page agent
#[derive(Debug)]
pub struct Envelope {
    pub request: Value,
    pub reply: oneshot::Sender<Value>,
}

/// Sending half of the channel into a page agent
#[derive(Debug, Clone)]
pub struct AgentChannel {
    tx: mpsc::Sender<Envelope>,
}

#[derive(Debug, thiserror::Error)]
#[error("page agent channel closed")]
pub struct ChannelClosed;

impl AgentChannel {
    pub fn new(tx: mpsc::Sender<Envelope>) -> Self {
        Self { tx }
    }

    /// Deliver a request, returning the receiver for its single reply
    pub async fn request(&self, request: Value) -> Result<oneshot::Receiver<Value>, ChannelClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| ChannelClosed)?;
        Ok(rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
