//! Folds a streaming model response into the assistant message it describes.
//!
//! The accumulator is a pure state machine: every fragment is applied in
//! arrival order and [`StreamAccumulator::render`] recomputes the content from
//! scratch, so the rendered message never depends on how the text was chunked.
use chrono::Utc;
use serde_json::{Map, Value};

use crate::models::content::{Content, ContentPart};
use crate::models::fragment::Fragment;
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::ToolCall;

#[derive(Debug, Clone, PartialEq)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments_so_far: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamAccumulator {
    created: i64,
    text: String,
    tool_calls: Vec<PendingToolCall>,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self {
            created: Utc::now().timestamp(),
            text: String::new(),
            tool_calls: Vec::new(),
        }
    }

    /// Apply one fragment. Returns false when the fragment was dropped.
    pub fn apply(&mut self, fragment: Fragment) -> bool {
        match fragment {
            Fragment::TextFragment { text } => {
                self.text.push_str(&text);
                true
            }
            Fragment::ToolCallFragment {
                id,
                name,
                arguments_so_far,
            } => {
                match self.tool_calls.iter_mut().find(|call| call.id == id) {
                    Some(existing) => {
                        existing.name = name;
                        existing.arguments_so_far = arguments_so_far;
                    }
                    None => self.tool_calls.push(PendingToolCall {
                        id,
                        name,
                        arguments_so_far,
                    }),
                }
                true
            }
            Fragment::Unknown => false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Content of the in-progress message
    pub fn render(&self) -> Content {
        if self.tool_calls.is_empty() {
            return Content::Text(self.text.clone());
        }
        let mut parts = Vec::with_capacity(self.tool_calls.len() + 1);
        if !self.text.is_empty() {
            parts.push(ContentPart::text(self.text.clone()));
        }
        parts.extend(
            self.tool_calls
                .iter()
                .map(|call| ContentPart::ToolCall(call.to_tool_call())),
        );
        Content::Parts(parts)
    }

    /// Snapshot of the in-progress assistant message
    pub fn to_message(&self) -> Message {
        Message {
            role: Role::Assistant,
            created: self.created,
            content: self.render(),
        }
    }

    pub fn into_message(self) -> Message {
        self.to_message()
    }

    /// Requested tool calls in first-seen order
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.tool_calls
            .iter()
            .map(PendingToolCall::to_tool_call)
            .collect()
    }
}

impl PendingToolCall {
    fn to_tool_call(&self) -> ToolCall {
        ToolCall::new(
            self.id.clone(),
            self.name.clone(),
            parse_arguments(&self.arguments_so_far),
        )
    }
}

/// Arguments text as JSON. Empty text is an empty object; text that does not
/// parse yet is kept as a raw string.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Fold a whole fragment sequence into one accumulator
pub fn reduce<I: IntoIterator<Item = Fragment>>(fragments: I) -> StreamAccumulator {
    let mut accumulator = StreamAccumulator::new();
    for fragment in fragments {
        accumulator.apply(fragment);
    }
    accumulator
}
