use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tool::{ToolCall, ToolResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
/// One element of structured message content
pub enum ContentPart {
    Text { text: String },
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

impl ContentPart {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn tool_call<I: Into<String>, N: Into<String>>(id: I, name: N, arguments: Value) -> Self {
        ContentPart::ToolCall(ToolCall::new(id, name, arguments))
    }

    pub fn tool_result<I, N, R>(id: I, name: N, result: R) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        R: Into<String>,
    {
        ContentPart::ToolResult(ToolResult::new(id, name, result))
    }

    /// Get the text if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        if let ContentPart::ToolCall(ref call) = self {
            Some(call)
        } else {
            None
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        if let ContentPart::ToolResult(ref result) = self {
            Some(result)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
/// Message content: a plain string, or an ordered list of parts
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl Content {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Content::Text(text.into())
    }

    /// Get the plain text if this content is not structured
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Parts(_) => None,
        }
    }

    /// The structured parts, empty for plain text content
    pub fn parts(&self) -> &[ContentPart] {
        match self {
            Content::Text(_) => &[],
            Content::Parts(parts) => parts,
        }
    }

    /// All text of the content, text parts joined with newlines
    pub fn text_content(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Append a part. Text-only content stays a plain string until a
    /// second part or a non-text part arrives.
    pub fn push(&mut self, part: ContentPart) {
        match self {
            Content::Parts(parts) => parts.push(part),
            Content::Text(existing) => match part {
                ContentPart::Text { text } if existing.is_empty() => *existing = text,
                part => {
                    let mut parts = Vec::with_capacity(2);
                    if !existing.is_empty() {
                        parts.push(ContentPart::text(std::mem::take(existing)));
                    }
                    parts.push(part);
                    *self = Content::Parts(parts);
                }
            },
        }
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.parts().iter().filter_map(ContentPart::as_tool_call)
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.parts().iter().filter_map(ContentPart::as_tool_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_text_keeps_plain_string() {
        let mut content = Content::default();
        content.push(ContentPart::text("hello"));
        assert_eq!(content, Content::text("hello"));
    }

    #[test]
    fn test_push_tool_call_promotes_to_parts() {
        let mut content = Content::text("Looking");
        content.push(ContentPart::tool_call("1", "click_element", json!({"selector": "#a"})));
        assert_eq!(
            content,
            Content::Parts(vec![
                ContentPart::text("Looking"),
                ContentPart::tool_call("1", "click_element", json!({"selector": "#a"})),
            ])
        );
    }

    #[test]
    fn test_push_onto_empty_text_drops_empty_text_part() {
        let mut content = Content::default();
        content.push(ContentPart::tool_call("1", "navigate_back", json!({})));
        assert_eq!(content.parts().len(), 1);
        assert!(content.parts()[0].as_tool_call().is_some());
    }

    #[test]
    fn test_serialization_shape() {
        let plain = serde_json::to_value(Content::text("hi")).unwrap();
        assert_eq!(plain, json!("hi"));

        let parts = Content::Parts(vec![
            ContentPart::text("a"),
            ContentPart::tool_call("1", "input_text", json!({"selector": "#q", "text": "x"})),
            ContentPart::tool_result("1", "input_text", "ok"),
        ]);
        let value = serde_json::to_value(&parts).unwrap();
        assert_eq!(
            value,
            json!([
                {"type": "text", "text": "a"},
                {"type": "tool-call", "id": "1", "name": "input_text", "arguments": {"selector": "#q", "text": "x"}},
                {"type": "tool-result", "id": "1", "name": "input_text", "result": "ok"}
            ])
        );
        let back: Content = serde_json::from_value(value).unwrap();
        assert_eq!(back, parts);
    }

    #[test]
    fn test_text_content_joins_text_parts() {
        let content = Content::Parts(vec![
            ContentPart::text("one"),
            ContentPart::tool_call("1", "read_page_content", json!({})),
            ContentPart::text("two"),
        ]);
        assert_eq!(content.text_content(), "one\ntwo");
        assert_eq!(content.tool_calls().count(), 1);
        assert_eq!(content.tool_results().count(), 0);
    }
}
