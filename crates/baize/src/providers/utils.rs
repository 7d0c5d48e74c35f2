use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::models::content::{Content, ContentPart};
use crate::models::fragment::Fragment;
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::Tool;

/// Convert transcript messages to OpenAI's API message specification.
///
/// Assistant tool calls become `tool_calls`; every tool result becomes its own
/// `role: tool` message referencing the call id.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut converted = json!({
            "role": message.role
        });
        let mut text = Vec::new();
        let mut tool_calls = Vec::new();
        let mut output = Vec::new();

        match &message.content {
            Content::Text(plain) => text.push(plain.as_str()),
            Content::Parts(parts) => {
                for part in parts {
                    match part {
                        ContentPart::Text { text: t } => text.push(t.as_str()),
                        ContentPart::ToolCall(call) => tool_calls.push(json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": sanitize_function_name(&call.name),
                                "arguments": arguments_text(&call.arguments),
                            }
                        })),
                        ContentPart::ToolResult(result) => output.push(json!({
                            "role": "tool",
                            "content": result.result,
                            "tool_call_id": result.id,
                        })),
                    }
                }
            }
        }

        let text = text.join("\n");
        if !text.is_empty() {
            converted["content"] = json!(text);
        }
        if !tool_calls.is_empty() {
            converted["tool_calls"] = json!(tool_calls);
        }

        if message.role != Role::Tool
            && (converted.get("content").is_some() || converted.get("tool_calls").is_some())
        {
            output.insert(0, converted);
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Arguments as the JSON text the API expects. Arguments that never parsed are
/// already raw text.
fn arguments_text(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Convert tools to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": sanitize_function_name(&tool.name),
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

pub fn sanitize_function_name(name: &str) -> String {
    name.chars()
        .map(|c| if is_name_char(c) { c } else { '_' })
        .collect()
}

#[derive(Debug, Default)]
struct ToolCallDelta {
    id: String,
    name: String,
    arguments: String,
}

/// Turns chat completion chunks into fragments.
///
/// Tool call deltas arrive per index with the id and name only on the first
/// delta; each emitted fragment carries the arguments accumulated so far.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    tool_calls: Vec<ToolCallDelta>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &Value) -> Result<Vec<Fragment>> {
        if let Some(error) = chunk.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(anyhow!("API error: {}", message));
        }

        let mut fragments = Vec::new();
        let Some(delta) = chunk["choices"].get(0).and_then(|c| c.get("delta")) else {
            return Ok(fragments);
        };

        if let Some(text) = delta.get("content").and_then(Value::as_str) {
            if !text.is_empty() {
                fragments.push(Fragment::text(text));
            }
        }

        if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for tool_call in tool_calls {
                let index = tool_call
                    .get("index")
                    .and_then(Value::as_u64)
                    .map(|i| i as usize)
                    .unwrap_or(self.tool_calls.len());
                while self.tool_calls.len() <= index {
                    self.tool_calls.push(ToolCallDelta::default());
                }
                let state = &mut self.tool_calls[index];
                if let Some(id) = tool_call.get("id").and_then(Value::as_str) {
                    state.id = id.to_string();
                }
                if state.id.is_empty() {
                    state.id = format!("call_{}", index);
                }
                let function = &tool_call["function"];
                if let Some(name) = function.get("name").and_then(Value::as_str) {
                    state.name = name.to_string();
                }
                if let Some(arguments) = function.get("arguments").and_then(Value::as_str) {
                    state.arguments.push_str(arguments);
                }
                fragments.push(Fragment::tool_call(
                    state.id.clone(),
                    state.name.clone(),
                    state.arguments.clone(),
                ));
            }
        }

        Ok(fragments)
    }
}

/// Splits a server-sent event byte stream into `data:` payloads
#[derive(Debug, Default)]
pub struct SseLines {
    buffer: Vec<u8>,
}

impl SseLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning the payloads of the lines completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Payload of a trailing line without a newline
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let payload = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?;
    let payload = payload.trim();
    (!payload.is_empty()).then(|| payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_to_openai_spec() -> Result<()> {
        let message = Message::user().with_text("Hello");
        let spec = messages_to_openai_spec(&[message]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
        Ok(())
    }

    #[test]
    fn test_messages_to_openai_spec_tool_round() -> Result<()> {
        let messages = vec![
            Message::user().with_text("click the login button"),
            Message::assistant()
                .with_text("Clicking.")
                .with_tool_call("1", "click_element", json!({"selector": "#login"})),
            Message::tool().with_tool_result("1", "click_element", "Error clicking element: not found"),
            Message::assistant().with_text("There is no login button."),
        ];

        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 4);
        assert_eq!(spec[1]["role"], "assistant");
        assert_eq!(spec[1]["content"], "Clicking.");
        assert_eq!(spec[1]["tool_calls"][0]["id"], "1");
        assert_eq!(spec[1]["tool_calls"][0]["function"]["name"], "click_element");
        assert_eq!(
            spec[1]["tool_calls"][0]["function"]["arguments"],
            r##"{"selector":"#login"}"##
        );
        assert_eq!(spec[2]["role"], "tool");
        assert_eq!(spec[2]["tool_call_id"], "1");
        assert_eq!(spec[2]["content"], "Error clicking element: not found");
        assert_eq!(spec[3]["content"], "There is no login button.");
        Ok(())
    }

    #[test]
    fn test_messages_to_openai_spec_raw_arguments() {
        let messages = vec![Message::assistant().with_tool_call(
            "1",
            "input_text",
            json!(r#"{"selec"#),
        )];
        let spec = messages_to_openai_spec(&messages);
        assert_eq!(spec[0]["tool_calls"][0]["function"]["arguments"], r#"{"selec"#);
    }

    #[test]
    fn test_tools_to_openai_spec() -> Result<()> {
        let tool = Tool::new(
            "click_element",
            "Click an element",
            json!({
                "type": "object",
                "properties": {"selector": {"type": "string"}},
                "required": ["selector"]
            }),
        );

        let spec = tools_to_openai_spec(&[tool])?;

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "click_element");
        assert_eq!(spec[0]["function"]["parameters"]["required"], json!(["selector"]));
        Ok(())
    }

    #[test]
    fn test_tools_to_openai_spec_duplicate() {
        let tool = Tool::new("read_page_content", "Read", json!({"type": "object"}));
        let result = tools_to_openai_spec(&[tool.clone(), tool]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Duplicate tool name"));
    }

    #[test]
    fn test_sanitize_function_name() {
        assert_eq!(sanitize_function_name("hello-world"), "hello-world");
        assert_eq!(sanitize_function_name("hello world"), "hello_world");
        assert_eq!(sanitize_function_name("hello@world"), "hello_world");
    }

    #[test]
    fn test_decode_text_and_tool_call_deltas() -> Result<()> {
        let mut decoder = ChunkDecoder::new();
        let fragments = decoder.decode(&json!({
            "choices": [{"index": 0, "delta": {"role": "assistant", "content": "Let me look"}}]
        }))?;
        assert_eq!(fragments, vec![Fragment::text("Let me look")]);

        let fragments = decoder.decode(&json!({
            "choices": [{"index": 0, "delta": {"tool_calls": [{
                "index": 0,
                "id": "call_abc",
                "type": "function",
                "function": {"name": "click_element", "arguments": "{\"sel"}
            }]}}]
        }))?;
        assert_eq!(
            fragments,
            vec![Fragment::tool_call("call_abc", "click_element", "{\"sel")]
        );

        let fragments = decoder.decode(&json!({
            "choices": [{"index": 0, "delta": {"tool_calls": [{
                "index": 0,
                "function": {"arguments": "ector\":\"#a\"}"}
            }]}}]
        }))?;
        assert_eq!(
            fragments,
            vec![Fragment::tool_call(
                "call_abc",
                "click_element",
                "{\"selector\":\"#a\"}"
            )]
        );
        Ok(())
    }

    #[test]
    fn test_decode_missing_id_and_error() {
        let mut decoder = ChunkDecoder::new();
        let fragments = decoder
            .decode(&json!({
                "choices": [{"delta": {"tool_calls": [{
                    "index": 1,
                    "function": {"name": "navigate_back", "arguments": ""}
                }]}}]
            }))
            .unwrap();
        assert_eq!(fragments, vec![Fragment::tool_call("call_1", "navigate_back", "")]);

        let err = decoder
            .decode(&json!({"error": {"message": "quota exceeded"}}))
            .unwrap_err();
        assert_eq!(err.to_string(), "API error: quota exceeded");
    }

    #[test]
    fn test_sse_lines_split_across_chunks() {
        let mut lines = SseLines::new();
        assert!(lines.push(b"data: {\"a\"").is_empty());
        assert_eq!(lines.push(b":1}\r\n\r\n: keep-alive\n"), vec!["{\"a\":1}"]);
        assert_eq!(lines.push(b"data: [DONE]\n"), vec!["[DONE]"]);
        lines.push(b"data: tail");
        assert_eq!(lines.finish().as_deref(), Some("tail"));
        assert_eq!(lines.finish(), None);
    }
}
