use serde::{Deserialize, Serialize};

use super::message::Message;
use super::role::Role;

/// The ordered conversation, append-only while a turn runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    ///
    /// A tool message none of whose results has a call waiting for it is a
    /// replay and is ignored, so a result can never resolve its call twice.
    /// Returns whether the message was appended.
    pub fn push(&mut self, message: Message) -> bool {
        if message.role == Role::Tool {
            let pending = self.pending_calls();
            let mut results = message.content.tool_results().peekable();
            if results.peek().is_some() && results.all(|r| !pending.contains(&r.id.as_str())) {
                tracing::debug!("ignoring replayed tool result message");
                return false;
            }
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Ids of tool calls that have no result yet, in the order they were requested
    pub fn unresolved_tool_calls(&self) -> Vec<String> {
        self.pending_calls()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn tool_call_count(&self) -> usize {
        self.messages
            .iter()
            .map(|m| m.content.tool_calls().count())
            .sum()
    }

    pub fn tool_result_count(&self) -> usize {
        self.messages
            .iter()
            .map(|m| m.content.tool_results().count())
            .sum()
    }

    /// Drop the most recent user message and everything after it, returning the
    /// number of messages removed
    pub fn rewind_last_turn(&mut self) -> usize {
        match self.messages.iter().rposition(|m| m.role == Role::User) {
            Some(start) => self.messages.drain(start..).count(),
            None => 0,
        }
    }

    /// Call ids still waiting for a result, in request order.
    ///
    /// Ids are only unique within one message, so a result resolves the most
    /// recent earlier call with its id that is still pending.
    fn pending_calls(&self) -> Vec<&str> {
        let mut pending: Vec<&str> = Vec::new();
        for message in &self.messages {
            for part in message.content.parts() {
                if let Some(call) = part.as_tool_call() {
                    pending.push(&call.id);
                } else if let Some(result) = part.as_tool_result() {
                    if let Some(at) = pending.iter().rposition(|id| *id == result.id) {
                        pending.remove(at);
                    }
                }
            }
        }
        pending
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transcript_with_call() -> Transcript {
        let mut transcript = Transcript::new();
        transcript.push(Message::user().with_text("click the login button"));
        transcript.push(
            Message::assistant()
                .with_tool_call("1", "click_element", json!({"selector": "#login"}))
                .with_tool_call("2", "read_page_content", json!({})),
        );
        transcript
    }

    #[test]
    fn test_unresolved_in_request_order() {
        let mut transcript = transcript_with_call();
        assert_eq!(transcript.unresolved_tool_calls(), vec!["1", "2"]);

        transcript.push(Message::tool().with_tool_result("2", "read_page_content", "text"));
        assert_eq!(transcript.unresolved_tool_calls(), vec!["1"]);
    }

    #[test]
    fn test_replayed_result_is_ignored() {
        let mut transcript = transcript_with_call();
        let result =
            Message::tool().with_tool_result("1", "click_element", "Error clicking element: not found");

        assert!(transcript.push(result.clone()));
        let unresolved = transcript.unresolved_tool_calls();
        let len = transcript.len();

        assert!(!transcript.push(result));
        assert_eq!(transcript.unresolved_tool_calls(), unresolved);
        assert_eq!(transcript.len(), len);
        assert_eq!(transcript.tool_result_count(), 1);
    }

    #[test]
    fn test_counts() {
        let mut transcript = transcript_with_call();
        transcript.push(Message::tool().with_tool_result("1", "click_element", "ok"));
        transcript.push(Message::tool().with_tool_result("2", "read_page_content", "ok"));
        assert_eq!(transcript.tool_call_count(), 2);
        assert_eq!(transcript.tool_result_count(), 2);
        assert!(transcript.unresolved_tool_calls().is_empty());
    }

    #[test]
    fn test_reused_call_id_in_later_round() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user().with_text("sign in"));
        transcript.push(Message::assistant().with_tool_call("1", "click_element", json!({"selector": "#login"})));
        assert!(transcript.push(Message::tool().with_tool_result("1", "click_element", "not found")));
        transcript.push(Message::assistant().with_tool_call("1", "read_page_content", json!({})));
        assert_eq!(transcript.unresolved_tool_calls(), vec!["1"]);

        assert!(transcript.push(Message::tool().with_tool_result("1", "read_page_content", "text")));
        assert!(transcript.unresolved_tool_calls().is_empty());
        assert_eq!(transcript.tool_call_count(), 2);
        assert_eq!(transcript.tool_result_count(), 2);

        // Both calls are resolved now, so a third result is a replay
        assert!(!transcript.push(Message::tool().with_tool_result("1", "read_page_content", "text")));
        assert_eq!(transcript.len(), 5);
    }

    #[test]
    fn test_rewind_last_turn() {
        let mut transcript = transcript_with_call();
        transcript.push(Message::tool().with_tool_result("1", "click_element", "ok"));
        transcript.push(Message::user().with_text("now read it"));
        transcript.push(Message::assistant().with_tool_call("3", "read_page_content", json!({})));

        assert_eq!(transcript.rewind_last_turn(), 2);
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.unresolved_tool_calls(), vec!["2"]);

        assert_eq!(transcript.rewind_last_turn(), 3);
        assert!(transcript.is_empty());
        assert_eq!(transcript.rewind_last_turn(), 0);
    }

    #[test]
    fn test_serializes_as_message_list() {
        let transcript = Transcript::from(vec![Message::user().with_text("hi")]);
        let value = serde_json::to_value(&transcript).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["content"], json!("hi"));
    }
}
