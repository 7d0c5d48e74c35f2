//! These models represent the objects passed around by the agent
//!
//! There are several related formats we need to interact with:
//! - transcript messages, shared with the chat interface and replayed to the model
//! - streaming fragments, produced by a provider while the model is responding
//! - openai messages/tools, sent from the agent to the LLM
//!
//! Messages use the structural shape of the chat interface: content is either a plain
//! string or an ordered list of parts tagged by `type`. Providers convert to and from
//! their own wire formats using the helpers in `providers::utils`.
pub mod content;
pub mod fragment;
pub mod message;
pub mod role;
pub mod tool;
pub mod transcript;
