use futures::TryStreamExt;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use strum_macros::Display;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::config::{ConfigSnapshot, Language};
use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};
use crate::models::transcript::Transcript;
use crate::prompt_template::system_prompt;
use crate::providers::base::Provider;
use crate::reducer::StreamAccumulator;
use crate::tools::{PageTools, Target};

/// Result recorded for calls requested after the round limit
pub const ROUND_LIMIT_RESULT: &str = "Error: tool round limit reached, call not executed";

/// How a turn is run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnConfig {
    /// Tool dispatch cycles allowed in one turn
    pub max_rounds: usize,
    /// Run the calls of one round concurrently
    pub concurrent_tools: bool,
    /// Custom system prompt template, replacing the built-in ones
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            concurrent_tools: true,
            system_prompt_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TurnPhase {
    Idle,
    Streaming,
    ToolDispatch,
    Settled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TurnSummary {
    /// Tool dispatch cycles run
    pub rounds: usize,
    /// Tool calls executed
    pub tool_calls: usize,
    pub round_limit_reached: bool,
    pub model_error: bool,
}

/// Progress of a turn, in the order it happens
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// The in-progress assistant message after a fragment was applied
    Partial(Message),
    /// A message was appended to the transcript
    Appended(Message),
    Settled(TurnSummary),
}

struct Updates(Option<UnboundedSender<TurnEvent>>);

impl Updates {
    fn send(&self, event: TurnEvent) {
        if let Some(tx) = &self.0 {
            if tx.send(event).is_err() {
                debug!("turn update receiver dropped");
            }
        }
    }
}

/// Resets the phase when a turn ends, including when its future is dropped
struct TurnGuard<'a> {
    phase: &'a Mutex<TurnPhase>,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = TurnPhase::Idle;
    }
}

/// Agent integrates a foundational LLM with the page tools it can pilot
pub struct Agent {
    provider: Box<dyn Provider>,
    tools: PageTools,
    config: TurnConfig,
    phase: Mutex<TurnPhase>,
}

impl Agent {
    /// Create a new Agent with the specified provider
    pub fn new(provider: Box<dyn Provider>, tools: PageTools) -> Self {
        Self {
            provider,
            tools,
            config: TurnConfig::default(),
            phase: Mutex::new(TurnPhase::Idle),
        }
    }

    pub fn with_config(mut self, config: TurnConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    pub fn tools(&self) -> &PageTools {
        &self.tools
    }

    pub fn phase(&self) -> TurnPhase {
        *self.lock_phase()
    }

    /// Run one user turn to completion, appending every message to `transcript`.
    ///
    /// Progress is published on `updates` when given. Model failures end the
    /// turn with an assistant error message rather than an `Err`; once this
    /// returns every tool call in the transcript has a result. Dropping the
    /// future cancels the turn, leaving the messages appended so far.
    pub async fn reply(
        &self,
        transcript: &mut Transcript,
        snapshot: &ConfigSnapshot,
        user_text: &str,
        updates: Option<UnboundedSender<TurnEvent>>,
    ) -> AgentResult<TurnSummary> {
        let _guard = self.begin_turn()?;
        let updates = Updates(updates);
        let tools = self.tools.tools();
        let system = self.get_system_prompt(snapshot.language, &tools)?;

        self.append(transcript, Message::user().with_text(user_text), &updates);
        let target = self.tools.bridge().resolve_active_target().await;
        if let Err(e) = &target {
            warn!(error = %e, "no page to act on this turn");
        }

        let mut summary = TurnSummary::default();
        loop {
            self.set_phase(TurnPhase::Streaming);
            let message = match self.stream_response(&system, transcript, &tools, &updates).await {
                Ok(message) => message,
                Err(e) => {
                    let e = AgentError::Provider(e.to_string());
                    error!(error = %e, "model invocation failed");
                    let message = Message::assistant().with_text(format!("Error: {}", e));
                    self.append(transcript, message, &updates);
                    summary.model_error = true;
                    break;
                }
            };

            let calls: Vec<ToolCall> = message.tool_calls().into_iter().cloned().collect();
            if calls.is_empty() {
                self.append(transcript, message, &updates);
                break;
            }

            if summary.rounds >= self.config.max_rounds {
                warn!(
                    max_rounds = self.config.max_rounds,
                    skipped = calls.len(),
                    "tool round limit reached"
                );
                let results = vec![ROUND_LIMIT_RESULT.to_string(); calls.len()];
                self.append_round(transcript, message, &calls, results, &updates);
                summary.round_limit_reached = true;
                break;
            }

            // The round is appended only once every result is in, so a turn
            // dropped mid-dispatch leaves no call without its result.
            self.set_phase(TurnPhase::ToolDispatch);
            summary.rounds += 1;
            summary.tool_calls += calls.len();
            let results = self.dispatch(target.as_ref(), &calls).await;
            self.append_round(transcript, message, &calls, results, &updates);
        }

        self.set_phase(TurnPhase::Settled);
        debug!(?summary, "turn settled");
        updates.send(TurnEvent::Settled(summary));
        Ok(summary)
    }

    fn begin_turn(&self) -> AgentResult<TurnGuard<'_>> {
        let mut phase = self.lock_phase();
        if *phase != TurnPhase::Idle {
            return Err(AgentError::TurnInProgress);
        }
        *phase = TurnPhase::Streaming;
        Ok(TurnGuard { phase: &self.phase })
    }

    fn get_system_prompt(&self, language: Language, tools: &[Tool]) -> AgentResult<String> {
        system_prompt(language, tools, self.config.system_prompt_path.as_deref())
            .map_err(|e| AgentError::Internal(e.to_string()))
    }

    /// Reduce one model response into the assistant message it describes
    async fn stream_response(
        &self,
        system: &str,
        transcript: &Transcript,
        tools: &[Tool],
        updates: &Updates,
    ) -> anyhow::Result<Message> {
        let mut stream = self
            .provider
            .stream(system, transcript.messages(), tools)
            .await?;

        let mut accumulator = StreamAccumulator::new();
        while let Some(fragment) = stream.try_next().await? {
            if accumulator.apply(fragment) {
                updates.send(TurnEvent::Partial(accumulator.to_message()));
            } else {
                warn!("dropping unrecognized fragment");
            }
        }
        Ok(accumulator.into_message())
    }

    /// Run one round of calls, returning the results in call order
    async fn dispatch(&self, target: Target<'_>, calls: &[ToolCall]) -> Vec<String> {
        debug!(calls = calls.len(), concurrent = self.config.concurrent_tools, "dispatching tools");
        if self.config.concurrent_tools {
            let futures: Vec<_> = calls
                .iter()
                .map(|call| self.tools.execute(target, call))
                .collect();
            futures::future::join_all(futures).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.tools.execute(target, call).await);
            }
            results
        }
    }

    fn append(&self, transcript: &mut Transcript, message: Message, updates: &Updates) {
        if transcript.push(message.clone()) {
            updates.send(TurnEvent::Appended(message));
        }
    }

    /// Append an assistant message and one tool message per result, in call order
    fn append_round(
        &self,
        transcript: &mut Transcript,
        message: Message,
        calls: &[ToolCall],
        results: Vec<String>,
        updates: &Updates,
    ) {
        self.append(transcript, message, updates);
        for (call, result) in calls.iter().zip(results) {
            let message = Message::tool().with_tool_result(&call.id, &call.name, result);
            self.append(transcript, message, updates);
        }
    }

    fn set_phase(&self, phase: TurnPhase) {
        debug!(%phase, "turn phase");
        *self.lock_phase() = phase;
    }

    fn lock_phase(&self) -> MutexGuard<'_, TurnPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
