use std::io::{self, Write};

use anyhow::Result;
use baize::agent::{Agent, TurnEvent, TurnSummary};
use baize::config::ConfigSnapshot;
use baize::models::content::ContentPart;
use baize::models::message::Message;
use baize::models::role::Role;
use baize::models::tool::ToolCall;
use baize::models::transcript::Transcript;
use bat::WrappingMode;
use cliclack::{input, spinner, ProgressBar};
use console::style;
use serde_json::Value;
use tokio::sync::mpsc;

const THEME: &str = "zenburn";
const MAX_STRING_LENGTH: usize = 40;
const INDENT: &str = "    ";

/// A conversation about the page open in the browser
pub struct Session {
    agent: Agent,
    snapshot: ConfigSnapshot,
    transcript: Transcript,
}

impl Session {
    pub fn new(agent: Agent, snapshot: ConfigSnapshot) -> Self {
        Session {
            agent,
            snapshot,
            transcript: Transcript::new(),
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        println!(
            "baize {}",
            style("- type \"exit\" to end the session, ctrl-c interrupts a reply").dim()
        );
        println!();

        loop {
            let message_text: String = match input("Message:")
                .placeholder("")
                .multiline()
                .interact()
            {
                Ok(text) => text,
                // Interrupted or closed input
                Err(_) => break,
            };
            let message_text = message_text.trim();
            if message_text.is_empty() {
                continue;
            }
            if message_text.eq_ignore_ascii_case("exit") || message_text.eq_ignore_ascii_case("/exit")
            {
                break;
            }

            self.process(message_text).await?;
            println!();
        }
        Ok(())
    }

    /// Run a single turn
    pub async fn headless_start(&mut self, message: &str) -> Result<()> {
        self.process(message).await
    }

    async fn process(&mut self, text: &str) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut busy = Busy::start();

        let outcome = {
            let reply = self
                .agent
                .reply(&mut self.transcript, &self.snapshot, text, Some(tx));
            tokio::pin!(reply);

            loop {
                tokio::select! {
                    result = &mut reply => break Some(result),
                    Some(event) = rx.recv() => render_event(&event, &mut busy),
                    _ = tokio::signal::ctrl_c() => break None,
                }
            }
        };
        // Events published right before the turn ended
        while let Ok(event) = rx.try_recv() {
            render_event(&event, &mut busy);
        }
        busy.stop();

        match outcome {
            Some(result) => {
                result?;
            }
            None => {
                // Forget the interrupted request and whatever part of it was answered
                self.transcript.rewind_last_turn();
                print_markdown(
                    " Interrupt: Resetting conversation to before the last sent message...\n",
                );
            }
        }
        io::stdout().flush()?;
        Ok(())
    }
}

/// The spinner shown while the model or a tool is working
struct Busy(Option<ProgressBar>);

impl Busy {
    fn start() -> Self {
        let bar = spinner();
        bar.start("awaiting reply");
        Busy(Some(bar))
    }

    fn stop(&mut self) {
        if let Some(bar) = self.0.take() {
            bar.stop("");
        }
    }
}

fn render_event(event: &TurnEvent, busy: &mut Busy) {
    match event {
        TurnEvent::Partial(_) => {}
        TurnEvent::Appended(message) => {
            if message.role == Role::User {
                return;
            }
            busy.stop();
            render_message(message);
            *busy = Busy::start();
        }
        TurnEvent::Settled(summary) => {
            busy.stop();
            render_summary(summary);
        }
    }
}

fn render_message(message: &Message) {
    for part in message.content.parts() {
        match part {
            ContentPart::Text { text } if !text.trim().is_empty() => print_markdown(text),
            ContentPart::Text { .. } => {}
            ContentPart::ToolCall(call) => render_tool_call(call),
            ContentPart::ToolResult(result) => print_markdown(&result.result),
        }
    }
    if let Some(text) = message.content.as_text() {
        if !text.trim().is_empty() {
            print_markdown(text);
        }
    }
}

fn render_tool_call(call: &ToolCall) {
    println!();
    println!(
        "─── {} ──────────────────────────",
        style(&call.name).magenta().dim()
    );
    print_params(&call.arguments, 0);
}

fn render_summary(summary: &TurnSummary) {
    if summary.round_limit_reached {
        println!("{}", style("stopped at the tool round limit").yellow());
    }
    if summary.tool_calls > 0 {
        println!(
            "{}",
            style(format!(
                "{} tool call(s) in {} round(s)",
                summary.tool_calls, summary.rounds
            ))
            .dim()
        );
    }
}

fn print_markdown(content: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(THEME)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if printed.is_err() {
        println!("{}", content);
    }
}

/// Print tool arguments with indentation and colors
fn print_params(value: &Value, depth: usize) {
    let indent = INDENT.repeat(depth);

    match value {
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::Object(_) | Value::Array(_) => {
                        println!("{}{}:", indent, style(key).dim());
                        print_params(val, depth + 1);
                    }
                    Value::String(s) if s.len() > MAX_STRING_LENGTH => {
                        println!("{}{}: {}", indent, style(key).dim(), style("...").dim());
                    }
                    Value::String(s) => {
                        println!("{}{}: {}", indent, style(key).dim(), style(s).green());
                    }
                    other => {
                        println!("{}{}: {}", indent, style(key).dim(), style(other).blue());
                    }
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("{}{}.", indent, i + 1);
                print_params(item, depth + 1);
            }
        }
        // Arguments that never became valid JSON
        Value::String(s) => println!("{}{}", indent, style(s).yellow()),
        other => println!("{}{}", indent, style(other).yellow()),
    }
}
