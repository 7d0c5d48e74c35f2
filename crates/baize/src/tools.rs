//! The tool catalog the model acts on the page through.
//!
//! Each tool validates its arguments against its input schema, drives the page
//! through the [`CommandBridge`] and normalizes the outcome into text for the
//! model. Failures are reported as text too, so a tool result always exists.
use std::str::FromStr;

use jsonschema::{Draft, JSONSchema};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::debug;
use url::Url;

use crate::bridge::{BridgeError, CommandBridge, TargetHandle};
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};
use crate::protocol::{CommandResult, PageCommand};

/// The target a tool call acts on, resolved once per turn
pub type Target<'a> = Result<&'a TargetHandle, &'a BridgeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum PageTool {
    ReadPageContent,
    ClickElement,
    InputText,
    NavigateBack,
    NavigateToUrl,
    ReadPageHtml,
}

impl PageTool {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    fn definition(&self) -> Tool {
        match self {
            PageTool::ReadPageContent => Tool::new(
                self.name(),
                "Get the text content of the current active tab",
                empty_schema(),
            ),
            PageTool::ClickElement => Tool::new(
                self.name(),
                "Click an element on the current active tab by CSS selector",
                json!({
                    "type": "object",
                    "required": ["selector"],
                    "properties": {
                        "selector": {
                            "type": "string",
                            "minLength": 1,
                            "description": "The CSS selector of the element to click"
                        }
                    }
                }),
            ),
            PageTool::InputText => Tool::new(
                self.name(),
                "Input text into an element on the current active tab by CSS selector",
                json!({
                    "type": "object",
                    "required": ["selector", "text"],
                    "properties": {
                        "selector": {
                            "type": "string",
                            "minLength": 1,
                            "description": "The CSS selector of the element to input into"
                        },
                        "text": {
                            "type": "string",
                            "description": "The text to input into the element"
                        }
                    }
                }),
            ),
            PageTool::NavigateBack => Tool::new(
                self.name(),
                "Navigate back in the browser history of the current active tab",
                empty_schema(),
            ),
            PageTool::NavigateToUrl => Tool::new(
                self.name(),
                "Navigate the current active tab to a specified URL",
                json!({
                    "type": "object",
                    "required": ["url"],
                    "properties": {
                        "url": {
                            "type": "string",
                            "minLength": 1,
                            "description": "The absolute URL to navigate to"
                        }
                    }
                }),
            ),
            PageTool::ReadPageHtml => Tool::new(
                self.name(),
                "Get the HTML markup of the current active tab, useful to find CSS selectors",
                empty_schema(),
            ),
        }
    }
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

#[derive(Deserialize)]
struct SelectorArgs {
    selector: String,
}

#[derive(Deserialize)]
struct InputArgs {
    selector: String,
    text: String,
}

#[derive(Deserialize)]
struct UrlArgs {
    url: String,
}

struct Entry {
    kind: PageTool,
    tool: Tool,
    validator: JSONSchema,
}

pub struct PageTools {
    bridge: CommandBridge,
    entries: Vec<Entry>,
}

impl PageTools {
    /// The standard catalog, without `read_page_html`
    pub fn new(bridge: CommandBridge) -> AgentResult<Self> {
        let entries = PageTool::iter()
            .filter(|kind| *kind != PageTool::ReadPageHtml)
            .map(Entry::compile)
            .collect::<AgentResult<Vec<_>>>()?;
        Ok(Self { bridge, entries })
    }

    /// Also expose the raw page markup to the model
    pub fn with_html_tool(mut self) -> AgentResult<Self> {
        if self.entry(PageTool::ReadPageHtml.name()).is_none() {
            self.entries.push(Entry::compile(PageTool::ReadPageHtml)?);
        }
        Ok(self)
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.entries.iter().map(|e| e.tool.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.entry(name).map(|e| &e.tool)
    }

    pub fn bridge(&self) -> &CommandBridge {
        &self.bridge
    }

    /// Run a tool call and describe the outcome for the model. Never fails:
    /// unknown tools and invalid arguments are described as errors.
    pub async fn execute(&self, target: Target<'_>, call: &ToolCall) -> String {
        match self.call(target, call).await {
            Ok(text) => text,
            Err(e) => {
                debug!(tool = %call.name, error = %e, "tool call rejected");
                format!("Error: {}", e)
            }
        }
    }

    /// Validate and run a tool call. Page and transport failures are part of the
    /// returned text; only catalog-level problems are errors.
    pub async fn call(&self, target: Target<'_>, call: &ToolCall) -> AgentResult<String> {
        let entry = self
            .entry(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;
        entry.validate(&call.arguments)?;

        let text = match entry.kind {
            PageTool::ReadPageContent => match self.send(target, PageCommand::ReadContent).await {
                Ok(content) => format!("Content (page body):\n\n{}", content.unwrap_or_default()),
                Err(reason) => format!(
                    "Error reading page content: {}. Is the content script loaded?",
                    reason
                ),
            },
            PageTool::ReadPageHtml => match self.send(target, PageCommand::GetHtml).await {
                Ok(html) => format!("HTML (page document):\n\n{}", html.unwrap_or_default()),
                Err(reason) => format!(
                    "Error reading page HTML: {}. Is the content script loaded?",
                    reason
                ),
            },
            PageTool::ClickElement => {
                let SelectorArgs { selector } = entry.parse(&call.arguments)?;
                let command = PageCommand::ClickElement {
                    selector: selector.clone(),
                };
                match self.send(target, command).await {
                    Ok(_) => format!("Clicked element {} successfully.", selector),
                    Err(reason) => format!("Error clicking element: {}", reason),
                }
            }
            PageTool::InputText => {
                let InputArgs { selector, text } = entry.parse(&call.arguments)?;
                let command = PageCommand::InputText {
                    selector: selector.clone(),
                    text,
                };
                match self.send(target, command).await {
                    Ok(_) => format!("Input text into {} successfully.", selector),
                    Err(reason) => format!("Error inputting text: {}", reason),
                }
            }
            PageTool::NavigateBack => self.navigate_back(target).await,
            PageTool::NavigateToUrl => {
                let UrlArgs { url } = entry.parse(&call.arguments)?;
                Url::parse(&url).map_err(|e| AgentError::InvalidParameters {
                    tool: call.name.clone(),
                    detail: format!("\"{}\" is not an absolute URL: {}", url, e),
                })?;
                let command = PageCommand::NavigateToUrl { url: url.clone() };
                match self.send(target, command).await {
                    Ok(_) => format!("Navigating to {}...", url),
                    Err(reason) => format!("Error navigating to URL: {}", reason),
                }
            }
        };
        Ok(text)
    }

    /// Native history first, then the page agent. Only the fallback's outcome is
    /// reported.
    async fn navigate_back(&self, target: Target<'_>) -> String {
        if let Ok(handle) = target {
            match self.bridge.go_back_native(handle).await {
                Ok(()) => return "Navigated back successfully.".to_string(),
                Err(e) => debug!(error = %e, "native back navigation failed, asking the page"),
            }
        }
        match self.send(target, PageCommand::GoBack).await {
            Ok(_) => "Navigated back successfully.".to_string(),
            Err(reason) => format!("Error navigating back: {}", reason),
        }
    }

    /// Send a command, flattening transport and page failures into one reason
    async fn send(&self, target: Target<'_>, command: PageCommand) -> Result<Option<String>, String> {
        let target = target.map_err(|e| e.to_string())?;
        match self.bridge.send(target, command).await {
            Ok(CommandResult::Success { content, .. }) => Ok(content),
            Ok(CommandResult::Failure { error }) => Err(error),
            Err(e) => Err(e.to_string()),
        }
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        let kind = PageTool::from_str(name).ok()?;
        self.entries.iter().find(|e| e.kind == kind)
    }
}

impl Entry {
    fn compile(kind: PageTool) -> AgentResult<Self> {
        let tool = kind.definition();
        let validator = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&tool.input_schema)
            .map_err(|e| AgentError::Internal(format!("schema for {}: {}", kind, e)))?;
        Ok(Self {
            kind,
            tool,
            validator,
        })
    }

    fn validate(&self, arguments: &Value) -> AgentResult<()> {
        if let Err(errors) = self.validator.validate(arguments) {
            let detail = errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(self.invalid(detail));
        }
        Ok(())
    }

    fn parse<T: DeserializeOwned>(&self, arguments: &Value) -> AgentResult<T> {
        serde_json::from_value(arguments.clone()).map_err(|e| self.invalid(e.to_string()))
    }

    fn invalid(&self, detail: String) -> AgentError {
        AgentError::InvalidParameters {
            tool: self.tool.name.clone(),
            detail,
        }
    }
}
