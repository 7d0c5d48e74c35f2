//! The page agent: runs inside the page, executes one command per request.
pub mod document;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::{AgentChannel, Envelope, PageCommand, PageResponse};

pub use document::{DomEvent, EventKind, HtmlPage};

/// Handle to an element of the live document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector: {0}")]
pub struct InvalidSelector(pub String);

/// The document operations the page agent needs
pub trait Dom: Send {
    /// Text a reader would see, script and style content excluded
    fn visible_text(&self) -> String;

    /// Serialized markup of the whole document
    fn outer_html(&self) -> String;

    /// First element matching the CSS selector, in document order
    fn query_selector(&self, selector: &str) -> Result<Option<ElementId>, InvalidSelector>;

    fn click(&mut self, element: ElementId);

    fn set_value(&mut self, element: ElementId, value: &str);

    fn dispatch_event(&mut self, element: ElementId, kind: EventKind);

    /// Go back one history entry, false when there is none
    fn history_back(&mut self) -> bool;

    fn navigate(&mut self, url: &str) -> Result<(), String>;
}

pub struct PageAgent<D: Dom> {
    dom: D,
}

impl<D: Dom> PageAgent<D> {
    pub fn new(dom: D) -> Self {
        Self { dom }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    /// Execute one command against the page
    pub fn handle(&mut self, command: PageCommand) -> PageResponse {
        debug!(command = command.name(), "page agent handling command");
        match command {
            PageCommand::ReadContent => PageResponse::ok().with_content(self.dom.visible_text()),
            PageCommand::GetHtml => PageResponse::ok().with_content(self.dom.outer_html()),
            PageCommand::ClickElement { selector } => match self.resolve(&selector) {
                Ok(element) => {
                    self.dom.click(element);
                    PageResponse::ok().with_message(format!("Clicked element {}", selector))
                }
                Err(response) => response,
            },
            PageCommand::InputText { selector, text } => match self.resolve(&selector) {
                Ok(element) => {
                    self.dom.set_value(element, &text);
                    self.dom.dispatch_event(element, EventKind::Input);
                    self.dom.dispatch_event(element, EventKind::Change);
                    PageResponse::ok().with_message(format!("Input text into {}", selector))
                }
                Err(response) => response,
            },
            PageCommand::GoBack => {
                if self.dom.history_back() {
                    PageResponse::ok()
                } else {
                    PageResponse::failure("no history")
                }
            }
            PageCommand::NavigateToUrl { url } => match self.dom.navigate(&url) {
                Ok(()) => PageResponse::ok().with_message(format!("Navigating to {}", url)),
                Err(error) => PageResponse::failure(error),
            },
        }
    }

    /// Handle a raw request. Unrecognized requests get no reply.
    pub fn handle_wire(&mut self, request: Value) -> Option<Value> {
        let command = match PageCommand::from_wire(request) {
            Ok(command) => command,
            Err(e) => {
                debug!(error = %e, "ignoring unrecognized page request");
                return None;
            }
        };
        serde_json::to_value(self.handle(command)).ok()
    }

    fn resolve(&self, selector: &str) -> Result<ElementId, PageResponse> {
        match self.dom.query_selector(selector) {
            Ok(Some(element)) => Ok(element),
            Ok(None) => Err(PageResponse::failure("not found")),
            Err(e) => Err(PageResponse::failure(e.to_string())),
        }
    }
}

/// Run a page agent on its own task and return the channel into it.
///
/// The task ends once every clone of the returned channel is dropped.
pub fn spawn_page_agent<D: Dom + 'static>(dom: D) -> AgentChannel {
    let (tx, mut rx) = mpsc::channel::<Envelope>(32);
    let mut agent = PageAgent::new(dom);
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            // Dropping the reply sender without sending is how "no reply" looks
            // to the other side.
            if let Some(reply) = agent.handle_wire(envelope.request) {
                if envelope.reply.send(reply).is_err() {
                    debug!("requester went away before the reply was sent");
                }
            }
        }
        debug!("page agent channel closed");
    });
    AgentChannel::new(tx)
}
