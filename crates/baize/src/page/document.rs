use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scraper::{ElementRef, Html, Selector};
use strum_macros::Display;
use tracing::debug;
use url::Url;

use super::{Dom, ElementId, InvalidSelector};

const EMPTY_DOCUMENT: &str = "<html><head></head><body></body></html>";
const HIDDEN_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "head"];

/// Elements that start and end a line of rendered text
const BLOCK_TAGS: [&str; 33] = [
    "address", "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Click,
    Input,
    Change,
}

/// A notification dispatched on an element, e.g. `input#user` / `change`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub target: String,
    pub kind: EventKind,
}

impl DomEvent {
    pub fn new<S: Into<String>>(target: S, kind: EventKind) -> Self {
        Self {
            target: target.into(),
            kind,
        }
    }
}

struct Snapshot {
    url: Option<Url>,
    source: String,
}

#[derive(Default)]
struct PageState {
    url: Option<Url>,
    source: String,
    site: HashMap<String, String>,
    values: HashMap<usize, String>,
    events: Vec<DomEvent>,
    back: Vec<Snapshot>,
}

/// An in-memory page backed by HTML source.
///
/// `scraper::Html` is not `Send`, so the document is parsed again for every
/// operation. Element ids are node positions, which are stable across parses of
/// the same source. Clones share the same page.
#[derive(Clone, Default)]
pub struct HtmlPage {
    state: Arc<Mutex<PageState>>,
}

impl HtmlPage {
    pub fn new<S: Into<String>>(source: S) -> Self {
        let state = PageState {
            source: source.into(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_url(self, url: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(url)?;
        self.state().url = Some(url);
        Ok(self)
    }

    /// Register a page that navigation to `url` will load
    pub fn with_site_page<U: AsRef<str>, S: Into<String>>(self, url: U, source: S) -> Self {
        let key = site_key(url.as_ref());
        self.state().site.insert(key, source.into());
        self
    }

    pub fn url(&self) -> Option<Url> {
        self.state().url.clone()
    }

    pub fn source(&self) -> String {
        self.state().source.clone()
    }

    /// Events dispatched so far, oldest first
    pub fn events(&self) -> Vec<DomEvent> {
        self.state().events.clone()
    }

    /// Current value of the first element matching `selector`
    pub fn value_of(&self, selector: &str) -> Option<String> {
        let element = self.query_selector(selector).ok()??;
        self.state().values.get(&element.0).cloned()
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PageState {
    fn describe(&self, element: ElementId) -> Option<(String, Option<String>)> {
        let html = Html::parse_document(&self.source);
        let node = html.tree.nodes().nth(element.0)?;
        let element = ElementRef::wrap(node)?;
        let value = element.value();
        let description = match (value.id(), value.classes().next()) {
            (Some(id), _) => format!("{}#{}", value.name(), id),
            (None, Some(class)) => format!("{}.{}", value.name(), class),
            (None, None) => value.name().to_string(),
        };
        let href = (value.name() == "a")
            .then(|| value.attr("href").map(str::to_string))
            .flatten();
        Some((description, href))
    }

    fn navigate(&mut self, url: &str) -> Result<(), String> {
        let resolved = match Url::parse(url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .url
                .as_ref()
                .and_then(|base| base.join(url).ok())
                .ok_or_else(|| format!("invalid URL: {}", url))?,
            Err(e) => return Err(format!("invalid URL {}: {}", url, e)),
        };
        let source = self
            .site
            .get(resolved.as_str())
            .cloned()
            .unwrap_or_else(|| EMPTY_DOCUMENT.to_string());
        debug!(url = %resolved, "page navigating");
        let previous = Snapshot {
            url: self.url.replace(resolved),
            source: std::mem::replace(&mut self.source, source),
        };
        self.back.push(previous);
        self.values.clear();
        Ok(())
    }
}

/// Rendered text of an element: source whitespace becomes spaces, block
/// boundaries and `<br>` become line breaks
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if HIDDEN_TAGS.contains(&name) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
        } else if let Some(child) = ElementRef::wrap(child) {
            collect_text(child, out);
        }
    }
    if block {
        out.push('\n');
    }
}

impl Dom for HtmlPage {
    fn visible_text(&self) -> String {
        let html = Html::parse_document(&self.state().source);
        let Some(body) = html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "body")
        else {
            return String::new();
        };

        let mut raw = String::new();
        collect_text(body, &mut raw);
        raw.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn outer_html(&self) -> String {
        Html::parse_document(&self.state().source).root_element().html()
    }

    fn query_selector(&self, selector: &str) -> Result<Option<ElementId>, InvalidSelector> {
        let parsed = Selector::parse(selector).map_err(|_| InvalidSelector(selector.to_string()))?;
        let html = Html::parse_document(&self.state().source);
        let Some(first) = html.select(&parsed).next() else {
            return Ok(None);
        };
        Ok(html
            .tree
            .nodes()
            .position(|node| node.id() == first.id())
            .map(ElementId))
    }

    fn click(&mut self, element: ElementId) {
        let mut state = self.state();
        let Some((target, href)) = state.describe(element) else {
            return;
        };
        state.events.push(DomEvent::new(target, EventKind::Click));
        if let Some(href) = href {
            if let Err(e) = state.navigate(&href) {
                debug!(error = %e, "link click did not navigate");
            }
        }
    }

    fn set_value(&mut self, element: ElementId, value: &str) {
        self.state().values.insert(element.0, value.to_string());
    }

    fn dispatch_event(&mut self, element: ElementId, kind: EventKind) {
        let mut state = self.state();
        if let Some((target, _)) = state.describe(element) {
            state.events.push(DomEvent::new(target, kind));
        }
    }

    fn history_back(&mut self) -> bool {
        let mut state = self.state();
        let Some(previous) = state.back.pop() else {
            return false;
        };
        state.url = previous.url;
        state.source = previous.source;
        state.values.clear();
        true
    }

    fn navigate(&mut self, url: &str) -> Result<(), String> {
        self.state().navigate(url)
    }
}

fn site_key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_selector_document_order() {
        let page = HtmlPage::new(r#"<body><p class="x" id="a">A</p><p class="x" id="b">B</p></body>"#);
        let first = page.query_selector(".x").unwrap().unwrap();
        let by_id = page.query_selector("#a").unwrap().unwrap();
        assert_eq!(first, by_id);
        assert!(page.query_selector("#missing").unwrap().is_none());
        assert!(page.query_selector("p[").is_err());
    }

    #[test]
    fn test_link_click_navigates() {
        let mut page = HtmlPage::new(r#"<body><a id="next" href="/two">Next</a></body>"#)
            .with_url("https://example.com/one")
            .unwrap()
            .with_site_page("https://example.com/two", "<body>Two</body>");
        let link = page.query_selector("#next").unwrap().unwrap();
        page.click(link);

        assert_eq!(page.url().unwrap().as_str(), "https://example.com/two");
        assert_eq!(page.visible_text(), "Two");
        assert!(page.history_back());
        assert_eq!(page.url().unwrap().as_str(), "https://example.com/one");
        assert!(!page.history_back());
    }

    #[test]
    fn test_visible_text_follows_layout() {
        let page = HtmlPage::new(
            r#"<body>
              <h1>Order
                summary</h1>
              <p>Hello <b>world</b>, you have <span>3</span> items.<br>Total: $12</p>
              <ul><li>Tea</li><li>Cake</li></ul>
              <div><script>var x = 1;</script>Thanks</div>
            </body>"#,
        );
        assert_eq!(
            page.visible_text(),
            "Order summary\nHello world, you have 3 items.\nTotal: $12\nTea\nCake\nThanks"
        );
    }

    #[test]
    fn test_navigate_unknown_page_is_empty() {
        let mut page = HtmlPage::new("<body>Start</body>");
        page.navigate("https://unknown.example/").unwrap();
        assert_eq!(page.visible_text(), "");
        assert!(page.navigate("relative/path").is_ok());
    }

    #[test]
    fn test_relative_navigation_without_base_fails() {
        let mut page = HtmlPage::new("<body>Start</body>");
        assert!(page.navigate("/relative").is_err());
        assert_eq!(page.visible_text(), "Start");
    }

    #[test]
    fn test_navigation_clears_values() {
        let mut page = HtmlPage::new(r#"<body><input id="q"></body>"#);
        let input = page.query_selector("#q").unwrap().unwrap();
        page.set_value(input, "hello");
        assert_eq!(page.value_of("#q").as_deref(), Some("hello"));
        page.navigate("https://example.com/").unwrap();
        assert!(page.history_back());
        assert_eq!(page.value_of("#q"), None);
    }
}
