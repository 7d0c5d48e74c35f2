use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{Host, TargetHandle};
use crate::page::{spawn_page_agent, Dom, HtmlPage};
use crate::protocol::AgentChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TabId(pub u32);

struct Tab {
    page: Option<HtmlPage>,
    channel: Option<AgentChannel>,
    native_history: bool,
}

#[derive(Default)]
struct BrowserState {
    tabs: BTreeMap<TabId, Tab>,
    active: Option<TabId>,
    next_id: u32,
}

/// An in-memory browser window hosting `HtmlPage` tabs.
///
/// Opening a tab makes it active. Restricted tabs have no page agent, the way
/// internal browser pages refuse content scripts.
#[derive(Default)]
pub struct Browser {
    state: Mutex<BrowserState>,
}

impl Browser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `page` in a new active tab and start its page agent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open_tab(&self, page: HtmlPage) -> TabId {
        let channel = spawn_page_agent(page.clone());
        self.insert(Tab {
            page: Some(page),
            channel: Some(channel),
            native_history: true,
        })
    }

    /// Open a tab no page agent can be loaded into
    pub fn open_restricted_tab(&self) -> TabId {
        self.insert(Tab {
            page: None,
            channel: None,
            native_history: false,
        })
    }

    pub fn activate(&self, id: TabId) -> bool {
        let mut state = self.state();
        if state.tabs.contains_key(&id) {
            state.active = Some(id);
            true
        } else {
            false
        }
    }

    /// Close a tab. Its page agent stops once the bridge drops its channel.
    pub fn close_tab(&self, id: TabId) {
        let mut state = self.state();
        state.tabs.remove(&id);
        if state.active == Some(id) {
            state.active = state.tabs.keys().next_back().copied();
        }
    }

    /// Whether native history navigation works in this tab
    pub fn set_native_history(&self, id: TabId, supported: bool) {
        if let Some(tab) = self.state().tabs.get_mut(&id) {
            tab.native_history = supported;
        }
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.state().active
    }

    fn insert(&self, tab: Tab) -> TabId {
        let mut state = self.state();
        state.next_id += 1;
        let id = TabId(state.next_id);
        state.tabs.insert(id, tab);
        state.active = Some(id);
        debug!(tab = id.0, "opened tab");
        id
    }

    fn state(&self) -> MutexGuard<'_, BrowserState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Host for Browser {
    async fn active_target(&self) -> Option<TargetHandle> {
        self.state().active.map(|id| TargetHandle::new(id.0))
    }

    async fn agent_channel(&self, target: &TargetHandle) -> Option<AgentChannel> {
        self.state()
            .tabs
            .get(&TabId(target.id()))
            .and_then(|tab| tab.channel.clone())
            .filter(|channel| !channel.is_closed())
    }

    async fn go_back(&self, target: &TargetHandle) -> Result<()> {
        let page = {
            let state = self.state();
            let tab = state
                .tabs
                .get(&TabId(target.id()))
                .ok_or_else(|| anyhow!("no tab with id {}", target.id()))?;
            if !tab.native_history {
                return Err(anyhow!("history navigation is not available in this tab"));
            }
            tab.page.clone()
        };
        let mut page = page.ok_or_else(|| anyhow!("tab has no page"))?;
        if page.history_back() {
            Ok(())
        } else {
            Err(anyhow!("cannot go back from the first history entry"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_tab_becomes_active() {
        let browser = Browser::new();
        assert!(browser.active_target().await.is_none());

        let first = browser.open_tab(HtmlPage::new("<body>one</body>"));
        let second = browser.open_tab(HtmlPage::new("<body>two</body>"));
        assert_eq!(browser.active_tab(), Some(second));

        assert!(browser.activate(first));
        let target = browser.active_target().await.unwrap();
        assert_eq!(target.id(), first.0);
        assert!(browser.agent_channel(&target).await.is_some());

        assert!(!browser.activate(TabId(99)));
    }

    #[tokio::test]
    async fn test_restricted_tab_has_no_agent() {
        let browser = Browser::new();
        let id = browser.open_restricted_tab();
        let target = TargetHandle::new(id.0);
        assert!(browser.agent_channel(&target).await.is_none());
        assert!(browser.go_back(&target).await.is_err());
    }

    #[tokio::test]
    async fn test_native_go_back() {
        let mut page = HtmlPage::new("<body>start</body>");
        page.navigate("https://example.com/next").unwrap();

        let browser = Browser::new();
        let id = browser.open_tab(page.clone());
        let target = TargetHandle::new(id.0);

        browser.set_native_history(id, false);
        assert!(browser.go_back(&target).await.is_err());

        browser.set_native_history(id, true);
        browser.go_back(&target).await.unwrap();
        assert_eq!(page.visible_text(), "start");
        assert!(browser.go_back(&target).await.is_err());
    }

    #[tokio::test]
    async fn test_close_active_tab() {
        let browser = Browser::new();
        let first = browser.open_tab(HtmlPage::new(""));
        let second = browser.open_tab(HtmlPage::new(""));
        browser.close_tab(second);
        assert_eq!(browser.active_tab(), Some(first));
        browser.close_tab(first);
        assert_eq!(browser.active_tab(), None);
    }
}
