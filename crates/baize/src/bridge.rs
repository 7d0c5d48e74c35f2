//! The command bridge: forwards page commands from the coordinating side to
//! the page agent of the active tab and waits for the single reply.
pub mod browser;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::{AgentChannel, CommandResult, PageCommand, PageResponse};

pub use browser::{Browser, TabId};

/// How long to wait for a page agent reply before giving up
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opaque reference to the page a turn acts on. Valid for one turn only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(u32);

impl TargetHandle {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("no active tab")]
    NoActiveTarget,

    #[error("page agent unreachable: {0}")]
    AgentUnreachable(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// The browser environment the bridge runs in
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Host: Send + Sync {
    /// Active tab of the focused window, if any
    async fn active_target(&self) -> Option<TargetHandle>;

    /// Channel into the page agent of `target`, `None` when no agent is loaded there
    async fn agent_channel(&self, target: &TargetHandle) -> Option<AgentChannel>;

    /// Native history navigation for `target`
    async fn go_back(&self, target: &TargetHandle) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct CommandBridge {
    host: Arc<dyn Host>,
    timeout: Duration,
}

impl CommandBridge {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn resolve_active_target(&self) -> BridgeResult<TargetHandle> {
        let target = self
            .host
            .active_target()
            .await
            .ok_or(BridgeError::NoActiveTarget)?;
        debug!(target = target.id(), "resolved active target");
        Ok(target)
    }

    /// Deliver `command` to the page agent of `target` and wait for its reply.
    ///
    /// Fails with `AgentUnreachable` when no agent is loaded, the channel closes
    /// before a reply, the reply is malformed or the timeout elapses. There are
    /// no retries.
    pub async fn send(
        &self,
        target: &TargetHandle,
        command: PageCommand,
    ) -> BridgeResult<CommandResult> {
        let name = command.name();
        let result = self.exchange(target, &command).await;
        match &result {
            Ok(reply) => debug!(command = name, success = reply.is_success(), "page command replied"),
            Err(e) => warn!(command = name, target = target.id(), error = %e, "page command failed"),
        }
        result
    }

    async fn exchange(
        &self,
        target: &TargetHandle,
        command: &PageCommand,
    ) -> BridgeResult<CommandResult> {
        let request = command
            .to_wire()
            .map_err(|e| BridgeError::AgentUnreachable(e.to_string()))?;
        let channel = self.host.agent_channel(target).await.ok_or_else(|| {
            BridgeError::AgentUnreachable("no page agent loaded in this tab".to_string())
        })?;

        let delivery = async {
            let reply = channel
                .request(request)
                .await
                .map_err(|e| BridgeError::AgentUnreachable(e.to_string()))?;
            reply.await.map_err(|_| {
                BridgeError::AgentUnreachable("page agent closed without replying".to_string())
            })
        };
        let reply = tokio::time::timeout(self.timeout, delivery)
            .await
            .map_err(|_| {
                BridgeError::AgentUnreachable(format!(
                    "no reply within {}ms",
                    self.timeout.as_millis()
                ))
            })??;

        let response: PageResponse = serde_json::from_value(reply)
            .map_err(|e| BridgeError::AgentUnreachable(format!("malformed reply: {}", e)))?;
        Ok(response.into_result())
    }

    /// Native history navigation, bypassing the page agent
    pub async fn go_back_native(&self, target: &TargetHandle) -> anyhow::Result<()> {
        self.host.go_back(target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{spawn_page_agent, HtmlPage};
    use crate::protocol::Envelope;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn bridge_with_channel(channel: Option<AgentChannel>) -> CommandBridge {
        let mut host = MockHost::new();
        host.expect_active_target()
            .returning(|| Some(TargetHandle::new(7)));
        host.expect_agent_channel()
            .returning(move |_| channel.clone());
        CommandBridge::new(Arc::new(host)).with_timeout(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_no_active_target() {
        let mut host = MockHost::new();
        host.expect_active_target().returning(|| None);
        let bridge = CommandBridge::new(Arc::new(host));
        assert_eq!(
            bridge.resolve_active_target().await,
            Err(BridgeError::NoActiveTarget)
        );
    }

    #[tokio::test]
    async fn test_send_to_page_agent() {
        let page = HtmlPage::new(r#"<body><button id="go">Go</button></body>"#);
        let bridge = bridge_with_channel(Some(spawn_page_agent(page)));
        let target = bridge.resolve_active_target().await.unwrap();
        assert_eq!(target.id(), 7);

        let result = bridge
            .send(
                &target,
                PageCommand::ClickElement {
                    selector: "#go".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(result.is_success());

        let result = bridge
            .send(
                &target,
                PageCommand::ClickElement {
                    selector: "#login".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(result.error(), Some("not found"));
    }

    #[tokio::test]
    async fn test_restricted_tab_is_unreachable() {
        let bridge = bridge_with_channel(None);
        let err = bridge
            .send(&TargetHandle::new(7), PageCommand::ReadContent)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::AgentUnreachable(_)));
    }

    #[tokio::test]
    async fn test_silent_agent_times_out() {
        let (tx, mut rx) = mpsc::channel::<Envelope>(1);
        // Hold every envelope so the reply sender is never dropped.
        let holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(envelope) = rx.recv().await {
                held.push(envelope);
            }
        });
        let bridge = bridge_with_channel(Some(AgentChannel::new(tx)));
        let err = bridge
            .send(&TargetHandle::new(7), PageCommand::ReadContent)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::AgentUnreachable("no reply within 100ms".to_string())
        );
        holder.abort();
    }

    #[tokio::test]
    async fn test_malformed_reply() {
        let (tx, mut rx) = mpsc::channel::<Envelope>(1);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let _ = envelope.reply.send(json!({"success": "yes"}));
            }
        });
        let bridge = bridge_with_channel(Some(AgentChannel::new(tx)));
        let err = bridge
            .send(&TargetHandle::new(7), PageCommand::ReadContent)
            .await
            .unwrap_err();
        match err {
            BridgeError::AgentUnreachable(reason) => assert!(reason.starts_with("malformed reply")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unrecognized_command_has_no_reply() {
        let (tx, mut rx) = mpsc::channel::<Envelope>(1);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                drop(envelope.reply);
            }
        });
        let bridge = bridge_with_channel(Some(AgentChannel::new(tx)));
        let err = bridge
            .send(&TargetHandle::new(7), PageCommand::GoBack)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::AgentUnreachable("page agent closed without replying".to_string())
        );
    }

    #[tokio::test]
    async fn test_go_back_native_forwards_to_host() {
        let mut host = MockHost::new();
        host.expect_go_back()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("history unavailable")));
        let bridge = CommandBridge::new(Arc::new(host));
        let err = bridge.go_back_native(&TargetHandle::new(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "history unavailable");
    }
}
