use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::models::fragment::Fragment;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// A lazily produced model response. Consumed once; not restartable.
pub type FragmentStream = BoxStream<'static, Result<Fragment>>;

/// Base trait for model transports
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start a response to `messages`, offering `tools` to the model
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<FragmentStream>;
}
