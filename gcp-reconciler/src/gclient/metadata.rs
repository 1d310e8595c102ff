use super::Result;
use async_trait::async_trait;

/// What the environment the controller runs in knows about itself.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// The project the controller runs in, used when a source names none.
    async fn project_id(&self) -> Result<String>;
}
