use super::{iam::IamHandle, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Pub/sub of one project.
pub trait PubsubClient: Send + Sync {
    /// The IAM handle of the topic `topic_id`.
    fn topic_iam(&self, topic_id: &str) -> Arc<dyn IamHandle>;
}

#[async_trait]
pub trait PubsubFactory: Send + Sync {
    async fn create(&self, project: &str) -> Result<Arc<dyn PubsubClient>>;
}
