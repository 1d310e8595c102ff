use super::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A logging sink exporting the log entries matching a filter to a destination.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Sink {
    #[serde(rename = "name")]
    pub id: String,
    pub destination: String,
    #[serde(default)]
    pub filter: String,
    /// The principal the sink writes as, set by the logging API.
    #[serde(default, skip_serializing)]
    pub writer_identity: String,
}

/// Logging sinks of one project.
#[async_trait]
pub trait LogadminClient: Send + Sync {
    async fn sink(&self, id: &str) -> Result<Sink>;

    /// Create `sink` with a writer identity of its own.
    async fn create_sink(&self, sink: &Sink) -> Result<Sink>;

    async fn delete_sink(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait LogadminFactory: Send + Sync {
    async fn create(&self, project: &str) -> Result<Arc<dyn LogadminClient>>;
}
