//! The Stackdriver sink exporting audit logs to the topic of a source.

use crate::gclient::{
    iam::PUBSUB_PUBLISHER,
    logadmin::{LogadminFactory, Sink},
    pubsub::PubsubFactory,
    Error, Result,
};
use tracing::{debug, info};

/// Fetch the sink `desired.id`, creating it as desired when missing.
///
/// An existing sink is returned as is, even when it no longer matches `desired`.
pub async fn ensure_sink_created(logadmin: &dyn LogadminFactory, project: &str, desired: &Sink) -> Result<Sink> {
    let client = logadmin.create(project).await?;
    match client.sink(&desired.id).await {
        Ok(sink) => {
            debug!(sink = %sink.id, "sink exists");
            Ok(sink)
        }
        Err(e) if e.is_not_found() => {
            info!(sink = %desired.id, destination = %desired.destination, "creating sink");
            match client.create_sink(desired).await {
                // created concurrently
                Err(e) if e.is_already_exists() => client.sink(&desired.id).await,
                created => created,
            }
        }
        Err(e) => Err(e),
    }
}

/// Grant the writer identity of a sink the right to publish to `topic_id`.
pub async fn ensure_sink_is_publisher(
    pubsub: &dyn PubsubFactory,
    project: &str,
    topic_id: &str,
    writer_identity: &str,
) -> Result<()> {
    if writer_identity.is_empty() {
        return Err(Error::Other("sink has no writer identity".into()));
    }
    let client = pubsub.create(project).await?;
    let iam = client.topic_iam(topic_id);
    let mut policy = iam.policy().await?;
    if policy.has(writer_identity, PUBSUB_PUBLISHER) {
        return Ok(());
    }
    info!(member = %writer_identity, topic = %topic_id, "granting publisher");
    policy.add(writer_identity, PUBSUB_PUBLISHER);
    iam.set_policy(&policy).await
}

/// Delete the sink `id`. A sink that is already gone counts as deleted.
pub async fn delete_sink(logadmin: &dyn LogadminFactory, project: &str, id: &str) -> Result<()> {
    let client = logadmin.create(project).await?;
    match client.delete_sink(id).await {
        Err(e) if e.is_not_found() => {
            debug!(sink = %id, "sink already deleted");
            Ok(())
        }
        result => result,
    }
}
