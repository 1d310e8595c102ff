//! Convergence of the Topic and PullSubscription every pub/sub backed source owns.
//!
//! Children are created and left to their own controllers: a missing or unready child stops
//! the reconcile, and readiness is picked up when the child's status change requeues the source.

use crate::{
    error::ConvergeError,
    repository::Repository,
    resources::{make_pull_subscription, make_topic, PubSubArgs},
};
use gcp_duck::{
    pubsub_types::{PubSubConditionType, PubSubManager},
    source_types::SourceConditionType,
};
use gcp_events::apis::intevents::v1::{PullSubscription, Topic};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const FAILED_TO_PROPAGATE_PULL_SUBSCRIPTION_STATUS: &str = "Failed to propagate PullSubscription status";

/// Drives the Topic and PullSubscription of a source.
#[derive(Clone)]
pub struct PubSubBase {
    pub topics: Arc<dyn Repository<Topic>>,
    pub pull_subscriptions: Arc<dyn Repository<PullSubscription>>,
}

impl PubSubBase {
    pub fn new(
        topics: Arc<dyn Repository<Topic>>,
        pull_subscriptions: Arc<dyn Repository<PullSubscription>>,
    ) -> Self {
        PubSubBase { topics, pull_subscriptions }
    }

    /// Ensure the Topic, then the PullSubscription, exist as desired and are ready.
    ///
    /// On success the topic identifiers, the subscription ID and the sink uri are recorded on
    /// `status`, each with its condition marked true.
    #[instrument(skip_all, fields(namespace = args.namespace, name = args.name))]
    pub async fn reconcile_pubsub<S, T>(&self, args: &PubSubArgs<'_>, status: &mut T) -> Result<(), ConvergeError>
    where
        S: PubSubConditionType + SourceConditionType,
        T: PubSubManager<S> + Send,
    {
        let topic = self.reconcile_topic(args, status).await?;
        propagate_topic_status(&topic, &args.topic_id, status)?;

        let ps = self.reconcile_pull_subscription(args, status).await?;
        propagate_pull_subscription_status(&ps, status)
            .map_err(|e| e.context(FAILED_TO_PROPAGATE_PULL_SUBSCRIPTION_STATUS))
    }

    async fn reconcile_topic<S, T>(&self, args: &PubSubArgs<'_>, status: &mut T) -> Result<Topic, ConvergeError>
    where
        S: PubSubConditionType + SourceConditionType,
        T: PubSubManager<S> + Send,
    {
        let desired = make_topic(args);
        let existing = match self.topics.get(args.namespace, args.name).await {
            Ok(existing) => existing,
            Err(e) => {
                let message = format!("Failed to get Topic: {e}");
                status.mark_topic_failed("TopicGetFailed", Some(message.clone()));
                return Err(ConvergeError::external(message));
            }
        };

        match existing {
            None => {
                info!(topic = %args.topic_id, "creating Topic");
                self.topics.create(args.namespace, &desired).await.map_err(|e| {
                    let message = format!("Failed to create Topic: {e}");
                    status.mark_topic_failed("TopicCreateFailed", Some(message.clone()));
                    ConvergeError::external(message)
                })
            }
            Some(existing) if existing.spec != desired.spec => {
                info!("updating Topic spec");
                let updated = Topic { spec: desired.spec, ..existing };
                self.topics.replace(args.namespace, &updated).await.map_err(|e| {
                    let message = format!("Failed to update Topic: {e}");
                    status.mark_topic_failed("TopicUpdateFailed", Some(message.clone()));
                    ConvergeError::external(message)
                })
            }
            Some(existing) => {
                debug!("Topic is up to date");
                Ok(existing)
            }
        }
    }

    async fn reconcile_pull_subscription<S, T>(
        &self,
        args: &PubSubArgs<'_>,
        status: &mut T,
    ) -> Result<PullSubscription, ConvergeError>
    where
        S: PubSubConditionType + SourceConditionType,
        T: PubSubManager<S> + Send,
    {
        let desired = make_pull_subscription(args);
        let existing = match self.pull_subscriptions.get(args.namespace, args.name).await {
            Ok(existing) => existing,
            Err(e) => {
                let message = format!("Failed to get PullSubscription: {e}");
                status.mark_pullsubscription_failed("PullSubscriptionGetFailed", Some(message.clone()));
                return Err(ConvergeError::external(message));
            }
        };

        match existing {
            None => {
                info!("creating PullSubscription");
                self.pull_subscriptions.create(args.namespace, &desired).await.map_err(|e| {
                    let message = format!("Failed to create PullSubscription: {e}");
                    status.mark_pullsubscription_failed("PullSubscriptionCreateFailed", Some(message.clone()));
                    ConvergeError::external(message)
                })
            }
            Some(existing) if existing.spec != desired.spec => {
                info!("updating PullSubscription spec");
                let updated = PullSubscription { spec: desired.spec, ..existing };
                self.pull_subscriptions.replace(args.namespace, &updated).await.map_err(|e| {
                    let message = format!("Failed to update PullSubscription: {e}");
                    status.mark_pullsubscription_failed("PullSubscriptionUpdateFailed", Some(message.clone()));
                    ConvergeError::external(message)
                })
            }
            Some(existing) => {
                debug!("PullSubscription is up to date");
                Ok(existing)
            }
        }
    }

    /// Delete the PullSubscription, then the Topic, of the source `name`.
    ///
    /// Deleting a child that is already gone succeeds.
    #[instrument(skip(self, status))]
    pub async fn delete_pubsub<S, T>(&self, namespace: &str, name: &str, status: &mut T) -> Result<(), ConvergeError>
    where
        S: PubSubConditionType + SourceConditionType,
        T: PubSubManager<S> + Send,
    {
        if let Err(e) = self.pull_subscriptions.delete(namespace, name).await {
            let message = format!("Failed to delete PullSubscription: {e}");
            status.mark_pullsubscription_failed("PullSubscriptionDeleteFailed", Some(message.clone()));
            return Err(ConvergeError::external(message));
        }
        status.mark_pullsubscription_failed(
            "PullSubscriptionDeleted",
            Some(format!("Successfully deleted PullSubscription: {name}")),
        );

        if let Err(e) = self.topics.delete(namespace, name).await {
            let message = format!("Failed to delete Topic: {e}");
            status.mark_topic_failed("TopicDeleteFailed", Some(message.clone()));
            return Err(ConvergeError::external(message));
        }
        status.mark_topic_failed("TopicDeleted", Some(format!("Successfully deleted Topic: {name}")));

        info!("deleted PullSubscription and Topic");
        Ok(())
    }
}

fn propagate_topic_status<S, T>(topic: &Topic, expected_topic_id: &str, status: &mut T) -> Result<(), ConvergeError>
where
    S: PubSubConditionType + SourceConditionType,
    T: PubSubManager<S>,
{
    let name = topic.name_any();
    let ready = match topic.ready_condition() {
        Some(ready) => ready,
        None => {
            status.mark_topic_unknown("TopicNotConfigured", Some("Topic has not yet been reconciled".into()));
            return Err(ConvergeError::not_yet_ready(format!("Topic {name:?} has not yet been reconciled")));
        }
    };

    if ready.is_unknown() {
        status.propagate_topic_condition(ready);
        return Err(ConvergeError::not_yet_ready(format!("the status of Topic {name:?} is Unknown")));
    }
    if ready.is_false() {
        status.propagate_topic_condition(ready);
        return Err(ConvergeError::dependency_failed(format!("the status of Topic {name:?} is False")));
    }

    let topic_status = topic.status.as_ref();
    let project_id = topic_status.and_then(|s| s.project_id.clone()).unwrap_or_default();
    let topic_id = topic_status.and_then(|s| s.topic_id.clone()).unwrap_or_default();

    let violation = if project_id.is_empty() {
        Some(format!("Topic {name:?} did not expose projectid"))
    } else if topic_id.is_empty() {
        Some(format!("Topic {name:?} did not expose topicid"))
    } else if topic_id != expected_topic_id {
        Some(format!("Topic {name:?} mismatch: expected {expected_topic_id:?} got {topic_id:?}"))
    } else {
        None
    };

    if let Some(message) = violation {
        status.mark_topic_failed("TopicNotReady", Some(message.clone()));
        return Err(ConvergeError::invariant(message));
    }

    status.mark_topic_ready(project_id, topic_id);
    Ok(())
}

fn propagate_pull_subscription_status<S, T>(ps: &PullSubscription, status: &mut T) -> Result<(), ConvergeError>
where
    S: PubSubConditionType + SourceConditionType,
    T: PubSubManager<S>,
{
    let name = ps.name_any();
    let ready = match ps.ready_condition() {
        Some(ready) => ready,
        None => {
            status.mark_pullsubscription_unknown(
                "PullSubscriptionNotConfigured",
                Some("PullSubscription has not yet been reconciled".into()),
            );
            return Err(ConvergeError::not_yet_ready(format!(
                "PullSubscription {name:?} has not yet been reconciled"
            )));
        }
    };

    if ready.is_unknown() {
        status.propagate_pullsubscription_condition(ready);
        return Err(ConvergeError::not_yet_ready(format!("the status of PullSubscription {name:?} is Unknown")));
    }
    if ready.is_false() {
        status.propagate_pullsubscription_condition(ready);
        return Err(ConvergeError::dependency_failed(format!("the status of PullSubscription {name:?} is False")));
    }

    let Some(sink_uri) = ps.sink_uri() else {
        let message = format!("PullSubscription {name:?} did not expose sinkuri");
        status.mark_pullsubscription_failed("PullSubscriptionNotReady", Some(message.clone()));
        return Err(ConvergeError::invariant(message));
    };

    let subscription_id = ps.status.as_ref().and_then(|s| s.subscription_id.clone());
    status.mark_pullsubscription_ready(subscription_id, sink_uri.clone());
    Ok(())
}
