use enumset::EnumSetType;
use gcp_conditions::{ConditionAccessor, Conditions};
use gcp_duck::{
    derive::ConditionType,
    pubsub_types::{PubSubConditionType, PubSubManager, PubSubSpec, PubSubStatus},
    source_types::{SinkManager, SourceConditionType, SourceStatus},
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The resource group of [`CloudAuditLogsSource`], also used as its finalizer.
pub const RESOURCE_GROUP: &str = "cloudauditlogssources.events.cloud.google.com";

/// CloudAuditLogsSource delivers the Cloud Audit Logs matching a service and
/// method to a sink, through a Stackdriver logging sink exporting to a pub/sub topic.
#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, Default, PartialEq, JsonSchema)]
#[kube(
    kind = "CloudAuditLogsSource",
    group = "events.cloud.google.com",
    status = "CloudAuditLogsSourceStatus",
    version = "v1",
    namespaced,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Reason", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CloudAuditLogsSourceSpec {
    /// Sink, credentials and project
    #[serde(flatten)]
    pub pubsub: PubSubSpec,
    /// ServiceName is the Cloud service whose audit logs are delivered, e.g. `storage.googleapis.com`.
    pub service_name: String,
    /// MethodName is the name of the audited operation, e.g. `storage.buckets.create`.
    pub method_name: String,
    /// ResourceName narrows the audit logs to a single resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
}

/// Conditions of a [`CloudAuditLogsSource`], in dependency order.
#[derive(ConditionType, EnumSetType, Deserialize, Serialize, Debug, JsonSchema)]
pub enum CloudAuditLogsSourceCondition {
    Ready,
    #[dependent]
    TopicReady,
    #[dependent]
    PullSubscriptionReady,
    #[dependent]
    WorkloadIdentityReady,
    /// The Stackdriver sink exists and may publish to the topic.
    #[dependent]
    SinkReady,
}

impl PubSubConditionType for CloudAuditLogsSourceCondition {
    fn topicready() -> Self {
        CloudAuditLogsSourceCondition::TopicReady
    }

    fn pullsubscriptionready() -> Self {
        CloudAuditLogsSourceCondition::PullSubscriptionReady
    }

    fn workloadidentityready() -> Self {
        CloudAuditLogsSourceCondition::WorkloadIdentityReady
    }
}

impl SourceConditionType for CloudAuditLogsSourceCondition {
    fn sinkprovided() -> Self {
        CloudAuditLogsSourceCondition::PullSubscriptionReady
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudAuditLogsSourceStatus {
    /// inherits [`PubSubStatus`]: conditions, sink uri and the resolved pub/sub identifiers.
    #[serde(flatten)]
    pub pubsub: PubSubStatus<CloudAuditLogsSourceCondition>,
    /// ID of the Stackdriver sink used to publish audit log messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stackdriver_sink: Option<String>,
}

impl ConditionAccessor<CloudAuditLogsSourceCondition> for CloudAuditLogsSourceStatus {
    fn conditions(&mut self) -> &mut Conditions<CloudAuditLogsSourceCondition> {
        self.pubsub.conditions()
    }
}

impl SinkManager<CloudAuditLogsSourceCondition> for CloudAuditLogsSourceStatus {
    fn source_status(&mut self) -> &mut SourceStatus<CloudAuditLogsSourceCondition> {
        &mut self.pubsub.source_status
    }
}

impl PubSubManager<CloudAuditLogsSourceCondition> for CloudAuditLogsSourceStatus {
    fn pubsub_status(&mut self) -> &mut PubSubStatus<CloudAuditLogsSourceCondition> {
        &mut self.pubsub
    }
}

impl CloudAuditLogsSourceStatus {
    /// The Stackdriver sink `sink_id` exports to the topic.
    pub fn mark_sink_ready(&mut self, sink_id: String) {
        self.stackdriver_sink = Some(sink_id);
        self.manager().mark_true(CloudAuditLogsSourceCondition::SinkReady);
    }

    pub fn mark_sink_not_ready(&mut self, reason: &str, message: Option<String>) {
        self.stackdriver_sink = None;
        self.manager().mark_false(CloudAuditLogsSourceCondition::SinkReady, reason, message);
    }
}

impl CloudAuditLogsSource {
    /// The project the source's resources live in, as resolved by its Topic or as configured.
    pub fn project(&self) -> Option<&str> {
        self.status.as_ref()
            .and_then(|s| s.pubsub.project_id.as_deref())
            .or(self.spec.pubsub.project.as_deref())
    }
}
