use enumset::EnumSetType;
use gcp_conditions::{ConditionAccessor, Conditions, ConditionType as _};
use gcp_duck::{
    addressable_type::AddressStatus,
    derive::ConditionType,
    status_types::Status,
};
use k8s_openapi::api::core::v1::SecretKeySelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Topic is the internal pub/sub topic an event source publishes into.
#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, Default, PartialEq, JsonSchema)]
#[kube(
    kind = "Topic",
    group = "internal.events.cloud.google.com",
    status = "TopicStatus",
    version = "v1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TopicSpec {
    /// Secret is the credential to use to create the Topic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretKeySelector>,
    /// Project is the ID of the Google Cloud Project that the Topic will be created in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Topic is the ID of the Topic to create in Google Cloud.
    pub topic: String,
    /// PropagationPolicy defines how the Topic controller manages the pub/sub topic.
    #[serde(default)]
    pub propagation_policy: PropagationPolicy,
    /// EnablePublisher determines whether a publisher is deployed for the Topic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_publisher: Option<bool>,
    /// ServiceAccountName is the Google service account the Topic's workloads run as.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

/// How the lifecycle of the pub/sub topic follows its [`Topic`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, JsonSchema)]
pub enum PropagationPolicy {
    /// Create the pub/sub topic if missing, delete it with the [`Topic`].
    #[default]
    CreateDelete,
    /// Create the pub/sub topic if missing, keep it after the [`Topic`] is deleted.
    CreateNoDelete,
    /// Only use an existing pub/sub topic.
    NoCreateNoDelete,
}

#[derive(ConditionType, EnumSetType, Deserialize, Serialize, Debug, JsonSchema)]
pub enum TopicCondition {
    Ready,
    #[dependent]
    TopicReady,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicStatus {
    #[serde(flatten)]
    pub status: Status<TopicCondition>,
    /// Address of the publisher in front of the topic, when enabled.
    #[serde(flatten)]
    pub address: AddressStatus,
    /// ProjectID is the resolved project ID in use by the Topic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// TopicID is the created topic ID used by the Topic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
}

impl ConditionAccessor<TopicCondition> for TopicStatus {
    fn conditions(&mut self) -> &mut Conditions<TopicCondition> {
        self.status.conditions()
    }
}

impl Topic {
    /// The happy condition of the Topic, if it has reported one.
    pub fn ready_condition(&self) -> Option<&gcp_conditions::Condition<TopicCondition>> {
        self.status.as_ref()?.status.conditions.get(TopicCondition::happy())
    }
}
