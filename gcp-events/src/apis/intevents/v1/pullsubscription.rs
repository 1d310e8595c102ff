use enumset::EnumSetType;
use gcp_conditions::{Condition, ConditionAccessor, Conditions, ConditionType as _};
use gcp_duck::{
    derive::ConditionType,
    pubsub_types::PubSubSpec,
    source_types::{SinkManager, SourceConditionType, SourceStatus},
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// PullSubscription pulls the messages of a pub/sub topic and delivers them to a sink.
#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, Default, PartialEq, JsonSchema)]
#[kube(
    kind = "PullSubscription",
    group = "internal.events.cloud.google.com",
    status = "PullSubscriptionStatus",
    version = "v1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct PullSubscriptionSpec {
    /// Sink, credentials and project
    #[serde(flatten)]
    pub pubsub: PubSubSpec,
    /// Topic is the ID of the pub/sub topic to subscribe to.
    pub topic: String,
    /// AdapterType determines how the pulled messages are converted to CloudEvents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_type: Option<String>,
}

#[derive(ConditionType, EnumSetType, Deserialize, Serialize, Debug, JsonSchema)]
pub enum PullSubscriptionCondition {
    Ready,
    #[dependent]
    SinkProvided,
    #[dependent]
    SubscriptionReady,
    #[dependent]
    Deployed,
}

impl SourceConditionType for PullSubscriptionCondition {
    fn sinkprovided() -> Self {
        PullSubscriptionCondition::SinkProvided
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PullSubscriptionStatus {
    /// inherits [`SourceStatus`]: observed generation, conditions and sink uri.
    #[serde(flatten)]
    pub source_status: SourceStatus<PullSubscriptionCondition>,
    /// ProjectID is the resolved project ID in use by the PullSubscription.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// SubscriptionID is the created subscription ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
}

impl ConditionAccessor<PullSubscriptionCondition> for PullSubscriptionStatus {
    fn conditions(&mut self) -> &mut Conditions<PullSubscriptionCondition> {
        self.source_status.conditions()
    }
}

impl SinkManager<PullSubscriptionCondition> for PullSubscriptionStatus {
    fn source_status(&mut self) -> &mut SourceStatus<PullSubscriptionCondition> {
        &mut self.source_status
    }
}

impl PullSubscription {
    /// The happy condition of the PullSubscription, if it has reported one.
    pub fn ready_condition(&self) -> Option<&Condition<PullSubscriptionCondition>> {
        self.status.as_ref()?
            .source_status
            .status
            .conditions
            .get(PullSubscriptionCondition::happy())
    }

    /// The sink the PullSubscription resolved and delivers to.
    pub fn sink_uri(&self) -> Option<&url::Url> {
        self.status.as_ref()?.source_status.sink_uri.as_ref()
    }
}
