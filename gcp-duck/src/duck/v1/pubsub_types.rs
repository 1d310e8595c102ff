use super::source_types::{SinkManager, SourceConditionType, SourceSpec, SourceStatus};
use crate::derive::ConditionType;
use gcp_conditions::{Condition, ConditionAccessor, Conditions};
use enumset::EnumSetType;
use k8s_openapi::api::core::v1::SecretKeySelector;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the secret holding the default Google credentials.
pub const DEFAULT_SECRET_NAME: &str = "google-cloud-key";
/// Key of the default Google credentials within [`DEFAULT_SECRET_NAME`].
pub const DEFAULT_SECRET_KEY: &str = "key.json";

/// The credentials used when a source names neither a secret nor a service account.
pub fn default_secret() -> SecretKeySelector {
    SecretKeySelector {
        name: Some(DEFAULT_SECRET_NAME.to_string()),
        key: DEFAULT_SECRET_KEY.to_string(),
        optional: None,
    }
}

/// PubSubSpec defines the shared spec of every source that is backed by a
/// pub/sub Topic and PullSubscription.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PubSubSpec {
    /// Sink and CloudEventOverrides
    #[serde(flatten)]
    pub source_spec: SourceSpec,
    /// Secret is the credential to use to access the pub/sub resources.
    /// Ignored when a Google service account is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretKeySelector>,
    /// Project is the ID of the Google Cloud Project that the pub/sub
    /// resources live in. Discovered from the cluster when left out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// ServiceAccountName is the Google service account the receive adapter
    /// runs as through workload identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

impl PubSubSpec {
    /// The credentials reference handed down to child resources.
    ///
    /// A source running as a Google service account carries no secret; otherwise the configured
    /// secret, or the default one.
    pub fn credentials(&self) -> Option<SecretKeySelector> {
        match self.service_account_name {
            Some(_) => None,
            None => Some(self.secret.clone().unwrap_or_else(default_secret)),
        }
    }
}

/// PubSubStatus is the status shared by every pub/sub backed source.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PubSubStatus<S: SourceConditionType> {
    /// inherits [`SourceStatus`]: observed generation, conditions and sink uri.
    #[serde(flatten)]
    pub source_status: SourceStatus<S>,
    /// ProjectID is the project ID of the Topic, might have been resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// TopicID where the notifications are sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    /// SubscriptionID is the created subscription ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    /// ServiceAccountName is the Kubernetes service account bound to the
    /// Google service account through workload identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

impl<S: SourceConditionType> ConditionAccessor<S> for PubSubStatus<S> {
    fn conditions(&mut self) -> &mut Conditions<S> {
        self.source_status.conditions()
    }
}

impl<S: SourceConditionType> SinkManager<S> for PubSubStatus<S> {
    fn source_status(&mut self) -> &mut SourceStatus<S> {
        &mut self.source_status
    }
}

/// The baseline [`ConditionType`] of a pub/sub backed source, in dependency order.
///
/// Sources add their own dependents (e.g. the external resource they manage) and implement
/// [`PubSubConditionType`] and [`SourceConditionType`] to be driven by [`PubSubManager`].
/// The delivery sink of such a source is provided by its PullSubscription, so
/// `sinkprovided()` is expected to return the same variant as `pullsubscriptionready()`.
#[derive(ConditionType, EnumSetType, Deserialize, Serialize, Debug, JsonSchema)]
pub enum PubSubCondition {
    Ready,
    #[dependent]
    TopicReady,
    #[dependent]
    PullSubscriptionReady,
    #[dependent]
    WorkloadIdentityReady,
}

impl SourceConditionType for PubSubCondition {
    fn sinkprovided() -> Self {
        PubSubCondition::PullSubscriptionReady
    }
}

/// Manages the resolved identifiers of a [`PubSubStatus`] together with the conditions that
/// guard them: an identifier is only ever recorded alongside its condition becoming true, and
/// is cleared whenever that condition is not true.
pub trait PubSubManager<S>: SinkManager<S>
where S: PubSubConditionType + SourceConditionType {
    /// Return the [`PubSubStatus`] of your CRD Status type.
    fn pubsub_status(&mut self) -> &mut PubSubStatus<S>;

    fn mark_topic_ready(&mut self, project_id: String, topic_id: String) {
        let status = self.pubsub_status();
        status.project_id = Some(project_id);
        status.topic_id = Some(topic_id);
        self.manager().mark_true(S::topicready());
    }

    fn mark_topic_unknown(&mut self, reason: &str, message: Option<String>) {
        self.pubsub_status().topic_id = None;
        self.manager().mark_unknown(S::topicready(), reason, message);
    }

    fn mark_topic_failed(&mut self, reason: &str, message: Option<String>) {
        self.pubsub_status().topic_id = None;
        self.manager().mark_false(S::topicready(), reason, message);
    }

    /// Mirror the happy condition of a Topic that is not ready.
    fn propagate_topic_condition<D: gcp_conditions::ConditionType>(&mut self, ready: &Condition<D>) {
        self.pubsub_status().topic_id = None;
        self.manager().mark_from(S::topicready(), ready);
    }

    /// The PullSubscription is ready and delivers to `sink_uri`.
    fn mark_pullsubscription_ready(&mut self, subscription_id: Option<String>, sink_uri: url::Url) {
        self.pubsub_status().subscription_id = subscription_id;
        self.mark_sink(sink_uri);
    }

    fn mark_pullsubscription_unknown(&mut self, reason: &str, message: Option<String>) {
        let status = self.pubsub_status();
        status.subscription_id = None;
        status.source_status.sink_uri = None;
        self.manager().mark_unknown(S::pullsubscriptionready(), reason, message);
    }

    fn mark_pullsubscription_failed(&mut self, reason: &str, message: Option<String>) {
        self.pubsub_status().subscription_id = None;
        self.mark_no_sink(reason, message);
    }

    /// Mirror the happy condition of a PullSubscription that is not ready.
    fn propagate_pullsubscription_condition<D: gcp_conditions::ConditionType>(&mut self, ready: &Condition<D>) {
        let status = self.pubsub_status();
        status.subscription_id = None;
        status.source_status.sink_uri = None;
        self.manager().mark_from(S::pullsubscriptionready(), ready);
    }

    fn mark_workload_identity_ready(&mut self, service_account_name: String) {
        self.pubsub_status().service_account_name = Some(service_account_name);
        self.manager().mark_true(S::workloadidentityready());
    }

    /// No Google service account is configured, so there is nothing to bind.
    fn mark_workload_identity_not_required(&mut self) {
        self.pubsub_status().service_account_name = None;
        self.manager().mark_true_with_reason(S::workloadidentityready(), "WorkloadIdentityNotRequired", None);
    }

    fn mark_workload_identity_failed(&mut self, reason: &str, message: Option<String>) {
        self.pubsub_status().service_account_name = None;
        self.manager().mark_false(S::workloadidentityready(), reason, message);
    }
}

impl<S> PubSubManager<S> for PubSubStatus<S>
where S: PubSubConditionType + SourceConditionType {
    fn pubsub_status(&mut self) -> &mut PubSubStatus<S> {
        self
    }
}
