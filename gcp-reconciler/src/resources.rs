//! Desired state of the Topic and PullSubscription a source owns.

use gcp_duck::{pubsub_types::PubSubSpec, source_types::SourceSpec};
use gcp_events::apis::{
    events::v1::SOURCE_NAME_LABEL,
    intevents::v1::{PropagationPolicy, PullSubscription, PullSubscriptionSpec, Topic, TopicSpec},
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

pub const RECEIVE_ADAPTER_LABEL: &str = "receive-adapter";
/// Annotation grouping the metrics of a PullSubscription by the kind of its source.
pub const METRICS_RESOURCE_GROUP_ANNOTATION: &str = "metrics-resource-group";

/// Everything the children of a source are built from.
#[derive(Clone, Debug)]
pub struct PubSubArgs<'a> {
    pub namespace: &'a str,
    /// Name of the source, shared by its children.
    pub name: &'a str,
    pub spec: &'a PubSubSpec,
    /// Controller reference to the source.
    pub owner: OwnerReference,
    pub topic_id: String,
    pub adapter_type: &'a str,
    pub resource_group: &'a str,
    pub receive_adapter: &'a str,
}

impl PubSubArgs<'_> {
    fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (RECEIVE_ADAPTER_LABEL.to_string(), self.receive_adapter.to_string()),
            (SOURCE_NAME_LABEL.to_string(), self.name.to_string()),
        ])
    }

    fn metadata(&self, annotations: Option<BTreeMap<String, String>>) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name.to_string()),
            namespace: Some(self.namespace.to_string()),
            labels: Some(self.labels()),
            annotations,
            owner_references: Some(vec![self.owner.clone()]),
            ..Default::default()
        }
    }
}

pub fn make_topic(args: &PubSubArgs) -> Topic {
    Topic {
        metadata: args.metadata(None),
        spec: TopicSpec {
            secret: args.spec.credentials(),
            project: args.spec.project.clone(),
            topic: args.topic_id.clone(),
            propagation_policy: PropagationPolicy::CreateDelete,
            enable_publisher: Some(false),
            service_account_name: args.spec.service_account_name.clone(),
        },
        status: None,
    }
}

pub fn make_pull_subscription(args: &PubSubArgs) -> PullSubscription {
    let annotations = BTreeMap::from([(
        METRICS_RESOURCE_GROUP_ANNOTATION.to_string(),
        args.resource_group.to_string(),
    )]);

    PullSubscription {
        metadata: args.metadata(Some(annotations)),
        spec: PullSubscriptionSpec {
            pubsub: PubSubSpec {
                source_spec: SourceSpec {
                    sink: args.spec.source_spec.sink.with_default_namespace(args.namespace),
                    ce_overrides: args.spec.source_spec.ce_overrides.clone(),
                },
                secret: args.spec.credentials(),
                project: args.spec.project.clone(),
                service_account_name: args.spec.service_account_name.clone(),
            },
            topic: args.topic_id.clone(),
            adapter_type: Some(args.adapter_type.to_string()),
        },
        status: None,
    }
}
