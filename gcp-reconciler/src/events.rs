use async_trait::async_trait;
use k8s_openapi::{
    api::core::v1::{Event as KubeEvent, EventSource, ObjectReference},
    apimachinery::pkg::apis::meta::v1::Time,
};
use kube::{
    api::{Api, ObjectMeta, PostParams},
    Client,
};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A human readable record of something that happened to an object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub type_: EventType,
    pub reason: String,
    pub message: String,
}

impl Event {
    pub fn normal(reason: &str, message: impl Into<String>) -> Self {
        Event { type_: EventType::Normal, reason: reason.to_string(), message: message.into() }
    }

    pub fn warning(reason: &str, message: impl Into<String>) -> Self {
        Event { type_: EventType::Warning, reason: reason.to_string(), message: message.into() }
    }
}

impl From<&crate::Error> for Event {
    fn from(error: &crate::Error) -> Self {
        Event::warning(error.reason(), error.to_string())
    }
}

/// Records [`Event`]s about an object.
///
/// Recording is best effort: a failure is logged and never fails a reconcile.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, regarding: &ObjectReference, event: Event);
}

/// Records events as core/v1 Events through the Kubernetes API.
pub struct KubeEventRecorder {
    client: Client,
    component: String,
}

impl KubeEventRecorder {
    pub fn new(client: Client, component: &str) -> Self {
        KubeEventRecorder { client, component: component.to_string() }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(&self, regarding: &ObjectReference, event: Event) {
        let namespace = regarding.namespace.clone().unwrap_or_else(|| "default".to_string());
        let events: Api<KubeEvent> = Api::namespaced(self.client.clone(), &namespace);
        let name = regarding.name.clone().unwrap_or_default();

        let time = Time(chrono::Utc::now());
        let kube_event = KubeEvent {
            metadata: ObjectMeta {
                generate_name: Some(format!("{name}.")),
                namespace: Some(namespace),
                ..Default::default()
            },
            type_: Some(event.type_.to_string()),
            reason: Some(event.reason),
            message: Some(event.message),
            involved_object: regarding.clone(),
            source: Some(EventSource {
                component: Some(self.component.clone()),
                ..Default::default()
            }),
            reporting_component: Some(self.component.clone()),
            first_timestamp: Some(time.clone()),
            last_timestamp: Some(time),
            count: Some(1),
            ..Default::default()
        };

        if let Err(e) = events.create(&PostParams::default(), &kube_event).await {
            warn!(object = %name, error = %e, "failed to record event");
        }
    }
}
