//! Reconciler of [`CloudAuditLogsSource`]s.
//!
//! A source converges in three stages, each stopping the reconcile until it is satisfied:
//! workload identity for its receive adapter, its Topic and PullSubscription, and finally a
//! Stackdriver sink exporting the selected audit logs into the topic.

pub mod filter;
pub mod sink;

use crate::{
    error::ConvergeError,
    events::Event,
    gclient::{logadmin::Sink, CloudClients},
    identity::Identity,
    intevents::PubSubBase,
    names,
    reconciler::{Reconcilable, ReconcileKind},
    resources::PubSubArgs,
    Error, Result,
};
use async_trait::async_trait;
use gcp_duck::pubsub_types::PubSubManager;
use gcp_events::apis::events::v1::{CloudAuditLogsSource, CloudAuditLogsSourceStatus, RESOURCE_GROUP};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use tracing::instrument;

/// Converts pulled messages into audit log CloudEvents.
pub const ADAPTER_TYPE: &str = "google.cloud.audit.log.v1";
/// Default value of the receive adapter label on the children of a source.
pub const RECEIVE_ADAPTER_NAME: &str = "cloudauditlogssource.events.cloud.google.com";

impl Reconcilable for CloudAuditLogsSource {
    type Status = CloudAuditLogsSourceStatus;

    fn status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }

    fn status_mut(&mut self) -> &mut Option<Self::Status> {
        &mut self.status
    }

    fn fresh_status(&self) -> Self::Status {
        let mut status = CloudAuditLogsSourceStatus::default();
        status.pubsub.source_status.status.observed_generation = self.metadata.generation;
        status
    }

    fn carry_transition_times(status: &mut Self::Status, previous: &Self::Status) {
        status.pubsub.source_status.status.conditions
            .carry_transition_times(&previous.pubsub.source_status.status.conditions);
    }
}

pub struct Reconciler {
    pubsub: PubSubBase,
    identity: Identity,
    clients: CloudClients,
    receive_adapter_name: String,
}

impl Reconciler {
    pub fn new(pubsub: PubSubBase, identity: Identity, clients: CloudClients, receive_adapter_name: &str) -> Self {
        Reconciler {
            pubsub,
            identity,
            clients,
            receive_adapter_name: receive_adapter_name.to_string(),
        }
    }

    fn owner(source: &CloudAuditLogsSource) -> Result<OwnerReference, ConvergeError> {
        source.controller_owner_ref(&())
            .ok_or_else(|| ConvergeError::invariant("CloudAuditLogsSource has no name or uid"))
    }

    /// The project configured on the source, else the one its Topic resolved, else the one
    /// the controller runs in.
    async fn project(&self, source: &CloudAuditLogsSource) -> Result<String, ConvergeError> {
        if let Some(project) = source.spec.pubsub.project.as_deref().or(source.project()) {
            return Ok(project.to_string());
        }
        self.clients.metadata.project_id().await.map_err(ConvergeError::external)
    }

    async fn reconcile_identity(
        &self,
        source: &CloudAuditLogsSource,
        status: &mut CloudAuditLogsSourceStatus,
    ) -> Result<(), ConvergeError> {
        let Some(gsa) = source.spec.pubsub.service_account_name.as_deref() else {
            status.mark_workload_identity_not_required();
            return Ok(());
        };

        let namespace = source.namespace().unwrap_or_default();
        let result = match (Self::owner(source), self.project(source).await) {
            (Ok(owner), Ok(project)) => {
                self.identity.reconcile_workload_identity(owner, &namespace, gsa, &project).await
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        };

        match result {
            Ok(ksa) => {
                status.mark_workload_identity_ready(ksa);
                Ok(())
            }
            Err(e) => {
                status.mark_workload_identity_failed("WorkloadIdentityFailed", Some(e.message().to_string()));
                Err(e)
            }
        }
    }

    async fn reconcile_sink(
        &self,
        source: &CloudAuditLogsSource,
        status: &mut CloudAuditLogsSourceStatus,
    ) -> Result<(), ConvergeError> {
        let (Some(project), Some(topic_id)) = (status.pubsub.project_id.clone(), status.pubsub.topic_id.clone()) else {
            return Err(ConvergeError::not_yet_ready("Topic has not resolved its project and topic id"));
        };

        let desired = Sink {
            id: sink_id(source),
            destination: names::topic_resource_name(&project, &topic_id),
            filter: filter::audit_log_filter(
                &source.spec.service_name,
                &source.spec.method_name,
                source.spec.resource_name.as_deref(),
            ),
            writer_identity: String::new(),
        };

        let sink = match sink::ensure_sink_created(self.clients.logadmin.as_ref(), &project, &desired).await {
            Ok(sink) => sink,
            Err(e) => {
                status.mark_sink_not_ready(
                    "SinkCreateFailed",
                    Some(format!("failed to ensure creation of logging sink: {e}")),
                );
                return Err(ConvergeError::external(e));
            }
        };

        let granted =
            sink::ensure_sink_is_publisher(self.clients.pubsub.as_ref(), &project, &topic_id, &sink.writer_identity)
                .await;
        if let Err(e) = granted {
            status.mark_sink_not_ready(
                "SinkNotPublisher",
                Some(format!("failed to ensure sink has pubsub.publisher permission on source topic: {e}")),
            );
            return Err(ConvergeError::external(e));
        }

        status.mark_sink_ready(sink.id);
        Ok(())
    }
}

fn sink_id(source: &CloudAuditLogsSource) -> String {
    names::sink_id(
        &source.namespace().unwrap_or_default(),
        &source.name_any(),
        source.uid().as_deref().unwrap_or_default(),
    )
}

#[async_trait]
impl ReconcileKind for Reconciler {
    type Resource = CloudAuditLogsSource;

    #[instrument(skip_all, fields(namespace = source.namespace(), name = %source.name_any()))]
    async fn reconcile_kind(&self, source: &CloudAuditLogsSource, status: &mut CloudAuditLogsSourceStatus) -> Result<Event> {
        let namespace = source.namespace().unwrap_or_default();
        let name = source.name_any();

        self.reconcile_identity(source, status).await.map_err(Error::WorkloadIdentity)?;

        let owner = Self::owner(source).map_err(Error::PubSub)?;
        let args = PubSubArgs {
            namespace: &namespace,
            name: &name,
            spec: &source.spec.pubsub,
            owner,
            topic_id: names::topic_id(&namespace, &name, source.uid().as_deref().unwrap_or_default()),
            adapter_type: ADAPTER_TYPE,
            resource_group: RESOURCE_GROUP,
            receive_adapter: &self.receive_adapter_name,
        };
        self.pubsub.reconcile_pubsub(&args, status).await.map_err(Error::PubSub)?;

        self.reconcile_sink(source, status).await.map_err(Error::Sink)?;

        Ok(Event::normal(
            "CloudAuditLogsSourceReconciled",
            format!("CloudAuditLogsSource reconciled: \"{namespace}/{name}\""),
        ))
    }

    #[instrument(skip_all, fields(namespace = source.namespace(), name = %source.name_any()))]
    async fn finalize_kind(&self, source: &CloudAuditLogsSource, status: &mut CloudAuditLogsSourceStatus) -> Result<()> {
        let namespace = source.namespace().unwrap_or_default();
        let name = source.name_any();

        // The status may have lost the project since the sink was created.
        let project = self.project(source)
            .await
            .map_err(|e| Error::SinkDelete(e.context("failed to resolve project")))?;
        sink::delete_sink(self.clients.logadmin.as_ref(), &project, &sink_id(source))
            .await
            .map_err(|e| Error::SinkDelete(ConvergeError::external(e)))?;
        status.stackdriver_sink = None;

        if let Some(gsa) = source.spec.pubsub.service_account_name.as_deref() {
            let uid = source.uid().unwrap_or_default();
            self.identity
                .delete_workload_identity(&uid, &namespace, gsa, &project)
                .await
                .map_err(Error::WorkloadIdentityDelete)?;
        }

        self.pubsub.delete_pubsub(&namespace, &name, status).await.map_err(Error::PubSubDelete)?;
        status.pubsub.project_id = None;
        Ok(())
    }
}

#[cfg(test)]
mod test;
