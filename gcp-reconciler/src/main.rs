use clap::Parser;
use gcp_events::apis::{
    events::v1::{CloudAuditLogsSource, RESOURCE_GROUP},
    intevents::v1::{PullSubscription, Topic},
};
use gcp_reconciler::{
    auditlogs::Reconciler,
    backoff::Backoff,
    config::ControllerConfig,
    controller::{self, Context},
    events::KubeEventRecorder,
    gclient::rest::{Endpoints, RestClients},
    identity::Identity,
    intevents::PubSubBase,
    reconciler::Driver,
    repository::KubeRepository,
    telemetry, Error,
};
use k8s_openapi::api::core::v1::ServiceAccount;
use std::sync::Arc;
use tracing::info;

const CONTROLLER_NAME: &str = "cloudauditlogssource-controller";

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = ControllerConfig::parse();
    telemetry::init(config.log_json)?;
    info!("Starting {CONTROLLER_NAME} v{}", env!("CARGO_PKG_VERSION"));

    let client = kube::Client::try_default().await?;

    let endpoints = match &config.cloud_endpoint {
        Some(base) => Endpoints::all(base),
        None => Endpoints::default(),
    };
    let clients = RestClients::new(endpoints, config.cloud_timeout())?.cloud_clients();

    let pubsub = PubSubBase::new(
        Arc::new(KubeRepository::<Topic>::new(client.clone(), CONTROLLER_NAME)),
        Arc::new(KubeRepository::<PullSubscription>::new(client.clone(), CONTROLLER_NAME)),
    );
    let identity = Identity::new(
        Arc::new(KubeRepository::<ServiceAccount>::new(client.clone(), CONTROLLER_NAME)),
        clients.iam.clone(),
    );
    let reconciler = Reconciler::new(pubsub, identity, clients, &config.receive_adapter_name);
    let driver = Driver::new(
        reconciler,
        Arc::new(KubeRepository::<CloudAuditLogsSource>::new(client.clone(), CONTROLLER_NAME)),
        Arc::new(KubeEventRecorder::new(client.clone(), CONTROLLER_NAME)),
        RESOURCE_GROUP,
    );

    let ctx = Context {
        driver,
        backoff: Backoff::new(config.backoff_base(), config.backoff_max()),
        resync: config.resync(),
    };
    controller::run(client, config.namespace.as_deref(), config.concurrency, ctx).await
}
