//! Runs the [`Driver`] of CloudAuditLogsSources on the kube-runtime controller.
//!
//! The controller watches sources and the Topics and PullSubscriptions they own, and never
//! reconciles the same source twice at once.

use crate::{
    auditlogs::Reconciler,
    backoff::Backoff,
    reconciler::Driver,
    Error, Result,
};
use futures::StreamExt;
use gcp_events::apis::{
    events::v1::CloudAuditLogsSource,
    intevents::v1::{PullSubscription, Topic},
};
use kube::{
    core::NamespaceResourceScope,
    runtime::{
        controller::{self, Action},
        watcher, Controller,
    },
    Api, Client, Resource, ResourceExt,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

pub struct Context {
    pub driver: Driver<Reconciler>,
    pub backoff: Backoff,
    /// Requeue delay after a successful reconcile.
    pub resync: Duration,
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> {
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

fn key(source: &CloudAuditLogsSource) -> String {
    format!("{}/{}", source.namespace().unwrap_or_default(), source.name_any())
}

async fn reconcile(source: Arc<CloudAuditLogsSource>, ctx: Arc<Context>) -> Result<Action> {
    let key = key(&source);
    ctx.driver.reconcile(&key).await?;
    ctx.backoff.reset(&key);
    Ok(Action::requeue(ctx.resync))
}

fn error_policy(source: Arc<CloudAuditLogsSource>, error: &Error, ctx: Arc<Context>) -> Action {
    let key = key(&source);
    let delay = ctx.backoff.next_delay(&key);
    error!(%key, %error, reason = error.reason(), ?delay, "reconcile failed, requeueing");
    Action::requeue(delay)
}

/// Run until a termination signal is received.
pub async fn run(client: Client, namespace: Option<&str>, concurrency: u16, ctx: Context) -> Result<()> {
    let sources = api::<CloudAuditLogsSource>(&client, namespace);
    if let Err(e) = sources.list(&Default::default()).await {
        error!("CloudAuditLogsSource CRD is not queryable, is it installed? {e}");
        return Err(Error::Kube(e));
    }

    info!(namespace = namespace.unwrap_or("*"), concurrency, "starting controller");
    Controller::new(sources, watcher::Config::default())
        .owns(api::<Topic>(&client, namespace), watcher::Config::default())
        .owns(api::<PullSubscription>(&client, namespace), watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, Arc::new(ctx))
        .for_each(|res| async move {
            match res {
                Ok((source, _)) => debug!(source = %source.name, "reconciled"),
                Err(e) => warn!("controller error: {e}"),
            }
        })
        .await;

    info!("controller stopped");
    Ok(())
}
