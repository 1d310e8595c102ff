//! The per-key reconcile driver shared by every source kind.
//!
//! The driver owns the bookkeeping around a reconcile: the finalizer, the status write and
//! the events. What it takes to converge or tear down a resource is left to a [`ReconcileKind`].

use crate::{
    events::{Event, EventRecorder},
    repository::Repository,
    Error, Result,
};
use async_trait::async_trait;
use kube::{core::NamespaceResourceScope, Resource, ResourceExt};
use std::{fmt::Debug, sync::Arc};
use tracing::{debug, error, info, instrument, warn};

/// A resource with a status the driver can recompute and compare.
pub trait Reconcilable:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + Debug + Send + Sync + 'static
{
    type Status: Clone + Default + PartialEq + Debug + Send + Sync;

    fn status(&self) -> Option<&Self::Status>;

    fn status_mut(&mut self) -> &mut Option<Self::Status>;

    /// The status every reconcile of the current generation starts from.
    fn fresh_status(&self) -> Self::Status;

    /// Keep the transition times of the conditions `status` shares with `previous`.
    fn carry_transition_times(status: &mut Self::Status, previous: &Self::Status);
}

#[async_trait]
pub trait ReconcileKind: Send + Sync {
    type Resource: Reconcilable;

    /// Converge `resource`, recording what was observed on `status`.
    ///
    /// Returns the event announcing success.
    async fn reconcile_kind(
        &self,
        resource: &Self::Resource,
        status: &mut <Self::Resource as Reconcilable>::Status,
    ) -> Result<Event>;

    /// Tear down everything `resource` created outside of its own object.
    async fn finalize_kind(
        &self,
        resource: &Self::Resource,
        status: &mut <Self::Resource as Reconcilable>::Status,
    ) -> Result<()>;
}

pub struct Driver<R: ReconcileKind> {
    kind: R,
    repository: Arc<dyn Repository<R::Resource>>,
    recorder: Arc<dyn EventRecorder>,
    finalizer: String,
}

/// Split a `namespace/name` key.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    match key.split_once('/') {
        Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() && !name.contains('/') => {
            Some((namespace, name))
        }
        _ => None,
    }
}

impl<R: ReconcileKind> Driver<R> {
    pub fn new(
        kind: R,
        repository: Arc<dyn Repository<R::Resource>>,
        recorder: Arc<dyn EventRecorder>,
        finalizer: &str,
    ) -> Self {
        Driver { kind, repository, recorder, finalizer: finalizer.to_string() }
    }

    /// Reconcile the resource `namespace/name`.
    ///
    /// A malformed key or a resource that no longer exists is not an error: there is nothing
    /// a retry could do about either.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, key: &str) -> Result<()> {
        let Some((namespace, name)) = split_key(key) else {
            error!("{}", Error::InvalidKey(key.to_string()));
            return Ok(());
        };

        match self.repository.get(namespace, name).await? {
            Some(resource) if resource.meta().deletion_timestamp.is_some() => self.finalize(resource).await,
            Some(resource) => self.converge(resource).await,
            None => {
                debug!("resource no longer exists");
                Ok(())
            }
        }
    }

    fn has_finalizer(&self, resource: &R::Resource) -> bool {
        resource.finalizers().iter().any(|f| *f == self.finalizer)
    }

    async fn record_finalizer_update(&self, resource: &R::Resource) {
        let event = Event::normal("FinalizerUpdate", format!("Updated {:?} finalizers", resource.name_any()));
        self.recorder.record(&resource.object_ref(&()), event).await;
    }

    async fn converge(&self, mut resource: R::Resource) -> Result<()> {
        let mut finalizer_patched = false;
        if !self.has_finalizer(&resource) {
            let mut finalizers = resource.finalizers().to_vec();
            finalizers.push(self.finalizer.clone());
            resource = self.repository.patch_finalizers(&resource, finalizers).await?;
            self.record_finalizer_update(&resource).await;
            finalizer_patched = true;
        }

        let previous = resource.status().cloned();
        let mut status = resource.fresh_status();
        let result = self.kind.reconcile_kind(&resource, &mut status).await;
        if let Some(previous) = &previous {
            R::Resource::carry_transition_times(&mut status, previous);
        }

        let changed = previous.as_ref() != Some(&status);
        if changed {
            let mut updated = resource.clone();
            *updated.status_mut() = Some(status);
            if let Err(e) = self.repository.update_status(&updated).await {
                warn!(error = %e, "failed to update status");
                if result.is_ok() {
                    return Err(e.into());
                }
            }
        } else {
            debug!("status unchanged");
        }

        match &result {
            Ok(_) => info!("reconciled"),
            Err(e) => warn!(error = %e, "reconcile failed"),
        }

        if changed || finalizer_patched {
            let event = match &result {
                Ok(event) => event.clone(),
                Err(e) => Event::from(e),
            };
            self.recorder.record(&resource.object_ref(&()), event).await;
        }

        result.map(|_| ())
    }

    async fn finalize(&self, resource: R::Resource) -> Result<()> {
        if !self.has_finalizer(&resource) {
            debug!("finalizer already removed");
            return Ok(());
        }

        let previous = resource.status().cloned();
        let mut status = previous.clone().unwrap_or_default();
        if let Err(e) = self.kind.finalize_kind(&resource, &mut status).await {
            warn!(error = %e, "teardown failed");
            self.recorder.record(&resource.object_ref(&()), Event::from(&e)).await;
            return Err(e);
        }

        let mut resource = resource;
        if previous.as_ref() != Some(&status) {
            *resource.status_mut() = Some(status);
            resource = self.repository.update_status(&resource).await?;
        }

        let finalizers = resource.finalizers()
            .iter()
            .filter(|f| **f != self.finalizer)
            .cloned()
            .collect();
        let resource = self.repository.patch_finalizers(&resource, finalizers).await?;
        self.record_finalizer_update(&resource).await;
        info!("finalized");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn keys_are_namespace_and_name() {
        assert_eq!(split_key("testnamespace/test-cal"), Some(("testnamespace", "test-cal")));
        assert_eq!(split_key("too/many/parts"), None);
        assert_eq!(split_key("no-namespace"), None);
        assert_eq!(split_key("/test-cal"), None);
    }
}
