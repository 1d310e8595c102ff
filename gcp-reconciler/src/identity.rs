//! Workload identity: lets the receive adapter of a source act as a Google service account
//! through a Kubernetes service account bound to it.

use crate::{
    error::ConvergeError,
    gclient::iam::{IamClient, WORKLOAD_IDENTITY_USER},
    names,
    repository::Repository,
};
use k8s_openapi::{api::core::v1::ServiceAccount, apimachinery::pkg::apis::meta::v1::OwnerReference};
use kube::{api::ObjectMeta, ResourceExt};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, info, instrument};

/// Annotation binding a Kubernetes service account to a Google service account.
pub const WORKLOAD_IDENTITY_ANNOTATION: &str = "iam.gke.io/gcp-service-account";

/// The IAM member standing for the Kubernetes service account `ksa` of `namespace`.
pub fn workload_identity_member(project: &str, namespace: &str, ksa: &str) -> String {
    format!("serviceAccount:{project}.svc.id.goog[{namespace}/{ksa}]")
}

#[derive(Clone)]
pub struct Identity {
    service_accounts: Arc<dyn Repository<ServiceAccount>>,
    iam: Arc<dyn IamClient>,
}

impl Identity {
    pub fn new(service_accounts: Arc<dyn Repository<ServiceAccount>>, iam: Arc<dyn IamClient>) -> Self {
        Identity { service_accounts, iam }
    }

    /// Ensure the Kubernetes service account bound to `gsa` exists, is owned by `owner` and may
    /// act as `gsa`. Returns its name.
    ///
    /// The service account is shared by every source of the namespace running as `gsa`, so
    /// ownership is recorded without claiming to be its controller.
    #[instrument(skip(self, owner))]
    pub async fn reconcile_workload_identity(
        &self,
        owner: OwnerReference,
        namespace: &str,
        gsa: &str,
        project: &str,
    ) -> Result<String, ConvergeError> {
        let ksa_name = names::workload_identity_service_account(gsa);
        let owner = OwnerReference { controller: Some(false), ..owner };

        let existing = self.service_accounts
            .get(namespace, &ksa_name)
            .await
            .map_err(ConvergeError::external)?;

        match existing {
            None => {
                info!(ksa = %ksa_name, "creating Kubernetes service account");
                let ksa = ServiceAccount {
                    metadata: ObjectMeta {
                        name: Some(ksa_name.clone()),
                        namespace: Some(namespace.to_string()),
                        annotations: Some(BTreeMap::from([(
                            WORKLOAD_IDENTITY_ANNOTATION.to_string(),
                            gsa.to_string(),
                        )])),
                        owner_references: Some(vec![owner]),
                        ..Default::default()
                    },
                    ..Default::default()
                };
                self.service_accounts.create(namespace, &ksa).await.map_err(ConvergeError::external)?;
            }
            Some(mut ksa) if !ksa.owner_references().iter().any(|o| o.uid == owner.uid) => {
                debug!(ksa = %ksa_name, "adding owner to Kubernetes service account");
                ksa.owner_references_mut().push(owner);
                self.service_accounts.replace(namespace, &ksa).await.map_err(ConvergeError::external)?;
            }
            Some(_) => {}
        }

        let member = workload_identity_member(project, namespace, &ksa_name);
        let handle = self.iam.service_account_iam(gsa).await.map_err(ConvergeError::external)?;
        let mut policy = handle.policy().await.map_err(ConvergeError::external)?;
        if !policy.has(&member, WORKLOAD_IDENTITY_USER) {
            info!(%member, "granting workload identity user");
            policy.add(&member, WORKLOAD_IDENTITY_USER);
            handle.set_policy(&policy).await.map_err(ConvergeError::external)?;
        }

        Ok(ksa_name)
    }

    /// Revoke the binding of the Kubernetes service account to `gsa` once the source
    /// `owner_uid` is the last one using it.
    ///
    /// The service account itself is left to garbage collection through its owners.
    #[instrument(skip(self))]
    pub async fn delete_workload_identity(
        &self,
        owner_uid: &str,
        namespace: &str,
        gsa: &str,
        project: &str,
    ) -> Result<(), ConvergeError> {
        let ksa_name = names::workload_identity_service_account(gsa);
        let Some(ksa) = self.service_accounts
            .get(namespace, &ksa_name)
            .await
            .map_err(ConvergeError::external)?
        else {
            return Ok(());
        };

        let owners = ksa.owner_references();
        if owners.len() != 1 || owners[0].uid != owner_uid {
            debug!(ksa = %ksa_name, owners = owners.len(), "Kubernetes service account still in use");
            return Ok(());
        }

        let member = workload_identity_member(project, namespace, &ksa_name);
        let handle = self.iam.service_account_iam(gsa).await.map_err(ConvergeError::external)?;
        let mut policy = handle.policy().await.map_err(ConvergeError::external)?;
        if policy.has(&member, WORKLOAD_IDENTITY_USER) {
            info!(%member, "revoking workload identity user");
            policy.remove(&member, WORKLOAD_IDENTITY_USER);
            handle.set_policy(&policy).await.map_err(ConvergeError::external)?;
        }
        Ok(())
    }
}
