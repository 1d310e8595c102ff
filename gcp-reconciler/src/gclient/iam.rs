use super::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Role allowing a principal to publish to a pub/sub topic.
pub const PUBSUB_PUBLISHER: &str = "roles/pubsub.publisher";
/// Role allowing a Kubernetes service account to act as a Google service account.
pub const WORKLOAD_IDENTITY_USER: &str = "roles/iam.workloadIdentityUser";

/// An IAM policy: the members granted each role.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
    /// Guards the policy against concurrent writers, when the API supports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl Policy {
    /// Whether `member` has been granted `role`.
    pub fn has(&self, member: &str, role: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.role == role && b.members.iter().any(|m| m == member))
    }

    /// Grant `role` to `member`.
    pub fn add(&mut self, member: &str, role: &str) {
        if self.has(member, role) {
            return;
        }
        match self.bindings.iter_mut().find(|b| b.role == role) {
            Some(binding) => binding.members.push(member.to_string()),
            None => self.bindings.push(Binding {
                role: role.to_string(),
                members: vec![member.to_string()],
            }),
        }
    }

    /// Revoke `role` from `member`, dropping the binding once it has no members.
    pub fn remove(&mut self, member: &str, role: &str) {
        for binding in self.bindings.iter_mut().filter(|b| b.role == role) {
            binding.members.retain(|m| m != member);
        }
        self.bindings.retain(|b| !b.members.is_empty());
    }
}

/// Reads and writes the IAM policy of one resource.
#[async_trait]
pub trait IamHandle: Send + Sync {
    async fn policy(&self) -> Result<Policy>;
    async fn set_policy(&self, policy: &Policy) -> Result<()>;
}

/// IAM of Google service accounts.
#[async_trait]
pub trait IamClient: Send + Sync {
    /// The IAM handle of the Google service account `email`.
    async fn service_account_iam(&self, email: &str) -> Result<Arc<dyn IamHandle>>;
}
