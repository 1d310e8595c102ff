//! Typed access to the Kubernetes objects a reconciler reads and writes.

use async_trait::async_trait;
use kube::{
    api::{Api, DeleteParams, Patch, PatchParams, PostParams},
    core::NamespaceResourceScope,
    Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::{fmt::Debug, marker::PhantomData};

/// Namespaced objects of one kind, addressed by namespace and name.
#[async_trait]
pub trait Repository<K>: Send + Sync
where K: Clone + Send + Sync + 'static {
    /// `None` when the object does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error>;

    async fn create(&self, namespace: &str, object: &K) -> Result<K, kube::Error>;

    /// Replace the object, guarded by its resource version.
    async fn replace(&self, namespace: &str, object: &K) -> Result<K, kube::Error>;

    /// Delete the object in the background. Deleting a missing object succeeds.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), kube::Error>;

    /// Write the status subresource of the object.
    async fn update_status(&self, object: &K) -> Result<K, kube::Error>;

    /// Set the finalizers of the object, guarded by its resource version.
    async fn patch_finalizers(&self, object: &K, finalizers: Vec<String>) -> Result<K, kube::Error>;
}

/// A [`Repository`] backed by the Kubernetes API.
pub struct KubeRepository<K> {
    client: Client,
    field_manager: String,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeRepository<K> {
    pub fn new(client: Client, field_manager: &str) -> Self {
        KubeRepository {
            client,
            field_manager: field_manager.to_string(),
            _kind: PhantomData,
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

impl<K> KubeRepository<K>
where K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> {
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn api_for(&self, object: &K) -> Api<K> {
        self.api(&object.namespace().unwrap_or_default())
    }
}

#[async_trait]
impl<K> Repository<K> for KubeRepository<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error> {
        self.api(namespace).get_opt(name).await
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, kube::Error> {
        self.api(namespace).create(&self.post_params(), object).await
    }

    async fn replace(&self, namespace: &str, object: &K) -> Result<K, kube::Error> {
        self.api(namespace).replace(&object.name_any(), &self.post_params(), object).await
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        match self.api(namespace).delete(name, &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn update_status(&self, object: &K) -> Result<K, kube::Error> {
        let data = serde_json::to_vec(object).map_err(kube::Error::SerdeError)?;
        self.api_for(object)
            .replace_status(&object.name_any(), &self.post_params(), data)
            .await
    }

    async fn patch_finalizers(&self, object: &K, finalizers: Vec<String>) -> Result<K, kube::Error> {
        let patch = json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": object.resource_version(),
            }
        });
        let params = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        self.api_for(object)
            .patch(&object.name_any(), &params, &Patch::Merge(&patch))
            .await
    }
}
