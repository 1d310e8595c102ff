//! In-memory fakes of the Kubernetes and cloud collaborators, recording what is done to them.

use crate::{
    events::{Event, EventRecorder},
    gclient::{
        self,
        iam::{IamClient, IamHandle, Policy},
        logadmin::{LogadminClient, LogadminFactory, Sink},
        metadata::MetadataClient,
        pubsub::{PubsubClient, PubsubFactory},
        CloudClients,
    },
    repository::Repository,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::{core::ErrorResponse, Resource, ResourceExt};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

pub const TEST_PROJECT: &str = "test-project-id";

/// A call that changed a [`FakeRepository`], naming the object as `namespace/name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Create(String),
    Replace(String),
    Delete(String),
    UpdateStatus(String),
    PatchFinalizers(String, Vec<String>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Get,
    Create,
    Replace,
    Delete,
    UpdateStatus,
    PatchFinalizers,
}

struct Store<K> {
    objects: BTreeMap<(String, String), K>,
    actions: Vec<Action>,
    failures: Vec<(Verb, String)>,
    versions: u64,
}

pub struct FakeRepository<K> {
    store: Mutex<Store<K>>,
}

impl<K> Default for FakeRepository<K> {
    fn default() -> Self {
        FakeRepository {
            store: Mutex::new(Store {
                objects: BTreeMap::new(),
                actions: Vec::new(),
                failures: Vec::new(),
                versions: 0,
            }),
        }
    }
}

fn key<K: Resource>(object: &K) -> (String, String) {
    (object.namespace().unwrap_or_default(), object.name_any())
}

fn api_error(code: u16, reason: &str, message: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".into(),
        message: message.into(),
        reason: reason.into(),
        code,
    })
}

impl<K> FakeRepository<K>
where K: Resource + Clone {
    pub fn with(objects: impl IntoIterator<Item = K>) -> Self {
        let repository = Self::default();
        for object in objects {
            repository.insert(object);
        }
        repository
    }

    /// Store `object` as is, without recording an action.
    pub fn insert(&self, object: K) {
        let mut store = self.lock();
        store.objects.insert(key(&object), object);
    }

    pub fn stored(&self, namespace: &str, name: &str) -> Option<K> {
        self.lock().objects.get(&(namespace.to_string(), name.to_string())).cloned()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.lock().actions.clone()
    }

    /// Fail every `verb` call with an internal error carrying `message`.
    pub fn fail(&self, verb: Verb, message: &str) {
        self.lock().failures.push((verb, message.to_string()));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store<K>> {
        self.store.lock().unwrap()
    }

    fn check(store: &Store<K>, verb: Verb) -> Result<(), kube::Error> {
        match store.failures.iter().find(|(v, _)| *v == verb) {
            Some((_, message)) => Err(api_error(500, "InternalError", message)),
            None => Ok(()),
        }
    }

    fn bump(store: &mut Store<K>, object: &mut K) {
        store.versions += 1;
        object.meta_mut().resource_version = Some(store.versions.to_string());
    }
}

#[async_trait]
impl<K> Repository<K> for FakeRepository<K>
where K: Resource + Clone + Send + Sync + 'static {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error> {
        let store = self.lock();
        Self::check(&store, Verb::Get)?;
        Ok(store.objects.get(&(namespace.to_string(), name.to_string())).cloned())
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, kube::Error> {
        let mut store = self.lock();
        let id = (namespace.to_string(), object.name_any());
        store.actions.push(Action::Create(format!("{}/{}", id.0, id.1)));
        Self::check(&store, Verb::Create)?;
        if store.objects.contains_key(&id) {
            return Err(api_error(409, "AlreadyExists", "already exists"));
        }
        let mut created = object.clone();
        created.meta_mut().namespace = Some(namespace.to_string());
        Self::bump(&mut store, &mut created);
        store.objects.insert(id, created.clone());
        Ok(created)
    }

    async fn replace(&self, namespace: &str, object: &K) -> Result<K, kube::Error> {
        let mut store = self.lock();
        let id = (namespace.to_string(), object.name_any());
        store.actions.push(Action::Replace(format!("{}/{}", id.0, id.1)));
        Self::check(&store, Verb::Replace)?;
        let mut replaced = object.clone();
        Self::bump(&mut store, &mut replaced);
        store.objects.insert(id, replaced.clone());
        Ok(replaced)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        let mut store = self.lock();
        store.actions.push(Action::Delete(format!("{namespace}/{name}")));
        Self::check(&store, Verb::Delete)?;
        store.objects.remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn update_status(&self, object: &K) -> Result<K, kube::Error> {
        let mut store = self.lock();
        let id = key(object);
        store.actions.push(Action::UpdateStatus(format!("{}/{}", id.0, id.1)));
        Self::check(&store, Verb::UpdateStatus)?;
        let mut updated = object.clone();
        Self::bump(&mut store, &mut updated);
        store.objects.insert(id, updated.clone());
        Ok(updated)
    }

    async fn patch_finalizers(&self, object: &K, finalizers: Vec<String>) -> Result<K, kube::Error> {
        let mut store = self.lock();
        let id = key(object);
        store.actions.push(Action::PatchFinalizers(format!("{}/{}", id.0, id.1), finalizers.clone()));
        Self::check(&store, Verb::PatchFinalizers)?;
        let mut patched = store.objects.get(&id)
            .cloned()
            .ok_or_else(|| api_error(404, "NotFound", "not found"))?;
        patched.meta_mut().finalizers = Some(finalizers);
        Self::bump(&mut store, &mut patched);
        store.objects.insert(id, patched.clone());
        Ok(patched)
    }
}

#[derive(Default)]
pub struct FakeRecorder {
    events: Mutex<Vec<Event>>,
}

impl FakeRecorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRecorder for FakeRecorder {
    async fn record(&self, _regarding: &ObjectReference, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// Errors returned by the calls of a [`FakeCloud`].
#[derive(Clone, Debug, Default)]
pub struct Faults {
    pub logadmin_client: Option<String>,
    pub sink: Option<String>,
    pub create_sink: Option<String>,
    pub delete_sink: Option<String>,
    pub pubsub_client: Option<String>,
    pub policy: Option<String>,
    pub set_policy: Option<String>,
    pub iam_client: Option<String>,
    pub metadata: Option<String>,
}

#[derive(Default)]
struct CloudState {
    /// Sinks by `project/id`.
    sinks: BTreeMap<String, Sink>,
    /// Policies by resource path.
    policies: BTreeMap<String, Policy>,
    calls: Vec<String>,
    faults: Faults,
}

/// Every cloud API the reconcilers use, in memory.
///
/// Mutating calls are recorded in order, e.g. `create_sink test-project-id/<id>`.
#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<CloudState>>,
}

fn fault(message: &Option<String>) -> gclient::Result<()> {
    match message {
        Some(message) => Err(gclient::Error::Other(message.clone())),
        None => Ok(()),
    }
}

fn topic_path(project: &str, topic_id: &str) -> String {
    format!("projects/{project}/topics/{topic_id}")
}

fn service_account_path(email: &str) -> String {
    format!("projects/-/serviceAccounts/{email}")
}

impl FakeCloud {
    pub fn clients(&self) -> CloudClients {
        CloudClients {
            logadmin: Arc::new(self.clone()),
            pubsub: Arc::new(self.clone()),
            iam: Arc::new(self.clone()),
            metadata: Arc::new(self.clone()),
        }
    }

    pub fn fail(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.lock().faults);
    }

    pub fn add_sink(&self, project: &str, sink: Sink) {
        self.lock().sinks.insert(format!("{project}/{}", sink.id), sink);
    }

    pub fn sink(&self, project: &str, id: &str) -> Option<Sink> {
        self.lock().sinks.get(&format!("{project}/{id}")).cloned()
    }

    pub fn topic_policy(&self, project: &str, topic_id: &str) -> Policy {
        self.policy(&topic_path(project, topic_id))
    }

    pub fn service_account_policy(&self, email: &str) -> Policy {
        self.policy(&service_account_path(email))
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn policy(&self, resource: &str) -> Policy {
        self.lock().policies.get(resource).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CloudState> {
        self.state.lock().unwrap()
    }
}

struct FakeLogadmin {
    cloud: FakeCloud,
    project: String,
}

#[async_trait]
impl LogadminClient for FakeLogadmin {
    async fn sink(&self, id: &str) -> gclient::Result<Sink> {
        let state = self.cloud.lock();
        fault(&state.faults.sink)?;
        state.sinks
            .get(&format!("{}/{id}", self.project))
            .cloned()
            .ok_or_else(|| gclient::Error::NotFound(format!("sink {id} not found")))
    }

    async fn create_sink(&self, sink: &Sink) -> gclient::Result<Sink> {
        let mut state = self.cloud.lock();
        let path = format!("{}/{}", self.project, sink.id);
        state.calls.push(format!("create_sink {path}"));
        fault(&state.faults.create_sink)?;
        if state.sinks.contains_key(&path) {
            return Err(gclient::Error::AlreadyExists(format!("sink {} already exists", sink.id)));
        }
        let created = Sink {
            writer_identity: format!("serviceAccount:{}@gcp-sa-logging.iam.gserviceaccount.com", self.project),
            ..sink.clone()
        };
        state.sinks.insert(path, created.clone());
        Ok(created)
    }

    async fn delete_sink(&self, id: &str) -> gclient::Result<()> {
        let mut state = self.cloud.lock();
        let path = format!("{}/{id}", self.project);
        state.calls.push(format!("delete_sink {path}"));
        fault(&state.faults.delete_sink)?;
        state.sinks
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| gclient::Error::NotFound(format!("sink {id} not found")))
    }
}

#[async_trait]
impl LogadminFactory for FakeCloud {
    async fn create(&self, project: &str) -> gclient::Result<Arc<dyn LogadminClient>> {
        fault(&self.lock().faults.logadmin_client)?;
        Ok(Arc::new(FakeLogadmin { cloud: self.clone(), project: project.to_string() }))
    }
}

struct FakeIam {
    cloud: FakeCloud,
    resource: String,
}

#[async_trait]
impl IamHandle for FakeIam {
    async fn policy(&self) -> gclient::Result<Policy> {
        let state = self.cloud.lock();
        fault(&state.faults.policy)?;
        Ok(state.policies.get(&self.resource).cloned().unwrap_or_default())
    }

    async fn set_policy(&self, policy: &Policy) -> gclient::Result<()> {
        let mut state = self.cloud.lock();
        state.calls.push(format!("set_policy {}", self.resource));
        fault(&state.faults.set_policy)?;
        state.policies.insert(self.resource.clone(), policy.clone());
        Ok(())
    }
}

struct FakePubsub {
    cloud: FakeCloud,
    project: String,
}

impl PubsubClient for FakePubsub {
    fn topic_iam(&self, topic_id: &str) -> Arc<dyn IamHandle> {
        Arc::new(FakeIam { cloud: self.cloud.clone(), resource: topic_path(&self.project, topic_id) })
    }
}

#[async_trait]
impl PubsubFactory for FakeCloud {
    async fn create(&self, project: &str) -> gclient::Result<Arc<dyn PubsubClient>> {
        fault(&self.lock().faults.pubsub_client)?;
        Ok(Arc::new(FakePubsub { cloud: self.clone(), project: project.to_string() }))
    }
}

#[async_trait]
impl IamClient for FakeCloud {
    async fn service_account_iam(&self, email: &str) -> gclient::Result<Arc<dyn IamHandle>> {
        fault(&self.lock().faults.iam_client)?;
        Ok(Arc::new(FakeIam { cloud: self.clone(), resource: service_account_path(email) }))
    }
}

#[async_trait]
impl MetadataClient for FakeCloud {
    async fn project_id(&self) -> gclient::Result<String> {
        fault(&self.lock().faults.metadata)?;
        Ok(TEST_PROJECT.to_string())
    }
}
