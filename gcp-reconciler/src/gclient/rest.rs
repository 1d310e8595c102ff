//! The cloud client traits over the Google REST APIs, authenticated with the
//! access token of the service account the controller runs as.

use super::{
    iam::{IamClient, IamHandle, Policy},
    logadmin::{LogadminClient, LogadminFactory, Sink},
    metadata::MetadataClient,
    pubsub::{PubsubClient, PubsubFactory},
    CloudClients, Error, Result,
};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::debug;

const METADATA_FLAVOR: (&str, &str) = ("Metadata-Flavor", "Google");
/// Tokens are refreshed this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Base URLs of the Google APIs.
#[derive(Clone, Debug)]
pub struct Endpoints {
    pub logging: String,
    pub pubsub: String,
    pub iam: String,
    pub metadata: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            logging: "https://logging.googleapis.com".into(),
            pubsub: "https://pubsub.googleapis.com".into(),
            iam: "https://iam.googleapis.com".into(),
            metadata: "http://metadata.google.internal".into(),
        }
    }
}

impl Endpoints {
    /// Every API served from `base`.
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Endpoints {
            logging: base.clone(),
            pubsub: base.clone(),
            iam: base.clone(),
            metadata: base,
        }
    }
}

#[derive(Deserialize)]
struct AccessToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

struct Inner {
    http: reqwest::Client,
    endpoints: Endpoints,
    token: Mutex<Option<CachedToken>>,
}

/// Clients of the logging, pub/sub, IAM and metadata APIs sharing one HTTP client.
#[derive(Clone)]
pub struct RestClients {
    inner: Arc<Inner>,
}

impl RestClients {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(RestClients {
            inner: Arc::new(Inner { http, endpoints, token: Mutex::new(None) }),
        })
    }

    pub fn cloud_clients(&self) -> CloudClients {
        CloudClients {
            logadmin: Arc::new(self.clone()),
            pubsub: Arc::new(self.clone()),
            iam: Arc::new(self.clone()),
            metadata: Arc::new(self.clone()),
        }
    }

    fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    async fn token(&self) -> Result<String> {
        let mut cached = self.inner.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.token.clone());
        }

        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.endpoints().metadata
        );
        let response = self.inner.http.get(url)
            .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
            .send()
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
        let token: AccessToken = json_body(check(response).await?).await?;
        debug!(expires_in = token.expires_in, "refreshed access token");

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.token().await?;
        let response = request.bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
        check(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        json_body(self.send(request).await?).await
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error.message,
        Err(_) => status.to_string(),
    };
    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::CONFLICT => Error::AlreadyExists(message),
        _ => Error::Other(message),
    })
}

async fn json_body<T: DeserializeOwned>(response: Response) -> Result<T> {
    response.json().await.map_err(|e| Error::Other(e.to_string()))
}

struct RestLogadmin {
    clients: RestClients,
    sinks_url: String,
}

#[async_trait]
impl LogadminClient for RestLogadmin {
    async fn sink(&self, id: &str) -> Result<Sink> {
        let http = &self.clients.inner.http;
        self.clients.send_json(http.get(format!("{}/{id}", self.sinks_url))).await
    }

    async fn create_sink(&self, sink: &Sink) -> Result<Sink> {
        let request = self.clients.inner.http
            .post(&self.sinks_url)
            .query(&[("uniqueWriterIdentity", "true")])
            .json(sink);
        self.clients.send_json(request).await
    }

    async fn delete_sink(&self, id: &str) -> Result<()> {
        let http = &self.clients.inner.http;
        self.clients.send(http.delete(format!("{}/{id}", self.sinks_url))).await?;
        Ok(())
    }
}

#[async_trait]
impl LogadminFactory for RestClients {
    async fn create(&self, project: &str) -> Result<Arc<dyn LogadminClient>> {
        Ok(Arc::new(RestLogadmin {
            clients: self.clone(),
            sinks_url: format!("{}/v2/projects/{project}/sinks", self.endpoints().logging),
        }))
    }
}

/// How an API exposes `getIamPolicy`: pub/sub as a GET, IAM as a POST with an options body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PolicyRead {
    Get,
    Post,
}

/// IAM of a single resource, through its `getIamPolicy` and `setIamPolicy` methods.
struct RestIam {
    clients: RestClients,
    resource_url: String,
    read: PolicyRead,
}

#[async_trait]
impl IamHandle for RestIam {
    async fn policy(&self) -> Result<Policy> {
        let http = &self.clients.inner.http;
        let url = format!("{}:getIamPolicy", self.resource_url);
        let request = match self.read {
            PolicyRead::Get => http.get(url),
            PolicyRead::Post => http.post(url).json(&json!({})),
        };
        self.clients.send_json(request).await
    }

    async fn set_policy(&self, policy: &Policy) -> Result<()> {
        let request = self.clients.inner.http
            .post(format!("{}:setIamPolicy", self.resource_url))
            .json(&json!({ "policy": policy }));
        self.clients.send(request).await?;
        Ok(())
    }
}

struct RestPubsub {
    clients: RestClients,
    project: String,
}

impl PubsubClient for RestPubsub {
    fn topic_iam(&self, topic_id: &str) -> Arc<dyn IamHandle> {
        Arc::new(RestIam {
            clients: self.clients.clone(),
            resource_url: format!(
                "{}/v1/projects/{}/topics/{topic_id}",
                self.clients.endpoints().pubsub,
                self.project
            ),
            read: PolicyRead::Get,
        })
    }
}

#[async_trait]
impl PubsubFactory for RestClients {
    async fn create(&self, project: &str) -> Result<Arc<dyn PubsubClient>> {
        Ok(Arc::new(RestPubsub { clients: self.clone(), project: project.to_string() }))
    }
}

#[async_trait]
impl IamClient for RestClients {
    async fn service_account_iam(&self, email: &str) -> Result<Arc<dyn IamHandle>> {
        Ok(Arc::new(RestIam {
            clients: self.clone(),
            resource_url: format!("{}/v1/projects/-/serviceAccounts/{email}", self.endpoints().iam),
            read: PolicyRead::Post,
        }))
    }
}

#[async_trait]
impl MetadataClient for RestClients {
    async fn project_id(&self) -> Result<String> {
        let response = self.inner.http
            .get(format!("{}/computeMetadata/v1/project/project-id", self.endpoints().metadata))
            .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
            .send()
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
        check(response).await?
            .text()
            .await
            .map_err(|e| Error::Other(e.to_string()))
    }
}
