use thiserror::Error;

/// How a failed convergence step should be read by an operator.
///
/// Every class is retried; the class only decides the reason a failure is reported with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// A dependency exists but has not reported readiness yet.
    NotYetReady,
    /// A dependency reported itself as failed.
    DependencyFailed,
    /// A call to the Kubernetes API or a cloud API failed.
    ExternalCallFailed,
    /// A dependency claims to be ready but exposes state that cannot be right.
    InvariantViolation,
}

/// The failure of a single convergence step.
#[derive(Error, Clone, Debug, PartialEq)]
#[error("{message}")]
pub struct ConvergeError {
    pub classification: Classification,
    message: String,
}

impl ConvergeError {
    pub fn new(classification: Classification, message: impl Into<String>) -> Self {
        ConvergeError { classification, message: message.into() }
    }

    pub fn not_yet_ready(message: impl Into<String>) -> Self {
        Self::new(Classification::NotYetReady, message)
    }

    pub fn dependency_failed(message: impl Into<String>) -> Self {
        Self::new(Classification::DependencyFailed, message)
    }

    pub fn external(error: impl std::fmt::Display) -> Self {
        Self::new(Classification::ExternalCallFailed, error.to_string())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(Classification::InvariantViolation, message)
    }

    /// Prefix the message with the step that failed.
    pub fn context(self, prefix: &str) -> Self {
        ConvergeError {
            message: format!("{prefix}: {}", self.message),
            ..self
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid resource key: {0:?}")]
    InvalidKey(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Reconcile PubSub failed with: {0}")]
    PubSub(#[source] ConvergeError),

    #[error("Reconcile WorkloadIdentity failed with: {0}")]
    WorkloadIdentity(#[source] ConvergeError),

    #[error("Reconcile Sink failed with: {0}")]
    Sink(#[source] ConvergeError),

    #[error("Failed to delete Stackdriver sink: {0}")]
    SinkDelete(#[source] ConvergeError),

    #[error("Failed to delete workload identity: {0}")]
    WorkloadIdentityDelete(#[source] ConvergeError),

    #[error("Failed to delete PubSub resources: {0}")]
    PubSubDelete(#[source] ConvergeError),

    #[error("cloud client error: {0}")]
    Cloud(#[from] crate::gclient::Error),

    #[error("failed to initialise logging: {0}")]
    Telemetry(String),
}

impl Error {
    /// The reason of the warning event recorded for this error.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::InvalidKey(_) => "InvalidKey",
            Error::Kube(_) => "InternalError",
            Error::PubSub(_) => "PubSubReconcileFailed",
            Error::WorkloadIdentity(_) => "WorkloadIdentityReconcileFailed",
            Error::Sink(_) => "SinkReconcileFailed",
            Error::SinkDelete(_) => "SinkDeleteFailed",
            Error::WorkloadIdentityDelete(_) => "WorkloadIdentityDeleteFailed",
            Error::PubSubDelete(_) => "PubSubDeleteFailed",
            Error::Cloud(_) | Error::Telemetry(_) => "InternalError",
        }
    }

    pub fn classification(&self) -> Classification {
        match self {
            Error::PubSub(e)
            | Error::WorkloadIdentity(e)
            | Error::Sink(e)
            | Error::SinkDelete(e)
            | Error::WorkloadIdentityDelete(e)
            | Error::PubSubDelete(e) => e.classification,
            _ => Classification::ExternalCallFailed,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
