//! The Google Cloud APIs the reconcilers drive, as traits.
//!
//! [`rest`] implements them over the Google REST APIs.

pub mod iam;
pub mod logadmin;
pub mod metadata;
pub mod pubsub;
pub mod rest;

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every cloud client a source reconciler needs.
#[derive(Clone)]
pub struct CloudClients {
    pub logadmin: Arc<dyn logadmin::LogadminFactory>,
    pub pubsub: Arc<dyn pubsub::PubsubFactory>,
    pub iam: Arc<dyn iam::IamClient>,
    pub metadata: Arc<dyn metadata::MetadataClient>,
}
