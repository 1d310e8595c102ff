//! The control loop of GCP event sources.
//!
//! A [`reconciler::Driver`] converges one source per call. It keeps the source's Topic and
//! PullSubscription, its workload identity and its Stackdriver sink in line with what the
//! source asks for, records what it observed as status conditions and tears everything down
//! behind a finalizer. [`controller`] runs it on the kube-runtime controller.

pub mod auditlogs;
pub mod backoff;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod gclient;
pub mod identity;
pub mod intevents;
pub mod names;
pub mod reconciler;
pub mod repository;
pub mod resources;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
