//! Duck types shared by the GCP event sources: where events go, how a source
//! reaches pub/sub and the status every source reports.
mod duck;

// expose only v1 types
pub use duck::v1::*;

/// Derive for condition enums. Generated code refers to `gcp_conditions` directly.
pub mod derive {
    pub use gcp_derive::ConditionType;
}
