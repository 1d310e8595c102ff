pub mod addressable_type;
pub mod knative_reference;
pub mod pubsub_types;
pub mod source_types;
pub mod status_types;
