mod pullsubscription;
mod topic;

pub use pullsubscription::*;
pub use topic::*;

/// API group of the pub/sub resources owned by event sources.
pub const GROUP: &str = "internal.events.cloud.google.com";
