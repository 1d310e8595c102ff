mod cloudauditlogssource;

pub use cloudauditlogssource::*;

/// API group of the user facing event sources.
pub const GROUP: &str = "events.cloud.google.com";
/// Label naming the source that owns an internal resource.
pub const SOURCE_NAME_LABEL: &str = "events.cloud.google.com/source-name";
