//! Deterministic names of the resources a source owns.
//!
//! Every name is a pure function of the source's namespace, name and UID, so the
//! same source always maps to the same resources and two sources never share one.

/// Prefix of the pub/sub topic and logging sink IDs owned by a source.
pub const SOURCE_PREFIX: &str = "cre-src";
/// Longest pub/sub topic ID.
pub const TOPIC_ID_MAX: usize = 255;
/// Longest logging sink ID.
pub const SINK_ID_MAX: usize = 100;
/// Longest Kubernetes object name.
pub const KUBERNETES_NAME_MAX: usize = 63;

/// `prefix_namespace_name_uid`, at most `max` bytes long.
///
/// When too long, the `namespace_name` part is cut short. The prefix and the UID are
/// always kept whole: the UID alone keeps names of different sources apart.
pub fn truncated_resource_name(prefix: &str, namespace: &str, name: &str, uid: &str, max: usize) -> String {
    let full = format!("{prefix}_{namespace}_{name}_{uid}");
    if full.len() <= max {
        return full;
    }

    let middle = format!("{namespace}_{name}");
    let keep = max.saturating_sub(prefix.len() + uid.len() + 2);
    if keep == 0 {
        return format!("{prefix}_{uid}");
    }
    format!("{prefix}_{}_{uid}", truncate(&middle, keep))
}

/// ID of the pub/sub topic a source publishes into.
pub fn topic_id(namespace: &str, name: &str, uid: &str) -> String {
    truncated_resource_name(SOURCE_PREFIX, namespace, name, uid, TOPIC_ID_MAX)
}

/// ID of the logging sink exporting a source's audit logs.
pub fn sink_id(namespace: &str, name: &str, uid: &str) -> String {
    truncated_resource_name(SOURCE_PREFIX, namespace, name, uid, SINK_ID_MAX)
}

/// Full resource path of a pub/sub topic, as a logging sink destination.
pub fn topic_resource_name(project: &str, topic_id: &str) -> String {
    format!("pubsub.googleapis.com/projects/{project}/topics/{topic_id}")
}

/// Name of the Kubernetes service account bound to the Google service account `gsa`.
pub fn workload_identity_service_account(gsa: &str) -> String {
    let local = gsa.split('@').next().unwrap_or(gsa);
    truncate(&format!("cre-{local}"), KUBERNETES_NAME_MAX).to_string()
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
