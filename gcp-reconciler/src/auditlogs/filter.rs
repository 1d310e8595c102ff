//! The logging filter selecting the audit logs of a source.

const AUDIT_LOG_TYPE: &str = "type.googleapis.com/google.cloud.audit.AuditLog";

/// Builds an advanced logs filter out of equality clauses, joined with `AND`.
#[derive(Default)]
pub struct FilterBuilder {
    clauses: Vec<String>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match entries whose `field` equals `value`.
    pub fn equals(mut self, field: &str, value: &str) -> Self {
        self.clauses.push(format!("{field}={}", quote(value)));
        self
    }

    pub fn build(self) -> String {
        self.clauses.join(" AND ")
    }
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Audit log entries of `method_name` on `service_name`, narrowed to `resource_name` when given.
pub fn audit_log_filter(service_name: &str, method_name: &str, resource_name: Option<&str>) -> String {
    let mut filter = FilterBuilder::new()
        .equals("protoPayload.methodName", method_name)
        .equals("protoPayload.serviceName", service_name);
    if let Some(resource_name) = resource_name {
        filter = filter.equals("protoPayload.resourceName", resource_name);
    }
    filter.equals(r#"protoPayload."@type""#, AUDIT_LOG_TYPE).build()
}
