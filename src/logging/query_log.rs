use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::format::{format_variables, VariableValue};
use super::redact::{Redactor, SensitiveFields};
use crate::config::QueryLogConfig;
use crate::errors::AppResult;

const DOCUMENT_HASH_LEN: usize = 12;

/// Diagnostic hooks for GraphQL requests.
///
/// Built once at startup and shared read-only; every request gets its own
/// [`QueryLogScope`] holding its own timer.
#[derive(Debug, Clone)]
pub struct QueryLogger {
    fields: SensitiveFields,
    redactor: Redactor,
    column_width: usize,
    enabled: bool,
}

impl QueryLogger {
    pub fn new(config: &QueryLogConfig) -> AppResult<Self> {
        let fields = SensitiveFields::with_extra(&config.extra_sensitive_fields)?;
        let redactor = Redactor::new(&fields)?;

        Ok(Self {
            fields,
            redactor,
            column_width: config.column_width,
            enabled: config.enabled,
        })
    }

    pub fn sensitive_fields(&self) -> &SensitiveFields {
        &self.fields
    }

    /// Request-begin hook. Returns the scope that produces the matching end line.
    pub fn begin(&self, query: Option<&str>, variables: &[VariableValue]) -> QueryLogScope {
        let scope = QueryLogScope {
            request_id: Uuid::new_v4(),
            document: query.map(document_hash).unwrap_or_else(|| "-".to_string()),
            started: Instant::now(),
            enabled: self.enabled,
            line: String::new(),
        };

        let mut line = format!("Query started [request={} document={}]", scope.request_id, scope.document);
        if let Some(query) = query {
            line.push('\n');
            line.push_str(query.trim());
        }
        if !variables.is_empty() {
            line.push_str("\nVariables:\n");
            line.push_str(&format_variables(variables, &self.fields, self.column_width));
        }

        let line = self.redactor.redact(&line).into_owned();
        if self.enabled {
            tracing::info!(target: "pronto_mia::query", "{}", line);
        }

        QueryLogScope { line, ..scope }
    }
}

/// Per-request logging state. Owned by exactly one request.
#[derive(Debug)]
pub struct QueryLogScope {
    request_id: Uuid,
    document: String,
    started: Instant,
    enabled: bool,
    line: String,
}

impl QueryLogScope {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The redacted "started" line.
    pub fn started_line(&self) -> &str {
        &self.line
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Request-end hook.
    pub fn end(self) -> String {
        let elapsed_ms = self.elapsed().as_secs_f64() * 1000.0;
        let line = format!(
            "Query ended [request={} document={}] in {:.3} ms",
            self.request_id, self.document, elapsed_ms
        );
        if self.enabled {
            tracing::info!(target: "pronto_mia::query", elapsed_ms, "{}", line);
        }
        line
    }
}

fn document_hash(query: &str) -> String {
    let digest = hex::encode(Sha256::digest(query.as_bytes()));
    digest[..DOCUMENT_HASH_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn logger() -> QueryLogger {
        QueryLogger::new(&QueryLogConfig::default()).unwrap()
    }

    #[test]
    fn started_line_redacts_query_and_variables() {
        let query = r#"mutation { changePassword(oldPassword: "old secret", newPassword: $pw) { id } }"#;
        let vars = vec![
            VariableValue::new("pw", json!("new secret"), "String!"),
            VariableValue::new("newPassword", json!("other secret"), "String!"),
            VariableValue::new("note", json!("a \"quoted\" word"), "String"),
        ];
        let scope = logger().begin(Some(query), &vars);
        let line = scope.started_line();

        assert!(line.contains(r#"oldPassword: "***""#));
        assert!(!line.contains("old secret"));
        assert!(!line.contains("other secret"));
        assert!(line.contains("Variables:"));
        assert!(line.contains(r#"a \"quoted"#));
        // `pw` is not a sensitive name, only `newPassword` is
        assert!(line.contains("new secret"));
    }

    #[test]
    fn end_line_reports_elapsed_time() {
        let scope = logger().begin(Some("{ externalNews { id } }"), &[]);
        let id = scope.request_id().to_string();
        let line = scope.end();

        assert!(line.starts_with("Query ended"));
        assert!(line.contains(&id));
        assert!(line.ends_with(" ms"));
    }

    #[test]
    fn scopes_keep_independent_timers() {
        let logger = logger();
        let first = logger.begin(None, &[]);
        std::thread::sleep(Duration::from_millis(30));
        let second = logger.begin(None, &[]);

        assert!(second.elapsed() < first.elapsed());
        second.end();
        assert!(first.elapsed() >= Duration::from_millis(30));
        assert_ne!(first.request_id(), logger.begin(None, &[]).request_id());
    }

    #[test]
    fn same_document_hashes_identically() {
        let a = document_hash("{ users { id } }");
        assert_eq!(a, document_hash("{ users { id } }"));
        assert_ne!(a, document_hash("{ user(id: 1) { id } }"));
        assert_eq!(a.len(), DOCUMENT_HASH_LEN);
    }
}
