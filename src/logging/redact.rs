use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{AppError, AppResult};

/// Arguments whose values never reach the log.
pub const SENSITIVE_FIELDS: &[&str] = &["password", "oldPassword", "newPassword", "token", "fcmToken"];

pub const MASK: &str = "***";

static GRAPHQL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").unwrap());

/// Write-once set of sensitive field names, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitiveFields {
    names: BTreeSet<String>,
}

impl SensitiveFields {
    pub fn builtin() -> Self {
        Self {
            names: SENSITIVE_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Built-in names plus `extra`, each of which must be a valid GraphQL name.
    pub fn with_extra(extra: &[String]) -> AppResult<Self> {
        let mut fields = Self::builtin();
        for name in extra {
            if !GRAPHQL_NAME.is_match(name) {
                return Err(AppError::configuration(format!("invalid sensitive field name: {name:?}")));
            }
            fields.names.insert(name.clone());
        }
        Ok(fields)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Masks the quoted value following any sensitive field name.
///
/// Matches both `password: "…"` in query documents and `"password":"…"` in
/// JSON, as well as GraphQL block strings (`password: """…"""`). Escaped
/// quotes and backslashes inside the value are consumed as part of it, so the
/// match always ends at the real closing quote.
#[derive(Debug, Clone)]
pub struct Redactor {
    pattern: Regex,
}

impl Redactor {
    pub fn new(fields: &SensitiveFields) -> AppResult<Self> {
        let alternatives: Vec<String> = fields.iter().map(regex::escape).collect();
        let pattern = format!(
            r#"\b(?P<name>{})(?P<sep>"?\s*:\s*)(?:"""(?s:\\"""|.)*?"""|"(?:[^"\\]|\\.)*")"#,
            alternatives.join("|")
        );

        let pattern = Regex::new(&pattern)
            .map_err(|err| AppError::configuration(format!("sensitive field pattern: {err}")))?;
        Ok(Self { pattern })
    }

    pub fn redact<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(input, format!("${{name}}${{sep}}\"{MASK}\"").as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redactor() -> Redactor {
        Redactor::new(&SensitiveFields::builtin()).unwrap()
    }

    #[test]
    fn masks_query_arguments() {
        let out = redactor().redact(r#"mutation { authenticate(userName: "bob", password:"secret value") { token } }"#);
        assert!(out.contains(r#"password:"***""#));
        assert!(!out.contains("secret value"));
        assert!(out.contains(r#"userName: "bob""#));
    }

    #[test]
    fn masks_json_keys_and_keeps_spacing() {
        let out = redactor().redact(r#"{"newPassword" : "hunter2", "oldPassword":"abc"}"#);
        assert_eq!(out, r#"{"newPassword" : "***", "oldPassword":"***"}"#);
    }

    #[test]
    fn escaped_quotes_stay_inside_the_masked_value() {
        let input = r#"password: "a \"b\" c\\", note: "a \"quoted\" word""#;
        let out = redactor().redact(input);
        assert_eq!(out, r#"password: "***", note: "a \"quoted\" word""#);
    }

    #[test]
    fn leaves_other_fields_untouched() {
        let input = r#"passwordHint: "blue", mypassword: "x", note: "a \"quoted\" word""#;
        assert!(matches!(redactor().redact(input), Cow::Borrowed(_)));
    }

    #[test]
    fn masks_block_string_arguments() {
        let out = redactor().redact(r#"login(userName: "bob", password: """top secret""") { token }"#);
        assert_eq!(out, r#"login(userName: "bob", password: "***") { token }"#);

        let multiline = "token: \"\"\"\n  line one \\\"\"\" still secret\n\"\"\", note: \"kept\"";
        let out = redactor().redact(multiline);
        assert_eq!(out, r#"token: "***", note: "kept""#);
    }

    #[test]
    fn extra_names_are_validated() {
        let fields = SensitiveFields::with_extra(&["pin".to_string()]).unwrap();
        assert!(fields.contains("pin"));
        assert!(fields.contains("password"));

        let out = Redactor::new(&fields).unwrap().redact(r#"pin: "1234""#);
        assert_eq!(out, r#"pin: "***""#);

        assert!(matches!(
            SensitiveFields::with_extra(&["pin|.*".to_string()]),
            Err(AppError::Configuration(_))
        ));
    }
}
