//! Query logging with sensitive-field redaction.

mod format;
mod query_log;
mod redact;

pub use format::{format_variables, FormatError, VariableValue};
pub use query_log::{QueryLogScope, QueryLogger};
pub use redact::{Redactor, SensitiveFields, MASK, SENSITIVE_FIELDS};
