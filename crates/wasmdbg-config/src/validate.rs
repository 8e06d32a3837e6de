use crate::config::Config;
use crate::error::Violation;

/// Upper bound for `session.max_memory_read` (16 MiB).
pub const MAX_MEMORY_READ_LIMIT: usize = 16 * 1024 * 1024;

/// Largest accepted `session.source_context_lines`.
pub const MAX_CONTEXT_LINES: usize = 200;

/// Every out-of-range setting in `config`, in declaration order.
pub fn validate(config: &Config) -> Vec<Violation> {
    let session = &config.session;
    let mut violations = Vec::new();

    let context = session.source_context_lines;
    if context == 0 || context > MAX_CONTEXT_LINES {
        violations.push(Violation::new(
            "session.source_context_lines",
            format!("must be 1-{MAX_CONTEXT_LINES}, got {context}"),
        ));
    }

    let max_read = session.max_memory_read;
    if max_read == 0 || max_read > MAX_MEMORY_READ_LIMIT {
        violations.push(Violation::new(
            "session.max_memory_read",
            format!("must be 1-{MAX_MEMORY_READ_LIMIT} bytes, got {max_read}"),
        ));
    }

    if session
        .source_roots
        .iter()
        .any(|root| root.as_os_str().is_empty())
    {
        violations.push(Violation::new(
            "session.source_roots",
            "entries must not be empty",
        ));
    }

    if session.thread_id <= 0 {
        violations.push(Violation::new(
            "session.thread_id",
            format!("must be positive, got {}", session.thread_id),
        ));
    }

    violations
}
