//! Job store abstraction.
//!
//! The dispatcher and the HTTP layer only see [`JobStore`]. PostgreSQL is the
//! production backend; an in-memory backend backs the tests.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use uuid::Uuid;

use super::models::DeployJob;

/// Prefix of every generated remote function name
pub const FUNCTION_NAME_PREFIX: &str = "gcf_function_";

const FUNCTION_NAME_SUFFIX_LEN: usize = 12;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Errors raised by job store backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid job row: {0}")]
    InvalidRow(String),

    #[error("could not allocate a unique function name after {0} attempts")]
    FunctionNameExhausted(usize),
}

/// Durable table of deploy jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a `pending` job with a fresh, unique function name.
    async fn enqueue(&self, prompt: &str, clarification: &str) -> Result<DeployJob, StoreError>;

    /// Atomically move the oldest `pending` job to `processing` and return it.
    ///
    /// Two concurrent callers never receive the same job.
    async fn claim_next_pending(&self) -> Result<Option<DeployJob>, StoreError>;

    /// Record a successful deployment. Returns whether a row changed.
    async fn mark_completed(&self, id: Uuid, deployed_url: &str) -> Result<bool, StoreError>;

    /// Record a failed job. Returns whether a row changed.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<DeployJob>, StoreError>;

    /// Fail every `processing` job untouched for longer than `older_than`.
    async fn fail_stale_processing(&self, older_than: Duration) -> Result<Vec<Uuid>, StoreError>;

    /// Connectivity check for the readiness endpoint
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Generate a remote resource name: `gcf_function_` plus 12 base-36 characters.
pub fn generate_function_name() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..FUNCTION_NAME_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{FUNCTION_NAME_PREFIX}{suffix}")
}

/// Error text written to jobs failed by the stale sweep
pub fn abandoned_message(older_than: Duration) -> String {
    format!(
        "Job abandoned: no result was recorded within {} minutes",
        older_than.as_secs() / 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_names_are_valid_remote_identifiers() {
        let name = generate_function_name();
        assert!(name.starts_with(FUNCTION_NAME_PREFIX));
        assert_eq!(name.len(), FUNCTION_NAME_PREFIX.len() + FUNCTION_NAME_SUFFIX_LEN);
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }

    #[test]
    fn function_names_differ_between_calls() {
        let a = generate_function_name();
        let b = generate_function_name();
        assert_ne!(a, b);
    }
}
