//! In-memory job store for tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::models::{DeployJob, JobState};
use super::store::{abandoned_message, generate_function_name, JobStore, StoreError};

/// Job store kept in a mutex-guarded vector, in insertion order.
///
/// Not suitable for production: data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<DeployJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a job's `updated_at` into the past.
    pub fn backdate(&self, id: Uuid, by: Duration) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id) {
            job.updated_at -= chrono::Duration::from_std(by).unwrap();
        }
    }

    fn with_jobs<T>(&self, f: impl FnOnce(&mut Vec<DeployJob>) -> T) -> Result<T, StoreError> {
        Ok(f(&mut self.jobs.lock().unwrap()))
    }

    fn finish(&self, id: Uuid, state: JobState) -> Result<bool, StoreError> {
        self.with_jobs(|jobs| match jobs.iter_mut().find(|j| j.id == id) {
            Some(job) if job.state == JobState::Processing => {
                job.state = state;
                job.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(&self, prompt: &str, clarification: &str) -> Result<DeployJob, StoreError> {
        self.with_jobs(|jobs| {
            let mut function_name = generate_function_name();
            while jobs.iter().any(|j| j.function_name == function_name) {
                function_name = generate_function_name();
            }

            let now = Utc::now();
            let job = DeployJob {
                id: Uuid::new_v4(),
                prompt: prompt.to_string(),
                clarification: clarification.to_string(),
                function_name,
                state: JobState::Pending,
                created_at: now,
                updated_at: now,
            };
            jobs.push(job.clone());
            job
        })
    }

    async fn claim_next_pending(&self) -> Result<Option<DeployJob>, StoreError> {
        self.with_jobs(|jobs| {
            let job = jobs.iter_mut().find(|j| j.state == JobState::Pending)?;
            job.state = JobState::Processing;
            job.updated_at = Utc::now();
            Some(job.clone())
        })
    }

    async fn mark_completed(&self, id: Uuid, deployed_url: &str) -> Result<bool, StoreError> {
        self.finish(
            id,
            JobState::Completed {
                deployed_url: deployed_url.to_string(),
            },
        )
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool, StoreError> {
        self.finish(
            id,
            JobState::Failed {
                error: error.to_string(),
            },
        )
    }

    async fn get(&self, id: Uuid) -> Result<Option<DeployJob>, StoreError> {
        self.with_jobs(|jobs| jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn fail_stale_processing(&self, older_than: Duration) -> Result<Vec<Uuid>, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap();
        let error = abandoned_message(older_than);

        self.with_jobs(|jobs| {
            jobs.iter_mut()
                .filter(|j| j.state == JobState::Processing && j.updated_at < cutoff)
                .map(|job| {
                    job.state = JobState::Failed {
                        error: error.clone(),
                    };
                    job.updated_at = Utc::now();
                    job.id
                })
                .collect()
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::JobStatus;

    #[tokio::test]
    async fn enqueue_creates_pending_jobs_with_distinct_names() {
        let store = MemoryJobStore::new();
        let a = store.enqueue("first", "").await.unwrap();
        let b = store.enqueue("second", "more detail").await.unwrap();

        assert_eq!(a.status(), JobStatus::Pending);
        assert_ne!(a.function_name, b.function_name);
        assert_eq!(store.get(b.id).await.unwrap().unwrap().clarification, "more detail");
    }

    #[tokio::test]
    async fn concurrent_claims_hand_out_a_single_job_once() {
        let store = MemoryJobStore::new();
        let job = store.enqueue("only one", "").await.unwrap();

        let (first, second) = tokio::join!(store.claim_next_pending(), store.claim_next_pending());
        let claimed: Vec<_> = [first.unwrap(), second.unwrap()]
            .into_iter()
            .flatten()
            .collect();

        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, job.id);
        assert_eq!(claimed[0].status(), JobStatus::Processing);
    }

    #[tokio::test]
    async fn claims_oldest_pending_first() {
        let store = MemoryJobStore::new();
        let first = store.enqueue("first", "").await.unwrap();
        store.enqueue("second", "").await.unwrap();

        let claimed = store.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
    }

    #[tokio::test]
    async fn terminal_writes_only_apply_to_processing_jobs() {
        let store = MemoryJobStore::new();
        let job = store.enqueue("p", "").await.unwrap();

        assert!(!store.mark_completed(job.id, "https://early").await.unwrap());

        store.claim_next_pending().await.unwrap();
        assert!(store.mark_completed(job.id, "https://fn.example").await.unwrap());
        // repeat is a no-op, and a terminal job never moves again
        assert!(!store.mark_completed(job.id, "https://fn.example").await.unwrap());
        assert!(!store.mark_failed(job.id, "late failure").await.unwrap());

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state.deployed_url(), Some("https://fn.example"));
        assert_eq!(stored.state.error(), None);
    }

    #[tokio::test]
    async fn stale_sweep_fails_only_old_processing_jobs() {
        let store = MemoryJobStore::new();
        let stale = store.enqueue("stale", "").await.unwrap();
        let fresh = store.enqueue("fresh", "").await.unwrap();
        let waiting = store.enqueue("waiting", "").await.unwrap();
        store.claim_next_pending().await.unwrap();
        store.claim_next_pending().await.unwrap();
        store.backdate(stale.id, Duration::from_secs(45 * 60));

        let reaped = store
            .fail_stale_processing(Duration::from_secs(30 * 60))
            .await
            .unwrap();

        assert_eq!(reaped, vec![stale.id]);
        let stale = store.get(stale.id).await.unwrap().unwrap();
        assert_eq!(
            stale.state.error(),
            Some("Job abandoned: no result was recorded within 30 minutes")
        );
        assert_eq!(store.get(fresh.id).await.unwrap().unwrap().status(), JobStatus::Processing);
        assert_eq!(store.get(waiting.id).await.unwrap().unwrap().status(), JobStatus::Pending);
    }
}
