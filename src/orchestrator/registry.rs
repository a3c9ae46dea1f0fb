//! Generic job registry shared by the bracket and TTL orchestrators
//! (`spec.md` §3, §4.4, §4.5).
//!
//! Each orchestrator keeps its own `JobRegistry<J>` behind its own lock —
//! bracket jobs and TTL jobs never share a map, matching the original
//! Python's two independent dicts (`_bracket_jobs`, `_ttl_jobs`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

/// Cooperative cancellation flag checked by a job's worker loop between
/// poll iterations. Setting it doesn't interrupt in-flight work; the
/// worker observes it at its next checkpoint.
#[derive(Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a job id in the original's `<prefix>_<hex8>` shape
/// (`uuid.uuid4().hex[:8]` in the Python source).
pub fn generate_job_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &id[..8])
}

/// A minimal thread-safe map from job id to job state, generic over the
/// job's state type so bracket and TTL orchestrators can each define
/// their own shape while reusing the locking/lookup boilerplate.
pub struct JobRegistry<J> {
    jobs: Mutex<HashMap<String, J>>,
}

impl<J: Clone> JobRegistry<J> {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, job_id: String, job: J) {
        self.jobs.lock().insert(job_id, job);
    }

    pub fn get(&self, job_id: &str) -> Option<J> {
        self.jobs.lock().get(job_id).cloned()
    }

    /// Mutate a job in place under the lock. No network I/O is ever
    /// performed inside `f` (`spec.md` §5).
    pub fn update<F: FnOnce(&mut J)>(&self, job_id: &str, f: F) -> bool {
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.get_mut(job_id) {
            f(job);
            true
        } else {
            false
        }
    }
}

impl<J: Clone> Default for JobRegistry<J> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_carry_prefix_and_length() {
        let id = generate_job_id("bracket");
        assert!(id.starts_with("bracket_"));
        assert_eq!(id.len(), "bracket_".len() + 8);
    }

    #[test]
    fn cancel_flag_observed_after_set() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn registry_insert_get_update() {
        let registry: JobRegistry<i32> = JobRegistry::new();
        registry.insert("job_1".to_string(), 1);
        assert_eq!(registry.get("job_1"), Some(1));
        registry.update("job_1", |v| *v += 1);
        assert_eq!(registry.get("job_1"), Some(2));
        assert!(!registry.update("missing", |v| *v += 1));
    }
}
