//! Cancellation tokens for materialization jobs
//!
//! A job's token is cancelled when the holder it was submitted for is
//! evicted, updated, removed, or remeasured before the job finishes. Workers
//! check the token before computing and the coordination thread discards
//! whatever a cancelled job still manages to deliver.

use crate::JobId;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

/// Shared cancellation flag for one job.
///
/// # Example
///
/// ```
/// use rangebinder_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Tokens of every job that has been submitted and not yet completed.
///
/// A job stays registered while it is queued and while a worker runs it, so
/// an empty registry means no result can still arrive.
///
/// ```
/// use rangebinder_scheduler::CancellationRegistry;
///
/// let registry = CancellationRegistry::new();
/// let token = registry.register(7);
///
/// registry.cancel(7);
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<JobId, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<JobId, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `job_id` and returns the token handed to the worker.
    pub fn register(&self, job_id: JobId) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens().insert(job_id, token.clone());
        token
    }

    /// Returns `true` if the job was registered.
    pub fn cancel(&self, job_id: JobId) -> bool {
        match self.tokens().get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns the number of registered jobs that were cancelled.
    pub fn cancel_many(&self, job_ids: &[JobId]) -> usize {
        let tokens = self.tokens();
        job_ids
            .iter()
            .filter_map(|job_id| tokens.get(job_id))
            .inspect(|token| token.cancel())
            .count()
    }

    pub fn cancel_all(&self) -> usize {
        let tokens = self.tokens();
        for token in tokens.values() {
            token.cancel();
        }
        tokens.len()
    }

    /// Forgets a finished or dequeued job.
    pub fn unregister(&self, job_id: JobId) -> bool {
        self.tokens().remove(&job_id).is_some()
    }

    pub fn get(&self, job_id: JobId) -> Option<CancellationToken> {
        self.tokens().get(&job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_clone() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        assert!(!token2.is_cancelled());
        token1.cancel();
        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());

        // Idempotent
        token1.cancel();
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_registry_cancel() {
        let registry = CancellationRegistry::new();
        let token = registry.register(1);

        assert_eq!(registry.len(), 1);
        assert!(registry.cancel(1));
        assert!(token.is_cancelled());
        assert!(!registry.cancel(999));
    }

    #[test]
    fn test_registry_cancel_many() {
        let registry = CancellationRegistry::new();
        let token1 = registry.register(1);
        let token2 = registry.register(2);
        let token3 = registry.register(3);

        assert_eq!(registry.cancel_many(&[1, 3, 999]), 2);
        assert!(token1.is_cancelled());
        assert!(!token2.is_cancelled());
        assert!(token3.is_cancelled());
    }

    #[test]
    fn test_registry_cancel_all() {
        let registry = CancellationRegistry::new();
        let tokens: Vec<_> = (0..4).map(|id| registry.register(id)).collect();

        assert_eq!(registry.cancel_all(), 4);
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
        // Cancelled jobs stay registered until unregistered
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_registry_unregister() {
        let registry = CancellationRegistry::new();
        let token = registry.register(5);

        assert!(registry.unregister(5));
        assert!(!registry.unregister(5));
        assert!(registry.is_empty());
        assert!(registry.get(5).is_none());

        // Cancelling an unregistered job does not reach the old token
        assert!(!registry.cancel(5));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_registry_get_shares_state() {
        let registry = CancellationRegistry::new();
        let token = registry.register(9);
        let fetched = registry.get(9).unwrap();

        token.cancel();
        assert!(fetched.is_cancelled());
    }
}
