//! Single-writer work sequence
//!
//! All balance-affecting pool operations are funneled through one logical
//! mutual-exclusion sequence: submitted jobs run strictly one at a time, in
//! submission order, each to completion before the next starts. This is the
//! property that prevents two concurrent admissions from double-spending the
//! same unconfirmed balance.
//!
//! The implementation is a Tokio actor: a bounded mpsc mailbox feeding a
//! single worker task, with oneshot channels carrying results back.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

type Job = BoxFuture<'static, ()>;

/// Handle to a single-worker job queue
///
/// Clones share the same worker, so every clone's jobs serialize against
/// each other.
#[derive(Clone)]
pub struct Sequence {
    sender: mpsc::Sender<Job>,
}

impl Sequence {
    /// Spawn the worker task and return a handle
    pub fn spawn(name: impl Into<String>) -> Self {
        let (sender, mut mailbox) = mpsc::channel::<Job>(1024);
        let name = name.into();

        tokio::spawn(async move {
            while let Some(job) = mailbox.recv().await {
                job.await;
            }
            tracing::debug!("sequence '{}' drained and shut down", name);
        });

        Self { sender }
    }

    /// Run a job to completion on the sequence, returning its output
    ///
    /// The job starts only after every previously submitted job has
    /// finished. There is no mid-job cancellation.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let boxed: Job = Box::pin(async move {
            let _ = reply.send(job.await);
        });

        self.sender
            .send(boxed)
            .await
            .map_err(|_| Error::Concurrency("Sequence worker closed".to_string()))?;

        response
            .await
            .map_err(|_| Error::Concurrency("Sequence job dropped".to_string()))
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tokio::time::Duration;

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let sequence = Sequence::spawn("test");
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..10u32 {
            let sequence = sequence.clone();
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                sequence
                    .run(async move {
                        // A slow early job must still finish before later ones start
                        if i == 0 {
                            tokio::time::sleep(Duration::from_millis(20)).await;
                        }
                        log.lock().await.push(i);
                    })
                    .await
                    .unwrap();
            }));
            // Submission order is deterministic only if we yield between sends
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let log = log.lock().await;
        let mut sorted = log.clone();
        sorted.sort_unstable();
        assert_eq!(*log, sorted);
    }

    #[tokio::test]
    async fn test_at_most_one_job_in_flight() {
        let sequence = Sequence::spawn("exclusive");
        let in_flight = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..25 {
            let sequence = sequence.clone();
            let in_flight = in_flight.clone();
            handles.push(tokio::spawn(async move {
                sequence
                    .run(async move {
                        let now = in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        assert_eq!(now, 0, "two jobs ran concurrently");
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        in_flight.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_run_returns_job_output() {
        let sequence = Sequence::spawn("output");
        let value = sequence.run(async { 41 + 1 }).await.unwrap();
        assert_eq!(value, 42);
    }
}
