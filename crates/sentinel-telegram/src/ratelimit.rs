//! FIFO-serialized work queue with a minimum spacing between tasks.
//!
//! Every outgoing MTProto call goes through here so the account never trips
//! Telegram's flood limits. Tasks run one at a time in enqueue order; the
//! worker sleeps for the configured interval after each completion, so the
//! gap between "task n finished" and "task n+1 started" is always at least
//! `min_interval`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::TelegramError;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct RateLimiter {
    tx: mpsc::UnboundedSender<Job>,
}

impl RateLimiter {
    /// Spawn the single worker loop. Exactly one processor is ever live per
    /// limiter; dropping the limiter stops the loop once the queue drains.
    pub fn new(min_interval: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
                tokio::time::sleep(min_interval).await;
            }
            debug!("rate limiter worker stopped");
        });
        Self { tx }
    }

    /// Enqueue `task` and wait for its result.
    ///
    /// FIFO by enqueue time. A failing task resolves only its own caller —
    /// later tasks are unaffected. There is no cancellation; once enqueued,
    /// a task runs to completion.
    pub async fn submit<T, F>(&self, task: F) -> Result<T, TelegramError>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = done_tx.send(task.await);
        });
        self.tx
            .send(job)
            .map_err(|_| TelegramError::QueueClosed)?;
        done_rx.await.map_err(|_| TelegramError::QueueClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn spaces_adjacent_completions() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let stamps: Arc<Mutex<Vec<(Instant, Instant)>>> = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..3 {
            let stamps = Arc::clone(&stamps);
            limiter
                .submit(async move {
                    let start = Instant::now();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    stamps.lock().unwrap().push((start, Instant::now()));
                })
                .await
                .unwrap();
        }

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 3);
        for pair in stamps.windows(2) {
            let gap = pair[1].0.duration_since(pair[0].1);
            assert!(gap >= Duration::from_millis(500), "gap was {gap:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn preserves_fifo_order() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(5)));
        let order: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let limiter = Arc::clone(&limiter);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                limiter
                    .submit(async move {
                        order.lock().unwrap().push(i);
                    })
                    .await
            }));
            // let the spawned task enqueue before starting the next one
            tokio::task::yield_now().await;
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_task_does_not_block_queue() {
        let limiter = RateLimiter::new(Duration::from_millis(1));

        let failed: Result<(), &str> = limiter.submit(async { Err("boom") }).await.unwrap();
        assert!(failed.is_err());

        let ok = limiter.submit(async { 41 + 1 }).await.unwrap();
        assert_eq!(ok, 42);
    }
}
