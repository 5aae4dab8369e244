//! Process-wide bound on concurrent HWDB fetches

use crate::config::{FetchConfig, PoolConfig};
use crate::error::{DatabaseError, ItemError};
use crate::retry::with_retry;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Shared fetch pool
///
/// Every job submitted to a registry draws fetch slots from the same pool,
/// so the total number of outbound calls in flight never exceeds its size.
/// Clones share the underlying permits.
#[derive(Clone, Debug)]
pub struct FetchPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl FetchPool {
    /// Create a pool with `size` slots (at least one)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Create a pool sized from configuration
    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.max_concurrent_fetches)
    }

    /// Number of slots
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a slot, giving up if `cancel` fires first
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<OwnedSemaphorePermit, ItemError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ItemError::Cancelled),
            permit = self.permits.clone().acquire_owned() => {
                permit.map_err(|_| ItemError::Cancelled)
            }
        }
    }

    /// Run one remote call inside a pool slot
    ///
    /// The slot is held for the whole call including retries. Each attempt is
    /// bounded by `config.timeout`; transient failures are retried per
    /// `config.retry`. Cancellation only stops work that has not started: a
    /// waiter gives up its turn and no further retry is attempted, but an
    /// attempt already in flight runs to completion.
    pub async fn run<T, F, Fut>(
        &self,
        config: &FetchConfig,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, ItemError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DatabaseError>>,
    {
        let _permit = self.acquire(cancel).await?;
        let timeout = config.timeout;

        with_retry(&config.retry, || {
            let attempt = if cancel.is_cancelled() {
                None
            } else {
                Some(operation())
            };
            async move {
                let Some(attempt) = attempt else {
                    return Err(ItemError::Cancelled);
                };
                match tokio::time::timeout(timeout, attempt).await {
                    Ok(result) => result.map_err(ItemError::Fetch),
                    Err(_) => Err(ItemError::Timeout(timeout)),
                }
            }
        })
        .await
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fetch_config(timeout: Duration) -> FetchConfig {
        FetchConfig {
            timeout,
            retry: RetryConfig::none(),
        }
    }

    #[test]
    fn zero_size_is_clamped() {
        let pool = FetchPool::new(0);
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn concurrent_runs_never_exceed_pool_size() {
        let pool = FetchPool::new(3);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let config = fetch_config(Duration::from_secs(5));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..12 {
            let (pool, in_flight, peak, cancel, config) = (
                pool.clone(),
                in_flight.clone(),
                peak.clone(),
                cancel.clone(),
                config.clone(),
            );
            tasks.spawn(async move {
                pool.run(&config, &cancel, || {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, DatabaseError>(())
                    }
                })
                .await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.available(), 3);
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let pool = FetchPool::new(1);
        let result = pool
            .run(
                &fetch_config(Duration::from_millis(20)),
                &CancellationToken::new(),
                || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, DatabaseError>(())
                },
            )
            .await;

        assert!(matches!(result, Err(ItemError::Timeout(_))));
        assert_eq!(pool.available(), 1, "slot released after timeout");
    }

    #[tokio::test]
    async fn cancelled_waiter_gives_up_its_turn() {
        let pool = FetchPool::new(1);
        let held = pool.acquire(&CancellationToken::new()).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = pool.acquire(&cancel).await;
        assert!(matches!(result, Err(ItemError::Cancelled)));

        drop(held);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn dispatched_call_drains_after_cancel() {
        let pool = FetchPool::new(1);
        let cancel = CancellationToken::new();
        let config = fetch_config(Duration::from_secs(5));

        let run = pool.run(&config, &cancel, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, DatabaseError>(7)
        });
        let trigger = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(run, trigger);

        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn cancelled_run_does_not_call() {
        let pool = FetchPool::new(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicUsize::new(0);

        let result = pool
            .run(&fetch_config(Duration::from_secs(5)), &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, DatabaseError>(()) }
            })
            .await;

        assert!(matches!(result, Err(ItemError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
