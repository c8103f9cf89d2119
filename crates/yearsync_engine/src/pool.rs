//! Fork/join worker pool for blocking collaborator calls.
//!
//! The orchestrating thread hands a batch of items to [`WorkerPool::fork_join`],
//! which runs one blocking unit per item and returns only once every unit has
//! finished. Failures are returned per item; one failing unit never cancels
//! the rest of the batch.
//!
//! Dropping the pool does not wait for calls abandoned by a phase budget;
//! their threads are detached and finish on their own.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs blocking work on a dedicated runtime and joins on it.
pub struct WorkerPool {
    runtime: Option<Runtime>,
    limiter: Option<Arc<Semaphore>>,
}

impl WorkerPool {
    /// Builds a pool sized from the sync configuration.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("yearsync-worker")
            .enable_time()
            .build()
            .map_err(|e| SyncError::WorkerPool(e.to_string()))?;

        Ok(Self {
            runtime: Some(runtime),
            limiter: config.max_in_flight.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        })
    }

    /// Runs `work` once per item and blocks until all units complete.
    ///
    /// Results come back in completion order. A unit that panics is reported
    /// as [`SyncError::WorkerPool`].
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime.
    pub fn fork_join<T, R, F>(&self, items: Vec<T>, work: F) -> Vec<SyncResult<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> SyncResult<R> + Send + Sync + 'static,
    {
        if items.is_empty() {
            return Vec::new();
        }

        let Some(runtime) = self.runtime.as_ref() else {
            return items.into_iter().map(|_| Err(shut_down())).collect();
        };
        let work = Arc::new(work);
        let expected = items.len();

        runtime.block_on(async {
            let mut tasks = JoinSet::new();

            for item in items {
                let work = Arc::clone(&work);
                let limiter = self.limiter.clone();

                tasks.spawn(async move {
                    let _permit = match limiter {
                        Some(semaphore) => Some(
                            semaphore
                                .acquire_owned()
                                .await
                                .map_err(|e| SyncError::WorkerPool(e.to_string()))?,
                        ),
                        None => None,
                    };

                    tokio::task::spawn_blocking(move || work(item))
                        .await
                        .map_err(|e| SyncError::WorkerPool(format!("worker failed: {e}")))?
                });
            }

            let mut results = Vec::with_capacity(expected);
            while let Some(joined) = tasks.join_next().await {
                results.push(
                    joined.unwrap_or_else(|e| Err(SyncError::WorkerPool(e.to_string()))),
                );
            }
            results
        })
    }

    /// Runs a single blocking call, bounded by `budget` when one is given.
    ///
    /// Without a budget the call runs on the current thread. When the budget
    /// expires the call is abandoned and `SyncError::Timeout` is returned.
    pub fn call<R, F>(&self, phase: &'static str, budget: Option<Duration>, work: F) -> SyncResult<R>
    where
        R: Send + 'static,
        F: FnOnce() -> SyncResult<R> + Send + 'static,
    {
        let Some(budget) = budget else {
            return work();
        };

        self.runtime()?.block_on(async move {
            match tokio::time::timeout(budget, tokio::task::spawn_blocking(work)).await {
                Ok(joined) => {
                    joined.map_err(|e| SyncError::WorkerPool(format!("{phase} worker failed: {e}")))?
                }
                Err(_) => Err(SyncError::Timeout { phase }),
            }
        })
    }

    fn runtime(&self) -> SyncResult<&Runtime> {
        self.runtime.as_ref().ok_or_else(shut_down)
    }
}

fn shut_down() -> SyncError {
    SyncError::WorkerPool("runtime shut down".into())
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn pool(config: SyncConfig) -> WorkerPool {
        WorkerPool::new(&config).unwrap()
    }

    #[test]
    fn joins_every_unit() {
        let pool = pool(SyncConfig::default());
        let mut results: Vec<u32> = pool
            .fork_join((1..=20).collect(), |n: u32| Ok(n * 2))
            .into_iter()
            .map(Result::unwrap)
            .collect();
        results.sort_unstable();

        assert_eq!(results, (1..=20).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn failures_do_not_abort_the_batch() {
        let pool = pool(SyncConfig::default());
        let results = pool.fork_join(vec![1, 2, 3, 4], |n: i32| {
            if n % 2 == 0 {
                Err(SyncError::lookup(n.to_string(), "odd one out"))
            } else {
                Ok(n)
            }
        });

        assert_eq!(results.len(), 4);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    }

    #[test]
    fn panicking_unit_is_reported() {
        let pool = pool(SyncConfig::default());
        let results = pool.fork_join(vec![0, 1], |n: i32| {
            if n == 0 {
                panic!("boom");
            }
            Ok(n)
        });

        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(SyncError::WorkerPool(_)))));
    }

    #[test]
    fn in_flight_cap_is_respected() {
        let pool = pool(SyncConfig::default().with_max_in_flight(2).with_worker_threads(4));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let results = pool.fork_join((0..12).collect(), move |_: u32| {
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            a.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn empty_batch_returns_immediately() {
        let pool = pool(SyncConfig::default());
        let results = pool.fork_join(Vec::<u8>::new(), |_| Ok(()));
        assert!(results.is_empty());
    }

    #[test]
    fn call_without_budget_runs_inline() {
        let pool = pool(SyncConfig::default());
        let value = pool.call("probe", None, || Ok(7)).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn call_times_out() {
        let pool = pool(SyncConfig::default());
        let result: SyncResult<()> = pool.call("pull", Some(Duration::from_millis(10)), || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        });

        assert!(matches!(result, Err(SyncError::Timeout { phase: "pull" })));
    }

    #[test]
    fn drop_does_not_wait_for_abandoned_calls() {
        let pool = pool(SyncConfig::default());
        let result: SyncResult<()> = pool.call("probe", Some(Duration::from_millis(10)), || {
            std::thread::sleep(Duration::from_secs(3));
            Ok(())
        });
        assert!(matches!(result, Err(SyncError::Timeout { .. })));

        let started = Instant::now();
        drop(pool);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
