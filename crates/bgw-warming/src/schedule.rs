// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recurring-job plumbing.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Run `task` every `period`, starting one period from now. The task's
/// future is awaited to completion before the next tick is considered, so
/// a slow pass delays the next rather than overlapping it.
pub fn spawn_recurring<F, Fut>(period: Duration, mut task: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so "daily" means "in a
        // day", not "right now during startup".
        interval.tick().await;
        loop {
            interval.tick().await;
            task().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn recurring_task_fires_repeatedly() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let handle = spawn_recurring(Duration::from_millis(10), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        handle.abort();
        let fired = count.load(Ordering::Relaxed);
        assert!((3..=6).contains(&fired), "fired {fired} times");
    }

    #[tokio::test]
    async fn no_tick_fires_before_the_first_period() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let handle = spawn_recurring(Duration::from_secs(3600), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }
}
