// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides utility routines for things that might be used in a number of places elsewhere.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::time::{interval_at, Duration, Instant};

/// A repeating scheduled task with cancel-on-teardown semantics: dropping the handle (or
/// calling `cancel()`) deterministically stops the timer, so terminating the owning entity
/// never leaves a dangling timer behind.
///
/// The action returns `true` to keep running and `false` to stop itself.
pub struct ScheduledTask {
    cancelled: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

impl ScheduledTask {
    pub fn spawn<F>(interval_ms: u64, action: F) -> ScheduledTask
    where
        F: 'static + FnMut() -> bool + Send,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let task_cancelled = cancelled.clone();
        let mut action = action;
        let handle = tokio::spawn(async move {
            let period = Duration::from_millis(interval_ms);
            let mut timer = interval_at(Instant::now() + period, period);
            loop {
                timer.tick().await;
                if task_cancelled.load(Ordering::Relaxed) {
                    break;
                }
                if !action() {
                    break;
                }
            }
        });
        ScheduledTask { cancelled, handle }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn runs_on_interval_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();
        let task = ScheduledTask::spawn(10, move || {
            task_count.fetch_add(1, Ordering::SeqCst);
            true
        });
        tokio::time::sleep(Duration::from_millis(55)).await;
        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks >= 4, "expected at least 4 ticks, got {}", ticks);
        task.cancel();
        let after_cancel = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();
        {
            let _task = ScheduledTask::spawn(10, move || {
                task_count.fetch_add(1, Ordering::SeqCst);
                true
            });
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        let after_drop = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }

    #[tokio::test(start_paused = true)]
    async fn action_can_stop_itself() {
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();
        let _task = ScheduledTask::spawn(10, move || {
            task_count.fetch_add(1, Ordering::SeqCst) < 2
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
