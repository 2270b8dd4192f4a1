//! app::tasks
//!
//! Named background tasks.
//!
//! Background tasks never keep the client alive: everything spawned here is
//! aborted when the UI loop exits.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::{AbortHandle, JoinHandle};

/// Shared set of named tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tasks: Arc<Mutex<Vec<(String, AbortHandle)>>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, AbortHandle)>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawn and track a task.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.track(name, &handle);
        handle
    }

    /// Track a task spawned elsewhere.
    pub fn track(&self, name: impl Into<String>, handle: &JoinHandle<()>) {
        let mut tasks = self.lock();
        tasks.retain(|(_, h)| !h.is_finished());
        tasks.push((name.into(), handle.abort_handle()));
    }

    /// Names of tasks still running.
    pub fn live(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// One-line summary of live tasks.
    pub fn summary(&self) -> String {
        let live = self.live();
        if live.is_empty() {
            "no live tasks".to_string()
        } else {
            format!("{} live task(s): {}", live.len(), live.join(", "))
        }
    }

    /// Abort every tracked task.
    pub fn abort_all(&self) {
        for (name, handle) in self.lock().drain(..) {
            if !handle.is_finished() {
                tracing::debug!(task = %name, "aborting task");
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn live_and_abort() {
        let tasks = TaskSet::new();
        let sleeper = tasks.spawn("sleeper", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let quick = tasks.spawn("quick", async {});
        quick.await.unwrap();

        assert_eq!(tasks.live(), vec!["sleeper".to_string()]);
        assert_eq!(tasks.summary(), "1 live task(s): sleeper");

        tasks.abort_all();
        assert!(sleeper.await.unwrap_err().is_cancelled());
        assert_eq!(tasks.summary(), "no live tasks");
    }
}
