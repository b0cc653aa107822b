//! Supervised fire-and-forget task spawning.
//!
//! Every dispatched unit of work goes through the supervisor: panics are
//! isolated and counted instead of silently lost, and per-kind in-flight
//! gauges feed heartbeat counters and capability computation. The control
//! loop never awaits the handles.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// The five kinds of work the dispatcher can launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Heartbeat,
    Build,
    Upgrade,
    Pipeline,
    DockerDebug,
}

impl TaskKind {
    /// Stable lowercase name for log fields.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Build => "build",
            Self::Upgrade => "upgrade",
            Self::Pipeline => "pipeline",
            Self::DockerDebug => "docker-debug",
        }
    }
}

const fn slot(kind: TaskKind) -> usize {
    match kind {
        TaskKind::Heartbeat => 0,
        TaskKind::Build => 1,
        TaskKind::Upgrade => 2,
        TaskKind::Pipeline => 3,
        TaskKind::DockerDebug => 4,
    }
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: [AtomicUsize; 5],
    failures: AtomicUsize,
}

/// Spawns tasks and tracks their outcomes. Clones share counters.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    counters: Arc<Counters>,
}

impl Supervisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch a unit of work without blocking the caller.
    ///
    /// The in-flight gauge is bumped before this returns, so a snapshot
    /// taken right after `spawn` already counts the task. Errors and panics
    /// are logged and counted; they never affect sibling tasks.
    pub fn spawn<F>(&self, kind: TaskKind, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let counters = Arc::clone(&self.counters);
        counters.in_flight[slot(kind)].fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            // Inner spawn so a panic unwinds the inner task only
            match tokio::spawn(fut).await {
                Ok(Ok(())) => debug!(task = kind.name(), "Task finished"),
                Ok(Err(e)) => {
                    counters.failures.fetch_add(1, Ordering::SeqCst);
                    warn!(task = kind.name(), error = %e, "Task failed");
                }
                Err(e) if e.is_panic() => {
                    counters.failures.fetch_add(1, Ordering::SeqCst);
                    error!(task = kind.name(), error = %e, "Task panicked");
                }
                Err(e) => {
                    counters.failures.fetch_add(1, Ordering::SeqCst);
                    warn!(task = kind.name(), error = %e, "Task cancelled");
                }
            }
            counters.in_flight[slot(kind)].fetch_sub(1, Ordering::SeqCst);
        })
    }

    /// Number of tasks of `kind` currently running.
    #[must_use]
    pub fn in_flight(&self, kind: TaskKind) -> usize {
        self.counters.in_flight[slot(kind)].load(Ordering::SeqCst)
    }

    /// Total tasks that failed, panicked, or were cancelled since startup.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.counters.failures.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn panicking() -> anyhow::Result<()> {
        panic!("boom")
    }

    #[tokio::test]
    async fn successful_task_leaves_no_trace() {
        let sup = Supervisor::new();
        let handle = sup.spawn(TaskKind::Heartbeat, async { Ok(()) });
        handle.await.unwrap();

        assert_eq!(sup.in_flight(TaskKind::Heartbeat), 0);
        assert_eq!(sup.failures(), 0);
    }

    #[tokio::test]
    async fn failed_task_is_counted() {
        let sup = Supervisor::new();
        let handle = sup.spawn(TaskKind::Build, async {
            anyhow::bail!("worker exploded")
        });
        handle.await.unwrap();

        assert_eq!(sup.in_flight(TaskKind::Build), 0);
        assert_eq!(sup.failures(), 1);
    }

    #[tokio::test]
    async fn panic_is_captured_and_counted() {
        let sup = Supervisor::new();
        let handle = sup.spawn(TaskKind::Build, panicking());
        // The watcher task itself must survive the panic
        handle.await.unwrap();

        assert_eq!(sup.in_flight(TaskKind::Build), 0);
        assert_eq!(sup.failures(), 1);
    }

    #[tokio::test]
    async fn panic_does_not_affect_siblings() {
        let sup = Supervisor::new();
        let bad = sup.spawn(TaskKind::Build, panicking());
        let good = sup.spawn(TaskKind::Pipeline, async { Ok(()) });
        bad.await.unwrap();
        good.await.unwrap();

        assert_eq!(sup.failures(), 1);
        assert_eq!(sup.in_flight(TaskKind::Build), 0);
        assert_eq!(sup.in_flight(TaskKind::Pipeline), 0);
    }

    #[tokio::test]
    async fn in_flight_tracks_running_tasks() {
        let sup = Supervisor::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = sup.spawn(TaskKind::Build, async move {
            rx.await.ok();
            Ok(())
        });

        // Counted from the moment of spawn
        assert_eq!(sup.in_flight(TaskKind::Build), 1);
        assert_eq!(sup.in_flight(TaskKind::Upgrade), 0);

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(sup.in_flight(TaskKind::Build), 0);
    }
}
