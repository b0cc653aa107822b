//! Task dispatch policy.
//!
//! Given one cycle's capability snapshot and decoded work assignment,
//! launches every eligible task kind through the supervisor. Pure fan-out:
//! nothing here waits, nothing joins, one task's failure never touches its
//! siblings.

use std::sync::Arc;

use crate::executor::TaskExecutor;
use crate::protocol::{AskEnable, AskResponse, BuildKind};
use crate::supervisor::{Supervisor, TaskKind};

/// Launches eligible tasks for one cycle's assignment.
///
/// There is no de-duplication across cycles: if the coordinator re-offers
/// work before the previous task of that kind finished, both run. The
/// coordinator owns assignment idempotence.
#[derive(Clone)]
pub struct Dispatcher {
    executor: Arc<dyn TaskExecutor>,
    supervisor: Supervisor,
}

impl Dispatcher {
    #[must_use]
    pub fn new(executor: Arc<dyn TaskExecutor>, supervisor: Supervisor) -> Self {
        Self {
            executor,
            supervisor,
        }
    }

    /// Evaluate the dispatch rules against one consistent snapshot.
    ///
    /// Rules fire independently; any subset may launch in one cycle.
    /// Heartbeat is unconditional. Launch decisions are made in a fixed
    /// order, but completion order across tasks is not defined.
    pub fn dispatch(&self, enable: AskEnable, resp: AskResponse) {
        if let Some(heart) = resp.heart {
            let executor = Arc::clone(&self.executor);
            self.supervisor.spawn(TaskKind::Heartbeat, async move {
                executor.report_heartbeat(heart).await
            });
        }

        let mut has_build = false;
        if enable.build != BuildKind::None {
            if let Some(build) = resp.build {
                has_build = true;
                let executor = Arc::clone(&self.executor);
                self.supervisor
                    .spawn(TaskKind::Build, async move { executor.run_build(build).await });
            }
        }

        if enable.upgrade {
            if let Some(upgrade) = resp.upgrade {
                let executor = Arc::clone(&self.executor);
                self.supervisor.spawn(TaskKind::Upgrade, async move {
                    executor.run_upgrade(upgrade, has_build).await
                });
            }
        }

        if enable.pipeline {
            if let Some(pipeline) = resp.pipeline {
                let executor = Arc::clone(&self.executor);
                self.supervisor.spawn(TaskKind::Pipeline, async move {
                    executor.run_pipeline(pipeline).await
                });
            }
        }

        if enable.docker_debug {
            if let Some(container) = resp.debug {
                let executor = Arc::clone(&self.executor);
                self.supervisor.spawn(TaskKind::DockerDebug, async move {
                    executor.run_debug_container(container).await
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::protocol::{
        BuildDescriptor, DebugDescriptor, HeartbeatDescriptor, PipelineDescriptor,
        UpgradeDescriptor,
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Launched {
        Heartbeat,
        Build(String),
        Upgrade { build_in_flight: bool },
        Pipeline(String),
        Debug(String),
    }

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<Launched>>,
    }

    impl RecordingExecutor {
        fn calls(&self) -> Vec<Launched> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl TaskExecutor for RecordingExecutor {
        async fn report_heartbeat(&self, _heart: HeartbeatDescriptor) -> Result<()> {
            self.calls.lock().push(Launched::Heartbeat);
            Ok(())
        }

        async fn run_build(&self, build: BuildDescriptor) -> Result<()> {
            self.calls.lock().push(Launched::Build(build.build_id));
            Ok(())
        }

        async fn run_upgrade(
            &self,
            _upgrade: UpgradeDescriptor,
            build_in_flight: bool,
        ) -> Result<()> {
            self.calls.lock().push(Launched::Upgrade { build_in_flight });
            Ok(())
        }

        async fn run_pipeline(&self, pipeline: PipelineDescriptor) -> Result<()> {
            self.calls.lock().push(Launched::Pipeline(pipeline.seq_id));
            Ok(())
        }

        async fn run_debug_container(&self, container: DebugDescriptor) -> Result<()> {
            self.calls.lock().push(Launched::Debug(container.image));
            Ok(())
        }
    }

    const ALL_KINDS: [TaskKind; 5] = [
        TaskKind::Heartbeat,
        TaskKind::Build,
        TaskKind::Upgrade,
        TaskKind::Pipeline,
        TaskKind::DockerDebug,
    ];

    /// Wait for every spawned task to finish (current-thread runtime).
    async fn drain(supervisor: &Supervisor) {
        for _ in 0..1000 {
            if ALL_KINDS.iter().all(|k| supervisor.in_flight(*k) == 0) {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("dispatched tasks did not settle");
    }

    fn enable_all() -> AskEnable {
        AskEnable {
            build: BuildKind::Binary,
            upgrade: true,
            pipeline: true,
            docker_debug: true,
        }
    }

    fn full_response() -> AskResponse {
        AskResponse {
            heart: Some(HeartbeatDescriptor::default()),
            build: Some(BuildDescriptor {
                project_id: "demo".to_string(),
                build_id: "b-1".to_string(),
                vm_seq_id: None,
                pipeline_name: None,
                workspace: None,
            }),
            upgrade: Some(UpgradeDescriptor {
                agent: true,
                worker: false,
                version: Some("0.5.0".to_string()),
            }),
            pipeline: Some(PipelineDescriptor {
                seq_id: "7".to_string(),
                project_id: "demo".to_string(),
                body: "restart".to_string(),
            }),
            debug: Some(DebugDescriptor {
                project_id: "demo".to_string(),
                build_id: "b-1".to_string(),
                image: "alpine:3".to_string(),
                debug_url: None,
            }),
        }
    }

    fn dispatcher() -> (Dispatcher, Arc<RecordingExecutor>, Supervisor) {
        let executor = Arc::new(RecordingExecutor::default());
        let supervisor = Supervisor::new();
        let dispatcher = Dispatcher::new(executor.clone(), supervisor.clone());
        (dispatcher, executor, supervisor)
    }

    #[tokio::test]
    async fn full_assignment_launches_all_five() {
        let (dispatcher, executor, supervisor) = dispatcher();
        dispatcher.dispatch(enable_all(), full_response());
        drain(&supervisor).await;

        let calls = executor.calls();
        assert_eq!(calls.len(), 5);
        assert!(calls.contains(&Launched::Heartbeat));
        assert!(calls.contains(&Launched::Build("b-1".to_string())));
        assert!(calls.contains(&Launched::Upgrade {
            build_in_flight: true
        }));
        assert!(calls.contains(&Launched::Pipeline("7".to_string())));
        assert!(calls.contains(&Launched::Debug("alpine:3".to_string())));
    }

    #[tokio::test]
    async fn build_none_skips_build_and_clears_in_flight_flag() {
        let (dispatcher, executor, supervisor) = dispatcher();
        let enable = AskEnable {
            build: BuildKind::None,
            ..enable_all()
        };
        dispatcher.dispatch(enable, full_response());
        drain(&supervisor).await;

        let calls = executor.calls();
        assert!(!calls.iter().any(|c| matches!(c, Launched::Build(_))));
        assert!(calls.contains(&Launched::Upgrade {
            build_in_flight: false
        }));
    }

    #[tokio::test]
    async fn absent_descriptor_never_launches() {
        let (dispatcher, executor, supervisor) = dispatcher();
        let resp = AskResponse {
            heart: Some(HeartbeatDescriptor::default()),
            ..AskResponse::default()
        };
        dispatcher.dispatch(enable_all(), resp);
        drain(&supervisor).await;

        assert_eq!(executor.calls(), vec![Launched::Heartbeat]);
    }

    #[tokio::test]
    async fn heartbeat_ignores_capability_flags() {
        let (dispatcher, executor, supervisor) = dispatcher();
        let enable = AskEnable {
            build: BuildKind::None,
            upgrade: false,
            pipeline: false,
            docker_debug: false,
        };
        let resp = AskResponse {
            heart: Some(HeartbeatDescriptor::default()),
            ..AskResponse::default()
        };
        dispatcher.dispatch(enable, resp);
        drain(&supervisor).await;

        assert_eq!(executor.calls(), vec![Launched::Heartbeat]);
    }

    #[tokio::test]
    async fn disabled_flag_blocks_its_kind_only() {
        let (dispatcher, executor, supervisor) = dispatcher();
        let enable = AskEnable {
            pipeline: false,
            ..enable_all()
        };
        dispatcher.dispatch(enable, full_response());
        drain(&supervisor).await;

        let calls = executor.calls();
        assert_eq!(calls.len(), 4);
        assert!(!calls.iter().any(|c| matches!(c, Launched::Pipeline(_))));
    }

    #[tokio::test]
    async fn repeated_dispatch_launches_again() {
        // No de-duplication: a re-offered assignment runs a second time
        let (dispatcher, executor, supervisor) = dispatcher();
        dispatcher.dispatch(enable_all(), full_response());
        dispatcher.dispatch(enable_all(), full_response());
        drain(&supervisor).await;

        let builds = executor
            .calls()
            .iter()
            .filter(|c| matches!(c, Launched::Build(_)))
            .count();
        assert_eq!(builds, 2);
    }
}
