//! RunStateMachine: admits, drives and settles test runs.
//!
//! Every transition is committed to the store before it counts, then
//! published fire-and-forget. Operations on one run are serialised by a
//! per-run async mutex; admission of new runs is serialised per cluster so
//! two concurrent starts cannot both pass the exclusion check.
//!
//! Runner events arrive on one channel and are applied by a background
//! event loop under the same per-run mutex. Events carry the runner pid;
//! an event from any process other than the run's current one is stale and
//! dropped.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use checkgrid_catalog::Resolver;
use checkgrid_cluster::ClusterStateCache;
use checkgrid_executor::{CleanupRequest, ExecutorEvent, SpawnRequest, Supervisor, TestOutcome};
use checkgrid_notify::{Notifier, RunEvent};
use checkgrid_state::{RunId, RunStatus, StateStore, TestRecord, TestRun, TestStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{RunError, RunResult};
use crate::slots::{Admission, Slots};
use crate::transitions::{
    apply_outcome, can_restart, can_stop, end_outstanding, has_outstanding, reset_for_rerun,
    settled_status, CRASH_MESSAGE, ORPHAN_MESSAGE,
};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Request to run a test set against a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub cluster_id: String,
    pub test_set_id: String,
    /// Run only these tests; the other eligible tests are recorded as
    /// `disabled`. `None` or empty runs every eligible test.
    #[serde(default)]
    pub tests: Option<Vec<String>>,
}

impl StartRequest {
    pub fn new(cluster_id: &str, test_set_id: &str) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            test_set_id: test_set_id.to_string(),
            tests: None,
        }
    }

    pub fn with_tests<I, S>(mut self, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tests = Some(tests.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Clone)]
pub struct RunStateMachine {
    inner: Arc<Inner>,
}

struct Inner {
    state: StateStore,
    resolver: Resolver,
    clusters: ClusterStateCache,
    supervisor: Arc<dyn Supervisor>,
    notifier: Notifier,
    events_tx: mpsc::Sender<ExecutorEvent>,
    run_locks: StdMutex<HashMap<RunId, Arc<Mutex<()>>>>,
    cluster_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    slots: StdMutex<Slots>,
    shutdown_tx: watch::Sender<bool>,
    event_loop: StdMutex<Option<JoinHandle<()>>>,
}

impl RunStateMachine {
    /// Create the machine and start its event loop. Must be called inside
    /// a tokio runtime.
    pub fn new(
        state: StateStore,
        resolver: Resolver,
        clusters: ClusterStateCache,
        supervisor: Arc<dyn Supervisor>,
        notifier: Notifier,
        capacity: usize,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let machine = Self {
            inner: Arc::new(Inner {
                state,
                resolver,
                clusters,
                supervisor,
                notifier,
                events_tx,
                run_locks: StdMutex::new(HashMap::new()),
                cluster_locks: StdMutex::new(HashMap::new()),
                slots: StdMutex::new(Slots::new(capacity)),
                shutdown_tx,
                event_loop: StdMutex::new(None),
            }),
        };

        let handle = tokio::spawn(run_event_loop(machine.clone(), events_rx, shutdown_rx));
        *machine
            .inner
            .event_loop
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!(capacity, "run state machine started");
        machine
    }

    /// Stop the event loop. Runner processes are left to the supervisor.
    pub async fn shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);
        let handle = self
            .inner
            .event_loop
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("run state machine stopped");
    }

    // ── Operations ─────────────────────────────────────────────────

    /// Create a run for (cluster, test set) and hand it to the executor,
    /// or queue it when every runner slot is taken.
    pub async fn start(&self, request: StartRequest) -> RunResult<TestRun> {
        let StartRequest {
            cluster_id,
            test_set_id,
            tests: selection,
        } = request;

        let admission = self.cluster_lock(&cluster_id);
        let _admission = admission.lock().await;

        let cluster = self.inner.clusters.refresh_or_last_good(&cluster_id).await?;
        let resolution = self.inner.resolver.resolve(&cluster, &test_set_id)?;
        if resolution.is_empty() {
            return Err(RunError::NoEligibleTests {
                cluster_id,
                test_set_id,
            });
        }

        let selected: Option<BTreeSet<String>> = match selection {
            Some(ids) if !ids.is_empty() => {
                let unknown: Vec<String> = ids
                    .iter()
                    .filter(|id| !resolution.tests.iter().any(|t| &t.id == *id))
                    .cloned()
                    .collect();
                if !unknown.is_empty() {
                    return Err(RunError::UnknownTests {
                        test_set_id,
                        test_ids: unknown,
                    });
                }
                Some(ids.into_iter().collect())
            }
            _ => None,
        };

        if let Some(latest) = self.inner.state.latest_run(&cluster_id, &test_set_id)? {
            if latest.status.is_active() {
                if self.is_spawn_retry(&latest) {
                    return self.retry_spawn(latest.id).await;
                }
                return Err(RunError::AlreadyActive {
                    run_id: latest.id,
                    cluster_id,
                    test_set_id,
                });
            }
        }

        self.check_exclusion(&cluster_id, &test_set_id, &resolution.exclusive_with, None)?;

        let now = epoch_secs();
        let mut run = TestRun {
            id: 0,
            cluster_id: cluster_id.clone(),
            test_set_id: test_set_id.clone(),
            status: RunStatus::WaitRunning,
            pid: None,
            started_at: now,
            ended_at: None,
            release_version: cluster.release_version.clone(),
            test_path: resolution.test_set.test_path.clone(),
            cleanup_path: resolution.test_set.cleanup_path.clone(),
            updated_at: now,
        };
        let mut tests: Vec<TestRecord> = resolution
            .tests
            .iter()
            .enumerate()
            .map(|(position, profile)| TestRecord {
                id: profile.id.clone(),
                test_run_id: 0,
                position: position as u32,
                title: profile.title.clone(),
                status: if selected.as_ref().is_none_or(|s| s.contains(&profile.id)) {
                    TestStatus::WaitRunning
                } else {
                    TestStatus::Disabled
                },
                message: None,
                started_at: None,
                ended_at: None,
            })
            .collect();

        self.inner.state.create_run(&mut run, &mut tests)?;
        info!(
            run_id = %run.id,
            %cluster_id,
            test_set = %test_set_id,
            tests = tests.len(),
            release = %run.release_version,
            "test run created"
        );

        let guard = self.lock_run(run.id).await;
        self.publish_run(&run);
        for test in &tests {
            self.publish_test(&run, test);
        }
        let result = self.dispatch(run, &tests);
        drop(guard);
        self.pump_queue().await;
        result
    }

    /// Apply a test outcome. Only valid while the run is `running`.
    pub async fn report_test_outcome(
        &self,
        run_id: RunId,
        test_id: &str,
        status: TestStatus,
        message: Option<String>,
    ) -> RunResult<TestRun> {
        let _guard = self.lock_run(run_id).await;
        self.apply_outcome_locked(
            run_id,
            TestOutcome {
                test_id: test_id.to_string(),
                status,
                message,
                started_at: None,
                ended_at: None,
            },
        )
    }

    /// Stop a run: outstanding tests become `stopped`, ended tests keep
    /// their status, and the runner is asked to terminate.
    pub async fn stop(&self, run_id: RunId) -> RunResult<TestRun> {
        let _guard = self.lock_run(run_id).await;
        let (mut run, mut tests) = self.load(run_id)?;
        if !can_stop(run.status) {
            return Err(RunError::InvalidTransition {
                run_id,
                action: "stop",
                status: run.status,
            });
        }

        let now = epoch_secs();
        let alive = self.inner.supervisor.is_alive(run_id);
        let changed = end_outstanding(&mut tests, TestStatus::Stopped, None, now);
        let changed: Vec<TestRecord> = changed.into_iter().map(|i| tests[i].clone()).collect();
        run.status = RunStatus::Stopped;
        run.ended_at = Some(now);
        run.updated_at = now;
        if !alive {
            run.pid = None;
        }

        self.inner.state.put_run_with_tests(&run, &changed)?;
        for test in &changed {
            self.publish_test(&run, test);
        }
        self.publish_run(&run);

        let dequeued = self.slots().cancel(run_id);
        let signalled = self.inner.supervisor.terminate(run_id);
        info!(
            %run_id,
            tests_stopped = changed.len(),
            dequeued,
            signalled,
            "test run stopped"
        );
        if !signalled {
            self.spawn_cleanup(&run);
        }
        Ok(run)
    }

    /// Re-execute every test of a finished, failed or stopped run on the
    /// same row.
    pub async fn restart(&self, run_id: RunId) -> RunResult<TestRun> {
        // Validate before waiting so an invalid restart returns at once.
        let run = self.get_run(run_id)?;
        if !can_restart(run.status, self.has_process(run_id)) {
            return Err(RunError::InvalidTransition {
                run_id,
                action: "restart",
                status: run.status,
            });
        }

        self.inner.supervisor.wait_for_exit(run_id).await;

        let admission = self.cluster_lock(&run.cluster_id);
        let _admission = admission.lock().await;

        let guard = self.lock_run(run_id).await;
        let (mut run, mut tests) = self.load(run_id)?;
        if !can_restart(run.status, self.has_process(run_id)) {
            return Err(RunError::InvalidTransition {
                run_id,
                action: "restart",
                status: run.status,
            });
        }

        // Only the latest row of a pair may become active again.
        if let Some(latest) = self.inner.state.latest_run(&run.cluster_id, &run.test_set_id)? {
            if latest.id != run_id {
                if latest.status.is_active() {
                    return Err(RunError::AlreadyActive {
                        run_id: latest.id,
                        cluster_id: run.cluster_id,
                        test_set_id: run.test_set_id,
                    });
                }
                return Err(RunError::Superseded {
                    run_id,
                    latest: latest.id,
                });
            }
        }

        let exclusive_with = self
            .inner
            .resolver
            .catalog()
            .snapshot()
            .exclusions_of(&run.test_set_id);
        self.check_exclusion(&run.cluster_id, &run.test_set_id, &exclusive_with, Some(run_id))?;

        if run.status == RunStatus::Stopped && run.pid.is_some() {
            // Exit of the stopped runner not applied yet; it will be stale.
            self.spawn_cleanup(&run);
        }

        reset_for_rerun(&mut tests);
        let now = epoch_secs();
        run.status = RunStatus::Restarted;
        run.pid = None;
        run.started_at = now;
        run.ended_at = None;
        run.updated_at = now;

        self.inner.state.put_run_with_tests(&run, &tests)?;
        for test in tests.iter().filter(|t| t.status == TestStatus::WaitRunning) {
            self.publish_test(&run, test);
        }
        self.publish_run(&run);
        info!(%run_id, tests = tests.len(), "test run restarted");

        let result = self.dispatch(run, &tests);
        drop(guard);
        self.pump_queue().await;
        result
    }

    /// Force runs left active by a previous daemon process to `error`.
    pub async fn recover_orphans(&self) -> RunResult<Vec<RunId>> {
        let mut recovered = Vec::new();
        for candidate in self.inner.state.list_active_runs()? {
            let _guard = self.lock_run(candidate.id).await;
            if self.inner.supervisor.is_alive(candidate.id) {
                continue;
            }
            let (mut run, mut tests) = self.load(candidate.id)?;
            if !run.status.is_active() {
                continue;
            }

            let now = epoch_secs();
            let changed = end_outstanding(&mut tests, TestStatus::Error, Some(ORPHAN_MESSAGE), now);
            let changed: Vec<TestRecord> = changed.into_iter().map(|i| tests[i].clone()).collect();
            run.status = RunStatus::Error;
            run.pid = None;
            run.ended_at = Some(now);
            run.updated_at = now;

            self.inner.state.put_run_with_tests(&run, &changed)?;
            for test in &changed {
                self.publish_test(&run, test);
            }
            self.publish_run(&run);
            warn!(run_id = %run.id, tests = changed.len(), "orphaned test run marked error");
            recovered.push(run.id);
        }
        Ok(recovered)
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn get_run(&self, run_id: RunId) -> RunResult<TestRun> {
        self.inner
            .state
            .get_run(run_id)?
            .ok_or(RunError::NotFound(run_id))
    }

    /// Tests of a run in declaration order.
    pub fn tests_for_run(&self, run_id: RunId) -> RunResult<Vec<TestRecord>> {
        self.get_run(run_id)?;
        Ok(self.inner.state.list_tests_for_run(run_id)?)
    }

    /// All runs, or the runs against one cluster, in creation order.
    pub fn list_runs(&self, cluster_id: Option<&str>) -> RunResult<Vec<TestRun>> {
        Ok(match cluster_id {
            Some(cluster_id) => self.inner.state.list_runs_for_cluster(cluster_id)?,
            None => self.inner.state.list_runs()?,
        })
    }

    /// Latest run of every test set ever run against `cluster_id`.
    pub fn last_runs(&self, cluster_id: &str) -> RunResult<Vec<TestRun>> {
        Ok(self.inner.state.latest_runs_for_cluster(cluster_id)?)
    }

    /// Runs waiting for a runner slot, in dispatch order.
    pub fn queued_runs(&self) -> Vec<RunId> {
        self.slots().queued()
    }

    // ── Dispatch ───────────────────────────────────────────────────

    /// Claim a slot and spawn, or queue. Caller holds the run lock.
    fn dispatch(&self, run: TestRun, tests: &[TestRecord]) -> RunResult<TestRun> {
        let admission = self.slots().acquire(run.id);
        match admission {
            Admission::Granted => self.spawn_runner(run, tests),
            Admission::Queued(position) => {
                info!(run_id = %run.id, position, "runner capacity exhausted, run queued");
                Ok(run)
            }
        }
    }

    /// Spawn the runner for a run holding a slot. Caller holds the run lock.
    fn spawn_runner(&self, mut run: TestRun, tests: &[TestRecord]) -> RunResult<TestRun> {
        let request = SpawnRequest {
            run_id: run.id,
            cluster_id: run.cluster_id.clone(),
            test_path: run.test_path.clone(),
            test_ids: tests
                .iter()
                .filter(|t| t.status == TestStatus::WaitRunning)
                .map(|t| t.id.clone())
                .collect(),
        };

        let handle = match self.inner.supervisor.spawn(request, self.inner.events_tx.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                self.slots().release_unspawned(run.id);
                error!(run_id = %run.id, error = %e, "runner spawn failed");
                return Err(e.into());
            }
        };

        self.slots().assign(run.id, handle.pid);
        run.pid = Some(handle.pid);
        run.status = RunStatus::Running;
        run.updated_at = epoch_secs();
        if let Err(e) = self.inner.state.put_run(&run) {
            error!(run_id = %run.id, error = %e, "failed to record running state, terminating runner");
            self.inner.supervisor.terminate(run.id);
            return Err(e.into());
        }
        self.publish_run(&run);
        info!(run_id = %run.id, pid = handle.pid, "test run running");
        Ok(run)
    }

    /// Start queued runs while slots are free.
    async fn pump_queue(&self) {
        loop {
            let next = self.slots().next();
            let Some(run_id) = next else {
                break;
            };
            let _guard = self.lock_run(run_id).await;
            match self.load(run_id) {
                Ok((run, tests))
                    if matches!(run.status, RunStatus::WaitRunning | RunStatus::Restarted)
                        && run.pid.is_none() =>
                {
                    debug!(%run_id, "dispatching queued run");
                    if let Err(e) = self.spawn_runner(run, &tests) {
                        warn!(%run_id, error = %e, "queued run failed to start");
                    }
                }
                Ok((run, _)) => {
                    debug!(%run_id, status = %run.status, "queued run no longer waiting");
                    self.slots().release_unspawned(run_id);
                }
                Err(e) => {
                    error!(%run_id, error = %e, "failed to load queued run");
                    self.slots().release_unspawned(run_id);
                }
            }
        }
    }

    /// An active run that lost its spawn: `wait_running`, no process, not
    /// queued.
    /// Refuse admission while a run of an exclusive test set is active on
    /// the same cluster. Callers hold the cluster's admission lock.
    fn check_exclusion(
        &self,
        cluster_id: &str,
        test_set_id: &str,
        exclusive_with: &BTreeSet<String>,
        except: Option<RunId>,
    ) -> RunResult<()> {
        for active in self.inner.state.list_active_runs()? {
            if Some(active.id) == except || active.cluster_id != cluster_id {
                continue;
            }
            if exclusive_with.contains(&active.test_set_id) {
                warn!(
                    %cluster_id,
                    test_set = %test_set_id,
                    conflicting = %active.test_set_id,
                    run_id = %active.id,
                    "admission refused, exclusive test set active"
                );
                return Err(RunError::ExclusiveConflict {
                    cluster_id: cluster_id.to_string(),
                    test_set_id: test_set_id.to_string(),
                    conflicting: active.test_set_id,
                    run_id: active.id,
                });
            }
        }
        Ok(())
    }

    fn is_spawn_retry(&self, run: &TestRun) -> bool {
        run.status == RunStatus::WaitRunning && run.pid.is_none() && !self.has_process(run.id)
    }

    async fn retry_spawn(&self, run_id: RunId) -> RunResult<TestRun> {
        let guard = self.lock_run(run_id).await;
        let (run, tests) = self.load(run_id)?;
        if !self.is_spawn_retry(&run) {
            return Err(RunError::AlreadyActive {
                run_id,
                cluster_id: run.cluster_id,
                test_set_id: run.test_set_id,
            });
        }
        info!(%run_id, "retrying runner spawn");
        let result = self.dispatch(run, &tests);
        drop(guard);
        self.pump_queue().await;
        result
    }

    // ── Runner events ──────────────────────────────────────────────

    async fn handle_event(&self, event: ExecutorEvent) {
        let run_id = event.run_id();
        let guard = self.lock_run(run_id).await;
        match event {
            ExecutorEvent::Outcome { pid, outcome, .. } => {
                match self.inner.state.get_run(run_id) {
                    Ok(Some(run)) if run.pid == Some(pid) => {}
                    Ok(_) => {
                        debug!(%run_id, pid, test_id = %outcome.test_id, "outcome from stale runner dropped");
                        return;
                    }
                    Err(e) => {
                        error!(%run_id, error = %e, "failed to load run for outcome");
                        return;
                    }
                }
                match self.apply_outcome_locked(run_id, outcome) {
                    Ok(_) => {}
                    Err(e @ RunError::InvalidTransition { .. }) => debug!(%run_id, error = %e, "outcome ignored"),
                    Err(e) => warn!(%run_id, error = %e, "outcome ignored"),
                }
            }
            ExecutorEvent::Exited {
                pid,
                exit_code,
                terminated,
                ..
            } => {
                let released = self.slots().release(run_id, pid);
                if let Err(e) = self.handle_exit_locked(run_id, pid, exit_code, terminated) {
                    error!(%run_id, pid, error = %e, "failed to record runner exit");
                }
                drop(guard);
                if released {
                    self.pump_queue().await;
                }
            }
        }
    }

    fn apply_outcome_locked(&self, run_id: RunId, outcome: TestOutcome) -> RunResult<TestRun> {
        let (mut run, mut tests) = self.load(run_id)?;
        if run.status != RunStatus::Running {
            return Err(RunError::InvalidTransition {
                run_id,
                action: "report an outcome for",
                status: run.status,
            });
        }
        let Some(index) = tests.iter().position(|t| t.id == outcome.test_id) else {
            return Err(RunError::UnknownTests {
                test_set_id: run.test_set_id,
                test_ids: vec![outcome.test_id],
            });
        };

        let now = epoch_secs();
        apply_outcome(
            &mut tests[index],
            outcome.status,
            outcome.message,
            outcome.started_at,
            outcome.ended_at,
            now,
        )
        .map_err(|reason| RunError::OutcomeRejected {
            run_id,
            test_id: outcome.test_id.clone(),
            reason: format!("{reason:?}"),
        })?;

        let settled = !has_outstanding(&tests);
        if settled {
            run.status = settled_status(&tests);
            run.ended_at = Some(now);
        }
        run.updated_at = now;

        self.inner
            .state
            .put_run_with_tests(&run, std::slice::from_ref(&tests[index]))?;
        self.publish_test(&run, &tests[index]);
        debug!(%run_id, test_id = %tests[index].id, status = %tests[index].status, "test updated");
        if settled {
            self.publish_run(&run);
            info!(%run_id, status = %run.status, "test run settled");
        }
        Ok(run)
    }

    fn handle_exit_locked(
        &self,
        run_id: RunId,
        pid: u32,
        exit_code: Option<i32>,
        terminated: bool,
    ) -> RunResult<()> {
        let (mut run, mut tests) = self.load(run_id)?;
        if run.pid != Some(pid) {
            debug!(%run_id, pid, "exit of stale runner ignored");
            return Ok(());
        }

        let now = epoch_secs();
        run.pid = None;
        run.updated_at = now;

        if run.status == RunStatus::Running && has_outstanding(&tests) {
            let changed = end_outstanding(&mut tests, TestStatus::Error, Some(CRASH_MESSAGE), now);
            let changed: Vec<TestRecord> = changed.into_iter().map(|i| tests[i].clone()).collect();
            run.status = RunStatus::Error;
            run.ended_at = Some(now);

            self.inner.state.put_run_with_tests(&run, &changed)?;
            for test in &changed {
                self.publish_test(&run, test);
            }
            self.publish_run(&run);
            warn!(
                %run_id,
                pid,
                ?exit_code,
                terminated,
                errored = changed.len(),
                "runner exited with outstanding tests"
            );
            self.spawn_cleanup(&run);
            return Ok(());
        }

        self.inner.state.put_run(&run)?;
        debug!(%run_id, pid, ?exit_code, status = %run.status, "runner exited");
        if run.status == RunStatus::Stopped {
            self.spawn_cleanup(&run);
        }
        Ok(())
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn load(&self, run_id: RunId) -> RunResult<(TestRun, Vec<TestRecord>)> {
        let run = self.get_run(run_id)?;
        let tests = self.inner.state.list_tests_for_run(run_id)?;
        Ok((run, tests))
    }

    /// A live runner or a place in the queue.
    fn has_process(&self, run_id: RunId) -> bool {
        self.inner.supervisor.is_alive(run_id) || self.slots().is_queued(run_id)
    }

    fn spawn_cleanup(&self, run: &TestRun) {
        let Some(cleanup_path) = run.cleanup_path.clone() else {
            return;
        };
        let supervisor = Arc::clone(&self.inner.supervisor);
        let request = CleanupRequest {
            run_id: run.id,
            cluster_id: run.cluster_id.clone(),
            cleanup_path,
        };
        tokio::spawn(async move {
            let run_id = request.run_id;
            if let Err(e) = supervisor.cleanup(request).await {
                warn!(%run_id, error = %e, "cleanup failed");
            }
        });
    }

    fn publish_run(&self, run: &TestRun) {
        self.inner.notifier.publish(RunEvent::for_run(run, epoch_secs()));
    }

    fn publish_test(&self, run: &TestRun, test: &TestRecord) {
        self.inner
            .notifier
            .publish(RunEvent::for_test(run, test, epoch_secs()));
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.inner.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn lock_run(&self, run_id: RunId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.run_locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(run_id).or_default())
        };
        lock.lock_owned().await
    }

    fn cluster_lock(&self, cluster_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .inner
            .cluster_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(cluster_id.to_string()).or_default())
    }
}

async fn run_event_loop(
    machine: RunStateMachine,
    mut events: mpsc::Receiver<ExecutorEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("runner event loop starting");
    loop {
        tokio::select! {
            Some(event) = events.recv() => machine.handle_event(event).await,
            _ = shutdown.changed() => {
                debug!("runner event loop shutting down");
                break;
            }
        }
    }
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
