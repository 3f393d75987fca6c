//! ProcessSupervisor: runs the configured check runner with tokio::process.
//!
//! Every runner is started in its own process group so a stop reaches the
//! runner and anything it forked. A stop sends SIGTERM to the group, waits
//! up to the grace period, then sends SIGKILL.

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use checkgrid_core::config::ExecutorConfig;
use checkgrid_state::RunId;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{ExecResult, ExecutorError};
use crate::outcome::parse_line;
use crate::supervisor::{BoxFuture, CleanupRequest, ExecutorEvent, ProcessHandle, SpawnRequest, Supervisor};

/// Upper bound on waiting for stdout to drain after the runner exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

struct LiveProcess {
    pid: u32,
    terminate_tx: watch::Sender<bool>,
    exited_rx: watch::Receiver<bool>,
}

type LiveMap = Arc<Mutex<HashMap<RunId, LiveProcess>>>;

pub struct ProcessSupervisor {
    program: String,
    args: Vec<String>,
    working_dir: Option<std::path::PathBuf>,
    env: HashMap<String, String>,
    grace_period: Duration,
    cleanup_timeout: Duration,
    live: LiveMap,
}

impl ProcessSupervisor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            env: config.env.clone(),
            grace_period: config.grace_period(),
            cleanup_timeout: config.cleanup_timeout(),
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs with a live runner process.
    pub fn live_runs(&self) -> Vec<RunId> {
        let mut runs: Vec<RunId> = self.lock_live().keys().copied().collect();
        runs.sort_unstable();
        runs
    }

    /// Terminate every live runner and wait until all are reaped.
    pub async fn shutdown(&self) {
        let runs = self.live_runs();
        for run_id in &runs {
            self.terminate(*run_id);
        }
        for run_id in runs {
            self.wait_for_exit(run_id).await;
        }
        info!("all runner processes stopped");
    }

    fn lock_live(&self) -> MutexGuard<'_, HashMap<RunId, LiveProcess>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn command(&self, action: &str, run_id: RunId, cluster_id: &str, path: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(action)
            .arg("--run-id")
            .arg(run_id.to_string())
            .arg("--cluster-id")
            .arg(cluster_id)
            .arg("--test-path")
            .arg(path);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

impl Supervisor for ProcessSupervisor {
    fn spawn(
        &self,
        request: SpawnRequest,
        events: mpsc::Sender<ExecutorEvent>,
    ) -> ExecResult<ProcessHandle> {
        let run_id = request.run_id;
        let mut live = self.lock_live();
        if live.contains_key(&run_id) {
            return Err(ExecutorError::AlreadyRunning(run_id));
        }

        let mut cmd = self.command("run", run_id, &request.cluster_id, &request.test_path);
        cmd.args(&request.test_ids);
        let mut child = cmd.spawn().map_err(|e| ExecutorError::Spawn {
            run_id,
            message: e.to_string(),
        })?;
        let pid = child.id().ok_or_else(|| ExecutorError::Spawn {
            run_id,
            message: "runner exited before it could be tracked".to_string(),
        })?;

        let (terminate_tx, terminate_rx) = watch::channel(false);
        let (exited_tx, exited_rx) = watch::channel(false);
        live.insert(
            run_id,
            LiveProcess {
                pid,
                terminate_tx,
                exited_rx,
            },
        );
        drop(live);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let outcomes = stdout.map(|out| tokio::spawn(forward_outcomes(out, run_id, pid, events.clone())));
        if let Some(err) = stderr {
            tokio::spawn(log_lines(err, run_id, pid, "stderr"));
        }

        let grace = self.grace_period;
        let live = Arc::clone(&self.live);
        tokio::spawn(async move {
            let (status, terminated) = supervise(&mut child, run_id, pid, grace, terminate_rx).await;

            if let Some(task) = outcomes {
                match tokio::time::timeout(DRAIN_TIMEOUT, task).await {
                    Ok(_) => {}
                    Err(_) => warn!(%run_id, pid, "runner stdout still open after exit, abandoning"),
                }
            }

            let exit_code = match &status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(%run_id, pid, error = %e, "failed to reap runner");
                    None
                }
            };
            {
                let mut live = live.lock().unwrap_or_else(|e| e.into_inner());
                if live.get(&run_id).is_some_and(|p| p.pid == pid) {
                    live.remove(&run_id);
                }
            }
            exited_tx.send_replace(true);
            info!(%run_id, pid, ?exit_code, terminated, "runner exited");

            let _ = events
                .send(ExecutorEvent::Exited {
                    run_id,
                    pid,
                    exit_code,
                    terminated,
                })
                .await;
        });

        info!(%run_id, pid, test_path = %request.test_path, tests = request.test_ids.len(), "runner started");
        Ok(ProcessHandle { run_id, pid })
    }

    fn terminate(&self, run_id: RunId) -> bool {
        match self.lock_live().get(&run_id) {
            Some(process) => {
                debug!(%run_id, pid = process.pid, "termination requested");
                process.terminate_tx.send_replace(true);
                true
            }
            None => false,
        }
    }

    fn wait_for_exit(&self, run_id: RunId) -> BoxFuture<'_, ()> {
        let exited = self.lock_live().get(&run_id).map(|p| p.exited_rx.clone());
        Box::pin(async move {
            if let Some(mut exited) = exited {
                // A dropped sender means the supervising task is gone too.
                let _ = exited.wait_for(|done| *done).await;
            }
        })
    }

    fn cleanup(&self, request: CleanupRequest) -> BoxFuture<'_, ExecResult<()>> {
        Box::pin(async move {
            let run_id = request.run_id;
            let mut cmd = self.command("cleanup", run_id, &request.cluster_id, &request.cleanup_path);
            let mut child = cmd.spawn().map_err(|e| ExecutorError::Spawn {
                run_id,
                message: e.to_string(),
            })?;
            let pid = child.id().unwrap_or_default();
            if let Some(out) = child.stdout.take() {
                tokio::spawn(log_lines(out, run_id, pid, "cleanup stdout"));
            }
            if let Some(err) = child.stderr.take() {
                tokio::spawn(log_lines(err, run_id, pid, "cleanup stderr"));
            }
            debug!(%run_id, pid, cleanup_path = %request.cleanup_path, "cleanup started");

            match tokio::time::timeout(self.cleanup_timeout, child.wait()).await {
                Ok(Ok(status)) if status.success() => {
                    info!(%run_id, "cleanup finished");
                    Ok(())
                }
                Ok(Ok(status)) => Err(ExecutorError::Failed {
                    run_id,
                    exit_code: status.code(),
                }),
                Ok(Err(e)) => Err(ExecutorError::Spawn {
                    run_id,
                    message: e.to_string(),
                }),
                Err(_) => {
                    kill(&mut child, pid);
                    let _ = child.wait().await;
                    Err(ExecutorError::Timeout(run_id))
                }
            }
        })
    }

    fn is_alive(&self, run_id: RunId) -> bool {
        self.lock_live().contains_key(&run_id)
    }
}

/// Wait for the child, honouring a termination request.
async fn supervise(
    child: &mut Child,
    run_id: RunId,
    pid: u32,
    grace: Duration,
    mut terminate_rx: watch::Receiver<bool>,
) -> (std::io::Result<ExitStatus>, bool) {
    tokio::select! {
        status = child.wait() => (status, false),
        Ok(()) = async { terminate_rx.wait_for(|stop| *stop).await.map(|_| ()) } => {
            send_term(child, pid);
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => (status, true),
                Err(_) => {
                    warn!(%run_id, pid, grace_ms = grace.as_millis() as u64, "grace period elapsed, killing runner");
                    kill(child, pid);
                    (child.wait().await, true)
                }
            }
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> bool {
    // SAFETY: kill(2) takes plain integers; a negative pid addresses the
    // process group the runner leads.
    unsafe { libc::kill(-(pid as libc::pid_t), signal) == 0 }
}

fn send_term(child: &mut Child, pid: u32) {
    #[cfg(unix)]
    {
        let _ = child;
        if !signal_group(pid, libc::SIGTERM) {
            debug!(pid, "SIGTERM not delivered, process group already gone");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        let _ = child.start_kill();
    }
}

fn kill(child: &mut Child, pid: u32) {
    #[cfg(unix)]
    {
        if pid != 0 && signal_group(pid, libc::SIGKILL) {
            return;
        }
    }
    let _ = pid;
    let _ = child.start_kill();
}

async fn forward_outcomes(
    stdout: impl AsyncRead + Unpin,
    run_id: RunId,
    pid: u32,
    events: mpsc::Sender<ExecutorEvent>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Some(outcome) => {
                    debug!(%run_id, pid, test_id = %outcome.test_id, status = %outcome.status, "test outcome");
                    if events
                        .send(ExecutorEvent::Outcome { run_id, pid, outcome })
                        .await
                        .is_err()
                    {
                        warn!(%run_id, pid, "event receiver gone, dropping outcome");
                    }
                }
                None => debug!(%run_id, pid, %line, "runner output"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(%run_id, pid, error = %e, "failed to read runner stdout");
                break;
            }
        }
    }
}

async fn log_lines(stream: impl AsyncRead + Unpin, run_id: RunId, pid: u32, source: &'static str) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(%run_id, pid, source, %line, "runner output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkgrid_state::TestStatus;
    use std::path::Path;

    fn script(dir: &Path, body: &str) -> String {
        let path = dir.join("runner.sh");
        std::fs::write(&path, body).unwrap();
        path.display().to_string()
    }

    fn supervisor(script: String, grace: &str) -> ProcessSupervisor {
        ProcessSupervisor::new(&ExecutorConfig {
            program: "/bin/sh".to_string(),
            args: vec![script],
            grace_period: grace.to_string(),
            cleanup_timeout: "500ms".to_string(),
            ..Default::default()
        })
    }

    fn request(run_id: RunId, tests: &[&str]) -> SpawnRequest {
        SpawnRequest {
            run_id,
            cluster_id: "env-1".to_string(),
            test_path: "checks/smoke".to_string(),
            test_ids: tests.iter().map(|t| t.to_string()).collect(),
        }
    }

    async fn collect_until_exit(rx: &mut mpsc::Receiver<ExecutorEvent>) -> Vec<ExecutorEvent> {
        let mut events = Vec::new();
        while let Some(event) = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
        {
            let done = matches!(event, ExecutorEvent::Exited { .. });
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn forwards_outcomes_then_exit() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(
            script(
                dir.path(),
                r#"
echo "starting checks"
echo '{"test_id":"smoke.a","status":"running"}'
echo '{"test_id":"smoke.a","status":"success"}'
echo 'diagnostics on stderr' >&2
echo '{"test_id":"smoke.b","status":"failure","message":"timeout"}'
exit 0
"#,
            ),
            "1s",
        );
        let (tx, mut rx) = mpsc::channel(16);

        let handle = sup.spawn(request(1, &["smoke.a", "smoke.b"]), tx).unwrap();
        let events = collect_until_exit(&mut rx).await;

        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.pid() == handle.pid && e.run_id() == 1));
        match &events[2] {
            ExecutorEvent::Outcome { outcome, .. } => {
                assert_eq!(outcome.status, TestStatus::Failure);
                assert_eq!(outcome.message.as_deref(), Some("timeout"));
            }
            other => panic!("expected outcome, got {other:?}"),
        }
        assert!(matches!(
            events[3],
            ExecutorEvent::Exited { exit_code: Some(0), terminated: false, .. }
        ));
        assert!(!sup.is_alive(1));
    }

    #[tokio::test]
    async fn passes_run_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(
            script(
                dir.path(),
                r#"printf '{"test_id":"argv","status":"success","message":"%s"}\n' "$*""#,
            ),
            "1s",
        );
        let (tx, mut rx) = mpsc::channel(16);
        sup.spawn(request(7, &["a", "b"]), tx).unwrap();

        let events = collect_until_exit(&mut rx).await;
        match &events[0] {
            ExecutorEvent::Outcome { outcome, .. } => assert_eq!(
                outcome.message.as_deref(),
                Some("run --run-id 7 --cluster-id env-1 --test-path checks/smoke a b")
            ),
            other => panic!("expected outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_spawn_rejected_while_alive() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(script(dir.path(), "sleep 30\n"), "1s");
        let (tx, mut rx) = mpsc::channel(16);

        sup.spawn(request(3, &[]), tx.clone()).unwrap();
        assert!(matches!(
            sup.spawn(request(3, &[]), tx.clone()),
            Err(ExecutorError::AlreadyRunning(3))
        ));

        assert!(sup.terminate(3));
        sup.wait_for_exit(3).await;
        assert!(!sup.is_alive(3));
        let events = collect_until_exit(&mut rx).await;
        assert!(matches!(
            events.last(),
            Some(ExecutorEvent::Exited { terminated: true, .. })
        ));

        // Reaped, so the run may start again.
        sup.spawn(request(3, &[]), tx).unwrap();
        sup.terminate(3);
        sup.wait_for_exit(3).await;
    }

    #[tokio::test]
    async fn ignored_sigterm_escalates_to_sigkill() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(script(dir.path(), "trap '' TERM\nsleep 30\n"), "200ms");
        let (tx, mut rx) = mpsc::channel(16);
        sup.spawn(request(4, &[]), tx).unwrap();
        // Let the shell install its trap.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        sup.terminate(4);
        let events = collect_until_exit(&mut rx).await;

        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(
            events.last(),
            Some(ExecutorEvent::Exited { exit_code: None, terminated: true, .. })
        ));
    }

    #[tokio::test]
    async fn unexpected_exit_reported_with_code() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(
            script(dir.path(), "echo '{\"test_id\":\"a\",\"status\":\"running\"}'\nexit 3\n"),
            "1s",
        );
        let (tx, mut rx) = mpsc::channel(16);
        sup.spawn(request(5, &["a"]), tx).unwrap();

        let events = collect_until_exit(&mut rx).await;
        assert!(matches!(
            events.last(),
            Some(ExecutorEvent::Exited { exit_code: Some(3), terminated: false, .. })
        ));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let sup = ProcessSupervisor::new(&ExecutorConfig {
            program: "/nonexistent/checkgrid-runner".to_string(),
            ..Default::default()
        });
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(
            sup.spawn(request(6, &[]), tx),
            Err(ExecutorError::Spawn { run_id: 6, .. })
        ));
        assert!(!sup.is_alive(6));
        assert!(!sup.terminate(6));
        // Nothing to wait for.
        sup.wait_for_exit(6).await;
    }

    #[tokio::test]
    async fn cleanup_success_failure_and_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let cleanup = |path: &str| CleanupRequest {
            run_id: 9,
            cluster_id: "env-1".to_string(),
            cleanup_path: path.to_string(),
        };
        let sup = supervisor(
            script(
                dir.path(),
                r#"
[ "$1" = "cleanup" ] || exit 64
case "$7" in
  ok) exit 0 ;;
  bad) exit 2 ;;
  slow) sleep 30 ;;
esac
"#,
            ),
            "1s",
        );

        sup.cleanup(cleanup("ok")).await.unwrap();
        assert!(matches!(
            sup.cleanup(cleanup("bad")).await,
            Err(ExecutorError::Failed { exit_code: Some(2), .. })
        ));
        assert!(matches!(
            sup.cleanup(cleanup("slow")).await,
            Err(ExecutorError::Timeout(9))
        ));
    }
}
