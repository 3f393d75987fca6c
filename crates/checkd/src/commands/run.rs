use std::time::Duration;

use checkd::Daemon;
use checkgrid_core::CheckgridConfig;
use checkgrid_runs::{RunError, StartRequest};
use checkgrid_state::{RunId, RunStatus, TestRun};
use tracing::info;

pub async fn run(
    config: CheckgridConfig,
    cluster: &str,
    test_set: &str,
    tests: Vec<String>,
    poll: Duration,
) -> anyhow::Result<()> {
    let daemon = Daemon::start(config).await?;
    let request = StartRequest::new(cluster, test_set).with_tests(tests);
    let result = match daemon.machine().start(request).await {
        Ok(run) => {
            println!("run {} started: {}/{} ({})", run.id, run.cluster_id, run.test_set_id, run.status);
            follow(&daemon, run.id, poll).await
        }
        Err(e) => Err(e.into()),
    };
    daemon.shutdown().await;
    report(result?)
}

pub async fn restart(config: CheckgridConfig, run_id: RunId, poll: Duration) -> anyhow::Result<()> {
    let daemon = Daemon::start(config).await?;
    let result = match daemon.machine().restart(run_id).await {
        Ok(run) => {
            println!("run {} restarted ({})", run.id, run.status);
            follow(&daemon, run.id, poll).await
        }
        Err(e) => Err(e.into()),
    };
    daemon.shutdown().await;
    report(result?)
}

/// Wait for the run to settle; the first Ctrl-C stops it.
async fn follow(daemon: &Daemon, run_id: RunId, poll: Duration) -> anyhow::Result<(TestRun, Vec<String>)> {
    tokio::select! {
        settled = daemon.wait_settled(run_id, poll) => {
            settled?;
        }
        interrupted = tokio::signal::ctrl_c() => {
            interrupted?;
            info!(%run_id, "interrupt received, stopping run");
            match daemon.machine().stop(run_id).await {
                Ok(_) | Err(RunError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e.into()),
            }
            daemon.wait_settled(run_id, poll).await?;
        }
    }

    let run = daemon.machine().get_run(run_id)?;
    let lines = daemon
        .machine()
        .tests_for_run(run_id)?
        .iter()
        .map(|t| match &t.message {
            Some(message) => format!("  {:<12} {}  ({message})", t.status.as_str(), t.id),
            None => format!("  {:<12} {}", t.status.as_str(), t.id),
        })
        .collect();
    Ok((run, lines))
}

fn report((run, lines): (TestRun, Vec<String>)) -> anyhow::Result<()> {
    for line in &lines {
        println!("{line}");
    }
    println!("run {} {}", run.id, run.status);
    match run.status {
        RunStatus::Finished => Ok(()),
        status => anyhow::bail!("run {} ended {status}", run.id),
    }
}
