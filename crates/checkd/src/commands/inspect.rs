use checkd::Daemon;
use checkgrid_core::CheckgridConfig;
use checkgrid_state::{RunId, StateStore, TestRun};

pub async fn eligible(config: CheckgridConfig, cluster_id: &str, format: &str) -> anyhow::Result<()> {
    let daemon = Daemon::start(config).await?;
    let result = daemon.eligible(cluster_id).await;
    daemon.shutdown().await;
    let (cluster, sets) = result?;

    match format {
        "json" => {
            let sets: Vec<serde_json::Value> = sets
                .iter()
                .map(|res| {
                    let tests: Vec<&str> = res.tests.iter().map(|t| t.id.as_str()).collect();
                    serde_json::json!({
                        "test_set": res.test_set.id,
                        "ordering_priority": res.test_set.ordering_priority,
                        "exclusive_with": res.exclusive_with,
                        "tests": tests,
                    })
                })
                .collect();
            let out = serde_json::json!({ "cluster": cluster.as_ref(), "test_sets": sets });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        _ => {
            println!(
                "{} release {} ({}, {})",
                cluster.cluster_id, cluster.release_version, cluster.deployment_mode, cluster.operating_system
            );
            if sets.is_empty() {
                println!("  no eligible test sets");
            }
            for res in &sets {
                println!("  {} [priority {}]", res.test_set.id, res.test_set.ordering_priority);
                for test in &res.tests {
                    println!("    {}", test.id);
                }
            }
        }
    }
    Ok(())
}

pub fn history(
    config: &CheckgridConfig,
    cluster_id: Option<&str>,
    run_id: Option<RunId>,
    latest: bool,
    format: &str,
) -> anyhow::Result<()> {
    let state = checkd::daemon::open_store(&config.store)?;

    if let Some(run_id) = run_id {
        let run = state
            .get_run(run_id)?
            .ok_or_else(|| anyhow::anyhow!("test run not found: {run_id}"))?;
        let tests = state.list_tests_for_run(run_id)?;
        if format == "json" {
            let out = serde_json::json!({ "run": run, "tests": tests });
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            print_run(&run);
            for test in &tests {
                println!("    {:<12} {}", test.status.as_str(), test.id);
            }
        }
        return Ok(());
    }

    let runs = list(&state, cluster_id, latest)?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&runs)?);
    } else {
        for run in &runs {
            print_run(run);
        }
    }
    Ok(())
}

fn list(state: &StateStore, cluster_id: Option<&str>, latest: bool) -> anyhow::Result<Vec<TestRun>> {
    Ok(match (cluster_id, latest) {
        (Some(cluster_id), true) => state.latest_runs_for_cluster(cluster_id)?,
        (None, true) => anyhow::bail!("--latest requires --cluster"),
        (Some(cluster_id), false) => state.list_runs_for_cluster(cluster_id)?,
        (None, false) => state.list_runs()?,
    })
}

fn print_run(run: &TestRun) {
    println!(
        "{:>6}  {:<12} {}/{}  release {}  started {}",
        run.id,
        run.status.as_str(),
        run.cluster_id,
        run.test_set_id,
        run.release_version,
        run.started_at
    );
}
