//! Manager cycle — snapshot, join, evaluate, kill, report.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tabrelay_core::{json, Result};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ManagerConfig;
use crate::process::ProcessTable;
use crate::snapshot;
use crate::strategy::{join, KillDecision, MemoryPolicy, TabUsage};

/// Outcome of one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub tabs: Vec<TabUsage>,
    /// Renderers actually killed.
    pub killed: Vec<KillDecision>,
}

/// One row of `output.json`.
#[derive(Debug, Serialize)]
struct UsageRow<'a> {
    tab_id: i64,
    tab_name: &'a str,
    tab_process_id: i64,
    tab_rss: u64,
    is_active: bool,
    #[serde(rename = "inActive_time")]
    inactive_time: u64,
}

#[derive(Debug, Serialize)]
struct UsageReport<'a> {
    tab_info_instance: Vec<UsageRow<'a>>,
}

pub struct TabMemoryManager {
    config: ManagerConfig,
    processes: Arc<dyn ProcessTable>,
    policy: Mutex<MemoryPolicy>,
}

impl TabMemoryManager {
    pub fn new(config: ManagerConfig, processes: Arc<dyn ProcessTable>) -> Self {
        let policy = Mutex::new(MemoryPolicy::new(&config));
        Self {
            config,
            processes,
            policy,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Run one cycle. Individual kill failures are logged, not returned.
    pub fn run_cycle(&self) -> Result<CycleReport> {
        let records = snapshot::load(&self.config.snapshot_path)?;
        let renderers = self.processes.renderer_processes()?;
        let tabs = join(&records, &renderers);

        let total_kb: u64 = tabs.iter().map(|t| t.rss_kb).sum();
        debug!(
            "{} tabs, {} renderers, {} KB total (limit {} KB)",
            tabs.len(),
            renderers.len(),
            total_kb,
            self.config.rss_limit
        );

        let mut policy = self.policy.lock();
        let decisions = policy.evaluate(&tabs);

        let mut killed = Vec::with_capacity(decisions.len());
        for decision in decisions {
            match self.processes.kill(decision.pid) {
                Ok(()) => {
                    info!(
                        "Killed renderer {} (tab renderer {}): {}",
                        decision.pid, decision.client_id, decision.reason
                    );
                    killed.push(decision);
                }
                Err(e) => error!("Failed to kill renderer {}: {}", decision.pid, e),
            }
        }

        if let Err(e) = write_usage(&self.config.output_path, &tabs, &policy) {
            warn!(
                "Failed to write usage report {}: {}",
                self.config.output_path.display(),
                e
            );
        }

        Ok(CycleReport { tabs, killed })
    }

    /// Run cycles every refresh period until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.refresh_interval();
        let start = Instant::now() + std::time::Duration::from_secs(self.config.startup_delay);
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Memory manager started: strategy={}, refresh={}s",
            self.config.strategy, self.config.refresh_time
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let manager = self.clone();
                    match tokio::task::spawn_blocking(move || manager.run_cycle()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!("Memory manager cycle skipped: {}", e),
                        Err(e) => error!("Memory manager cycle panicked: {}", e),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("Memory manager stopped");
    }
}

/// Write `output.json` through a sibling temp file so readers never see a
/// partial report.
fn write_usage(path: &Path, tabs: &[TabUsage], policy: &MemoryPolicy) -> Result<()> {
    let report = UsageReport {
        tab_info_instance: tabs
            .iter()
            .map(|tab| UsageRow {
                tab_id: tab.client_id,
                tab_name: &tab.title,
                tab_process_id: tab.pid.map(i64::from).unwrap_or(-1),
                tab_rss: tab.rss_kb,
                is_active: tab.active,
                inactive_time: tab.pid.map(|pid| policy.inactive_secs(pid)).unwrap_or(0),
            })
            .collect(),
    };
    let body = json::to_string_indented(&report)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
