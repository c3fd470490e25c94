//! Kill strategies.
//!
//! Evaluation is pure: the policy only tracks per-process counters and
//! returns the renderers to kill. The caller performs the kills.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::config::{ManagerConfig, Strategy};
use crate::process::RendererProcess;
use crate::snapshot::TabRecord;

/// Seconds of samples averaged before the change rate is checked.
pub const CHANGE_RATE_WINDOW_SECS: u64 = 30;

/// A tab joined with its renderer process.
#[derive(Debug, Clone, PartialEq)]
pub struct TabUsage {
    /// Browser-internal renderer id.
    pub client_id: i64,
    pub title: String,
    /// OS process id, `None` when no live renderer matched.
    pub pid: Option<u32>,
    /// Resident set size in KB, 0 when unmatched.
    pub rss_kb: u64,
    pub active: bool,
}

/// Join snapshot records with live renderers on the renderer id.
pub fn join(records: &[TabRecord], renderers: &[RendererProcess]) -> Vec<TabUsage> {
    let by_client: HashMap<i64, &RendererProcess> =
        renderers.iter().map(|r| (r.client_id, r)).collect();

    records
        .iter()
        .map(|record| {
            let renderer = by_client.get(&record.client_id);
            TabUsage {
                client_id: record.client_id,
                title: record.title.clone(),
                pid: renderer.map(|r| r.pid),
                rss_kb: renderer.map(|r| r.rss_kb).unwrap_or(0),
                active: record.active,
            }
        })
        .collect()
}

/// Why a renderer was chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum KillReason {
    Idle { seconds: u64 },
    RssLimit { rss_kb: u64, total_kb: u64 },
    LowChangeRate { rate: f64 },
}

impl std::fmt::Display for KillReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle { seconds } => write!(f, "inactive for {} seconds", seconds),
            Self::RssLimit { rss_kb, total_kb } => {
                write!(f, "high memory usage: {} KB of {} KB total", rss_kb, total_kb)
            }
            Self::LowChangeRate { rate } => write!(f, "low memory change rate: {:.4}", rate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KillDecision {
    pub pid: u32,
    pub client_id: i64,
    pub reason: KillReason,
}

/// Strategy state carried across cycles.
#[derive(Debug)]
pub struct MemoryPolicy {
    strategy: Strategy,
    rss_limit_kb: u64,
    idle_time_limit: u64,
    change_rate: f64,
    refresh_secs: u64,
    inactive_secs: HashMap<u32, u64>,
    window_secs: HashMap<u32, u64>,
    rss_sums: HashMap<u32, u64>,
}

impl MemoryPolicy {
    pub fn new(config: &ManagerConfig) -> Self {
        Self {
            strategy: config.strategy,
            rss_limit_kb: config.rss_limit,
            idle_time_limit: config.idle_time_limit,
            change_rate: config.memory_change_rate,
            refresh_secs: config.refresh_time.max(1),
            inactive_secs: HashMap::new(),
            window_secs: HashMap::new(),
            rss_sums: HashMap::new(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Seconds a renderer has spent in the background so far.
    pub fn inactive_secs(&self, pid: u32) -> u64 {
        self.inactive_secs.get(&pid).copied().unwrap_or(0)
    }

    /// Advance one refresh period and pick the renderers to kill.
    pub fn evaluate(&mut self, tabs: &[TabUsage]) -> Vec<KillDecision> {
        let decisions = match self.strategy {
            Strategy::IdleTimeLimit => self.by_idle_time(tabs),
            Strategy::RssLimit => self.by_rss_limit(tabs),
            Strategy::MemoryChangeRate => self.by_change_rate(tabs),
        };
        self.forget_missing(tabs);
        decisions
    }

    fn by_idle_time(&mut self, tabs: &[TabUsage]) -> Vec<KillDecision> {
        let mut decisions = Vec::new();
        for tab in tabs {
            let Some(pid) = tab.pid else { continue };
            if tab.active {
                self.inactive_secs.remove(&pid);
                continue;
            }

            let idle = self.inactive_secs.entry(pid).or_insert(0);
            *idle += self.refresh_secs;
            if *idle > self.idle_time_limit {
                decisions.push(KillDecision {
                    pid,
                    client_id: tab.client_id,
                    reason: KillReason::Idle { seconds: *idle },
                });
                self.inactive_secs.remove(&pid);
            }
        }
        decisions
    }

    /// At most one renderer per cycle: the largest in the background.
    fn by_rss_limit(&self, tabs: &[TabUsage]) -> Vec<KillDecision> {
        let total_kb: u64 = tabs.iter().map(|t| t.rss_kb).sum();
        if total_kb <= self.rss_limit_kb {
            return Vec::new();
        }

        tabs.iter()
            .filter(|t| !t.active)
            .filter_map(|t| t.pid.map(|pid| (pid, t)))
            .max_by_key(|(_, t)| t.rss_kb)
            .map(|(pid, tab)| KillDecision {
                pid,
                client_id: tab.client_id,
                reason: KillReason::RssLimit {
                    rss_kb: tab.rss_kb,
                    total_kb,
                },
            })
            .into_iter()
            .collect()
    }

    /// Sums RSS over a window, then compares the current sample against
    /// the window average. Renderers whose memory barely moved are idle.
    fn by_change_rate(&mut self, tabs: &[TabUsage]) -> Vec<KillDecision> {
        let samples = (CHANGE_RATE_WINDOW_SECS / self.refresh_secs).max(1);
        let mut decisions = Vec::new();

        for tab in tabs {
            let Some(pid) = tab.pid else { continue };
            let elapsed = self.window_secs.entry(pid).or_insert(0);
            *elapsed += self.refresh_secs;

            if *elapsed <= CHANGE_RATE_WINDOW_SECS {
                *self.rss_sums.entry(pid).or_insert(0) += tab.rss_kb;
                continue;
            }

            let sum = self.rss_sums.entry(pid).or_insert(0);
            let average = *sum as f64 / samples as f64;
            *elapsed = 0;
            *sum = 0;
            if average <= 0.0 {
                continue;
            }

            let rate = (tab.rss_kb as f64 - average).abs() / average;
            if rate < self.change_rate {
                decisions.push(KillDecision {
                    pid,
                    client_id: tab.client_id,
                    reason: KillReason::LowChangeRate { rate },
                });
            }
        }
        decisions
    }

    fn forget_missing(&mut self, tabs: &[TabUsage]) {
        let live: HashSet<u32> = tabs.iter().filter_map(|t| t.pid).collect();
        self.inactive_secs.retain(|pid, _| live.contains(pid));
        self.window_secs.retain(|pid, _| live.contains(pid));
        self.rss_sums.retain(|pid, _| live.contains(pid));
    }
}
