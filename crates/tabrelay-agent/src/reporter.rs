//! Report procedure — enumerate, annotate with pids, serialize, deliver.

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tabrelay_core::{json, Error, Result};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::host::TabHost;
use crate::sink::ReportSink;
use crate::types::{ReportOutcome, Tab, TabEvent, Trigger};

/// Report counters for the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReporterStats {
    pub attempted: u64,
    pub sent: u64,
    pub rejected: u64,
    pub failed: u64,
    pub skipped: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tab_count: Option<usize>,
}

/// Stateless tab reporter. Every report is independent.
pub struct TabReporter {
    host: Arc<dyn TabHost>,
    sink: Arc<dyn ReportSink>,
    stats: RwLock<ReporterStats>,
}

impl TabReporter {
    pub fn new(host: Arc<dyn TabHost>, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            host,
            sink,
            stats: RwLock::new(ReporterStats::default()),
        }
    }

    /// Handle an event: spawn a detached report if it qualifies.
    ///
    /// Returns the report task so callers may await it; dropping the handle
    /// leaves the report running.
    pub fn handle(self: &Arc<Self>, event: &TabEvent) -> Option<JoinHandle<ReportOutcome>> {
        if !event.triggers_report() {
            debug!("Ignoring {} event for intermediate tab state", event.trigger());
            self.stats.write().skipped += 1;
            return None;
        }

        let reporter = Arc::clone(self);
        let trigger = event.trigger();
        Some(tokio::spawn(async move { reporter.report(trigger).await }))
    }

    /// Run one full report. Errors are logged and folded into the outcome.
    pub async fn report(&self, trigger: Trigger) -> ReportOutcome {
        {
            let mut stats = self.stats.write();
            stats.attempted += 1;
            stats.last_report_at = Some(chrono::Utc::now().to_rfc3339());
        }

        let tabs = match self.host.query_tabs().await {
            Ok(tabs) => tabs,
            Err(e) => {
                error!("Failed to enumerate tabs ({}): {}", trigger, e);
                return self.record_failure(e);
            }
        };

        let tabs = self.annotate(tabs).await;
        let count = tabs.len();
        self.stats.write().last_tab_count = Some(count);

        let body = match serialize_tabs(&tabs) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to serialize tab info: {}", e);
                return self.record_failure(e);
            }
        };

        match self.sink.deliver(body).await {
            Ok(delivery) if delivery.is_success() => {
                info!("Tab info sent successfully ({}, {} tabs)", trigger, count);
                self.stats.write().sent += 1;
                ReportOutcome::Sent {
                    tabs: count,
                    status: delivery.status,
                }
            }
            Ok(delivery) => {
                warn!(
                    "Failed to send tab info: {} {}",
                    delivery.status, delivery.reason
                );
                self.stats.write().rejected += 1;
                ReportOutcome::Rejected {
                    tabs: count,
                    status: delivery.status,
                    reason: delivery.reason,
                }
            }
            Err(e) => {
                error!("Error sending tab info: {}", e);
                self.record_failure(e)
            }
        }
    }

    /// Resolve every tab's pid concurrently and wait for all of them.
    async fn annotate(&self, tabs: Vec<Tab>) -> Vec<Tab> {
        let lookups = tabs.into_iter().map(|mut tab| async move {
            match self.host.process_id_for_tab(tab.id).await {
                Ok(pid) => tab.pid = Some(pid),
                Err(e) => {
                    debug!("No pid for tab {}: {}", tab.id, e);
                    tab.pid = None;
                }
            }
            tab
        });
        join_all(lookups).await
    }

    fn record_failure(&self, err: Error) -> ReportOutcome {
        self.stats.write().failed += 1;
        ReportOutcome::Failed {
            reason: err.to_string(),
        }
    }

    pub fn stats(&self) -> ReporterStats {
        self.stats.read().clone()
    }
}

/// Serialize tabs as a JSON array indented by four spaces.
pub fn serialize_tabs(tabs: &[Tab]) -> Result<String> {
    json::to_string_indented(tabs)
}
