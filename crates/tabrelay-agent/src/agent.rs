//! Agent lifecycle — heartbeat timer and host event loop.

use std::sync::Arc;

use tabrelay_core::{AgentConfig, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::reporter::{ReporterStats, TabReporter};
use crate::types::{ReportOutcome, TabEvent};

/// Running tab reporter: owns the heartbeat and event loop tasks.
pub struct Agent {
    reporter: Arc<TabReporter>,
    events_tx: mpsc::UnboundedSender<TabEvent>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Agent {
    /// Start the heartbeat and event loop. Must be called within a tokio runtime.
    pub fn start(reporter: Arc<TabReporter>, config: &AgentConfig) -> Result<Self> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let heartbeat = spawn_heartbeat(
            reporter.clone(),
            config.heartbeat_interval,
            shutdown_rx.clone(),
        );
        let event_loop = spawn_event_loop(reporter.clone(), events_rx, shutdown_rx);

        info!(
            "Tab reporter started: collector={}, heartbeat={}ms",
            config.collector_url,
            config.heartbeat_interval.as_millis()
        );

        Ok(Self {
            reporter,
            events_tx,
            shutdown_tx,
            tasks: vec![heartbeat, event_loop],
        })
    }

    /// Sender for host event subscriptions.
    pub fn events(&self) -> mpsc::UnboundedSender<TabEvent> {
        self.events_tx.clone()
    }

    /// Handle an event immediately, bypassing the event queue.
    pub fn dispatch(&self, event: &TabEvent) -> Option<JoinHandle<ReportOutcome>> {
        self.reporter.handle(event)
    }

    pub fn stats(&self) -> ReporterStats {
        self.reporter.stats()
    }

    /// Stop the heartbeat and event loop. Reports already in flight finish on their own.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("Tab reporter stopped");
    }
}

fn spawn_heartbeat(
    reporter: Arc<TabReporter>,
    period: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    reporter.handle(&TabEvent::Heartbeat);
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Heartbeat stopped");
    })
}

fn spawn_event_loop(
    reporter: Arc<TabReporter>,
    mut events: mpsc::UnboundedReceiver<TabEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        reporter.handle(&event);
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        debug!("Event loop stopped");
    })
}
