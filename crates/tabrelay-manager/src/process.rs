//! Process seam — renderer discovery and termination.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use sysinfo::{Pid, Signal, System};
use tabrelay_core::{Error, Result};
use tracing::debug;

/// Command-line flag carrying the browser-internal renderer id.
const CLIENT_ID_FLAG: &str = "--renderer-client-id=";

/// A live renderer process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererProcess {
    /// OS process id.
    pub pid: u32,
    /// Resident set size in KB.
    pub rss_kb: u64,
    /// Browser-internal id, matching the `pid` field of reported tabs.
    pub client_id: i64,
}

/// Access to the operating system's renderer processes.
pub trait ProcessTable: Send + Sync {
    /// Renderers currently running.
    fn renderer_processes(&self) -> Result<Vec<RendererProcess>>;

    /// Terminate a renderer. The browser shows its tab as crashed.
    fn kill(&self, pid: u32) -> Result<()>;
}

/// Extract the renderer id from a process command line.
pub fn parse_client_id(args: &[String]) -> Option<i64> {
    args.iter()
        .find_map(|arg| arg.strip_prefix(CLIENT_ID_FLAG))
        .and_then(|id| id.trim().parse().ok())
}

/// Reads the live process table through `sysinfo`.
pub struct SystemProcessTable {
    process_name: String,
    system: Mutex<System>,
}

impl SystemProcessTable {
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            system: Mutex::new(System::new()),
        }
    }
}

impl ProcessTable for SystemProcessTable {
    fn renderer_processes(&self) -> Result<Vec<RendererProcess>> {
        let mut system = self.system.lock();
        system.refresh_processes();

        let renderers: Vec<RendererProcess> = system
            .processes()
            .iter()
            .filter(|(_, proc)| proc.name().contains(self.process_name.as_str()))
            .filter_map(|(pid, proc)| {
                let client_id = parse_client_id(proc.cmd())?;
                Some(RendererProcess {
                    pid: pid.as_u32(),
                    rss_kb: proc.memory() / 1024,
                    client_id,
                })
            })
            .collect();

        debug!("Found {} {} renderers", renderers.len(), self.process_name);
        Ok(renderers)
    }

    fn kill(&self, pid: u32) -> Result<()> {
        let system = self.system.lock();
        let process = system
            .process(Pid::from_u32(pid))
            .ok_or_else(|| Error::Process(format!("No such process: {}", pid)))?;

        let delivered = process
            .kill_with(Signal::Kill)
            .unwrap_or_else(|| process.kill());
        if delivered {
            Ok(())
        } else {
            Err(Error::Process(format!("Failed to kill process {}", pid)))
        }
    }
}

/// Process table held in memory. Killed renderers disappear from it.
#[derive(Default)]
pub struct MemoryProcessTable {
    renderers: Mutex<BTreeMap<u32, RendererProcess>>,
    killed: Mutex<Vec<u32>>,
}

impl MemoryProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, pid: u32, client_id: i64, rss_kb: u64) {
        self.renderers.lock().insert(
            pid,
            RendererProcess {
                pid,
                rss_kb,
                client_id,
            },
        );
    }

    pub fn set_rss(&self, pid: u32, rss_kb: u64) {
        if let Some(renderer) = self.renderers.lock().get_mut(&pid) {
            renderer.rss_kb = rss_kb;
        }
    }

    /// Pids killed so far, in order.
    pub fn killed(&self) -> Vec<u32> {
        self.killed.lock().clone()
    }
}

impl ProcessTable for MemoryProcessTable {
    fn renderer_processes(&self) -> Result<Vec<RendererProcess>> {
        Ok(self.renderers.lock().values().cloned().collect())
    }

    fn kill(&self, pid: u32) -> Result<()> {
        if self.renderers.lock().remove(&pid).is_none() {
            return Err(Error::Process(format!("No such process: {}", pid)));
        }
        self.killed.lock().push(pid);
        Ok(())
    }
}
