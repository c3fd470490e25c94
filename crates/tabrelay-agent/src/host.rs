//! Host seam — the browser's tab registry and process table.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tabrelay_core::{Error, Result};

use crate::types::Tab;

/// Read-only access to the host browser's tabs.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Enumerate every open tab across all windows.
    async fn query_tabs(&self) -> Result<Vec<Tab>>;

    /// Resolve the OS process hosting the given tab.
    async fn process_id_for_tab(&self, tab_id: i64) -> Result<i64>;
}

/// In-memory tab registry.
///
/// Tabs are kept ordered by id. Process ids are assigned per tab; a tab
/// without one fails lookup.
#[derive(Default)]
pub struct MemoryHost {
    tabs: RwLock<BTreeMap<i64, Tab>>,
    pids: RwLock<HashMap<i64, i64>>,
    query_failure: RwLock<Option<String>>,
    queries: AtomicUsize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or replace) a tab, optionally with its process id.
    pub fn open(&self, tab: Tab, pid: Option<i64>) {
        let id = tab.id;
        self.tabs.write().insert(id, tab);
        let mut pids = self.pids.write();
        match pid {
            Some(pid) => {
                pids.insert(id, pid);
            }
            None => {
                pids.remove(&id);
            }
        }
    }

    /// Close a tab. Returns the removed tab, if it was open.
    pub fn close(&self, tab_id: i64) -> Option<Tab> {
        self.pids.write().remove(&tab_id);
        self.tabs.write().remove(&tab_id)
    }

    /// Apply a change to an open tab.
    pub fn update(&self, tab_id: i64, f: impl FnOnce(&mut Tab)) -> bool {
        match self.tabs.write().get_mut(&tab_id) {
            Some(tab) => {
                f(tab);
                true
            }
            None => false,
        }
    }

    /// Make every subsequent enumeration fail with `reason` (`None` clears it).
    pub fn fail_queries(&self, reason: Option<&str>) {
        *self.query_failure.write() = reason.map(str::to_string);
    }

    pub fn len(&self) -> usize {
        self.tabs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.read().is_empty()
    }

    /// Number of enumerations performed so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TabHost for MemoryHost {
    async fn query_tabs(&self) -> Result<Vec<Tab>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let failure = self.query_failure.read().clone();
        if let Some(reason) = failure {
            return Err(Error::Host(reason));
        }
        Ok(self.tabs.read().values().cloned().collect())
    }

    async fn process_id_for_tab(&self, tab_id: i64) -> Result<i64> {
        self.pids
            .read()
            .get(&tab_id)
            .copied()
            .ok_or_else(|| Error::ProcessLookup {
                tab_id,
                reason: "no process for tab".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_returns_open_tabs_in_id_order() {
        let host = MemoryHost::new();
        host.open(Tab::new(2, 1, "https://b.test", "B"), Some(101));
        host.open(Tab::new(1, 1, "https://a.test", "A"), Some(100));

        let tabs = host.query_tabs().await.unwrap();
        let ids: Vec<i64> = tabs.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(host.query_count(), 1);
    }

    #[tokio::test]
    async fn test_close_removes_tab_and_pid() {
        let host = MemoryHost::new();
        host.open(Tab::new(1, 1, "https://a.test", "A"), Some(100));
        assert!(host.close(1).is_some());
        assert!(host.is_empty());
        assert!(host.process_id_for_tab(1).await.is_err());
        assert!(host.close(1).is_none());
    }

    #[tokio::test]
    async fn test_pid_lookup() {
        let host = MemoryHost::new();
        host.open(Tab::new(1, 1, "https://a.test", "A"), Some(100));
        host.open(Tab::new(2, 1, "chrome://newtab", "New Tab"), None);

        assert_eq!(host.process_id_for_tab(1).await.unwrap(), 100);
        let err = host.process_id_for_tab(2).await.unwrap_err();
        assert!(matches!(err, Error::ProcessLookup { tab_id: 2, .. }));
    }

    #[tokio::test]
    async fn test_query_failure() {
        let host = MemoryHost::new();
        host.fail_queries(Some("tabs permission missing"));
        assert!(host.query_tabs().await.is_err());
        host.fail_queries(None);
        assert!(host.query_tabs().await.unwrap().is_empty());
    }

    #[test]
    fn test_update() {
        let host = MemoryHost::new();
        host.open(Tab::new(1, 1, "https://a.test", "A"), None);
        assert!(host.update(1, |t| t.title = Some("Renamed".into())));
        assert!(!host.update(9, |_| {}));
    }
}
