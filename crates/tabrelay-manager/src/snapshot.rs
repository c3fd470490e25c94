//! Tab snapshot reader — the collector's `log.json`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tabrelay_core::Result;

/// A renderer as seen from the tab side of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabRecord {
    /// Browser-internal renderer id (the reported `pid`).
    pub client_id: i64,
    /// First tab hosted by this renderer.
    pub tab_id: i64,
    pub title: String,
    /// Whether any tab hosted by this renderer is in the foreground.
    pub active: bool,
}

#[derive(Deserialize)]
struct SnapshotTab {
    #[serde(default = "no_id")]
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    pid: Option<i64>,
}

fn no_id() -> i64 {
    -1
}

/// Read the snapshot file. See [`parse`].
pub fn load(path: &Path) -> Result<Vec<TabRecord>> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

/// One record per renderer, ordered by renderer id.
///
/// Tabs without a `pid` are skipped. Tabs sharing a renderer collapse into
/// one record that counts as active if any of them is.
pub fn parse(content: &str) -> Result<Vec<TabRecord>> {
    let tabs: Vec<SnapshotTab> = serde_json::from_str(content)?;

    let mut records: BTreeMap<i64, TabRecord> = BTreeMap::new();
    for tab in tabs {
        let Some(client_id) = tab.pid else {
            continue;
        };
        records
            .entry(client_id)
            .and_modify(|r| r.active |= tab.active)
            .or_insert_with(|| TabRecord {
                client_id,
                tab_id: tab.id,
                title: tab.title.clone().unwrap_or_default(),
                active: tab.active,
            });
    }
    Ok(records.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabrelay_core::Error;

    #[test]
    fn test_parse_collector_snapshot() {
        let records = parse(
            r#"[
                {"id": 4, "windowId": 1, "title": "Mail", "active": false, "pid": 12},
                {"id": 2, "windowId": 1, "title": "Docs", "active": true, "pid": 7, "url": "https://docs.rs"}
            ]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].client_id, 7);
        assert_eq!(records[0].title, "Docs");
        assert!(records[0].active);
        assert_eq!(records[1].tab_id, 4);
        assert!(!records[1].active);
    }

    #[test]
    fn test_tabs_without_pid_skipped() {
        let records = parse(r#"[{"id": 1, "title": "Blank"}, {"id": 2, "pid": 3}]"#).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client_id, 3);
        assert_eq!(records[0].title, "");
    }

    #[test]
    fn test_shared_renderer_active_if_any_tab_is() {
        let records = parse(
            r#"[
                {"id": 1, "title": "A", "active": false, "pid": 9},
                {"id": 2, "title": "B", "active": true, "pid": 9}
            ]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tab_id, 1);
        assert!(records[0].active);
    }

    #[test]
    fn test_invalid_snapshot() {
        assert!(matches!(parse("{\"tabs\": []}"), Err(Error::Json(_))));
    }

    #[test]
    fn test_missing_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(&dir.path().join("log.json")), Err(Error::Io(_))));
    }
}
