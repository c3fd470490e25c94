//! Tab reporter types — matching the browser's tab descriptor JSON.

use serde::{Deserialize, Serialize};

/// Navigation status reported when a tab finishes loading.
pub const STATUS_COMPLETE: &str = "complete";

/// Id the browser uses for tabs it does not assign one to (devtools, sessions).
pub const TAB_ID_NONE: i64 = -1;

/// Window id for tabs outside any window.
pub const WINDOW_ID_NONE: i64 = -1;

fn tab_id_none() -> i64 {
    TAB_ID_NONE
}

fn window_id_none() -> i64 {
    WINDOW_ID_NONE
}

/// One open browser tab at the moment of enumeration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    #[serde(default = "tab_id_none")]
    pub id: i64,
    #[serde(default = "window_id_none")]
    pub window_id: i64,
    #[serde(default)]
    pub index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub highlighted: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub incognito: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded: Option<bool>,
    /// Any further host-provided descriptor fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
    /// Host process id, attached at report time. Omitted when lookup failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
}

impl Tab {
    /// Minimal tab with the identifying fields set.
    pub fn new(id: i64, window_id: i64, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            window_id,
            url: Some(url.into()),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Partial change set delivered with a tab update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ChangeInfo {
    pub fn complete() -> Self {
        Self {
            status: Some(STATUS_COMPLETE.to_string()),
            ..Default::default()
        }
    }

    pub fn loading() -> Self {
        Self {
            status: Some("loading".to_string()),
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some(STATUS_COMPLETE)
    }
}

/// Inbound event from the host browser (or the heartbeat timer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TabEvent {
    Updated {
        #[serde(rename = "tabId")]
        tab_id: i64,
        #[serde(rename = "changeInfo")]
        change_info: ChangeInfo,
        tab: Tab,
    },
    Activated {
        #[serde(rename = "tabId")]
        tab_id: i64,
        #[serde(rename = "windowId")]
        window_id: i64,
    },
    Removed {
        #[serde(rename = "tabId")]
        tab_id: i64,
        #[serde(rename = "windowId")]
        window_id: i64,
    },
    Heartbeat,
}

impl TabEvent {
    /// Whether this event should produce a full report.
    ///
    /// Updates only count once the page finished loading and has a title;
    /// intermediate navigation states are ignored.
    pub fn triggers_report(&self) -> bool {
        match self {
            Self::Updated {
                change_info, tab, ..
            } => change_info.is_complete() && tab.has_title(),
            Self::Activated { .. } | Self::Removed { .. } | Self::Heartbeat => true,
        }
    }

    pub fn trigger(&self) -> Trigger {
        match self {
            Self::Updated { .. } => Trigger::Updated,
            Self::Activated { .. } => Trigger::Activated,
            Self::Removed { .. } => Trigger::Removed,
            Self::Heartbeat => Trigger::Heartbeat,
        }
    }
}

/// What caused a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Updated,
    Activated,
    Removed,
    Heartbeat,
}

impl Trigger {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Activated => "activated",
            Self::Removed => "removed",
            Self::Heartbeat => "heartbeat",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of a single report attempt. Never an error: failures are logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Collector answered 2xx.
    Sent { tabs: usize, status: u16 },
    /// Collector answered with a non-2xx status.
    Rejected {
        tabs: usize,
        status: u16,
        reason: String,
    },
    /// Enumeration, serialization or transport failed.
    Failed { reason: String },
    /// Event did not qualify for a report.
    Skipped,
}

impl ReportOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}
