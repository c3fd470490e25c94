//! End-to-end: a reporter posting to a real collector over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use tabrelay_agent::{
    HttpSink, MemoryHost, ReportOutcome, Tab, TabEvent, TabReporter, Trigger,
};
use tabrelay_collector::CollectorState;
use tabrelay_core::AgentConfig;
use tokio::sync::oneshot;

struct RunningCollector {
    addr: SocketAddr,
    state: Arc<CollectorState>,
    stop: oneshot::Sender<()>,
    _dir: tempfile::TempDir,
}

async fn start_collector() -> RunningCollector {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(CollectorState::with_log_path(&dir.path().join("log.json")));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let server_state = state.clone();
    tokio::spawn(async move {
        tabrelay_collector::serve(listener, server_state, async move {
            let _ = stopped.await;
        })
        .await
        .unwrap();
    });

    RunningCollector {
        addr,
        state,
        stop,
        _dir: dir,
    }
}

fn reporter_for(url: String, host: Arc<MemoryHost>) -> Arc<TabReporter> {
    let config = AgentConfig {
        collector_url: url,
        ..AgentConfig::default()
    };
    let sink = Arc::new(HttpSink::new(&config).unwrap());
    Arc::new(TabReporter::new(host, sink))
}

#[tokio::test]
async fn test_report_reaches_collector() {
    let collector = start_collector().await;
    let host = Arc::new(MemoryHost::new());
    host.open(Tab::new(1, 1, "https://a.test", "A"), Some(100));
    host.open(Tab::new(2, 1, "https://b.test", "B"), Some(101));
    let reporter = reporter_for(format!("http://{}/", collector.addr), host.clone());

    let outcome = reporter.report(Trigger::Activated).await;
    assert_eq!(outcome, ReportOutcome::Sent { tabs: 2, status: 200 });

    let latest = collector.state.latest().unwrap();
    let tabs = latest.as_array().unwrap();
    assert_eq!(tabs.len(), 2);
    assert_eq!(tabs[0]["pid"], 100);
    assert_eq!(tabs[1]["windowId"], 1);

    // Closing tab 2 reports only the remaining tab.
    host.close(2);
    let outcome = reporter
        .handle(&TabEvent::Removed { tab_id: 2, window_id: 1 })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(outcome, ReportOutcome::Sent { tabs: 1, status: 200 });

    let log = std::fs::read_to_string(collector.state.log_path()).unwrap();
    let logged: serde_json::Value = serde_json::from_str(&log).unwrap();
    assert_eq!(logged.as_array().unwrap().len(), 1);
    assert_eq!(logged[0]["id"], 1);
    assert_eq!(collector.state.received(), 2);

    let _ = collector.stop.send(());
}

#[tokio::test]
async fn test_non_success_status_is_rejected_outcome() {
    let collector = start_collector().await;
    let host = Arc::new(MemoryHost::new());
    host.open(Tab::new(1, 1, "https://a.test", "A"), Some(100));
    let reporter = reporter_for(format!("http://{}/missing", collector.addr), host);

    let outcome = reporter.report(Trigger::Heartbeat).await;
    assert_eq!(
        outcome,
        ReportOutcome::Rejected {
            tabs: 1,
            status: 404,
            reason: "Not Found".into()
        }
    );
    assert_eq!(collector.state.received(), 0);

    let _ = collector.stop.send(());
}

#[tokio::test]
async fn test_collector_down_is_logged_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let host = Arc::new(MemoryHost::new());
    host.open(Tab::new(1, 1, "https://a.test", "A"), Some(100));
    let reporter = reporter_for(format!("http://127.0.0.1:{}/", port), host);

    let outcome = reporter.report(Trigger::Heartbeat).await;
    assert!(matches!(outcome, ReportOutcome::Failed { .. }));
    assert_eq!(reporter.stats().failed, 1);
}
