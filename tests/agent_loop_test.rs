//! 主控循环集成测试：脚本化 Mock LLM + 桩浏览器跑完整场景

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use wasp::agent::{AgentSession, Planner, RunRecorder};
use wasp::browser::{
    BrowserSurface, ElementProbe, HtmlExtractor, SnapshotObserver,
};
use wasp::core::{Goal, SelectorDescriptor};
use wasp::llm::MockLlmClient;
use wasp::policy::{PolicyGuard, SafetyPolicy};
use wasp::tools::{ActionExecutor, ExecutorOptions, LoadState, ScrollDirection};

/// 桩浏览器：固定页面，按 URL 约定失败，统计导航次数
struct FakeSurface {
    navigations: AtomicUsize,
}

impl FakeSurface {
    fn new() -> Self {
        Self {
            navigations: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BrowserSurface for FakeSurface {
    async fn navigate(
        &self,
        url: &str,
        _wait: LoadState,
        _timeout: Duration,
    ) -> Result<(), String> {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        if url.contains("unreachable") {
            Err("net::ERR_CONNECTION_RESET".into())
        } else {
            Ok(())
        }
    }

    async fn current_url(&self) -> Result<String, String> {
        Ok("https://example.com/".into())
    }

    async fn title(&self) -> Result<Option<String>, String> {
        Ok(Some("Example Domain".into()))
    }

    async fn click(&self, _selector: &str, _timeout: Duration) -> Result<(), String> {
        Ok(())
    }

    async fn type_text(
        &self,
        _selector: &str,
        _text: &str,
        _clear: bool,
        _char_delay: Duration,
        _timeout: Duration,
    ) -> Result<(), String> {
        Ok(())
    }

    async fn press_enter(&self, _selector: &str) -> Result<(), String> {
        Ok(())
    }

    async fn wait_for_selector(&self, _selector: &str, _timeout: Duration) -> Result<(), String> {
        Ok(())
    }

    async fn wait_for_state(&self, _state: LoadState, _timeout: Duration) -> Result<(), String> {
        Ok(())
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(path, b"png").map_err(|e| e.to_string())
    }

    async fn scroll_by(
        &self,
        _direction: ScrollDirection,
        _amount: Option<i64>,
    ) -> Result<(), String> {
        Ok(())
    }

    async fn query(&self, _selector: &str) -> Result<Option<ElementProbe>, String> {
        Ok(Some(ElementProbe {
            text: "Example Domain".into(),
            visible: true,
        }))
    }

    async fn go_back(&self) -> Result<(), String> {
        Ok(())
    }

    async fn page_html(&self) -> Result<String, String> {
        Ok("<html><head><title>Example Domain</title></head>\
            <body><h1>Example Domain</h1></body></html>"
            .into())
    }

    async fn interactive_elements(&self) -> Result<Vec<SelectorDescriptor>, String> {
        Ok(Vec::new())
    }

    async fn close(&self) {}
}

struct Harness {
    session: AgentSession,
    surface: Arc<FakeSurface>,
    _recorder_dir: tempfile::TempDir,
    recorder_path: std::path::PathBuf,
}

fn harness(script: Vec<&str>, policy: SafetyPolicy) -> Harness {
    let surface = Arc::new(FakeSurface::new());
    let recorder_dir = tempfile::tempdir().unwrap();
    let artifacts_dir = recorder_dir.path().join("artifacts");
    let recorder_path = recorder_dir.path().to_path_buf();

    let llm = Arc::new(MockLlmClient::with_script(
        script.into_iter().map(String::from).collect(),
    ));
    let planner = Planner::new(llm);
    let executor = ActionExecutor::new(
        surface.clone(),
        Arc::new(HtmlExtractor::new(4000)),
        ExecutorOptions {
            settle_delay: Duration::from_millis(0),
            char_delay: Duration::from_millis(0),
            artifacts_dir,
            ..ExecutorOptions::default()
        },
    );
    let observer = Arc::new(SnapshotObserver::new(surface.clone(), 500));
    let session = AgentSession::new(
        planner,
        executor,
        PolicyGuard::new(policy),
        RunRecorder::new(recorder_path.clone()),
        observer,
        surface.clone(),
        Duration::from_millis(0),
    );

    Harness {
        session,
        surface,
        _recorder_dir: recorder_dir,
        recorder_path,
    }
}

#[tokio::test]
async fn three_step_run_completes_with_final_result() {
    let h = harness(
        vec![
            r#"Open the page first. {"tool": "navigate", "args": {"url": "https://example.com"}}"#,
            r#"{"tool": "extract", "args": {"mode": "raw"}}"#,
            r#"{"tool": "complete", "args": {"success": true, "result": "Example Domain"}}"#,
        ],
        SafetyPolicy::default(),
    );

    let outcome = h
        .session
        .run(Goal::new("find the title").with_max_steps(3))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.steps, 3);
    assert_eq!(outcome.result.as_deref(), Some("Example Domain"));
}

#[tokio::test]
async fn blocked_navigation_fails_run_before_execution() {
    let h = harness(
        vec![r#"{"tool": "navigate", "args": {"url": "https://badsite.com/x"}}"#],
        SafetyPolicy {
            blocked_domains: vec!["badsite.com".into()],
            ..SafetyPolicy::default()
        },
    );

    let navigations = h.surface.clone();
    let outcome = h.session.run(Goal::new("visit badsite")).await;

    assert!(!outcome.success);
    assert_eq!(outcome.steps, 0);
    assert!(outcome.error.unwrap().contains("blocked"));
    // 被拒动作从未到达执行器
    assert_eq!(navigations.navigations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn critical_network_error_terminates_the_run() {
    let h = harness(
        vec![
            r#"{"tool": "navigate", "args": {"url": "https://example.com"}}"#,
            r#"{"tool": "navigate", "args": {"url": "https://unreachable.example"}}"#,
            r#"{"tool": "complete", "args": {"success": true, "result": "should not get here"}}"#,
        ],
        SafetyPolicy::default(),
    );

    let outcome = h.session.run(Goal::new("resilience check")).await;

    assert!(!outcome.success);
    assert_eq!(outcome.steps, 2);
    assert!(outcome.error.unwrap().contains("net::ERR_CONNECTION_RESET"));
}

#[tokio::test]
async fn exhausted_step_budget_times_out() {
    let h = harness(
        vec![
            r#"{"tool": "query", "args": {"selector": "h1"}}"#,
            r#"{"tool": "query", "args": {"selector": "h1"}}"#,
            r#"{"tool": "query", "args": {"selector": "h1"}}"#,
        ],
        SafetyPolicy::default(),
    );

    let outcome = h
        .session
        .run(Goal::new("loiter forever").with_max_steps(3))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.steps, 3);
    assert!(outcome.error.unwrap().contains("budget"));
}

#[tokio::test]
async fn reply_without_action_fails_immediately() {
    let h = harness(
        vec!["I cannot decide what to do."],
        SafetyPolicy::default(),
    );

    let outcome = h.session.run(Goal::new("indecision")).await;

    assert!(!outcome.success);
    assert_eq!(outcome.steps, 0);
    assert!(outcome.error.unwrap().contains("No action"));
}

#[tokio::test]
async fn unsuccessful_complete_fails_with_reason() {
    let h = harness(
        vec![r#"{"tool": "complete", "args": {"success": false, "reason": "login wall"}}"#],
        SafetyPolicy::default(),
    );

    let outcome = h.session.run(Goal::new("read a private page")).await;

    assert!(!outcome.success);
    assert_eq!(outcome.steps, 1);
    assert_eq!(outcome.result.as_deref(), Some("login wall"));
}

#[tokio::test]
async fn recorder_persists_run_and_report() {
    let h = harness(
        vec![
            r#"{"tool": "extract", "args": {"mode": "raw"}}"#,
            r#"{"tool": "complete", "args": {"success": true, "result": "ok"}}"#,
        ],
        SafetyPolicy::default(),
    );
    let recorder_path = h.recorder_path.clone();

    let outcome = h.session.run(Goal::new("record me")).await;
    assert!(outcome.success);

    // runs/<id>/{run.json, step_000.json, report.md}
    let run_dir = std::fs::read_dir(&recorder_path)
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.path().is_dir() && e.file_name() != "artifacts")
        .expect("run directory")
        .path();
    assert!(run_dir.join("run.json").exists());
    assert!(run_dir.join("step_000.json").exists());
    assert!(run_dir.join("step_001.json").exists());
    let report = std::fs::read_to_string(run_dir.join("report.md")).unwrap();
    assert!(report.contains("record me"));
    assert!(report.contains("**Status:** completed"));

    let run_json = std::fs::read_to_string(run_dir.join("run.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&run_json).unwrap();
    assert_eq!(parsed["status"], "completed");
    assert_eq!(parsed["steps"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn per_domain_budget_ends_overlong_sessions() {
    let h = harness(
        vec![
            r#"{"tool": "query", "args": {"selector": "h1"}}"#,
            r#"{"tool": "query", "args": {"selector": "h1"}}"#,
            r#"{"tool": "query", "args": {"selector": "h1"}}"#,
        ],
        SafetyPolicy {
            max_steps_per_domain: Some(2),
            ..SafetyPolicy::default()
        },
    );

    let outcome = h.session.run(Goal::new("budget check")).await;

    assert!(!outcome.success);
    // 前两步放行，第三步被预算拒绝且不计入
    assert_eq!(outcome.steps, 2);
    assert!(outcome.error.unwrap().contains("budget"));
}
