//! 动作执行器
//!
//! 将一个通过校验的 ToolCall 翻译为自动化表面操作并归一化结果。
//! 任何失败都折成失败的 ToolResult，绝不让错误越过调度边界；
//! 每次执行输出一条结构化审计日志（JSON）。

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::time::sleep;

use crate::browser::{BrowserSurface, ContentExtractor};
use crate::tools::{
    CompleteArgs, LoadState, ScreenshotArgs, ToolCall, ToolResult, WaitForArgs,
};

/// 执行节奏与工件位置
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub navigation_timeout: Duration,
    pub action_timeout: Duration,
    /// type 动作的逐字符间隔
    pub char_delay: Duration,
    /// 点击/提交/滚动后的静置时长
    pub settle_delay: Duration,
    pub artifacts_dir: PathBuf,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            action_timeout: Duration::from_secs(10),
            char_delay: Duration::from_millis(50),
            settle_delay: Duration::from_millis(500),
            artifacts_dir: PathBuf::from("artifacts"),
        }
    }
}

/// 动作执行器：除截图命名计数外无状态
pub struct ActionExecutor {
    surface: Arc<dyn BrowserSurface>,
    extractor: Arc<dyn ContentExtractor>,
    options: ExecutorOptions,
    shot_seq: AtomicU32,
}

impl ActionExecutor {
    pub fn new(
        surface: Arc<dyn BrowserSurface>,
        extractor: Arc<dyn ContentExtractor>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            surface,
            extractor,
            options,
            shot_seq: AtomicU32::new(0),
        }
    }

    /// 执行一个动作并返回归一化结果；附带审计日志
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let start = Instant::now();
        let result = self.dispatch(call).await;

        let audit = json!({
            "event": "action_audit",
            "action": call.name(),
            "ok": result.success,
            "duration_ms": start.elapsed().as_millis() as u64,
            "error": result.error,
        });
        tracing::info!(audit = %audit.to_string(), "action");

        result
    }

    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        match call {
            ToolCall::Navigate(args) => {
                // 缺省等待 DOM 就绪，而非整页网络空闲
                let wait = args.wait_until.unwrap_or(LoadState::DomContentLoaded);
                match self
                    .surface
                    .navigate(&args.url, wait, self.options.navigation_timeout)
                    .await
                {
                    Ok(()) => {
                        let url = self
                            .surface
                            .current_url()
                            .await
                            .unwrap_or_else(|_| args.url.clone());
                        let title = self.surface.title().await.unwrap_or(None);
                        ToolResult::ok(json!({ "url": url, "title": title }))
                    }
                    Err(e) => ToolResult::fail(e),
                }
            }

            ToolCall::Click(args) => {
                let timeout = args
                    .timeout
                    .map(Duration::from_millis)
                    .unwrap_or(self.options.action_timeout);
                match self.surface.click(&args.selector, timeout).await {
                    Ok(()) => {
                        sleep(self.options.settle_delay).await;
                        ToolResult::ok_empty().with_selector(&args.selector)
                    }
                    Err(e) => ToolResult::fail(e).with_selector(&args.selector),
                }
            }

            ToolCall::Type(args) => {
                let clear = args.clear.unwrap_or(false);
                let typed = self
                    .surface
                    .type_text(
                        &args.selector,
                        &args.text,
                        clear,
                        self.options.char_delay,
                        self.options.action_timeout,
                    )
                    .await;
                match typed {
                    Ok(()) => {
                        if args.submit.unwrap_or(false) {
                            if let Err(e) = self.surface.press_enter(&args.selector).await {
                                return ToolResult::fail(e).with_selector(&args.selector);
                            }
                            sleep(self.options.settle_delay).await;
                        }
                        ToolResult::ok_empty().with_selector(&args.selector)
                    }
                    Err(e) => ToolResult::fail(e).with_selector(&args.selector),
                }
            }

            ToolCall::Extract(args) => {
                let html = match self.surface.page_html().await {
                    Ok(html) => html,
                    Err(e) => return ToolResult::fail(e),
                };
                let url = self.surface.current_url().await.unwrap_or_default();
                match self.extractor.extract(&html, &url, args.mode) {
                    Ok(value) => ToolResult::ok(value),
                    Err(e) => ToolResult::fail(e),
                }
            }

            ToolCall::WaitFor(args) => self.wait_for(args).await,

            ToolCall::Screenshot(args) => self.screenshot(args).await,

            ToolCall::Scroll(args) => {
                match self.surface.scroll_by(args.direction, args.amount).await {
                    Ok(()) => {
                        sleep(self.options.settle_delay).await;
                        ToolResult::ok_empty()
                    }
                    Err(e) => ToolResult::fail(e),
                }
            }

            ToolCall::Query(args) => match self.surface.query(&args.selector).await {
                Ok(Some(probe)) => ToolResult::ok(json!({
                    "text": probe.text,
                    "visible": probe.visible,
                }))
                .with_selector(&args.selector),
                Ok(None) => ToolResult::fail(format!("Element not found: {}", args.selector))
                    .with_selector(&args.selector),
                Err(e) => ToolResult::fail(e).with_selector(&args.selector),
            },

            ToolCall::GoBack(_) => match self.surface.go_back().await {
                Ok(()) => ToolResult::ok_empty(),
                Err(e) => ToolResult::fail(e),
            },

            // complete 纯透传参数，本身永不失败；终局判定归编排器
            ToolCall::Complete(CompleteArgs {
                success,
                result,
                reason,
            }) => ToolResult::ok(json!({
                "success": success,
                "result": result,
                "reason": reason,
            })),
        }
    }

    /// selector 与 state 必须恰好给出一个，否则是非异常的失败结果
    async fn wait_for(&self, args: &WaitForArgs) -> ToolResult {
        let timeout = args
            .timeout
            .map(Duration::from_millis)
            .unwrap_or(self.options.action_timeout);
        match (&args.selector, &args.state) {
            (Some(selector), None) => {
                match self.surface.wait_for_selector(selector, timeout).await {
                    Ok(()) => ToolResult::ok_empty().with_selector(selector),
                    Err(e) => ToolResult::fail(e).with_selector(selector),
                }
            }
            (None, Some(state)) => match self.surface.wait_for_state(*state, timeout).await {
                Ok(()) => ToolResult::ok_empty(),
                Err(e) => ToolResult::fail(e),
            },
            _ => ToolResult::fail("waitFor needs exactly one of selector or state"),
        }
    }

    async fn screenshot(&self, args: &ScreenshotArgs) -> ToolResult {
        let seq = self.shot_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let suffix = args
            .purpose
            .as_deref()
            .map(|p| format!("_{}", sanitize(p)))
            .unwrap_or_default();
        let path = self
            .options
            .artifacts_dir
            .join(format!("shot_{seq:03}{suffix}.png"));
        let full_page = args.full_page.unwrap_or(false);
        match self.surface.screenshot(&path, full_page).await {
            Ok(()) => {
                let display = path.display().to_string();
                ToolResult::ok(json!({ "path": display })).with_artifact(display)
            }
            Err(e) => ToolResult::fail(e),
        }
    }
}

/// 文件名安全化：保留字母数字与连字符
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .take(40)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::ElementProbe;
    use crate::core::SelectorDescriptor;
    use crate::tools::{
        ExtractArgs, ExtractMode, GoBackArgs, NavigateArgs, QueryArgs, ScrollDirection,
        TypeArgs,
    };
    use async_trait::async_trait;
    use std::path::Path;

    /// 测试桩：按选择器约定成功或失败
    struct StubSurface;

    #[async_trait]
    impl BrowserSurface for StubSurface {
        async fn navigate(
            &self,
            url: &str,
            _wait: LoadState,
            _timeout: Duration,
        ) -> Result<(), String> {
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

        async fn click(&self, selector: &str, _timeout: Duration) -> Result<(), String> {
            if selector == "#missing" {
                Err(format!("Element not found: {selector}"))
            } else {
                Ok(())
            }
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

        async fn wait_for_selector(
            &self,
            _selector: &str,
            _timeout: Duration,
        ) -> Result<(), String> {
            Ok(())
        }

        async fn wait_for_state(
            &self,
            _state: LoadState,
            _timeout: Duration,
        ) -> Result<(), String> {
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

        async fn query(&self, selector: &str) -> Result<Option<ElementProbe>, String> {
            if selector == "#absent" {
                Ok(None)
            } else {
                Ok(Some(ElementProbe {
                    text: "Example Domain".into(),
                    visible: true,
                }))
            }
        }

        async fn go_back(&self) -> Result<(), String> {
            Ok(())
        }

        async fn page_html(&self) -> Result<String, String> {
            Ok("<html><body><p>Example Domain</p></body></html>".into())
        }

        async fn interactive_elements(&self) -> Result<Vec<SelectorDescriptor>, String> {
            Ok(Vec::new())
        }

        async fn close(&self) {}
    }

    struct StubExtractor;

    impl ContentExtractor for StubExtractor {
        fn extract(
            &self,
            _html: &str,
            _base_url: &str,
            mode: ExtractMode,
        ) -> Result<serde_json::Value, String> {
            Ok(json!({ "mode": format!("{mode:?}") }))
        }
    }

    fn executor(dir: &Path) -> ActionExecutor {
        let options = ExecutorOptions {
            settle_delay: Duration::from_millis(0),
            char_delay: Duration::from_millis(0),
            artifacts_dir: dir.to_path_buf(),
            ..ExecutorOptions::default()
        };
        ActionExecutor::new(Arc::new(StubSurface), Arc::new(StubExtractor), options)
    }

    #[tokio::test]
    async fn navigate_result_carries_url_and_title() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path())
            .execute(&ToolCall::Navigate(NavigateArgs {
                url: "https://example.com".into(),
                wait_until: None,
            }))
            .await;
        assert!(result.success);
        let payload = result.result.unwrap();
        assert_eq!(payload["url"], "https://example.com/");
        assert_eq!(payload["title"], "Example Domain");
    }

    #[tokio::test]
    async fn navigate_failure_is_a_result_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path())
            .execute(&ToolCall::Navigate(NavigateArgs {
                url: "https://unreachable.example".into(),
                wait_until: None,
            }))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("net::ERR"));
    }

    #[tokio::test]
    async fn wait_for_rejects_zero_or_two_conditions() {
        let dir = tempfile::tempdir().unwrap();
        let ex = executor(dir.path());

        let neither = ex
            .execute(&ToolCall::WaitFor(WaitForArgs {
                selector: None,
                state: None,
                timeout: None,
            }))
            .await;
        assert!(!neither.success);
        assert!(neither.error.unwrap().contains("exactly one"));

        let both = ex
            .execute(&ToolCall::WaitFor(WaitForArgs {
                selector: Some("#a".into()),
                state: Some(LoadState::Load),
                timeout: None,
            }))
            .await;
        assert!(!both.success);
    }

    #[tokio::test]
    async fn query_missing_element_is_a_failure_result() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path())
            .execute(&ToolCall::Query(QueryArgs {
                selector: "#absent".into(),
            }))
            .await;
        assert!(!result.success);
        assert_eq!(result.selector.as_deref(), Some("#absent"));
    }

    #[tokio::test]
    async fn query_returns_text_and_visibility() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path())
            .execute(&ToolCall::Query(QueryArgs {
                selector: "h1".into(),
            }))
            .await;
        assert!(result.success);
        let payload = result.result.unwrap();
        assert_eq!(payload["text"], "Example Domain");
        assert_eq!(payload["visible"], true);
    }

    #[tokio::test]
    async fn screenshot_counter_names_sequential_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let ex = executor(dir.path());
        let first = ex
            .execute(&ToolCall::Screenshot(ScreenshotArgs {
                purpose: Some("login page".into()),
                full_page: None,
            }))
            .await;
        let second = ex
            .execute(&ToolCall::Screenshot(ScreenshotArgs {
                purpose: None,
                full_page: Some(true),
            }))
            .await;
        let first_path = first.artifact.unwrap();
        let second_path = second.artifact.unwrap();
        assert!(first_path.contains("shot_001_login-page"));
        assert!(second_path.contains("shot_002"));
        assert!(Path::new(&second_path).exists());
    }

    #[tokio::test]
    async fn complete_passes_arguments_through() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path())
            .execute(&ToolCall::Complete(CompleteArgs {
                success: true,
                result: Some("Example Domain".into()),
                reason: None,
            }))
            .await;
        assert!(result.success);
        assert_eq!(result.result.unwrap()["result"], "Example Domain");
    }

    #[tokio::test]
    async fn extract_delegates_to_the_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path())
            .execute(&ToolCall::Extract(ExtractArgs {
                mode: ExtractMode::Raw,
            }))
            .await;
        assert!(result.success);
        assert_eq!(result.result.unwrap()["mode"], "Raw");
    }

    #[tokio::test]
    async fn click_failure_echoes_selector() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path())
            .execute(&ToolCall::Click(crate::tools::ClickArgs {
                selector: "#missing".into(),
                timeout: None,
            }))
            .await;
        assert!(!result.success);
        assert_eq!(result.selector.as_deref(), Some("#missing"));
    }

    #[tokio::test]
    async fn type_with_submit_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path())
            .execute(&ToolCall::Type(TypeArgs {
                selector: "#q".into(),
                text: "rust".into(),
                submit: Some(true),
                clear: Some(true),
            }))
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn go_back_returns_ok_empty() {
        let dir = tempfile::tempdir().unwrap();
        let result = executor(dir.path())
            .execute(&ToolCall::GoBack(GoBackArgs {}))
            .await;
        assert!(result.success);
        assert!(result.result.is_none());
    }
}
