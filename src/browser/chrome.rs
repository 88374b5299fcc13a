//! Headless Chrome 实现（需系统安装 Chrome/Chromium）
//!
//! headless_chrome 是同步 API，所有调用经 spawn_blocking 进入阻塞线程池；
//! Tab 以 Arc 在闭包间传递。networkidle 以导航完成后的短静默近似。

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, Tab};
use std::sync::Arc;

use crate::browser::{BrowserSurface, ElementProbe};
use crate::core::SelectorDescriptor;
use crate::tools::{LoadState, ScrollDirection};

/// networkidle 近似：导航完成后再静置的时长
const NETWORK_IDLE_SETTLE: Duration = Duration::from_millis(500);
/// 等待加载状态时的轮询间隔
const STATE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 基于 Headless Chrome 的自动化表面，一个实例持有一个独占会话
pub struct HeadlessSurface {
    browser: Mutex<Option<Browser>>,
    tab: Arc<Tab>,
}

impl HeadlessSurface {
    /// 启动浏览器并打开初始标签页
    pub async fn launch() -> Result<Self, String> {
        let (browser, tab) = tokio::task::spawn_blocking(|| {
            let browser = Browser::default()
                .map_err(|e| format!("Chrome launch failed: {e}. Install Chrome/Chromium."))?;
            let tab = browser
                .new_tab()
                .map_err(|e| format!("Browser tab failed: {e}"))?;
            Ok::<_, String>((browser, tab))
        })
        .await
        .map_err(|e| format!("Task join: {e}"))??;

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            tab,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Tab>) -> Result<T, String> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(tab))
            .await
            .map_err(|e| format!("Task join: {e}"))?
    }
}

#[async_trait]
impl BrowserSurface for HeadlessSurface {
    async fn navigate(
        &self,
        url: &str,
        wait: LoadState,
        timeout: Duration,
    ) -> Result<(), String> {
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)
                .map_err(|e| format!("Navigate failed: {e}"))?;
            tab.wait_until_navigated()
                .map_err(|e| format!("Navigation timeout: {e}"))?;
            if wait == LoadState::NetworkIdle {
                std::thread::sleep(NETWORK_IDLE_SETTLE);
            }
            Ok(())
        })
        .await
    }

    async fn current_url(&self) -> Result<String, String> {
        self.blocking(move |tab| Ok(tab.get_url())).await
    }

    async fn title(&self) -> Result<Option<String>, String> {
        self.blocking(move |tab| {
            let title = tab.get_title().map_err(|e| format!("Get title failed: {e}"))?;
            Ok(if title.is_empty() { None } else { Some(title) })
        })
        .await
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), String> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            let element = tab
                .wait_for_element_with_custom_timeout(&selector, timeout)
                .map_err(|e| format!("Element not found: {selector}: {e}"))?;
            element.click().map_err(|e| format!("Click failed: {e}"))?;
            Ok(())
        })
        .await
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        clear: bool,
        char_delay: Duration,
        timeout: Duration,
    ) -> Result<(), String> {
        let selector = selector.to_string();
        let text = text.to_string();
        self.blocking(move |tab| {
            let element = tab
                .wait_for_element_with_custom_timeout(&selector, timeout)
                .map_err(|e| format!("Element not found: {selector}: {e}"))?;
            element.click().map_err(|e| format!("Focus failed: {e}"))?;
            if clear {
                let escaped = serde_json::to_string(&selector).unwrap_or_default();
                let js = format!(
                    "(function() {{ const el = document.querySelector({escaped}); \
                     if (el) {{ el.value = ''; \
                     el.dispatchEvent(new Event('input', {{ bubbles: true }})); }} }})()"
                );
                tab.evaluate(&js, false)
                    .map_err(|e| format!("Clear failed: {e}"))?;
            }
            // 逐字符输入，模拟人工节奏
            for ch in text.chars() {
                tab.type_str(&ch.to_string())
                    .map_err(|e| format!("Type failed: {e}"))?;
                std::thread::sleep(char_delay);
            }
            Ok(())
        })
        .await
    }

    async fn press_enter(&self, selector: &str) -> Result<(), String> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            let element = tab
                .wait_for_element(&selector)
                .map_err(|e| format!("Element not found: {selector}: {e}"))?;
            element.focus().map_err(|e| format!("Focus failed: {e}"))?;
            tab.press_key("Enter")
                .map_err(|e| format!("Press Enter failed: {e}"))?;
            Ok(())
        })
        .await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), String> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            tab.wait_for_element_with_custom_timeout(&selector, timeout)
                .map_err(|e| format!("Timeout waiting for {selector}: {e}"))?;
            Ok(())
        })
        .await
    }

    async fn wait_for_state(&self, state: LoadState, timeout: Duration) -> Result<(), String> {
        self.blocking(move |tab| {
            let wanted = match state {
                LoadState::DomContentLoaded => "interactive",
                _ => "complete",
            };
            let deadline = Instant::now() + timeout;
            loop {
                let ready = tab
                    .evaluate("document.readyState", false)
                    .ok()
                    .and_then(|r| r.value)
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_default();
                if ready == "complete" || ready == wanted {
                    if state == LoadState::NetworkIdle {
                        std::thread::sleep(NETWORK_IDLE_SETTLE);
                    }
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err(format!("Timeout waiting for load state {state:?}"));
                }
                std::thread::sleep(STATE_POLL_INTERVAL);
            }
        })
        .await
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<(), String> {
        let path = path.to_path_buf();
        self.blocking(move |tab| {
            let clip = if full_page {
                tab.evaluate(
                    "JSON.stringify({w: document.documentElement.scrollWidth, \
                     h: document.documentElement.scrollHeight})",
                    false,
                )
                .ok()
                .and_then(|r| r.value)
                .and_then(|v| v.as_str().map(String::from))
                .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
                .map(|dims| Page::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: dims["w"].as_f64().unwrap_or(1280.0),
                    height: dims["h"].as_f64().unwrap_or(720.0),
                    scale: 1.0,
                })
            } else {
                None
            };
            let png = tab
                .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, clip, true)
                .map_err(|e| format!("Screenshot failed: {e}"))?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Create artifact dir failed: {e}"))?;
            }
            std::fs::write(&path, png).map_err(|e| format!("Write screenshot failed: {e}"))?;
            Ok(())
        })
        .await
    }

    async fn scroll_by(
        &self,
        direction: ScrollDirection,
        amount: Option<i64>,
    ) -> Result<(), String> {
        self.blocking(move |tab| {
            let pixels = amount.unwrap_or(600);
            let js = match direction {
                ScrollDirection::Down => format!("window.scrollBy(0, {pixels})"),
                ScrollDirection::Up => format!("window.scrollBy(0, -{pixels})"),
                ScrollDirection::Top => "window.scrollTo(0, 0)".to_string(),
                ScrollDirection::Bottom => {
                    "window.scrollTo(0, document.body.scrollHeight)".to_string()
                }
            };
            tab.evaluate(&js, false)
                .map_err(|e| format!("Scroll failed: {e}"))?;
            Ok(())
        })
        .await
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementProbe>, String> {
        let escaped = serde_json::to_string(selector).unwrap_or_default();
        self.blocking(move |tab| {
            let js = format!(
                "(function() {{ const el = document.querySelector({escaped}); \
                 if (!el) return null; \
                 const r = el.getBoundingClientRect(); \
                 return JSON.stringify({{ \
                   text: (el.innerText || el.value || '').slice(0, 400), \
                   visible: !!(r.width || r.height) }}); }})()"
            );
            let result = tab
                .evaluate(&js, false)
                .map_err(|e| format!("Query failed: {e}"))?;
            let Some(value) = result.value else {
                return Ok(None);
            };
            let Some(raw) = value.as_str() else {
                return Ok(None);
            };
            let parsed: serde_json::Value =
                serde_json::from_str(raw).map_err(|e| format!("Query parse failed: {e}"))?;
            Ok(Some(ElementProbe {
                text: parsed["text"].as_str().unwrap_or_default().to_string(),
                visible: parsed["visible"].as_bool().unwrap_or(false),
            }))
        })
        .await
    }

    async fn go_back(&self) -> Result<(), String> {
        self.blocking(move |tab| {
            tab.evaluate("history.back()", false)
                .map_err(|e| format!("Go back failed: {e}"))?;
            // 没有可回退的历史时导航不会发生，等待失败不视为错误
            let _ = tab.wait_until_navigated();
            Ok(())
        })
        .await
    }

    async fn page_html(&self) -> Result<String, String> {
        self.blocking(move |tab| {
            tab.get_content()
                .map_err(|e| format!("Get content failed: {e}"))
        })
        .await
    }

    async fn interactive_elements(&self) -> Result<Vec<SelectorDescriptor>, String> {
        self.blocking(move |tab| {
            let result = tab
                .evaluate(ELEMENT_SNAPSHOT_JS, false)
                .map_err(|e| format!("Element snapshot failed: {e}"))?;
            let Some(value) = result.value else {
                return Ok(Vec::new());
            };
            let Some(raw) = value.as_str() else {
                return Ok(Vec::new());
            };
            serde_json::from_str(raw).map_err(|e| format!("Element snapshot parse failed: {e}"))
        })
        .await
    }

    async fn close(&self) {
        // 拆除失败一律吞掉
        if let Ok(mut guard) = self.browser.lock() {
            drop(guard.take());
        }
    }
}

/// 枚举可交互元素并生成稳定 CSS 选择器的页面脚本
const ELEMENT_SNAPSHOT_JS: &str = r#"
(function() {
  const out = [];
  const seen = new Set();
  function cssPath(el) {
    if (el.id) return '#' + CSS.escape(el.id);
    const testId = el.getAttribute('data-testid');
    if (testId) return '[data-testid="' + testId + '"]';
    const parts = [];
    let node = el;
    while (node && node.nodeType === 1 && parts.length < 4) {
      let part = node.tagName.toLowerCase();
      const parent = node.parentElement;
      if (parent) {
        const siblings = Array.from(parent.children).filter(c => c.tagName === node.tagName);
        if (siblings.length > 1) part += ':nth-of-type(' + (siblings.indexOf(node) + 1) + ')';
      }
      parts.unshift(part);
      if (node.id) { parts[0] = '#' + CSS.escape(node.id); break; }
      node = parent;
    }
    return parts.join(' > ');
  }
  function category(el) {
    const tag = el.tagName.toLowerCase();
    if (tag === 'button' || (tag === 'input' && ['button', 'submit'].includes(el.type))) return 'button';
    if (tag === 'a') return 'link';
    if (tag === 'input' || tag === 'textarea' || tag === 'select') return 'input';
    if (tag === 'form') return 'form';
    return 'other';
  }
  const nodes = document.querySelectorAll('button, a[href], input, textarea, select, form, [role="button"]');
  for (const el of nodes) {
    if (out.length >= 80) break;
    const selector = cssPath(el);
    if (seen.has(selector)) continue;
    seen.add(selector);
    const label = (el.innerText || el.value || el.getAttribute('aria-label')
      || el.getAttribute('placeholder') || '').trim().slice(0, 80);
    out.push({
      selector: selector,
      category: category(el),
      label: label || null,
      role: el.getAttribute('role'),
      testId: el.getAttribute('data-testid')
    });
  }
  return JSON.stringify(out);
})()
"#;
