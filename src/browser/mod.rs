//! 浏览器层：自动化表面抽象、Headless Chrome 实现、页面观测与内容提取
//!
//! 执行器只面向 BrowserSurface trait；渲染与网络由浏览器自身负责，
//! 本层只是对会话原语（导航、点击、输入、等待、截图…）的薄封装。

pub mod chrome;
pub mod extract;
pub mod observer;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::tools::{LoadState, ScrollDirection};

pub use chrome::HeadlessSurface;
pub use extract::{ContentExtractor, HtmlExtractor};
pub use observer::{PageObserver, SnapshotObserver};

/// query 动作的探测结果
#[derive(Debug, Clone, PartialEq)]
pub struct ElementProbe {
    pub text: String,
    pub visible: bool,
}

/// 自动化表面：一次运行独占一个会话，所有操作带超时、以字符串错误失败
#[async_trait]
pub trait BrowserSurface: Send + Sync {
    async fn navigate(&self, url: &str, wait: LoadState, timeout: Duration)
        -> Result<(), String>;

    async fn current_url(&self) -> Result<String, String>;

    async fn title(&self) -> Result<Option<String>, String>;

    /// 等待元素可见后点击
    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), String>;

    /// 等待元素可见后逐字符输入；clear 为 true 时先清空
    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        clear: bool,
        char_delay: Duration,
        timeout: Duration,
    ) -> Result<(), String>;

    /// 在目标元素上按回车（提交）
    async fn press_enter(&self, selector: &str) -> Result<(), String>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), String>;

    async fn wait_for_state(&self, state: LoadState, timeout: Duration) -> Result<(), String>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<(), String>;

    async fn scroll_by(
        &self,
        direction: ScrollDirection,
        amount: Option<i64>,
    ) -> Result<(), String>;

    /// 读取元素文本与可见性，不产生交互；元素不存在返回 Ok(None)
    async fn query(&self, selector: &str) -> Result<Option<ElementProbe>, String>;

    async fn go_back(&self) -> Result<(), String>;

    /// 当前页面 HTML，供摘要与内容提取
    async fn page_html(&self) -> Result<String, String>;

    /// 枚举页面可交互元素，供世界观测器构造快照
    async fn interactive_elements(
        &self,
    ) -> Result<Vec<crate::core::SelectorDescriptor>, String>;

    /// 拆除会话；失败被吞掉，绝不向上传播
    async fn close(&self);
}
