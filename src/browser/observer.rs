//! 世界观测器：把活动页面收敛为一份 WorldState 快照
//!
//! 观测启发式属于外部协作方，核心只消费其输出形状；这里提供基于
//! BrowserSurface 的缺省实现：URL/标题 + html2text 摘要 + 可交互元素。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::browser::BrowserSurface;
use crate::core::WorldState;

/// 观测器接口：每轮循环产出一次快照
#[async_trait]
pub trait PageObserver: Send + Sync {
    async fn observe(&self, step: usize, last_error: Option<&str>) -> Result<WorldState, String>;
}

/// 缺省观测器：页面 HTML 转纯文本并截断为有界摘要
pub struct SnapshotObserver {
    surface: Arc<dyn BrowserSurface>,
    max_summary_chars: usize,
}

impl SnapshotObserver {
    pub fn new(surface: Arc<dyn BrowserSurface>, max_summary_chars: usize) -> Self {
        Self {
            surface,
            max_summary_chars,
        }
    }
}

#[async_trait]
impl PageObserver for SnapshotObserver {
    async fn observe(&self, step: usize, last_error: Option<&str>) -> Result<WorldState, String> {
        let url = self.surface.current_url().await?;
        let title = self.surface.title().await.unwrap_or(None);
        let html = self.surface.page_html().await.unwrap_or_default();
        let text = html2text::from_read(html.as_bytes(), 100).unwrap_or_default();
        let summary = truncate_chars(&text, self.max_summary_chars);
        let elements = self.surface.interactive_elements().await.unwrap_or_default();

        Ok(WorldState {
            url,
            title,
            summary,
            elements,
            step,
            observed_at: Utc::now(),
            last_error: last_error.map(String::from),
        })
    }
}

/// 按字符数截断，超出时附省略标记
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}\n...[truncated]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text_intact() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn truncate_marks_cut_text() {
        let long = "x".repeat(50);
        let cut = truncate_chars(&long, 10);
        assert!(cut.starts_with("xxxxxxxxxx"));
        assert!(cut.ends_with("[truncated]"));
    }
}
