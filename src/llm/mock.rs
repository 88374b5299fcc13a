//! Mock LLM 客户端（无需 API Key）
//!
//! 按脚本顺序回放预置输出，耗尽后回复一个失败的 complete 动作；
//! 用于集成测试与无 Key 环境下验证整条循环。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message};

/// 脚本式 Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<String>>,
}

impl MockLlmClient {
    /// 预置一段按序回放的输出脚本
    pub fn with_script(replies: Vec<String>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        let next = self
            .script
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front();
        Ok(next.unwrap_or_else(|| {
            r#"{"tool": "complete", "args": {"success": false, "reason": "Mock script exhausted"}}"#
                .to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_in_order_then_falls_back() {
        let mock = MockLlmClient::with_script(vec!["one".into(), "two".into()]);
        assert_eq!(mock.complete(&[]).await.unwrap(), "one");
        assert_eq!(mock.complete(&[]).await.unwrap(), "two");
        assert!(mock.complete(&[]).await.unwrap().contains("complete"));
    }
}
