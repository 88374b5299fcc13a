//! Agent 错误类型
//!
//! 只有终止性的错误才建模为 AgentError：策略拒绝、推理失败、关键浏览器错误。
//! 普通动作失败是一等值（失败的 ToolResult），折入下一轮规划上下文，不在此列。

use thiserror::Error;

/// 终止一次运行的错误（全部原样写入运行记录的 error 字段，不重试）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 策略守卫拒绝动作（域名封禁、频率限制、步数预算耗尽）
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// LLM 未返回任何动作
    #[error("No action returned by the model")]
    NoActionReturned,

    /// LLM 返回了词汇表外或格式错误的动作
    #[error("Malformed action: {0}")]
    MalformedAction(String),

    /// LLM 调用本身失败（网络、鉴权等）
    #[error("LLM error: {0}")]
    LlmError(String),

    /// 关键浏览器错误（连接重置、导航超时、会话已关闭）
    #[error("Critical browser error: {0}")]
    CriticalBrowser(String),

    /// 世界观测失败，无法为下一步提供快照
    #[error("Observation failed: {0}")]
    ObservationFailed(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}
