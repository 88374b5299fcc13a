//! 动作词汇表：封闭的 ToolCall 变体集合与统一的 ToolResult
//!
//! LLM 输出 `{"tool": "...", "args": {...}}`，经 serde 解析为带标签的和类型；
//! 新增动作必须加变体，所有消费方的 match 会在编译期报缺。
//! 参数结构体均 deny_unknown_fields，跨变体字段混入视为解析错误。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 页面加载等待条件（navigate 的 waitUntil 与 waitFor 的 state 共用同一取值域）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

impl Default for LoadState {
    fn default() -> Self {
        LoadState::DomContentLoaded
    }
}

/// 内容提取模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    Article,
    Table,
    Raw,
    Links,
}

/// 滚动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Down,
    Up,
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NavigateArgs {
    pub url: String,
    /// 加载等待条件，缺省为 DOM 就绪（不等整页网络空闲）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<LoadState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClickArgs {
    pub selector: String,
    /// 等待元素可见的超时（毫秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TypeArgs {
    pub selector: String,
    pub text: String,
    /// 输入后按回车提交
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit: Option<bool>,
    /// 输入前清空原内容
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtractArgs {
    pub mode: ExtractMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WaitForArgs {
    /// 与 state 二选一：等待选择器出现
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// 与 selector 二选一：等待命名加载状态
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<LoadState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScreenshotArgs {
    /// 截图用途说明，会进入文件名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_page: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScrollArgs {
    pub direction: ScrollDirection,
    /// 像素数，缺省由执行器决定
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryArgs {
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GoBackArgs {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompleteArgs {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// 一次离散动作请求：LLM 只能从这十个变体中选一个
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "tool", content = "args", rename_all = "camelCase")]
pub enum ToolCall {
    Navigate(NavigateArgs),
    Click(ClickArgs),
    Type(TypeArgs),
    Extract(ExtractArgs),
    WaitFor(WaitForArgs),
    Screenshot(ScreenshotArgs),
    Scroll(ScrollArgs),
    Query(QueryArgs),
    GoBack(GoBackArgs),
    Complete(CompleteArgs),
}

impl ToolCall {
    /// 线上协议中的动作名（与 serde 标签一致）
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Navigate(_) => "navigate",
            ToolCall::Click(_) => "click",
            ToolCall::Type(_) => "type",
            ToolCall::Extract(_) => "extract",
            ToolCall::WaitFor(_) => "waitFor",
            ToolCall::Screenshot(_) => "screenshot",
            ToolCall::Scroll(_) => "scroll",
            ToolCall::Query(_) => "query",
            ToolCall::GoBack(_) => "goBack",
            ToolCall::Complete(_) => "complete",
        }
    }

    /// complete 是唯一的终止动作，策略检查对其全部放行
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolCall::Complete(_))
    }
}

/// 单次动作的归一化结果：成功与否、负载、错误、工件路径、回显选择器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl ToolResult {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            artifact: None,
            selector: None,
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            success: true,
            result: None,
            error: None,
            artifact: None,
            selector: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            artifact: None,
            selector: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_artifact(mut self, path: impl Into<String>) -> Self {
        self.artifact = Some(path.into());
        self
    }
}
