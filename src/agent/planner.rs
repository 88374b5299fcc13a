//! 规划器（推理客户端）：组装有界上下文并解析出恰好一个动作
//!
//! 上下文 = 固定 system 指令（词汇表速览 + JSON Schema）+ 目标消息 +
//! 最近五对 (动作, 结果) 交替轮次 + 有界的世界快照渲染。
//! 模型必须返回词汇表内的一个动作；零动作是硬失败，不重试、不兜底。

use std::sync::Arc;

use crate::core::{AgentError, ElementCategory, Goal, WorldState};
use crate::llm::{LlmClient, Message};
use crate::tools::{tool_call_schema_json, vocabulary_summary, ToolCall, ToolResult};

/// 世界快照摘要在 prompt 中的字符上限
const SUMMARY_PREVIEW_CHARS: usize = 1600;
/// 链接分组最多列出的条数
const LINK_LIMIT: usize = 10;
/// 结果负载在历史轮次中的字符上限
const RESULT_PREVIEW_CHARS: usize = 400;

/// 一次规划的产物：选定动作与可选推理文本
#[derive(Debug, Clone)]
pub struct PlannedAction {
    pub call: ToolCall,
    pub reasoning: Option<String>,
}

/// 规划器：持有 LLM 与固定 system 指令
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: build_system_prompt(),
        }
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 规划下一个动作；history 为最近的 (动作, 结果) 对
    pub async fn plan(
        &self,
        goal: &Goal,
        world: &WorldState,
        history: &[(ToolCall, ToolResult)],
    ) -> Result<PlannedAction, AgentError> {
        let mut messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(render_goal(goal)),
        ];
        for (call, result) in history {
            messages.push(Message::assistant(
                serde_json::to_string(call).unwrap_or_default(),
            ));
            messages.push(Message::user(render_result(call, result)));
        }
        messages.push(Message::user(render_world(world)));

        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)?;
        parse_action(&output)
    }
}

/// 解析 LLM 输出：提取 JSON 块并反序列化为 ToolCall，块前文本作为推理
pub fn parse_action(output: &str) -> Result<PlannedAction, AgentError> {
    let trimmed = output.trim();

    let (reasoning_raw, json_str) = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let body = rest
            .find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim());
        (&trimmed[..start], body)
    } else if let Some(start) = trimmed.find('{') {
        let end = trimmed.rfind('}').ok_or(AgentError::NoActionReturned)?;
        (&trimmed[..start], trimmed[start..=end].trim())
    } else {
        return Err(AgentError::NoActionReturned);
    };

    let call: ToolCall = serde_json::from_str(json_str)
        .map_err(|e| AgentError::MalformedAction(format!("{e}: {json_str}")))?;

    let reasoning = reasoning_raw.trim();
    Ok(PlannedAction {
        call,
        reasoning: if reasoning.is_empty() {
            None
        } else {
            Some(reasoning.to_string())
        },
    })
}

fn build_system_prompt() -> String {
    format!(
        r#"You drive a web browser toward the user's goal, one action per turn.

Rules:
- Reply with exactly ONE action as a JSON object: {{"tool": "<name>", "args": {{...}}}}.
- You may put a short line of reasoning before the JSON, nothing after it.
- Inspect the page snapshot before acting; prefer the listed selectors.
- If an action failed, read the error and try a different approach.
- When the goal is reached (or provably unreachable), emit the complete action.

Actions:
{}

Action JSON Schema:
{}"#,
        vocabulary_summary(),
        tool_call_schema_json()
    )
}

fn render_goal(goal: &Goal) -> String {
    let mut out = format!("Goal: {}\n", goal.prompt);
    if !goal.constraints.is_empty() {
        out.push_str(&format!("Constraints: {}\n", goal.constraints.join("; ")));
    }
    if !goal.success_criteria.is_empty() {
        out.push_str(&format!(
            "Success criteria: {}\n",
            goal.success_criteria.join("; ")
        ));
    }
    out.push_str(&format!("Step budget: {}", goal.max_steps));
    out
}

fn render_result(call: &ToolCall, result: &ToolResult) -> String {
    let mut out = format!("Result of {}: ", call.name());
    if result.success {
        out.push_str("ok");
        if let Some(payload) = &result.result {
            let rendered = payload.to_string();
            out.push_str(" ");
            out.push_str(&preview(&rendered, RESULT_PREVIEW_CHARS));
        }
    } else {
        out.push_str("FAILED");
        if let Some(error) = &result.error {
            out.push_str(": ");
            out.push_str(error);
        }
    }
    out
}

/// 世界快照渲染：截断摘要 + 按类别分组的选择器列表
fn render_world(world: &WorldState) -> String {
    let mut out = format!("Current page: {}", world.url);
    if let Some(title) = &world.title {
        out.push_str(&format!(" ({title})"));
    }
    out.push('\n');
    if let Some(error) = &world.last_error {
        out.push_str(&format!("Previous action failed: {error}\n"));
    }
    out.push_str("Page summary:\n");
    out.push_str(&preview(&world.summary, SUMMARY_PREVIEW_CHARS));
    out.push('\n');

    render_group(&mut out, world, ElementCategory::Button, "Buttons", usize::MAX);
    render_group(&mut out, world, ElementCategory::Link, "Links", LINK_LIMIT);
    render_group(&mut out, world, ElementCategory::Input, "Inputs", usize::MAX);
    render_group(&mut out, world, ElementCategory::Form, "Forms", usize::MAX);

    out.push_str("Choose the next action.");
    out
}

fn render_group(
    out: &mut String,
    world: &WorldState,
    category: ElementCategory,
    heading: &str,
    limit: usize,
) {
    let mut listed = 0;
    for descriptor in world.elements.iter().filter(|d| d.category == category) {
        if listed == 0 {
            out.push_str(&format!("{heading}:\n"));
        }
        if listed >= limit {
            break;
        }
        match &descriptor.label {
            Some(label) if !label.is_empty() => {
                out.push_str(&format!("- {} \"{}\"\n", descriptor.selector, label));
            }
            _ => out.push_str(&format!("- {}\n", descriptor.selector)),
        }
        listed += 1;
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
