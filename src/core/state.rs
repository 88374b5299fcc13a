//! 运行状态模型：目标、世界快照、步骤与运行记录
//!
//! WorldState 由外部观测器每轮产出一次，创建后不再修改；
//! AgentRun 仅由编排器追加步骤并在终态时一次性定稿。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tools::{ToolCall, ToolResult};

/// 默认最大步数
pub const DEFAULT_MAX_STEPS: usize = 30;

/// 用户目标：一次运行内不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_criteria: Vec<String>,
    /// 目标级域名白名单，并入本次运行的安全策略
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<Vec<String>>,
    pub max_steps: usize,
}

impl Goal {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            constraints: Vec::new(),
            success_criteria: Vec::new(),
            allowed_domains: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_success_criteria(mut self, criteria: Vec<String>) -> Self {
        self.success_criteria = criteria;
        self
    }

    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }
}

/// 可交互元素类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementCategory {
    Button,
    Link,
    Input,
    Form,
    Other,
}

/// 观测器给出的元素描述：选择器 + 类别 + 可选标注
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorDescriptor {
    pub selector: String,
    pub category: ElementCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
}

/// 一次页面观测快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// 有界的页面文本摘要
    pub summary: String,
    pub elements: Vec<SelectorDescriptor>,
    /// 产生该快照的步骤序号
    pub step: usize,
    pub observed_at: DateTime<Utc>,
    /// 上一步动作的失败信息（若有），供 LLM 调整策略
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// 运行状态机：Running 是唯一非终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Timeout,
}

/// 一轮循环的完整记录，追加后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub index: usize,
    pub started_at: DateTime<Utc>,
    /// 规划该步骤时依据的世界快照
    pub world: WorldState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub call: ToolCall,
    pub result: ToolResult,
    pub duration_ms: u64,
}

/// 一次完整的目标执行记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub id: String,
    pub goal: Goal,
    pub status: RunStatus,
    pub steps: Vec<AgentStep>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentRun {
    pub fn new(goal: Goal) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            goal,
            status: RunStatus::Running,
            steps: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            final_result: None,
            error: None,
        }
    }

    pub fn record_step(&mut self, step: AgentStep) {
        self.steps.push(step);
    }

    /// 定稿：只有第一次调用生效，之后的调用被忽略
    pub fn finalize(
        &mut self,
        status: RunStatus,
        final_result: Option<String>,
        error: Option<String>,
    ) {
        if self.ended_at.is_some() {
            return;
        }
        self.status = status;
        self.final_result = final_result;
        self.error = error;
        self.ended_at = Some(Utc::now());
    }

    /// 折算为对调用方的运行结果
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome {
            success: self.status == RunStatus::Completed,
            result: self.final_result.clone(),
            error: self.error.clone(),
            steps: self.steps.len(),
        }
    }
}

/// 编排器返回给调用方的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_defaults_to_thirty_steps() {
        assert_eq!(Goal::new("find the title").max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut run = AgentRun::new(Goal::new("g"));
        run.finalize(RunStatus::Completed, Some("done".into()), None);
        let ended = run.ended_at;
        run.finalize(RunStatus::Failed, None, Some("late".into()));
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.final_result.as_deref(), Some("done"));
        assert_eq!(run.ended_at, ended);
    }

    #[test]
    fn outcome_mirrors_terminal_state() {
        let mut run = AgentRun::new(Goal::new("g"));
        run.finalize(RunStatus::Failed, None, Some("blocked".into()));
        let outcome = run.outcome();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("blocked"));
        assert_eq!(outcome.steps, 0);
    }
}
