//! 主控循环：观测 -> 规划 -> 守卫 -> 执行 -> 记录，直到终态
//!
//! 一个 AgentSession 独占一个浏览器会话并只跑一个目标；守卫状态随会话
//! 构造、随运行结束丢弃。步骤严格串行：上一步落盘前不会开始下一步。
//! 取消只有两种途径：步数预算耗尽与关键错误分类，没有外部取消信号。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::agent::{Planner, RunRecorder};
use crate::browser::{BrowserSurface, PageObserver};
use crate::core::{AgentError, AgentRun, AgentStep, Goal, RunOutcome, RunStatus};
use crate::policy::PolicyGuard;
use crate::tools::{ActionExecutor, ToolCall, ToolResult};

/// 注入规划上下文的 (动作, 结果) 对数量
pub const HISTORY_WINDOW: usize = 5;

/// 即使作为普通动作失败出现，也要终止整次运行的错误片段
const CRITICAL_PATTERNS: &[&str] = &[
    "net::ERR",
    "Navigation timeout",
    "browser has been closed",
    "Target closed",
    "Session closed",
    "context has been closed",
];

/// 判定一个动作失败是否属于关键错误
pub fn is_critical_error(message: &str) -> bool {
    CRITICAL_PATTERNS.iter().any(|p| message.contains(p))
}

/// 一次运行的全部组件；run 消费 self，会话与运行一一对应
pub struct AgentSession {
    planner: Planner,
    executor: ActionExecutor,
    guard: PolicyGuard,
    recorder: RunRecorder,
    observer: Arc<dyn PageObserver>,
    surface: Arc<dyn BrowserSurface>,
    step_delay: Duration,
}

impl AgentSession {
    pub fn new(
        planner: Planner,
        executor: ActionExecutor,
        guard: PolicyGuard,
        recorder: RunRecorder,
        observer: Arc<dyn PageObserver>,
        surface: Arc<dyn BrowserSurface>,
        step_delay: Duration,
    ) -> Self {
        Self {
            planner,
            executor,
            guard,
            recorder,
            observer,
            surface,
            step_delay,
        }
    }

    /// 跑完一个目标；无论结局如何都拆除浏览器会话（拆除失败被吞掉）
    pub async fn run(mut self, goal: Goal) -> RunOutcome {
        let outcome = self.drive(goal).await;
        self.surface.close().await;
        outcome
    }

    async fn drive(&mut self, goal: Goal) -> RunOutcome {
        let mut run = AgentRun::new(goal);
        tracing::info!(run = %run.id, goal = %run.goal.prompt, max_steps = run.goal.max_steps, "run started");
        self.recorder.start_run(&run);

        let mut last_error: Option<String> = None;

        for index in 0..run.goal.max_steps {
            // 1. 观测：没有快照就无法规划，观测失败视为关键错误
            let world = match self.observer.observe(index, last_error.as_deref()).await {
                Ok(world) => world,
                Err(e) => {
                    let err = AgentError::ObservationFailed(e);
                    tracing::error!(run = %run.id, error = %err, "observation failed");
                    return self.finish(run, RunStatus::Failed, None, Some(err.to_string()));
                }
            };

            // 2. 规划：零动作/坏动作都是硬失败，不重试
            let window_start = run.steps.len().saturating_sub(HISTORY_WINDOW);
            let history: Vec<(ToolCall, ToolResult)> = run.steps[window_start..]
                .iter()
                .map(|s| (s.call.clone(), s.result.clone()))
                .collect();
            let planned = match self.planner.plan(&run.goal, &world, &history).await {
                Ok(planned) => planned,
                Err(e) => {
                    tracing::error!(run = %run.id, error = %e, "planning failed");
                    return self.finish(run, RunStatus::Failed, None, Some(e.to_string()));
                }
            };

            // 3. 守卫：拒绝即终止，被拒的一步不计入已执行步数
            let decision = self.guard.evaluate(&world.url, &planned.call);
            if !decision.allowed {
                let reason = decision
                    .reason
                    .unwrap_or_else(|| "denied by policy".to_string());
                tracing::error!(
                    run = %run.id,
                    error = %AgentError::PolicyViolation(reason.clone()),
                    "action denied"
                );
                return self.finish(run, RunStatus::Failed, None, Some(reason));
            }
            // 确认标记只是建议性信号：记警告后继续执行
            if decision.requires_confirmation {
                tracing::warn!(
                    run = %run.id,
                    action = planned.call.name(),
                    url = %world.url,
                    "action flagged for human confirmation; continuing (advisory only)"
                );
            }

            // 4. 执行并记录
            let started_at = Utc::now();
            let timer = Instant::now();
            let result = self.executor.execute(&planned.call).await;
            let step = AgentStep {
                index,
                started_at,
                world,
                reasoning: planned.reasoning.clone(),
                call: planned.call.clone(),
                result: result.clone(),
                duration_ms: timer.elapsed().as_millis() as u64,
            };
            run.record_step(step);
            if let Some(step) = run.steps.last() {
                self.recorder.log_step(&run, step);
            }

            // 5. 终局判定
            if let ToolCall::Complete(args) = &planned.call {
                let status = if args.success {
                    RunStatus::Completed
                } else {
                    RunStatus::Failed
                };
                let final_result = args.result.clone().or_else(|| args.reason.clone());
                let error = if args.success {
                    None
                } else {
                    args.reason.clone()
                };
                return self.finish(run, status, final_result, error);
            }

            if !result.success {
                if let Some(error) = &result.error {
                    if is_critical_error(error) {
                        tracing::error!(
                            run = %run.id,
                            error = %AgentError::CriticalBrowser(error.clone()),
                            "critical failure"
                        );
                        return self.finish(run, RunStatus::Failed, None, Some(error.clone()));
                    }
                    last_error = Some(error.clone());
                }
            } else {
                last_error = None;
            }

            // 6. 礼貌停顿后进入下一轮
            tokio::time::sleep(self.step_delay).await;
        }

        self.finish(
            run,
            RunStatus::Timeout,
            None,
            Some("step budget exhausted before the goal completed".to_string()),
        )
    }

    fn finish(
        &self,
        mut run: AgentRun,
        status: RunStatus,
        final_result: Option<String>,
        error: Option<String>,
    ) -> RunOutcome {
        run.finalize(status, final_result, error);
        self.recorder.complete_run(&run);
        let (prompt_tokens, completion_tokens, total) = self.planner.token_usage();
        if total > 0 {
            tracing::info!(
                run = %run.id,
                prompt_tokens,
                completion_tokens,
                total_tokens = total,
                "token usage"
            );
        }
        run.outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_critical_errors() {
        assert!(is_critical_error("net::ERR_CONNECTION_RESET"));
        assert!(is_critical_error("Navigation timeout: 30000ms exceeded"));
        assert!(is_critical_error("the browser has been closed"));
        assert!(!is_critical_error("Element not found: #login"));
        assert!(!is_critical_error("Timeout waiting for .results"));
    }
}
