//! 运行记录器：逐步与全程的持久化记录，外加 Markdown 报告
//!
//! 纯观察者，绝不影响控制流；所有持久化失败只记日志，不上抛。
//! 目录布局：<root>/<run-id>/run.json、step_NNN.json、report.md。

use std::path::PathBuf;

use crate::core::{AgentRun, AgentStep, RunStatus};

pub struct RunRecorder {
    root: PathBuf,
}

impl RunRecorder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 初始化并持久化一份空的运行记录
    pub fn start_run(&self, run: &AgentRun) {
        if let Err(e) = self.persist_run(run) {
            tracing::warn!(run = %run.id, error = %e, "failed to persist run start");
        }
    }

    /// 追加一步：更新运行快照、写单步记录、输出一行进度
    pub fn log_step(&self, run: &AgentRun, step: &AgentStep) {
        tracing::info!(
            run = %run.id,
            step = step.index,
            action = step.call.name(),
            ok = step.result.success,
            duration_ms = step.duration_ms,
            "step recorded"
        );
        if let Err(e) = self.persist_run(run) {
            tracing::warn!(run = %run.id, error = %e, "failed to persist run snapshot");
        }
        if let Err(e) = self.persist_step(run, step) {
            tracing::warn!(run = %run.id, step = step.index, error = %e, "failed to persist step");
        }
    }

    /// 终态落盘并渲染完整报告
    pub fn complete_run(&self, run: &AgentRun) {
        tracing::info!(
            run = %run.id,
            status = ?run.status,
            steps = run.steps.len(),
            "run finished"
        );
        if let Err(e) = self.persist_run(run) {
            tracing::warn!(run = %run.id, error = %e, "failed to persist final run");
        }
        if let Err(e) = self.persist_report(run) {
            tracing::warn!(run = %run.id, error = %e, "failed to persist report");
        }
    }

    fn run_dir(&self, run: &AgentRun) -> PathBuf {
        self.root.join(&run.id)
    }

    fn persist_run(&self, run: &AgentRun) -> anyhow::Result<()> {
        let dir = self.run_dir(run);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("run.json"), serde_json::to_string_pretty(run)?)?;
        Ok(())
    }

    fn persist_step(&self, run: &AgentRun, step: &AgentStep) -> anyhow::Result<()> {
        let dir = self.run_dir(run);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(
            dir.join(format!("step_{:03}.json", step.index)),
            serde_json::to_string_pretty(step)?,
        )?;
        Ok(())
    }

    fn persist_report(&self, run: &AgentRun) -> anyhow::Result<()> {
        let dir = self.run_dir(run);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("report.md"), render_report(run))?;
        Ok(())
    }
}

/// 渲染人读报告：目标、逐步明细、最终结果
fn render_report(run: &AgentRun) -> String {
    let mut out = format!("# Run {}\n\n", run.id);
    out.push_str(&format!("**Goal:** {}\n\n", run.goal.prompt));
    out.push_str(&format!("**Status:** {}\n\n", status_label(run.status)));
    out.push_str(&format!("**Steps:** {}\n\n", run.steps.len()));
    if let Some(result) = &run.final_result {
        out.push_str(&format!("**Result:** {result}\n\n"));
    }
    if let Some(error) = &run.error {
        out.push_str(&format!("**Error:** {error}\n\n"));
    }

    out.push_str("## Steps\n\n");
    for step in &run.steps {
        let mark = if step.result.success { "ok" } else { "failed" };
        out.push_str(&format!(
            "### Step {} — {} ({mark}, {}ms)\n\n",
            step.index + 1,
            step.call.name(),
            step.duration_ms
        ));
        if let Some(reasoning) = &step.reasoning {
            out.push_str(&format!("> {reasoning}\n\n"));
        }
        out.push_str(&format!(
            "- Page: {}\n- Action: `{}`\n",
            step.world.url,
            serde_json::to_string(&step.call).unwrap_or_default()
        ));
        if let Some(payload) = &step.result.result {
            out.push_str(&format!("- Result: `{payload}`\n"));
        }
        if let Some(error) = &step.result.error {
            out.push_str(&format!("- Error: {error}\n"));
        }
        if let Some(artifact) = &step.result.artifact {
            out.push_str(&format!("- Artifact: {artifact}\n"));
        }
        out.push('\n');
    }

    out
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Timeout => "timeout",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Goal, WorldState};
    use crate::tools::{ExtractArgs, ExtractMode, ToolCall, ToolResult};
    use chrono::Utc;

    fn sample_run() -> AgentRun {
        let mut run = AgentRun::new(Goal::new("find the title"));
        let world = WorldState {
            url: "https://example.com/".into(),
            title: Some("Example Domain".into()),
            summary: "Example Domain".into(),
            elements: Vec::new(),
            step: 0,
            observed_at: Utc::now(),
            last_error: None,
        };
        run.record_step(AgentStep {
            index: 0,
            started_at: Utc::now(),
            world,
            reasoning: Some("extract the page text".into()),
            call: ToolCall::Extract(ExtractArgs {
                mode: ExtractMode::Raw,
            }),
            result: ToolResult::ok(serde_json::json!({"text": "Example Domain"})),
            duration_ms: 12,
        });
        run
    }

    #[test]
    fn persists_run_step_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = RunRecorder::new(dir.path());
        let mut run = sample_run();

        recorder.start_run(&run);
        recorder.log_step(&run, &run.steps[0].clone());
        run.finalize(RunStatus::Completed, Some("Example Domain".into()), None);
        recorder.complete_run(&run);

        let run_dir = dir.path().join(&run.id);
        assert!(run_dir.join("run.json").exists());
        assert!(run_dir.join("step_000.json").exists());
        let report = std::fs::read_to_string(run_dir.join("report.md")).unwrap();
        assert!(report.contains("find the title"));
        assert!(report.contains("extract"));
        assert!(report.contains("**Status:** completed"));
    }

    #[test]
    fn persistence_failure_never_escalates() {
        // 以一个普通文件当根目录，所有写入都会失败，但调用不得 panic
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let recorder = RunRecorder::new(&blocker);
        let run = sample_run();
        recorder.start_run(&run);
        recorder.log_step(&run, &run.steps[0].clone());
        recorder.complete_run(&run);
    }
}
