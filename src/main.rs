//! Wasp - Rust 网页自动化智能体
//!
//! 入口：初始化日志与配置，从命令行取目标文本，跑一次完整的目标循环，
//! 输出运行结果；失败时以非零码退出。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use wasp::agent::{AgentSession, Planner, RunRecorder};
use wasp::browser::{HeadlessSurface, HtmlExtractor, SnapshotObserver};
use wasp::config::{load_config, AppConfig};
use wasp::core::Goal;
use wasp::llm::create_llm_from_config;
use wasp::policy::PolicyGuard;
use wasp::tools::{ActionExecutor, ExecutorOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wasp::observability::init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: wasp <goal text>");
        std::process::exit(2);
    }

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let goal = Goal::new(prompt).with_max_steps(cfg.agent.max_steps);

    let llm = create_llm_from_config(&cfg);
    let planner = Planner::new(llm);

    let surface = Arc::new(
        HeadlessSurface::launch()
            .await
            .map_err(anyhow::Error::msg)
            .context("Failed to launch the browser session")?,
    );

    let observer = Arc::new(SnapshotObserver::new(
        surface.clone(),
        cfg.agent.summary_max_chars,
    ));
    let extractor = Arc::new(HtmlExtractor::new(cfg.agent.summary_max_chars * 4));
    let executor = ActionExecutor::new(
        surface.clone(),
        extractor,
        ExecutorOptions {
            navigation_timeout: Duration::from_secs(cfg.browser.navigation_timeout_secs),
            action_timeout: Duration::from_secs(cfg.browser.action_timeout_secs),
            char_delay: Duration::from_millis(cfg.browser.type_delay_ms),
            settle_delay: Duration::from_millis(cfg.browser.settle_delay_ms),
            artifacts_dir: cfg.browser.artifacts_dir.clone(),
        },
    );

    let policy = cfg
        .safety
        .to_policy()
        .with_goal_allowlist(goal.allowed_domains.as_deref());
    let guard = PolicyGuard::new(policy);
    let recorder = RunRecorder::new(cfg.recorder.dir.clone());

    let session = AgentSession::new(
        planner,
        executor,
        guard,
        recorder,
        observer,
        surface,
        Duration::from_millis(cfg.agent.step_delay_ms),
    );

    let outcome = session.run(goal).await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}
