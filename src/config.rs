//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WASP__*` 覆盖
//! （双下划线表示嵌套，如 `WASP__LLM__MODEL=gpt-4o-mini`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub browser: BrowserSection,
    pub agent: AgentSection,
    pub safety: SafetySection,
    pub recorder: RecorderSection,
}

/// [llm] 段：OpenAI 兼容端点选择
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai（兼容端点）/ mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            temperature: default_temperature(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

/// [browser] 段：超时与节奏
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSection {
    /// 导航超时（秒）
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
    /// 单个元素操作超时（秒）
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,
    /// type 动作逐字符间隔（毫秒）
    #[serde(default = "default_type_delay_ms")]
    pub type_delay_ms: u64,
    /// 点击/提交/滚动后的静置（毫秒）
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// 截图等工件的输出目录
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: default_navigation_timeout_secs(),
            action_timeout_secs: default_action_timeout_secs(),
            type_delay_ms: default_type_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_action_timeout_secs() -> u64 {
    10
}

fn default_type_delay_ms() -> u64 {
    50
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

/// [agent] 段：步数预算与上下文边界
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// 相邻步骤之间的礼貌停顿（毫秒）
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// 世界快照摘要的字符上限
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            step_delay_ms: default_step_delay_ms(),
            summary_max_chars: default_summary_max_chars(),
        }
    }
}

fn default_max_steps() -> usize {
    30
}

fn default_step_delay_ms() -> u64 {
    1000
}

fn default_summary_max_chars() -> usize {
    2000
}

/// [safety] 段：域名规则、频率与预算（映射到 SafetyPolicy）
#[derive(Debug, Clone, Deserialize)]
pub struct SafetySection {
    /// 非空时启用白名单
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    #[serde(default = "default_confirmation_triggers")]
    pub confirmation_triggers: Vec<String>,
    pub max_steps_per_domain: Option<u32>,
    pub cooldown_ms: Option<u64>,
    #[serde(default = "default_respect_robots")]
    pub respect_robots: bool,
}

impl Default for SafetySection {
    fn default() -> Self {
        Self {
            allowed_domains: Vec::new(),
            blocked_domains: Vec::new(),
            confirmation_triggers: default_confirmation_triggers(),
            max_steps_per_domain: None,
            cooldown_ms: None,
            respect_robots: default_respect_robots(),
        }
    }
}

fn default_confirmation_triggers() -> Vec<String> {
    vec!["checkout".into(), "payment".into(), "confirm".into()]
}

fn default_respect_robots() -> bool {
    true
}

impl SafetySection {
    /// 折算为运行期策略：空白名单视为未配置
    pub fn to_policy(&self) -> crate::policy::SafetyPolicy {
        crate::policy::SafetyPolicy {
            allowed_domains: if self.allowed_domains.is_empty() {
                None
            } else {
                Some(self.allowed_domains.clone())
            },
            blocked_domains: self.blocked_domains.clone(),
            confirmation_triggers: self.confirmation_triggers.clone(),
            max_steps_per_domain: self.max_steps_per_domain,
            cooldown_ms: self.cooldown_ms,
            respect_robots: self.respect_robots,
        }
    }
}

/// [recorder] 段：运行记录输出目录
#[derive(Debug, Clone, Deserialize)]
pub struct RecorderSection {
    #[serde(default = "default_runs_dir")]
    pub dir: PathBuf,
}

impl Default for RecorderSection {
    fn default() -> Self {
        Self {
            dir: default_runs_dir(),
        }
    }
}

fn default_runs_dir() -> PathBuf {
    PathBuf::from("runs")
}

/// 从 config 目录加载配置，环境变量 WASP__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WASP__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WASP")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
