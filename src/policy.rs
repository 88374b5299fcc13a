//! 安全策略守卫：域名准入、频率限制、每域步数预算、确认标记
//!
//! 每次运行构造一个新实例，频率与预算状态只属于该运行；并发运行各持有
//! 独立守卫，绝不提升为进程级共享状态。complete 动作绕过全部检查。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::tools::ToolCall;

/// click / type 参数中触发确认标记的固定词表
const RED_FLAG_TERMS: &[&str] = &[
    "checkout",
    "payment",
    "purchase",
    "buy now",
    "place order",
    "delete",
    "remove",
    "transfer",
    "subscribe",
    "unsubscribe",
];

/// 一次运行的安全策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyPolicy {
    /// 非空时启用白名单：目标 host 必须命中其一
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<Vec<String>>,
    /// 黑名单：命中即拒绝（子串包含或 `*` 通配、全串锚定）
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    /// 当前 URL 含任一子串时标记需要确认（大小写不敏感）
    #[serde(default)]
    pub confirmation_triggers: Vec<String>,
    /// 每域允许的动作步数上限
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps_per_domain: Option<u32>,
    /// 同域相邻动作的最小间隔（毫秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_ms: Option<u64>,
    /// robots 尊重标记：建议性，由外部观测器执行，守卫不拦截
    #[serde(default)]
    pub respect_robots: bool,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            allowed_domains: None,
            blocked_domains: Vec::new(),
            confirmation_triggers: vec!["checkout".into(), "payment".into(), "confirm".into()],
            max_steps_per_domain: None,
            cooldown_ms: None,
            respect_robots: true,
        }
    }
}

impl SafetyPolicy {
    /// 将目标级白名单并入策略白名单（目标给出的域追加在配置之后）
    pub fn with_goal_allowlist(mut self, goal_domains: Option<&[String]>) -> Self {
        if let Some(domains) = goal_domains {
            if !domains.is_empty() {
                self.allowed_domains
                    .get_or_insert_with(Vec::new)
                    .extend(domains.iter().cloned());
            }
        }
        self
    }
}

/// 守卫裁决：是否放行、拒绝原因、确认标记（建议性，不阻断）
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub requires_confirmation: bool,
}

impl PolicyDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            requires_confirmation: false,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            requires_confirmation: false,
        }
    }
}

/// 有状态的策略守卫，一个实例服务一次运行
pub struct PolicyGuard {
    policy: SafetyPolicy,
    /// 每域最近一次被频率检查放行的时刻
    last_action: HashMap<String, Instant>,
    /// 每域已放行的动作计数
    host_steps: HashMap<String, u32>,
}

impl PolicyGuard {
    pub fn new(policy: SafetyPolicy) -> Self {
        Self {
            policy,
            last_action: HashMap::new(),
            host_steps: HashMap::new(),
        }
    }

    /// 检查一个待执行动作。navigate 先做目标 URL 准入，之后的频率与预算
    /// 检查一律以当前页面 host 计；complete 无条件放行。
    pub fn evaluate(&mut self, current_url: &str, call: &ToolCall) -> PolicyDecision {
        if call.is_terminal() {
            return PolicyDecision::allow();
        }

        if let ToolCall::Navigate(args) = call {
            if let Some(reason) = self.check_admission(&args.url) {
                return PolicyDecision::deny(reason);
            }
        }

        if let Some(host) = host_of(current_url) {
            if let Some(reason) = self.check_rate(&host) {
                return PolicyDecision::deny(reason);
            }
            if let Some(reason) = self.check_budget(&host) {
                return PolicyDecision::deny(reason);
            }
        }

        let mut decision = PolicyDecision::allow();
        decision.requires_confirmation = self.needs_confirmation(current_url, call);
        decision
    }

    /// 域名准入：先黑名单，后白名单（白名单配置为空集时不启用）
    fn check_admission(&self, target_url: &str) -> Option<String> {
        let host = match host_of(target_url) {
            Some(h) => h,
            None => return Some(format!("Cannot parse host from URL: {target_url}")),
        };

        for pattern in &self.policy.blocked_domains {
            if domain_matches(&host, pattern) {
                return Some(format!("Domain {host} is blocked by rule '{pattern}'"));
            }
        }

        if let Some(allowlist) = &self.policy.allowed_domains {
            if !allowlist.is_empty()
                && !allowlist.iter().any(|p| domain_matches(&host, p))
            {
                return Some(format!("Domain {host} is not in the allowlist"));
            }
        }

        None
    }

    /// 频率限制：冷却未到则拒绝并给出剩余等待；放行时记录本次时刻
    fn check_rate(&mut self, host: &str) -> Option<String> {
        let cooldown = Duration::from_millis(self.policy.cooldown_ms?);
        let now = Instant::now();
        if let Some(last) = self.last_action.get(host) {
            let elapsed = now.duration_since(*last);
            if elapsed < cooldown {
                let remaining = (cooldown - elapsed).as_millis();
                return Some(format!("Rate limit for {host}: wait {remaining}ms"));
            }
        }
        self.last_action.insert(host.to_string(), now);
        None
    }

    /// 每域步数预算：达到上限即拒绝，放行则计数加一
    fn check_budget(&mut self, host: &str) -> Option<String> {
        let counter = self.host_steps.entry(host.to_string()).or_insert(0);
        if let Some(cap) = self.policy.max_steps_per_domain {
            if *counter >= cap {
                return Some(format!("Step budget for {host} exhausted ({cap} steps)"));
            }
        }
        *counter += 1;
        None
    }

    /// 确认标记：当前 URL 命中触发子串，或 click/type 参数含红线词
    fn needs_confirmation(&self, current_url: &str, call: &ToolCall) -> bool {
        let url_lower = current_url.to_lowercase();
        if self
            .policy
            .confirmation_triggers
            .iter()
            .any(|t| url_lower.contains(&t.to_lowercase()))
        {
            return true;
        }

        if matches!(call, ToolCall::Click(_) | ToolCall::Type(_)) {
            let serialized = serde_json::to_string(call)
                .unwrap_or_default()
                .to_lowercase();
            return RED_FLAG_TERMS.iter().any(|t| serialized.contains(t));
        }

        false
    }
}

/// 提取 URL 的 host（小写）
fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// 域名匹配：含 `*` 时按通配符全串匹配（`*` → `.*`），否则子串包含
fn domain_matches(host: &str, pattern: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    if pattern.contains('*') {
        let anchored = format!(
            "^{}$",
            pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*")
        );
        regex::Regex::new(&anchored)
            .map(|re| re.is_match(host))
            .unwrap_or(false)
    } else {
        host.contains(&pattern)
    }
}
