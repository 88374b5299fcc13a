//! Wasp - Rust 网页自动化智能体
//!
//! 由 LLM 驱动的浏览器操作循环：观测页面 -> 规划一个动作 -> 安全策略
//! 守卫 -> 执行 -> 记录，直到目标完成或预算耗尽。
//!
//! 模块划分：
//! - **agent**: 规划器、主控循环、运行记录器
//! - **browser**: 自动化表面抽象、Headless Chrome 实现、观测与内容提取
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类与运行状态模型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: 日志订阅初始化
//! - **policy**: 域名准入、频率限制、步数预算、确认标记
//! - **tools**: 封闭动作词汇表、Schema 导出与执行器

pub mod agent;
pub mod browser;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod policy;
pub mod tools;
