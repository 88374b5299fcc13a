//! 核心层：错误分类与运行状态模型

pub mod error;
pub mod state;

pub use error::AgentError;
pub use state::{
    AgentRun, AgentStep, ElementCategory, Goal, RunOutcome, RunStatus, SelectorDescriptor,
    WorldState, DEFAULT_MAX_STEPS,
};
