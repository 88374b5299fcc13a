//! 智能体层：规划器、主控循环与运行记录器

pub mod loop_;
pub mod planner;
pub mod recorder;

pub use loop_::{is_critical_error, AgentSession, HISTORY_WINDOW};
pub use planner::{parse_action, PlannedAction, Planner};
pub use recorder::RunRecorder;
