//! 动作层：封闭词汇表、Schema 导出与执行器

pub mod call;
pub mod executor;
pub mod schema;

pub use call::{
    ClickArgs, CompleteArgs, ExtractArgs, ExtractMode, GoBackArgs, LoadState, NavigateArgs,
    QueryArgs, ScreenshotArgs, ScrollArgs, ScrollDirection, ToolCall, ToolResult, TypeArgs,
    WaitForArgs,
};
pub use executor::{ActionExecutor, ExecutorOptions};
pub use schema::{tool_call_schema_json, vocabulary_summary};
