//! 动作词汇表 Schema 生成（schemars 自动导出 ToolCall 的 JSON Schema）
//!
//! 将「合法动作」的 JSON 结构注入 system prompt，约束 LLM 每轮只输出一个
//! 词汇表内的动作，减少格式错误与幻觉动作。

use schemars::schema_for;

use crate::tools::ToolCall;

/// 返回整个动作词汇表的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCall);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

/// 每个动作一行的用法速览，比完整 Schema 更省 token，两者配合使用
pub fn vocabulary_summary() -> &'static str {
    r#"- navigate: load a URL. args: {"url": "...", "waitUntil": "load|domcontentloaded|networkidle" (optional)}
- click: click an element. args: {"selector": "...", "timeout": ms (optional)}
- type: type into a field. args: {"selector": "...", "text": "...", "submit": bool (optional), "clear": bool (optional)}
- extract: pull content from the current page. args: {"mode": "article|table|raw|links"}
- waitFor: wait for a selector OR a load state (exactly one). args: {"selector": "..."} or {"state": "load|domcontentloaded|networkidle"}, plus optional "timeout" ms
- screenshot: capture the page. args: {"purpose": "..." (optional), "fullPage": bool (optional)}
- scroll: scroll the page. args: {"direction": "down|up|top|bottom", "amount": pixels (optional)}
- query: read an element's text and visibility without acting. args: {"selector": "..."}
- goBack: go back one history entry. args: {}
- complete: finish the run. args: {"success": bool, "result": "..." (optional), "reason": "..." (optional)}"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_every_action_name() {
        let schema = tool_call_schema_json();
        for name in [
            "navigate",
            "click",
            "type",
            "extract",
            "waitFor",
            "screenshot",
            "scroll",
            "query",
            "goBack",
            "complete",
        ] {
            assert!(schema.contains(name), "schema missing action {name}");
        }
    }

    #[test]
    fn summary_covers_the_whole_vocabulary() {
        let summary = vocabulary_summary();
        assert_eq!(summary.lines().count(), 10);
    }
}
