//! 内容提取协作方：按模式从页面 HTML 提取结构化内容
//!
//! 提取启发式不属于核心，这里给出纯函数式的缺省实现；执行器在 extract
//! 动作里委托给它并原样返回其产物。

use regex::Regex;
use serde_json::{json, Value};
use url::Url;

use crate::tools::ExtractMode;

/// 提取器接口：输入当前页面 HTML 与 URL，输出模式相关的 JSON
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, html: &str, base_url: &str, mode: ExtractMode) -> Result<Value, String>;
}

/// 缺省提取器：html2text 正文 + 正则链接/表格启发式
pub struct HtmlExtractor {
    max_chars: usize,
}

impl HtmlExtractor {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    fn raw_text(&self, html: &str) -> Result<Value, String> {
        let text = html2text::from_read(html.as_bytes(), 120)
            .map_err(|e| format!("Text render failed: {e}"))?;
        Ok(json!({ "text": clamp(&text, self.max_chars) }))
    }

    fn article(&self, html: &str) -> Result<Value, String> {
        let title = capture_first(html, r"(?is)<title[^>]*>(.*?)</title>")
            .map(|t| strip_tags(&t))
            .unwrap_or_default();
        // 优先取 <article>/<main> 块，缺失时退回整页正文
        let body = capture_first(html, r"(?is)<article[^>]*>(.*?)</article>")
            .or_else(|| capture_first(html, r"(?is)<main[^>]*>(.*?)</main>"))
            .unwrap_or_else(|| html.to_string());
        let text = html2text::from_read(body.as_bytes(), 120)
            .map_err(|e| format!("Text render failed: {e}"))?;
        Ok(json!({
            "title": title.trim(),
            "text": clamp(&text, self.max_chars),
        }))
    }

    fn links(&self, html: &str, base_url: &str) -> Result<Value, String> {
        let re = Regex::new(r#"(?is)<a[^>]+href=["']([^"'#][^"']*)["'][^>]*>(.*?)</a>"#)
            .map_err(|e| e.to_string())?;
        let base = Url::parse(base_url).ok();
        let mut links = Vec::new();
        for cap in re.captures_iter(html).take(50) {
            let href = cap[1].trim().to_string();
            let resolved = match &base {
                Some(b) => b.join(&href).map(|u| u.to_string()).unwrap_or(href),
                None => href,
            };
            let text = strip_tags(&cap[2]);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            links.push(json!({ "href": resolved, "text": clamp(text, 120) }));
        }
        Ok(Value::Array(links))
    }

    fn table(&self, html: &str) -> Result<Value, String> {
        let table = capture_first(html, r"(?is)<table[^>]*>(.*?)</table>")
            .ok_or_else(|| "No table found on the page".to_string())?;
        let row_re = Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").map_err(|e| e.to_string())?;
        let cell_re = Regex::new(r"(?is)<t[hd][^>]*>(.*?)</t[hd]>").map_err(|e| e.to_string())?;
        let mut rows = Vec::new();
        for row_cap in row_re.captures_iter(&table).take(100) {
            let cells: Vec<Value> = cell_re
                .captures_iter(&row_cap[1])
                .map(|c| Value::String(strip_tags(&c[1]).trim().to_string()))
                .collect();
            if !cells.is_empty() {
                rows.push(Value::Array(cells));
            }
        }
        Ok(Value::Array(rows))
    }
}

impl ContentExtractor for HtmlExtractor {
    fn extract(&self, html: &str, base_url: &str, mode: ExtractMode) -> Result<Value, String> {
        match mode {
            ExtractMode::Raw => self.raw_text(html),
            ExtractMode::Article => self.article(html),
            ExtractMode::Links => self.links(html, base_url),
            ExtractMode::Table => self.table(html),
        }
    }
}

fn capture_first(html: &str, pattern: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(html)
        .map(|cap| cap[1].to_string())
}

fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn clamp(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.trim().to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>Example Domain</title></head>
        <body>
          <main><p>This domain is for use in examples.</p></main>
          <a href="/about">About us</a>
          <a href="https://other.org/deep">Other site</a>
          <table>
            <tr><th>Name</th><th>Age</th></tr>
            <tr><td>Ada</td><td>36</td></tr>
          </table>
        </body></html>"#;

    #[test]
    fn raw_mode_returns_page_text() {
        let value = HtmlExtractor::new(2000)
            .extract(PAGE, "https://example.com", ExtractMode::Raw)
            .unwrap();
        assert!(value["text"].as_str().unwrap().contains("examples"));
    }

    #[test]
    fn article_mode_prefers_main_block_and_title() {
        let value = HtmlExtractor::new(2000)
            .extract(PAGE, "https://example.com", ExtractMode::Article)
            .unwrap();
        assert_eq!(value["title"], "Example Domain");
        assert!(value["text"].as_str().unwrap().contains("domain is for use"));
        assert!(!value["text"].as_str().unwrap().contains("About us"));
    }

    #[test]
    fn links_mode_resolves_relative_hrefs() {
        let value = HtmlExtractor::new(2000)
            .extract(PAGE, "https://example.com/page", ExtractMode::Links)
            .unwrap();
        let links = value.as_array().unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0]["href"], "https://example.com/about");
        assert_eq!(links[0]["text"], "About us");
        assert_eq!(links[1]["href"], "https://other.org/deep");
    }

    #[test]
    fn table_mode_returns_rows_of_cells() {
        let value = HtmlExtractor::new(2000)
            .extract(PAGE, "https://example.com", ExtractMode::Table)
            .unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], "Ada");
        assert_eq!(rows[1][1], "36");
    }

    #[test]
    fn table_mode_without_table_is_an_error() {
        let err = HtmlExtractor::new(2000)
            .extract("<html><body>plain</body></html>", "https://e.com", ExtractMode::Table)
            .unwrap_err();
        assert!(err.contains("No table"));
    }
}
