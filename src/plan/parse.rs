//! 搜索文本解析与链接归一化

use crate::core::SearchResult;
use crate::core::state::truncate_chars;

/// 不作为结果的行前缀
const HEADER_MARKERS: &[&str] = &["🔍", "I found", "📅"];

/// 条目的链接行与摘要行，归并到上一条结果
const LINK_MARKER: &str = "📍";
const SNIPPET_MARKER: &str = "📝";

const TITLE_CHARS: usize = 100;
const SNIPPET_CHARS: usize = 200;

/// 网页搜索文本 → 结果：每个非空、非标题行一条，最多 max 条
///
/// `📍`/`📝` 开头的行不单独成条，分别作为上一条结果的链接（仅 http 开头时）和摘要。
pub fn parse_search_text(text: &str, max: usize) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = Vec::new();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if HEADER_MARKERS.iter().any(|m| line.starts_with(m)) {
            continue;
        }
        if let Some(link) = line.strip_prefix(LINK_MARKER) {
            let link = link.trim();
            if let Some(last) = results.last_mut().filter(|_| link.starts_with("http")) {
                last.link = link.to_string();
            }
            continue;
        }
        if let Some(snippet) = line.strip_prefix(SNIPPET_MARKER) {
            if let Some(last) = results.last_mut() {
                last.snippet = truncate_chars(snippet.trim(), SNIPPET_CHARS);
            }
            continue;
        }
        if results.len() >= max {
            break;
        }
        results.push(SearchResult::new(
            &truncate_chars(line, TITLE_CHARS),
            truncate_chars(line, SNIPPET_CHARS),
            "google",
        ));
    }
    results
}

/// 相对链接补全为绝对链接
///
/// 以 http 开头的原样返回；以 `/` 开头的按当前页面的 scheme://host 补全；其他形式原样返回。
pub fn make_absolute_url(href: &str, page_url: &str) -> String {
    if href.is_empty() || href.starts_with("http") || !href.starts_with('/') {
        return href.to_string();
    }
    // 协议相对链接 //host/path
    if let Some(rest) = href.strip_prefix("//") {
        return match page_url.split_once("://") {
            Some((scheme, _)) => format!("{}://{}", scheme, rest),
            None => href.to_string(),
        };
    }
    match origin(page_url) {
        Some(origin) => format!("{}{}", origin, href),
        None => href.to_string(),
    }
}

/// scheme://host[:port]
fn origin(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if scheme.is_empty() || host.is_empty() {
        return None;
    }
    Some(format!("{}://{}", scheme, host))
}
