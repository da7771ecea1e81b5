//! 从 LLM 回复中提取 JSON
//!
//! 模型常把 JSON 包在 ```json ... ``` 代码块或解释性文字里；这里取出最外层的 JSON 片段。

/// 提取 JSON 片段：优先 ```json 代码块，其次首个 `{`/`[` 到对应的最后一个 `}`/`]`
pub fn extract_json_block(output: &str) -> Option<&str> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let block = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        return Some(block.trim());
    }

    let obj = trimmed.find('{').zip(trimmed.rfind('}'));
    let arr = trimmed.find('[').zip(trimmed.rfind(']'));
    let (start, end) = match (obj, arr) {
        (Some(o), Some(a)) => {
            if a.0 < o.0 {
                a
            } else {
                o
            }
        }
        (Some(o), None) => o,
        (None, Some(a)) => a,
        (None, None) => return None,
    };
    (start < end).then(|| &trimmed[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block() {
        let out = "Here is the plan:\n```json\n{\"steps\": []}\n```\nDone.";
        assert_eq!(extract_json_block(out), Some("{\"steps\": []}"));
    }

    #[test]
    fn test_bare_object_with_prose() {
        let out = "Sure! {\"summary\": \"ok\"} hope this helps";
        assert_eq!(extract_json_block(out), Some("{\"summary\": \"ok\"}"));
    }

    #[test]
    fn test_array_before_object() {
        let out = "[{\"action\": \"navigate\"}]";
        assert_eq!(extract_json_block(out), Some(out));
    }

    #[test]
    fn test_no_json() {
        assert_eq!(extract_json_block("I cannot help with that"), None);
    }
}
