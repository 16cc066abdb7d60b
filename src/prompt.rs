use once_cell::sync::Lazy;

/// System prompt sent when the caller does not supply one.
pub static DEFAULT_PROMPT: Lazy<String> = Lazy::new(|| {
    [
        "你是一个教学助手。",
        "请从用户文本中识别 AI 名词与计算机相关概念。",
        "只返回 JSON，格式严格如下：",
        "{",
        r#"  "terms": ["#,
        r#"    {"term": "概念词", "definition": "简明解释，包含作用或意义", "category": "分类"}"#,
        "  ]",
        "}",
        "要求：",
        "1) term 必须出现在原文中，保持原文的大小写与写法。",
        "2) 优先识别 AI/ML/计算机术语或缩写（如 LLM、RAG、embedding）。",
        "3) definition 用简体中文，控制在 40 字以内。",
        "4) category 从“模型”“技术”“硬件”“数据”“其他”中选择。",
    ]
    .join("\n")
});

/// Returns the trimmed custom prompt, or the default when it is blank.
pub fn resolve_prompt(custom: Option<&str>) -> &str {
    match custom.map(str::trim) {
        Some(prompt) if !prompt.is_empty() => prompt,
        _ => DEFAULT_PROMPT.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_prompt_falls_back_to_default() {
        assert_eq!(resolve_prompt(None), DEFAULT_PROMPT.as_str());
        assert_eq!(resolve_prompt(Some("  ")), DEFAULT_PROMPT.as_str());
        assert_eq!(resolve_prompt(Some(" custom ")), "custom");
    }

    #[test]
    fn default_prompt_requests_terms_json() {
        assert!(DEFAULT_PROMPT.contains(r#""terms""#));
        assert!(DEFAULT_PROMPT.contains("category"));
    }
}
