// src/sanitize.rs - 清洗自由文本，编码前做长度/空值硬性拦截

use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// 低纠错等级下的实际容量上限（字符数）
pub const MAX_PAYLOAD_LEN: usize = 4296;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("script regex"));

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));

/// 去掉 `<script>` 块和其余 HTML 标签，再去掉首尾空白
pub fn sanitize(input: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(input, "");
    TAG_RE.replace_all(&without_scripts, "").trim().to_string()
}

/// 编码前唯一的硬性检查：非空且不超过容量上限
pub fn validate(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = text.chars().count();
    if len > MAX_PAYLOAD_LEN {
        return Err(ValidationError::TooLong {
            len,
            max: MAX_PAYLOAD_LEN,
        });
    }
    Ok(())
}

/// sanitize + validate，返回可以直接交给编码器的文本
pub fn prepare(input: &str) -> Result<String, ValidationError> {
    let clean = sanitize(input);
    validate(&clean)?;
    Ok(clean)
}
