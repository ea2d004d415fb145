//! Text Sanitization
//!
//! String cleaning shared by the evaluator, the speech service and the
//! offline data tools.
//!
//! Functions:
//! - LLM response unwrapping (code fences, surrounding prose)
//! - Speech text cleanup
//! - ASCII slugs for cache file names
//! - Silent-recording detection

/// Markdown symbols the speech engine would otherwise read aloud
const MARKDOWN_SYMBOLS: [char; 8] = ['*', '_', '`', '[', ']', '(', ')', '#'];

/// Transcripts that mean "nothing was heard"
const SILENT_SENTINELS: [&str; 7] = [
    "NO_AUDIO",
    "NO AUDIO",
    "NO AUDIO DETECTED",
    "NOT SAID",
    "MISSING",
    "UNCLEAR",
    "未录音",
];

/// 从模型输出中取出 JSON 主体
///
/// Strips a Markdown code fence (with or without a `json` tag) and returns
/// the outermost array or object. Falls back to the trimmed input.
pub fn extract_json_payload(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(start) = body.find("```") {
        let after = &body[start + 3..];
        let after = after
            .strip_prefix("json")
            .or_else(|| after.strip_prefix("JSON"))
            .unwrap_or(after);
        body = match after.find("```") {
            Some(end) => &after[..end],
            None => after,
        }
        .trim();
    }

    if let Some(open) = body.find(['[', '{']) {
        let close = if body.as_bytes()[open] == b'[' { ']' } else { '}' };
        if let Some(end) = body.rfind(close) {
            if end > open {
                return &body[open..=end];
            }
        }
    }

    body
}

/// 清理朗读文本：移除 Markdown 符号并压缩空白
pub fn clean_for_speech(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !MARKDOWN_SYMBOLS.contains(c))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replaces every char outside printable ASCII with `_`
pub fn ascii_slug(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '_' })
        .collect()
}

/// 判断转写结果是否表示"没有声音"
pub fn is_silent_transcript(transcript: &str) -> bool {
    let trimmed = transcript.trim();
    if trimmed.is_empty() {
        return true;
    }
    let upper = trimmed.to_uppercase();
    SILENT_SENTINELS.iter().any(|s| *s == upper)
}
