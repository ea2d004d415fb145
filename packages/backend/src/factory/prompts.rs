use serde_json::Value;

use super::Blueprint;

pub const GENERATOR_SYSTEM: &str = "You are a strict JSON generator. Output only valid JSON lists.";

/// Stand-in for the forbidden list once it grows past this many chars
pub const FORBIDDEN_LIMIT: usize = 1500;
pub const FORBIDDEN_OVERFLOW: &str = "Many verses already used. Find UNIQUE ones.";

const ITEM_SHAPE: &str = r#"[
  {
    "ref": "Chapter:Verse",
    "phrase_cn": "Chinese",
    "phrase_en": "ESV",
    "sentence_context": "Full context",
    "key_term": "Strong Verb/Term",
    "trap": "Chinglish Trap",
    "nuance_note": "Brief explanation in English or Hebrew/Greek terms, never Pinyin. Example: '因为约 (Covenant)'."
  }
]"#;

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

pub fn focus_prompt(focus: &[Value]) -> String {
    format!(
        "You are a theological translation data generator.\n\
         Expand each strong-verb focus below into one JSON practice card.\n\n\
         INPUT: {input}\n\n\
         REQUIREMENTS:\n\
         1. Output a strictly valid JSON list.\n\
         2. 'trap': use the 'weak_trap' provided.\n\
         3. 'sentence_context': the full ESV context.\n\
         4. 'nuance_note': use the nuance provided. Inside brackets use English or Hebrew/Greek terms, e.g. '立约 (Covenant)'. Never use Pinyin.\n\n\
         OUTPUT FORMAT (JSON List):\n{ITEM_SHAPE}",
        input = compact(&Value::Array(focus.to_vec())),
    )
}

/// `seen` is the comma joined list of references already used.
pub fn forbidden_list(seen: String) -> String {
    if seen.chars().count() > FORBIDDEN_LIMIT {
        FORBIDDEN_OVERFLOW.to_string()
    } else {
        seen
    }
}

pub fn mining_prompt(blueprint: &Blueprint, count: usize, forbidden: &str) -> String {
    format!(
        "Role: theological translation generator.\n\
         Goal: generate {count} UNIQUE practice items for the book of {book}.\n\
         Theme: {theme}\n\n\
         CRITICAL CONSTRAINT (duplicate prevention):\n\
         DO NOT USE these references: [{forbidden}]\n\
         You MUST find different verses.\n\n\
         STRATEGY:\n\
         1. Scan the ENTIRE book.\n\
         2. Use these TRAPS: {traps}\n\
         3. Use these KEY TERMS: {verbs}\n\
         4. Focus on strong verbs versus weak verbs.\n\n\
         OUTPUT FORMAT (JSON List):\n{ITEM_SHAPE}",
        book = blueprint.book,
        theme = blueprint.theme,
        traps = compact(&blueprint.chinglish_traps),
        verbs = compact(&blueprint.key_verbs),
    )
}
