//! Coaching rubric, modes and evaluator prompts

use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pulpit_algo::PracticeItem;

/// System rubric shared by every mode
pub const BASE_COACH_INSTRUCTION: &str = r#"You are a strict Reformed theological translation consultant training Chinese students for cross-cultural missions.
Students translate Chinese (CUV) phrases aloud into precise ESV English. Many of their future listeners love the KJV.

**CORE EVALUATION LOGIC:**

1. **Context is King (Theology):**
   * Judge against the specific verse. Separate a passable synonym from theological precision.
   * In Gen 15 "cut (Karat) a covenant" is right; in Gen 17 "establish (Hēqîm)" is better.

2. **The KJV Bridge:**
   * A KJV term in place of the ESV target ("Holy Ghost", "charity", "seed", "quickened") is never a fail.
   * Status: pass or warning. Acknowledge it for the mission field, then point back to the ESV wording.

3. **Anti-Chinglish Filter:**
   * Literal character-by-character renderings fail.
   * "肉体" as "meat" or "body" instead of "the flesh"; "立约" as "build a contract".

4. **Traffic Lights:**
   * pass: ESV match or strong KJV variant.
   * warning: acceptable word that misses the nuance, or an archaic KJV term.
   * fail: wrong meaning, secular term, Chinglish, or nothing said.

**FEEDBACK STYLE:**
* Write in Chinese and keep key theological terms in English.
* Cite Hebrew or Greek only when it explains a real distinction.
* The student already sees the answer. Do not restate it; explain the gap.
  Good: "这里用 Make 稍显软弱。Gen 17 是在确认旧约，*Hēqîm* 强调 'Establish'。"
* At most two short sentences. Key term first, then sentence structure.

**OUTPUT:**
Return only JSON, no prose and no code fences. Transcribe what you actually hear.
If nothing is audible the transcription is "NO_AUDIO" and the status is "fail"."#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoachMode {
    /// 讲台口译
    #[default]
    Pulpit,
    /// 神学课堂
    Classroom,
    /// 祷告/灵修
    Devotional,
}

impl CoachMode {
    pub const ALL: [CoachMode; 3] = [Self::Pulpit, Self::Classroom, Self::Devotional];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pulpit => "pulpit",
            Self::Classroom => "classroom",
            Self::Devotional => "devotional",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pulpit => "讲台口译 (Pulpit)",
            Self::Classroom => "神学课堂 (Classroom)",
            Self::Devotional => "祷告/灵修 (Devotional)",
        }
    }

    /// Three numbered focus points plus a style line
    pub fn focus(&self) -> &'static str {
        match self {
            Self::Pulpit => "你是一位在跨文化宣教工场服侍多年的资深讲台口译导师。\n\
                重点评估：\n\
                1. 强动词气势：拒绝软绵绵的词 (如 Give vs Present)。\n\
                2. 语音语调：用词力度和权威感。\n\
                3. 反中式搭配：严禁 Chinglish。\n\
                风格：激情、直接、像讲道学教授。",
            Self::Classroom => "你是一位严谨的改革宗神学教授。\n\
                重点评估：\n\
                1. 句法逻辑：连接词 (For, Therefore) 是否准确。\n\
                2. 教义微调：严防神学错误 (如 Justify vs Make Righteous)。\n\
                3. 术语一致：同一概念前后用词统一。\n\
                风格：冷静、学术、关注逻辑链。",
            Self::Devotional => "你是一位属灵导师。\n\
                重点评估：\n\
                1. 情感深度：使用强烈的关系动词 (Pants for vs Miss)。\n\
                2. KJV 亲和力：鼓励使用 Thee/Thou。\n\
                3. 祷告节奏：语句自然、可以直接用于祷告。\n\
                风格：温柔、敏锐、关注内心。",
        }
    }

    /// Base rubric plus this mode's focus
    pub fn system_prompt(&self) -> String {
        format!("{BASE_COACH_INSTRUCTION}\n\n**MODE-SPECIFIC FOCUS:**\n{}", self.focus())
    }
}

impl fmt::Display for CoachMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown coach mode '{0}' (expected pulpit, classroom or devotional)")]
pub struct UnknownMode(pub String);

impl FromStr for CoachMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pulpit" => Ok(Self::Pulpit),
            "classroom" => Ok(Self::Classroom),
            "devotional" | "prayer" => Ok(Self::Devotional),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// User prompt for one recording covering a whole batch, spoken in order.
pub fn batch_prompt(items: &[&PracticeItem]) -> String {
    let mut listing = String::new();
    for (n, item) in items.iter().enumerate() {
        let _ = writeln!(
            listing,
            "{}. ID {}: Chinese '{}' → Expected ESV: '{}'",
            n + 1,
            item.id,
            item.source_phrase,
            item.target_phrase
        );
    }

    let mut shape = String::new();
    for (n, item) in items.iter().enumerate() {
        let sep = if n + 1 < items.len() { "," } else { "" };
        let _ = writeln!(
            shape,
            r#"  {{"id": {}, "status": "pass/warning/fail", "user_said": "exact transcription or 'NO_AUDIO'", "feedback": "coaching feedback"}}{sep}"#,
            item.id
        );
    }

    format!(
        "Here is the audio recording. The user will translate {count} Chinese phrases to English in sequential order.\n\n\
         The {count} items in order:\n{listing}\n\
         Listen to the audio and for each item:\n\
         1. Transcribe EXACTLY what you hear (or \"NO_AUDIO\" if you hear nothing)\n\
         2. Evaluate using the theological coach rules from the system instruction\n\
         3. Return status (pass/warning/fail), user_said and feedback\n\n\
         Output JSON format:\n[\n{shape}]\n\n\
         If the audio is SILENT or EMPTY every item must have user_said \"NO_AUDIO\" and status \"fail\".\n\
         user_said MUST be what you actually HEAR, not the expected answer.\n\n\
         Output ONLY a valid JSON array.",
        count = items.len(),
    )
}

/// User prompt for coaching a single card in the given mode.
pub fn card_prompt(item: &PracticeItem, mode: CoachMode) -> String {
    let meta = &item.meta;
    let na = "N/A";
    let traps = if meta.traps.is_empty() {
        "[]".to_string()
    } else {
        meta.traps.join("; ")
    };
    let key_term = meta.key_term.as_deref().unwrap_or(na);

    format!(
        "Here is the audio recording. The user translates this Chinese phrase to English.\n\n\
         **Context:**\n\
         - Reference: {reference}\n\
         - Chinese phrase: \"{cn}\"\n\
         - Full context: \"{context}\"\n\
         - Expected ESV target: \"{en}\"\n\
         - Key term to focus on: \"{key_term}\"\n\
         - Traps to avoid: {traps}\n\n\
         **Mode & Focus:**\n\
         - Current mode: {mode_label}\n\
         {focus}\n\n\
         **Your task:**\n\
         1. Transcribe EXACTLY what you hear, or \"NO_AUDIO\" if you hear nothing.\n\
         2. Compare your transcription with the ESV target \"{en}\" word by word; key term \"{key_term}\" first.\n\
         3. Evaluate with the coach rules from the system instruction.\n\
         4. Feedback in Chinese, three short lines following the three focus points of the current mode: \
         diagnosis, correction, insight. Under 150 Chinese characters in total.\n\n\
         **Output JSON format:**\n\
         {{\"status\": \"pass/warning/fail\", \"user_said\": \"exact transcription or 'NO_AUDIO'\", \"feedback\": \"markdown coaching comment\"}}\n\n\
         Output ONLY a valid JSON object.",
        reference = meta.reference.as_deref().unwrap_or(na),
        cn = item.source_phrase,
        context = meta.context.as_deref().unwrap_or(na),
        en = item.target_phrase,
        mode_label = mode.label(),
        focus = mode.focus(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulpit_algo::ItemMetadata;

    fn covenant() -> PracticeItem {
        PracticeItem::new(7, "坚定我的约", "establish my covenant").with_meta(ItemMetadata {
            reference: Some("Gen 17:7".to_string()),
            key_term: Some("establish".to_string()),
            traps: vec!["build a contract".to_string(), "make a deal".to_string()],
            ..ItemMetadata::default()
        })
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Pulpit".parse::<CoachMode>().unwrap(), CoachMode::Pulpit);
        assert_eq!("classroom".parse::<CoachMode>().unwrap(), CoachMode::Classroom);
        assert_eq!(" devotional ".parse::<CoachMode>().unwrap(), CoachMode::Devotional);
        assert!("sermon".parse::<CoachMode>().is_err());
        assert_eq!(CoachMode::default(), CoachMode::Pulpit);
    }

    #[test]
    fn test_system_prompt_appends_mode_focus() {
        for mode in CoachMode::ALL {
            let prompt = mode.system_prompt();
            assert!(prompt.starts_with(BASE_COACH_INSTRUCTION));
            assert!(prompt.contains("**MODE-SPECIFIC FOCUS:**"));
            assert!(prompt.ends_with(mode.focus()));
        }
    }

    #[test]
    fn test_every_focus_has_three_points() {
        for mode in CoachMode::ALL {
            let focus = mode.focus();
            assert!(focus.contains("1. ") && focus.contains("2. ") && focus.contains("3. "), "{mode}");
        }
    }

    #[test]
    fn test_batch_prompt_lists_items_in_order() {
        let a = PracticeItem::new(12, "立约", "made a covenant");
        let b = PracticeItem::new(3, "肉体", "the flesh");
        let prompt = batch_prompt(&[&a, &b]);

        assert!(prompt.contains("1. ID 12: Chinese '立约' → Expected ESV: 'made a covenant'"));
        assert!(prompt.contains("2. ID 3: Chinese '肉体' → Expected ESV: 'the flesh'"));
        assert!(prompt.contains(r#"{"id": 12, "status""#));
        assert!(prompt.contains(r#"{"id": 3, "status""#));
        assert!(prompt.find("ID 12").unwrap() < prompt.find("ID 3").unwrap());
        assert!(prompt.contains("translate 2 Chinese phrases"));
    }

    #[test]
    fn test_card_prompt_includes_context() {
        let prompt = card_prompt(&covenant(), CoachMode::Classroom);
        assert!(prompt.contains("Reference: Gen 17:7"));
        assert!(prompt.contains("Expected ESV target: \"establish my covenant\""));
        assert!(prompt.contains("Key term to focus on: \"establish\""));
        assert!(prompt.contains("build a contract; make a deal"));
        assert!(prompt.contains("神学课堂"));
        assert!(prompt.contains("Full context: \"N/A\""));
    }
}
