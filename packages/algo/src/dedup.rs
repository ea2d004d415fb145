//! Verse reference de-duplication
//!
//! The phrase factory asks the LLM for new items again and again; the same
//! verse tends to come back with different casing, spacing or punctuation
//! ("Gen 17:7", "gen 17 : 7", "GEN17.7"). A [`ReferenceSet`] remembers what
//! has been seen under a configurable [`ReferencePolicy`]. Book names are
//! compared as written, so "Genesis 17:7" and "Gen 17:7" stay distinct.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePolicy {
    /// Trimmed string equality
    Exact,
    /// Case, whitespace and punctuation are ignored
    #[default]
    Normalized,
    /// Substring match either way; the reverse direction only counts for
    /// candidates longer than 3 chars
    Containment,
}

impl ReferencePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
            Self::Containment => "containment",
        }
    }

    fn key(&self, reference: &str) -> String {
        match self {
            Self::Normalized => normalized_tokens(reference).join(" "),
            Self::Exact | Self::Containment => reference.trim().to_string(),
        }
    }
}

/// Lower-cased runs of letters and runs of digits; everything else separates.
fn normalized_tokens(reference: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut last_digit: Option<bool> = None;

    for c in reference.chars() {
        if !c.is_alphanumeric() {
            last_digit = None;
            continue;
        }
        let digit = c.is_ascii_digit();
        match tokens.last_mut() {
            Some(token) if last_digit == Some(digit) => token.extend(c.to_lowercase()),
            _ => tokens.push(c.to_lowercase().collect()),
        }
        last_digit = Some(digit);
    }

    tokens
}

impl fmt::Display for ReferencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown reference policy '{0}' (expected exact, normalized or containment)")]
pub struct UnknownPolicy(pub String);

impl FromStr for ReferencePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "normalized" | "normalised" => Ok(Self::Normalized),
            "containment" | "fuzzy" => Ok(Self::Containment),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Seen references, in insertion order
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    policy: ReferencePolicy,
    seen: Vec<String>,
    keys: HashSet<String>,
}

impl ReferenceSet {
    pub fn new(policy: ReferencePolicy) -> Self {
        Self {
            policy,
            seen: Vec::new(),
            keys: HashSet::new(),
        }
    }

    pub fn policy(&self) -> ReferencePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Blank references are never duplicates.
    pub fn contains(&self, reference: &str) -> bool {
        let key = self.policy.key(reference);
        if key.is_empty() {
            return false;
        }

        match self.policy {
            ReferencePolicy::Exact | ReferencePolicy::Normalized => self.keys.contains(&key),
            ReferencePolicy::Containment => self.keys.iter().any(|seen| {
                key.contains(seen.as_str()) || (seen.contains(key.as_str()) && key.chars().count() > 3)
            }),
        }
    }

    /// Records `reference`; false when it was already seen or is blank.
    pub fn insert(&mut self, reference: &str) -> bool {
        let key = self.policy.key(reference);
        if key.is_empty() || self.contains(reference) {
            return false;
        }
        self.keys.insert(key);
        self.seen.push(reference.trim().to_string());
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.seen.iter().map(String::as_str)
    }

    /// Comma separated list, as quoted in generation prompts
    pub fn joined(&self) -> String {
        self.seen.join(", ")
    }
}
