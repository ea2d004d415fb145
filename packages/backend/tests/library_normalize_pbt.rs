//! Property-Based Tests for the library normalizer
//!
//! Tests the following invariants:
//! - Legacy field names never survive a pass
//! - `trap` always ends up as a list of trimmed, non-blank strings
//! - A second pass changes nothing
//! - Normalized records with id and phrases load as practice items

use proptest::prelude::*;
use serde_json::{Map, Value};

use pulpit_algo::PracticeItem;
use pulpit_backend::library::normalize::normalize_record;

const LEGACY: [&str; 5] = ["reference", "chinese_phrase", "cn", "english_phrase", "en"];

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        "[a-zA-Z ]{1,12}",
        " [a-z]{1,6}\t",
        "[\u{4e00}-\u{4e20}]{1,6}",
    ]
}

fn arb_trap() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        Just(Some(Value::Null)),
        arb_text().prop_map(|s| Some(Value::String(s))),
        (0i64..100).prop_map(|n| Some(Value::from(n))),
        prop::collection::vec(
            prop_oneof![arb_text().prop_map(Value::String), Just(Value::Null), Just(Value::Bool(true))],
            0..4
        )
        .prop_map(|v| Some(Value::Array(v))),
    ]
}

/// Field name (legacy or canonical) per slot, plus a value
fn arb_record() -> impl Strategy<Value = Map<String, Value>> {
    (
        1u32..500,
        prop::sample::select(vec!["ref", "reference"]),
        prop::sample::select(vec!["phrase_cn", "chinese_phrase", "cn"]),
        prop::sample::select(vec!["phrase_en", "english_phrase", "en"]),
        "[a-zA-Z]{1,8}",
        arb_trap(),
        any::<bool>(),
    )
        .prop_map(|(id, ref_key, cn_key, en_key, text, trap, both_cn)| {
            let mut record = Map::new();
            record.insert("id".to_string(), Value::from(id));
            record.insert(ref_key.to_string(), Value::String(format!("Gen {id}:1")));
            record.insert(cn_key.to_string(), Value::String(format!("短语{text}")));
            record.insert(en_key.to_string(), Value::String(text));
            if both_cn {
                record.insert("phrase_cn".to_string(), Value::String("坚定".to_string()));
                record.insert("cn".to_string(), Value::String("立".to_string()));
            }
            if let Some(trap) = trap {
                record.insert("trap".to_string(), trap);
            }
            record
        })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn normalized_record_is_canonical(mut record in arb_record()) {
        normalize_record(&mut record);

        for legacy in LEGACY {
            prop_assert!(!record.contains_key(legacy), "legacy key {} survived", legacy);
        }
        let trap = record.get("trap").and_then(Value::as_array);
        prop_assert!(trap.is_some());
        for entry in trap.into_iter().flatten() {
            let text = entry.as_str();
            prop_assert!(text.is_some_and(|t| !t.is_empty() && t.trim() == t));
        }
    }

    #[test]
    fn normalization_is_idempotent(mut record in arb_record()) {
        normalize_record(&mut record);
        let once = record.clone();
        prop_assert!(!normalize_record(&mut record));
        prop_assert_eq!(once, record);
    }

    #[test]
    fn canonical_wins_over_legacy(mut record in arb_record()) {
        let canonical = record.get("phrase_cn").cloned();
        normalize_record(&mut record);
        if let Some(canonical) = canonical {
            prop_assert_eq!(record.get("phrase_cn"), Some(&canonical));
        }
    }

    #[test]
    fn normalized_record_loads(mut record in arb_record()) {
        normalize_record(&mut record);
        let item: Result<PracticeItem, _> = serde_json::from_value(Value::Object(record.clone()));
        prop_assert!(item.is_ok(), "{:?}", record);
        let item = item.unwrap();
        prop_assert!(item.meta.reference.is_some());
        let stored: Vec<String> = serde_json::from_value(record["trap"].clone()).unwrap();
        prop_assert_eq!(item.meta.traps, stored);
    }
}
