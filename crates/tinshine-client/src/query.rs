use serde_json::Value;

use tinshine_shared::{Fields, Record};

/// Whether `record` satisfies every condition of `query`.
///
/// A string condition matches a string field by case-insensitive
/// substring. Numbers compare by value, anything else by JSON equality. A
/// condition on a field the record lacks never matches.
pub fn matches(record: &Record, query: &Fields) -> bool {
    query.iter().all(|(key, expected)| match record.get(key) {
        Some(actual) => value_matches(expected, &actual),
        None => false,
    })
}

fn value_matches(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::String(needle), Value::String(haystack)) => {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => expected == actual,
    }
}
