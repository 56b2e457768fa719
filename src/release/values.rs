//! Effective values computation
//!
//! Mirrors how Helm coalesces chart defaults with user overrides: nested
//! maps merge recursively, user values win, and an explicit `null` in the
//! user values removes the default.

use serde_json::{Map, Value};

/// Merge user `overrides` on top of chart `defaults`
pub fn coalesce_values(defaults: &Map<String, Value>, overrides: &Map<String, Value>) -> Value {
    let mut merged = defaults.clone();
    merge_into(&mut merged, overrides);
    Value::Object(merged)
}

fn merge_into(base: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        match value {
            Value::Null => {
                base.remove(key);
            }
            Value::Object(nested) => match base.get_mut(key) {
                Some(Value::Object(existing)) => merge_into(existing, nested),
                _ => {
                    let mut fresh = Map::new();
                    merge_into(&mut fresh, nested);
                    base.insert(key.clone(), Value::Object(fresh));
                }
            },
            other => {
                base.insert(key.clone(), other.clone());
            }
        }
    }
}
