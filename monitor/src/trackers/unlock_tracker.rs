//! Unlock state.
//!
//! Unlock documents list obtained keys either as a map or as an array:
//!
//! ```json
//! { "obtained": { "minecraft:recipe_book": true } }
//! { "obtained": [ "minecraft:recipe_book" ] }
//! ```

use serde_json::Value;

use crate::model::TrackableItem;
use crate::parser::is_truthy;

const OBTAINED_KEY: &str = "obtained";

/// Whether `root_name` is obtained in the unlocks document.
#[must_use]
pub fn obtained(doc: &Value, root_name: &str) -> bool {
    match doc.get(OBTAINED_KEY) {
        Some(Value::Object(map)) => map.get(root_name).is_some_and(is_truthy),
        Some(Value::Array(keys)) => keys.iter().any(|k| k.as_str() == Some(root_name)),
        _ => false,
    }
}

pub fn update_unlocks(unlocks: &mut [TrackableItem], doc: &Value) {
    for unlock in unlocks.iter_mut() {
        unlock.done = obtained(doc, &unlock.root_name);
        unlock.progress = i64::from(unlock.done);
    }
}
