//! Field-by-field merging of YAML layers.
//!
//! Layers are parsed into `serde_json::Value` so the merge is format-agnostic.
//! Maps merge key by key, everything else is replaced, and an explicit
//! `null` leaves the lower layer alone.

use serde_json::Value;

/// Merge `layer` into `target` in place.
pub fn merge_into(target: &mut Value, layer: Value) {
    match (target, layer) {
        (_, Value::Null) => {}
        (Value::Object(target_map), Value::Object(layer_map)) => {
            for (key, value) in layer_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target, layer) => *target = layer,
    }
}

/// Fold layers lowest-priority first.
pub fn merge_layers(layers: impl IntoIterator<Item = Value>) -> Value {
    let mut merged = Value::Null;
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}
