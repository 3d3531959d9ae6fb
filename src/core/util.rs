// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

use std::path::Path;

pub fn path_to_str(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Recursively overlays `b` onto `a`. Objects are merged key by key, everything else (arrays included) is replaced.
pub fn merge_json(a: &mut serde_json::Value, b: &serde_json::Value) {
    use serde_json::Value;
    match (a, b) {
        (Value::Object(ref mut a), &Value::Object(ref b)) => {
            for (k, v) in b {
                merge_json(a.entry(k).or_insert(Value::Null), v);
            }
        }
        (a, b) => {
            *a = b.clone();
        }
    }
}
