//! Dot-key flattening of nested JSON objects.

use serde_json::{Map, Value};

/// Flatten nested objects into `a.b.c` keys.
///
/// Arrays, numbers, booleans, null and strings are leaves.  An empty object
/// is kept as a leaf so it survives a round trip.  Key order follows the
/// source document.  A non-object root flattens to an empty map.
pub fn flatten(value: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    if let Value::Object(map) = value {
        flatten_into(map, "", &mut out);
    }
    out
}

fn flatten_into(map: &Map<String, Value>, prefix: &str, out: &mut Map<String, Value>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(inner, &path, out),
            other => {
                out.insert(path, other.clone());
            }
        }
    }
}

/// Rebuild nested objects from `a.b.c` keys.
///
/// A later key that needs an object where a leaf already sits replaces the
/// leaf.
pub fn unflatten(flat: &Map<String, Value>) -> Value {
    let mut root = Map::new();
    for (path, value) in flat {
        let segments: Vec<&str> = path.split('.').collect();
        insert_path(&mut root, &segments, value.clone());
    }
    Value::Object(root)
}

fn insert_path(node: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            node.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = node
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_objects_in_order() {
        let source = json!({
            "title": "Apply",
            "form": {
                "submit": "Submit Application",
                "errors": { "required": "This field is required" }
            },
            "count": 3
        });

        let flat = flatten(&source);
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["title", "form.submit", "form.errors.required", "count"]
        );
        assert_eq!(flat["count"], json!(3));
    }

    #[test]
    fn arrays_and_empty_objects_are_leaves() {
        let source = json!({ "tags": ["a", "b"], "empty": {} });
        let flat = flatten(&source);
        assert_eq!(flat["tags"], json!(["a", "b"]));
        assert_eq!(flat["empty"], json!({}));
        assert_eq!(unflatten(&flat), source);
    }

    #[test]
    fn unflatten_restores_structure() {
        let source = json!({
            "nav": { "home": "Home", "about": { "team": "Team", "jobs": "" } },
            "footer": null
        });
        assert_eq!(unflatten(&flatten(&source)), source);
    }

    #[test]
    fn unflatten_replaces_conflicting_leaf() {
        let mut flat = Map::new();
        flat.insert("a".into(), json!("leaf"));
        flat.insert("a.b".into(), json!("nested"));
        assert_eq!(unflatten(&flat), json!({ "a": { "b": "nested" } }));
    }
}
