use serde_json::{Map, Value};

/// Notation settings keyed by `<notation>.<option>` paths, e.g. `gantt.dateFormat`.
///
/// The root is always read as an object; site config, front-matter and directives are layered
/// onto it with [`Config::deep_merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config(Value);

impl Default for Config {
    fn default() -> Self {
        Self::empty_object()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

impl Config {
    pub fn empty_object() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        segments(path).try_fold(&self.0, |node, key| node.as_object()?.get(key))
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    /// Integers, or floats truncated toward zero (YAML front-matter often yields `32.0`).
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        match self.get(path)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    /// Writes `value` at `path`, replacing any non-object found on the way.
    pub fn set_value(&mut self, path: &str, value: Value) {
        let mut keys: Vec<&str> = segments(path).collect();
        let Some(last) = keys.pop() else {
            return;
        };
        let Some(mut node) = object_mut(&mut self.0) else {
            return;
        };
        for key in keys {
            let child = node
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            let Some(next) = object_mut(child) else {
                return;
            };
            node = next;
        }
        node.insert(last.to_string(), value);
    }

    /// Layers `overrides` on top: objects merge key by key, anything else replaces.
    pub fn deep_merge(&mut self, overrides: &Value) {
        merge_into(&mut self.0, overrides);
    }
}

fn object_mut(value: &mut Value) -> Option<&mut Map<String, Value>> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value.as_object_mut()
}

fn merge_into(target: &mut Value, overrides: &Value) {
    match (target, overrides) {
        (Value::Object(target_map), Value::Object(override_map)) => {
            for (key, value) in override_map {
                if let Some(existing) = target_map.get_mut(key) {
                    merge_into(existing, value);
                } else {
                    target_map.insert(key.clone(), value.clone());
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_paths_read_and_write_nested_objects() {
        let mut cfg = Config::default();
        cfg.set_value("gitGraph.mainBranchName", json!("trunk"));
        cfg.set_value("gitGraph.mainBranchOrder", json!(2));
        assert_eq!(cfg.get_str("gitGraph.mainBranchName"), Some("trunk"));
        assert_eq!(cfg.get_i64("gitGraph.mainBranchOrder"), Some(2));
        assert_eq!(cfg.get_str("gitGraph.missing"), None);
        assert_eq!(cfg.get_i64("gitGraph.mainBranchName"), None);
    }

    #[test]
    fn set_value_replaces_scalars_on_the_path() {
        let mut cfg = Config::from_value(json!({ "packet": 3 }));
        cfg.set_value("packet.bitsPerRow", json!(16.0));
        assert_eq!(cfg.get_i64("packet.bitsPerRow"), Some(16));

        let mut cfg = Config::from_value(json!("not an object"));
        cfg.set_value("layout", json!("elk"));
        assert_eq!(cfg.as_value(), &json!({ "layout": "elk" }));
    }

    #[test]
    fn deep_merge_keeps_sibling_keys() {
        let mut cfg = Config::from_value(json!({"gantt": {"dateFormat": "YYYY-MM-DD", "topAxis": false}}));
        cfg.deep_merge(&json!({"gantt": {"topAxis": true}, "wrap": true}));
        assert_eq!(
            cfg.as_value(),
            &json!({"gantt": {"dateFormat": "YYYY-MM-DD", "topAxis": true}, "wrap": true})
        );
    }
}
