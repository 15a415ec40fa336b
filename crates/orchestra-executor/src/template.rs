//! Resolves `{{namespace.dotted.path}}` references against run state.
//!
//! Pure function: no I/O, no registry, no store. Generalizes the
//! teacher's `get_input_for_node` (which joined upstream node text by
//! edge) from "join strings" to "walk a dotted path through a JSON
//! value tree" — every node's full output is addressable, not just its
//! raw text.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// The run-state slice a template reference can address: `user`,
/// `memory`, and the recorded output of each already-completed node,
/// keyed by node id.
pub struct RunStateView<'a> {
    pub results: &'a HashMap<String, Value>,
    pub user: &'a Value,
    pub memory: &'a Map<String, Value>,
}

/// Looks up a dotted path and clones the result. The first segment
/// selects a namespace (`user`, `memory`, or a node id); remaining
/// segments walk object fields. Returns `None` if any segment is
/// missing. Cloning per-lookup keeps this simple at the cost of a copy
/// of whatever subtree is referenced — cheap at the sizes block inputs
/// and outputs run at.
fn resolve_path(path: &str, state: &RunStateView) -> Option<Value> {
    let mut segments = path.split('.');
    let namespace = segments.next()?;
    let rest: Vec<&str> = segments.collect();

    let mut current: Value = match namespace {
        "user" => state.user.clone(),
        "memory" => Value::Object(state.memory.clone()),
        other => state.results.get(other)?.clone(),
    };

    for segment in rest {
        current = match segment.parse::<usize>() {
            Ok(idx) => current.get(idx)?.clone(),
            Err(_) => current.get(segment)?.clone(),
        };
    }
    Some(current)
}

/// One `{{...}}` occurrence found by the scanner.
struct TemplateRef {
    start: usize,
    end: usize,
    path: String,
}

/// Hand-written scanner for the `{{...}}` grammar — no regex crate
/// needed for syntax this simple.
fn scan_refs(s: &str) -> Vec<TemplateRef> {
    let mut refs = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            if let Some(close) = s[i + 2..].find("}}") {
                let path_start = i + 2;
                let path_end = path_start + close;
                let path = s[path_start..path_end].trim().to_string();
                refs.push(TemplateRef { start: i, end: path_end + 2, path });
                i = path_end + 2;
                continue;
            }
        }
        i += 1;
    }
    refs
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn resolve_string(s: &str, state: &RunStateView) -> Value {
    let refs = scan_refs(s);
    if refs.is_empty() {
        return Value::String(s.to_string());
    }

    let is_whole_string = refs.len() == 1 && refs[0].start == 0 && refs[0].end == s.len();
    if is_whole_string {
        return resolve_path(&refs[0].path, state).unwrap_or(Value::Null);
    }

    let mut out = String::with_capacity(s.len());
    let mut cursor = 0;
    for r in &refs {
        out.push_str(&s[cursor..r.start]);
        let resolved = resolve_path(&r.path, state);
        out.push_str(&resolved.as_ref().map(stringify).unwrap_or_default());
        cursor = r.end;
    }
    out.push_str(&s[cursor..]);
    Value::String(out)
}

/// Resolves every input value in `inputs` against `state`. Non-string
/// values pass through unchanged.
pub fn resolve(inputs: &HashMap<String, Value>, state: &RunStateView) -> HashMap<String, Value> {
    inputs
        .iter()
        .map(|(key, value)| {
            let resolved = match value {
                Value::String(s) => resolve_string(s, state),
                other => other.clone(),
            };
            (key.clone(), resolved)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state<'a>(results: &'a HashMap<String, Value>, user: &'a Value, memory: &'a Map<String, Value>) -> RunStateView<'a> {
        RunStateView { results, user, memory }
    }

    #[test]
    fn whole_string_ref_preserves_type() {
        let mut results = HashMap::new();
        results.insert("n1".to_string(), json!({"items": [1, 2, 3]}));
        let user = json!({});
        let memory = Map::new();
        let state = state(&results, &user, &memory);

        let mut inputs = HashMap::new();
        inputs.insert("items".to_string(), json!("{{n1.items}}"));
        let resolved = resolve(&inputs, &state);
        assert_eq!(resolved["items"], json!([1, 2, 3]));
    }

    #[test]
    fn mixed_interpolation_stringifies() {
        let mut results = HashMap::new();
        results.insert("n1".to_string(), json!({"count": 3}));
        let user = json!({});
        let memory = Map::new();
        let state = state(&results, &user, &memory);

        let mut inputs = HashMap::new();
        inputs.insert("label".to_string(), json!("found {{n1.count}} items"));
        let resolved = resolve(&inputs, &state);
        assert_eq!(resolved["label"], json!("found 3 items"));
    }

    #[test]
    fn missing_whole_string_ref_is_null() {
        let results = HashMap::new();
        let user = json!({});
        let memory = Map::new();
        let state = state(&results, &user, &memory);

        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), json!("{{n1.missing}}"));
        let resolved = resolve(&inputs, &state);
        assert_eq!(resolved["x"], Value::Null);
    }

    #[test]
    fn missing_mixed_ref_is_empty_string() {
        let results = HashMap::new();
        let user = json!({});
        let memory = Map::new();
        let state = state(&results, &user, &memory);

        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), json!("value: {{n1.missing}}"));
        let resolved = resolve(&inputs, &state);
        assert_eq!(resolved["x"], json!("value: "));
    }

    #[test]
    fn array_index_segment_walks_into_list() {
        let mut results = HashMap::new();
        results.insert("n1".to_string(), json!({"results": [{"title": "first"}, {"title": "second"}]}));
        let user = json!({});
        let memory = Map::new();
        let state = state(&results, &user, &memory);

        let mut inputs = HashMap::new();
        inputs.insert("title".to_string(), json!("{{n1.results.0.title}}"));
        let resolved = resolve(&inputs, &state);
        assert_eq!(resolved["title"], json!("first"));
    }

    #[test]
    fn non_string_values_pass_through() {
        let results = HashMap::new();
        let user = json!({});
        let memory = Map::new();
        let state = state(&results, &user, &memory);

        let mut inputs = HashMap::new();
        inputs.insert("n".to_string(), json!(42));
        let resolved = resolve(&inputs, &state);
        assert_eq!(resolved["n"], json!(42));
    }
}
