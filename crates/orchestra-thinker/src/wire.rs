//! Stage D — wires matched/synthesized blocks into a validated `PipelineDAG`.

use std::collections::HashMap;

use orchestra_core::{BlockDefinition, EngineError, Event, EventSink, PipelineDAG};
use orchestra_llm::UnifiedLlmClient;
use serde_json::Value;

const MAX_ATTEMPTS: u32 = 2;

fn emit(sink: Option<&dyn EventSink>, event: Event) {
    if let Some(sink) = sink {
        sink.emit(event);
    }
}

fn system_prompt(blocks: &[BlockDefinition]) -> String {
    let catalog: Vec<Value> = blocks
        .iter()
        .map(|b| {
            serde_json::json!({
                "id": b.id,
                "description": b.description,
                "input_schema": b.input_schema,
                "output_schema": b.output_schema,
            })
        })
        .collect();

    format!(
        "You wire a pipeline from the block catalog below into a directed acyclic graph. \
Available blocks: {}. \
Node ids must be sequential: n1, n2, .... The first node(s) take literal inputs drawn from the \
user's intent. Every later node's inputs must be template references of the form \
`{{{{<namespace>.<dotted.path>}}}}` resolving to a prior node's output (namespace = that node's id), \
or to `memory.<key>` / `user.<key>`. A whole-string reference (the entire input value is exactly one \
`{{{{...}}}}`) preserves the referenced value's type; embedding a reference inside other text stringifies it. \
Respond with ONLY a JSON object matching: {{{{id, name, user_prompt, nodes: [{{{{id, block_id, inputs}}}}], \
edges: [{{{{from, to}}}}], memory_keys: []}}}}.",
        serde_json::to_string(&catalog).unwrap_or_default()
    )
}

/// One `{{...}}` occurrence found by the scanner; mirrors the executor's
/// own scanner (kept private there) since Wire only needs to know a
/// reference's namespace/path and whole-string-ness, not resolve it.
struct TemplateRef {
    start: usize,
    end: usize,
    path: String,
}

fn scan_refs(s: &str) -> Vec<TemplateRef> {
    let mut refs = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            if let Some(close) = s[i + 2..].find("}}") {
                let path_start = i + 2;
                let path_end = path_start + close;
                refs.push(TemplateRef { start: i, end: path_end + 2, path: s[path_start..path_end].trim().to_string() });
                i = path_end + 2;
                continue;
            }
        }
        i += 1;
    }
    refs
}

/// Checks every template reference in every node's inputs resolves to a
/// known namespace (a prior node id, `user`, or `memory`), and — when the
/// reference is a whole-string reference to a single declared output
/// field — that the two field types are compatible per §4.1/§4.5.
fn validate_wiring(pipeline: &PipelineDAG, blocks_by_id: &HashMap<&str, &BlockDefinition>) -> Result<(), String> {
    pipeline.validate().map_err(|e| e.to_string())?;

    let mut node_block = HashMap::new();
    for node in &pipeline.nodes {
        let block = blocks_by_id
            .get(node.block_id.as_str())
            .ok_or_else(|| format!("node '{}' references unknown block id '{}'", node.id, node.block_id))?;
        node_block.insert(node.id.as_str(), *block);
    }

    for node in &pipeline.nodes {
        let block = node_block[node.id.as_str()];
        for (field_name, value) in &node.inputs {
            let Value::String(s) = value else { continue };
            for reference in scan_refs(s) {
                let mut segments = reference.path.splitn(2, '.');
                let namespace = segments.next().unwrap_or_default();
                let rest = segments.next();

                if namespace == "user" || namespace == "memory" {
                    continue;
                }
                let Some(source_block) = node_block.get(namespace) else {
                    return Err(format!("node '{}' input '{}' references unknown namespace '{namespace}'", node.id, field_name));
                };

                let Some(field_path) = rest else { continue };
                if field_path.contains('.') {
                    continue;
                }
                let (Some(source_field), Some(target_field)) =
                    (source_block.output_schema.fields.get(field_path), block.input_schema.fields.get(field_name))
                else {
                    continue;
                };
                let is_whole_string = reference.start == 0 && reference.end == s.len();
                if is_whole_string && !source_field.field_type.coercible_into(target_field.field_type) {
                    return Err(format!(
                        "node '{}' input '{}' expects {:?} but '{}.{}' is {:?}",
                        node.id, field_name, target_field.field_type, namespace, field_path, source_field.field_type
                    ));
                }
            }
        }
    }

    Ok(())
}

/// Runs the single wire LLM call (with one validator-error retry),
/// returning a `PipelineDAG` that passes both structural and reference
/// validation.
pub async fn wire_stage(
    blocks: &[BlockDefinition],
    refined_intent: &str,
    llm: &UnifiedLlmClient,
    sink: Option<&dyn EventSink>,
) -> Result<PipelineDAG, EngineError> {
    emit(sink, Event::Stage { stage: "wire".to_string() });

    let system_prompt = system_prompt(blocks);
    let blocks_by_id: HashMap<&str, &BlockDefinition> = blocks.iter().map(|b| (b.id.as_str(), b)).collect();
    let mut user_prompt = refined_intent.to_string();
    let mut last_error: Option<String> = None;

    for attempt in 0..MAX_ATTEMPTS {
        if let Some(err) = &last_error {
            user_prompt = format!("{refined_intent}\n\nThe previous DAG was invalid: {err}. Correct it and respond again.");
        }

        let pipeline = match llm.structured::<PipelineDAG>(&system_prompt, &user_prompt).await {
            Ok((pipeline, _)) => pipeline,
            Err(e) => {
                last_error = Some(e.to_string());
                if attempt + 1 == MAX_ATTEMPTS {
                    break;
                }
                continue;
            }
        };

        match validate_wiring(&pipeline, &blocks_by_id) {
            Ok(()) => return Ok(pipeline),
            Err(e) => {
                last_error = Some(e);
                if attempt + 1 == MAX_ATTEMPTS {
                    break;
                }
            }
        }
    }

    Err(EngineError::WireError(last_error.unwrap_or_else(|| "wire failed".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_core::{BlockCategory, Edge, ExecutionKind, FieldSchema, FieldType, ObjectSchema, PipelineNode};
    use std::collections::HashSet;

    fn block(id: &str, output_field: &str, output_type: FieldType) -> BlockDefinition {
        let mut fields = HashMap::new();
        fields.insert(output_field.to_string(), FieldSchema::new(output_type));
        BlockDefinition {
            id: id.to_string(),
            name: id.to_string(),
            description: "test block".to_string(),
            use_when: "testing".to_string(),
            tags: HashSet::new(),
            category: BlockCategory::Process,
            execution_kind: ExecutionKind::Llm,
            input_schema: ObjectSchema::default(),
            output_schema: ObjectSchema { fields, required: vec![] },
            prompt_template: Some("{x}".to_string()),
            source: None,
            embedding: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn detects_unknown_namespace() {
        let mut fields = HashMap::new();
        fields.insert("x".to_string(), FieldSchema::new(FieldType::String));
        let mut n2_block = block("b2", "out", FieldType::String);
        n2_block.input_schema = ObjectSchema { fields, required: vec![] };

        let blocks = vec![block("b1", "out", FieldType::String), n2_block];
        let blocks_by_id: HashMap<&str, &BlockDefinition> = blocks.iter().map(|b| (b.id.as_str(), b)).collect();

        let mut n2_inputs = HashMap::new();
        n2_inputs.insert("x".to_string(), Value::String("{{n9.out}}".to_string()));

        let pipeline = PipelineDAG {
            id: "p1".to_string(),
            name: "test".to_string(),
            user_prompt: "test".to_string(),
            nodes: vec![
                PipelineNode { id: "n1".to_string(), block_id: "b1".to_string(), inputs: HashMap::new() },
                PipelineNode { id: "n2".to_string(), block_id: "b2".to_string(), inputs: n2_inputs },
            ],
            edges: [Edge { from: "n1".to_string(), to: "n2".to_string() }].into_iter().collect(),
            memory_keys: vec![],
        };

        assert!(validate_wiring(&pipeline, &blocks_by_id).is_err());
    }

    #[test]
    fn accepts_compatible_reference() {
        let mut fields = HashMap::new();
        fields.insert("x".to_string(), FieldSchema::new(FieldType::String));
        let mut n2_block = block("b2", "out", FieldType::String);
        n2_block.input_schema = ObjectSchema { fields, required: vec![] };

        let blocks = vec![block("b1", "out", FieldType::String), n2_block];
        let blocks_by_id: HashMap<&str, &BlockDefinition> = blocks.iter().map(|b| (b.id.as_str(), b)).collect();

        let mut n2_inputs = HashMap::new();
        n2_inputs.insert("x".to_string(), Value::String("{{n1.out}}".to_string()));

        let pipeline = PipelineDAG {
            id: "p1".to_string(),
            name: "test".to_string(),
            user_prompt: "test".to_string(),
            nodes: vec![
                PipelineNode { id: "n1".to_string(), block_id: "b1".to_string(), inputs: HashMap::new() },
                PipelineNode { id: "n2".to_string(), block_id: "b2".to_string(), inputs: n2_inputs },
            ],
            edges: [Edge { from: "n1".to_string(), to: "n2".to_string() }].into_iter().collect(),
            memory_keys: vec![],
        };

        assert!(validate_wiring(&pipeline, &blocks_by_id).is_ok());
    }
}
