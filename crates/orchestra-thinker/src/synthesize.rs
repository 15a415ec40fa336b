//! Stage C — generates, tests, and registers blocks for specs Search
//! couldn't match.

use serde_json::{Map, Value};

use orchestra_core::{BlockDefinition, EngineError, Event, EventSink, ExecutionKind, RequiredBlockSpec};
use orchestra_executor::ExecutionContext;
use orchestra_llm::UnifiedLlmClient;
use orchestra_registry::BlockRegistry;
use orchestra_sandbox::{Sandbox, CAPABILITY_NAMES};

const MAX_ATTEMPTS: u32 = 3;

const SYSTEM_PROMPT_TEMPLATE: &str = "You write a single reusable automation block. \
For `llm` blocks, provide `prompt_template` with `{field}` placeholders matching every \
`input_schema` field. For `code` blocks, provide `source`: a WebAssembly Text module exporting \
`memory`, `alloc(len: i32) -> i32`, and `entrypoint(inputs_ptr, inputs_len, context_ptr, \
context_len) -> (i32, i32)`; the only host functions available under `env` are: {capabilities}. \
Respond with ONLY a JSON object matching the block definition shape: {{id, name, description, \
use_when, tags, category, execution_kind, input_schema, output_schema, prompt_template, source}}.";

fn emit(sink: Option<&dyn EventSink>, event: Event) {
    if let Some(sink) = sink {
        sink.emit(event);
    }
}

/// Builds a minimal input object from a schema: each required field gets
/// its declared default if present, otherwise a type-appropriate
/// placeholder value. Good enough to exercise the block once, not a
/// fuzzer.
fn sample_inputs(block: &BlockDefinition) -> Map<String, Value> {
    let mut inputs = Map::new();
    for name in &block.input_schema.required {
        let Some(field) = block.input_schema.fields.get(name) else { continue };
        let value = field.default.clone().unwrap_or_else(|| match field.field_type {
            orchestra_core::FieldType::String => Value::String("sample".to_string()),
            orchestra_core::FieldType::Number => Value::from(1.0),
            orchestra_core::FieldType::Integer => Value::from(1),
            orchestra_core::FieldType::Boolean => Value::Bool(true),
            orchestra_core::FieldType::Array => Value::Array(vec![]),
            orchestra_core::FieldType::Object => Value::Object(Map::new()),
        });
        inputs.insert(name.clone(), value);
    }
    block.input_schema.apply_defaults(&mut inputs);
    inputs
}

/// Runs the per-spec attempt loop (generate → validate → sample test →
/// save), returning the registered block on success.
async fn synthesize_one(
    spec: &RequiredBlockSpec,
    registry: &BlockRegistry,
    llm: &UnifiedLlmClient,
    sandbox: &Sandbox,
    sink: Option<&dyn EventSink>,
) -> Result<BlockDefinition, String> {
    let system_prompt = SYSTEM_PROMPT_TEMPLATE.replace("{capabilities}", &CAPABILITY_NAMES.join(", "));
    let mut last_error: Option<String> = None;

    for attempt in 1..=MAX_ATTEMPTS {
        emit(sink, Event::CreatingBlock { suggested_id: spec.suggested_id.clone(), attempt });

        let mut user_prompt = format!(
            "Specification: {}\nSuggested id: {}\nExpected input shape: {}\nExpected output shape: {}",
            spec.description, spec.suggested_id, spec.input_schema, spec.output_schema
        );
        if let Some(err) = &last_error {
            user_prompt.push_str(&format!("\n\nThe previous attempt failed: {err}. Fix it and respond again."));
        }

        let block = match llm.structured::<BlockDefinition>(&system_prompt, &user_prompt).await {
            Ok((block, _)) => block,
            Err(e) => {
                last_error = Some(e.to_string());
                emit(sink, Event::BlockTestFailed { suggested_id: spec.suggested_id.clone(), attempt, message: last_error.clone().unwrap() });
                continue;
            }
        };

        if let Err(e) = validate_shape(&block) {
            last_error = Some(e);
            emit(sink, Event::BlockTestFailed { suggested_id: spec.suggested_id.clone(), attempt, message: last_error.clone().unwrap() });
            continue;
        }

        if block.execution_kind == ExecutionKind::Code {
            let source = block.source.clone().unwrap_or_default();
            if let Err(e) = sandbox.compile_check(source.as_bytes()) {
                last_error = Some(e.to_string());
                emit(sink, Event::BlockTestFailed { suggested_id: spec.suggested_id.clone(), attempt, message: last_error.clone().unwrap() });
                continue;
            }
        }

        let sample = sample_inputs(&block);
        let user = Value::Null;
        let memory = Map::new();
        let ctx = ExecutionContext { user: &user, memory: &memory, user_id: "synthesize", llm, sandbox };

        match orchestra_executor::execute(&block, sample, &ctx).await {
            Ok(_) => {
                emit(sink, Event::BlockTestPassed { block_id: block.id.clone(), attempt });
                let expected_signature = registry.get(&block.id).await.map(|b| b.semantic_signature());
                return match registry.save(block.clone(), expected_signature).await {
                    Ok(saved) => {
                        emit(sink, Event::BlockCreated { block_id: saved.id.clone() });
                        Ok(saved)
                    }
                    Err(e) => Err(e.to_string()),
                };
            }
            Err(e) => {
                last_error = Some(e.to_string());
                emit(sink, Event::BlockTestFailed { suggested_id: spec.suggested_id.clone(), attempt, message: last_error.clone().unwrap() });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| "synthesis failed with no diagnostic".to_string()))
}

fn validate_shape(block: &BlockDefinition) -> Result<(), String> {
    if block.id.trim().is_empty() {
        return Err("block id must not be empty".to_string());
    }
    match block.execution_kind {
        ExecutionKind::Llm => {
            let template = block.prompt_template.as_deref().ok_or("llm block missing prompt_template")?;
            for field in block.input_schema.fields.keys() {
                if !template.contains(&format!("{{{field}}}")) {
                    return Err(format!("prompt_template does not reference input field '{field}'"));
                }
            }
            Ok(())
        }
        ExecutionKind::Code => {
            if block.source.as_deref().unwrap_or_default().trim().is_empty() {
                return Err("code block missing source".to_string());
            }
            Ok(())
        }
        other => Err(format!("execution kind {other} is reserved and cannot be synthesized")),
    }
}

/// Synthesizes every `missing` spec. Returns `Err(EngineError::NoMatchAndNoSynthesis)`
/// listing every spec that never passed, per §4.5's terminal-error rule.
pub async fn synthesize_missing(
    missing: &[RequiredBlockSpec],
    registry: &BlockRegistry,
    llm: &UnifiedLlmClient,
    sandbox: &Sandbox,
    sink: Option<&dyn EventSink>,
) -> Result<Vec<(RequiredBlockSpec, BlockDefinition)>, EngineError> {
    if missing.is_empty() {
        return Ok(Vec::new());
    }
    emit(sink, Event::Stage { stage: "synthesize".to_string() });

    let mut synthesized = Vec::new();
    let mut unresolved = Vec::new();

    for spec in missing {
        match synthesize_one(spec, registry, llm, sandbox, sink).await {
            Ok(block) => synthesized.push((spec.clone(), block)),
            Err(message) => {
                emit(sink, Event::BlockCreateFailed { suggested_id: spec.suggested_id.clone(), attempts: MAX_ATTEMPTS, message });
                unresolved.push(spec.suggested_id.clone());
            }
        }
    }

    if !unresolved.is_empty() {
        return Err(EngineError::NoMatchAndNoSynthesis { unresolved });
    }

    Ok(synthesized)
}
