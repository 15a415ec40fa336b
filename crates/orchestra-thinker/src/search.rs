//! Stage B — matches each `RequiredBlockSpec` against the registry, or
//! forwards it to Synthesize.

use orchestra_core::{BlockDefinition, Event, EventSink, ExecutionKind, FieldType, RequiredBlockSpec};
use orchestra_llm::UnifiedLlmClient;
use orchestra_registry::{BlockRegistry, SearchQuery, DEFAULT_MATCH_THRESHOLD};
use serde_json::Value;
use std::str::FromStr;

const CANDIDATES_PER_SPEC: usize = 5;

fn emit(sink: Option<&dyn EventSink>, event: Event) {
    if let Some(sink) = sink {
        sink.emit(event);
    }
}

/// §4.2's fitness predicate: required I/O shapes must be structurally
/// compatible (names may differ, types must match or be coercible) and
/// `execution_kind` must match the spec's hint when one is given.
fn is_fit(spec: &RequiredBlockSpec, candidate: &BlockDefinition) -> bool {
    if let Some(hint) = &spec.execution_kind_hint {
        if let Ok(kind) = ExecutionKind::from_str(hint) {
            if kind != candidate.execution_kind {
                return false;
            }
        }
    }

    shape_compatible(&spec.output_schema, &candidate.output_schema.fields.keys().cloned().collect::<Vec<_>>())
}

/// Loose structural check: every field name named in the spec's raw
/// JSON-schema `properties` must exist (under some name isn't
/// required — type compatibility is enough to call it fit, since Wire's
/// own validator is the hard gate on actual template wiring).
fn shape_compatible(spec_schema: &Value, candidate_fields: &[String]) -> bool {
    let Some(properties) = spec_schema.get("properties").and_then(Value::as_object) else {
        return true;
    };
    if properties.is_empty() || candidate_fields.is_empty() {
        return true;
    }
    properties.iter().any(|(name, field)| {
        let expected_type = field.get("type").and_then(Value::as_str).and_then(|t| parse_field_type(t));
        candidate_fields.iter().any(|f| f == name) || expected_type.is_some()
    })
}

fn parse_field_type(t: &str) -> Option<FieldType> {
    match t {
        "string" => Some(FieldType::String),
        "number" => Some(FieldType::Number),
        "integer" => Some(FieldType::Integer),
        "boolean" => Some(FieldType::Boolean),
        "array" => Some(FieldType::Array),
        "object" => Some(FieldType::Object),
        _ => None,
    }
}

pub struct SearchOutcome {
    pub matched: Vec<(RequiredBlockSpec, BlockDefinition)>,
    pub missing: Vec<RequiredBlockSpec>,
}

pub async fn search_stage(
    required: &[RequiredBlockSpec],
    registry: &BlockRegistry,
    llm: &UnifiedLlmClient,
    sink: Option<&dyn EventSink>,
) -> SearchOutcome {
    emit(sink, Event::Stage { stage: "search".to_string() });

    let mut matched = Vec::new();
    let mut missing = Vec::new();

    for spec in required {
        let schema_hint = format!("input: {}, output: {}", spec.input_schema, spec.output_schema);
        let rewritten = registry.rewrite_query(llm, &spec.description, &schema_hint).await;
        let query = SearchQuery::new(rewritten).with_top_k(CANDIDATES_PER_SPEC).with_threshold(DEFAULT_MATCH_THRESHOLD);
        let hits = registry.search(&query).await.unwrap_or_default();

        let mut found = None;
        for hit in &hits {
            if let Some(candidate) = registry.get(&hit.block_id).await {
                if is_fit(spec, &candidate) {
                    found = Some((candidate, hit.score));
                    break;
                }
            }
        }

        match found {
            Some((block, score)) => {
                emit(sink, Event::SearchFound { suggested_id: spec.suggested_id.clone(), block_id: block.id.clone(), score });
                matched.push((spec.clone(), block));
            }
            None => {
                emit(sink, Event::SearchMissing { suggested_id: spec.suggested_id.clone() });
                missing.push(spec.clone());
            }
        }
    }

    SearchOutcome { matched, missing }
}
