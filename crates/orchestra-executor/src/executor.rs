//! Runs a single block against its resolved inputs.
//!
//! `execute` dispatches on [`ExecutionKind`]: `llm` renders a prompt
//! template and calls the provider SDK directly through
//! [`UnifiedLlmClient`] (no wrapper layer in between — block execution is
//! where the "never hide an LLM call from cost tracing" invariant lives);
//! `code` hands the block's source to [`Sandbox`].

use std::time::Duration;

use orchestra_core::{BlockDefinition, EngineError, ExecutionKind};
use orchestra_llm::UnifiedLlmClient;
use orchestra_sandbox::Sandbox;
use serde_json::{Map, Value};

const DEFAULT_CODE_TIMEOUT: Duration = Duration::from_secs(60);

/// `context = {user, memory, user_id}` plus the capability handles a
/// block needs: the LLM client it should call with (model already
/// chosen) and the sandbox for `code` kind.
pub struct ExecutionContext<'a> {
    pub user: &'a Value,
    pub memory: &'a Map<String, Value>,
    pub user_id: &'a str,
    pub llm: &'a UnifiedLlmClient,
    pub sandbox: &'a Sandbox,
}

fn context_object(ctx: &ExecutionContext) -> Value {
    serde_json::json!({
        "user": ctx.user,
        "memory": ctx.memory,
        "user_id": ctx.user_id,
    })
}

pub async fn execute(block: &BlockDefinition, resolved_inputs: Map<String, Value>, ctx: &ExecutionContext<'_>) -> Result<Value, EngineError> {
    let mut inputs = resolved_inputs;
    block.input_schema.apply_defaults(&mut inputs);

    let missing = block.input_schema.validate(&inputs);
    if !missing.is_empty() {
        return Err(EngineError::BlockInputError {
            block_id: block.id.clone(),
            field: missing.join(", "),
            message: "required input missing or type-mismatched".to_string(),
        });
    }

    let output = match block.execution_kind {
        ExecutionKind::Llm => execute_llm(block, &inputs, ctx).await?,
        ExecutionKind::Code => execute_code(block, &inputs, ctx).await?,
        other => {
            return Err(EngineError::BlockRuntimeError {
                block_id: block.id.clone(),
                message: format!("execution kind {other} is reserved and not yet implemented"),
            })
        }
    };

    let problems = block.output_schema.validate(output.as_object().unwrap_or(&Map::new()));
    if !problems.is_empty() {
        return Err(EngineError::BlockOutputError {
            block_id: block.id.clone(),
            raw: output.to_string(),
            message: format!("output missing or mismatched fields: {}", problems.join(", ")),
        });
    }

    Ok(output)
}

fn render_template(template: &str, inputs: &Map<String, Value>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in inputs {
        let placeholder = format!("{{{key}}}");
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&placeholder, &text);
    }
    rendered
}

/// Scans for the first balanced `{...}` span. Defense-in-depth against
/// providers/models that don't honor `response_format` — the happy path
/// is already-valid JSON, in which case this returns the whole string's
/// brace span untouched.
fn extract_balanced_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

async fn execute_llm(block: &BlockDefinition, inputs: &Map<String, Value>, ctx: &ExecutionContext<'_>) -> Result<Value, EngineError> {
    let template = block.prompt_template.as_deref().ok_or_else(|| EngineError::BlockRuntimeError {
        block_id: block.id.clone(),
        message: "llm block has no prompt_template".to_string(),
    })?;

    let user_prompt = render_template(template, inputs);
    let system_prompt = format!(
        "You perform exactly one task: {}\nRespond with ONLY a single valid JSON object matching this shape: {}",
        block.description,
        serde_json::to_string(&block.output_schema).unwrap_or_default(),
    );

    let response = ctx.llm.chat(&system_prompt, &user_prompt).await?;

    let parsed = match serde_json::from_str::<Value>(&response.content) {
        Ok(v) => v,
        Err(_) => {
            let extracted = extract_balanced_json(&response.content).ok_or_else(|| EngineError::BlockOutputError {
                block_id: block.id.clone(),
                raw: response.content.clone(),
                message: "no balanced JSON object found in llm response".to_string(),
            })?;
            serde_json::from_str(extracted).map_err(|e| EngineError::BlockOutputError {
                block_id: block.id.clone(),
                raw: response.content.clone(),
                message: e.to_string(),
            })?
        }
    };

    Ok(parsed)
}

async fn execute_code(block: &BlockDefinition, inputs: &Map<String, Value>, ctx: &ExecutionContext<'_>) -> Result<Value, EngineError> {
    let source = block.source.as_deref().ok_or_else(|| EngineError::BlockRuntimeError {
        block_id: block.id.clone(),
        message: "code block has no source".to_string(),
    })?;

    let result = ctx
        .sandbox
        .execute(source.as_bytes(), Value::Object(inputs.clone()), context_object(ctx), DEFAULT_CODE_TIMEOUT)
        .await;

    result.map_err(|e| {
        let timed_out = matches!(&e, orchestra_sandbox::SandboxError::Trap(msg) if msg.contains("epoch deadline"));
        e.into_engine_error(&block.id, timed_out, DEFAULT_CODE_TIMEOUT.as_millis() as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_template_substitutes_placeholders() {
        let mut inputs = Map::new();
        inputs.insert("name".to_string(), Value::String("world".to_string()));
        assert_eq!(render_template("hello {name}", &inputs), "hello world");
    }

    #[test]
    fn extract_balanced_json_finds_first_object() {
        let text = "here is your answer: {\"a\": {\"b\": 1}} thanks";
        assert_eq!(extract_balanced_json(text), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn extract_balanced_json_none_without_braces() {
        assert_eq!(extract_balanced_json("no json here"), None);
    }
}
