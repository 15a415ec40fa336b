//! Stage A — turns a refined intent into granular `RequiredBlockSpec`s.

use orchestra_core::{Event, EventSink, EngineError, RequiredBlockSpec};
use orchestra_llm::UnifiedLlmClient;
use serde::Deserialize;

const SYSTEM_PROMPT: &str = "You decompose an automation request into a list of single-purpose block \
specifications. Each block does exactly one thing — one intent, one boundary. Allowed execution kinds: \
`llm` (a single prompt/response transformation) and `code` (deterministic computation or I/O). Never emit \
a composite block that does two things. Respond with ONLY a JSON object: \
{\"required_blocks\": [{\"suggested_id\": string, \"description\": string, \"execution_kind_hint\": string|null, \
\"depends_on\": [string], \"input_schema\": object, \"output_schema\": object}]}.";

#[derive(Deserialize)]
struct DecomposeOutput {
    required_blocks: Vec<RequiredBlockSpec>,
}

fn emit(sink: Option<&dyn EventSink>, event: Event) {
    if let Some(sink) = sink {
        sink.emit(event);
    }
}

/// Runs the single decompose LLM call, retrying once with the parse
/// error appended to the prompt if the first attempt doesn't validate.
pub async fn decompose(refined_intent: &str, llm: &UnifiedLlmClient, sink: Option<&dyn EventSink>) -> Result<Vec<RequiredBlockSpec>, EngineError> {
    emit(sink, Event::Stage { stage: "decompose".to_string() });

    let mut user_prompt = refined_intent.to_string();
    let mut last_error = None;

    for attempt in 0..2 {
        if let Some(err) = &last_error {
            user_prompt = format!("{refined_intent}\n\nYour previous output was invalid: {err}. Correct it and respond again.");
        }

        let call = llm.structured::<DecomposeOutput>(SYSTEM_PROMPT, &user_prompt).await;
        match call {
            Ok((output, _metrics)) => {
                if output.required_blocks.is_empty() {
                    last_error = Some("required_blocks must not be empty".to_string());
                    if attempt == 1 {
                        break;
                    }
                    continue;
                }
                emit(sink, Event::DecomposeBlocks { required: output.required_blocks.clone() });
                return Ok(output.required_blocks);
            }
            Err(e) => {
                last_error = Some(e.to_string());
                if attempt == 1 {
                    break;
                }
            }
        }
    }

    Err(EngineError::DecomposeError(last_error.unwrap_or_else(|| "decompose failed".to_string())))
}
