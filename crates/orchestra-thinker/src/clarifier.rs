//! Pre-flight dialog that turns a possibly-underspecified request into a
//! single self-contained intent before Decompose ever runs.

use orchestra_core::{ClarifierSession, EngineError, Message};
use orchestra_llm::UnifiedLlmClient;
use serde::Deserialize;

const FORCE_SYNTHESIS_ROUND: u32 = 3;

const ASSESS_SYSTEM_PROMPT: &str = "You judge whether an automation request is specific enough to build \
from directly: it must name a goal, its inputs, and the expected outcome. Respond with ONLY a JSON object: \
{\"specific_enough\": bool, \"question\": string|null, \"refined_intent\": string|null}. \
Set `refined_intent` only when `specific_enough` is true; set `question` (exactly one, targeting the \
single biggest ambiguity) only when it is false.";

const SYNTHESIZE_SYSTEM_PROMPT: &str = "You convert a short back-and-forth clarifying conversation into a \
single self-contained automation intent, filling any remaining gaps with reasonable defaults. Respond with \
ONLY a JSON object: {\"refined_intent\": string}.";

#[derive(Deserialize)]
struct AssessOutput {
    specific_enough: bool,
    question: Option<String>,
    refined_intent: Option<String>,
}

#[derive(Deserialize)]
struct SynthesizeOutput {
    refined_intent: String,
}

/// The Clarifier's answer for one turn: either a single follow-up
/// question, or a `refined_intent` ready for the Thinker.
#[derive(Debug, Clone)]
pub struct ClarifierStepResult {
    pub ready: bool,
    pub question: Option<String>,
    pub refined_intent: Option<String>,
}

fn conversation_transcript(session: &ClarifierSession) -> String {
    session
        .history
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs one Clarifier turn. §4.6's policy: round 0 may shortcut straight
/// to `ready=true` if the message is already specific enough; otherwise
/// ask exactly one question; once `round >= 3`, stop asking and force
/// synthesis from the conversation so far.
pub async fn step(
    session: &mut ClarifierSession,
    user_message: &str,
    llm: &UnifiedLlmClient,
) -> Result<ClarifierStepResult, EngineError> {
    session.history.push(Message::user(user_message));
    session.round += 1;

    if session.round >= FORCE_SYNTHESIS_ROUND {
        let transcript = conversation_transcript(session);
        let (output, _) = llm
            .structured::<SynthesizeOutput>(SYNTHESIZE_SYSTEM_PROMPT, &transcript)
            .await
            .map_err(|e| EngineError::ClarifyError(e.to_string()))?;

        if output.refined_intent.trim().is_empty() {
            return Err(EngineError::ClarifyError("forced synthesis produced an empty intent".to_string()));
        }

        session.ready = true;
        session.refined_intent = Some(output.refined_intent.clone());
        return Ok(ClarifierStepResult { ready: true, question: None, refined_intent: Some(output.refined_intent) });
    }

    let transcript = conversation_transcript(session);
    let (output, _) = llm
        .structured::<AssessOutput>(ASSESS_SYSTEM_PROMPT, &transcript)
        .await
        .map_err(|e| EngineError::ClarifyError(e.to_string()))?;

    if output.specific_enough {
        let refined_intent = output.refined_intent.unwrap_or_else(|| user_message.to_string());
        session.ready = true;
        session.refined_intent = Some(refined_intent.clone());
        return Ok(ClarifierStepResult { ready: true, question: None, refined_intent: Some(refined_intent) });
    }

    let question = output.question.unwrap_or_else(|| "Could you say more about what you want this to do?".to_string());
    session.history.push(Message::assistant(question.clone()));
    Ok(ClarifierStepResult { ready: false, question: Some(question), refined_intent: None })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_renders_each_message() {
        let mut session = ClarifierSession::new("s1");
        session.history.push(Message::user("hello"));
        session.history.push(Message::assistant("hi"));
        let transcript = conversation_transcript(&session);
        assert!(transcript.contains("hello"));
        assert!(transcript.contains("hi"));
    }
}
