//! Fixed prompt text, guidelines, and output schemas of the stages.

use crate::codec::{fields, structure, Fields};
use crate::types::HistoryEntry;
use serde_json::{json, Value};

pub const REASON_PROMPT: &str = "Use Google to search for the answer. Think step by step.
Always output your thought in following format";

pub const REASON_EXAMPLE_INQUIRY: &str = "
Example:

Given an inquiry \"What is Pitch Lake in Trinidad famous for?\", you will output:";

pub const RESPOND_PROMPT: &str = "You are an assistant for question-answering tasks.
You are digesting the most recent user's inquiry, thought, and observation.
Your task is to use the observation to answer the inquiry politely and concisely.
You may need to refer to the user's conversation history to understand some context.
There is no need to mention \"based on the observation\" or \"based on the previous conversation\" in your answer.
Your answer is in simple English, and at max 3 sentences.
Do not make any apology or other commentary.
Do not use other sources of information, including your memory.
Do not make up new names or come up with new facts.";

pub const RESPOND_GUIDELINE: &str = "
Always answer in JSON with the following format:

{
    \"answer\": // accurate and polite answer
}";

pub const REPLY_PROMPT: &str = "You are a helpful answering assistant.
Your task is to reply and respond to the user politely and concisely.
Answer in plain text and not in Markdown format.";

/// Heading of the prior Q&A block in the respond prompt.
pub const REFERENCE_HEADER: &str =
    "For your reference, you and the user have the following Q&A discussion:\n";

/// What each reasoning field should contain.
pub fn reason_guideline() -> Fields {
    fields([
        ("tool", "the search engine to use (must be Google)"),
        ("thought", "describe your thoughts about the inquiry"),
        ("keyphrases", "the important key phrases to search for"),
        ("observation", "the concise result of the search tool"),
        ("topic", "the specific topic covering the inquiry"),
    ])
}

/// Worked answer to [`REASON_EXAMPLE_INQUIRY`].
pub fn reason_example() -> Fields {
    fields([
        ("tool", "Google"),
        ("thought", "This is about geography, I will use Google search"),
        ("keyphrases", "Pitch Lake in Trinidad fame"),
        (
            "observation",
            "Pitch Lake in Trinidad is the largest natural deposit of asphalt",
        ),
        ("topic", "geography"),
    ])
}

pub fn reason_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "tool": {"type": "string"},
            "thought": {"type": "string"},
            "keyphrases": {"type": "string"},
            "observation": {"type": "string"},
            "topic": {"type": "string"}
        },
        "required": ["tool", "thought", "keyphrases", "observation", "topic"]
    })
}

pub fn respond_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "answer": {"type": "string"}
        },
        "required": ["answer"]
    })
}

/// System prompt of the reason stage.
///
/// The worked example is only shown when there is no prior turn to imitate.
pub fn reason_system(with_example: bool, json: bool) -> String {
    let mut prompt = structure(REASON_PROMPT, &reason_guideline(), json);
    if with_example {
        prompt.push_str(&structure(REASON_EXAMPLE_INQUIRY, &reason_example(), json));
    }
    prompt
}

/// System prompt of the respond stage, listing `recent` turns as reference.
pub fn respond_system(recent: &[HistoryEntry], json: bool) -> String {
    let mut prompt = RESPOND_PROMPT.to_string();
    if json {
        prompt.push_str(RESPOND_GUIDELINE);
    }
    if !recent.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(REFERENCE_HEADER);
        for entry in recent {
            prompt.push_str(&format!("* {} {}\n", entry.inquiry, entry.answer));
        }
    }
    prompt
}
