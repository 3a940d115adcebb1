//! Centralized canned text.
//!
//! Fixed replies, fallback narratives and the synthetic trace script live here
//! so wording changes never touch the logic that selects them.

/// Reply to a greeting when the agent answered with an administrative non-answer.
pub const GREETING_RESPONSE: &str = "Hello! I'm TransparAI, an assistant that shows you how it \
reasons while it answers. Ask me about artificial intelligence, machine learning, neural \
networks, algorithms or data science, and you can follow each step of my thinking in the \
reasoning flow next to the chat.";

/// Reply to any other input when the agent's answer was degenerate.
pub const CLARIFICATION_RESPONSE: &str = "I couldn't produce a useful answer to that. Could you \
ask me something more specific? For example, ask me to explain a concept, walk through a \
process, or compare two approaches.";

/// Phrases that mark an answer as an administrative non-answer (lower case).
pub const NO_ACTION_MARKERS: &[&str] = &[
    "does not require a specific action",
    "does not require any action",
    "does not require any specific action",
    "no action required",
    "no action is required",
    "no specific action",
];

/// Inputs treated as greetings after trimming and lower-casing.
pub const GREETING_TOKENS: &[&str] = &["hi", "hello", "hey", "good morning", "good afternoon"];

/// Prompt used by the connection self-test.
pub const CONNECTION_TEST_PROMPT: &str = "Hello, can you introduce yourself?";

/// Narrative for a pre-processing fragment that carried no reasoning text.
pub const PREPROCESSING_FALLBACK_NARRATIVE: &str =
    "Analyzing the request to understand what is being asked and whether it can be answered.";

/// Narrative for an orchestration fragment that carried no reasoning text.
pub const ORCHESTRATION_FALLBACK_NARRATIVE: &str =
    "Coordinating the available tools, knowledge and model calls needed to answer.";

/// Narrative for a post-processing fragment that carried no reasoning text.
pub const POSTPROCESSING_FALLBACK_NARRATIVE: &str =
    "Reviewing and formatting the final response before returning it.";

/// Query shown on the knowledge retrieval step of the synthetic trace.
pub const SYNTHETIC_KNOWLEDGE_QUERY: &str = "Background knowledge for the question's key concepts";

/// Labels and narratives of the synthetic fallback trace, in emission order.
pub const SYNTHETIC_SCRIPT: [(&str, &str); 5] = [
    (
        "Input Analysis",
        "Parsed the question and identified the concepts it asks about.",
    ),
    (
        "Knowledge Retrieval",
        "Gathered background knowledge relevant to the identified concepts.",
    ),
    (
        "Response Planning",
        "Chose how to structure the answer so each idea builds on the previous one.",
    ),
    (
        "Model Generation",
        "Generated the answer with the foundation model using the planned structure.",
    ),
    (
        "Response Review",
        "Checked the generated answer for clarity and completeness before returning it.",
    ),
];
