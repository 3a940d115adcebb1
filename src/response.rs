//! Final answer guardrail.
//!
//! The agent sometimes answers small talk with an administrative non-answer
//! ("This request does not require a specific action."). [`ResponseAssembler`]
//! replaces such degenerate answers with canned text and passes everything else
//! through untouched.

use tracing::debug;

use crate::messages::{CLARIFICATION_RESPONSE, GREETING_RESPONSE, GREETING_TOKENS, NO_ACTION_MARKERS};

/// Answers shorter than this many characters (after trimming) are degenerate.
pub const MIN_RESPONSE_CHARS: usize = 3;

/// A bare no-action sentence longer than this is treated as a real answer.
pub const MAX_NON_ANSWER_CHARS: usize = 120;

/// Deterministic post-processing of the agent's raw answer.
#[derive(Debug, Clone, Default)]
pub struct ResponseAssembler;

impl ResponseAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Pick the text shown to the user for `raw_response` to `input_text`.
    pub fn assemble(&self, raw_response: &str, input_text: &str) -> String {
        if !is_degenerate(raw_response) {
            return raw_response.to_string();
        }

        if is_greeting(input_text) {
            debug!("Replaced degenerate answer to a greeting");
            GREETING_RESPONSE.to_string()
        } else {
            debug!(
                response_len = raw_response.chars().count(),
                "Replaced degenerate answer"
            );
            CLARIFICATION_RESPONSE.to_string()
        }
    }
}

/// Whether the input is one of the fixed greetings, ignoring case, surrounding
/// whitespace and trailing punctuation.
pub fn is_greeting(input_text: &str) -> bool {
    let normalized = input_text
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim_end()
        .to_lowercase();
    GREETING_TOKENS.contains(&normalized.as_str())
}

/// Whether the answer is empty, or is essentially an administrative
/// non-answer: it opens with "This ... does not require ..." or consists of a
/// single short no-action sentence.
pub fn is_degenerate(raw_response: &str) -> bool {
    let trimmed = raw_response.trim();
    let chars = trimmed.chars().count();
    if chars < MIN_RESPONSE_CHARS {
        return true;
    }

    let lower = trimmed.to_lowercase();
    let mut sentences = lower
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty());
    let first = sentences.next().unwrap_or_default();
    if !contains_marker(first) {
        return false;
    }

    first.starts_with("this ") || (sentences.next().is_none() && chars <= MAX_NON_ANSWER_CHARS)
}

fn contains_marker(text: &str) -> bool {
    NO_ACTION_MARKERS.iter().any(|marker| text.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NON_ANSWER: &str = "This greeting does not require a specific action.";
    const REAL_ANSWER: &str = "A neural network is a layered function approximator.";

    #[test]
    fn test_empty_answer_to_hi_yields_greeting() {
        assert_eq!(ResponseAssembler::new().assemble("", "hi"), GREETING_RESPONSE);
    }

    #[test]
    fn test_non_answer_to_greeting_yields_greeting() {
        let assembler = ResponseAssembler::new();
        for greeting in ["hi", "Hello", "  hey  ", "Good morning!", "good afternoon."] {
            assert_eq!(assembler.assemble(NON_ANSWER, greeting), GREETING_RESPONSE);
        }
    }

    #[test]
    fn test_degenerate_answer_to_question_yields_clarification() {
        let assembler = ResponseAssembler::new();
        assert_eq!(
            assembler.assemble(NON_ANSWER, "What is a neural network?"),
            CLARIFICATION_RESPONSE
        );
        assert_eq!(assembler.assemble("   ok  ", "Explain MCTS"), CLARIFICATION_RESPONSE);
    }

    #[test]
    fn test_real_answer_passes_through_unchanged() {
        let assembler = ResponseAssembler::new();
        assert_eq!(assembler.assemble(REAL_ANSWER, "hi"), REAL_ANSWER);
        assert_eq!(
            assembler.assemble(REAL_ANSWER, "What is a neural network?"),
            REAL_ANSWER
        );
    }

    #[test]
    fn test_marker_match_ignores_case() {
        assert!(is_degenerate("This Request Does Not Require A Specific Action at all."));
        assert!(!is_degenerate(REAL_ANSWER));
    }

    #[test]
    fn test_short_correct_answers_pass_through() {
        let assembler = ResponseAssembler::new();
        assert_eq!(
            assembler.assemble("Paris.", "What is the capital of France?"),
            "Paris."
        );
        assert_eq!(assembler.assemble("42", "What is 6 times 7?"), "42");
        assert_eq!(assembler.assemble("Yes.", "Is Rust memory safe?"), "Yes.");
    }

    #[test]
    fn test_marker_inside_a_real_answer_passes_through() {
        let answer = "If the cache is already warm, no action is required. Otherwise run \
                      `make warm` and restart the service.";
        assert_eq!(
            ResponseAssembler::new().assemble(answer, "How do I warm the cache?"),
            answer
        );
    }

    #[test]
    fn test_bare_no_action_sentence_is_degenerate() {
        assert!(is_degenerate("No action is required."));
        assert!(!is_degenerate("Later steps matter too. No action is required now."));
    }

    #[test]
    fn test_long_answer_opening_with_non_answer_is_degenerate() {
        let answer = format!("{} {}", NON_ANSWER, "Let me know if there is anything else. ".repeat(4));
        assert!(answer.chars().count() > MAX_NON_ANSWER_CHARS);
        assert!(is_degenerate(&answer));
    }

    #[test]
    fn test_greeting_must_match_whole_input() {
        assert!(is_greeting("HELLO"));
        assert!(!is_greeting("hello there, explain transformers"));
        assert!(!is_greeting("high"));
    }
}
