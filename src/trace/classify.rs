//! Display-only input annotations.
//!
//! The classifier labels a piece of text with complexity, intent, topic and
//! predicted tool needs. Nothing downstream branches on these labels.

use serde::{Deserialize, Serialize};

use crate::config::KeywordConfig;

/// Annotation produced for a piece of input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputAnalysis {
    pub complexity: Complexity,
    pub intent: Intent,
    pub topic: Topic,
    pub required_tools: Vec<ToolNeed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Explanation,
    Process,
    Comparison,
    Example,
    Reasoning,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    NeuralNetworks,
    MachineLearning,
    Ai,
    Algorithms,
    DataScience,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolNeed {
    WebSearch,
    CodeGeneration,
    DataAnalysis,
    KnowledgeBase,
}

impl Default for InputAnalysis {
    fn default() -> Self {
        Self {
            complexity: Complexity::Simple,
            intent: Intent::General,
            topic: Topic::General,
            required_tools: Vec::new(),
        }
    }
}

/// Strategy for annotating input text.
pub trait InputClassifier: Send + Sync {
    /// Annotate `text`. Must not panic; unknown input maps to the defaults.
    fn classify(&self, text: &str) -> InputAnalysis;
}

/// Keyword-table classifier.
///
/// Tables are checked in order and the first matching row wins, except for
/// tool needs, where every matching row contributes.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    intents: Vec<(Intent, Vec<String>)>,
    topics: Vec<(Topic, Vec<String>)>,
    tools: Vec<(ToolNeed, Vec<String>)>,
    interrogatives: Vec<String>,
    technical_terms: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(&KeywordConfig::default())
    }
}

impl KeywordClassifier {
    /// Build the default tables, taking web-search cues from `keywords`.
    pub fn new(keywords: &KeywordConfig) -> Self {
        Self {
            intents: vec![
                (
                    Intent::Comparison,
                    words(&["compare", "difference", " vs ", "versus", "better than"]),
                ),
                (
                    Intent::Example,
                    words(&["example", "for instance", "show me", "demonstrate"]),
                ),
                (
                    Intent::Process,
                    words(&["how does", "how do", "how to", "steps", "process"]),
                ),
                (
                    Intent::Reasoning,
                    words(&["why", "reason", "cause", "because"]),
                ),
                (
                    Intent::Explanation,
                    words(&["what is", "what are", "explain", "define", "meaning of"]),
                ),
            ],
            topics: vec![
                (
                    Topic::NeuralNetworks,
                    words(&[
                        "neural network",
                        "deep learning",
                        "backpropagation",
                        "transformer",
                        "perceptron",
                    ]),
                ),
                (
                    Topic::MachineLearning,
                    words(&[
                        "machine learning",
                        "regression",
                        "classification",
                        "training data",
                        "overfitting",
                        "supervised",
                    ]),
                ),
                (
                    Topic::Algorithms,
                    words(&["algorithm", "sorting", "big o", "recursion", "graph search"]),
                ),
                (
                    Topic::DataScience,
                    words(&["data science", "statistics", "dataset", "visualization", "pandas"]),
                ),
                (
                    Topic::Ai,
                    words(&["artificial intelligence", " ai ", "llm", "language model", "agent"]),
                ),
            ],
            tools: vec![
                (ToolNeed::WebSearch, keywords.web_search.clone()),
                (
                    ToolNeed::CodeGeneration,
                    words(&["code", "implement", "function", "python", "script"]),
                ),
                (
                    ToolNeed::DataAnalysis,
                    words(&["analyze", "calculate", "statistics", "metrics", "accuracy"]),
                ),
                (
                    ToolNeed::KnowledgeBase,
                    words(&["what is", "explain", "define", "concept", "theory"]),
                ),
            ],
            interrogatives: words(&["how", "why", "what", "which", "when", "explain", "compare"]),
            technical_terms: words(&[
                "algorithm",
                "neural",
                "gradient",
                "architecture",
                "optimization",
                "model",
                "parameter",
                "tensor",
            ]),
        }
    }

    fn complexity(&self, padded: &str, word_count: usize) -> Complexity {
        let mut score = match word_count {
            0..=8 => 0,
            9..=20 => 1,
            _ => 2,
        };
        if self
            .interrogatives
            .iter()
            .filter(|w| padded.contains(&format!(" {} ", w)))
            .count()
            > 1
        {
            score += 1;
        }
        score += self
            .technical_terms
            .iter()
            .filter(|t| padded.contains(t.as_str()))
            .count()
            .min(2);

        match score {
            0 | 1 => Complexity::Simple,
            2 => Complexity::Moderate,
            _ => Complexity::Complex,
        }
    }
}

impl InputClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> InputAnalysis {
        let normalized: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
            .collect();
        let word_count = normalized.split_whitespace().count();
        if word_count == 0 {
            return InputAnalysis::default();
        }
        // Pad so whole-word markers like " ai " match at the edges.
        let padded = format!(" {} ", normalized.split_whitespace().collect::<Vec<_>>().join(" "));

        let intent = self
            .intents
            .iter()
            .find(|(_, markers)| markers.iter().any(|m| padded.contains(m.as_str())))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::General);

        let topic = self
            .topics
            .iter()
            .find(|(_, markers)| markers.iter().any(|m| padded.contains(m.as_str())))
            .map(|(topic, _)| *topic)
            .unwrap_or(Topic::General);

        let required_tools = self
            .tools
            .iter()
            .filter(|(_, markers)| markers.iter().any(|m| padded.contains(m.as_str())))
            .map(|(tool, _)| *tool)
            .collect();

        InputAnalysis {
            complexity: self.complexity(&padded, word_count),
            intent,
            topic,
            required_tools,
        }
    }
}
