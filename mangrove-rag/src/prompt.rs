//! Grounded prompt construction.

use mangrove_core::{Document, Message};

/// Number of history turns rendered into the prompt by default.
pub const DEFAULT_HISTORY_TURNS: usize = 5;

/// Sentence the model is told to use when the context cannot answer.
pub const REFUSAL_SENTENCE: &str = "I cannot find information about this in the provided documents";

const INSTRUCTIONS: &str = "You are a helpful AI assistant. Answer the user's question based on the provided context documents. Follow these rules:

1. Use ONLY the information from the provided context documents to answer the question
2. If the context doesn't contain enough information to fully answer the question, say so clearly
3. Do not make up or infer information that isn't in the context
4. If you quote or paraphrase from the context, mention which document it came from
5. If the question cannot be answered from the context, say \"I cannot find information about this in the provided documents\"";

/// Renders context documents, recent history and the question into one prompt.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    history_turns: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_TURNS)
    }
}

impl PromptBuilder {
    pub fn new(history_turns: usize) -> Self {
        Self { history_turns }
    }

    pub fn build(&self, query: &str, context: &[&Document], history: &[Message]) -> String {
        let context_block = context
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                format!(
                    "[Document {} from {}]:\n{}",
                    i + 1,
                    doc.source_label(),
                    doc.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let start = history.len().saturating_sub(self.history_turns);
        let history_block = history[start..]
            .iter()
            .map(|msg| format!("{}: {}", msg.role, msg.content))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{INSTRUCTIONS}\n\nContext Documents:\n{context_block}\n\nPrevious Conversation:\n{history_block}\n\nCurrent Question: {query}\n\nAnswer: "
        )
    }
}

/// Build a prompt with the default history window.
pub fn build_prompt(query: &str, context: &[&Document], history: &[Message]) -> String {
    PromptBuilder::default().build(query, context, history)
}
