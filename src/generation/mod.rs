// Answer generation
// Prompt assembly over retrieved chunks and the trait the chat backends implement


use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::index::SearchHit;

/// Answer the model is told to give when the context does not cover the question
pub const FALLBACK_ANSWER: &str = "The document does not contain that information.";

/// Produces a natural-language answer for a fully assembled prompt
pub trait Generator {
    fn generate(&self, prompt: &str) -> Result<String>;

    fn model(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
        }
    }
}

/// Wire shape shared by the Ollama and OpenAI-compatible chat endpoints
#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: Role,
    pub content: &'a str,
}

/// Join retrieved chunk texts verbatim, nearest first, separated by a blank
/// line
#[inline]
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter().map(|hit| hit.chunk.text.as_str()).join("\n\n")
}

/// The model is asked, not forced, to stay within the context
#[inline]
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful assistant. Use ONLY the context below to answer.\n\
         \n\
         CONTEXT:\n\
         {context}\n\
         \n\
         QUESTION:\n\
         {question}\n\
         \n\
         If the answer is not in the context, say: \"{FALLBACK_ANSWER}\"\n",
        context = context,
        question = question.trim(),
    )
}
