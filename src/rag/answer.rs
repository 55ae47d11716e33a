//! Answer composition by prompt stuffing.
//!
//! Retrieved chunks are concatenated directly into one prompt with the
//! question. There is no iterative reduction; when the retrieved context
//! exceeds the configured character budget, lowest-ranked chunks are
//! dropped whole.

use std::sync::Arc;

use crate::providers::{GenerationError, Generator};

use super::models::{Answer, RetrievedChunk};

/// Composes answers by stuffing retrieved chunks into a single prompt.
pub struct AnswerComposer {
    generator: Arc<dyn Generator>,
    max_context_chars: usize,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn Generator>, max_context_chars: usize) -> Self {
        Self {
            generator,
            max_context_chars,
        }
    }

    /// Generate an answer to `question` from the retrieved chunks.
    ///
    /// An empty chunk list still produces a prompt (with empty context) and
    /// a generation call. Sources are echoed back when requested.
    pub async fn answer(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
        include_sources: bool,
    ) -> Result<Answer, GenerationError> {
        let kept = fit_context(chunks, self.max_context_chars);
        let prompt = build_prompt(question, kept);

        let text = self.generator.generate(&prompt).await?;

        Ok(Answer {
            text,
            sources: include_sources.then(|| kept.to_vec()),
        })
    }
}

/// Build the stuffed prompt: fixed instructions, rendered context, question.
pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "Answer the question using only the context below. \
         If the context does not contain the answer, say you don't know.\n\n",
    );
    prompt.push_str("Context:\n");
    prompt.push_str(&render_context(chunks));
    prompt.push_str("\nQuestion:\n");
    prompt.push_str(question);
    prompt.push_str("\n\nAnswer:");
    prompt
}

/// Render retrieved chunks as labeled excerpts.
fn render_context(chunks: &[RetrievedChunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        if chunk.page_start == chunk.page_end {
            out.push_str(&format!("[page {}]\n", chunk.page_start));
        } else {
            out.push_str(&format!(
                "[pages {}-{}]\n",
                chunk.page_start, chunk.page_end
            ));
        }
        out.push_str(chunk.content.trim());
        out.push_str("\n---\n");
    }
    out
}

/// Keep whole chunks in rank order until the character budget is exceeded.
/// The top-ranked chunk is always kept, even when it alone busts the budget.
fn fit_context(chunks: &[RetrievedChunk], budget: usize) -> &[RetrievedChunk] {
    let mut used = 0usize;
    let mut keep = 0usize;

    for chunk in chunks {
        let len = chunk.content.chars().count();
        if keep > 0 && used + len > budget {
            break;
        }
        used += len;
        keep += 1;
    }

    if keep < chunks.len() {
        log::warn!(
            "retrieved context exceeds {} chars; dropping {} of {} chunks",
            budget,
            chunks.len() - keep,
            chunks.len()
        );
    }

    &chunks[..keep]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieved(content: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: "c".to_string(),
            chunk_index: 0,
            content: content.to_string(),
            page_start: 1,
            page_end: 2,
            score,
        }
    }

    #[test]
    fn test_prompt_contains_context_and_question() {
        let chunks = vec![retrieved("The sky is blue.", 0.9)];
        let prompt = build_prompt("What color is the sky?", &chunks);
        assert!(prompt.contains("The sky is blue."));
        assert!(prompt.contains("What color is the sky?"));
        assert!(prompt.contains("[pages 1-2]"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn test_prompt_with_empty_context_still_builds() {
        let prompt = build_prompt("Anything?", &[]);
        assert!(prompt.contains("Context:\n"));
        assert!(prompt.contains("Anything?"));
    }

    #[test]
    fn test_fit_context_drops_lowest_ranked() {
        let chunks = vec![
            retrieved(&"a".repeat(50), 0.9),
            retrieved(&"b".repeat(50), 0.8),
            retrieved(&"c".repeat(50), 0.7),
        ];
        let kept = fit_context(&chunks, 110);
        assert_eq!(kept.len(), 2);
        assert!(kept[0].content.starts_with('a'));
    }

    #[test]
    fn test_fit_context_keeps_top_chunk_over_budget() {
        let chunks = vec![retrieved(&"x".repeat(500), 0.9)];
        assert_eq!(fit_context(&chunks, 100).len(), 1);
    }
}
