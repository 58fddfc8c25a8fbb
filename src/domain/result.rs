// ============================================================
// Layer 3 - ScoredResult
// ============================================================
// One output record per candidate. Field names on the wire are
// `index`, `sent_id`, `text`, `expansion`, `loss`, in that order
// (serde keeps struct declaration order).

use serde::Serialize;

use crate::domain::candidate::Candidate;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    #[serde(rename = "index")]
    pub unique_id: usize,

    #[serde(rename = "sent_id")]
    pub raw_id: usize,

    /// Full candidate sentence, space-joined subword tokens
    #[serde(rename = "text")]
    pub display_text: String,

    /// The abbreviation or expansion placed in the sentence
    pub expansion: String,

    /// Lower means more plausible
    #[serde(rename = "loss")]
    pub score: f32,
}

impl ScoredResult {
    pub fn new(candidate: &Candidate, score: f32) -> Self {
        Self {
            unique_id:    candidate.unique_id,
            raw_id:       candidate.raw_id,
            display_text: candidate.sentence_text(),
            expansion:    candidate.display_text.clone(),
            score,
        }
    }
}
