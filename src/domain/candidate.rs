// ============================================================
// Layer 3 - RawLine and Candidate
// ============================================================
// A RawLine is an input line that contained a known
// abbreviation. A Candidate is that line with the abbreviation
// replaced by one possible span:
//
//   left_tokens | span_tokens | right_tokens
//   "the"       | "patient"   | "was stable"
//
// The first candidate of every line keeps the literal
// abbreviation as its span; the rest use dictionary expansions
// in dictionary order.

/// An input line with a recognised abbreviation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Sequential over matched lines only, starting at 0
    pub raw_id: usize,
    /// Whitespace-split words of the line
    pub words: Vec<String>,
    /// Index into `words` of the abbreviation being expanded
    pub abbr_pos: usize,
}

impl RawLine {
    pub fn abbreviation(&self) -> &str {
        &self.words[self.abbr_pos]
    }

    pub fn words_before(&self) -> &[String] {
        &self.words[..self.abbr_pos]
    }

    pub fn words_after(&self) -> &[String] {
        &self.words[self.abbr_pos + 1..]
    }
}

/// One scorable (context + substituted span) combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub unique_id:    usize,
    pub raw_id:       usize,
    pub left_tokens:  Vec<String>,
    pub span_tokens:  Vec<String>,
    pub right_tokens: Vec<String>,
    /// Surface form of the span: the abbreviation or one expansion
    pub display_text: String,
    /// 0 for the literal abbreviation, n for the n-th expansion
    pub span_index:   usize,
}

impl Candidate {
    pub fn is_original(&self) -> bool {
        self.span_index == 0
    }

    /// Number of subword tokens in the full candidate sentence.
    pub fn token_count(&self) -> usize {
        self.left_tokens.len() + self.span_tokens.len() + self.right_tokens.len()
    }

    /// left + span + right, in order.
    pub fn sentence_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::with_capacity(self.token_count());
        tokens.extend_from_slice(&self.left_tokens);
        tokens.extend_from_slice(&self.span_tokens);
        tokens.extend_from_slice(&self.right_tokens);
        tokens
    }

    /// Space-joined subword tokens of the whole sentence.
    pub fn sentence_text(&self) -> String {
        self.sentence_tokens().join(" ")
    }
}
