// ============================================================
// Layer 4 - Candidate Generator
// ============================================================
// Turns raw input lines into Candidates.
//
// For each line:
//   1. Split on whitespace into words
//   2. Find the word whose lowercase form is a dictionary key.
//      When several words match, MatchPolicy decides which one
//      is used (Last by default)
//   3. No match -> the line is skipped and gets no raw_id
//   4. Re-tokenize the words before and after the match as two
//      separate texts, so the context splits on word boundaries
//   5. Emit the literal abbreviation as candidate #1, then one
//      candidate per dictionary expansion, all sharing the same
//      context and raw_id
//
// unique_id and raw_id are counters owned by the generator and
// never reset between lines.
//
// A line that is not valid UTF-8 aborts the run: skipping it
// would shift every later raw_id.

use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::str::FromStr;

use crate::data::dictionary::{normalize, AbbreviationDictionary};
use crate::domain::candidate::{Candidate, RawLine};
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::traits::SubwordTokenizer;

/// Which dictionary match to expand when a line has several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    #[default]
    Last,
    First,
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "last"  => Ok(Self::Last),
            "first" => Ok(Self::First),
            other   => Err(format!("unknown match policy '{other}' (expected 'last' or 'first')")),
        }
    }
}

pub struct CandidateGenerator<'a, T: SubwordTokenizer> {
    dictionary:     &'a AbbreviationDictionary,
    tokenizer:      &'a T,
    policy:         MatchPolicy,
    next_unique_id: usize,
    next_raw_id:    usize,
    lines_read:     usize,
}

impl<'a, T: SubwordTokenizer> CandidateGenerator<'a, T> {
    pub fn new(dictionary: &'a AbbreviationDictionary, tokenizer: &'a T, policy: MatchPolicy) -> Self {
        Self {
            dictionary,
            tokenizer,
            policy,
            next_unique_id: 0,
            next_raw_id:    0,
            lines_read:     0,
        }
    }

    /// Lines consumed so far, matched or not.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Lines that produced candidates so far.
    pub fn lines_matched(&self) -> usize {
        self.next_raw_id
    }

    /// Read every line of `reader` and collect all candidates.
    pub fn generate_all<R: BufRead>(&mut self, reader: R) -> PipelineResult<Vec<Candidate>> {
        let mut candidates = Vec::new();
        for (idx, bytes) in reader.split(b'\n').enumerate() {
            let line_no = idx + 1;
            let bytes = bytes?;
            let line = std::str::from_utf8(&bytes).map_err(|e| PipelineError::Input {
                line:   line_no,
                reason: format!("invalid UTF-8: {e}"),
            })?;
            candidates.extend(self.generate_line(line, line_no)?);
        }
        tracing::info!(
            "Read {} lines, {} contained an abbreviation, {} candidates",
            self.lines_read,
            self.lines_matched(),
            candidates.len()
        );
        Ok(candidates)
    }

    /// Candidates for one line; empty when no word is a dictionary key.
    /// `line_no` is 1-based and only used in error messages.
    pub fn generate_line(&mut self, line: &str, line_no: usize) -> PipelineResult<Vec<Candidate>> {
        self.lines_read += 1;

        let words: Vec<String> = line.split_whitespace().map(String::from).collect();
        let Some(abbr_pos) = self.find_abbreviation(&words) else {
            return Ok(Vec::new());
        };

        let raw = RawLine { raw_id: self.next_raw_id, words, abbr_pos };
        let abbreviation = normalize(raw.abbreviation());
        tracing::debug!("line {}: expanding '{}' at word {}", line_no, abbreviation, abbr_pos);

        let tokenize = |text: &str| {
            self.tokenizer.tokenize(text).map_err(|e| PipelineError::Input {
                line:   line_no,
                reason: match e {
                    PipelineError::Encoding { reason, .. } => reason,
                    other => other.to_string(),
                },
            })
        };
        let left  = tokenize(&raw.words_before().join(" "))?;
        let right = tokenize(&raw.words_after().join(" "))?;

        let abbr_tokens = tokenize(&abbreviation)?;
        if abbr_tokens.is_empty() {
            return Err(PipelineError::Input {
                line:   line_no,
                reason: format!("abbreviation '{abbreviation}' produced no tokens"),
            });
        }

        let expansions = self.dictionary.lookup(&abbreviation);
        let mut spans = Vec::with_capacity(expansions.len() + 1);
        spans.push((abbreviation.clone(), abbr_tokens));
        for expansion in expansions {
            let tokens = tokenize(expansion)?;
            if tokens.is_empty() {
                return Err(PipelineError::config(format!(
                    "expansion '{expansion}' of '{abbreviation}' produced no tokens"
                )));
            }
            spans.push((expansion.clone(), tokens));
        }

        let candidates: Vec<Candidate> = spans
            .into_iter()
            .enumerate()
            .map(|(span_index, (display_text, span_tokens))| Candidate {
                unique_id:    self.next_unique_id + span_index,
                raw_id:       raw.raw_id,
                left_tokens:  left.clone(),
                span_tokens,
                right_tokens: right.clone(),
                display_text,
                span_index,
            })
            .collect();

        self.next_unique_id += candidates.len();
        self.next_raw_id += 1;
        Ok(candidates)
    }

    fn find_abbreviation(&self, words: &[String]) -> Option<usize> {
        let mut matches = words
            .iter()
            .enumerate()
            .filter(|(_, w)| self.dictionary.contains(w))
            .map(|(i, _)| i);
        match self.policy {
            MatchPolicy::Last  => matches.last(),
            MatchPolicy::First => matches.next(),
        }
    }
}
