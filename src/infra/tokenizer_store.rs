// ============================================================
// Layer 6 - Tokenizer Store and Adapter
// ============================================================
// Loads a HuggingFace `tokenizer.json` and wraps it in a
// TokenizerAdapter that implements the domain SubwordTokenizer
// trait. The adapter resolves the special-token ids once at
// load time; a vocabulary without [CLS], [SEP], [PAD] or [UNK]
// is rejected as a configuration error.
//
// The store can also build a word-level vocabulary from a text
// corpus and write it in HuggingFace format. `init-checkpoint`
// uses this so the pipeline can be smoke-tested without a
// pretrained vocabulary.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokenizers::Tokenizer;

use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::traits::{
    SpecialIds, SubwordTokenizer, CLS_TOKEN, PAD_TOKEN, SEP_TOKEN, UNK_TOKEN,
};

const TOKENIZER_FILE: &str = "tokenizer.json";

// Special tokens get fixed IDs matching BERT convention
const SPECIAL_VOCAB: [(&str, u32); 5] = [
    (PAD_TOKEN, 0),
    (UNK_TOKEN, 1),
    (CLS_TOKEN, 101),
    (SEP_TOKEN, 102),
    ("[MASK]", 103),
];
const FIRST_WORD_ID: u32 = 104;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: PathBuf::from(dir.into()) }
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load the tokenizer saved in this store's directory
    pub fn load(&self, do_lower_case: bool) -> Result<TokenizerAdapter> {
        let path = self.tokenizer_path();
        TokenizerAdapter::from_file(&path, do_lower_case)
            .with_context(|| format!("Cannot load tokenizer from '{}'", path.display()))
    }

    /// Count words in `texts`, keep the `vocab_size - 5` most frequent
    /// and write a word-level tokenizer JSON to the store directory.
    pub fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<TokenizerAdapter> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in text.split_whitespace() {
                let w = word.to_lowercase();
                let w = w.trim_matches(|c: char| !c.is_alphanumeric());
                if !w.is_empty() {
                    *freq.entry(w.to_string()).or_insert(0) += 1;
                }
            }
        }

        // Most frequent first; ties broken alphabetically so the same
        // corpus always yields the same ids.
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(SPECIAL_VOCAB.len()));

        let words: Vec<&str> = words.iter().map(|(w, _)| w.as_str()).collect();
        let json = word_level_json(&words);

        let tok_path = self.tokenizer_path();
        std::fs::write(&tok_path, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("Cannot write '{}'", tok_path.display()))?;

        tracing::info!(
            "Tokenizer built with {} words, saved to '{}'",
            words.len(),
            tok_path.display()
        );

        self.load(true)
    }
}

/// HuggingFace tokenizer JSON for a lowercasing word-level model
/// over `words`, with the BERT special tokens at their usual ids.
pub fn word_level_json(words: &[&str]) -> serde_json::Value {
    let mut vocab = serde_json::Map::new();
    for (token, id) in SPECIAL_VOCAB {
        vocab.insert(token.to_string(), serde_json::json!(id));
    }
    let mut next_id = FIRST_WORD_ID;
    for word in words {
        if !vocab.contains_key(*word) {
            vocab.insert(word.to_string(), serde_json::json!(next_id));
            next_id += 1;
        }
    }

    let added_tokens: Vec<serde_json::Value> = SPECIAL_VOCAB
        .iter()
        .map(|(token, id)| serde_json::json!({
            "id": id, "content": token, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        }))
        .collect();

    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": UNK_TOKEN
        }
    })
}

// ─── TokenizerAdapter ─────────────────────────────────────────────────────────
pub struct TokenizerAdapter {
    inner:         Tokenizer,
    special:       SpecialIds,
    do_lower_case: bool,
}

impl TokenizerAdapter {
    pub fn from_file(path: &Path, do_lower_case: bool) -> PipelineResult<Self> {
        let inner = Tokenizer::from_file(path).map_err(|e| {
            PipelineError::config(format!("cannot read tokenizer '{}': {e}", path.display()))
        })?;
        Self::from_tokenizer(inner, do_lower_case)
    }

    pub fn from_json(json: &str, do_lower_case: bool) -> PipelineResult<Self> {
        let inner = Tokenizer::from_str(json)
            .map_err(|e| PipelineError::config(format!("invalid tokenizer JSON: {e}")))?;
        Self::from_tokenizer(inner, do_lower_case)
    }

    pub fn from_tokenizer(inner: Tokenizer, do_lower_case: bool) -> PipelineResult<Self> {
        let id = |token: &str| {
            inner.token_to_id(token).ok_or_else(|| {
                PipelineError::config(format!("tokenizer vocabulary has no '{token}' token"))
            })
        };
        let special = SpecialIds {
            cls: id(CLS_TOKEN)?,
            sep: id(SEP_TOKEN)?,
            pad: id(PAD_TOKEN)?,
            unk: id(UNK_TOKEN)?,
        };
        Ok(Self { inner, special, do_lower_case })
    }

    /// One past the largest id in the vocabulary. Ids need not be
    /// contiguous, so this can exceed the number of entries.
    pub fn id_bound(&self) -> usize {
        self.inner
            .get_vocab(true)
            .values()
            .max()
            .map_or(0, |&max| max as usize + 1)
    }
}

impl SubwordTokenizer for TokenizerAdapter {
    fn tokenize(&self, text: &str) -> PipelineResult<Vec<String>> {
        let lowered;
        let text = if self.do_lower_case {
            lowered = text.to_lowercase();
            lowered.as_str()
        } else {
            text
        };
        let encoding = self.inner.encode(text, false).map_err(|e| PipelineError::Encoding {
            unique_id: None,
            reason:    format!("tokenization failed for '{text}': {e}"),
        })?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn ids_of(&self, tokens: &[String]) -> Vec<u32> {
        tokens
            .iter()
            .map(|t| self.inner.token_to_id(t).unwrap_or(self.special.unk))
            .collect()
    }

    fn special_ids(&self) -> SpecialIds {
        self.special
    }
}

/// Word-level adapter over `words`, for unit tests in other modules.
#[cfg(test)]
pub fn test_adapter(words: &[&str]) -> TokenizerAdapter {
    let json = word_level_json(words).to_string();
    TokenizerAdapter::from_json(&json, false).expect("valid word-level tokenizer")
}
