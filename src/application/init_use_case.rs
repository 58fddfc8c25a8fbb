// ============================================================
// Layer 2 - InitUseCase
// ============================================================
// Writes a complete, randomly initialised checkpoint so the
// scoring pipeline can run end to end without trained weights:
//
//   Step 1: Collect text from the input file and the dictionary
//   Step 2: Build a word-level tokenizer over it   (Layer 6)
//   Step 3: Size the model to the tokenizer        (Layer 5)
//   Step 4: Save model_config.json and weights     (Layer 6)
//
// Scores from such a checkpoint are well-formed but carry no
// linguistic signal.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::dictionary::AbbreviationDictionary;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::{
    model::{MaskedLmConfig, MaskedLmModel},
    ScoreBackend,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    pub input_file:     String,
    pub dict_file:      String,
    pub checkpoint_dir: String,
    pub max_seq_len:    usize,
    pub vocab_size:     usize,
    pub d_model:        usize,
    pub num_heads:      usize,
    pub num_layers:     usize,
    pub d_ff:           usize,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            input_file:     "input.txt".to_string(),
            dict_file:      "abbreviations.json".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            max_seq_len:    128,
            vocab_size:     30522,
            d_model:        128,
            num_heads:      4,
            num_layers:     2,
            d_ff:           512,
        }
    }
}

pub struct InitUseCase {
    config: InitConfig,
}

impl InitUseCase {
    pub fn new(config: InitConfig) -> Self {
        Self { config }
    }

    /// Returns the model configuration that was written.
    pub fn execute(&self) -> Result<MaskedLmConfig> {
        let cfg = &self.config;
        if cfg.num_heads == 0 || cfg.d_model % cfg.num_heads != 0 {
            bail!("d_model ({}) must be divisible by num_heads ({})", cfg.d_model, cfg.num_heads);
        }
        if cfg.max_seq_len < 3 {
            bail!("max_seq_len must be at least 3, got {}", cfg.max_seq_len);
        }

        // ── Step 1: corpus ───────────────────────────────────────────────────
        let corpus = std::fs::read_to_string(&cfg.input_file)
            .with_context(|| format!("Cannot read input file '{}'", cfg.input_file))?;
        let dictionary = AbbreviationDictionary::load(Path::new(&cfg.dict_file))?;

        let mut texts: Vec<String> = corpus.lines().map(String::from).collect();
        texts.extend(dictionary.surface_texts().map(String::from));

        // ── Step 2: tokenizer ────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(cfg.checkpoint_dir.clone())
            .build_and_save(&texts, cfg.vocab_size)?;

        // ── Step 3: model sized to the vocabulary ────────────────────────────
        let model_config = MaskedLmConfig::new(
            tokenizer.id_bound(),
            cfg.max_seq_len,
            cfg.d_model,
            cfg.num_heads,
            cfg.num_layers,
            cfg.d_ff,
        );
        let device = Default::default();
        let model: MaskedLmModel<ScoreBackend> = model_config.init(&device);

        // ── Step 4: save ─────────────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt.save_config(&model_config)?;
        ckpt.save_model(&model)?;

        tracing::info!(
            "Initialised checkpoint in '{}' (vocab={}, {} layers, d_model={})",
            ckpt.dir().display(),
            model_config.vocab_size,
            model_config.num_layers,
            model_config.d_model
        );
        Ok(model_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::score_use_case::{ScoreConfig, ScoreUseCase};

    fn small(dir: &Path) -> InitConfig {
        let path = |name: &str| dir.join(name).display().to_string();
        std::fs::write(path("in.txt"), "the pt was stable\nthe bp dropped\n").unwrap();
        std::fs::write(
            path("dict.json"),
            r#"{"pt": ["patient", "physical therapy"], "bp": ["blood pressure"]}"#,
        )
        .unwrap();
        InitConfig {
            input_file:     path("in.txt"),
            dict_file:      path("dict.json"),
            checkpoint_dir: path("ckpt"),
            max_seq_len:    16,
            vocab_size:     100,
            d_model:        16,
            num_heads:      2,
            num_layers:     1,
            d_ff:           32,
        }
    }

    #[test]
    fn test_vocabulary_covers_input_and_expansions() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = small(dir.path());
        let model_config = InitUseCase::new(cfg.clone()).execute().unwrap();

        // 5 specials + 11 distinct words; ids start at 104
        assert_eq!(model_config.vocab_size, 104 + 11);
        assert!(Path::new(&cfg.checkpoint_dir).join("tokenizer.json").exists());
        assert!(Path::new(&cfg.checkpoint_dir).join("model_config.json").exists());
    }

    #[test]
    fn test_rejects_heads_that_do_not_divide_d_model() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = InitConfig { num_heads: 3, ..small(dir.path()) };
        assert!(InitUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_initialised_checkpoint_scores_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let init = small(dir.path());
        InitUseCase::new(init.clone()).execute().unwrap();

        let output = dir.path().join("scores.jsonl").display().to_string();
        let score = ScoreConfig {
            input_file:     init.input_file.clone(),
            dict_file:      init.dict_file.clone(),
            output_file:    output.clone(),
            checkpoint_dir: init.checkpoint_dir.clone(),
            max_seq_length: 16,
            batch_size:     2,
            ..Default::default()
        };
        assert_eq!(ScoreUseCase::new(score).execute().unwrap(), 5);

        let text = std::fs::read_to_string(output).unwrap();
        for line in text.lines() {
            let record: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(record["loss"].as_f64().unwrap().is_finite());
        }
    }

    #[test]
    fn test_score_rejects_sequences_longer_than_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let init = small(dir.path());
        InitUseCase::new(init.clone()).execute().unwrap();

        let score = ScoreConfig {
            input_file:     init.input_file.clone(),
            dict_file:      init.dict_file.clone(),
            output_file:    dir.path().join("out.jsonl").display().to_string(),
            checkpoint_dir: init.checkpoint_dir.clone(),
            max_seq_length: 32,
            ..Default::default()
        };
        let err = ScoreUseCase::new(score).execute().unwrap_err();
        assert!(err.to_string().contains("max_seq_len"));
    }
}
