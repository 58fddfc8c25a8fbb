// ============================================================
// Layer 2 - ScoreUseCase
// ============================================================
// Runs the full scoring pipeline:
//
//   Step 1: Load the abbreviation dictionary   (Layer 4 - data)
//   Step 2: Load the tokenizer                 (Layer 6 - infra)
//   Step 3: Load the scoring model             (Layer 5 - ml)
//   Step 4: Generate candidates from the input (Layer 4 - data)
//   Step 5: Encode every candidate             (Layer 4 - data)
//   Step 6: Score in batches and stream JSONL  (Layer 2 + 4)
//
// Steps 4-6 live in `run_pipeline`, which only needs the two
// domain traits, so tests drive it with in-memory input and a
// fake scorer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use crate::application::orchestrator::ScoringOrchestrator;
use crate::data::{
    dictionary::AbbreviationDictionary,
    encoder::FeatureEncoder,
    generator::{CandidateGenerator, MatchPolicy},
    writer::ResultWriter,
};
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::traits::{Scorer, SubwordTokenizer};
use crate::infra::{
    checkpoint::CheckpointManager,
    tokenizer_store::{TokenizerAdapter, TokenizerStore},
};
use crate::ml::{
    scorer::{BurnScorer, LossGranularity},
    ScoreBackend,
};

// ─── Scoring Configuration ───────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub input_file:     String,
    pub dict_file:      String,
    pub output_file:    String,
    /// tokenizer.json to use; defaults to the one in checkpoint_dir
    pub tokenizer_file: Option<String>,
    pub checkpoint_dir: String,
    pub max_seq_length: usize,
    pub batch_size:     usize,
    pub do_lower_case:  bool,
    pub match_policy:   MatchPolicy,
    /// Report one token-weighted loss per batch instead of per candidate
    pub batch_loss:     bool,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            input_file:     "input.txt".to_string(),
            dict_file:      "abbreviations.json".to_string(),
            output_file:    "scores.jsonl".to_string(),
            tokenizer_file: None,
            checkpoint_dir: "checkpoints".to_string(),
            max_seq_length: 128,
            batch_size:     1,
            do_lower_case:  false,
            match_policy:   MatchPolicy::Last,
            batch_loss:     false,
        }
    }
}

impl ScoreConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_seq_length < 3 {
            return Err(PipelineError::config(format!(
                "max_seq_length must be at least 3, got {}",
                self.max_seq_length
            )));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::config("batch_size must be at least 1"));
        }
        Ok(())
    }

    pub fn granularity(&self) -> LossGranularity {
        if self.batch_loss {
            LossGranularity::Batch
        } else {
            LossGranularity::PerExample
        }
    }
}

/// Dictionary and tokenizer named by `cfg`. Shared with `encode`.
pub(crate) fn load_resources(cfg: &ScoreConfig) -> Result<(AbbreviationDictionary, TokenizerAdapter)> {
    let dictionary = AbbreviationDictionary::load(Path::new(&cfg.dict_file))
        .with_context(|| format!("Cannot load dictionary '{}'", cfg.dict_file))?;

    let tokenizer = match &cfg.tokenizer_file {
        Some(path) => TokenizerAdapter::from_file(Path::new(path), cfg.do_lower_case)
            .with_context(|| format!("Cannot load tokenizer '{path}'"))?,
        None => TokenizerStore::new(cfg.checkpoint_dir.clone()).load(cfg.do_lower_case)?,
    };

    Ok((dictionary, tokenizer))
}

pub(crate) fn open_input(path: &str) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Cannot open input file '{path}'"))?;
    Ok(BufReader::new(file))
}

pub(crate) fn create_output(path: &str) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Cannot create output file '{path}'"))?;
    Ok(BufWriter::new(file))
}

// ─── Pipeline ────────────────────────────────────────────────────────────────
/// Generate, encode and score every candidate in `input`, writing
/// one JSON line per candidate to `output`. Returns the number of
/// records written.
pub fn run_pipeline<T, S, R, W>(
    dictionary: &AbbreviationDictionary,
    tokenizer:  &T,
    scorer:     &S,
    cfg:        &ScoreConfig,
    input:      R,
    output:     W,
) -> PipelineResult<usize>
where
    T: SubwordTokenizer,
    S: Scorer + ?Sized,
    R: BufRead,
    W: Write,
{
    cfg.validate()?;

    let mut generator = CandidateGenerator::new(dictionary, tokenizer, cfg.match_policy);
    let candidates = generator.generate_all(input)?;

    let encoder  = FeatureEncoder::new(tokenizer, cfg.max_seq_length)?;
    let features = encoder.encode_all(&candidates)?;

    let mut writer = ResultWriter::new(output);
    ScoringOrchestrator::new(scorer, cfg.batch_size)?.run(&candidates, &features, &mut writer)?;
    writer.flush()?;

    Ok(writer.written())
}

// ─── ScoreUseCase ─────────────────────────────────────────────────────────────
pub struct ScoreUseCase {
    config: ScoreConfig,
}

impl ScoreUseCase {
    pub fn new(config: ScoreConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<usize> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Steps 1-2: dictionary and tokenizer ──────────────────────────────
        let (dictionary, tokenizer) = load_resources(cfg)?;

        // ── Step 3: model ────────────────────────────────────────────────────
        let sentinel = tokenizer.special_ids().pad;
        let scorer = BurnScorer::<ScoreBackend>::from_checkpoint(
            &CheckpointManager::new(&cfg.checkpoint_dir),
            Default::default(),
            sentinel,
            cfg.granularity(),
        )?;
        let model_len = scorer.model_config().max_seq_len;
        if cfg.max_seq_length > model_len {
            return Err(PipelineError::config(format!(
                "max_seq_length {} exceeds the model's max_seq_len {model_len}",
                cfg.max_seq_length
            ))
            .into());
        }

        // ── Steps 4-6: generate, encode, score ───────────────────────────────
        let input  = open_input(&cfg.input_file)?;
        let output = create_output(&cfg.output_file)?;
        let written = run_pipeline(&dictionary, &tokenizer, &scorer, cfg, input, output)
            .with_context(|| format!("Scoring '{}' failed", cfg.input_file))?;

        tracing::info!("Wrote {} results to '{}'", written, cfg.output_file);
        Ok(written)
    }
}
