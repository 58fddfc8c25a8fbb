// ============================================================
// Layer 2 - EncodeUseCase
// ============================================================
// Candidate generation and feature encoding without a model.
// Each feature is written as one JSON line together with the
// tokens it was built from, for inspecting what the scorer
// would see:
//
//   {"unique_id":0,"raw_id":0,"tokens":["[CLS]","the","pt",...],
//    "input_ids":[...],"target_ids":[...],"input_mask":[...],"segment_ids":[...]}

use anyhow::{Context, Result};
use std::io::{BufRead, Write};

use crate::application::score_use_case::{create_output, load_resources, open_input, ScoreConfig};
use crate::data::{
    dictionary::AbbreviationDictionary,
    encoder::FeatureEncoder,
    generator::CandidateGenerator,
    writer::FeatureDumpWriter,
};
use crate::domain::error::PipelineResult;
use crate::domain::traits::SubwordTokenizer;

/// Encode every candidate in `input` and dump the features to
/// `output`. Returns the number of features written.
pub fn encode_pipeline<T, R, W>(
    dictionary: &AbbreviationDictionary,
    tokenizer:  &T,
    cfg:        &ScoreConfig,
    input:      R,
    output:     W,
) -> PipelineResult<usize>
where
    T: SubwordTokenizer,
    R: BufRead,
    W: Write,
{
    let mut generator = CandidateGenerator::new(dictionary, tokenizer, cfg.match_policy);
    let candidates = generator.generate_all(input)?;
    let encoder = FeatureEncoder::new(tokenizer, cfg.max_seq_length)?;

    let mut writer = FeatureDumpWriter::new(output);
    for candidate in &candidates {
        let (feature, tokens) = encoder.encode_with_tokens(candidate, None)?;
        writer.write(&feature, &tokens)?;
    }
    writer.flush()?;

    tracing::info!(
        "Encoded {} candidates from {} input lines",
        candidates.len(),
        generator.lines_read()
    );
    Ok(candidates.len())
}

pub struct EncodeUseCase {
    config: ScoreConfig,
}

impl EncodeUseCase {
    pub fn new(config: ScoreConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<usize> {
        let cfg = &self.config;
        cfg.validate()?;

        let (dictionary, tokenizer) = load_resources(cfg)?;
        let input  = open_input(&cfg.input_file)?;
        let output = create_output(&cfg.output_file)?;

        let written = encode_pipeline(&dictionary, &tokenizer, cfg, input, output)
            .with_context(|| format!("Encoding '{}' failed", cfg.input_file))?;

        tracing::info!("Wrote {} features to '{}'", written, cfg.output_file);
        Ok(written)
    }
}
