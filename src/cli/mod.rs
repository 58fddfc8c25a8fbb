// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands a config to the matching
// use case in Layer 2. Nothing here touches files or models.
//
//   1. `score`           - write one loss per candidate
//   2. `encode`          - write the encoded features
//   3. `init-checkpoint` - write a random-init model and tokenizer

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InitArgs, PipelineArgs, ScoreArgs};

#[derive(Parser, Debug)]
#[command(
    name = "abbr-ppl",
    version = "0.1.0",
    about = "Score abbreviation expansions in context with a masked language model."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Score(args)          => run_score(args),
            Commands::Encode(args)         => run_encode(args),
            Commands::InitCheckpoint(args) => run_init(args),
        }
    }
}

fn run_score(args: ScoreArgs) -> Result<()> {
    use crate::application::score_use_case::ScoreUseCase;

    let output = args.pipeline.output_file.clone();
    let written = ScoreUseCase::new(args.into()).execute()?;

    println!("Scored {written} candidates → {output}");
    Ok(())
}

fn run_encode(args: PipelineArgs) -> Result<()> {
    use crate::application::encode_use_case::EncodeUseCase;

    let output = args.output_file.clone();
    let written = EncodeUseCase::new(args.into()).execute()?;

    println!("Encoded {written} candidates → {output}");
    Ok(())
}

fn run_init(args: InitArgs) -> Result<()> {
    use crate::application::init_use_case::InitUseCase;

    let dir = args.checkpoint_dir.clone();
    let model = InitUseCase::new(args.into()).execute()?;

    println!("Checkpoint written to {dir} (vocab size {})", model.vocab_size);
    Ok(())
}
