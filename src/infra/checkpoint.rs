// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores the scoring model with Burn's
// CompactRecorder.
//
// Checkpoint directory layout:
//   checkpoints/
//     model.mpk.gz        ← model weights
//     model_config.json   ← MaskedLmConfig, needed to rebuild
//                           the model before loading weights
//     tokenizer.json      ← written by TokenizerStore
//
// Loading fails if the saved weights do not match the
// architecture described by model_config.json.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::ml::model::{MaskedLmConfig, MaskedLmModel};

const MODEL_FILE:  &str = "model";
const CONFIG_FILE: &str = "model_config.json";

/// Reads and writes model files in one checkpoint directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed. Only writers call this;
    /// a missing directory on load is a configuration error.
    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", self.dir.display()))
    }

    /// Write weights to {dir}/model.mpk.gz (the recorder adds the extension).
    pub fn save_model<B: Backend>(&self, model: &MaskedLmModel<B>) -> Result<()> {
        self.ensure_dir()?;
        let path = self.dir.join(MODEL_FILE);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save model to '{}'", path.display()))?;

        tracing::debug!("Saved model weights to '{}'", path.display());
        Ok(())
    }

    /// Load weights into a freshly initialised model of the same shape.
    pub fn load_model<B: Backend>(
        &self,
        model:  MaskedLmModel<B>,
        device: &B::Device,
    ) -> Result<MaskedLmModel<B>> {
        let path = self.dir.join(MODEL_FILE);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load model weights from '{}'. Run 'init-checkpoint' or point \
                     --checkpoint-dir at an existing checkpoint.",
                    path.display()
                )
            })?;

        tracing::info!("Loaded model weights from '{}'", path.display());
        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &MaskedLmConfig) -> Result<()> {
        self.ensure_dir()?;
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))?;

        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<MaskedLmConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read model config from '{}'", path.display()))?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed model config in '{}'", path.display()))
    }
}
