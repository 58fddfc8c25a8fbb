// ============================================================
// Layer 4 - Result Writer
// ============================================================
// Streams one JSON object per line:
//
//   {"index":0,"sent_id":0,"text":"the pt was stable","expansion":"pt","loss":3.21}
//
// Records are written as soon as their batch is scored. The
// writer is sequence-aware: an `index` that does not increase
// is an internal error, never silently reordered.
//
// FeatureDumpWriter serves the `encode` subcommand, writing the
// encoded features instead of scores.

use serde::Serialize;
use std::io::Write;

use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::feature::Feature;
use crate::domain::result::ScoredResult;

pub struct ResultWriter<W: Write> {
    out:        W,
    last_index: Option<usize>,
    written:    usize,
}

impl<W: Write> ResultWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, last_index: None, written: 0 }
    }

    pub fn write(&mut self, result: &ScoredResult) -> PipelineResult<()> {
        if let Some(last) = self.last_index {
            if result.unique_id <= last {
                return Err(PipelineError::encoding(result.unique_id, format!(
                    "result written out of order (previous index {last})"
                )));
            }
        }
        write_json_line(&mut self.out, result)?;
        self.last_index = Some(result.unique_id);
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> PipelineResult<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[derive(Serialize)]
struct FeatureRecord<'a> {
    unique_id:   usize,
    raw_id:      usize,
    tokens:      &'a [String],
    input_ids:   &'a [u32],
    target_ids:  &'a [u32],
    input_mask:  &'a [u32],
    segment_ids: &'a [u32],
}

pub struct FeatureDumpWriter<W: Write> {
    out: W,
}

impl<W: Write> FeatureDumpWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write(&mut self, feature: &Feature, tokens: &[String]) -> PipelineResult<()> {
        let record = FeatureRecord {
            unique_id:   feature.unique_id,
            raw_id:      feature.raw_id,
            tokens,
            input_ids:   &feature.input_ids,
            target_ids:  &feature.target_ids,
            input_mask:  &feature.input_mask,
            segment_ids: &feature.segment_ids,
        };
        write_json_line(&mut self.out, &record)
    }

    pub fn flush(&mut self) -> PipelineResult<()> {
        self.out.flush()?;
        Ok(())
    }
}

fn write_json_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> PipelineResult<()> {
    serde_json::to_writer(&mut *out, value).map_err(std::io::Error::from)?;
    out.write_all(b"\n")?;
    Ok(())
}
