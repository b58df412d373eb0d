//! End-of-run report: logged, and optionally written as JSON.

use crate::error::Result;
use crate::pipelines::vdjc::feature_correction::FeatureCorrection;
use crate::pipelines::vdjc::stats::{AlignerReport, ChainUsageStats};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub input_files: String,
    pub output_file: String,
    pub command_line: String,
    pub library_id: String,
    /// V feature actually aligned, after correction
    pub v_feature_to_align: String,
    pub v_feature_corrected: bool,
    pub elapsed_seconds: f64,
    pub aligner_report: AlignerReport,
    pub chain_usage: ChainUsageStats,
}

impl RunReport {
    pub fn new(
        library_id: String,
        correction: &FeatureCorrection,
        elapsed: Duration,
        aligner_report: AlignerReport,
        chain_usage: ChainUsageStats,
    ) -> Self {
        let v_feature = if correction.applied {
            &correction.fallback
        } else {
            &correction.original
        };
        Self {
            input_files: String::new(),
            output_file: String::new(),
            command_line: String::new(),
            library_id,
            v_feature_to_align: v_feature.to_string(),
            v_feature_corrected: correction.applied,
            elapsed_seconds: elapsed.as_secs_f64(),
            aligner_report,
            chain_usage,
        }
    }

    /// Attach run provenance for the JSON report
    pub fn with_provenance(
        mut self,
        input_files: impl Into<String>,
        output_file: impl Into<String>,
        command_line: impl Into<String>,
    ) -> Self {
        self.input_files = input_files.into();
        self.output_file = output_file.into();
        self.command_line = command_line.into();
        self
    }

    pub fn log(&self) {
        log::info!("============= Report ==============");
        log::info!("Analysis time: {:.2} sec", self.elapsed_seconds);
        self.aligner_report.log_summary();
        self.chain_usage.log_summary();
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        log::debug!("Report written to {}", path.display());
        Ok(())
    }
}
