use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::boundaries;
use crate::config::AnalysisConfig;
use crate::image::{FirmwareImage, KflashHeader};
use crate::model::{FunctionSummary, SignatureMatch, SymbolReference};
use crate::params::{self, ParamMap};
use crate::services::backends::DisassemblyBackend;
use crate::services::disasm::{analyze_range, RangeAnalysis};
use crate::signatures::{self, SignatureCatalog};
use crate::strings::{self, CrossReferenceIndex};

pub use crate::services::disasm::RangeFailure;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to start analysis workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Non-fatal problems collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub skipped_ranges: usize,
    /// Runs dropped by either string pass because they did not decode.
    pub failed_decodes: usize,
    pub unparsed_lines: usize,
    pub failures: Vec<RangeFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<KflashHeader>,
    /// First offset of each configured key string that occurs.
    pub landmarks: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Everything a run produces; serialized as the persisted report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub image: ImageSummary,
    /// Report strings keyed by offset.
    pub strings: BTreeMap<u64, String>,
    pub matches: Vec<SignatureMatch>,
    pub functions: Vec<FunctionSummary>,
    pub parameters: ParamMap,
    pub symbol_references: Vec<SymbolReference>,
    pub backend: BackendInfo,
    pub diagnostics: Diagnostics,
}

impl AnalysisReport {
    /// Function whose range contains `offset`.
    pub fn function_at(&self, offset: u64) -> Option<&FunctionSummary> {
        self.functions.iter().find(|f| f.range().contains(offset))
    }
}

/// One run over one image. Borrowed inputs are read-only for the whole run.
pub struct AnalysisSession<'a> {
    pub image: &'a FirmwareImage,
    pub config: &'a AnalysisConfig,
    pub catalog: &'a SignatureCatalog,
    pub backend: &'a dyn DisassemblyBackend,
    /// Keep per-instruction records in the report.
    pub keep_instructions: bool,
}

impl<'a> AnalysisSession<'a> {
    pub fn new(
        image: &'a FirmwareImage,
        config: &'a AnalysisConfig,
        catalog: &'a SignatureCatalog,
        backend: &'a dyn DisassemblyBackend,
    ) -> Self {
        Self { image, config, catalog, backend, keep_instructions: false }
    }

    pub fn run(&self) -> Result<AnalysisReport, AnalysisError> {
        let bytes = self.image.bytes();
        let config = self.config;

        let image = ImageSummary {
            path: self.image.path().map(|p| p.display().to_string()),
            size: bytes.len() as u64,
            header: self.image.header(),
            landmarks: self.image.landmarks(&config.landmarks),
        };

        let report_strings = strings::extract(bytes, &config.report_strings);
        let index_strings = strings::extract(bytes, &config.index_strings);
        tracing::info!(
            report = report_strings.len(),
            indexed = index_strings.len(),
            "string extraction done"
        );
        let index = CrossReferenceIndex::build(&index_strings.records);

        let matches = signatures::match_all(&self.catalog.signatures, &index, &config.matching);
        let symbol_references = signatures::scan_symbol_references(bytes, &config.symbol_patterns);
        let candidates = boundaries::find_candidates(bytes, &config.boundaries);

        let pool = rayon::ThreadPoolBuilder::new().num_threads(config.effective_workers()).build()?;
        let outcomes: Vec<Result<RangeAnalysis, RangeFailure>> = pool.install(|| {
            candidates
                .par_iter()
                .map(|range| analyze_range(range, self.image, self.backend, &index, &config.disasm))
                .collect()
        });

        let mut diagnostics = Diagnostics {
            failed_decodes: report_strings.decode_failures + index_strings.decode_failures,
            ..Diagnostics::default()
        };
        let mut functions = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(analysis) => {
                    diagnostics.unparsed_lines += analysis.unparsed_lines;
                    functions.push(analysis.summary);
                }
                Err(failure) => {
                    tracing::warn!(
                        start = failure.start,
                        end = failure.end,
                        reason = %failure.reason,
                        "skipping range"
                    );
                    diagnostics.skipped_ranges += 1;
                    diagnostics.failures.push(failure);
                }
            }
        }
        functions.sort_by_key(|f| f.start);
        name_from_matches(&mut functions, &matches);
        if !self.keep_instructions {
            functions.iter_mut().for_each(|f| f.instructions.clear());
        }
        tracing::info!(
            candidates = candidates.len(),
            functions = functions.len(),
            skipped = diagnostics.skipped_ranges,
            "range analysis done"
        );

        let parameters = params::extract(bytes, &config.params);

        Ok(AnalysisReport {
            image,
            strings: report_strings.records.into_iter().map(|r| (r.start_offset, r.text)).collect(),
            matches,
            functions,
            parameters,
            symbol_references,
            backend: BackendInfo { name: self.backend.name().to_string(), version: self.backend.version() },
            diagnostics,
        })
    }
}

/// Rename functions that contain a match's offset after the most confident
/// such match. Ties keep the earlier match.
pub fn name_from_matches(functions: &mut [FunctionSummary], matches: &[SignatureMatch]) {
    for function in functions {
        let range = function.range();
        let best = matches
            .iter()
            .filter(|m| range.contains(m.candidate_offset))
            .reduce(|best, m| if m.confidence > best.confidence { m } else { best });
        if let Some(m) = best {
            function.name = m.signature_name.clone();
        }
    }
}
