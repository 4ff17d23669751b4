//! Stage contract shared by the deterministic and provider-backed stages.
//!
//! A run owns one [`PipelineContext`]. Stages read the profile and the ledger so far,
//! then append entries. A stage that fails leaves the ledger untouched and the caller
//! decides whether the failure degrades that stage or sends the run to fallback.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::catalog::PumpModel;
use crate::domain::profile::PreferenceProfile;
use crate::domain::recommendation::{
    ArbitrationVerdict, CatalogInconsistency, ContextRefinement, ExtractedIntent, KeywordHit,
    StageReport,
};
use crate::ledger::{LedgerEntry, ScoreLedger, StageKind};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StageFailure {
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("provider timed out after {timeout_secs}s")]
    ProviderTimeout { timeout_secs: u64 },
    #[error("provider returned a malformed response: {0}")]
    ProviderMalformedResponse(String),
}

impl StageFailure {
    /// Outages are the failures that send a run to fallback when they hit the first call.
    pub fn is_outage(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_) | Self::ProviderTimeout { .. })
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::ProviderTimeout { .. } => "provider_timeout",
            Self::ProviderMalformedResponse(_) => "provider_malformed_response",
        }
    }
}

/// Everything a stage leaves behind besides ledger entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageTrace {
    pub reports: Vec<StageReport>,
    pub intents: Vec<ExtractedIntent>,
    pub context_refinement: Option<ContextRefinement>,
    pub arbitration: Option<ArbitrationVerdict>,
    pub keyword_hits: Vec<KeywordHit>,
    pub discarded: Vec<CatalogInconsistency>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineContext {
    pub profile: PreferenceProfile,
    pub ledger: ScoreLedger,
    pub trace: StageTrace,
}

impl PipelineContext {
    /// Starts a run at the shared baseline.
    pub fn new(profile: PreferenceProfile) -> Self {
        let mut trace = StageTrace::default();
        trace.reports.push(StageReport::applied(StageKind::Baseline, 0));
        Self { profile, ledger: ScoreLedger::default(), trace }
    }

    /// Records a batch computed in full by a stage, returning how many entries landed.
    pub fn record_all(&mut self, entries: Vec<(PumpModel, LedgerEntry)>) -> usize {
        let before = self.ledger.entry_count();
        for (item, entry) in entries {
            self.ledger.record(item, entry);
        }
        self.ledger.entry_count() - before
    }

    pub fn discard(&mut self, stage: StageKind, item: impl Into<String>, delta: i64) {
        self.trace.discarded.push(CatalogInconsistency { stage, item: item.into(), delta });
    }

    /// Runs one stage and records its report. A failure is recorded as degraded and
    /// also returned.
    pub async fn run(&mut self, stage: &dyn Stage) -> Result<StageReport, StageFailure> {
        if let Some(reason) = stage.skip_reason(self) {
            let report = StageReport::skipped(stage.kind(), reason);
            self.trace.reports.push(report.clone());
            return Ok(report);
        }

        match stage.apply(self).await {
            Ok(entries) => {
                let report = StageReport::applied(stage.kind(), entries);
                self.trace.reports.push(report.clone());
                Ok(report)
            }
            Err(failure) => {
                self.trace.reports.push(StageReport::degraded(stage.kind(), failure.to_string()));
                Err(failure)
            }
        }
    }

    pub fn skip(&mut self, stage: StageKind, reason: impl Into<String>) {
        self.trace.reports.push(StageReport::skipped(stage, reason));
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Whether applying this stage contacts the reasoning provider.
    fn calls_provider(&self) -> bool {
        false
    }

    /// Reason this stage has nothing to do for the current context.
    fn skip_reason(&self, _ctx: &PipelineContext) -> Option<&'static str> {
        None
    }

    async fn apply(&self, ctx: &mut PipelineContext) -> Result<usize, StageFailure>;
}
