//! Output of one pipeline run and the audit trail that explains it.
//!
//! Nothing here carries a timestamp or a random identifier, so two runs of the
//! deterministic path over the same profile serialize to identical bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::catalog::PumpModel;
use crate::ledger::{ItemLedger, LedgerEntry, StageKind};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub overall_top: RankedChoice,
    pub alternatives: Vec<RankedChoice>,
    pub key_factors: Vec<String>,
    pub personalized_insights: String,
    pub ai_assisted: bool,
    pub debug: AuditTrail,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedChoice {
    pub id: PumpModel,
    pub name: String,
    pub score: i32,
    pub reasons: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrail {
    pub stages: Vec<StageReport>,
    pub intents: Vec<ExtractedIntent>,
    pub context_refinement: Option<ContextRefinement>,
    pub arbitration: Option<ArbitrationVerdict>,
    pub keyword_hits: Vec<KeywordHit>,
    pub discarded: Vec<CatalogInconsistency>,
    pub fallback_reason: Option<String>,
    pub ledger: Vec<ItemBreakdown>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub stage: StageKind,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Applied { entries: usize },
    Skipped { reason: String },
    Degraded { failure: String },
}

impl StageReport {
    pub fn applied(stage: StageKind, entries: usize) -> Self {
        Self { stage, outcome: StageOutcome::Applied { entries } }
    }

    pub fn skipped(stage: StageKind, reason: impl Into<String>) -> Self {
        Self { stage, outcome: StageOutcome::Skipped { reason: reason.into() } }
    }

    pub fn degraded(stage: StageKind, failure: impl Into<String>) -> Self {
        Self { stage, outcome: StageOutcome::Degraded { failure: failure.into() } }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, StageOutcome::Applied { .. })
    }
}

/// One intent the semantic stage read out of the narrative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIntent {
    pub label: String,
    /// Provider-reported confidence in `0.0..=1.0`.
    pub confidence: f64,
    /// Deltas actually recorded after confidence weighting and ceilings.
    pub deltas: BTreeMap<PumpModel, i32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRefinement {
    pub candidates: Vec<PumpModel>,
    pub deltas: BTreeMap<PumpModel, i32>,
    pub justification: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrationVerdict {
    pub top_choice: PumpModel,
    /// Leader by raw total before the boost was applied.
    pub previous_leader: PumpModel,
    pub boost: i32,
    pub reasons: Vec<String>,
    pub insight: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordHit {
    pub rule: String,
    pub matched: String,
}

/// A delta some stage produced for a key outside the catalog. Discarded, never scored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogInconsistency {
    pub stage: StageKind,
    pub item: String,
    pub delta: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBreakdown {
    pub item: PumpModel,
    pub baseline: i32,
    pub entries: Vec<LedgerEntry>,
    pub raw_total: i32,
    pub score: i32,
}

impl From<&ItemLedger> for ItemBreakdown {
    fn from(line: &ItemLedger) -> Self {
        Self {
            item: line.item,
            baseline: line.baseline,
            entries: line.entries().to_vec(),
            raw_total: line.raw_total(),
            score: line.score(),
        }
    }
}

impl Recommendation {
    /// Every scored item, top choice first.
    pub fn ranked(&self) -> impl Iterator<Item = &RankedChoice> {
        std::iter::once(&self.overall_top).chain(self.alternatives.iter())
    }

    pub fn score_of(&self, item: PumpModel) -> Option<i32> {
        self.debug.ledger.iter().find(|line| line.item == item).map(|line| line.score)
    }
}
