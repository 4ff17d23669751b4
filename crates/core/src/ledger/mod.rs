//! Append-only score ledger.
//!
//! Every catalog item starts from the same baseline and accumulates attributed
//! entries. Stages only append; nothing rewrites an earlier entry. Totals are
//! unclamped here, the reported score clamps into `0..=100`.

use serde::{Deserialize, Serialize};

use crate::domain::catalog::{PumpModel, CATALOG};
use crate::domain::profile::{Feature, Slider, SliderBand};

/// Stage 2 prior shared by every item on every request.
pub const BASELINE_SCORE: i32 = 40;

pub const SCORE_FLOOR: i32 = 0;
pub const SCORE_CEILING: i32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Baseline,
    Sliders,
    Features,
    SemanticIntent,
    KeywordScan,
    ContextRefinement,
    Arbitration,
}

impl StageKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Sliders => "sliders",
            Self::Features => "features",
            Self::SemanticIntent => "semantic_intent",
            Self::KeywordScan => "keyword_scan",
            Self::ContextRefinement => "context_refinement",
            Self::Arbitration => "arbitration",
        }
    }
}

/// What produced a ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntrySource {
    Slider { slider: Slider, band: SliderBand },
    Feature { feature: Feature },
    Intent { label: String },
    Keyword { keyword: String },
    ContextRefinement,
    Arbitration,
}

impl EntrySource {
    pub const fn stage(&self) -> StageKind {
        match self {
            Self::Slider { .. } => StageKind::Sliders,
            Self::Feature { .. } => StageKind::Features,
            Self::Intent { .. } => StageKind::SemanticIntent,
            Self::Keyword { .. } => StageKind::KeywordScan,
            Self::ContextRefinement => StageKind::ContextRefinement,
            Self::Arbitration => StageKind::Arbitration,
        }
    }

    /// Short label used when summarising the drivers of a result.
    pub fn factor_label(&self) -> String {
        match self {
            Self::Slider { slider, band } => format!("{}: {}", slider.label(), band.label()),
            Self::Feature { feature } => format!("Must-have: {}", feature.label()),
            Self::Intent { label } => format!("In your words: {label}"),
            Self::Keyword { keyword } => format!("Mentioned: {keyword}"),
            Self::ContextRefinement => "Follow-up answers".to_string(),
            Self::Arbitration => "Final holistic review".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub stage: StageKind,
    pub source: EntrySource,
    pub delta: i32,
    pub reason: String,
}

impl LedgerEntry {
    pub fn new(source: EntrySource, delta: i32, reason: impl Into<String>) -> Self {
        Self { stage: source.stage(), source, delta, reason: reason.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLedger {
    pub item: PumpModel,
    pub baseline: i32,
    entries: Vec<LedgerEntry>,
}

impl ItemLedger {
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn raw_total(&self) -> i32 {
        self.entries.iter().fold(self.baseline, |total, entry| total.saturating_add(entry.delta))
    }

    pub fn score(&self) -> i32 {
        clamp_score(self.raw_total())
    }

    pub fn stage_total(&self, stage: StageKind) -> i32 {
        self.entries.iter().filter(|entry| entry.stage == stage).map(|entry| entry.delta).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLedger {
    items: Vec<ItemLedger>,
}

impl Default for ScoreLedger {
    fn default() -> Self {
        Self::with_baseline(BASELINE_SCORE)
    }
}

impl ScoreLedger {
    /// Baseline initializer: one line per catalog item, all at the same prior.
    pub fn with_baseline(baseline: i32) -> Self {
        Self {
            items: CATALOG
                .iter()
                .map(|item| ItemLedger { item: *item, baseline, entries: Vec::new() })
                .collect(),
        }
    }

    pub fn record(&mut self, item: PumpModel, entry: LedgerEntry) {
        if entry.delta == 0 {
            return;
        }
        if let Some(line) = self.items.get_mut(item.catalog_index()) {
            line.entries.push(entry);
        }
    }

    pub fn line(&self, item: PumpModel) -> Option<&ItemLedger> {
        self.items.get(item.catalog_index())
    }

    pub fn lines(&self) -> &[ItemLedger] {
        &self.items
    }

    pub fn raw_total(&self, item: PumpModel) -> i32 {
        self.line(item).map(ItemLedger::raw_total).unwrap_or(BASELINE_SCORE)
    }

    pub fn score(&self, item: PumpModel) -> i32 {
        clamp_score(self.raw_total(item))
    }

    pub fn entry_count(&self) -> usize {
        self.items.iter().map(|line| line.entries.len()).sum()
    }

    /// Items ordered by unclamped total, catalog order breaking ties.
    pub fn leaders(&self, count: usize) -> Vec<PumpModel> {
        let mut ordered =
            self.items.iter().map(|line| (line.item, line.raw_total())).collect::<Vec<_>>();
        ordered.sort_by(|left, right| right.1.cmp(&left.1));
        ordered.into_iter().take(count).map(|(item, _)| item).collect()
    }
}

pub fn clamp_score(total: i32) -> i32 {
    total.clamp(SCORE_FLOOR, SCORE_CEILING)
}
