//! Fallback substitute for the semantic stage: a literal keyword scan.
//!
//! Each rule fires at most once per narrative. Per item, the running total of the
//! scan never leaves `-KEYWORD_CEILING..=KEYWORD_CEILING`.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::catalog::PumpModel;
use crate::domain::profile::PreferenceProfile;
use crate::domain::recommendation::KeywordHit;
use crate::ledger::{EntrySource, LedgerEntry, StageKind};
use crate::pipeline::{PipelineContext, Stage, StageFailure};
use crate::scoring::ItemDeltas;

pub const KEYWORD_CEILING: i32 = 10;

#[derive(Clone, Copy, Debug)]
pub struct KeywordRule {
    pub label: &'static str,
    /// Whole words or space-separated phrases, lowercase.
    pub terms: &'static [&'static str],
    pub deltas: ItemDeltas,
    pub reason: &'static str,
}

// Columns: 780G, t:slim X2, Mobi, Omnipod 5, iLet, twiist.
pub const KEYWORD_RULES: [KeywordRule; 9] = [
    KeywordRule {
        label: "water",
        terms: &["swim", "swims", "swimming", "swimmer", "water", "pool", "beach", "surf", "surfing"],
        deltas: ItemDeltas::new([2, -2, 2, 6, 0, 0]),
        reason: "You mentioned time in the water",
    },
    KeywordRule {
        label: "tubing",
        terms: &["tubeless", "tube", "tubes", "tubing"],
        deltas: ItemDeltas::new([0, 0, 0, 8, 0, 0]),
        reason: "You mentioned tubing",
    },
    KeywordRule {
        label: "size",
        terms: &["small", "smaller", "smallest", "tiny", "discreet", "discreetly"],
        deltas: ItemDeltas::new([0, 0, 6, 3, 0, 3]),
        reason: "You mentioned wanting something small or discreet",
    },
    KeywordRule {
        label: "carb counting",
        terms: &["carb", "carbs", "hands-off", "hands off", "simple", "simpler"],
        deltas: ItemDeltas::new([0, 0, 0, 0, 8, 0]),
        reason: "You mentioned wanting less carb counting or a simpler routine",
    },
    KeywordRule {
        label: "watch",
        terms: &["watch", "smartwatch"],
        deltas: ItemDeltas::new([0, 0, 0, 0, 0, 8]),
        reason: "You mentioned using a watch",
    },
    KeywordRule {
        label: "touchscreen",
        terms: &["touchscreen", "touch screen"],
        deltas: ItemDeltas::new([0, 6, 0, 0, 0, 0]),
        reason: "You mentioned a touchscreen",
    },
    KeywordRule {
        label: "phone",
        terms: &["phone", "smartphone", "iphone", "app"],
        deltas: ItemDeltas::new([0, 3, 4, 3, 0, 3]),
        reason: "You mentioned controlling it from your phone",
    },
    KeywordRule {
        label: "tight control",
        terms: &["tight control", "aggressive", "a1c", "time in range"],
        deltas: ItemDeltas::new([6, 0, 0, 0, 0, 0]),
        reason: "You mentioned tight glucose control",
    },
    KeywordRule {
        label: "batteries",
        terms: &["battery", "batteries", "aa"],
        deltas: ItemDeltas::new([4, 0, 0, 0, 0, 0]),
        reason: "You mentioned batteries",
    },
];

/// Result of scanning one narrative.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeywordScan {
    pub hits: Vec<KeywordHit>,
    pub entries: Vec<(PumpModel, LedgerEntry)>,
}

/// Pure function of the narrative and [`KEYWORD_RULES`].
pub fn keyword_scan(profile: &PreferenceProfile) -> KeywordScan {
    let haystack = normalize(profile.narrative());
    if haystack.trim().is_empty() {
        return KeywordScan::default();
    }

    let mut scan = KeywordScan::default();
    let mut running = BTreeMap::<PumpModel, i32>::new();

    for rule in &KEYWORD_RULES {
        let Some(term) = rule.terms.iter().find(|term| haystack.contains(&format!(" {term} ")))
        else {
            continue;
        };
        scan.hits.push(KeywordHit { rule: rule.label.to_string(), matched: (*term).to_string() });

        for (item, delta) in rule.deltas.non_zero() {
            let total = running.entry(item).or_insert(0);
            let capped = (*total + delta).clamp(-KEYWORD_CEILING, KEYWORD_CEILING) - *total;
            if capped == 0 {
                continue;
            }
            *total += capped;
            scan.entries.push((
                item,
                LedgerEntry::new(
                    EntrySource::Keyword { keyword: (*term).to_string() },
                    capped,
                    rule.reason,
                ),
            ));
        }
    }

    scan
}

/// Lowercase words separated by single spaces, padded so every word is bounded by spaces.
fn normalize(narrative: &str) -> String {
    let lowered = narrative.to_lowercase();
    let words = lowered
        .split(|character: char| !(character.is_alphanumeric() || character == '-'))
        .map(|word| word.trim_matches('-'))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>();
    format!(" {} ", words.join(" "))
}

#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordScanStage;

#[async_trait]
impl Stage for KeywordScanStage {
    fn kind(&self) -> StageKind {
        StageKind::KeywordScan
    }

    fn skip_reason(&self, ctx: &PipelineContext) -> Option<&'static str> {
        ctx.profile.narrative().is_empty().then_some("empty narrative")
    }

    async fn apply(&self, ctx: &mut PipelineContext) -> Result<usize, StageFailure> {
        let scan = keyword_scan(&ctx.profile);
        ctx.trace.keyword_hits.extend(scan.hits);
        Ok(ctx.record_all(scan.entries))
    }
}
