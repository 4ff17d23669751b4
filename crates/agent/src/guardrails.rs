//! Bounds on what provider replies may do to the ledger.
//!
//! The provider proposes, the guardrails decide. Keys outside the catalog are
//! discarded, magnitudes are capped per intent and per stage, context refinement
//! only touches the leading candidates, and arbitration gets exactly one fixed boost.

use std::collections::BTreeMap;

use pumpfit_core::{PumpModel, StageKind};
use serde::Deserialize;

pub const MAX_INTENT_DELTA: i32 = 15;
pub const SEMANTIC_CEILING: i32 = 25;
pub const CONTEXT_CEILING: i32 = 10;
pub const CONTEXT_CANDIDATES: usize = 3;
pub const ARBITRATION_BOOST: i32 = 30;
pub const MAX_INTENTS: usize = 8;
pub const MAX_VERDICT_REASONS: usize = 4;
pub const MAX_INSIGHT_CHARS: usize = 600;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaGuardrails {
    pub intent_delta_cap: i32,
    pub semantic_ceiling: i32,
    pub context_ceiling: i32,
    pub context_candidates: usize,
    pub arbitration_boost: i32,
    pub max_intents: usize,
}

impl Default for DeltaGuardrails {
    fn default() -> Self {
        Self {
            intent_delta_cap: MAX_INTENT_DELTA,
            semantic_ceiling: SEMANTIC_CEILING,
            context_ceiling: CONTEXT_CEILING,
            context_candidates: CONTEXT_CANDIDATES,
            arbitration_boost: ARBITRATION_BOOST,
            max_intents: MAX_INTENTS,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IntentReply {
    #[serde(default)]
    pub intents: Vec<RawIntent>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawIntent {
    pub label: String,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub deltas: BTreeMap<String, f64>,
}

fn full_confidence() -> f64 {
    1.0
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContextReply {
    #[serde(default)]
    pub adjustments: BTreeMap<String, f64>,
    #[serde(default)]
    pub justification: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictReply {
    pub top_choice: String,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub insight: String,
}

/// A key the provider used that does not resolve, or resolves to an item the stage may not touch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discard {
    pub stage: StageKind,
    pub item: String,
    pub delta: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundedIntent {
    pub label: String,
    pub confidence: f64,
    pub reason: String,
    pub deltas: Vec<(PumpModel, i32)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundedIntents {
    pub intents: Vec<BoundedIntent>,
    pub discarded: Vec<Discard>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoundedContext {
    pub deltas: Vec<(PumpModel, i32)>,
    pub justification: String,
    pub discarded: Vec<Discard>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundedVerdict {
    pub top_choice: PumpModel,
    pub boost: i32,
    pub reasons: Vec<String>,
    pub insight: String,
}

impl DeltaGuardrails {
    /// Confidence-weights each intent, caps it per item, then caps the stage total per item.
    pub fn bound_intents(&self, reply: IntentReply) -> BoundedIntents {
        let mut bounded = BoundedIntents::default();
        let mut running = BTreeMap::<PumpModel, i32>::new();

        for raw in reply.intents.into_iter().take(self.max_intents) {
            let label = raw.label.trim().to_string();
            if label.is_empty() {
                continue;
            }
            let confidence =
                if raw.confidence.is_finite() { raw.confidence.clamp(0.0, 1.0) } else { 0.0 };

            // Aliases of one item are summed before any cap applies.
            let mut proposed = Vec::<(PumpModel, f64)>::new();
            for (key, value) in raw.deltas {
                let Some(item) = PumpModel::from_key(&key) else {
                    bounded.discarded.push(Discard {
                        stage: StageKind::SemanticIntent,
                        item: key,
                        delta: rounded(value),
                    });
                    continue;
                };
                let value = if value.is_finite() { value } else { 0.0 };
                match proposed.iter_mut().find(|(seen, _)| *seen == item) {
                    Some((_, sum)) => *sum += value,
                    None => proposed.push((item, value)),
                }
            }

            let mut deltas = Vec::new();
            for (item, value) in proposed {
                let capped = clamp_rounded(value, self.intent_delta_cap);
                let weighted = (f64::from(capped) * confidence).round() as i32;
                let total = running.entry(item).or_insert(0);
                let ceiling = self.semantic_ceiling;
                let allowed = (*total + weighted).clamp(-ceiling, ceiling) - *total;
                if allowed != 0 {
                    *total += allowed;
                    deltas.push((item, allowed));
                }
            }

            let reason = raw
                .reason
                .map(|reason| reason.trim().to_string())
                .filter(|reason| !reason.is_empty())
                .unwrap_or_else(|| format!("Matches what you said: {label}"));
            bounded.intents.push(BoundedIntent { label, confidence, reason, deltas });
        }

        bounded
    }

    /// Keeps adjustments to `candidates`, capped at the context ceiling.
    pub fn bound_context(&self, reply: ContextReply, candidates: &[PumpModel]) -> BoundedContext {
        let mut bounded = BoundedContext {
            justification: reply.justification.trim().to_string(),
            ..BoundedContext::default()
        };

        for (key, value) in reply.adjustments {
            match PumpModel::from_key(&key) {
                Some(item) if candidates.contains(&item) => {
                    let delta = clamp_rounded(value, self.context_ceiling);
                    if delta != 0 && !bounded.deltas.iter().any(|(seen, _)| *seen == item) {
                        bounded.deltas.push((item, delta));
                    }
                }
                _ => bounded.discarded.push(Discard {
                    stage: StageKind::ContextRefinement,
                    item: key,
                    delta: rounded(value),
                }),
            }
        }

        bounded
    }

    /// `None` when the nominee does not resolve to a catalog item.
    pub fn bound_verdict(&self, reply: VerdictReply) -> Option<BoundedVerdict> {
        let top_choice = PumpModel::from_key(&reply.top_choice)?;
        let reasons = reply
            .reasons
            .into_iter()
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty())
            .take(MAX_VERDICT_REASONS)
            .collect();
        let insight = reply.insight.trim().chars().take(MAX_INSIGHT_CHARS).collect();

        Some(BoundedVerdict { top_choice, boost: self.arbitration_boost, reasons, insight })
    }
}

fn rounded(value: f64) -> i64 {
    if value.is_finite() {
        value.round() as i64
    } else {
        0
    }
}

fn clamp_rounded(value: f64, cap: i32) -> i32 {
    rounded(value).clamp(-i64::from(cap), i64::from(cap)) as i32
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pumpfit_core::scoring::KEYWORD_CEILING;
    use pumpfit_core::{PumpModel, StageKind};

    use super::{
        ContextReply, DeltaGuardrails, IntentReply, RawIntent, VerdictReply, ARBITRATION_BOOST,
        CONTEXT_CEILING, SEMANTIC_CEILING,
    };

    fn intent(label: &str, confidence: f64, deltas: &[(&str, f64)]) -> RawIntent {
        RawIntent {
            label: label.to_owned(),
            confidence,
            reason: None,
            deltas: deltas.iter().map(|(key, value)| ((*key).to_owned(), *value)).collect(),
        }
    }

    #[test]
    fn arbitration_boost_exceeds_every_other_stage_ceiling() {
        assert!(ARBITRATION_BOOST > SEMANTIC_CEILING);
        assert!(ARBITRATION_BOOST > CONTEXT_CEILING);
        assert!(CONTEXT_CEILING < SEMANTIC_CEILING);
        assert!(KEYWORD_CEILING < SEMANTIC_CEILING);
    }

    #[test]
    fn intents_are_weighted_and_capped_per_item() {
        let guardrails = DeltaGuardrails::default();
        let bounded = guardrails.bound_intents(IntentReply {
            intents: vec![
                intent("swims daily", 1.0, &[("omnipod_5", 40.0), ("tslim_x2", -6.0)]),
                intent("wants tiny", 0.5, &[("omnipod_5", 10.0), ("tandem_mobi", 14.0)]),
                intent("no tubes", 1.0, &[("omnipod_5", 15.0)]),
            ],
        });

        let total = |item: PumpModel| -> i32 {
            bounded
                .intents
                .iter()
                .flat_map(|intent| intent.deltas.iter())
                .filter(|(candidate, _)| *candidate == item)
                .map(|(_, delta)| *delta)
                .sum()
        };

        assert_eq!(bounded.intents[0].deltas[0], (PumpModel::Omnipod5, 15));
        assert_eq!(total(PumpModel::TandemMobi), 7);
        assert_eq!(total(PumpModel::Omnipod5), SEMANTIC_CEILING);
        assert_eq!(total(PumpModel::TslimX2), -6);
    }

    #[test]
    fn unknown_items_are_discarded_not_scored() {
        let bounded = DeltaGuardrails::default().bound_intents(IntentReply {
            intents: vec![intent("likes pens", 1.0, &[("insulin_pen", 12.0), ("ilet", 3.0)])],
        });

        assert_eq!(bounded.discarded.len(), 1);
        assert_eq!(bounded.discarded[0].item, "insulin_pen");
        assert_eq!(bounded.discarded[0].stage, StageKind::SemanticIntent);
        assert_eq!(bounded.intents[0].deltas, vec![(PumpModel::Ilet, 3)]);
    }

    #[test]
    fn aliases_of_one_item_merge_into_a_single_capped_delta() {
        let bounded = DeltaGuardrails::default().bound_intents(IntentReply {
            intents: vec![intent("tubeless", 1.0, &[("omnipod_5", 10.0), ("Omnipod", 5.0)])],
        });
        assert_eq!(bounded.intents[0].deltas, vec![(PumpModel::Omnipod5, 15)]);

        let over_cap = DeltaGuardrails::default().bound_intents(IntentReply {
            intents: vec![intent("tubeless", 1.0, &[("omnipod_5", 12.0), ("Omnipod 5", 9.0)])],
        });
        assert_eq!(over_cap.intents[0].deltas, vec![(PumpModel::Omnipod5, 15)]);
    }

    #[test]
    fn context_only_touches_candidates() {
        let mut adjustments = BTreeMap::new();
        adjustments.insert("omnipod_5".to_owned(), 25.0);
        adjustments.insert("ilet".to_owned(), 4.0);
        adjustments.insert("tandem_mobi".to_owned(), -3.4);

        let bounded = DeltaGuardrails::default().bound_context(
            ContextReply { adjustments, justification: "  Medicare covers pods. ".to_owned() },
            &[PumpModel::Omnipod5, PumpModel::TandemMobi, PumpModel::Twiist],
        );

        assert_eq!(
            bounded.deltas,
            vec![(PumpModel::Omnipod5, CONTEXT_CEILING), (PumpModel::TandemMobi, -3)]
        );
        assert_eq!(bounded.discarded.len(), 1);
        assert_eq!(bounded.justification, "Medicare covers pods.");
    }

    #[test]
    fn verdict_requires_a_catalog_nominee() {
        let guardrails = DeltaGuardrails::default();
        let reply = |top: &str| VerdictReply {
            top_choice: top.to_owned(),
            reasons: vec![
                " a ".to_owned(),
                String::new(),
                "b".into(),
                "c".into(),
                "d".into(),
                "e".into(),
            ],
            insight: "Fits you.".to_owned(),
        };

        assert!(guardrails.bound_verdict(reply("dexcom")).is_none());
        let verdict = guardrails.bound_verdict(reply("Omnipod 5")).expect("nominee resolves");
        assert_eq!(verdict.top_choice, PumpModel::Omnipod5);
        assert_eq!(verdict.boost, ARBITRATION_BOOST);
        assert_eq!(verdict.reasons, vec!["a", "b", "c", "d"]);
    }
}
