//! Stage 8: sums, clamps, ranks, and assembles the [`Recommendation`].

use std::collections::BTreeMap;

use crate::domain::catalog::{PumpModel, CATALOG};
use crate::domain::recommendation::{
    ArbitrationVerdict, AuditTrail, ItemBreakdown, RankedChoice, Recommendation,
};
use crate::ledger::{ScoreLedger, StageKind};
use crate::pipeline::PipelineContext;

pub const MAX_ALTERNATIVES: usize = 3;
pub const MIN_REASONS: usize = 2;
pub const MAX_REASONS: usize = 4;
pub const MAX_KEY_FACTORS: usize = 5;

const NO_SIGNALS_FACTOR: &str =
    "No preference signals were provided, so every option started equal";
const LEAST_CONFLICT_FACTOR: &str = "Fewest conflicts with your stated preferences";

/// Clamped scores, highest first. Ties keep catalog order; an arbitration nominee
/// always leads.
pub fn rank(ledger: &ScoreLedger, nominee: Option<PumpModel>) -> Vec<(PumpModel, i32)> {
    let mut ranked = CATALOG.into_iter().map(|item| (item, ledger.score(item))).collect::<Vec<_>>();
    ranked.sort_by(|left, right| right.1.cmp(&left.1));

    if let Some(nominee) = nominee {
        if let Some(position) = ranked.iter().position(|(item, _)| *item == nominee) {
            let chosen = ranked.remove(position);
            ranked.insert(0, chosen);
        }
    }
    ranked
}

/// Pure over the finished context. `fallback_reason` is set when the run took the
/// rules-only path.
pub fn aggregate(
    ctx: PipelineContext,
    ai_assisted: bool,
    fallback_reason: Option<String>,
) -> Recommendation {
    let PipelineContext { ledger, trace, .. } = ctx;
    let verdict = trace.arbitration.as_ref();
    let ranked = rank(&ledger, verdict.map(|verdict| verdict.top_choice));

    let mut choices = ranked
        .iter()
        .map(|(item, score)| RankedChoice {
            id: *item,
            name: item.display_name().to_string(),
            score: *score,
            reasons: ledger_reasons(&ledger, *item),
        })
        .collect::<Vec<_>>();

    let mut overall_top = choices.remove(0);
    if let Some(verdict) = verdict {
        overall_top.reasons = arbitrated_reasons(verdict, &ranked, overall_top.reasons);
    }
    choices.truncate(MAX_ALTERNATIVES);

    let key_factors = key_factors(&ledger, overall_top.id);
    let personalized_insights = match verdict {
        Some(verdict) if !verdict.insight.trim().is_empty() => verdict.insight.trim().to_string(),
        _ => templated_insight(&overall_top, &choices, &key_factors, fallback_reason.is_some()),
    };

    Recommendation {
        overall_top,
        alternatives: choices,
        key_factors,
        personalized_insights,
        ai_assisted,
        debug: AuditTrail {
            stages: trace.reports,
            intents: trace.intents,
            context_refinement: trace.context_refinement,
            arbitration: trace.arbitration,
            keyword_hits: trace.keyword_hits,
            discarded: trace.discarded,
            fallback_reason,
            ledger: ledger.lines().iter().map(ItemBreakdown::from).collect(),
        },
    }
}

/// Positive entries, largest first, padded from the catalog highlights.
fn ledger_reasons(ledger: &ScoreLedger, item: PumpModel) -> Vec<String> {
    let mut boosts = ledger
        .line(item)
        .map(|line| line.entries().iter().filter(|entry| entry.delta > 0).collect::<Vec<_>>())
        .unwrap_or_default();
    boosts.sort_by(|left, right| right.delta.cmp(&left.delta));

    let mut reasons = Vec::new();
    for entry in boosts {
        push_unique(&mut reasons, &entry.reason);
        if reasons.len() == MAX_REASONS {
            return reasons;
        }
    }
    pad_with_highlights(&mut reasons, item);
    reasons
}

fn arbitrated_reasons(
    verdict: &ArbitrationVerdict,
    ranked: &[(PumpModel, i32)],
    ledger_reasons: Vec<String>,
) -> Vec<String> {
    let nominee = verdict.top_choice;
    let nominee_score =
        ranked.iter().find(|(item, _)| *item == nominee).map_or(0, |(_, score)| *score);
    let higher = ranked.iter().find(|(item, score)| *item != nominee && *score > nominee_score);

    let mut reasons = Vec::new();
    if let Some((other, other_score)) = higher {
        reasons.push(format!(
            "Chosen over {} ({other_score}) after a holistic review of your full profile",
            other.display_name()
        ));
    } else if verdict.previous_leader != nominee {
        reasons.push(format!(
            "Moved ahead of {} after a holistic review of your full profile",
            verdict.previous_leader.display_name()
        ));
    }

    for reason in verdict.reasons.iter().chain(ledger_reasons.iter()) {
        if reasons.len() == MAX_REASONS {
            break;
        }
        push_unique(&mut reasons, reason);
    }
    pad_with_highlights(&mut reasons, nominee);
    reasons
}

fn pad_with_highlights(reasons: &mut Vec<String>, item: PumpModel) {
    for highlight in item.spec().highlights {
        if reasons.len() >= MIN_REASONS {
            break;
        }
        push_unique(reasons, highlight);
    }
}

fn push_unique(reasons: &mut Vec<String>, reason: &str) {
    let reason = reason.trim();
    if !reason.is_empty() && !reasons.iter().any(|existing| existing == reason) {
        reasons.push(reason.to_string());
    }
}

/// Dominant positive drivers of the top choice, grouped by what produced them.
/// The arbitration boost only counts when nothing else lifted the top choice.
fn key_factors(ledger: &ScoreLedger, top: PumpModel) -> Vec<String> {
    if ledger.lines().iter().all(|line| line.entries().is_empty()) {
        return vec![NO_SIGNALS_FACTOR.to_string()];
    }
    let Some(line) = ledger.line(top) else {
        return vec![LEAST_CONFLICT_FACTOR.to_string()];
    };

    let mut arbitration = None;
    let mut order = Vec::<String>::new();
    let mut weights = BTreeMap::<String, i32>::new();
    for entry in line.entries() {
        if entry.stage == StageKind::Arbitration {
            arbitration = Some(entry.source.factor_label());
            continue;
        }
        let label = entry.source.factor_label();
        if !weights.contains_key(&label) {
            order.push(label.clone());
        }
        *weights.entry(label).or_insert(0) += entry.delta;
    }

    let mut factors = order
        .into_iter()
        .filter_map(|label| {
            let weight = weights.get(&label).copied().unwrap_or(0);
            (weight > 0).then_some((label, weight))
        })
        .collect::<Vec<_>>();
    factors.sort_by(|left, right| right.1.cmp(&left.1));

    if factors.is_empty() {
        return vec![arbitration.unwrap_or_else(|| LEAST_CONFLICT_FACTOR.to_string())];
    }
    factors.into_iter().take(MAX_KEY_FACTORS).map(|(label, _)| label).collect()
}

fn templated_insight(
    top: &RankedChoice,
    alternatives: &[RankedChoice],
    key_factors: &[String],
    rules_only: bool,
) -> String {
    let runner_up = alternatives.first();
    let tied = alternatives.iter().all(|choice| choice.score == top.score);

    let mut insight = if tied {
        format!(
            "Every option scored {} out of 100, so {} is listed first by catalog order. \
             Adding preferences will separate them.",
            top.score, top.name
        )
    } else {
        let drivers = match key_factors {
            [] => String::new(),
            [only] => format!(", driven mostly by {}", only.to_lowercase()),
            [first, second, ..] => format!(
                ", driven mostly by {} and {}",
                first.to_lowercase(),
                second.to_lowercase()
            ),
        };
        let mut text =
            format!("{} is your best fit at {} out of 100{drivers}.", top.name, top.score);
        if let Some(runner_up) = runner_up {
            text.push_str(&format!(
                " {} is the closest alternative at {}.",
                runner_up.name, runner_up.score
            ));
        }
        text
    };

    if rules_only {
        insight.push_str(" This result was scored with rules only.");
    }
    insight
}
