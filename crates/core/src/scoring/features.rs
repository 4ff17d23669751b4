//! Stage 4: per-feature adjustments.

use async_trait::async_trait;

use crate::domain::catalog::PumpModel;
use crate::domain::profile::{Feature, PreferenceProfile};
use crate::ledger::{EntrySource, LedgerEntry, StageKind};
use crate::pipeline::{PipelineContext, Stage, StageFailure};
use crate::scoring::{ItemDeltas, RuleReasons};

#[derive(Clone, Copy, Debug)]
pub struct FeatureRule {
    pub feature: Feature,
    pub deltas: ItemDeltas,
    pub reasons: RuleReasons,
}

const fn rule(
    feature: Feature,
    deltas: [i32; 6],
    boost: &'static str,
    penalty: &'static str,
) -> FeatureRule {
    FeatureRule {
        feature,
        deltas: ItemDeltas::new(deltas),
        reasons: RuleReasons { boost, penalty },
    }
}

// Columns: 780G, t:slim X2, Mobi, Omnipod 5, iLet, twiist.
pub const FEATURE_RULES: [FeatureRule; 13] = [
    rule(
        Feature::CompletelyTubeless,
        [-8, -8, -6, 20, -8, -6],
        "Completely tubeless pod design with nothing to snag",
        "Uses tubing, which you wanted to avoid",
    ),
    rule(
        Feature::Waterproof,
        [6, -6, 4, 12, -4, 0],
        "Water resistance suited to swimming",
        "Only rated for brief, shallow water exposure",
    ),
    rule(
        Feature::SmartphoneControl,
        [-2, 6, 10, 8, -4, 8],
        "Can be controlled from a smartphone",
        "Limited or no smartphone control",
    ),
    rule(
        Feature::Touchscreen,
        [-4, 14, -6, -2, 6, -6],
        "Has the touchscreen interface you asked for",
        "No on-pump touchscreen",
    ),
    rule(
        Feature::NoCarbCounting,
        [-4, -4, -4, -4, 25, -4],
        "No carb counting: meals are simply announced",
        "Still requires counting carbs for meals",
    ),
    rule(
        Feature::AggressiveControl,
        [20, 6, 6, 4, -4, 4],
        "Aggressive automated corrections for tight control",
        "Less aggressive automated corrections",
    ),
    rule(
        Feature::SmallestSize,
        [-8, -6, 18, 6, -6, 8],
        "Among the smallest devices available",
        "Larger device than the smallest options",
    ),
    rule(
        Feature::AppleWatchControl,
        [-4, -4, -4, -4, -4, 22],
        "Bolus directly from an Apple Watch",
        "No Apple Watch control",
    ),
    rule(
        Feature::AaBatteries,
        [14, -6, -6, -4, -6, -4],
        "Runs on a replaceable AA battery, no charging",
        "Needs charging rather than swapping a battery",
    ),
    rule(
        Feature::Rechargeable,
        [-4, 8, 8, -6, 8, 8],
        "Rechargeable battery, nothing to buy or swap",
        "Not rechargeable",
    ),
    rule(
        Feature::LargeReservoir,
        [8, 10, -4, -4, -2, 6],
        "300-unit reservoir for higher insulin needs",
        "Smaller reservoir needs refilling more often",
    ),
    rule(
        Feature::DisconnectAnytime,
        [8, 8, 6, -20, 6, 6],
        "Tubing can be disconnected for showers or sport",
        "Pod stays attached until it is replaced",
    ),
    rule(
        Feature::MultipleCgmOptions,
        [-4, 8, 6, 8, 6, 2],
        "Works with a choice of CGM sensors",
        "Tied to a single CGM family",
    ),
];

pub fn rule_for(feature: Feature) -> Option<&'static FeatureRule> {
    FEATURE_RULES.iter().find(|rule| rule.feature == feature)
}

/// Pure function of the selected features and [`FEATURE_RULES`].
pub fn feature_deltas(profile: &PreferenceProfile) -> Vec<(PumpModel, LedgerEntry)> {
    profile
        .features()
        .iter()
        .filter_map(|feature| rule_for(*feature))
        .flat_map(|rule| {
            rule.deltas.non_zero().map(move |(item, delta)| {
                (
                    item,
                    LedgerEntry::new(
                        EntrySource::Feature { feature: rule.feature },
                        delta,
                        rule.reasons.for_delta(delta),
                    ),
                )
            })
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureStage;

#[async_trait]
impl Stage for FeatureStage {
    fn kind(&self) -> StageKind {
        StageKind::Features
    }

    async fn apply(&self, ctx: &mut PipelineContext) -> Result<usize, StageFailure> {
        let entries = feature_deltas(&ctx.profile);
        Ok(ctx.record_all(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::{feature_deltas, rule_for, FEATURE_RULES};
    use crate::domain::catalog::{PumpModel, CATALOG};
    use crate::domain::profile::{Feature, PreferenceProfile};

    #[test]
    fn every_feature_has_exactly_one_rule() {
        for feature in Feature::ALL {
            assert_eq!(FEATURE_RULES.iter().filter(|rule| rule.feature == feature).count(), 1);
        }
    }

    #[test]
    fn every_feature_rule_has_boosts_and_penalties() {
        for rule in FEATURE_RULES {
            let values = CATALOG.map(|item| rule.deltas.get(item));
            assert!(values.iter().any(|delta| *delta > 0), "{:?}", rule.feature);
            assert!(values.iter().any(|delta| *delta < 0), "{:?}", rule.feature);
        }
    }

    #[test]
    fn tubeless_boosts_only_the_pod() {
        let rule = rule_for(Feature::CompletelyTubeless).expect("rule exists");
        let boosted = CATALOG
            .into_iter()
            .filter(|item| rule.deltas.get(*item) > 0)
            .collect::<Vec<_>>();
        assert_eq!(boosted, vec![PumpModel::Omnipod5]);
    }

    #[test]
    fn unselected_features_contribute_nothing() {
        assert!(feature_deltas(&PreferenceProfile::new()).is_empty());
    }

    #[test]
    fn conflicting_features_offset_each_other() {
        let profile = PreferenceProfile::new()
            .with_feature(Feature::CompletelyTubeless)
            .with_feature(Feature::DisconnectAnytime);
        let omnipod: i32 = feature_deltas(&profile)
            .into_iter()
            .filter(|(item, _)| *item == PumpModel::Omnipod5)
            .map(|(_, entry)| entry.delta)
            .sum();
        assert_eq!(omnipod, 0);
    }

    #[test]
    fn entries_explain_penalties_differently_from_boosts() {
        let profile = PreferenceProfile::new().with_feature(Feature::Touchscreen);
        let entries = feature_deltas(&profile);
        let tslim = entries.iter().find(|(item, _)| *item == PumpModel::TslimX2);
        let mobi = entries.iter().find(|(item, _)| *item == PumpModel::TandemMobi);

        assert_eq!(
            tslim.map(|(_, entry)| entry.reason.as_str()),
            Some("Has the touchscreen interface you asked for")
        );
        assert_eq!(mobi.map(|(_, entry)| entry.reason.as_str()), Some("No on-pump touchscreen"));
    }
}
