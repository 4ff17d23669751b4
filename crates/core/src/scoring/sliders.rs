//! Stage 3: per-slider, per-band adjustments.

use async_trait::async_trait;

use crate::domain::catalog::PumpModel;
use crate::domain::profile::{PreferenceProfile, Slider, SliderBand};
use crate::ledger::{EntrySource, LedgerEntry, StageKind};
use crate::pipeline::{PipelineContext, Stage, StageFailure};
use crate::scoring::{ItemDeltas, RuleReasons};

#[derive(Clone, Copy, Debug)]
pub struct SliderRule {
    pub slider: Slider,
    pub band: SliderBand,
    pub deltas: ItemDeltas,
    pub reasons: RuleReasons,
}

const fn rule(
    slider: Slider,
    band: SliderBand,
    deltas: [i32; 6],
    boost: &'static str,
    penalty: &'static str,
) -> SliderRule {
    SliderRule {
        slider,
        band,
        deltas: ItemDeltas::new(deltas),
        reasons: RuleReasons { boost, penalty },
    }
}

// Columns: 780G, t:slim X2, Mobi, Omnipod 5, iLet, twiist.
pub const SLIDER_RULES: [SliderRule; 15] = [
    rule(
        Slider::Activity,
        SliderBand::Low,
        [4, 4, 0, -2, 2, 0],
        "A durable pump suits a mostly stationary routine",
        "Pod wear is less of an advantage with a low-activity routine",
    ),
    rule(
        Slider::Activity,
        SliderBand::Mid,
        [2, 0, 2, 2, 0, 2],
        "Handles a moderately active lifestyle well",
        "No particular advantage for a moderately active lifestyle",
    ),
    rule(
        Slider::Activity,
        SliderBand::High,
        [3, -3, 6, 10, -2, 4],
        "Built to keep up with an active lifestyle",
        "Larger tubed body can get in the way during sport",
    ),
    rule(
        Slider::TechComfort,
        SliderBand::Low,
        [-4, -2, -6, 0, 8, -4],
        "Simple to operate without much technology",
        "Relies on app or menu features that take technical confidence",
    ),
    rule(
        Slider::TechComfort,
        SliderBand::Mid,
        [2, 2, 0, 2, 2, 0],
        "Comfortable to learn with some technical confidence",
        "Learning curve for moderate technology comfort",
    ),
    rule(
        Slider::TechComfort,
        SliderBand::High,
        [6, 6, 8, 4, -4, 8],
        "Rewards comfort with technology with fine-grained control",
        "Keeps most settings out of reach of tech-savvy users",
    ),
    rule(
        Slider::Simplicity,
        SliderBand::Low,
        [6, 8, 2, 0, -8, 4],
        "Offers the manual settings control you prefer",
        "Automates away settings you want to manage yourself",
    ),
    rule(
        Slider::Simplicity,
        SliderBand::Mid,
        [2, 2, 2, 2, 2, 2],
        "Balances automation with manual control",
        "Harder to balance automation and control",
    ),
    rule(
        Slider::Simplicity,
        SliderBand::High,
        [-2, -4, 2, 6, 12, -2],
        "Keeps daily management simple",
        "More settings and steps than you want to manage",
    ),
    rule(
        Slider::Discreteness,
        SliderBand::Low,
        [4, 4, -2, -2, 2, 0],
        "A visible pump with a full screen is fine for you",
        "Small size trades away on-device controls you may prefer",
    ),
    rule(
        Slider::Discreteness,
        SliderBand::Mid,
        [0, 0, 2, 2, 0, 2],
        "Reasonably easy to keep out of sight",
        "Harder to keep out of sight",
    ),
    rule(
        Slider::Discreteness,
        SliderBand::High,
        [-6, -4, 10, 8, -4, 6],
        "Small and easy to hide under clothing",
        "Bulkier device is hard to wear discreetly",
    ),
    rule(
        Slider::TimeDedication,
        SliderBand::Low,
        [-2, -4, 0, 4, 10, -2],
        "Needs very little day-to-day attention",
        "Expects regular attention to settings and alerts",
    ),
    rule(
        Slider::TimeDedication,
        SliderBand::Mid,
        [2, 2, 2, 2, 2, 2],
        "Fits a moderate amount of daily management",
        "Does not fit a moderate management routine",
    ),
    rule(
        Slider::TimeDedication,
        SliderBand::High,
        [8, 6, 2, 0, -6, 6],
        "Rewards time spent tuning settings with tighter results",
        "Offers little to tune if you enjoy hands-on management",
    ),
];

pub fn rule_for(slider: Slider, band: SliderBand) -> Option<&'static SliderRule> {
    SLIDER_RULES.iter().find(|rule| rule.slider == slider && rule.band == band)
}

/// Pure function of the profile's sliders and [`SLIDER_RULES`].
pub fn slider_deltas(profile: &PreferenceProfile) -> Vec<(PumpModel, LedgerEntry)> {
    let mut entries = Vec::new();
    for (slider, value) in profile.sliders() {
        let Some(band) = SliderBand::from_value(*value) else {
            continue;
        };
        let Some(rule) = rule_for(*slider, band) else {
            continue;
        };
        for (item, delta) in rule.deltas.non_zero() {
            entries.push((
                item,
                LedgerEntry::new(
                    EntrySource::Slider { slider: *slider, band },
                    delta,
                    rule.reasons.for_delta(delta),
                ),
            ));
        }
    }
    entries
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SliderStage;

#[async_trait]
impl Stage for SliderStage {
    fn kind(&self) -> StageKind {
        StageKind::Sliders
    }

    async fn apply(&self, ctx: &mut PipelineContext) -> Result<usize, StageFailure> {
        let entries = slider_deltas(&ctx.profile);
        Ok(ctx.record_all(entries))
    }
}
