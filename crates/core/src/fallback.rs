//! Rules-only execution path.
//!
//! Runs the same stage contract as the full pipeline, with the keyword scan standing in
//! for semantic intent and no provider-backed stages. It cannot fail once the profile
//! has been normalized.

use crate::domain::profile::PreferenceProfile;
use crate::domain::recommendation::Recommendation;
use crate::ledger::StageKind;
use crate::pipeline::{PipelineContext, Stage};
use crate::scoring::{aggregate, FeatureStage, KeywordScanStage, SliderStage};

pub const RULES_ONLY_SKIP: &str = "rules-only mode";

#[derive(Clone, Copy, Debug, Default)]
pub struct FallbackEngine;

impl FallbackEngine {
    /// Deterministic stages in run order.
    pub fn stages() -> [&'static dyn Stage; 3] {
        [&SliderStage, &FeatureStage, &KeywordScanStage]
    }

    /// Scores `profile` from a fresh baseline. `reason` is why the full pipeline was not used,
    /// if it was attempted at all.
    pub async fn recommend(profile: PreferenceProfile, reason: Option<String>) -> Recommendation {
        let mut ctx = PipelineContext::new(profile);

        let [sliders, features, keywords] = Self::stages();

        // Deterministic stages do not fail. Any error is already in the trace as degraded.
        for stage in [sliders, features] {
            let _ = ctx.run(stage).await;
        }
        ctx.skip(StageKind::SemanticIntent, RULES_ONLY_SKIP);
        let _ = ctx.run(keywords).await;
        ctx.skip(StageKind::ContextRefinement, RULES_ONLY_SKIP);
        ctx.skip(StageKind::Arbitration, RULES_ONLY_SKIP);

        aggregate(ctx, false, reason)
    }
}
