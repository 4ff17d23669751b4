use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pumpfit_agent::{CompletionRequest, LlmClient, LlmError, Reasoner, RecommendationEngine};
use pumpfit_core::config::AppConfig;
use pumpfit_core::domain::catalog::CATALOG;
use pumpfit_core::{
    Feature, PreferenceProfile, PumpModel, Recommendation, Slider, StageKind, StageOutcome,
};
use serde_json::json;

#[derive(Clone, Debug)]
enum Script {
    Reply(String),
    Unavailable,
    Timeout,
}

impl Script {
    fn json(value: serde_json::Value) -> Self {
        Self::Reply(value.to_string())
    }
}

struct ScriptedClient {
    intent: Script,
    context: Script,
    arbitration: Script,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedClient {
    fn new(intent: Script, context: Script, arbitration: Script) -> Arc<Self> {
        Arc::new(Self { intent, context, arbitration, calls: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let (stage, script) = if request.system.contains("\"intents\"") {
            ("intent", &self.intent)
        } else if request.system.contains("\"adjustments\"") {
            ("context", &self.context)
        } else {
            ("arbitration", &self.arbitration)
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(stage);
        }

        match script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Unavailable => Err(LlmError::Unavailable("connection refused".to_owned())),
            Script::Timeout => Err(LlmError::Timeout { timeout_secs: 20 }),
        }
    }
}

fn engine_for(client: &Arc<ScriptedClient>) -> RecommendationEngine {
    let config = AppConfig::default();
    let client: Arc<dyn LlmClient> = client.clone();
    RecommendationEngine::with_reasoner(Reasoner::new(client, &config.llm))
}

fn no_intents() -> Script {
    Script::json(json!({ "intents": [] }))
}

fn verdict(top: &str, reasons: &[&str]) -> Script {
    Script::json(json!({
        "topChoice": top,
        "reasons": reasons,
        "insight": "This pump fits the way you described your days."
    }))
}

/// A slider and feature combination per item that sums past 100 before any provider stage.
fn documented_profile(item: PumpModel) -> PreferenceProfile {
    let sliders: [u8; 5];
    let features: &[Feature];
    let narrative: &str;
    match item {
        PumpModel::Medtronic780g => {
            sliders = [2, 8, 2, 2, 9];
            features = &[Feature::AggressiveControl, Feature::AaBatteries, Feature::LargeReservoir];
            narrative = "I want the tightest control possible and like swapping AA batteries";
        }
        PumpModel::TslimX2 => {
            sliders = [2, 8, 2, 2, 8];
            features = &[
                Feature::Touchscreen,
                Feature::Rechargeable,
                Feature::LargeReservoir,
                Feature::MultipleCgmOptions,
                Feature::SmartphoneControl,
            ];
            narrative = "I like a proper touchscreen on the pump itself";
        }
        PumpModel::TandemMobi => {
            sliders = [9, 8, 5, 9, 8];
            features = &[
                Feature::SmallestSize,
                Feature::SmartphoneControl,
                Feature::Rechargeable,
                Feature::MultipleCgmOptions,
            ];
            narrative = "I want the smallest pump I can run entirely from my phone";
        }
        PumpModel::Omnipod5 => {
            sliders = [9, 8, 8, 9, 2];
            features = &[
                Feature::CompletelyTubeless,
                Feature::Waterproof,
                Feature::SmartphoneControl,
            ];
            narrative = "No tubes, I swim and surf all the time";
        }
        PumpModel::Ilet => {
            sliders = [2, 2, 9, 2, 2];
            features = &[Feature::NoCarbCounting, Feature::Touchscreen, Feature::Rechargeable];
            narrative = "Carb counting exhausts me, I want something hands-off";
        }
        PumpModel::Twiist => {
            sliders = [9, 8, 2, 9, 8];
            features = &[
                Feature::AppleWatchControl,
                Feature::SmartphoneControl,
                Feature::Rechargeable,
                Feature::LargeReservoir,
            ];
            narrative = "I do everything from my Apple Watch";
        }
    }

    let mut profile = PreferenceProfile::new().with_narrative(narrative);
    for (slider, value) in Slider::ALL.into_iter().zip(sliders) {
        profile = profile.with_slider(slider, i64::from(value));
    }
    for feature in features {
        profile = profile.with_feature(*feature);
    }
    profile
}

fn stage_total(recommendation: &Recommendation, item: PumpModel, stage: StageKind) -> i32 {
    recommendation
        .debug
        .ledger
        .iter()
        .find(|line| line.item == item)
        .map(|line| {
            line.entries.iter().filter(|entry| entry.stage == stage).map(|entry| entry.delta).sum()
        })
        .unwrap_or(0)
}

fn outcome(recommendation: &Recommendation, stage: StageKind) -> Option<&StageOutcome> {
    recommendation
        .debug
        .stages
        .iter()
        .find(|report| report.stage == stage)
        .map(|report| &report.outcome)
}

#[tokio::test]
async fn every_catalog_item_is_reachable_to_a_perfect_score() {
    for item in CATALOG {
        let client = ScriptedClient::new(
            no_intents(),
            Script::Unavailable,
            verdict(item.key(), &["Matches your priorities", "Fits your routine"]),
        );
        let recommendation = engine_for(&client).recommend(documented_profile(item)).await;

        assert_eq!(recommendation.overall_top.id, item, "{item}");
        assert_eq!(recommendation.overall_top.score, 100, "{item}");
        assert!(recommendation.ai_assisted);
        let line = recommendation.debug.ledger.iter().find(|line| line.item == item);
        let pre_provider = line
            .map(|line| {
                line.baseline
                    + line
                        .entries
                        .iter()
                        .filter(|entry| {
                            matches!(entry.stage, StageKind::Sliders | StageKind::Features)
                        })
                        .map(|entry| entry.delta)
                        .sum::<i32>()
            })
            .unwrap_or(0);
        assert!(pre_provider > 100, "{item} only reaches {pre_provider} from rules");
    }
}

#[tokio::test]
async fn active_swimmer_wanting_tubeless_gets_the_pod() {
    let profile = PreferenceProfile::new()
        .with_slider(Slider::Activity, 9)
        .with_slider(Slider::Discreteness, 9)
        .with_feature(Feature::CompletelyTubeless)
        .with_narrative("I love to swim every day and want the smallest possible device");
    let client = ScriptedClient::new(
        Script::json(json!({
            "intents": [
                {
                    "label": "swims daily",
                    "confidence": 0.9,
                    "reason": "Waterproof pod suited to daily swimming",
                    "deltas": { "omnipod_5": 12, "medtronic_780g": 4, "tslim_x2": -5 }
                },
                {
                    "label": "smallest device",
                    "confidence": 0.8,
                    "reason": "Small, discreet form factor",
                    "deltas": { "tandem_mobi": 12, "omnipod_5": 10, "twiist": 4 }
                }
            ]
        })),
        Script::Unavailable,
        verdict(
            "omnipod_5",
            &[
                "Completely tubeless, so nothing to catch while swimming",
                "Small pod that sits discreetly under clothing",
                "Waterproof to 25 ft for daily swims",
            ],
        ),
    );

    let recommendation = engine_for(&client).recommend(profile).await;
    let reasons = recommendation.overall_top.reasons.join(" ").to_lowercase();

    assert_eq!(recommendation.overall_top.id, PumpModel::Omnipod5);
    assert!(recommendation.overall_top.score >= 90);
    assert!(reasons.contains("tubeless"));
    assert!(reasons.contains("small"));
    assert!(reasons.contains("waterproof"));
    assert_eq!(recommendation.debug.intents.len(), 2);
    assert_eq!(client.calls(), vec!["intent", "arbitration"]);
}

#[tokio::test]
async fn carb_fatigue_gives_the_no_carb_pump_the_largest_semantic_delta() {
    let profile = PreferenceProfile::new()
        .with_narrative("carb counting exhausts me, I want something hands-off");
    let client = ScriptedClient::new(
        Script::json(json!({
            "intents": [{
                "label": "tired of carb counting",
                "confidence": 0.95,
                "reason": "No carb counting required",
                "deltas": { "ilet": 15, "omnipod_5": 2, "medtronic_780g": -3 }
            }]
        })),
        Script::Unavailable,
        verdict("ilet", &["No carb counting", "Hands-off automated dosing"]),
    );

    let recommendation = engine_for(&client).recommend(profile).await;
    let ilet = stage_total(&recommendation, PumpModel::Ilet, StageKind::SemanticIntent);

    assert_eq!(ilet, 14);
    for item in CATALOG.into_iter().filter(|item| *item != PumpModel::Ilet) {
        assert!(stage_total(&recommendation, item, StageKind::SemanticIntent) < ilet);
    }
}

#[tokio::test]
async fn outage_on_first_call_falls_back_to_rules() {
    let profile = documented_profile(PumpModel::TslimX2)
        .with_narrative("Looking for whatever suits me best");
    let client = ScriptedClient::new(Script::Unavailable, no_intents(), verdict("ilet", &[]));

    let recommendation = engine_for(&client).recommend(profile.clone()).await;

    assert!(!recommendation.ai_assisted);
    assert!(recommendation.debug.fallback_reason.is_some());
    assert_eq!(recommendation.overall_top.id, PumpModel::TslimX2);
    assert!(recommendation.debug.intents.is_empty());
    assert!(recommendation.debug.arbitration.is_none());
    assert!(matches!(
        outcome(&recommendation, StageKind::Arbitration),
        Some(StageOutcome::Skipped { .. })
    ));
    assert_eq!(client.calls(), vec!["intent"]);

    let rules_only = RecommendationEngine::rules_only().recommend(profile).await;
    assert_eq!(rules_only.debug.ledger, recommendation.debug.ledger);
}

#[tokio::test]
async fn timeout_on_first_call_also_falls_back() {
    let client = ScriptedClient::new(Script::Timeout, no_intents(), verdict("ilet", &[]));
    let profile = documented_profile(PumpModel::Omnipod5);

    let recommendation = engine_for(&client).recommend(profile).await;

    assert!(!recommendation.ai_assisted);
    assert_eq!(recommendation.overall_top.id, PumpModel::Omnipod5);
    assert!(!recommendation.debug.keyword_hits.is_empty());
}

#[tokio::test]
async fn fallback_output_is_byte_identical_across_runs() {
    let profile = documented_profile(PumpModel::Twiist);
    let client = ScriptedClient::new(Script::Unavailable, no_intents(), verdict("ilet", &[]));
    let engine = engine_for(&client);

    let first = serde_json::to_string(&engine.recommend(profile.clone()).await).unwrap_or_default();
    let second = serde_json::to_string(&engine.recommend(profile).await).unwrap_or_default();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn malformed_first_reply_degrades_only_that_stage() {
    let client = ScriptedClient::new(
        Script::Reply("I think the Omnipod sounds great!".to_owned()),
        Script::Unavailable,
        verdict("omnipod_5", &["Tubeless", "Waterproof"]),
    );

    let recommendation =
        engine_for(&client).recommend(documented_profile(PumpModel::Omnipod5)).await;

    assert!(recommendation.ai_assisted);
    assert!(recommendation.debug.fallback_reason.is_none());
    assert!(matches!(
        outcome(&recommendation, StageKind::SemanticIntent),
        Some(StageOutcome::Degraded { .. })
    ));
    assert!(recommendation.debug.arbitration.is_some());
    assert_eq!(client.calls(), vec!["intent", "arbitration"]);
}

#[tokio::test]
async fn later_outage_only_costs_the_arbitration_boost() {
    let client = ScriptedClient::new(no_intents(), Script::Unavailable, Script::Unavailable);
    let profile = PreferenceProfile::new()
        .with_slider(Slider::Simplicity, 9)
        .with_feature(Feature::NoCarbCounting)
        .with_narrative("keep it easy");

    let recommendation = engine_for(&client).recommend(profile).await;

    assert!(recommendation.debug.fallback_reason.is_none());
    assert!(recommendation.debug.arbitration.is_none());
    assert_eq!(recommendation.overall_top.id, PumpModel::Ilet);
    assert_eq!(recommendation.overall_top.score, 40 + 12 + 25);
    let best = recommendation.ranked().map(|choice| choice.score).max();
    assert_eq!(best, Some(recommendation.overall_top.score));
}

#[tokio::test]
async fn empty_narrative_makes_arbitration_the_first_call() {
    let profile = documented_profile(PumpModel::Ilet).with_narrative("");

    let down = ScriptedClient::new(no_intents(), no_intents(), Script::Unavailable);
    let recommendation = engine_for(&down).recommend(profile.clone()).await;
    assert!(!recommendation.ai_assisted);
    assert!(recommendation.debug.fallback_reason.is_some());
    assert_eq!(down.calls(), vec!["arbitration"]);

    let up = ScriptedClient::new(Script::Unavailable, no_intents(), verdict("ilet", &["a", "b"]));
    let recommendation = engine_for(&up).recommend(profile).await;
    assert!(recommendation.ai_assisted);
    assert!(matches!(
        outcome(&recommendation, StageKind::SemanticIntent),
        Some(StageOutcome::Skipped { .. })
    ));
    assert_eq!(up.calls(), vec!["arbitration"]);
}

#[tokio::test]
async fn context_refinement_runs_only_with_follow_up_answers() {
    let context = Script::json(json!({
        "adjustments": { "omnipod_5": 6, "ilet": 50 },
        "justification": "Pharmacy coverage favors pods."
    }));

    let client = ScriptedClient::new(no_intents(), context.clone(), verdict("omnipod_5", &[]));
    let without = engine_for(&client).recommend(documented_profile(PumpModel::Omnipod5)).await;
    assert!(without.debug.context_refinement.is_none());
    assert_eq!(client.calls(), vec!["intent", "arbitration"]);

    let client = ScriptedClient::new(no_intents(), context, verdict("omnipod_5", &[]));
    let profile = documented_profile(PumpModel::Omnipod5).with_follow_up("coverage", "pharmacy");
    let with = engine_for(&client).recommend(profile).await;
    assert_eq!(client.calls(), vec!["intent", "context", "arbitration"]);

    let refinement = with.debug.context_refinement.as_ref().expect("refinement recorded");
    assert_eq!(refinement.deltas.get(&PumpModel::Omnipod5), Some(&6));
    assert!(!refinement.deltas.contains_key(&PumpModel::Ilet));
    assert_eq!(stage_total(&with, PumpModel::Ilet, StageKind::ContextRefinement), 0);
    assert_eq!(with.debug.discarded.len(), 1);
}

#[tokio::test]
async fn empty_profile_contacts_no_provider_and_ties_at_baseline() {
    let client = ScriptedClient::new(no_intents(), no_intents(), verdict("ilet", &[]));
    let recommendation = engine_for(&client).recommend(PreferenceProfile::new()).await;

    assert!(client.calls().is_empty());
    assert_eq!(recommendation.overall_top.id, PumpModel::Medtronic780g);
    assert!(recommendation.ranked().all(|choice| choice.score == 40));
}

#[tokio::test]
async fn deltas_for_unknown_items_are_discarded() {
    let client = ScriptedClient::new(
        Script::json(json!({
            "intents": [{ "label": "wants a pen", "confidence": 1.0,
                          "deltas": { "insulin_pen": 15, "twiist": 5 } }]
        })),
        Script::Unavailable,
        verdict("not_a_pump", &[]),
    );

    let recommendation = engine_for(&client).recommend(documented_profile(PumpModel::Twiist)).await;

    let discarded =
        recommendation.debug.discarded.iter().map(|item| item.item.as_str()).collect::<Vec<_>>();
    assert_eq!(discarded, vec!["insulin_pen", "not_a_pump"]);
    assert!(matches!(
        outcome(&recommendation, StageKind::Arbitration),
        Some(StageOutcome::Degraded { .. })
    ));
    assert_eq!(recommendation.overall_top.id, PumpModel::Twiist);
}

#[tokio::test]
async fn intent_audit_accounts_for_every_semantic_point() {
    let client = ScriptedClient::new(
        Script::json(json!({
            "intents": [{ "label": "no tubes", "confidence": 1.0,
                          "deltas": { "omnipod_5": 10, "Omnipod": 5, "tslim_x2": -4 } }]
        })),
        Script::Unavailable,
        Script::Unavailable,
    );
    let profile = PreferenceProfile::new().with_narrative("I hate tubing");

    let recommendation = engine_for(&client).recommend(profile).await;

    for item in CATALOG {
        let audited: i32 = recommendation
            .debug
            .intents
            .iter()
            .filter_map(|intent| intent.deltas.get(&item))
            .sum();
        let recorded = stage_total(&recommendation, item, StageKind::SemanticIntent);
        assert_eq!(audited, recorded, "{item}");
    }
    assert_eq!(stage_total(&recommendation, PumpModel::Omnipod5, StageKind::SemanticIntent), 15);
}

#[tokio::test]
async fn reply_with_braces_in_trailing_prose_still_applies() {
    let reply = format!(
        "Here you go: {} (values in {{curly}} braces are integers)",
        json!({ "intents": [{ "label": "swims", "confidence": 1.0, "deltas": { "omnipod_5": 8 } }] })
    );
    let client =
        ScriptedClient::new(Script::Reply(reply), Script::Unavailable, Script::Unavailable);
    let profile = PreferenceProfile::new().with_narrative("I swim every morning");

    let recommendation = engine_for(&client).recommend(profile).await;

    assert!(matches!(
        outcome(&recommendation, StageKind::SemanticIntent),
        Some(StageOutcome::Applied { .. })
    ));
    assert_eq!(stage_total(&recommendation, PumpModel::Omnipod5, StageKind::SemanticIntent), 8);
}

#[tokio::test]
async fn overruling_verdict_is_credited_in_key_factors() {
    let client = ScriptedClient::new(
        no_intents(),
        Script::Unavailable,
        verdict("tslim_x2", &["Touchscreen on the pump itself"]),
    );
    let profile = PreferenceProfile::new()
        .with_slider(Slider::Simplicity, 9)
        .with_feature(Feature::NoCarbCounting)
        .with_narrative("keep it easy");

    let recommendation = engine_for(&client).recommend(profile).await;

    assert_eq!(recommendation.overall_top.id, PumpModel::TslimX2);
    assert_eq!(recommendation.key_factors, vec!["Final holistic review".to_owned()]);
}

#[tokio::test]
async fn arbitration_may_overrule_a_higher_score_and_says_so() {
    let client = ScriptedClient::new(
        no_intents(),
        Script::Unavailable,
        verdict("twiist", &["Watch control fits the way you work"]),
    );

    let recommendation =
        engine_for(&client).recommend(documented_profile(PumpModel::Medtronic780g)).await;

    assert_eq!(recommendation.overall_top.id, PumpModel::Twiist);
    assert!(recommendation.overall_top.score < 100);
    assert!(recommendation.overall_top.reasons[0]
        .starts_with("Chosen over Medtronic MiniMed 780G (100)"));
    assert_eq!(recommendation.alternatives[0].id, PumpModel::Medtronic780g);
}

#[tokio::test]
async fn conflicting_signals_narrow_the_margin_without_error() {
    let client = ScriptedClient::new(no_intents(), Script::Unavailable, Script::Unavailable);
    let clear = PreferenceProfile::new()
        .with_slider(Slider::Activity, 9)
        .with_feature(Feature::CompletelyTubeless)
        .with_narrative("active");
    let conflicted = clear.clone().with_feature(Feature::DisconnectAnytime);

    let engine = engine_for(&client);
    let clear = engine.recommend(clear).await;
    let conflicted = engine.recommend(conflicted).await;

    let margin = |recommendation: &Recommendation| {
        recommendation.overall_top.score - recommendation.alternatives[0].score
    };
    assert!(margin(&conflicted) < margin(&clear));
    for choice in conflicted.ranked() {
        assert!((0..=100).contains(&choice.score));
    }
}

#[tokio::test]
async fn invalid_payloads_are_the_only_failure() {
    let engine = RecommendationEngine::rules_only();

    assert!(engine.recommend_payload(&json!("just a string")).await.is_err());
    let recommendation = engine
        .recommend_payload(&json!({
            "sliders": { "activity": 42, "unknown": 3 },
            "features": ["completely_tubeless", "teleportation"],
            "freeText": { "currentSituation": "  " }
        }))
        .await
        .expect("coercible payload should score");
    assert_eq!(recommendation.overall_top.id, PumpModel::Omnipod5);
    assert_eq!(recommendation.alternatives.len(), 3);
}
