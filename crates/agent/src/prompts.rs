//! Prompt text for the three provider-backed stages.
//!
//! Every prompt carries the static catalog, asks for a single JSON object, and names
//! items by their catalog key so replies can be resolved without fuzzy matching.

use std::fmt::Write as _;

use pumpfit_core::domain::catalog::{PumpSpec, CATALOG, PUMP_SPECS};
use pumpfit_core::{PreferenceProfile, PumpModel, ScoreLedger};

use crate::guardrails::DeltaGuardrails;

pub fn catalog_context() -> String {
    let mut text = String::from("Catalog (use the key in brackets when naming an item):\n");
    for spec in &PUMP_SPECS {
        write_spec(&mut text, spec);
    }
    text
}

fn write_spec(text: &mut String, spec: &PumpSpec) {
    let _ = writeln!(text, "- [{}] {} by {}", spec.model.key(), spec.name, spec.manufacturer);
    let _ = writeln!(
        text,
        "  form: {}; tubeless: {}; water: {}; reservoir: {} units; power: {}",
        spec.form_factor,
        if spec.tubeless { "yes" } else { "no" },
        spec.water_resistance,
        spec.reservoir_units,
        spec.power
    );
    let _ = writeln!(
        text,
        "  controls: {}; CGMs: {}; algorithm: {}; carb counting: {}",
        spec.controls,
        spec.cgm_compatibility.join(", "),
        spec.algorithm,
        spec.carb_counting
    );
}

pub fn intent_system(guardrails: &DeltaGuardrails) -> String {
    format!(
        "You map a patient's own words about living with diabetes to preference intents for \
         choosing an insulin pump. Read for meaning, not keywords: \"I'm in the pool most \
         mornings\" and \"I love to swim\" are the same intent.\n\n{catalog}\n\
         Reply with one JSON object and nothing else:\n\
         {{\"intents\": [{{\"label\": string, \"confidence\": number 0-1, \"reason\": string, \
         \"deltas\": {{<catalog key>: integer}}}}]}}\n\
         Each delta is between -{cap} and {cap}. Use negative deltas for items that conflict \
         with the intent. Return at most {max} intents and an empty list if nothing in the text \
         bears on the choice.\n\n\
         Examples:\n\
         Text: \"I love to swim every day\" -> {{\"label\": \"swims daily\", \"confidence\": 0.9, \
         \"reason\": \"Waterproof design suits daily swimming\", \"deltas\": {{\"omnipod_5\": 12, \
         \"medtronic_780g\": 5, \"tandem_mobi\": 4, \"tslim_x2\": -5}}}}\n\
         Text: \"carb counting exhausts me\" -> {{\"label\": \"tired of carb counting\", \
         \"confidence\": 0.95, \"reason\": \"No carb counting required\", \"deltas\": \
         {{\"ilet\": 15, \"medtronic_780g\": -3}}}}\n\
         Text: \"I check everything on my Apple Watch\" -> {{\"label\": \"lives on a smartwatch\", \
         \"confidence\": 0.85, \"reason\": \"Bolus from an Apple Watch\", \"deltas\": \
         {{\"twiist\": 14}}}}\n",
        catalog = catalog_context(),
        cap = guardrails.intent_delta_cap,
        max = guardrails.max_intents,
    )
}

pub fn intent_user(profile: &PreferenceProfile, ledger: &ScoreLedger) -> String {
    let mut text = String::from("Scores so far from sliders and must-haves:\n");
    for item in CATALOG {
        let _ = writeln!(text, "- [{}] {}", item.key(), ledger.raw_total(item));
    }
    let _ = write!(text, "\nPatient text:\n\"\"\"\n{}\n\"\"\"", profile.narrative());
    text
}

pub fn context_system(guardrails: &DeltaGuardrails) -> String {
    format!(
        "You fine-tune, not re-decide, an insulin pump recommendation using the patient's \
         answers to follow-up questions. Only the listed candidates may be adjusted.\n\n\
         {catalog}\n\
         Reply with one JSON object and nothing else:\n\
         {{\"adjustments\": {{<candidate key>: integer}}, \"justification\": string}}\n\
         Each adjustment is between -{cap} and {cap}. Leave out candidates the answers do not \
         affect. Keep the justification to one or two sentences.\n",
        catalog = catalog_context(),
        cap = guardrails.context_ceiling,
    )
}

pub fn context_user(
    profile: &PreferenceProfile,
    ledger: &ScoreLedger,
    candidates: &[PumpModel],
) -> String {
    let mut text = String::from("Leading candidates (current score):\n");
    for item in candidates {
        let _ = writeln!(text, "- [{}] {}", item.key(), ledger.raw_total(*item));
    }
    text.push_str("\nFollow-up answers:\n");
    if let Some(answers) = profile.follow_up() {
        for (question, answer) in answers {
            let _ = writeln!(text, "- {question}: {answer}");
        }
    }
    text
}

pub fn arbitration_system(guardrails: &DeltaGuardrails) -> String {
    format!(
        "You make the final call on an insulin pump recommendation. You see every item's \
         score and the rules that produced it, plus the patient's full profile. Weigh the \
         whole picture; you may pick an item that is not the current leader when the profile \
         clearly favors it. Your pick receives a +{boost} boost.\n\n{catalog}\n\
         Reply with one JSON object and nothing else:\n\
         {{\"topChoice\": <catalog key>, \"reasons\": [2 to 4 short strings], \
         \"insight\": string of 1 to 3 sentences addressed to the patient}}\n",
        catalog = catalog_context(),
        boost = guardrails.arbitration_boost,
    )
}

pub fn arbitration_user(profile: &PreferenceProfile, ledger: &ScoreLedger) -> String {
    let mut text = String::from("Profile:\n");
    for (slider, value) in profile.sliders() {
        let _ = writeln!(text, "- {}: {value}/10", slider.label());
    }
    for feature in profile.features() {
        let _ = writeln!(text, "- must-have: {}", feature.label());
    }
    if !profile.narrative().is_empty() {
        let _ = writeln!(text, "- in their words: \"{}\"", profile.narrative());
    }
    if let Some(answers) = profile.follow_up() {
        for (question, answer) in answers {
            let _ = writeln!(text, "- follow-up {question}: {answer}");
        }
    }

    text.push_str("\nLedger:\n");
    for line in ledger.lines() {
        let _ = writeln!(
            text,
            "[{}] baseline {}, total {}",
            line.item.key(),
            line.baseline,
            line.raw_total()
        );
        for entry in line.entries() {
            let _ = writeln!(
                text,
                "  {:+} {} ({})",
                entry.delta,
                entry.reason,
                entry.stage.as_str()
            );
        }
    }
    text
}
