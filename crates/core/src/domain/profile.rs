//! Preference profile and the normalizer that produces it from a raw payload.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ValidationError;

pub const SLIDER_MIN: u8 = 0;
pub const SLIDER_MAX: u8 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slider {
    Activity,
    TechComfort,
    Simplicity,
    Discreteness,
    TimeDedication,
}

impl Slider {
    pub const ALL: [Slider; 5] = [
        Slider::Activity,
        Slider::TechComfort,
        Slider::Simplicity,
        Slider::Discreteness,
        Slider::TimeDedication,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::TechComfort => "techComfort",
            Self::Simplicity => "simplicity",
            Self::Discreteness => "discreteness",
            Self::TimeDedication => "timeDedication",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Activity => "Activity level",
            Self::TechComfort => "Comfort with technology",
            Self::Simplicity => "Preference for simplicity",
            Self::Discreteness => "Desire for discretion",
            Self::TimeDedication => "Time available for diabetes management",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        match compact_key(raw).as_str() {
            "activity" => Some(Self::Activity),
            "techcomfort" => Some(Self::TechComfort),
            "simplicity" => Some(Self::Simplicity),
            "discreteness" => Some(Self::Discreteness),
            "timededication" => Some(Self::TimeDedication),
            _ => None,
        }
    }
}

/// Value band a slider falls into. A value of zero is "no preference" and has no band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliderBand {
    Low,
    Mid,
    High,
}

impl SliderBand {
    pub const fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => None,
            1..=3 => Some(Self::Low),
            4..=6 => Some(Self::Mid),
            _ => Some(Self::High),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "moderate",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    CompletelyTubeless,
    Waterproof,
    SmartphoneControl,
    Touchscreen,
    NoCarbCounting,
    AggressiveControl,
    SmallestSize,
    AppleWatchControl,
    AaBatteries,
    Rechargeable,
    LargeReservoir,
    DisconnectAnytime,
    MultipleCgmOptions,
}

impl Feature {
    pub const ALL: [Feature; 13] = [
        Feature::CompletelyTubeless,
        Feature::Waterproof,
        Feature::SmartphoneControl,
        Feature::Touchscreen,
        Feature::NoCarbCounting,
        Feature::AggressiveControl,
        Feature::SmallestSize,
        Feature::AppleWatchControl,
        Feature::AaBatteries,
        Feature::Rechargeable,
        Feature::LargeReservoir,
        Feature::DisconnectAnytime,
        Feature::MultipleCgmOptions,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::CompletelyTubeless => "completely_tubeless",
            Self::Waterproof => "waterproof",
            Self::SmartphoneControl => "smartphone_control",
            Self::Touchscreen => "touchscreen",
            Self::NoCarbCounting => "no_carb_counting",
            Self::AggressiveControl => "aggressive_control",
            Self::SmallestSize => "smallest_size",
            Self::AppleWatchControl => "apple_watch_control",
            Self::AaBatteries => "aa_batteries",
            Self::Rechargeable => "rechargeable",
            Self::LargeReservoir => "large_reservoir",
            Self::DisconnectAnytime => "disconnect_anytime",
            Self::MultipleCgmOptions => "multiple_cgm_options",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::CompletelyTubeless => "Completely tubeless",
            Self::Waterproof => "Waterproof for swimming",
            Self::SmartphoneControl => "Control from a smartphone",
            Self::Touchscreen => "Touchscreen interface",
            Self::NoCarbCounting => "No carb counting",
            Self::AggressiveControl => "Tight glucose control",
            Self::SmallestSize => "Smallest possible device",
            Self::AppleWatchControl => "Apple Watch control",
            Self::AaBatteries => "Replaceable AA batteries",
            Self::Rechargeable => "Rechargeable battery",
            Self::LargeReservoir => "Large insulin reservoir",
            Self::DisconnectAnytime => "Can disconnect at any time",
            Self::MultipleCgmOptions => "Choice of CGM",
        }
    }

    /// Resolves a feature key, tolerating case and `-`/space separators.
    pub fn from_key(raw: &str) -> Option<Self> {
        let compact = compact_key(raw);
        Self::ALL.into_iter().find(|feature| compact_key(feature.key()) == compact)
    }
}

/// Validated, canonical preference input for one pipeline run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceProfile {
    sliders: BTreeMap<Slider, u8>,
    features: BTreeSet<Feature>,
    narrative: String,
    follow_up: Option<BTreeMap<String, String>>,
}

impl PreferenceProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a slider, clamping the value into `0..=10`.
    pub fn with_slider(mut self, slider: Slider, value: i64) -> Self {
        self.sliders.insert(slider, clamp_slider(value));
        self
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.insert(feature);
        self
    }

    pub fn with_narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative = narrative.into().trim().to_string();
        self
    }

    pub fn with_follow_up(mut self, key: impl Into<String>, answer: impl Into<String>) -> Self {
        let key = key.into().trim().to_string();
        let answer = answer.into().trim().to_string();
        if !key.is_empty() && !answer.is_empty() {
            self.follow_up.get_or_insert_with(BTreeMap::new).insert(key, answer);
        }
        self
    }

    pub fn sliders(&self) -> &BTreeMap<Slider, u8> {
        &self.sliders
    }

    pub fn slider(&self, slider: Slider) -> Option<u8> {
        self.sliders.get(&slider).copied()
    }

    pub fn features(&self) -> &BTreeSet<Feature> {
        &self.features
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn narrative(&self) -> &str {
        &self.narrative
    }

    pub fn follow_up(&self) -> Option<&BTreeMap<String, String>> {
        self.follow_up.as_ref()
    }

    /// True when nothing in the profile can move a score.
    pub fn is_empty(&self) -> bool {
        self.sliders.values().all(|value| SliderBand::from_value(*value).is_none())
            && self.features.is_empty()
            && self.narrative.is_empty()
            && self.follow_up.is_none()
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ValidationError> {
        let value = serde_json::from_str::<Value>(raw)
            .map_err(|error| ValidationError::Unparseable(error.to_string()))?;
        Self::from_value(&value)
    }

    /// Normalizes a raw request payload.
    ///
    /// Unknown sliders and features are dropped, out-of-range slider values are clamped,
    /// and the narrative is trimmed. Only payloads whose shape cannot be coerced fail.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let Value::Object(payload) = value else {
            return Err(ValidationError::NotAnObject);
        };

        let mut profile = Self::new();
        if let Some(sliders) = present(payload, "sliders") {
            profile.sliders = normalize_sliders(sliders)?;
        }
        if let Some(features) = present(payload, "features") {
            profile.features = normalize_features(features)?;
        }
        if let Some(free_text) = present(payload, "freeText") {
            profile.narrative = normalize_narrative(free_text)?;
        }
        if let Some(context) = present(payload, "context") {
            profile.follow_up = normalize_follow_up(context)?;
        }

        Ok(profile)
    }
}

fn present<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    payload.get(key).filter(|value| !value.is_null())
}

fn normalize_sliders(value: &Value) -> Result<BTreeMap<Slider, u8>, ValidationError> {
    let Value::Object(entries) = value else {
        return Err(ValidationError::InvalidShape { field: "sliders", expected: "an object" });
    };

    let mut sliders = BTreeMap::new();
    for (key, raw) in entries {
        let Some(slider) = Slider::from_key(key) else {
            continue;
        };
        let numeric = match raw {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        let Some(numeric) = numeric.filter(|number| number.is_finite()) else {
            return Err(ValidationError::NonNumericSlider {
                slider: slider.key(),
                value: raw.to_string(),
            });
        };
        sliders.insert(slider, clamp_slider(numeric.round() as i64));
    }
    Ok(sliders)
}

fn normalize_features(value: &Value) -> Result<BTreeSet<Feature>, ValidationError> {
    let Value::Array(items) = value else {
        return Err(ValidationError::InvalidShape { field: "features", expected: "an array" });
    };

    Ok(items.iter().filter_map(Value::as_str).filter_map(Feature::from_key).collect())
}

fn normalize_narrative(value: &Value) -> Result<String, ValidationError> {
    match value {
        Value::String(text) => Ok(text.trim().to_string()),
        Value::Object(fields) => match fields.get("currentSituation") {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(text)) => Ok(text.trim().to_string()),
            Some(_) => Err(ValidationError::InvalidShape {
                field: "freeText.currentSituation",
                expected: "a string",
            }),
        },
        _ => Err(ValidationError::InvalidShape {
            field: "freeText",
            expected: "an object with `currentSituation`",
        }),
    }
}

fn normalize_follow_up(
    value: &Value,
) -> Result<Option<BTreeMap<String, String>>, ValidationError> {
    let Value::Object(entries) = value else {
        return Err(ValidationError::InvalidShape { field: "context", expected: "an object" });
    };

    let mut answers = BTreeMap::new();
    for (key, raw) in entries {
        let answer = match raw {
            Value::String(text) => text.trim().to_string(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            _ => String::new(),
        };
        let key = key.trim();
        if !key.is_empty() && !answer.is_empty() {
            answers.insert(key.to_string(), answer);
        }
    }

    Ok((!answers.is_empty()).then_some(answers))
}

fn clamp_slider(value: i64) -> u8 {
    value.clamp(i64::from(SLIDER_MIN), i64::from(SLIDER_MAX)) as u8
}

fn compact_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|character| !matches!(character, '_' | '-' | ' '))
        .map(|character| character.to_ascii_lowercase())
        .collect()
}
