//! Fixed pump catalog.
//!
//! The catalog is a closed enumeration known at deploy time. Every scoring table
//! is keyed by [`PumpModel`], so adding a model is a compile error until every
//! table covers it.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpModel {
    #[serde(rename = "medtronic_780g")]
    Medtronic780g,
    TslimX2,
    TandemMobi,
    #[serde(rename = "omnipod_5")]
    Omnipod5,
    Ilet,
    Twiist,
}

/// Catalog order. Ties in the final ranking fall back to this order.
pub const CATALOG: [PumpModel; 6] = [
    PumpModel::Medtronic780g,
    PumpModel::TslimX2,
    PumpModel::TandemMobi,
    PumpModel::Omnipod5,
    PumpModel::Ilet,
    PumpModel::Twiist,
];

impl PumpModel {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Medtronic780g => "medtronic_780g",
            Self::TslimX2 => "tslim_x2",
            Self::TandemMobi => "tandem_mobi",
            Self::Omnipod5 => "omnipod_5",
            Self::Ilet => "ilet",
            Self::Twiist => "twiist",
        }
    }

    /// Position in [`CATALOG`].
    pub const fn catalog_index(self) -> usize {
        match self {
            Self::Medtronic780g => 0,
            Self::TslimX2 => 1,
            Self::TandemMobi => 2,
            Self::Omnipod5 => 3,
            Self::Ilet => 4,
            Self::Twiist => 5,
        }
    }

    /// Resolves a catalog key, tolerating case and `-`/space separators.
    pub fn from_key(raw: &str) -> Option<Self> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|character| !matches!(character, '_' | '-' | ' ' | ':' | '.'))
            .collect::<String>();

        match normalized.as_str() {
            "medtronic780g" | "minimed780g" | "780g" => Some(Self::Medtronic780g),
            "tslimx2" | "tandemtslimx2" => Some(Self::TslimX2),
            "tandemmobi" | "mobi" => Some(Self::TandemMobi),
            "omnipod5" | "omnipod" => Some(Self::Omnipod5),
            "ilet" | "betabionicsilet" => Some(Self::Ilet),
            "twiist" | "sequeltwiist" => Some(Self::Twiist),
            _ => None,
        }
    }

    pub fn spec(self) -> &'static PumpSpec {
        &PUMP_SPECS[self.catalog_index()]
    }

    pub fn display_name(self) -> &'static str {
        self.spec().name
    }
}

impl fmt::Display for PumpModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Static, prompt-facing attributes of a catalog item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpSpec {
    pub model: PumpModel,
    pub name: &'static str,
    pub manufacturer: &'static str,
    pub tubeless: bool,
    pub form_factor: &'static str,
    pub water_resistance: &'static str,
    pub reservoir_units: u16,
    pub power: &'static str,
    pub controls: &'static str,
    pub cgm_compatibility: &'static [&'static str],
    pub algorithm: &'static str,
    pub carb_counting: &'static str,
    pub highlights: &'static [&'static str],
}

pub const PUMP_SPECS: [PumpSpec; 6] = [
    PumpSpec {
        model: PumpModel::Medtronic780g,
        name: "Medtronic MiniMed 780G",
        manufacturer: "Medtronic",
        tubeless: false,
        form_factor: "traditional tubed pump worn on a belt or in a pocket",
        water_resistance: "water resistant to 12 ft for 24 hours",
        reservoir_units: 300,
        power: "single replaceable AA battery",
        controls: "on-pump buttons and color screen",
        cgm_compatibility: &["Simplera Sync", "Guardian 4"],
        algorithm: "SmartGuard with automatic correction boluses and a 100 mg/dL target option",
        carb_counting: "required, with meal announcements",
        highlights: &[
            "Automatic correction boluses every few minutes for tight control",
            "Runs on a replaceable AA battery, no charging required",
            "300-unit reservoir for higher insulin needs",
        ],
    },
    PumpSpec {
        model: PumpModel::TslimX2,
        name: "Tandem t:slim X2",
        manufacturer: "Tandem Diabetes Care",
        tubeless: false,
        form_factor: "slim tubed pump with a color touchscreen",
        water_resistance: "watertight to 3 ft for 30 minutes",
        reservoir_units: 300,
        power: "rechargeable battery",
        controls: "color touchscreen and mobile bolus from a phone app",
        cgm_compatibility: &["Dexcom G6", "Dexcom G7", "FreeStyle Libre 2 Plus"],
        algorithm: "Control-IQ predictive basal adjustment with automatic corrections",
        carb_counting: "required",
        highlights: &[
            "Familiar color touchscreen interface",
            "300-unit cartridge with rechargeable battery",
            "Works with several CGM options",
        ],
    },
    PumpSpec {
        model: PumpModel::TandemMobi,
        name: "Tandem Mobi",
        manufacturer: "Tandem Diabetes Care",
        tubeless: false,
        form_factor: "the smallest durable tubed pump, wearable on-body or in a pocket",
        water_resistance: "water resistant to 8 ft for 60 minutes",
        reservoir_units: 200,
        power: "rechargeable battery with wireless charging",
        controls: "fully controlled from a smartphone app, one physical button",
        cgm_compatibility: &["Dexcom G6", "Dexcom G7", "FreeStyle Libre 3 Plus"],
        algorithm: "Control-IQ+ predictive basal adjustment",
        carb_counting: "required",
        highlights: &[
            "Smallest durable pump available",
            "Full control from your phone",
            "Short tubing and on-body wear options",
        ],
    },
    PumpSpec {
        model: PumpModel::Omnipod5,
        name: "Omnipod 5",
        manufacturer: "Insulet",
        tubeless: true,
        form_factor: "completely tubeless patch pod worn directly on the skin",
        water_resistance: "waterproof pod to 25 ft for 60 minutes",
        reservoir_units: 200,
        power: "built into each disposable pod; controller is rechargeable",
        controls: "handheld controller or compatible smartphone app",
        cgm_compatibility: &["Dexcom G6", "Dexcom G7", "FreeStyle Libre 2 Plus"],
        algorithm: "SmartAdjust automated insulin delivery",
        carb_counting: "required",
        highlights: &[
            "Completely tubeless pod design",
            "Waterproof for swimming and water sports",
            "Small, discreet pod worn under clothing",
        ],
    },
    PumpSpec {
        model: PumpModel::Ilet,
        name: "Beta Bionics iLet",
        manufacturer: "Beta Bionics",
        tubeless: false,
        form_factor: "tubed pump with a touchscreen",
        water_resistance: "water resistant to 12 ft for 30 minutes",
        reservoir_units: 160,
        power: "rechargeable battery",
        controls: "touchscreen",
        cgm_compatibility: &["Dexcom G6", "Dexcom G7", "FreeStyle Libre 3 Plus"],
        algorithm: "bionic pancreas initialised from body weight only",
        carb_counting: "not required; meals are announced as usual, more, or less",
        highlights: &[
            "No carb counting required",
            "Initialised from body weight alone, minimal settings to manage",
            "Hands-off automated dosing",
        ],
    },
    PumpSpec {
        model: PumpModel::Twiist,
        name: "Sequel twiist",
        manufacturer: "Sequel Med Tech",
        tubeless: false,
        form_factor: "lightweight tubed pump",
        water_resistance: "water resistant to 3 ft for 60 minutes",
        reservoir_units: 300,
        power: "rechargeable batteries",
        controls: "iPhone app and Apple Watch bolus",
        cgm_compatibility: &["FreeStyle Libre 3 Plus", "Eversense 365"],
        algorithm: "Tidepool Loop based automation",
        carb_counting: "required, with flexible meal entry",
        highlights: &[
            "Bolus from your Apple Watch",
            "Lightweight with a 300-unit reservoir",
            "Acoustic sensing measures every delivered dose",
        ],
    },
];
