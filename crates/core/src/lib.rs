pub mod config;
pub mod domain;
pub mod errors;
pub mod fallback;
pub mod ledger;
pub mod pipeline;
pub mod scoring;

pub use config::{AppConfig, ConfigError, LlmConfig, LlmProvider, LoadOptions};
pub use domain::catalog::{PumpModel, PumpSpec, CATALOG, PUMP_SPECS};
pub use domain::profile::{Feature, PreferenceProfile, Slider, SliderBand};
pub use domain::recommendation::{
    ArbitrationVerdict, AuditTrail, ContextRefinement, ExtractedIntent, RankedChoice,
    Recommendation, StageOutcome, StageReport,
};
pub use errors::{InterfaceError, ValidationError};
pub use fallback::FallbackEngine;
pub use ledger::{EntrySource, LedgerEntry, ScoreLedger, StageKind, BASELINE_SCORE};
pub use pipeline::{PipelineContext, Stage, StageFailure};
