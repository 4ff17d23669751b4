//! Deterministic scoring stages and the aggregator.
//!
//! Each table row is an [`ItemDeltas`] with one named field per catalog item, so a
//! new catalog entry does not compile until every row says what it does to it.

pub mod aggregate;
pub mod features;
pub mod keywords;
pub mod sliders;

use crate::domain::catalog::{PumpModel, CATALOG};

pub use aggregate::{aggregate, rank, MAX_ALTERNATIVES};
pub use features::{feature_deltas, FeatureStage, FEATURE_RULES};
pub use keywords::{keyword_scan, KeywordScan, KeywordScanStage, KEYWORD_CEILING, KEYWORD_RULES};
pub use sliders::{slider_deltas, SliderStage, SLIDER_RULES};

/// Signed delta for every catalog item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemDeltas {
    pub medtronic_780g: i32,
    pub tslim_x2: i32,
    pub tandem_mobi: i32,
    pub omnipod_5: i32,
    pub ilet: i32,
    pub twiist: i32,
}

impl ItemDeltas {
    pub const ZERO: Self = Self::new([0; 6]);

    /// Builds a row in catalog order.
    pub const fn new(values: [i32; 6]) -> Self {
        Self {
            medtronic_780g: values[0],
            tslim_x2: values[1],
            tandem_mobi: values[2],
            omnipod_5: values[3],
            ilet: values[4],
            twiist: values[5],
        }
    }

    pub const fn get(&self, item: PumpModel) -> i32 {
        match item {
            PumpModel::Medtronic780g => self.medtronic_780g,
            PumpModel::TslimX2 => self.tslim_x2,
            PumpModel::TandemMobi => self.tandem_mobi,
            PumpModel::Omnipod5 => self.omnipod_5,
            PumpModel::Ilet => self.ilet,
            PumpModel::Twiist => self.twiist,
        }
    }

    /// Non-zero deltas in catalog order.
    pub fn non_zero(&self) -> impl Iterator<Item = (PumpModel, i32)> + '_ {
        CATALOG.into_iter().map(|item| (item, self.get(item))).filter(|(_, delta)| *delta != 0)
    }
}

/// Reason attached to an entry, by sign of the delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleReasons {
    pub boost: &'static str,
    pub penalty: &'static str,
}

impl RuleReasons {
    pub const fn for_delta(&self, delta: i32) -> &'static str {
        if delta < 0 {
            self.penalty
        } else {
            self.boost
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ItemDeltas;
    use crate::domain::catalog::{PumpModel, CATALOG};

    #[test]
    fn new_follows_catalog_order() {
        let row = ItemDeltas::new([1, 2, 3, 4, 5, 6]);
        for (index, item) in CATALOG.iter().enumerate() {
            assert_eq!(row.get(*item), index as i32 + 1);
        }
    }

    #[test]
    fn non_zero_skips_neutral_items() {
        let row = ItemDeltas::new([0, -2, 0, 8, 0, 0]);
        let collected = row.non_zero().collect::<Vec<_>>();
        assert_eq!(collected, vec![(PumpModel::TslimX2, -2), (PumpModel::Omnipod5, 8)]);
        assert_eq!(ItemDeltas::ZERO.non_zero().count(), 0);
    }
}
