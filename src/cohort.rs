use std::fmt;

use serde::Serialize;

// Thresholds must be ascending.
pub fn first_at_most<T: Copy>(value: f64, table: &[(f64, T)], fallback: T) -> T {
    table
        .iter()
        .find(|(threshold, _)| value <= *threshold)
        .map(|(_, label)| *label)
        .unwrap_or(fallback)
}

/// Change-magnitude cohort. Declaration order is classifier evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Bucket {
    Increased,
    Decreased0To9,
    Decreased10To19,
    Decreased20To29,
    Decreased30To39,
    Decreased40To49,
    Decreased50To59,
    Decreased60OrMore,
}

const BUCKET_THRESHOLDS: [(f64, Bucket); 7] = [
    (0.0, Bucket::Increased),
    (10.0, Bucket::Decreased0To9),
    (20.0, Bucket::Decreased10To19),
    (30.0, Bucket::Decreased20To29),
    (40.0, Bucket::Decreased30To39),
    (50.0, Bucket::Decreased40To49),
    (60.0, Bucket::Decreased50To59),
];

impl Bucket {
    pub const ALL: [Bucket; 8] = [
        Bucket::Increased,
        Bucket::Decreased0To9,
        Bucket::Decreased10To19,
        Bucket::Decreased20To29,
        Bucket::Decreased30To39,
        Bucket::Decreased40To49,
        Bucket::Decreased50To59,
        Bucket::Decreased60OrMore,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Bucket::Increased => "increased",
            Bucket::Decreased0To9 => "decreased by 0-9%",
            Bucket::Decreased10To19 => "decreased by 10-19%",
            Bucket::Decreased20To29 => "decreased by 20-29%",
            Bucket::Decreased30To39 => "decreased by 30-39%",
            Bucket::Decreased40To49 => "decreased by 40-49%",
            Bucket::Decreased50To59 => "decreased by 50-59%",
            Bucket::Decreased60OrMore => "decreased by >=60%",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Buckets a percent change (decline positive). Upper bounds are inclusive;
/// NaN falls through to the last band.
pub fn classify(percent_change: f64) -> Bucket {
    first_at_most(percent_change, &BUCKET_THRESHOLDS, Bucket::Decreased60OrMore)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum IncomeBand {
    Below50k,
    From50k,
    From60k,
    From70k,
    From80k,
    From90k,
    Above100k,
}

const INCOME_THRESHOLDS: [(f64, IncomeBand); 6] = [
    (50_000.0, IncomeBand::Below50k),
    (60_000.0, IncomeBand::From50k),
    (70_000.0, IncomeBand::From60k),
    (80_000.0, IncomeBand::From70k),
    (90_000.0, IncomeBand::From80k),
    (100_000.0, IncomeBand::From90k),
];

impl IncomeBand {
    pub const ALL: [IncomeBand; 7] = [
        IncomeBand::Below50k,
        IncomeBand::From50k,
        IncomeBand::From60k,
        IncomeBand::From70k,
        IncomeBand::From80k,
        IncomeBand::From90k,
        IncomeBand::Above100k,
    ];

    // Bands close on the round number, so exactly 60000 is still "50000 - 59999".
    pub fn of(household_income: i64) -> Self {
        first_at_most(
            household_income as f64,
            &INCOME_THRESHOLDS,
            IncomeBand::Above100k,
        )
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            IncomeBand::Below50k => "<50000",
            IncomeBand::From50k => "50000 - 59999",
            IncomeBand::From60k => "60000 - 69999",
            IncomeBand::From70k => "70000 - 79999",
            IncomeBand::From80k => "80000 - 89999",
            IncomeBand::From90k => "90000 - 99999",
            IncomeBand::Above100k => ">100000",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn non_positive_change_is_increased() {
        assert_eq!(classify(0.0), Bucket::Increased);
        assert_eq!(classify(-5.0), Bucket::Increased);
        assert_eq!(classify(-40.0), Bucket::Increased);
    }

    #[test]
    fn upper_bounds_are_inclusive() {
        assert_eq!(classify(10.0), Bucket::Decreased0To9);
        assert_eq!(classify(10.01), Bucket::Decreased10To19);
        assert_eq!(classify(20.0), Bucket::Decreased10To19);
        assert_eq!(classify(60.0), Bucket::Decreased50To59);
        assert_eq!(classify(60.01), Bucket::Decreased60OrMore);
    }

    #[test]
    fn every_band_is_reachable() {
        let samples = [-1.0, 5.0, 15.0, 25.0, 35.0, 45.0, 55.0, 95.0];
        let buckets: Vec<Bucket> = samples.iter().map(|&v| classify(v)).collect();
        assert_eq!(buckets, Bucket::ALL.to_vec());
    }

    #[test]
    fn first_match_uses_fallback_past_table_end() {
        let table = [(1.0, 'a'), (2.0, 'b')];
        assert_eq!(first_at_most(0.5, &table, 'z'), 'a');
        assert_eq!(first_at_most(2.0, &table, 'z'), 'b');
        assert_eq!(first_at_most(2.5, &table, 'z'), 'z');
        assert_eq!(first_at_most(2.5, &[], 'z'), 'z');
    }

    #[test]
    fn income_bands_close_on_round_numbers() {
        assert_eq!(IncomeBand::of(0), IncomeBand::Below50k);
        assert_eq!(IncomeBand::of(50_000), IncomeBand::Below50k);
        assert_eq!(IncomeBand::of(50_001), IncomeBand::From50k);
        assert_eq!(IncomeBand::of(75_250), IncomeBand::From70k);
        assert_eq!(IncomeBand::of(100_000), IncomeBand::From90k);
        assert_eq!(IncomeBand::of(100_001), IncomeBand::Above100k);
    }

    #[test]
    fn income_band_index_round_trips() {
        for band in IncomeBand::ALL {
            assert_eq!(IncomeBand::from_index(band.index()), Some(band));
        }
        assert_eq!(IncomeBand::from_index(7), None);
    }

    proptest! {
        #[test]
        fn classification_is_monotonic(a in -200.0f64..200.0, b in -200.0f64..200.0) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(classify(low) <= classify(high));
        }
    }
}
