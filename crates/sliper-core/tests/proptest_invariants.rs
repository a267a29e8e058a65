use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use sliper_core::kernel::predict;
use sliper_core::time_window::{date_range, TimeWindow};
use sliper_core::{
    classify, divide_time_range, AlertBand, AlertStyles, AlertThresholdTable, BandRange, KernelKind, Matrix,
    PartitionSettings, ThresholdSet, TrainedModel,
};

const MAX_TESTED_COUNT: u64 = 200;

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Contiguous threshold set built from four strictly increasing cut points.
fn threshold_set() -> impl Strategy<Value = ThresholdSet> {
    proptest::collection::btree_set(0u64..60, 4).prop_map(|cuts| {
        let c: Vec<u64> = cuts.into_iter().collect();
        ThresholdSet {
            white: BandRange::new(Some(0), Some(c[0])),
            green: BandRange::new(Some(c[0] + 1), Some(c[1])),
            yellow: BandRange::new(Some(c[1] + 1), Some(c[2])),
            orange: BandRange::new(Some(c[2] + 1), Some(c[3])),
            red: BandRange::new(Some(c[3] + 1), None),
        }
    })
}

fn model_strategy(k: usize, m: usize) -> impl Strategy<Value = TrainedModel> {
    (
        proptest::collection::vec(-2.0f64..2.0, k * m),
        proptest::collection::vec(0.5f64..4.0, m),
        proptest::collection::vec(-1.0f64..1.0, m),
        proptest::collection::vec(-3.0f64..3.0, k),
        prop_oneof![
            Just(KernelKind::Polynomial),
            Just(KernelKind::Linear),
            Just(KernelKind::Gaussian)
        ],
        (1u32..4).prop_map(f64::from),
    )
        .prop_map(move |(center, scale, mean, coefficients, kind, exponent)| {
            TrainedModel::new(
                Matrix::new(center, k, m).unwrap(),
                scale,
                mean,
                coefficients,
                kind,
                exponent,
            )
            .unwrap()
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn classification_contains_the_count(set in threshold_set(), count in 0u64..=MAX_TESTED_COUNT) {
        let table = AlertThresholdTable::new([("d".to_string(), set.clone())].into_iter().collect()).unwrap();
        let c = classify("d", count, &table, &AlertStyles::default()).unwrap();
        let alert = c.alert().expect("a valid table leaves no gaps");
        prop_assert!(set.range(alert.band).contains(count));
    }

    #[test]
    fn valid_tables_partition_the_counts(set in threshold_set()) {
        prop_assert!(set.validate().is_ok());
        for count in 0..=MAX_TESTED_COUNT {
            let hits = AlertBand::ALL.iter().filter(|&&b| set.range(b).contains(count)).count();
            prop_assert_eq!(hits, 1, "count {} matched {} bands", count, hits);
        }
    }

    #[test]
    fn prediction_is_deterministic(
        model in model_strategy(4, 3),
        rows in proptest::collection::vec(proptest::collection::vec(-5.0f64..5.0, 3), 1..8),
    ) {
        let features = Matrix::from_rows(&rows).unwrap();
        let first = predict(&features, &model).unwrap();
        let second = predict(&features, &model).unwrap();
        prop_assert_eq!(first.len(), rows.len());
        prop_assert!(first.iter().zip(&second).all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn column_slicing_matches_a_narrow_model(
        model in model_strategy(3, 4),
        m in 1usize..=4,
        rows in proptest::collection::vec(proptest::collection::vec(-5.0f64..5.0, 4), 1..6),
    ) {
        let narrow_rows: Vec<Vec<f64>> = rows.iter().map(|r| r[..m].to_vec()).collect();
        let features = Matrix::from_rows(&narrow_rows).unwrap();

        let sliced = predict(&features, &model).unwrap();

        let center_rows: Vec<Vec<f64>> = (0..model.center.rows)
            .map(|r| model.center.row(r)[..m].to_vec())
            .collect();
        let narrow = TrainedModel::new(
            Matrix::from_rows(&center_rows).unwrap(),
            model.scale[..m].to_vec(),
            model.mean[..m].to_vec(),
            model.coefficients.clone(),
            model.kernel_kind,
            model.exponent,
        )
        .unwrap();
        prop_assert_eq!(narrow.width(), m);
        let direct = predict(&features, &narrow).unwrap();

        prop_assert!(sliced.iter().zip(&direct).all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn partition_covers_every_instant_once(
        span_hours in 1i64..240,
        pivot_offset in 0i64..240,
        obs in 1u32..72,
        fc in 1u32..96,
    ) {
        let start = base_time();
        let index = date_range(start, start + Duration::hours(span_hours), &TimeWindow::hours(1));
        let pivot = start + Duration::hours(pivot_offset.min(span_hours));
        let settings = PartitionSettings {
            observed_hours: TimeWindow::hours(obs),
            forecast_hours: TimeWindow::hours(fc),
            ..PartitionSettings::default()
        };

        let table = divide_time_range(&index, pivot, &settings).unwrap();

        let mut covered: Vec<NaiveDateTime> = table
            .periods
            .iter()
            .flat_map(|p| p.time_range.iter().copied())
            .collect();
        covered.sort();
        prop_assert_eq!(covered, index);
        prop_assert!(table.mixed().count() <= 1);
    }
}
