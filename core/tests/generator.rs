//! Assignment table generator tests.

use randomization_core::{
    error::RandError,
    generator::{generate, GeneratorParams, StratificationFactor, Strata, MAX_ROWS_PER_STRATUM, MAX_TABLE_ROWS},
    simple::ArmCounts,
    types::Treatment,
};
use std::collections::HashSet;

fn params(target_n: usize, block_size: usize, oversample: f64) -> GeneratorParams {
    GeneratorParams {
        total_target_n:    target_n,
        block_size,
        oversample_factor: oversample,
    }
}

fn site_age() -> Strata {
    Strata::cross(&[
        StratificationFactor::new("site", &["1", "2", "3"]),
        StratificationFactor::new("age", &["under50", "50plus"]),
    ])
    .unwrap()
}

/// block_size=4, target 8, one stratum: at least two blocks, and the
/// first eight labels split exactly 4/4.
#[test]
fn single_stratum_first_eight_balanced() {
    let strata = Strata::Stratified(vec!["only".into()]);
    let table = generate(&params(8, 4, 1.0), &strata, 42).unwrap();

    assert!(table.len() >= 8);
    let first_eight: Vec<Treatment> = table.rows().iter().take(8).map(|r| r.treatment).collect();
    let counts = ArmCounts::tally(&first_eight);
    assert_eq!(counts.intervention, 4);
    assert_eq!(counts.control, 4);
}

/// Every block-multiple prefix of every stratum is exactly balanced.
#[test]
fn every_block_prefix_balanced_per_stratum() {
    for block_size in [2usize, 4, 6, 8] {
        for seed in 0..20u64 {
            let table = generate(&params(30, block_size, 1.5), &site_age(), seed).unwrap();
            assert!(table.is_block_balanced(), "block_size={block_size} seed={seed}");

            for stratum in table.partitions() {
                let mut counts = ArmCounts::default();
                for (i, row) in table.partition(stratum).enumerate() {
                    match row.treatment {
                        Treatment::Intervention => counts.intervention += 1,
                        Treatment::Control      => counts.control += 1,
                    }
                    if (i + 1) % block_size == 0 {
                        assert_eq!(counts.imbalance(), 0, "stratum {stratum:?} prefix {}", i + 1);
                    }
                }
            }
        }
    }
}

#[test]
fn rows_cover_target_with_oversampling() {
    let p = params(50, 4, 2.0);
    let table = generate(&p, &site_age(), 3).unwrap();
    assert_eq!(p.blocks_per_stratum(), 25);
    for stratum in table.partitions() {
        assert_eq!(table.partition(stratum).count(), 100);
    }
    assert_eq!(table.len(), 600);
}

#[test]
fn rows_never_fewer_than_target() {
    let table = generate(&params(9, 4, 1.0), &Strata::Unstratified, 1).unwrap();
    assert_eq!(table.len(), 12);
}

#[test]
fn identifiers_unique_across_table() {
    let table = generate(&params(40, 4, 2.0), &site_age(), 9).unwrap();
    let ids: HashSet<&str> = table.rows().iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids.len(), table.len());
}

#[test]
fn identifier_formats() {
    let flat = generate(&params(8, 4, 1.0), &Strata::Unstratified, 1).unwrap();
    assert_eq!(flat.rows()[0].identifier, "001");
    assert_eq!(flat.rows()[7].identifier, "008");
    assert!(flat.rows().iter().all(|r| r.stratum.is_none()));

    let stratified = generate(&params(8, 4, 1.0), &site_age(), 1).unwrap();
    assert_eq!(stratified.rows()[0].identifier, "1_under50-001");
    assert_eq!(stratified.rows()[8].identifier, "1_50plus-001");
    assert_eq!(stratified.rows()[8].stratum.as_deref(), Some("1_50plus"));
}

#[test]
fn rows_start_unconsumed_and_stratum_major() {
    let table = generate(&params(8, 4, 1.0), &site_age(), 5).unwrap();
    assert!(table.rows().iter().all(|r| !r.randomized));

    let order: Vec<&str> = table
        .rows()
        .iter()
        .map(|r| r.stratum.as_deref().unwrap())
        .fold(Vec::new(), |mut acc, s| {
            if acc.last() != Some(&s) {
                acc.push(s);
            }
            acc
        });
    assert_eq!(
        order,
        vec!["1_under50", "1_50plus", "2_under50", "2_50plus", "3_under50", "3_50plus"]
    );
}

#[test]
fn invalid_parameters_fail_fast() {
    let strata = Strata::Unstratified;
    assert!(matches!(
        generate(&params(8, 3, 1.0), &strata, 1),
        Err(RandError::InvalidBlockSize { block_size: 3 })
    ));
    assert!(matches!(
        generate(&params(8, 0, 1.0), &strata, 1),
        Err(RandError::InvalidBlockSize { block_size: 0 })
    ));
    assert!(matches!(
        generate(&params(0, 4, 1.0), &strata, 1),
        Err(RandError::InvalidTargetSize)
    ));
    assert!(matches!(
        generate(&params(8, 4, 0.5), &strata, 1),
        Err(RandError::InvalidOversample { .. })
    ));
    assert!(matches!(
        generate(&params(8, 4, f64::INFINITY), &strata, 1),
        Err(RandError::InvalidOversample { .. })
    ));
}

#[test]
fn empty_stratification_rejected() {
    assert!(matches!(
        generate(&params(8, 4, 1.0), &Strata::Stratified(vec![]), 1),
        Err(RandError::EmptyStrata)
    ));
    assert!(matches!(Strata::cross(&[]), Err(RandError::EmptyStrata)));
    assert!(matches!(
        Strata::cross(&[StratificationFactor::new("site", &[])]),
        Err(RandError::EmptyStrata)
    ));
}

#[test]
fn duplicate_strata_rejected() {
    let strata = Strata::Stratified(vec!["a".into(), "b".into(), "a".into()]);
    let err = generate(&params(8, 4, 1.0), &strata, 1).unwrap_err();
    assert!(matches!(err, RandError::DuplicateStratum { label } if label == "a"));
}

/// Oversized or overflowing requests fail with an error instead of
/// panicking or exhausting memory.
#[test]
fn oversized_tables_rejected() {
    let strata = Strata::Unstratified;
    for (target_n, oversample) in [(usize::MAX / 2, 4.0), (usize::MAX, 1.0), (MAX_ROWS_PER_STRATUM + 1, 1.0)] {
        let err = generate(&params(target_n, 4, oversample), &strata, 1).unwrap_err();
        assert!(
            matches!(err, RandError::TableTooLarge { max, .. } if max == MAX_ROWS_PER_STRATUM),
            "target_n={target_n}: {err}"
        );
    }
    assert!(matches!(
        generate(&params(MAX_ROWS_PER_STRATUM / 2, 4, 3.0), &strata, 1),
        Err(RandError::TableTooLarge { .. })
    ));
}

#[test]
fn too_many_strata_rejected() {
    let labels: Vec<String> = (0..11).map(|i| format!("s{i}")).collect();
    let err = generate(&params(MAX_ROWS_PER_STRATUM, 4, 1.0), &Strata::Stratified(labels), 1)
        .unwrap_err();
    assert!(matches!(err, RandError::TableTooLarge { max, .. } if max == MAX_TABLE_ROWS));
}

#[test]
fn blank_stratum_labels_rejected() {
    for blank in ["", "  "] {
        let strata = Strata::Stratified(vec!["a".into(), blank.into()]);
        assert!(matches!(
            generate(&params(8, 4, 1.0), &strata, 1),
            Err(RandError::BlankStratum)
        ));
    }
    let from_factor = Strata::cross(&[StratificationFactor::new("site", &[""])]).unwrap();
    assert!(matches!(
        generate(&params(8, 4, 1.0), &from_factor, 1),
        Err(RandError::BlankStratum)
    ));
}
