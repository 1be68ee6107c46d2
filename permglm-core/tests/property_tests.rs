//! Property-based tests for the partition and the testers.
//!
//! Uses proptest to check invariants that must hold for any well-posed
//! design, contrast and shuffle.

use permglm_core::{
    ColumnImporter, GlmTest, Hypothesis, MatrixImporter, TestFixedHeteroscedastic,
    TestFixedHomoscedastic, TestOptions, TestVariableHeteroscedastic, TestVariableHomoscedastic,
    VarianceGroups,
};
use permglm_linalg::{pinv, rank, DenseMatrix};
use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

fn random_matrix(rng: &mut impl Rng, nrows: usize, ncols: usize) -> DenseMatrix {
    DenseMatrix::from_fn(nrows, ncols, |_, _| rng.gen::<f64>() * 2.0 - 1.0)
}

/// Intercept plus `p - 1` random covariates.
fn random_design(rng: &mut impl Rng, n: usize, p: usize) -> DenseMatrix {
    DenseMatrix::full(n, 1, 1.0).hstack(&random_matrix(rng, n, p - 1))
}

/// Random sign-flipped permutation matrix.
fn random_shuffle(rng: &mut impl Rng, n: usize) -> DenseMatrix {
    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(rng);
    let signs: Vec<f64> = (0..n)
        .map(|_| if rng.gen::<bool>() { 1.0 } else { -1.0 })
        .collect();
    DenseMatrix::from_fn(n, n, |i, j| if perm[i] == j { signs[i] } else { 0.0 })
}

// ---------------------------------------------------------------------------
// 1. Partition: [X | Z] spans the design and the ranks add up
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_partition_spans_design(
        n in 8usize..20,
        p in 2usize..5,
        s in 1usize..3,
        seed in 0u64..1000,
    ) {
        let s = s.min(p);
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        let design = random_design(&mut rng, n, p);
        let c = random_matrix(&mut rng, s, p);
        let h = Hypothesis::f_test(c, 0).unwrap();
        let partition = h.partition(&design);

        prop_assert_eq!(partition.rank_x, h.rank());
        prop_assert_eq!(partition.rank_x + partition.rank_z, rank(&design));
        let xz = partition.x.hstack(&partition.z);
        prop_assert_eq!(rank(&xz), rank(&design));
        // Nothing in [X | Z] lies outside the column space of the design
        let outside = design.mat_mul(&pinv(&design)).identity_minus().mat_mul(&xz);
        prop_assert!(outside.frobenius_norm() < 1e-8 * (1.0 + xz.frobenius_norm()));
    }
}

// ---------------------------------------------------------------------------
// 2. A single variance group reduces G to F
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_single_group_g_equals_f(
        n in 10usize..24,
        p in 2usize..4,
        seed in 0u64..1000,
    ) {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        let design = random_design(&mut rng, n, p);
        let y = random_matrix(&mut rng, n, 3);
        let mut t_row = vec![0.0; p];
        t_row[1] = 1.0;
        let h = vec![
            Hypothesis::t_test(&t_row, 0).unwrap(),
            Hypothesis::f_test(DenseMatrix::identity(p).select_rows(&[0, 1]), 0).unwrap(),
        ];
        let vg = VarianceGroups::new(vec![0; n]).unwrap();
        let shuffle = random_shuffle(&mut rng, n);

        let homo = TestFixedHomoscedastic::new(&y, &design, &h).unwrap().evaluate(&shuffle).unwrap();
        let hetero = TestFixedHeteroscedastic::new(&y, &design, &h, &vg)
            .unwrap()
            .evaluate(&shuffle)
            .unwrap();
        for ie in 0..3 {
            for ih in 0..2 {
                let (a, b) = (homo.get(ie, ih), hetero.get(ie, ih));
                prop_assert!((a - b).abs() < 1e-6 * (1.0 + a.abs()), "{} vs {}", a, b);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Element-wise tester with complete data equals the fixed tester
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn prop_complete_variable_equals_fixed(
        n in 10usize..20,
        seed in 0u64..1000,
    ) {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        let fixed_part = random_design(&mut rng, n, 2);
        let extra = random_matrix(&mut rng, n, 2);
        let y = random_matrix(&mut rng, n, 2);
        let h = vec![Hypothesis::t_test(&[0.0, 0.0, 1.0], 0).unwrap()];
        let importers: Vec<Box<dyn ColumnImporter>> =
            vec![Box::new(MatrixImporter::new(extra.clone()))];
        let shuffle = random_shuffle(&mut rng, n);

        let variable = TestVariableHomoscedastic::new(
            &importers,
            &y,
            &fixed_part,
            &h,
            TestOptions::detect(&y, &importers),
        )
        .unwrap();
        let out = variable.evaluate(&shuffle).unwrap();

        for ie in 0..2 {
            let design = fixed_part.hstack(&extra.select_cols(&[ie]));
            let y_e = y.select_cols(&[ie]);
            let expected = TestFixedHomoscedastic::new(&y_e, &design, &h)
                .unwrap()
                .evaluate(&shuffle)
                .unwrap();
            let (a, b) = (out.get(ie, 0), expected.get(0, 0));
            // Both zero when the element-wise design is rejected as ill-conditioned
            prop_assert!(a == 0.0 || (a - b).abs() < 1e-6 * (1.0 + b.abs()), "{} vs {}", a, b);
        }
    }
}

// ---------------------------------------------------------------------------
// 4. Same for the G statistic with two variance groups
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn prop_complete_variable_heteroscedastic_equals_fixed(
        n in 12usize..24,
        seed in 0u64..1000,
    ) {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        let fixed_part = random_design(&mut rng, n, 2);
        let extra = random_matrix(&mut rng, n, 2);
        let y = random_matrix(&mut rng, n, 2);
        let h = vec![
            Hypothesis::t_test(&[0.0, 0.0, 1.0], 0).unwrap(),
            Hypothesis::f_test(DenseMatrix::identity(3).select_rows(&[1, 2]), 0).unwrap(),
        ];
        let vg = VarianceGroups::new((0..n).map(|i| i % 2).collect()).unwrap();
        let importers: Vec<Box<dyn ColumnImporter>> =
            vec![Box::new(MatrixImporter::new(extra.clone()))];
        let shuffle = random_shuffle(&mut rng, n);

        let variable = TestVariableHeteroscedastic::new(
            &importers,
            &y,
            &fixed_part,
            &h,
            &vg,
            TestOptions::detect(&y, &importers),
        )
        .unwrap();
        let out = variable.evaluate(&shuffle).unwrap();

        for ie in 0..2 {
            let design = fixed_part.hstack(&extra.select_cols(&[ie]));
            let y_e = y.select_cols(&[ie]);
            let expected = TestFixedHeteroscedastic::new(&y_e, &design, &h, &vg)
                .unwrap()
                .evaluate(&shuffle)
                .unwrap();
            for ih in 0..2 {
                let (a, b) = (out.get(ie, ih), expected.get(0, ih));
                prop_assert!(a == 0.0 || (a - b).abs() < 1e-6 * (1.0 + b.abs()), "{} vs {}", a, b);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 5. Masking below the retained-input floor always zeroes the row
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_masking_floor(
        n in 8usize..16,
        seed in 0u64..1000,
    ) {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        let design = random_design(&mut rng, n, 2);
        let mut y = random_matrix(&mut rng, n, 1);
        // Floor is min(n, 4); keep three inputs
        let mut rows: Vec<usize> = (0..n).collect();
        rows.shuffle(&mut rng);
        for &row in &rows[3..] {
            y.set(row, 0, f64::NAN);
        }
        let h = vec![
            Hypothesis::t_test(&[0.0, 1.0], 0).unwrap(),
            Hypothesis::f_test(DenseMatrix::identity(2), 0).unwrap(),
        ];
        let tester = TestVariableHomoscedastic::new(&[], &y, &design, &h, TestOptions::default()).unwrap();
        let out = tester.evaluate(&random_shuffle(&mut rng, n)).unwrap();
        prop_assert_eq!(out.row(0), vec![0.0, 0.0]);
    }
}
