use std::io::Write;
use tempfile::NamedTempFile;
use trellis_rs::config::NormParams;
use trellis_rs::dict::{Layout, SeqDict};
use trellis_rs::links::LinkRecord;
use trellis_rs::matrix::IntraMat;
use trellis_rs::norm::{qbinom, qla, NormModel};
use trellis_rs::ScafError;

// ── helpers ──────────────────────────────────────────────────────────────────

const RES: u32 = 1000;

/// One 60 kb contig; `counts[d]` pairs written into every cell at bin
/// distance `d`.
fn synthetic_intra(counts: &[u32]) -> IntraMat {
    let mut dict = SeqDict::new();
    dict.put("ctgA", 60_000).unwrap();
    let layout = Layout::from_dict(&dict);

    let mut file = NamedTempFile::new().expect("temp link file");
    for (d, &c) in counts.iter().enumerate() {
        for i in 0..(60 - d as u32) {
            let rec = LinkRecord {
                ref_a: 0,
                pos_a: i * RES + RES / 2,
                ref_b: 0,
                pos_b: (i + d as u32) * RES + RES / 2,
                mapq: 60,
            };
            for _ in 0..c {
                rec.write_to(&mut file).unwrap();
            }
        }
    }
    file.flush().unwrap();
    IntraMat::build(file.path(), &layout, None, RES, None, 0).expect("build intra")
}

// ── curve fitting ────────────────────────────────────────────────────────────

/// The fitted curve never increases with distance (isotonic smoothing pools
/// the 15/16 violation into a flat pair).
#[test]
fn fitted_curve_is_non_increasing() {
    let intra = synthetic_intra(&[20, 15, 16, 8, 5, 2]);
    let model = NormModel::fit(&intra, &NormParams::default()).expect("fit");

    for d in 0..model.r_max() {
        assert!(
            model.expected_at(d) >= model.expected_at(d + 1),
            "E[{d}] = {} < E[{}] = {}",
            model.expected_at(d),
            d + 1,
            model.expected_at(d + 1)
        );
    }
    assert!((model.expected_at(0) - 20.0).abs() < 1e-9, "E[0]");
    assert!((model.expected_at(1) - 15.5).abs() < 1e-9, "E[1] pooled with E[2]");
    assert!((model.expected_at(2) - 15.5).abs() < 1e-9, "E[2] pooled with E[1]");
    assert!((model.expected_at(3) - 8.0).abs() < 1e-9, "E[3]");
}

/// Buckets are truncated at the first one below the sample minimum: a 60-bin
/// sequence keeps distances with at least 30 cells.
#[test]
fn fit_truncates_underpopulated_buckets() {
    let intra = synthetic_intra(&[20, 15, 10, 8, 5, 2]);
    let model = NormModel::fit(&intra, &NormParams::default()).expect("fit");
    assert_eq!(model.r_max(), 30, "60 - d >= 30 holds up to d = 30");
    assert_eq!(model.expected_at(31), 0.0, "beyond the fit");
}

/// A sequence too short to populate even the first bucket signals NoBands.
#[test]
fn too_few_bands_is_an_error() {
    let mut dict = SeqDict::new();
    dict.put("tiny", 10_000).unwrap();
    let layout = Layout::from_dict(&dict);

    let mut file = NamedTempFile::new().expect("temp link file");
    LinkRecord { ref_a: 0, pos_a: 100, ref_b: 0, pos_b: 200, mapq: 60 }
        .write_to(&mut file)
        .unwrap();
    file.flush().unwrap();

    let intra = IntraMat::build(file.path(), &layout, None, RES, None, 0).expect("build");
    let err = NormModel::fit(&intra, &NormParams::default()).expect_err("10 bins < 30 samples");
    assert!(
        matches!(err.downcast_ref::<ScafError>(), Some(ScafError::NoBands)),
        "expected NoBands, got: {err}"
    );
}

// ── binomial quantile ────────────────────────────────────────────────────────

#[test]
fn qbinom_small_cases() {
    // Binomial(2, 0.5): CDF = 0.25, 0.75, 1.00.
    assert_eq!(qbinom(0.5, 2, 0.5), 1);
    assert_eq!(qbinom(0.8, 2, 0.5), 2);
    assert_eq!(qbinom(0.2, 2, 0.5), 0);

    assert_eq!(qbinom(0.99, 10, 0.0), 0, "degenerate at zero");
    assert_eq!(qbinom(0.99, 10, 1.0), 10, "degenerate at one");
    assert_eq!(qbinom(0.99, 0, 0.5), 0, "no trials");
}

/// The normal fallback for large n stays close to mean + z·sd.
#[test]
fn qbinom_large_n_approximation() {
    let k = qbinom(0.99, 1_000_000, 0.5);
    // mean 500_000, sd 500, z(0.99) ≈ 2.326.
    assert!((501_000..=501_400).contains(&k), "k = {k}");
}

#[test]
fn qla_edge_cases() {
    assert!(qla(0, 0.5, 0.99).is_infinite(), "no cells, nothing passes");
    assert_eq!(qla(100, 0.0, 0.99), 0.0, "no noise baseline");
    let q = qla(15, 0.05, 0.99);
    assert!(q > 0.05 && q < 0.5, "upper tail above the baseline, got {q}");
}
