use std::io::Write;
use tempfile::NamedTempFile;
use trellis_rs::agp;
use trellis_rs::breaks::{self, BreakKind, LinkProfile};
use trellis_rs::config::EcParams;
use trellis_rs::dict::{Layout, SeqDict};
use trellis_rs::links::LinkRecord;

// ── helpers ──────────────────────────────────────────────────────────────────

/// Deterministic intra pairs inside `[lo, hi)` with spans up to `max_span`.
fn intra_pairs(seq: u32, lo: u32, hi: u32, max_span: u32, n: u32, out: &mut Vec<LinkRecord>) {
    let width = hi - lo;
    for i in 0..n {
        let span = 1_000 + (i as u64 * 7_919 % (max_span as u64 - 1_000)) as u32;
        let a = lo + (i as u64 * 104_729 % (width - span) as u64) as u32;
        out.push(LinkRecord { ref_a: seq, pos_a: a, ref_b: seq, pos_b: a + span, mapq: 60 });
    }
}

fn write_links(records: &[LinkRecord]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp link file");
    for rec in records {
        rec.write_to(&mut file).expect("write record");
    }
    file.flush().unwrap();
    file
}

// ── contig-internal breaks ───────────────────────────────────────────────────

/// A 2 Mb contig whose halves share no cross pairs is cut near the midpoint,
/// and a second pass on the split layout finds nothing more.
#[test]
fn misjoined_contig_is_cut_once() {
    let mut dict = SeqDict::new();
    dict.put("chimera", 2_000_000).unwrap();
    let layout = Layout::from_dict(&dict);

    let mut records = Vec::new();
    intra_pairs(0, 0, 1_000_000, 500_000, 20_000, &mut records);
    intra_pairs(0, 1_000_000, 2_000_000, 500_000, 20_000, &mut records);
    let file = write_links(&records);

    let params = EcParams::default();
    let dist_thres = breaks::estimate_dist_thres(file.path(), &layout, &params).expect("estimate");
    assert!(dist_thres >= params.min_window, "floored at the minimum window");

    let profile =
        LinkProfile::build(file.path(), &layout, dist_thres, params.bin, 0.0, 0).expect("profile");
    let found = breaks::detect_internal(&profile, &layout, &params);
    assert_eq!(found.len(), 1, "exactly one cut: {found:?}");
    assert_eq!(found[0].kind, BreakKind::Internal);
    assert!(
        (995_000..=1_005_000).contains(&found[0].pos),
        "cut near the junction, got {}",
        found[0].pos
    );

    // Idempotence: re-detect on the split layout.
    let cuts: Vec<_> = found.iter().map(|b| (b.scaf, b.pos)).collect();
    let split = layout.with_breaks(&cuts);
    assert_eq!(split.n_scaffolds(), 2);
    let profile =
        LinkProfile::build(file.path(), &split, dist_thres, params.bin, 0.0, 0).expect("profile");
    let again = breaks::detect_internal(&profile, &split, &params);
    assert!(again.is_empty(), "second pass makes no new breaks: {again:?}");
}

/// A clean uniformly covered contig is left alone.
#[test]
fn clean_contig_is_not_cut() {
    let mut dict = SeqDict::new();
    dict.put("clean", 2_000_000).unwrap();
    let layout = Layout::from_dict(&dict);

    let mut records = Vec::new();
    intra_pairs(0, 0, 2_000_000, 500_000, 40_000, &mut records);
    let file = write_links(&records);

    let params = EcParams::default();
    let profile =
        LinkProfile::build(file.path(), &layout, 1_000_000, params.bin, 0.0, 0).expect("profile");
    let found = breaks::detect_internal(&profile, &layout, &params);
    assert!(found.is_empty(), "no breaks on clean coverage: {found:?}");
}

// ── scaffold-joint breaks ────────────────────────────────────────────────────

fn joined_layout(dict: &SeqDict) -> Layout {
    let mut agp_file = NamedTempFile::new().expect("temp AGP");
    writeln!(agp_file, "scaffold_1\t1\t1000000\t1\tW\tctgA\t1\t1000000\t+").unwrap();
    writeln!(
        agp_file,
        "scaffold_1\t1000001\t1000100\t2\tN\t100\tscaffold\tyes\tproximity_ligation"
    )
    .unwrap();
    writeln!(agp_file, "scaffold_1\t1000101\t2000100\t3\tW\tctgB\t1\t1000000\t+").unwrap();
    agp_file.flush().unwrap();
    agp::read_layout(dict, agp_file.path()).expect("parse AGP")
}

/// A join with no crossing support is cut at the segment boundary; the same
/// join with real crossing links is kept.
#[test]
fn unsupported_joint_is_cut() {
    let mut dict = SeqDict::new();
    dict.put("ctgA", 1_000_000).unwrap();
    dict.put("ctgB", 1_000_000).unwrap();
    let layout = joined_layout(&dict);

    let flank = 100_000u32;
    let params = EcParams::default();

    let mut records = Vec::new();
    intra_pairs(0, 0, 1_000_000, 400_000, 20_000, &mut records);
    intra_pairs(1, 0, 1_000_000, 400_000, 20_000, &mut records);
    let file = write_links(&records);

    let profile =
        LinkProfile::build(file.path(), &layout, flank * 2, params.bin, 0.0, 10).expect("profile");
    let found = breaks::detect_joint(&profile, &layout, flank, &params);
    assert_eq!(found.len(), 1, "the unsupported join is cut: {found:?}");
    assert_eq!(found[0].kind, BreakKind::Joint);
    assert_eq!(found[0].pos, 1_000_000, "cut lands at the segment boundary");

    let split = layout.with_breaks(&[(found[0].scaf, found[0].pos)]);
    assert_eq!(split.n_scaffolds(), 2, "the join is dissolved");

    // Now with genuine crossing pairs the join is supported.
    for i in 0..2_000u32 {
        let pa = 950_000 + (i * 761) % 50_000;
        let pb = (i * 337) % 50_000;
        records.push(LinkRecord { ref_a: 0, pos_a: pa, ref_b: 1, pos_b: pb, mapq: 60 });
    }
    let file = write_links(&records);
    let profile =
        LinkProfile::build(file.path(), &layout, flank * 2, params.bin, 0.0, 10).expect("profile");
    let found = breaks::detect_joint(&profile, &layout, flank, &params);
    assert!(found.is_empty(), "supported join is kept: {found:?}");
}

// ── distance threshold ───────────────────────────────────────────────────────

#[test]
fn dist_thres_tracks_the_span_quantile() {
    let mut dict = SeqDict::new();
    dict.put("ctgA", 1_000_000).unwrap();
    let layout = Layout::from_dict(&dict);

    let mut records = Vec::new();
    for i in 0..100u32 {
        records.push(LinkRecord { ref_a: 0, pos_a: i * 100, ref_b: 0, pos_b: i * 100 + 10_000, mapq: 60 });
    }
    for i in 0..900u32 {
        records.push(LinkRecord { ref_a: 0, pos_a: i * 100, ref_b: 0, pos_b: i * 100 + 30_000, mapq: 60 });
    }
    let file = write_links(&records);

    // With the floor disabled, the threshold lands on the 0.8 quantile bucket.
    let params = EcParams { min_window: 0, ..EcParams::default() };
    let thres = breaks::estimate_dist_thres(file.path(), &layout, &params).expect("estimate");
    assert_eq!(thres, 40_000, "spans of 30 kb fill the 0.8 quantile");

    // The default floor dominates small genomes.
    let thres =
        breaks::estimate_dist_thres(file.path(), &layout, &EcParams::default()).expect("estimate");
    assert_eq!(thres, 1_000_000);
}
