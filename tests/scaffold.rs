/// End-to-end scaffolding scenarios over synthetic link files: a true join
/// is made (S1), a spurious weak edge does not change it (S2), memory
/// pressure escalates to a coarser resolution (S4), and rescaffolding a
/// correct layout is idempotent (S5).
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use trellis_rs::cli::Args;
use trellis_rs::dict::SeqDict;
use trellis_rs::links::LinkRecord;
use trellis_rs::{agp, pipeline, ScafError};

// ── helpers ──────────────────────────────────────────────────────────────────

/// Two 1 Mb contigs with uniform intra coverage and `cross` pairs clustered
/// within 50 kb of ctgA's 3′ end and ctgB's 5′ end, plus `spurious` pairs
/// joining the two 5′ ends.
fn write_inputs(dir: &Path, cross: u32, spurious: u32) -> (PathBuf, PathBuf) {
    let fa = dir.join("asm.fa");
    fs::write(&fa, ">ctgA\nACGT\n>ctgB\nACGT\n").expect("write fa");
    fs::write(dir.join("asm.fa.fai"), "ctgA\t1000000\t6\t60\t61\nctgB\t1000000\t13\t60\t61\n")
        .expect("write fai");

    let links = dir.join("links.bin");
    let mut out = fs::File::create(&links).expect("create links");
    for seq in 0..2u32 {
        for i in 0..10_000u32 {
            let span = 1_000 + (i as u64 * 7_919 % 998_000) as u32;
            let a = (i as u64 * 104_729 % (1_000_000 - span) as u64) as u32;
            LinkRecord { ref_a: seq, pos_a: a, ref_b: seq, pos_b: a + span, mapq: 60 }
                .write_to(&mut out)
                .unwrap();
        }
    }
    for i in 0..cross {
        let pa = 950_000 + (i * 761) % 50_000;
        let pb = (i * 337) % 50_000;
        LinkRecord { ref_a: 0, pos_a: pa, ref_b: 1, pos_b: pb, mapq: 60 }
            .write_to(&mut out)
            .unwrap();
    }
    for i in 0..spurious {
        LinkRecord { ref_a: 0, pos_a: (i * 997) % 50_000, ref_b: 1, pos_b: (i * 677) % 50_000, mapq: 60 }
            .write_to(&mut out)
            .unwrap();
    }
    out.flush().unwrap();
    (fa, links)
}

fn args(fa: &Path, links: &Path, out_prefix: &Path, resolutions: &str) -> Args {
    Args {
        contigs: fa.to_path_buf(),
        links: links.to_path_buf(),
        agp: None,
        resolutions: Some(resolutions.to_string()),
        enzymes: None,
        min_len: 0,
        min_mapq: 10,
        no_contig_ec: false,
        no_scaffold_ec: false,
        no_mem_check: false,
        out: out_prefix.to_string_lossy().into_owned(),
        verbose: 0,
        max_rss: None,
    }
}

fn final_layout_summary(fai_dict: &SeqDict, final_agp: &Path) -> Vec<(u32, Vec<(u32, u8)>)> {
    let layout = agp::read_layout(fai_dict, final_agp).expect("read final AGP");
    (0..layout.n_scaffolds() as u32)
        .map(|sid| {
            let members = layout
                .segments_of(sid)
                .iter()
                .map(|seg| (seg.seq, seg.ori))
                .collect();
            (layout.scaffold(sid).len, members)
        })
        .collect()
}

fn two_contig_dict() -> SeqDict {
    let mut dict = SeqDict::new();
    dict.put("ctgA", 1_000_000).unwrap();
    dict.put("ctgB", 1_000_000).unwrap();
    dict
}

// ── scenarios ────────────────────────────────────────────────────────────────

/// S1: one true join. The final AGP holds a single 2 Mb scaffold reading
/// ctgA forward, one gap, ctgB forward.
#[test]
fn s1_true_join_is_made() {
    let dir = TempDir::new().unwrap();
    let (fa, links) = write_inputs(dir.path(), 500, 0);
    let stats = pipeline::run(&args(&fa, &links, &dir.path().join("s1"), "50000")).expect("run");

    assert_eq!(stats.rounds_completed, 1);
    assert_eq!(stats.contig_breaks, 0, "clean contigs are not cut");
    let summary = final_layout_summary(&two_contig_dict(), &stats.final_agp);
    assert_eq!(
        summary,
        vec![(2_000_100, vec![(0, 0), (1, 0)])],
        "one scaffold: ctgA+ gap ctgB+"
    );
}

/// S2: five spurious pairs between the wrong ends are pruned and the path
/// is unchanged.
#[test]
fn s2_spurious_weak_edge_is_ignored() {
    let dir = TempDir::new().unwrap();
    let (fa, links) = write_inputs(dir.path(), 500, 5);
    let stats = pipeline::run(&args(&fa, &links, &dir.path().join("s2"), "50000")).expect("run");

    let summary = final_layout_summary(&two_contig_dict(), &stats.final_agp);
    assert_eq!(summary, vec![(2_000_100, vec![(0, 0), (1, 0)])], "path unchanged");
}

/// S4: a memory budget below the fine-resolution estimate skips that round
/// with NOMEM and succeeds at the next coarser resolution.
#[test]
fn s4_memory_escalates_resolution() {
    let dir = TempDir::new().unwrap();
    let (fa, links) = write_inputs(dir.path(), 2_000, 0);
    let prefix = dir.path().join("s4");
    let mut a = args(&fa, &links, &prefix, "10000,20000");
    a.no_contig_ec = true;
    // Below the 10 kb intra estimate (2 × 100² × 8 bytes), above the 20 kb one.
    a.max_rss = Some(100_000);

    let stats = pipeline::run(&a).expect("run");
    assert_eq!(stats.rounds_completed, 1, "only the coarse round completes");
    assert!(!prefix.with_file_name("s4_r01.agp").exists(), "fine round was skipped");
    assert!(prefix.with_file_name("s4_r02.agp").exists(), "coarse round ran");
    let summary = final_layout_summary(&two_contig_dict(), &stats.final_agp);
    assert_eq!(summary, vec![(2_000_100, vec![(0, 0), (1, 0)])], "join still made");
}

/// The default memory budget comes from probing system RAM, and sysinfo
/// 0.29 reports KiB while the matrix estimates are in bytes. The intra
/// estimate here is sized to sit strictly between the host RAM expressed in
/// KiB and in bytes: a byte-scaled budget admits the round, an unscaled
/// KiB-valued one would spuriously signal NOMEM on valid input.
#[test]
fn default_memory_probe_is_byte_scaled() {
    use sysinfo::{System, SystemExt};

    let ram_kib = System::new_all().total_memory();
    if ram_kib == 0 {
        eprintln!("Skipping default_memory_probe_is_byte_scaled: RAM probe unavailable");
        return;
    }
    // At 1 kb resolution a 1 Mb contig is 1000 bins, so each contig costs
    // 1000² × 8 bytes in the intra estimate.
    let n_contigs = (ram_kib / 8_000_000 + 2) as usize;
    let estimate = n_contigs as u64 * 8_000_000;
    assert!(estimate > ram_kib, "estimate exceeds the RAM figure read as KiB");
    assert!(estimate < ram_kib * 1024, "estimate fits the RAM figure in bytes");

    let dir = TempDir::new().unwrap();
    let fa = dir.path().join("asm.fa");
    fs::write(&fa, ">ctg0\nACGT\n").expect("write fa");
    let mut fai = String::new();
    for i in 0..n_contigs {
        fai.push_str(&format!("ctg{i}\t1000000\t6\t60\t61\n"));
    }
    fs::write(dir.path().join("asm.fa.fai"), fai).expect("write fai");
    // No link evidence needed: the budget gate runs before the scan, and an
    // empty store still yields enough denominator cells to fit the curve.
    let links = dir.path().join("links.bin");
    fs::write(&links, b"").expect("write links");

    let mut a = args(&fa, &links, &dir.path().join("probe"), "1000");
    a.no_contig_ec = true;
    assert!(a.max_rss.is_none() && !a.no_mem_check, "the probe path is exercised");

    let stats = pipeline::run(&a).expect("run passes the byte-valued budget");
    assert_eq!(stats.rounds_completed, 1, "round admitted by the default budget");
}

/// S5: feeding the result back through `-a` reproduces it exactly.
#[test]
fn s5_rescaffolding_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (fa, links) = write_inputs(dir.path(), 500, 0);
    let first = pipeline::run(&args(&fa, &links, &dir.path().join("s5a"), "50000")).expect("run");

    let mut again = args(&fa, &links, &dir.path().join("s5b"), "50000");
    again.agp = Some(first.final_agp.clone());
    let second = pipeline::run(&again).expect("rerun");

    let a = fs::read_to_string(&first.final_agp).unwrap();
    let b = fs::read_to_string(&second.final_agp).unwrap();
    assert_eq!(a, b, "final AGP is reproduced byte for byte");
}

/// Too little data to fit the decay curve finalizes what exists and
/// surfaces NoBands.
#[test]
fn no_bands_finalizes_and_reports() {
    let dir = TempDir::new().unwrap();
    let (fa, links) = write_inputs(dir.path(), 0, 0);
    let prefix = dir.path().join("nb");
    let mut a = args(&fa, &links, &prefix, "500000");
    a.no_contig_ec = true;

    let err = pipeline::run(&a).expect_err("2 bins cannot hold 30 samples");
    assert!(
        matches!(err.downcast_ref::<ScafError>(), Some(ScafError::NoBands)),
        "expected NoBands, got: {err}"
    );
    assert!(
        prefix.with_file_name("nb_scaffolds_final.agp").exists(),
        "finalization still writes the best layout"
    );
}

// ── binary ───────────────────────────────────────────────────────────────────

/// Drive the compiled binary end to end on the S1 inputs.
#[test]
fn binary_runs_s1() {
    let dir = TempDir::new().unwrap();
    let (fa, links) = write_inputs(dir.path(), 500, 0);
    let prefix = dir.path().join("cli");

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_trellis-rs"))
        .arg(&fa)
        .arg(&links)
        .args(["-r", "50000"])
        .arg("-o")
        .arg(&prefix)
        .status()
        .expect("spawn trellis-rs");
    assert!(status.success(), "trellis-rs exited with {status}");

    let final_agp = prefix.with_file_name("cli_scaffolds_final.agp");
    assert!(final_agp.exists(), "final AGP written");
    let summary = final_layout_summary(&two_contig_dict(), &final_agp);
    assert_eq!(summary, vec![(2_000_100, vec![(0, 0), (1, 0)])]);
}
