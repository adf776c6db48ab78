//! Round driver.
//!
//! One round rebuilds the layout dictionary from the current AGP, scans the
//! link store into matrices at the round's resolution, fits the
//! distance-decay model, builds and prunes the scaffolding graph, and writes
//! the path cover back as an AGP. Optional break stages cut suspect
//! junctions before and between rounds. Only the AGP files persist across
//! rounds; a run is restartable by pointing `-a` at the last produced AGP.

use crate::agp;
use crate::breaks;
use crate::cli::Args;
use crate::config::{self, Params, GAP_LEN, MAX_N_SEQ};
use crate::dict::{Layout, SeqDict};
use crate::enzyme::{expand_motifs, ReCuts};
use crate::error::ScafError;
use crate::graph::Graph;
use crate::matrix::{estimate_inter_rss, estimate_intra_rss, InterMat, IntraMat};
use crate::norm::NormModel;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};
use sysinfo::{System, SystemExt};
use tracing::{info, warn};

const GB: f64 = (1u64 << 30) as f64;

#[derive(Debug, Default)]
pub struct Stats {
    pub contig_break_rounds: u32,
    pub contig_breaks: u32,
    pub scaffold_breaks: u32,
    pub rounds_completed: u32,
    pub final_agp: PathBuf,
}

fn spinner(msg: &str, enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(2));
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("spinner template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(250));
    Some(pb)
}

fn finish(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

fn log_asm_stats(layout: &Layout, all: bool) {
    let stats = layout.n_stats();
    info!("assembly stats:");
    info!(" N50: {} (n = {})", stats[4].0, stats[4].1);
    info!(" N90: {} (n = {})", stats[8].0, stats[8].1);
    if all {
        info!(" N100: {} (n = {})", stats[9].0, stats[9].1);
    }
}

pub fn run(args: &Args) -> Result<Stats> {
    let params = Params {
        min_len: args.min_len,
        min_mapq: args.min_mapq,
        ..Params::default()
    };
    let show_progress = args.verbose > 0;

    let fai = PathBuf::from(format!("{}.fai", args.contigs.display()));
    let link_file = args.links.as_path();
    if link_file.extension().and_then(|e| e.to_str()) != Some("bin") {
        return Err(ScafError::InputInvalid(format!(
            "unknown link file format: {} (a .bin link dump is expected; convert BAM/BED input with the dump step first)",
            link_file.display()
        ))
        .into());
    }

    let sdict = SeqDict::from_fai(&fai, params.min_len)?;
    if sdict.is_empty() {
        return Err(ScafError::InputInvalid(format!(
            "no sequences above the length threshold in {}",
            fai.display()
        ))
        .into());
    }

    let resolutions = match &args.resolutions {
        Some(spec) => parse_resolutions(spec)?,
        None => config::default_resolutions(sdict.total_len()),
    };

    let re_cuts = match &args.enzymes {
        Some(spec) => {
            let motifs = expand_motifs(spec)?;
            info!("restriction enzyme cutting sites: {} motif(s)", motifs.len());
            let cuts = ReCuts::from_fasta(&args.contigs, &sdict, &motifs)
                .with_context(|| format!("scanning {}", args.contigs.display()))?;
            info!("cut site density: {:.6} per bp", cuts.density);
            Some(cuts)
        }
        None => None,
    };

    let rss_limit: Option<u64> = if args.no_mem_check {
        info!("RAM check disabled");
        None
    } else {
        let limit = args.max_rss.unwrap_or_else(|| {
            let sys = System::new_all();
            // sysinfo 0.29 reports KiB; the matrix estimates are in bytes.
            let total = sys.total_memory() * 1024;
            info!("RAM total: {:.3}GB", total as f64 / GB);
            total
        });
        info!("RAM limit: {:.3}GB", limit as f64 / GB);
        Some(limit)
    };

    let mut stats = Stats::default();

    // ── stage 1: contig error break ──────────────────────────────────────
    let mut current_agp: PathBuf;
    if args.agp.is_none() && !args.no_contig_ec {
        let identity = Layout::from_dict(&sdict);
        let dist_thres = breaks::estimate_dist_thres(link_file, &identity, &params.ec)?;
        info!("dist threshold for contig error break: {dist_thres}");

        let mut round = 0u32;
        let mut agp_path = PathBuf::new();
        loop {
            let layout = if round == 0 {
                Layout::from_dict(&sdict)
            } else {
                agp::read_layout(&sdict, &agp_path)?
            };
            let pb = spinner("scanning links for contig error break...", show_progress);
            let profile =
                breaks::LinkProfile::build(link_file, &layout, dist_thres, params.ec.bin, 0.0, 0)?;
            finish(pb);
            let found = breaks::detect_internal(&profile, &layout, &params.ec);
            round += 1;
            agp_path = out_path(&args.out, &format!("initial_break_{round:02}.agp"));
            let cuts: Vec<_> = found.iter().map(|b| (b.scaf, b.pos)).collect();
            let broken = layout.with_breaks(&cuts);
            agp::write_layout_file(&broken, &sdict, &agp_path)?;

            stats.contig_breaks += found.len() as u32;
            if found.is_empty() {
                break;
            }
        }
        stats.contig_break_rounds = round;
        info!(
            "performed {} round(s) assembly error correction, made {} break(s)",
            round, stats.contig_breaks
        );
        current_agp = agp_path;
    } else if let Some(agp) = &args.agp {
        current_agp = agp.clone();
    } else {
        current_agp = out_path(&args.out, "no_break.agp");
        agp::write_identity_file(&sdict, &current_agp)?;
    }

    {
        let layout = agp::read_layout(&sdict, &current_agp)?;
        if layout.n_scaffolds() > MAX_N_SEQ {
            return Err(ScafError::SeqLimit { n: layout.n_scaffolds(), limit: MAX_N_SEQ }.into());
        }
        log_asm_stats(&layout, true);
    }

    // ── stage 2: scaffolding rounds ──────────────────────────────────────
    let mut last_failure: Option<ScafError> = None;
    for (ri, &resolution) in resolutions.iter().enumerate() {
        let r = ri + 1;
        info!("scaffolding round {r} resolution = {resolution}");

        let layout = agp::read_layout(&sdict, &current_agp)?;
        let n50 = layout.n_stats()[4].0;
        if n50 < resolution as u64 * 10 {
            if stats.rounds_completed > 0 {
                info!("assembly N50 ({n50}) too small. End of scaffolding.");
                break;
            }
            warn!("assembly N50 ({n50}) too small. Scaffolding anyway...");
        }

        let round_agp = out_path(&args.out, &format!("r{r:02}.agp"));
        match run_round(
            link_file,
            &layout,
            &sdict,
            re_cuts.as_ref(),
            resolution,
            &params,
            rss_limit,
            &round_agp,
            show_progress,
        ) {
            Ok(noise) => {
                stats.rounds_completed += 1;
                if args.no_scaffold_ec {
                    current_agp = round_agp;
                } else {
                    let break_agp = out_path(&args.out, &format!("r{r:02}_break.agp"));
                    let n = scaffold_error_break(
                        link_file,
                        &sdict,
                        &round_agp,
                        resolution,
                        noise,
                        &params,
                        &break_agp,
                        show_progress,
                    )?;
                    stats.scaffold_breaks += n;
                    current_agp = break_agp;
                }
                info!("scaffolding round {r} done");
                let layout = agp::read_layout(&sdict, &current_agp)?;
                log_asm_stats(&layout, false);
            }
            Err(e) => match e.downcast_ref::<ScafError>() {
                Some(ScafError::NoMem { required, available }) => {
                    info!("No enough memory. Try higher resolutions... End of scaffolding round.");
                    info!("RAM    limit: {:.3}GB", *available as f64 / GB);
                    info!("RAM required: {:.3}GB", *required as f64 / GB);
                    last_failure =
                        Some(ScafError::NoMem { required: *required, available: *available });
                    continue;
                }
                Some(ScafError::NoBands) => {
                    warn!("No enough bands for norm calculation... End of scaffolding.");
                    last_failure = Some(ScafError::NoBands);
                    break;
                }
                _ => return Err(e),
            },
        }
    }

    // ── stage 3: finalization ────────────────────────────────────────────
    let final_agp = out_path(&args.out, "scaffolds_final.agp");
    if params.min_len > 0 {
        // Merge back the sequences excluded by the length filter.
        let full = SeqDict::from_fai(&fai, 0)?;
        let layout = agp::read_layout(&full, &current_agp)?;
        let layout = layout.add_unplaced(&full);
        agp::write_sorted_file(&layout, &full, &final_agp)?;
        log_asm_stats(&layout, true);
    } else {
        let layout = agp::read_layout(&sdict, &current_agp)?;
        agp::write_sorted_file(&layout, &sdict, &final_agp)?;
        log_asm_stats(&layout, true);
    }
    stats.final_agp = final_agp;

    if stats.rounds_completed == 0 {
        if let Some(e) = last_failure {
            return Err(e.into());
        }
    }
    Ok(stats)
}

fn out_path(prefix: &str, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}_{suffix}"))
}

fn parse_resolutions(spec: &str) -> Result<Vec<u32>> {
    let mut out = Vec::new();
    for part in spec.split(',') {
        let r: u32 = part
            .trim()
            .parse()
            .map_err(|_| ScafError::InputInvalid(format!("invalid resolution list: {spec}")))?;
        if r == 0 {
            return Err(ScafError::InputInvalid(format!("invalid resolution list: {spec}")).into());
        }
        out.push(r);
    }
    if out.is_empty() {
        return Err(ScafError::InputInvalid("empty resolution list".into()).into());
    }
    Ok(out)
}

/// One scaffolding round: memory-gated intra build, norm fit, memory-gated
/// inter build, graph construction and pruning, path cover, AGP output.
/// Returns the background noise rate for the scaffold break stage.
#[allow(clippy::too_many_arguments)]
fn run_round(
    link_file: &Path,
    layout: &Layout,
    dict: &SeqDict,
    re_cuts: Option<&ReCuts>,
    resolution: u32,
    params: &Params,
    rss_limit: Option<u64>,
    out_agp: &Path,
    show_progress: bool,
) -> Result<f64> {
    let mut remaining = rss_limit;
    if let Some(limit) = remaining {
        let required = estimate_intra_rss(layout, resolution, params.max_band);
        if required > limit {
            return Err(ScafError::NoMem { required, available: limit }.into());
        }
        remaining = Some(limit - required);
    }

    info!("starting norm estimation...");
    let pb = spinner("building intra link matrix...", show_progress);
    let intra = IntraMat::build(
        link_file,
        layout,
        re_cuts,
        resolution,
        params.max_band,
        params.min_mapq,
    )?;
    finish(pb);
    let norm = NormModel::fit(&intra, &params.norm)?;
    info!(
        "norm fitted over {} band(s), mean normalized count {:.4}",
        norm.r_max() + 1,
        norm.la
    );

    if let Some(limit) = remaining {
        let required = estimate_inter_rss(layout);
        if required > limit {
            return Err(ScafError::NoMem { required, available: limit }.into());
        }
    }

    info!("starting link estimation...");
    let pb = spinner("building inter link matrix...", show_progress);
    let mut inter = InterMat::build(link_file, layout, resolution, norm.r_max(), params.min_mapq)?;
    finish(pb);
    inter.normalize(layout, &norm, params.graph.direct_ambiguity);
    let noise = inter.noise;

    info!("starting scaffolding graph construction...");
    let mut g = Graph::from_inter(&inter, layout, &params.graph, params.norm.quantile);
    info!("scaffolding graph: {} arc(s) before pruning", g.n_arcs());
    g.prune(&params.graph);
    info!("scaffolding graph: {} arc(s) after pruning", g.n_arcs());

    let paths = g.extract_paths(layout);
    let new_layout = layout.compose(&paths, GAP_LEN);
    agp::write_layout_file(&new_layout, dict, out_agp)?;
    Ok(noise)
}

/// Scaffold-joint error break against a freshly written round AGP. Always
/// writes the break AGP, with or without cuts; returns the cut count.
#[allow(clippy::too_many_arguments)]
fn scaffold_error_break(
    link_file: &Path,
    dict: &SeqDict,
    agp_in: &Path,
    flank: u32,
    noise: f64,
    params: &Params,
    agp_out: &Path,
    show_progress: bool,
) -> Result<u32> {
    let layout = agp::read_layout(dict, agp_in)?;
    let dist_thres = flank * 2;
    let pb = spinner("scanning links for scaffold error break...", show_progress);
    let profile = breaks::LinkProfile::build(
        link_file,
        &layout,
        dist_thres,
        params.ec.bin,
        noise,
        params.min_mapq,
    )?;
    finish(pb);
    let found = breaks::detect_joint(&profile, &layout, flank, &params.ec);
    let cuts: Vec<_> = found.iter().map(|b| (b.scaf, b.pos)).collect();
    let broken = layout.with_breaks(&cuts);
    agp::write_layout_file(&broken, dict, agp_out)?;
    if !found.is_empty() {
        info!("scaffold error break: {} break(s)", found.len());
    }
    Ok(found.len() as u32)
}
