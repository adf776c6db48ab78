// breaks.rs is shared between the library and binary targets.  The break
// kind is inspected by the test suite only — suppress the false-positive
// warnings in the binary.
#![allow(dead_code)]
//! Mis-assembly break detection.
//!
//! Both detectors scan a one-dimensional spanning-link profile per scaffold:
//! bin `b` counts the Hi-C pairs whose two ends bracket the bin within the
//! link distance window. A mis-join shows as a dip, because few pairs cross
//! the bad junction. The contig-internal detector searches every interior
//! bin; the scaffold-joint detector only tests existing segment joins.

use crate::config::EcParams;
use crate::dict::Layout;
use crate::links::LinkScanner;
use crate::types::ScafId;
use anyhow::Result;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    /// Single drop in the intra profile of a contig.
    Internal,
    /// Drop at a segment join of an existing scaffold.
    Joint,
}

/// A cut position in scaffold coordinates.
#[derive(Debug, Clone, Copy)]
pub struct BreakPoint {
    pub scaf: ScafId,
    pub pos: u32,
    pub kind: BreakKind,
}

/// Smallest distance holding `min_frac` of the intra-scaffold pair
/// distances, at `resolution` granularity, floored at `min_window`.
pub fn estimate_dist_thres(link_path: &Path, layout: &Layout, params: &EcParams) -> Result<u32> {
    let res = params.resolution as u64;
    let mut hist: Vec<u64> = Vec::new();
    let mut total = 0u64;

    let scanner = LinkScanner::open(link_path, layout, 0)?;
    for pair in scanner {
        let pair = pair?;
        if pair.scaf_a != pair.scaf_b {
            continue;
        }
        let d = (pair.pos_b - pair.pos_a) as u64 / res;
        if d as usize >= hist.len() {
            hist.resize(d as usize + 1, 0);
        }
        hist[d as usize] += 1;
        total += 1;
    }

    let target = (total as f64 * params.min_frac).ceil() as u64;
    let mut acc = 0u64;
    let mut thres = params.min_window;
    for (d, &n) in hist.iter().enumerate() {
        acc += n;
        if acc >= target {
            thres = ((d as u64 + 1) * res) as u32;
            break;
        }
    }
    Ok(thres.max(params.min_window))
}

/// Per-scaffold spanning-link profiles.
pub struct LinkProfile {
    pub bin: u32,
    pub dist_thres: u32,
    bins: Vec<Vec<f64>>,
}

impl LinkProfile {
    /// Count, for every profile bin, the intra pairs within `dist_thres`
    /// whose ends bracket it, then subtract the flat background expectation
    /// `noise × bin × dist_thres`.
    pub fn build(
        link_path: &Path,
        layout: &Layout,
        dist_thres: u32,
        bin: u32,
        noise: f64,
        min_mapq: u8,
    ) -> Result<Self> {
        let mut bins: Vec<Vec<f64>> = layout
            .scaffolds()
            .map(|(_, s)| vec![0.0f64; (s.len / bin + 1) as usize])
            .collect();

        let scanner = LinkScanner::open(link_path, layout, min_mapq)?;
        for pair in scanner {
            let pair = pair?;
            if pair.scaf_a != pair.scaf_b || pair.pos_b - pair.pos_a > dist_thres {
                continue;
            }
            let profile = &mut bins[pair.scaf_a as usize];
            let first = pair.pos_a / bin + 1;
            let last = pair.pos_b / bin;
            for b in first..last {
                profile[b as usize] += 1.0;
            }
        }

        let background = noise * bin as f64 * dist_thres as f64;
        if background > 0.0 {
            for profile in &mut bins {
                for v in profile.iter_mut() {
                    *v = (*v - background).max(0.0);
                }
            }
        }

        Ok(Self { bin, dist_thres, bins })
    }

    pub fn profile_of(&self, scaf: ScafId) -> &[f64] {
        &self.bins[scaf as usize]
    }
}

/// Spanning-pair area at position `x` of a sequence of length `len` under a
/// distance window `d`: the measure of end pairs `(a, b)` with
/// `a < x < b`, `b − a <= d`, inside `[0, len]`. This is the uniform
/// expectation the profile is compared against; it shrinks toward the
/// sequence ends exactly as the observed counts do.
fn span_area(x: f64, len: f64, d: f64) -> f64 {
    let u = x.min(d);
    let v = (len - x).min(d);
    if u <= 0.0 || v <= 0.0 {
        return 0.0;
    }
    let overlap = (u + v - d).max(0.0);
    u * v - overlap * overlap / 2.0
}

/// Contig-internal break detection: the spanning profile is divided by the
/// end-truncated uniform expectation, and minima below `fold_thresh` of the
/// windowed running mean of that density become cuts, coalesced within
/// `merge_thresh`. Deterministic and idempotent: after a cut, both new
/// sequences show clean profiles.
pub fn detect_internal(profile: &LinkProfile, layout: &Layout, params: &EcParams) -> Vec<BreakPoint> {
    let bin = profile.bin;
    let d = profile.dist_thres as f64;
    let window = (profile.dist_thres / bin).max(1) as usize;
    let merge_bins = (params.merge_thresh / bin).max(1) as usize;
    // Bins whose expectation is a sliver of the plateau are too noisy to
    // call; this keeps cuts away from the first/last few kilobases.
    let area_floor = 0.05 * d * d / 2.0;
    let mut breaks = Vec::new();

    for (sid, scaf) in layout.scaffolds() {
        let p = profile.profile_of(sid);
        let n = p.len();
        let len = scaf.len as f64;

        // Area-normalized link density per bin.
        let mut density = vec![f64::NAN; n];
        let mut lo = n;
        let mut hi = 0usize;
        for i in 0..n {
            let x = (i as f64 + 0.5) * bin as f64;
            let a = span_area(x, len, d);
            if a >= area_floor {
                density[i] = p[i] / a;
                lo = lo.min(i);
                hi = hi.max(i + 1);
            }
        }
        if lo >= hi {
            continue;
        }

        // Prefix sums for the windowed running mean of the density.
        let mut prefix = vec![0.0f64; n + 1];
        for i in lo..hi {
            prefix[i + 1] = prefix[i] + density[i];
        }
        for i in hi..n {
            prefix[i + 1] = prefix[i];
        }
        let window_mean = |i: usize| -> f64 {
            let a = i.saturating_sub(window).max(lo);
            let b = (i + window + 1).min(hi);
            if b <= a {
                return 0.0;
            }
            (prefix[b] - prefix[a]) / (b - a) as f64
        };

        // Candidate bins, grouped into runs closer than the merge window.
        let mut runs: Vec<(usize, usize, usize)> = Vec::new(); // (first, argmin, last)
        let mut current: Option<(usize, usize, usize)> = None;
        for i in lo..hi {
            let mean = window_mean(i);
            if mean > 0.0 && density[i] < params.fold_thresh * mean {
                current = match current {
                    Some((first, argmin, last)) if i - last <= merge_bins => {
                        Some((first, if density[i] < density[argmin] { i } else { argmin }, i))
                    }
                    Some(run) => {
                        runs.push(run);
                        Some((i, i, i))
                    }
                    None => Some((i, i, i)),
                };
            }
        }
        if let Some(run) = current {
            runs.push(run);
        }

        // A narrow run cuts at its minimum; a wide run bounded by two drops
        // becomes a dual break that cuts both flanks of the low region.
        for (first, argmin, last) in runs {
            let width = ((last - first) as u32) * bin;
            if width > params.merge_thresh && width <= params.dual_break_thresh {
                breaks.push(BreakPoint {
                    scaf: sid,
                    pos: (first as u32) * bin + bin / 2,
                    kind: BreakKind::Internal,
                });
                breaks.push(BreakPoint {
                    scaf: sid,
                    pos: (last as u32) * bin + bin / 2,
                    kind: BreakKind::Internal,
                });
            } else {
                breaks.push(BreakPoint {
                    scaf: sid,
                    pos: (argmin as u32) * bin + bin / 2,
                    kind: BreakKind::Internal,
                });
            }
        }
    }
    breaks
}

/// Scaffold-joint break detection: compare crossing support at each segment
/// join against the within-segment control in the `flank` window.
pub fn detect_joint(
    profile: &LinkProfile,
    layout: &Layout,
    flank: u32,
    params: &EcParams,
) -> Vec<BreakPoint> {
    let bin = profile.bin;
    let mut breaks = Vec::new();

    for (sid, _) in layout.scaffolds() {
        let p = profile.profile_of(sid);
        let n = p.len();
        let segs = layout.segments_of(sid);
        for k in 1..segs.len() {
            let prev_end = segs[k - 1].scaf_start + segs[k - 1].len;
            let join = segs[k].scaf_start;

            // Crossing support: the weakest bin across the join (including
            // the gap padding bins).
            let jb_lo = (prev_end / bin) as usize;
            let jb_hi = ((join / bin) as usize).min(n - 1);
            let support = p[jb_lo..=jb_hi]
                .iter()
                .copied()
                .fold(f64::INFINITY, f64::min);

            // Within-segment control on both sides of the join.
            let left_lo = (prev_end.saturating_sub(flank) / bin) as usize;
            let right_hi = (((join + flank) / bin) as usize).min(n - 1);
            let mut sum = 0.0f64;
            let mut cnt = 0usize;
            for &v in &p[left_lo..jb_lo] {
                sum += v;
                cnt += 1;
            }
            if jb_hi + 1 <= right_hi {
                for &v in &p[jb_hi + 1..=right_hi] {
                    sum += v;
                    cnt += 1;
                }
            }
            if cnt == 0 {
                continue;
            }
            let control = sum / cnt as f64;

            if control > 0.0 && support < params.fold_thresh * control {
                breaks.push(BreakPoint { scaf: sid, pos: prev_end, kind: BreakKind::Joint });
            }
        }
    }
    breaks
}
