// matrix.rs is shared between the library and binary targets.  The symmetric
// query accessors are exercised by the test suite only — suppress those
// false-positive warnings in the binary.
#![allow(dead_code)]
//! Link matrices.
//!
//! The intra matrix bins each scaffold at the round's resolution and
//! accumulates pair counts into a banded upper triangle, alongside per-bin
//! effective sizes (bin width minus gap padding) and optional
//! restriction-site counts. The inter matrix reduces each scaffold pair to
//! four orientation buckets counted within a flank window from the
//! respective ends.
//!
//! Both builders report a conservative byte estimate before allocation so
//! the driver can enforce the memory budget.

use crate::dict::Layout;
use crate::enzyme::ReCuts;
use crate::links::LinkScanner;
use crate::norm::NormModel;
use crate::types::{HashMap, HashMapExt, ScafId};
use anyhow::Result;
use std::path::Path;

/// Bytes charged per intra cell in the memory estimate (count plus its
/// share of the denominator vectors).
const INTRA_CELL_BYTES: u64 = 8;
/// Bytes charged per inter bucket in the memory estimate (count, score and
/// denominator).
const INTER_CELL_BYTES: u64 = 16;

fn n_bins(len: u32, resolution: u32) -> u32 {
    len.div_ceil(resolution)
}

struct IntraScaf {
    n_bins: u32,
    band: u32,
    row_off: Vec<u64>,
    cells: Vec<u32>,
    /// Effective bin size as a fraction of the bin width, gap-corrected.
    eff: Vec<f64>,
    /// Cut-site count per bin, scaled by the global mean. `None` without
    /// enzyme normalization.
    cuts: Option<Vec<f64>>,
}

impl IntraScaf {
    fn row_width(&self, i: u32) -> u32 {
        (self.n_bins - i).min(self.band)
    }

    fn cell_index(&self, i: u32, j: u32) -> Option<usize> {
        debug_assert!(i <= j);
        let d = j - i;
        if d >= self.row_width(i) {
            return None;
        }
        Some((self.row_off[i as usize] + d as u64) as usize)
    }
}

/// Banded intra-sequence count matrices for every scaffold of a layout.
pub struct IntraMat {
    pub resolution: u32,
    enzyme_mode: bool,
    scafs: Vec<IntraScaf>,
}

/// Upper-bound allocation estimate for the intra build, in bytes.
pub fn estimate_intra_rss(layout: &Layout, resolution: u32, max_band: Option<u32>) -> u64 {
    let mut bytes = 0u64;
    for (_, scaf) in layout.scaffolds() {
        let b = n_bins(scaf.len, resolution) as u64;
        let band = max_band.map(|c| (c as u64).min(b)).unwrap_or(b);
        bytes += b * band * INTRA_CELL_BYTES;
    }
    bytes
}

/// Upper-bound allocation estimate for the inter build, in bytes
/// (sparsified upper bound over all scaffold pairs).
pub fn estimate_inter_rss(layout: &Layout) -> u64 {
    let n = layout.n_scaffolds() as u64;
    n * n * 4 * INTER_CELL_BYTES
}

impl IntraMat {
    /// Scan the link store and accumulate intra-scaffold pair counts.
    pub fn build(
        link_path: &Path,
        layout: &Layout,
        re_cuts: Option<&ReCuts>,
        resolution: u32,
        max_band: Option<u32>,
        min_mapq: u8,
    ) -> Result<Self> {
        let mut scafs = Vec::with_capacity(layout.n_scaffolds());
        for (sid, scaf) in layout.scaffolds() {
            let b = n_bins(scaf.len, resolution);
            let band = max_band.map(|c| c.min(b)).unwrap_or(b).max(1);

            let mut row_off = Vec::with_capacity(b as usize);
            let mut total = 0u64;
            for i in 0..b {
                row_off.push(total);
                total += ((b - i).min(band)) as u64;
            }

            // Effective size: bin width minus overlapped gap padding, as a
            // fraction of the bin width. The last bin is truncated by the
            // scaffold end.
            let mut eff = vec![0.0f64; b as usize];
            for i in 0..b {
                let lo = (i * resolution) as u64;
                let hi = ((i as u64 + 1) * resolution as u64).min(scaf.len as u64);
                eff[i as usize] = (hi - lo) as f64;
            }
            for (gs, ge) in layout.gaps_of(sid) {
                let (gs, ge) = (gs as u64, ge as u64);
                let first = (gs / resolution as u64) as u32;
                let last = (ge.saturating_sub(1) / resolution as u64) as u32;
                for i in first..=last.min(b - 1) {
                    let lo = (i as u64) * resolution as u64;
                    let hi = lo + resolution as u64;
                    let ovl = ge.min(hi).saturating_sub(gs.max(lo));
                    eff[i as usize] -= ovl as f64;
                }
            }
            for e in &mut eff {
                *e = (*e / resolution as f64).max(0.0);
            }

            scafs.push(IntraScaf {
                n_bins: b,
                band,
                row_off,
                cells: vec![0u32; total as usize],
                eff,
                cuts: None,
            });
        }

        // Per-bin cut-site counts, mapped through the layout and scaled by
        // the global mean over non-empty bins.
        if let Some(rc) = re_cuts {
            let mut per_scaf: Vec<Vec<f64>> =
                scafs.iter().map(|s| vec![0.0f64; s.n_bins as usize]).collect();
            let mut total_cuts = 0u64;
            let mut total_bins = 0u64;
            for seq in 0..layout.n_seqs() as u32 {
                for &off in rc.cuts_of(seq) {
                    if let Some((sid, pos, _)) = layout.coord_convert(seq, off) {
                        let bin = (pos / resolution) as usize;
                        per_scaf[sid as usize][bin] += 1.0;
                        total_cuts += 1;
                    }
                }
            }
            for s in &scafs {
                total_bins += s.n_bins as u64;
            }
            let mean = if total_bins > 0 && total_cuts > 0 {
                total_cuts as f64 / total_bins as f64
            } else {
                1.0
            };
            for (s, cuts) in scafs.iter_mut().zip(per_scaf) {
                s.cuts = Some(cuts.into_iter().map(|c| c / mean).collect());
            }
        }

        let mut mat = Self { resolution, enzyme_mode: re_cuts.is_some(), scafs };

        let scanner = LinkScanner::open(link_path, layout, min_mapq)?;
        for pair in scanner {
            let pair = pair?;
            if pair.scaf_a != pair.scaf_b {
                continue;
            }
            let s = &mut mat.scafs[pair.scaf_a as usize];
            let i = pair.pos_a / resolution;
            let j = pair.pos_b / resolution;
            let (i, j) = if i <= j { (i, j) } else { (j, i) };
            if let Some(idx) = s.cell_index(i, j) {
                s.cells[idx] = s.cells[idx].saturating_add(1);
            }
        }
        Ok(mat)
    }

    /// Symmetric count lookup; `None` outside the stored band.
    pub fn count(&self, scaf: ScafId, i: u32, j: u32) -> Option<u32> {
        let s = &self.scafs[scaf as usize];
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        s.cell_index(i, j).map(|idx| s.cells[idx])
    }

    /// Normalization denominator for a cell: `min(eff, eff) × min(cut, cut)`
    /// with enzymes configured, `eff × eff` otherwise.
    pub fn denominator(&self, scaf: ScafId, i: u32, j: u32) -> f64 {
        let s = &self.scafs[scaf as usize];
        let (ei, ej) = (s.eff[i as usize], s.eff[j as usize]);
        match &s.cuts {
            Some(cuts) => ei.min(ej) * cuts[i as usize].min(cuts[j as usize]),
            None => ei * ej,
        }
    }

    pub fn enzyme_mode(&self) -> bool {
        self.enzyme_mode
    }

    pub fn n_bins_of(&self, scaf: ScafId) -> u32 {
        self.scafs[scaf as usize].n_bins
    }

    /// Widest stored band over all scaffolds, an upper bound on the
    /// distances the norm fit can see.
    pub fn max_band(&self) -> u32 {
        self.scafs.iter().map(|s| s.band).max().unwrap_or(0)
    }

    /// Visit every stored cell as `(bin_distance, count, denominator)`.
    pub fn for_each_cell(&self, mut f: impl FnMut(u32, f64, f64)) {
        for (sid, s) in self.scafs.iter().enumerate() {
            for i in 0..s.n_bins {
                for d in 0..s.row_width(i) {
                    let idx = (s.row_off[i as usize] + d as u64) as usize;
                    let denom = self.denominator(sid as ScafId, i, i + d);
                    f(d, s.cells[idx] as f64, denom);
                }
            }
        }
    }
}

/// One scaffold pair's four orientation buckets.
///
/// Bucket `j = o0 << 1 | o1` corresponds to the hypothetical join
/// `a(o0) → b(o1)`: the flank is taken at a's 3′ end when `o0 = 0` (5′ when
/// reversed) and at b's 5′ end when `o1 = 0`.
#[derive(Debug, Clone, Default)]
pub struct InterLink {
    pub count: [u32; 4],
    pub norm: [f64; 4],
    /// Flank cells inside the fitted band, the binomial trial count for the
    /// quality floor.
    pub n0: u32,
    /// Direction bitmask: buckets within the ambiguity margin of the best.
    pub linkt: u8,
}

/// Sparse inter-sequence link matrix plus the background noise rate.
pub struct InterMat {
    pub resolution: u32,
    pub flank_bins: u32,
    pub links: HashMap<(ScafId, ScafId), InterLink>,
    /// Background inter-pair rate per base², estimated from pairs outside
    /// every flank window.
    pub noise: f64,
    /// Noise baseline of the normalized scores: the mean over every bucket
    /// of every stored pair. Filled by [`InterMat::normalize`].
    pub la: f64,
}

impl InterMat {
    /// Scan the link store and accumulate inter-scaffold flank counts.
    /// `flank_bins` is the fitted norm range, so the flank window is
    /// `flank_bins × resolution` bases.
    pub fn build(
        link_path: &Path,
        layout: &Layout,
        resolution: u32,
        flank_bins: u32,
        min_mapq: u8,
    ) -> Result<Self> {
        let res = resolution as u64;
        let band = flank_bins as u64;
        let mut links: HashMap<(ScafId, ScafId), InterLink> = HashMap::new();
        let mut outside = 0u64;

        let scanner = LinkScanner::open(link_path, layout, min_mapq)?;
        for pair in scanner {
            let pair = pair?;
            if pair.scaf_a == pair.scaf_b {
                continue;
            }
            let la = layout.scaffold(pair.scaf_a).len as u64;
            let lb = layout.scaffold(pair.scaf_b).len as u64;
            let (pa, pb) = (pair.pos_a as u64, pair.pos_b as u64);

            // Bin distance from the junction end under each hypothetical
            // orientation; counts are restricted to the same band the
            // expectation covers (boundary bins sit at distance 1).
            let mut hit = false;
            for j in 0..4u8 {
                let u = if j >> 1 == 0 { (la - 1 - pa) / res } else { pa / res };
                let v = if j & 1 == 0 { pb / res } else { (lb - 1 - pb) / res };
                if u < band && v < band && u + v + 1 <= band {
                    let link = links.entry((pair.scaf_a, pair.scaf_b)).or_default();
                    link.count[j as usize] += 1;
                    hit = true;
                }
            }
            if !hit {
                outside += 1;
            }
        }

        // Flat background rate over the total cross area.
        let total: u64 = layout.total_len();
        let sq: f64 = layout
            .scaffolds()
            .map(|(_, s)| (s.len as f64) * (s.len as f64))
            .sum();
        let cross_area = ((total as f64) * (total as f64) - sq) / 2.0;
        let noise = if cross_area > 0.0 { outside as f64 / cross_area } else { 0.0 };

        Ok(Self { resolution, flank_bins, links, noise, la: 0.0 })
    }

    /// Fill normalized scores, trial counts and direction bits from the
    /// fitted distance-decay curve. `ambiguity` is the relative margin for
    /// keeping a bucket's direction bit (ties resolve to the smallest
    /// bucket index).
    pub fn normalize(&mut self, layout: &Layout, norm: &NormModel, ambiguity: f64) {
        let r_max = norm.r_max();
        let mut norm_sum = 0.0f64;
        let mut norm_n = 0u64;
        for (&(sa, sb), link) in self.links.iter_mut() {
            let ba = n_bins(layout.scaffold(sa).len, self.resolution).min(self.flank_bins);
            let bb = n_bins(layout.scaffold(sb).len, self.resolution).min(self.flank_bins);

            // Expected count over the flank cells under the hypothetical
            // adjacency: bins u and v away from the junction sit at
            // distance u + v + 1.
            let mut expected = 0.0f64;
            let mut n0 = 0u32;
            for u in 0..ba {
                for v in 0..bb {
                    let d = u + v + 1;
                    if d <= r_max {
                        expected += norm.expected_at(d);
                        n0 += 1;
                    }
                }
            }
            link.n0 = n0;

            let mut best = 0.0f64;
            for j in 0..4 {
                link.norm[j] = if expected > 0.0 {
                    link.count[j] as f64 / expected
                } else {
                    0.0
                };
                if link.norm[j] > best {
                    best = link.norm[j];
                }
            }
            link.linkt = 0;
            if best > 0.0 {
                for j in 0..4 {
                    if link.count[j] > 0 && link.norm[j] >= best * (1.0 - ambiguity) {
                        link.linkt |= 1 << j;
                    }
                }
            }
            norm_sum += link.norm.iter().sum::<f64>();
            norm_n += 4;
        }
        self.la = if norm_n > 0 { norm_sum / norm_n as f64 } else { 0.0 };
    }
}
