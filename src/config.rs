//! Stage parameters, gathered into explicit records passed into each
//! component. There is no process-wide mutable state.

/// Nominal length of the padding inserted between joined scaffolds, in bases.
/// Gap padding contributes to scaffold length but never receives link counts.
pub const GAP_LEN: u32 = 100;

/// Hard ceiling on the scaffold count after the break stage. Exceeding it
/// indicates a pathological break stage rather than a real assembly.
pub const MAX_N_SEQ: usize = 45_000;

/// Error-correction (break detection) parameters.
#[derive(Debug, Clone)]
pub struct EcParams {
    /// Floor for the link distance window, in bases.
    pub min_window: u32,
    /// Granularity of the distance-threshold estimate, in bases.
    pub resolution: u32,
    /// Profile bin width, in bases.
    pub bin: u32,
    /// Fraction of intra pairs the distance window must hold.
    pub min_frac: f64,
    /// A profile minimum below this fraction of the running mean is a break
    /// candidate.
    pub fold_thresh: f64,
    /// Candidates closer than this are coalesced, in bases.
    pub merge_thresh: u32,
    /// Two candidates within this distance cut both flanks of the region
    /// between them, in bases.
    pub dual_break_thresh: u32,
}

impl Default for EcParams {
    fn default() -> Self {
        Self {
            min_window: 1_000_000,
            resolution: 10_000,
            bin: 1_000,
            min_frac: 0.8,
            fold_thresh: 0.2,
            merge_thresh: 10_000,
            dual_break_thresh: 50_000,
        }
    }
}

/// Distance-decay normalization parameters.
#[derive(Debug, Clone)]
pub struct NormParams {
    /// Minimum samples a distance bucket needs to participate in the fit.
    pub min_samples: usize,
    /// Fraction trimmed from each tail before the bucket mean.
    pub trim_frac: f64,
    /// Fewer retained buckets than this signals `NoBands`.
    pub min_bands: u32,
    /// Denominator floor below which a cell is no-data.
    pub eps: f64,
    /// Quantile of the binomial link-count model used as the per-pair
    /// quality floor.
    pub quantile: f64,
}

impl Default for NormParams {
    fn default() -> Self {
        Self {
            min_samples: 30,
            trim_frac: 0.1,
            min_bands: 3,
            eps: 0.01,
            quantile: 0.99,
        }
    }
}

/// Scaffolding-graph construction and pruning parameters.
#[derive(Debug, Clone)]
pub struct GraphParams {
    /// Minimum normalized score for an edge to enter the graph.
    pub min_norm: f64,
    /// Buckets within this relative distance of the best bucket keep their
    /// direction bit.
    pub direct_ambiguity: f64,
    /// Simple filter: arcs below `alpha x` the best arc at a node are
    /// dropped outright.
    pub alpha: f64,
    /// Simple filter / ambiguity: a non-best arc survives only above
    /// `beta x` the best arc; a still-branching node keeps its best arc only
    /// when nothing else exceeds that ratio.
    pub beta: f64,
    /// Simple filter: an arc is dropped when an alternative two-arc path is
    /// stronger by more than `1/gamma`.
    pub gamma: f64,
    /// Transitive reduction weight ratio.
    pub tau: f64,
    /// Weak-edge trim: absolute score floor applied after the cascade.
    pub delta: f64,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            min_norm: 0.1,
            direct_ambiguity: 0.1,
            alpha: 0.1,
            beta: 0.7,
            gamma: 0.1,
            tau: 0.7,
            delta: 0.05,
        }
    }
}

/// All stage parameters plus the run-level filters shared across stages.
#[derive(Debug, Clone, Default)]
pub struct Params {
    pub ec: EcParams,
    pub norm: NormParams,
    pub graph: GraphParams,
    /// Minimum contig length admitted to scaffolding, in bases.
    pub min_len: u32,
    /// Minimum mapping quality for a link record to count.
    pub min_mapq: u8,
    /// Cap on the intra-matrix band, in bins. `None` stores the full
    /// triangle.
    pub max_band: Option<u32>,
}

/// Resolution ladder tried in ascending order when `-r` is not given.
pub const DEFAULT_RESOLUTIONS: [u32; 15] = [
    10_000, 20_000, 50_000, 100_000, 200_000, 500_000, 1_000_000, 2_000_000, 5_000_000, 10_000_000,
    20_000_000, 50_000_000, 100_000_000, 200_000_000, 500_000_000,
];

/// Truncate the default ladder at a genome-size-dependent maximum.
pub fn default_resolutions(genome_size: u64) -> Vec<u32> {
    let max_res: u32 = if genome_size < 100_000_000 {
        1_000_000
    } else if genome_size < 200_000_000 {
        2_000_000
    } else if genome_size < 500_000_000 {
        5_000_000
    } else if genome_size < 1_000_000_000 {
        10_000_000
    } else if genome_size < 2_000_000_000 {
        20_000_000
    } else if genome_size < 5_000_000_000 {
        50_000_000
    } else if genome_size < 10_000_000_000 {
        100_000_000
    } else if genome_size < 20_000_000_000 {
        200_000_000
    } else {
        500_000_000
    };

    DEFAULT_RESOLUTIONS
        .iter()
        .copied()
        .filter(|&r| r <= max_res)
        .collect()
}
