use std::path::PathBuf;

/// Error kinds surfaced by the scaffolding core.
///
/// The pipeline driver decides recovery per kind: `NoMem` advances to the
/// next coarser resolution, `NoBands` ends the round loop, everything else
/// aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum ScafError {
    /// Malformed FAI/AGP/link input. Fatal for the run.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// Memory budget exceeded at a round. Recovered by moving to a coarser
    /// resolution.
    #[error("memory budget exceeded: {required} bytes required, {available} available")]
    NoMem { required: u64, available: u64 },

    /// Not enough intra-sequence bands to fit the distance-decay curve.
    #[error("not enough bands for norm calculation")]
    NoBands,

    /// Scaffold count exceeds the hard ceiling, indicating a pathological
    /// break stage.
    #[error("sequence number exceeds limit ({n} > {limit}); consider removing short sequences or running with --no-contig-ec")]
    SeqLimit { n: usize, limit: usize },

    /// Cannot open or write a file. Fatal.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScafError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Process exit code when this error terminates the run.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoBands => 14,
            Self::NoMem { .. } => 15,
            _ => 1,
        }
    }
}
