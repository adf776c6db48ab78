//! trellis-rs: order and orient assembly contigs into scaffolds from Hi-C
//! link evidence.
//!
//! # Library usage
//!
//! ```no_run
//! use trellis_rs::dict::{Layout, SeqDict};
//! use trellis_rs::config::Params;
//! use trellis_rs::matrix::IntraMat;
//! use trellis_rs::norm::NormModel;
//!
//! // Build the dictionaries once per round.
//! // let dict = SeqDict::from_fai(fai_path, 0)?;
//! // let layout = Layout::from_dict(&dict);          // or agp::read_layout(&dict, agp_path)?
//! //
//! // let params = Params::default();
//! // let intra = IntraMat::build(link_path, &layout, None, 10_000, None, 10)?;
//! // let norm = NormModel::fit(&intra, &params.norm)?;
//! ```

// Public modules — the scaffolding components.
pub mod agp;
pub mod breaks;
pub mod cli;
pub mod config;
pub mod dict;
pub mod enzyme;
pub mod error;
pub mod graph;
pub mod links;
pub mod matrix;
pub mod norm;
pub mod pipeline;
pub mod types;

// Flat re-exports for the most commonly used public types.
pub use dict::{Layout, SeqDict};
pub use error::ScafError;
pub use types::{ScafId, SeqId};
