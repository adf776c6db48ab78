//! Restriction-enzyme cut sites.
//!
//! Motifs arrive as a comma-separated string over `{A,C,G,T,N}`; a single
//! `N` wildcard expands into the four concrete variants. The contig FASTA is
//! scanned once for motif occurrences, giving per-contig sorted cut offsets
//! that the matrix builder maps through the layout for per-bin cut counts.

use crate::dict::SeqDict;
use crate::error::ScafError;
use crate::types::SeqId;
use anyhow::{Context, Result};
use needletail::parse_fastx_file;
use std::path::Path;

/// Expand a motif specification into concrete uppercase motifs.
pub fn expand_motifs(spec: &str) -> Result<Vec<Vec<u8>>, ScafError> {
    let mut motifs = Vec::new();
    for raw in spec.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let mut motif = Vec::with_capacity(raw.len());
        let mut wildcard: Option<usize> = None;
        for (i, c) in raw.bytes().enumerate() {
            let c = c.to_ascii_uppercase();
            match c {
                b'A' | b'C' | b'G' | b'T' => motif.push(c),
                b'N' => {
                    if wildcard.is_some() {
                        return Err(ScafError::InputInvalid(format!(
                            "invalid restriction enzyme cutting site (multiple non-ACGT characters): {raw}"
                        )));
                    }
                    wildcard = Some(i);
                    motif.push(b'N');
                }
                _ => {
                    return Err(ScafError::InputInvalid(format!(
                        "non-alphabetic or unsupported character in restriction enzyme cutting site: {raw}"
                    )));
                }
            }
        }
        match wildcard {
            Some(i) => {
                for base in [b'A', b'C', b'G', b'T'] {
                    let mut m = motif.clone();
                    m[i] = base;
                    motifs.push(m);
                }
            }
            None => motifs.push(motif),
        }
    }
    if motifs.is_empty() {
        return Err(ScafError::InputInvalid(format!(
            "empty restriction enzyme cutting site string: {spec}"
        )));
    }
    Ok(motifs)
}

/// Per-contig sorted cut-site offsets.
#[derive(Debug)]
pub struct ReCuts {
    cuts: Vec<Vec<u32>>,
    /// Cut sites per base over all scanned contigs.
    pub density: f64,
}

impl ReCuts {
    pub fn cuts_of(&self, seq: SeqId) -> &[u32] {
        &self.cuts[seq as usize]
    }

    /// Scan the contig FASTA for motif occurrences. Records absent from
    /// `dict` (e.g. filtered by the minimum length) are skipped.
    pub fn from_fasta(path: &Path, dict: &SeqDict, motifs: &[Vec<u8>]) -> Result<Self> {
        let mut reader = parse_fastx_file(path)
            .map_err(|e| anyhow::anyhow!("failed to open FASTA {}: {}", path.display(), e))?;

        let mut cuts: Vec<Vec<u32>> = vec![Vec::new(); dict.n_seqs()];
        let mut total_sites = 0u64;
        let mut total_bases = 0u64;

        while let Some(result) = reader.next() {
            let record = result
                .map_err(|e| anyhow::anyhow!("failed to parse FASTA record: {}", e))
                .with_context(|| format!("reading {}", path.display()))?;
            let name = std::str::from_utf8(record.id()).unwrap_or("");
            let name = name.split_whitespace().next().unwrap_or("");
            let Some(id) = dict.get(name) else {
                continue;
            };
            let seq: Vec<u8> = record.seq().iter().map(|b| b.to_ascii_uppercase()).collect();
            let out = &mut cuts[id as usize];
            for motif in motifs {
                let m = motif.len();
                if seq.len() < m {
                    continue;
                }
                for i in 0..=(seq.len() - m) {
                    if &seq[i..i + m] == motif.as_slice() {
                        out.push(i as u32);
                    }
                }
            }
            out.sort_unstable();
            out.dedup();
            total_sites += out.len() as u64;
            total_bases += seq.len() as u64;
        }

        let density = if total_bases > 0 {
            total_sites as f64 / total_bases as f64
        } else {
            0.0
        };
        Ok(Self { cuts, density })
    }
}
