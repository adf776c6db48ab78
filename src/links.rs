// links.rs is shared between the library and binary targets.  The record
// writer belongs to the dump contract and is exercised by tests only —
// suppress the false-positive warnings in the binary.
#![allow(dead_code)]
//! Binary Hi-C link store.
//!
//! The dump step (external) normalizes alignments into fixed-width records:
//! little-endian `(u32 ref_a, u32 pos_a, u32 ref_b, u32 pos_b, u8 mapq)`,
//! 17 bytes each, no header, one record per read pair. The store is scanned
//! once per matrix build and never held in memory.

use crate::dict::Layout;
use crate::error::ScafError;
use crate::types::{ScafId, SeqId};
use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

pub const RECORD_SIZE: u64 = 17;

/// One on-disk pair record, in contig coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRecord {
    pub ref_a: SeqId,
    pub pos_a: u32,
    pub ref_b: SeqId,
    pub pos_b: u32,
    pub mapq: u8,
}

impl LinkRecord {
    /// Read one record; `Ok(None)` at a clean end of stream, an
    /// `UnexpectedEof` error on a truncated record.
    pub fn read_from<R: Read>(r: &mut R) -> std::io::Result<Option<Self>> {
        let ref_a = match r.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(Self {
            ref_a,
            pos_a: r.read_u32::<LittleEndian>()?,
            ref_b: r.read_u32::<LittleEndian>()?,
            pos_b: r.read_u32::<LittleEndian>()?,
            mapq: r.read_u8()?,
        }))
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u32::<LittleEndian>(self.ref_a)?;
        w.write_u32::<LittleEndian>(self.pos_a)?;
        w.write_u32::<LittleEndian>(self.ref_b)?;
        w.write_u32::<LittleEndian>(self.pos_b)?;
        w.write_u8(self.mapq)
    }
}

/// A pair record converted into the current layout's coordinates, with
/// `scaf_a <= scaf_b` (positions tie-break the swap).
#[derive(Debug, Clone, Copy)]
pub struct MappedPair {
    pub scaf_a: ScafId,
    pub pos_a: u32,
    pub scaf_b: ScafId,
    pub pos_b: u32,
}

/// Forward-only scan over the link store: applies the mapping-quality
/// filter, converts both ends through the layout, drops records with an
/// unmapped end, and canonicalizes end order.
pub struct LinkScanner<'a> {
    reader: BufReader<File>,
    layout: &'a Layout,
    min_mapq: u8,
    path: PathBuf,
    n_read: u64,
    n_kept: u64,
}

impl<'a> LinkScanner<'a> {
    pub fn open(path: &Path, layout: &'a Layout, min_mapq: u8) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| ScafError::io(path, e))
            .with_context(|| format!("opening link store {}", path.display()))?;
        Ok(Self {
            reader: BufReader::new(file),
            layout,
            min_mapq,
            path: path.to_path_buf(),
            n_read: 0,
            n_kept: 0,
        })
    }

    /// Records seen so far, before filtering.
    pub fn n_read(&self) -> u64 {
        self.n_read
    }

    /// Records that survived the mapq filter and coordinate conversion.
    pub fn n_kept(&self) -> u64 {
        self.n_kept
    }
}

impl Iterator for LinkScanner<'_> {
    type Item = Result<MappedPair>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rec = match LinkRecord::read_from(&mut self.reader) {
                Ok(Some(rec)) => rec,
                Ok(None) => return None,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Some(Err(ScafError::InputInvalid(format!(
                        "{}: truncated link record after {} records",
                        self.path.display(),
                        self.n_read
                    ))
                    .into()));
                }
                Err(e) => return Some(Err(ScafError::io(&self.path, e).into())),
            };
            self.n_read += 1;

            if rec.mapq < self.min_mapq {
                continue;
            }
            let Some((sa, pa, _)) = self.layout.coord_convert(rec.ref_a, rec.pos_a) else {
                continue;
            };
            let Some((sb, pb, _)) = self.layout.coord_convert(rec.ref_b, rec.pos_b) else {
                continue;
            };
            self.n_kept += 1;

            let pair = if (sa, pa) <= (sb, pb) {
                MappedPair { scaf_a: sa, pos_a: pa, scaf_b: sb, pos_b: pb }
            } else {
                MappedPair { scaf_a: sb, pos_a: pb, scaf_b: sa, pos_b: pa }
            };
            return Some(Ok(pair));
        }
    }
}
