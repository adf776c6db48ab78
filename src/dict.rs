//! Sequence and layout dictionaries.
//!
//! [`SeqDict`] maps contig names to dense indices and lengths, loaded from a
//! FAI-style index. [`Layout`] describes the current assembly: scaffolds as
//! ordered, oriented segments over contigs, with a per-contig index that
//! converts contig coordinates to scaffold coordinates in
//! O(log segments-of-that-contig).

use crate::error::ScafError;
use crate::types::{HashMap, HashMapExt, ScafId, SeqId};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct SeqEntry {
    pub name: String,
    pub len: u32,
}

/// Contig dictionary: bijective name ↔ index mapping plus lengths.
///
/// Indices are densely packed `[0, N)` and never change within a dictionary
/// lifetime.
#[derive(Debug, Default)]
pub struct SeqDict {
    seqs: Vec<SeqEntry>,
    index: HashMap<String, SeqId>,
}

impl SeqDict {
    pub fn new() -> Self {
        Self { seqs: Vec::new(), index: HashMap::new() }
    }

    /// Register a contig. Duplicate names fail.
    pub fn put(&mut self, name: &str, len: u32) -> Result<SeqId, ScafError> {
        if self.index.contains_key(name) {
            return Err(ScafError::InputInvalid(format!("duplicate sequence name: {name}")));
        }
        let id = self.seqs.len() as SeqId;
        self.index.insert(name.to_string(), id);
        self.seqs.push(SeqEntry { name: name.to_string(), len });
        Ok(id)
    }

    pub fn get(&self, name: &str) -> Option<SeqId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: SeqId) -> &str {
        &self.seqs[id as usize].name
    }

    pub fn seq_len(&self, id: SeqId) -> u32 {
        self.seqs[id as usize].len
    }

    pub fn n_seqs(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn total_len(&self) -> u64 {
        self.seqs.iter().map(|s| s.len as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SeqId, &SeqEntry)> {
        self.seqs.iter().enumerate().map(|(i, s)| (i as SeqId, s))
    }

    /// Load from a FAI index (whitespace-delimited `name length …` rows),
    /// keeping only contigs of at least `min_len` bases.
    pub fn from_fai(path: &Path, min_len: u32) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| ScafError::io(path, e))
            .with_context(|| format!("opening FAI index {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut dict = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ScafError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let name = fields.next().ok_or_else(|| {
                ScafError::InputInvalid(format!("{}:{}: empty FAI row", path.display(), lineno + 1))
            })?;
            let len: u32 = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    ScafError::InputInvalid(format!(
                        "{}:{}: missing or invalid length field",
                        path.display(),
                        lineno + 1
                    ))
                })?;
            if len >= min_len {
                dict.put(name, len)?;
            }
        }
        Ok(dict)
    }
}

/// One oriented sub-interval of a contig placed inside a scaffold.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    /// Owning scaffold.
    pub scaf: ScafId,
    /// Start of this segment in scaffold coordinates.
    pub scaf_start: u32,
    /// Source contig.
    pub seq: SeqId,
    /// Start of the sub-interval on the source contig.
    pub start: u32,
    /// Sub-interval length in bases.
    pub len: u32,
    /// 0 = forward, 1 = reverse.
    pub ori: u8,
}

impl Segment {
    /// Exclusive end of the sub-interval on the source contig.
    pub fn end(&self) -> u32 {
        self.start + self.len
    }
}

#[derive(Debug, Clone)]
pub struct Scaffold {
    pub name: String,
    /// Total length including gap padding.
    pub len: u32,
    first_seg: u32,
    n_segs: u32,
}

/// Assembly layout: scaffolds over oriented contig segments.
///
/// Segment intervals on the same contig never overlap; their union is a
/// subset of `[0, contig_len)`. Built once per round, queried read-only.
#[derive(Debug)]
pub struct Layout {
    scaffolds: Vec<Scaffold>,
    segs: Vec<Segment>,
    // Per-contig lookup into `segs`: entries `contig_end << 32 | seg_idx`,
    // sorted by end, one slice per contig (sdict-style index).
    seq_start: Vec<u32>,
    seq_index: Vec<u64>,
    n_seqs: usize,
}

impl Layout {
    /// Identity layout: one scaffold per contig, forward, whole length.
    pub fn from_dict(dict: &SeqDict) -> Self {
        let mut b = LayoutBuilder::new(dict.n_seqs());
        for (id, entry) in dict.iter() {
            b.begin_scaffold(&entry.name);
            b.push_segment(id, 0, entry.len, 0);
        }
        b.finish()
    }

    pub fn n_scaffolds(&self) -> usize {
        self.scaffolds.len()
    }

    pub fn n_seqs(&self) -> usize {
        self.n_seqs
    }

    pub fn scaffold(&self, id: ScafId) -> &Scaffold {
        &self.scaffolds[id as usize]
    }

    pub fn scaffolds(&self) -> impl Iterator<Item = (ScafId, &Scaffold)> {
        self.scaffolds.iter().enumerate().map(|(i, s)| (i as ScafId, s))
    }

    pub fn segments_of(&self, id: ScafId) -> &[Segment] {
        let s = &self.scaffolds[id as usize];
        &self.segs[s.first_seg as usize..(s.first_seg + s.n_segs) as usize]
    }

    pub fn total_len(&self) -> u64 {
        self.scaffolds.iter().map(|s| s.len as u64).sum()
    }

    /// Gap-padding intervals of a scaffold, in scaffold coordinates.
    pub fn gaps_of(&self, id: ScafId) -> Vec<(u32, u32)> {
        let mut gaps = Vec::new();
        let mut cursor = 0u32;
        for seg in self.segments_of(id) {
            if seg.scaf_start > cursor {
                gaps.push((cursor, seg.scaf_start));
            }
            cursor = seg.scaf_start + seg.len;
        }
        let len = self.scaffolds[id as usize].len;
        if cursor < len {
            gaps.push((cursor, len));
        }
        gaps
    }

    /// Convert a contig position to scaffold coordinates.
    ///
    /// Returns `None` when the position falls outside every segment (the
    /// contig was filtered out, or the region is not part of the layout).
    pub fn coord_convert(&self, seq: SeqId, pos: u32) -> Option<(ScafId, u32, u8)> {
        if (seq as usize) >= self.n_seqs {
            return None;
        }
        let lo = self.seq_start[seq as usize] as usize;
        let hi = self.seq_start[seq as usize + 1] as usize;
        let index = &self.seq_index[lo..hi];
        // First segment whose contig end is > pos.
        let i = index.partition_point(|&e| (e >> 32) as u32 <= pos);
        if i == index.len() {
            return None;
        }
        let seg = &self.segs[(index[i] & 0xffff_ffff) as usize];
        if pos < seg.start {
            return None;
        }
        let off = pos - seg.start;
        let p = if seg.ori == 0 {
            seg.scaf_start + off
        } else {
            seg.scaf_start + (seg.len - 1 - off)
        };
        Some((seg.scaf, p, seg.ori))
    }

    /// Compose a new layout from ordered, oriented paths over this layout's
    /// scaffolds. Members are joined with `gap_len` bases of padding; member
    /// internal structure (segments and gaps) is preserved, reversed when the
    /// member enters the path reversed.
    pub fn compose(&self, paths: &[Vec<(ScafId, u8)>], gap_len: u32) -> Layout {
        let mut b = LayoutBuilder::new(self.n_seqs);
        for (i, path) in paths.iter().enumerate() {
            b.begin_scaffold(&format!("scaffold_{}", i + 1));
            for (k, &(sid, ori)) in path.iter().enumerate() {
                if k > 0 {
                    b.push_gap(gap_len);
                }
                let scaf = &self.scaffolds[sid as usize];
                let segs = self.segments_of(sid);
                if ori == 0 {
                    let mut cursor = 0u32;
                    for seg in segs {
                        if seg.scaf_start > cursor {
                            b.push_gap(seg.scaf_start - cursor);
                        }
                        b.push_segment(seg.seq, seg.start, seg.len, seg.ori);
                        cursor = seg.scaf_start + seg.len;
                    }
                } else {
                    let mut cursor = scaf.len;
                    for seg in segs.iter().rev() {
                        let seg_end = seg.scaf_start + seg.len;
                        if seg_end < cursor {
                            b.push_gap(cursor - seg_end);
                        }
                        b.push_segment(seg.seq, seg.start, seg.len, seg.ori ^ 1);
                        cursor = seg.scaf_start;
                    }
                }
            }
        }
        b.finish()
    }

    /// Split scaffolds at the given scaffold-coordinate cut positions,
    /// producing a renumbered layout. Cuts inside gap padding snap to the
    /// gap and drop it; cuts at position 0 or the scaffold end are ignored.
    pub fn with_breaks(&self, cuts: &[(ScafId, u32)]) -> Layout {
        let mut by_scaf: HashMap<ScafId, Vec<u32>> = HashMap::new();
        for &(sid, pos) in cuts {
            if pos > 0 && pos < self.scaffolds[sid as usize].len {
                by_scaf.entry(sid).or_default().push(pos);
            }
        }
        for v in by_scaf.values_mut() {
            v.sort_unstable();
            v.dedup();
        }

        let mut b = LayoutBuilder::new(self.n_seqs);
        let mut n_out = 0usize;
        for (sid, _) in self.scaffolds() {
            let empty = Vec::new();
            let cuts = by_scaf.get(&sid).unwrap_or(&empty);
            let mut cut_iter = cuts.iter().copied().peekable();

            n_out += 1;
            b.begin_scaffold(&format!("scaffold_{n_out}"));
            let mut prev_end: Option<u32> = None; // scaffold coord of last emitted segment end
            for seg in self.segments_of(sid) {
                // Cuts at or before this segment's start close the current
                // scaffold (any skipped padding is dropped).
                while let Some(&c) = cut_iter.peek() {
                    if c <= seg.scaf_start {
                        cut_iter.next();
                        if b.open_scaffold_has_segments() {
                            n_out += 1;
                            b.begin_scaffold(&format!("scaffold_{n_out}"));
                            prev_end = None;
                        }
                    } else {
                        break;
                    }
                }
                // Gap between the previous segment and this one, preserved
                // within an output scaffold.
                if let Some(pe) = prev_end {
                    if seg.scaf_start > pe {
                        b.push_gap(seg.scaf_start - pe);
                    }
                }

                let mut piece = *seg;
                // Cuts inside this segment split it.
                while let Some(&c) = cut_iter.peek() {
                    if c < piece.scaf_start + piece.len {
                        cut_iter.next();
                        let left_len = c - piece.scaf_start;
                        if left_len > 0 {
                            let (lstart, rstart) = if piece.ori == 0 {
                                (piece.start, piece.start + left_len)
                            } else {
                                (piece.start + piece.len - left_len, piece.start)
                            };
                            b.push_segment(piece.seq, lstart, left_len, piece.ori);
                            piece.scaf_start = c;
                            piece.len -= left_len;
                            piece.start = rstart;
                        }
                        n_out += 1;
                        b.begin_scaffold(&format!("scaffold_{n_out}"));
                        prev_end = None;
                    } else {
                        break;
                    }
                }
                b.push_segment(piece.seq, piece.start, piece.len, piece.ori);
                prev_end = Some(piece.scaf_start + piece.len);
            }
        }
        b.finish()
    }

    /// Append contigs absent from every segment as singleton scaffolds.
    /// Used at finalization to merge back sequences excluded by the
    /// minimum-length filter.
    pub fn add_unplaced(&self, dict: &SeqDict) -> Layout {
        let mut used = vec![false; dict.n_seqs()];
        for seg in &self.segs {
            used[seg.seq as usize] = true;
        }

        let mut b = LayoutBuilder::new(dict.n_seqs());
        for (sid, scaf) in self.scaffolds() {
            b.begin_scaffold(&scaf.name);
            let mut prev_end: Option<u32> = None;
            for seg in self.segments_of(sid) {
                if let Some(pe) = prev_end {
                    if seg.scaf_start > pe {
                        b.push_gap(seg.scaf_start - pe);
                    }
                }
                b.push_segment(seg.seq, seg.start, seg.len, seg.ori);
                prev_end = Some(seg.scaf_start + seg.len);
            }
        }
        let mut extra = self.scaffolds.len();
        for (id, entry) in dict.iter() {
            if !used[id as usize] {
                extra += 1;
                b.begin_scaffold(&format!("scaffold_{extra}"));
                b.push_segment(id, 0, entry.len, 0);
            }
        }
        b.finish()
    }

    /// Nx length/count table: entry `i` holds (N(10·(i+1)), count) over
    /// scaffold lengths sorted descending.
    pub fn n_stats(&self) -> [(u64, u32); 10] {
        let mut lens: Vec<u64> = self.scaffolds.iter().map(|s| s.len as u64).collect();
        lens.sort_unstable_by(|a, b| b.cmp(a));
        let total: u64 = lens.iter().sum();

        let mut stats = [(0u64, 0u32); 10];
        let mut acc = 0u64;
        let mut k = 0usize;
        for i in 0..10 {
            let thresh = total * (i as u64 + 1) / 10;
            while k < lens.len() && acc < thresh {
                acc += lens[k];
                k += 1;
            }
            let last = if k > 0 { lens[k - 1] } else { 0 };
            stats[i] = (last, k as u32);
        }
        stats
    }
}

/// Incremental layout assembly; computes scaffold lengths, the flat segment
/// array, and the per-contig conversion index.
pub struct LayoutBuilder {
    scaffolds: Vec<Scaffold>,
    segs: Vec<Segment>,
    cursor: u32,
    n_seqs: usize,
}

impl LayoutBuilder {
    pub fn new(n_seqs: usize) -> Self {
        Self { scaffolds: Vec::new(), segs: Vec::new(), cursor: 0, n_seqs }
    }

    pub fn begin_scaffold(&mut self, name: &str) {
        self.close();
        self.scaffolds.push(Scaffold {
            name: name.to_string(),
            len: 0,
            first_seg: self.segs.len() as u32,
            n_segs: 0,
        });
        self.cursor = 0;
    }

    pub fn push_segment(&mut self, seq: SeqId, start: u32, len: u32, ori: u8) {
        let scaf = (self.scaffolds.len() - 1) as ScafId;
        self.segs.push(Segment { scaf, scaf_start: self.cursor, seq, start, len, ori });
        self.cursor += len;
        let s = self.scaffolds.last_mut().expect("begin_scaffold first");
        s.n_segs += 1;
    }

    pub fn push_gap(&mut self, len: u32) {
        self.cursor += len;
    }

    fn open_scaffold_has_segments(&self) -> bool {
        self.scaffolds.last().map(|s| s.n_segs > 0).unwrap_or(false)
    }

    fn close(&mut self) {
        if let Some(s) = self.scaffolds.last_mut() {
            s.len = self.cursor;
        }
    }

    pub fn finish(mut self) -> Layout {
        self.close();
        // Drop scaffolds that ended up with no segments (all-gap objects).
        let mut scaffolds = Vec::with_capacity(self.scaffolds.len());
        let mut segs = Vec::with_capacity(self.segs.len());
        for s in &self.scaffolds {
            if s.n_segs == 0 {
                continue;
            }
            let scaf = scaffolds.len() as ScafId;
            let first = segs.len() as u32;
            for old in &self.segs[s.first_seg as usize..(s.first_seg + s.n_segs) as usize] {
                segs.push(Segment { scaf, ..*old });
            }
            scaffolds.push(Scaffold { first_seg: first, ..s.clone() });
        }

        // Per-contig index: (contig_end << 32 | seg_idx), grouped by contig,
        // sorted by end within each group.
        let mut per_seq: Vec<Vec<u64>> = vec![Vec::new(); self.n_seqs];
        for (i, seg) in segs.iter().enumerate() {
            per_seq[seg.seq as usize].push(((seg.end() as u64) << 32) | i as u64);
        }
        let mut seq_start = Vec::with_capacity(self.n_seqs + 1);
        let mut seq_index = Vec::with_capacity(segs.len());
        seq_start.push(0u32);
        for list in &mut per_seq {
            list.sort_unstable();
            seq_index.extend_from_slice(list);
            seq_start.push(seq_index.len() as u32);
        }

        Layout { scaffolds, segs, seq_start, seq_index, n_seqs: self.n_seqs }
    }
}
