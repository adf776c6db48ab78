//! AGP layout reading and writing.
//!
//! Coordinate conventions: AGP rows are 1-based inclusive on both the object
//! and the component; segments are stored 0-based half-open internally.
//! Component rows are `W` (sequence); `N`/`U` rows are gap padding and never
//! receive link counts. Declared object coordinates are reconciled by
//! trusting the component list.

use crate::dict::{Layout, LayoutBuilder, SeqDict};
use crate::error::ScafError;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Parse an AGP file into a layout over `dict`.
///
/// Rows referencing a contig name absent from `dict` are rejected.
pub fn read_layout(dict: &SeqDict, path: &Path) -> Result<Layout> {
    let file = File::open(path)
        .map_err(|e| ScafError::io(path, e))
        .with_context(|| format!("opening AGP {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut b = LayoutBuilder::new(dict.n_seqs());
    let mut current: Option<String> = None;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ScafError::io(path, e))?;
        let row = line.trim_end();
        if row.is_empty() || row.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 6 {
            return Err(ScafError::InputInvalid(format!(
                "{}:{}: AGP row has {} fields, at least 6 expected",
                path.display(),
                lineno + 1,
                fields.len()
            ))
            .into());
        }

        let object = fields[0];
        if current.as_deref() != Some(object) {
            b.begin_scaffold(object);
            current = Some(object.to_string());
        }

        match fields[4] {
            "W" => {
                if fields.len() < 9 {
                    return Err(ScafError::InputInvalid(format!(
                        "{}:{}: W row has {} fields, 9 expected",
                        path.display(),
                        lineno + 1,
                        fields.len()
                    ))
                    .into());
                }
                let name = fields[5];
                let seq = dict.get(name).ok_or_else(|| {
                    ScafError::InputInvalid(format!(
                        "{}:{}: unknown sequence name: {name}",
                        path.display(),
                        lineno + 1
                    ))
                })?;
                let beg: u32 = parse_field(fields[6], path, lineno, "component start")?;
                let end: u32 = parse_field(fields[7], path, lineno, "component end")?;
                if beg < 1 || end < beg || end > dict.seq_len(seq) {
                    return Err(ScafError::InputInvalid(format!(
                        "{}:{}: component interval {beg}-{end} outside {name}",
                        path.display(),
                        lineno + 1
                    ))
                    .into());
                }
                let ori = if fields[8].starts_with('-') { 1 } else { 0 };
                b.push_segment(seq, beg - 1, end - beg + 1, ori);
            }
            "N" | "U" => {
                let gap: u32 = parse_field(fields[5], path, lineno, "gap length")?;
                b.push_gap(gap);
            }
            other => {
                return Err(ScafError::InputInvalid(format!(
                    "{}:{}: unsupported component type: {other}",
                    path.display(),
                    lineno + 1
                ))
                .into());
            }
        }
    }

    Ok(b.finish())
}

fn parse_field(s: &str, path: &Path, lineno: usize, what: &str) -> Result<u32> {
    s.parse().map_err(|_| {
        ScafError::InputInvalid(format!(
            "{}:{}: invalid {what}: {s}",
            path.display(),
            lineno + 1
        ))
        .into()
    })
}

/// Write a layout as AGP, one object per scaffold, in layout order.
pub fn write_layout<W: Write>(layout: &Layout, dict: &SeqDict, w: &mut W) -> Result<()> {
    for (sid, scaf) in layout.scaffolds() {
        write_object(layout, dict, sid, &scaf.name, w)?;
    }
    Ok(())
}

/// Write a layout as AGP sorted by decreasing scaffold length, renaming
/// objects `scaffold_1..n`. Used for the final output.
pub fn write_sorted<W: Write>(layout: &Layout, dict: &SeqDict, w: &mut W) -> Result<()> {
    let mut order: Vec<u32> = (0..layout.n_scaffolds() as u32).collect();
    order.sort_by_key(|&sid| std::cmp::Reverse(layout.scaffold(sid).len));
    for (rank, &sid) in order.iter().enumerate() {
        let name = format!("scaffold_{}", rank + 1);
        write_object(layout, dict, sid, &name, w)?;
    }
    Ok(())
}

/// Write an identity AGP (one object per contig) from a bare dictionary.
pub fn write_identity<W: Write>(dict: &SeqDict, w: &mut W) -> Result<()> {
    for (_, entry) in dict.iter() {
        writeln!(
            w,
            "{}\t1\t{}\t1\tW\t{}\t1\t{}\t+",
            entry.name, entry.len, entry.name, entry.len
        )?;
    }
    Ok(())
}

fn write_object<W: Write>(
    layout: &Layout,
    dict: &SeqDict,
    sid: u32,
    name: &str,
    w: &mut W,
) -> Result<()> {
    let mut part = 0u32;
    let mut prev_end: Option<u32> = None;
    for seg in layout.segments_of(sid) {
        if let Some(pe) = prev_end {
            if seg.scaf_start > pe {
                part += 1;
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\tN\t{}\tscaffold\tyes\tproximity_ligation",
                    name,
                    pe + 1,
                    seg.scaf_start,
                    part,
                    seg.scaf_start - pe
                )?;
            }
        }
        part += 1;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\tW\t{}\t{}\t{}\t{}",
            name,
            seg.scaf_start + 1,
            seg.scaf_start + seg.len,
            part,
            dict.name(seg.seq),
            seg.start + 1,
            seg.end(),
            if seg.ori == 0 { '+' } else { '-' }
        )?;
        prev_end = Some(seg.scaf_start + seg.len);
    }
    Ok(())
}

/// Create `path` and write a layout into it.
pub fn write_layout_file(layout: &Layout, dict: &SeqDict, path: &Path) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| ScafError::io(path, e))
        .with_context(|| format!("creating AGP {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_layout(layout, dict, &mut w)?;
    w.flush().map_err(|e| ScafError::io(path, e))?;
    Ok(())
}

/// Create `path` and write the length-sorted final layout into it.
pub fn write_sorted_file(layout: &Layout, dict: &SeqDict, path: &Path) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| ScafError::io(path, e))
        .with_context(|| format!("creating AGP {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_sorted(layout, dict, &mut w)?;
    w.flush().map_err(|e| ScafError::io(path, e))?;
    Ok(())
}

/// Create `path` and write an identity AGP into it.
pub fn write_identity_file(dict: &SeqDict, path: &Path) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| ScafError::io(path, e))
        .with_context(|| format!("creating AGP {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_identity(dict, &mut w)?;
    w.flush().map_err(|e| ScafError::io(path, e))?;
    Ok(())
}
