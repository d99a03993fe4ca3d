//! Street names and number ranges (§4.6).
//!
//! Grounded in `editor_street.c`/`editor_street.h`. A street record holds
//! five dictionary ids (direction prefix, name, type, direction suffix,
//! type-to-street note); a range record holds the left/right city and zip
//! dictionary ids plus the left/right house-number bounds. Direction
//! prefixes/suffixes are interned in [`Volume::Streets`] alongside street
//! names — the fixed section table has no dedicated volume for them, and
//! they're short enough not to be worth widening it for.

use crate::byteio::*;
use crate::dictionary::{self, DictCtx};
use crate::error::Result;
use crate::layout::{SectionLayout, Volume};
use crate::line;
use crate::section;

pub const SIDE_LEFT: u8 = 1;
pub const SIDE_RIGHT: u8 = 2;

const OFF_FEDIRP: usize = 0;
const OFF_FENAME: usize = 4;
const OFF_FETYPE: usize = 8;
const OFF_FEDIRS: usize = 12;
const OFF_T2S: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct Street {
    pub fedirp: i32,
    pub fename: i32,
    pub fetype: i32,
    pub fedirs: i32,
    pub t2s: i32,
}

fn encode_street(s: Street) -> [u8; 20] {
    let mut b = [0u8; 20];
    write_i32_at(&mut b, OFF_FEDIRP, s.fedirp);
    write_i32_at(&mut b, OFF_FENAME, s.fename);
    write_i32_at(&mut b, OFF_FETYPE, s.fetype);
    write_i32_at(&mut b, OFF_FEDIRS, s.fedirs);
    write_i32_at(&mut b, OFF_T2S, s.t2s);
    b
}

fn decode_street(buf: &[u8], addr: usize) -> Street {
    Street {
        fedirp: read_i32_at(buf, addr + OFF_FEDIRP),
        fename: read_i32_at(buf, addr + OFF_FENAME),
        fetype: read_i32_at(buf, addr + OFF_FETYPE),
        fedirs: read_i32_at(buf, addr + OFF_FEDIRS),
        t2s: read_i32_at(buf, addr + OFF_T2S),
    }
}

/// `editor_street_create`: interns the name components and returns the id of
/// a street record carrying them, reusing an existing record with the same
/// four dictionary ids instead of appending a duplicate (the source keeps
/// street records unique per name so export doesn't repeat the same name for
/// every range that happens to share it).
pub fn create(buf: &mut [u8], pool_offset: usize, block_size: u32, streets: &SectionLayout, dict: &DictCtx, t2s_dict: &DictCtx, name: &str, street_type: &str, prefix: &str, suffix: &str, t2s: &str) -> Result<u32> {
    let fename = dictionary::add(buf, dict, name)?;
    let fetype = dictionary::add(buf, dict, street_type)?;
    let fedirp = dictionary::add(buf, dict, prefix)?;
    let fedirs = dictionary::add(buf, dict, suffix)?;
    let t2s_id = dictionary::add(buf, t2s_dict, t2s)?;

    for id in 0..section::num_items(buf, streets) {
        let existing = get(buf, pool_offset, block_size, streets, id)?;
        if existing.fedirp == fedirp && existing.fename == fename && existing.fetype == fetype && existing.fedirs == fedirs {
            return Ok(id);
        }
    }

    section::append(buf, pool_offset, block_size, streets, &encode_street(Street { fedirp, fename, fetype, fedirs, t2s: t2s_id }))
}

pub fn get(buf: &mut [u8], pool_offset: usize, block_size: u32, streets: &SectionLayout, id: u32) -> Result<Street> {
    let addr = section::get(buf, pool_offset, block_size, streets, id, false, None)?;
    Ok(decode_street(buf, addr))
}

/// The fully composed street name (`prefix name type suffix`), skipping
/// empty components, mirroring `editor_street_get_full_name`.
pub fn full_name(buf: &mut [u8], ctx: &DictCtx, street: Street) -> Result<String> {
    let mut parts = Vec::new();
    for id in [street.fedirp, street.fename, street.fetype, street.fedirs] {
        if let Some(s) = dictionary::get(buf, ctx, id)? {
            if !s.is_empty() {
                parts.push(s);
            }
        }
    }
    Ok(parts.join(" "))
}

const OFF_LEFT_CITY: usize = 0;
const OFF_LEFT_ZIP: usize = 4;
const OFF_LEFT_FROM: usize = 8;
const OFF_LEFT_TO: usize = 12;
const OFF_RIGHT_CITY: usize = 16;
const OFF_RIGHT_ZIP: usize = 20;
const OFF_RIGHT_FROM: usize = 24;
const OFF_RIGHT_TO: usize = 28;

#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub left_city: i32,
    pub left_zip: i32,
    pub left_from: i32,
    pub left_to: i32,
    pub right_city: i32,
    pub right_zip: i32,
    pub right_from: i32,
    pub right_to: i32,
}

fn encode_range(r: Range) -> [u8; 32] {
    let mut b = [0u8; 32];
    write_i32_at(&mut b, OFF_LEFT_CITY, r.left_city);
    write_i32_at(&mut b, OFF_LEFT_ZIP, r.left_zip);
    write_i32_at(&mut b, OFF_LEFT_FROM, r.left_from);
    write_i32_at(&mut b, OFF_LEFT_TO, r.left_to);
    write_i32_at(&mut b, OFF_RIGHT_CITY, r.right_city);
    write_i32_at(&mut b, OFF_RIGHT_ZIP, r.right_zip);
    write_i32_at(&mut b, OFF_RIGHT_FROM, r.right_from);
    write_i32_at(&mut b, OFF_RIGHT_TO, r.right_to);
    b
}

fn decode_range(buf: &[u8], addr: usize) -> Range {
    Range {
        left_city: read_i32_at(buf, addr + OFF_LEFT_CITY),
        left_zip: read_i32_at(buf, addr + OFF_LEFT_ZIP),
        left_from: read_i32_at(buf, addr + OFF_LEFT_FROM),
        left_to: read_i32_at(buf, addr + OFF_LEFT_TO),
        right_city: read_i32_at(buf, addr + OFF_RIGHT_CITY),
        right_zip: read_i32_at(buf, addr + OFF_RIGHT_ZIP),
        right_from: read_i32_at(buf, addr + OFF_RIGHT_FROM),
        right_to: read_i32_at(buf, addr + OFF_RIGHT_TO),
    }
}

pub fn range_add(buf: &mut [u8], pool_offset: usize, block_size: u32, ranges: &SectionLayout, r: Range) -> Result<u32> {
    section::append(buf, pool_offset, block_size, ranges, &encode_range(r))
}

pub fn range_get(buf: &mut [u8], pool_offset: usize, block_size: u32, ranges: &SectionLayout, id: u32) -> Result<Range> {
    let addr = section::get(buf, pool_offset, block_size, ranges, id, false, None)?;
    Ok(decode_range(buf, addr))
}

/// `editor_street_get_street_range`: the `(from, to)` house-number bounds
/// for one side of a range record.
pub fn side_range(range: Range, side: u8) -> (i32, i32) {
    if side == SIDE_LEFT {
        (range.left_from, range.left_to)
    } else {
        (range.right_from, range.right_to)
    }
}

/// `editor_street_set_range`: overwrites one side's house-number bounds.
pub fn set_side_range(buf: &mut [u8], pool_offset: usize, block_size: u32, ranges: &SectionLayout, id: u32, side: u8, from: i32, to: i32) -> Result<()> {
    let addr = section::get(buf, pool_offset, block_size, ranges, id, false, None)?;
    let (from_off, to_off) = if side == SIDE_LEFT { (OFF_LEFT_FROM, OFF_LEFT_TO) } else { (OFF_RIGHT_FROM, OFF_RIGHT_TO) };
    write_i32_at(buf, addr + from_off, from);
    write_i32_at(buf, addr + to_off, to);
    Ok(())
}

/// `editor_street_distribute_range`: spreads a house-number range over
/// `lines` proportionally to each line's geometric length.
#[allow(clippy::too_many_arguments)]
pub fn distribute_range(
    buf: &mut [u8],
    pool_offset: usize,
    block_size: u32,
    lines_section: &SectionLayout,
    points: &SectionLayout,
    trksegs: &SectionLayout,
    shapes: &SectionLayout,
    ranges: &SectionLayout,
    lines: &[u32],
    mut l_from: i32,
    l_to: i32,
    mut r_from: i32,
    r_to: i32,
) -> Result<()> {
    let mut lengths = Vec::with_capacity(lines.len());
    let mut total = 0.0f64;
    for &id in lines {
        let len = line::length(buf, pool_offset, block_size, lines_section, points, trksegs, shapes, id)?;
        lengths.push(len);
        total += len;
    }

    if total == 0.0 {
        return Ok(());
    }

    let delta_left = (l_to - l_from) as f64;
    let delta_right = (r_to - r_from) as f64;

    for (i, &id) in lines.iter().enumerate() {
        if lengths[i] == 0.0 {
            continue;
        }

        let mut this_l_to = (delta_left * lengths[i] / total + l_from as f64) as i32;
        let mut this_r_to = (delta_right * lengths[i] / total + r_from as f64) as i32;
        if this_l_to > l_to {
            this_l_to = l_to;
        }
        if this_r_to > r_to {
            this_r_to = r_to;
        }

        let (_, range_id) = line::get_street(buf, pool_offset, block_size, lines_section, id)?;
        if range_id >= 0 {
            set_side_range(buf, pool_offset, block_size, ranges, range_id as u32, SIDE_LEFT, l_from, this_l_to)?;
            set_side_range(buf, pool_offset, block_size, ranges, range_id as u32, SIDE_RIGHT, r_from, this_r_to)?;
        }

        l_from = this_l_to;
        r_from = this_r_to;
    }

    Ok(())
}

/// `editor_street_range_copy`: duplicates an existing range record verbatim
/// (used when an editor-owned line carrying its own range is split or
/// copied, as opposed to building a fresh one from base-map properties).
pub fn copy_range(buf: &mut [u8], pool_offset: usize, block_size: u32, ranges: &SectionLayout, source_range_id: i32) -> Result<i32> {
    if source_range_id < 0 {
        return Ok(-1);
    }
    let range = range_get(buf, pool_offset, block_size, ranges, source_range_id as u32)?;
    Ok(range_add(buf, pool_offset, block_size, ranges, range)? as i32)
}
