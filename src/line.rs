//! Lines (§4.6): the editor's road-segment record, tying together its two
//! endpoint points, its road-list of trksegs, and (optionally) a street,
//! range, and route overlay.
//!
//! Grounded in `editor_line.c`. Copying a base-map line into the editor
//! (`editor_line_copy`) needs the base-map reader and the override index, so
//! it lives in [`crate::editor_db`] as an orchestration step; this module
//! covers the pure editor-side record and the split algorithm once both
//! halves already have editor points and trksegs.

use crate::byteio::*;
use crate::error::Result;
use crate::geometry::{azimuth, azimuth_delta, distance, Position};
use crate::layout::SectionLayout;
use crate::point;
use crate::section;
use crate::shape;
use crate::trkseg;

pub const FLAG_DELETED: i32 = 0x1;
pub const FLAG_EXPLICIT_SPLIT: i32 = 0x2;
pub const FLAG_DIRTY: i32 = 0x4;
pub const FLAG_CONNECTION: i32 = 0x8;

const OFF_POINT_FROM: usize = 0;
const OFF_POINT_TO: usize = 4;
const OFF_FIRST_TRKSEG: usize = 8;
const OFF_LAST_TRKSEG: usize = 12;
const OFF_CFCC: usize = 16;
const OFF_FLAGS: usize = 20;
const OFF_STREET: usize = 24;
const OFF_RANGE: usize = 28;
const OFF_ROUTE: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct Line {
    pub point_from: i32,
    pub point_to: i32,
    pub first_trkseg: i32,
    pub last_trkseg: i32,
    pub cfcc: i32,
    pub flags: i32,
    pub street: i32,
    pub range: i32,
    pub route: i32,
}

fn encode(l: Line) -> [u8; 36] {
    let mut b = [0u8; 36];
    write_i32_at(&mut b, OFF_POINT_FROM, l.point_from);
    write_i32_at(&mut b, OFF_POINT_TO, l.point_to);
    write_i32_at(&mut b, OFF_FIRST_TRKSEG, l.first_trkseg);
    write_i32_at(&mut b, OFF_LAST_TRKSEG, l.last_trkseg);
    write_i32_at(&mut b, OFF_CFCC, l.cfcc);
    write_i32_at(&mut b, OFF_FLAGS, l.flags);
    write_i32_at(&mut b, OFF_STREET, l.street);
    write_i32_at(&mut b, OFF_RANGE, l.range);
    write_i32_at(&mut b, OFF_ROUTE, l.route);
    b
}

fn decode(buf: &[u8], addr: usize) -> Line {
    Line {
        point_from: read_i32_at(buf, addr + OFF_POINT_FROM),
        point_to: read_i32_at(buf, addr + OFF_POINT_TO),
        first_trkseg: read_i32_at(buf, addr + OFF_FIRST_TRKSEG),
        last_trkseg: read_i32_at(buf, addr + OFF_LAST_TRKSEG),
        cfcc: read_i32_at(buf, addr + OFF_CFCC),
        flags: read_i32_at(buf, addr + OFF_FLAGS),
        street: read_i32_at(buf, addr + OFF_STREET),
        range: read_i32_at(buf, addr + OFF_RANGE),
        route: read_i32_at(buf, addr + OFF_ROUTE),
    }
}

fn addr_of(buf: &mut [u8], pool_offset: usize, block_size: u32, lines: &SectionLayout, id: u32) -> Result<usize> {
    section::get(buf, pool_offset, block_size, lines, id, false, None)
}

pub fn get(buf: &mut [u8], pool_offset: usize, block_size: u32, lines: &SectionLayout, id: u32) -> Result<Line> {
    let addr = addr_of(buf, pool_offset, block_size, lines, id)?;
    Ok(decode(buf, addr))
}

fn set(buf: &mut [u8], pool_offset: usize, block_size: u32, lines: &SectionLayout, id: u32, l: Line) -> Result<()> {
    let addr = addr_of(buf, pool_offset, block_size, lines, id)?;
    buf[addr..addr + 36].copy_from_slice(&encode(l));
    Ok(())
}

/// `editor_line_add`: appends a line record. The caller has already built
/// the trkseg chain and added the line to the spatial index (§4.6) — this
/// only stores the record.
pub fn add(buf: &mut [u8], pool_offset: usize, block_size: u32, lines: &SectionLayout, point_from: i32, point_to: i32, trkseg: i32, cfcc: i32, flags: i32) -> Result<u32> {
    let line = Line { point_from, point_to, first_trkseg: trkseg, last_trkseg: trkseg, cfcc, flags, street: -1, range: -1, route: -1 };
    section::append(buf, pool_offset, block_size, lines, &encode(line))
}

pub fn modify_properties(buf: &mut [u8], pool_offset: usize, block_size: u32, lines: &SectionLayout, id: u32, cfcc: i32, flags: i32) -> Result<()> {
    let mut line = get(buf, pool_offset, block_size, lines, id)?;
    line.cfcc = cfcc;
    line.flags = flags;
    set(buf, pool_offset, block_size, lines, id, line)
}

pub fn get_street(buf: &mut [u8], pool_offset: usize, block_size: u32, lines: &SectionLayout, id: u32) -> Result<(i32, i32)> {
    let line = get(buf, pool_offset, block_size, lines, id)?;
    Ok((line.street, line.range))
}

pub fn set_street(buf: &mut [u8], pool_offset: usize, block_size: u32, lines: &SectionLayout, id: u32, street: i32, range: i32) -> Result<()> {
    let mut line = get(buf, pool_offset, block_size, lines, id)?;
    line.street = street;
    line.range = range;
    set(buf, pool_offset, block_size, lines, id, line)
}

pub fn get_route(buf: &mut [u8], pool_offset: usize, block_size: u32, lines: &SectionLayout, id: u32) -> Result<i32> {
    Ok(get(buf, pool_offset, block_size, lines, id)?.route)
}

pub fn set_route(buf: &mut [u8], pool_offset: usize, block_size: u32, lines: &SectionLayout, id: u32, route: i32) -> Result<()> {
    let mut line = get(buf, pool_offset, block_size, lines, id)?;
    line.route = route;
    set(buf, pool_offset, block_size, lines, id, line)
}

pub fn get_trksegs(buf: &mut [u8], pool_offset: usize, block_size: u32, lines: &SectionLayout, id: u32) -> Result<(i32, i32)> {
    let line = get(buf, pool_offset, block_size, lines, id)?;
    Ok((line.first_trkseg, line.last_trkseg))
}

pub fn set_trksegs(buf: &mut [u8], pool_offset: usize, block_size: u32, lines: &SectionLayout, id: u32, first: i32, last: i32) -> Result<()> {
    let mut line = get(buf, pool_offset, block_size, lines, id)?;
    line.first_trkseg = first;
    line.last_trkseg = last;
    set(buf, pool_offset, block_size, lines, id, line)
}

/// `editor_line_length`: sum of the distance along `point_from` -> (the
/// first trkseg's shape points, if any) -> `point_to`.
pub fn length(
    buf: &mut [u8],
    pool_offset: usize,
    block_size: u32,
    lines: &SectionLayout,
    points: &SectionLayout,
    trksegs: &SectionLayout,
    shapes: &SectionLayout,
    id: u32,
) -> Result<f64> {
    let line = get(buf, pool_offset, block_size, lines, id)?;
    let track = trkseg::get(buf, pool_offset, block_size, trksegs, line.first_trkseg as u32)?;

    let mut p1 = point::position(buf, pool_offset, block_size, points, line.point_from as u32)?;
    let mut total = 0.0;

    if track.first_shape > -1 {
        let from = point::position(buf, pool_offset, block_size, points, track.point_from as u32)?;
        for pos in shape::positions(buf, pool_offset, block_size, shapes, from, track.first_shape, track.last_shape)? {
            total += distance(&p1, &pos);
            p1 = pos;
        }
    }

    let p2 = point::position(buf, pool_offset, block_size, points, line.point_to as u32)?;
    total += distance(&p1, &p2);
    Ok(total)
}

/// Result of [`split`]: `created_line` is always the id of the freshly
/// appended tail-half line record (the id the caller must use to wire up
/// street/range/route copies, matching the order of operations in
/// `editor_line_split`); `returned_line` is the id the original carried
/// `PluginLine` should continue as, after the direction swap described below.
#[derive(Debug, Clone, Copy)]
pub struct SplitResult {
    pub new_point: i32,
    pub created_line: i32,
    pub returned_line: i32,
}

/// `editor_line_split`: splits every trkseg on `id`'s road-list at the shape
/// point closest to `split_position`, creating a new line for the tail half.
///
/// Direction disambiguation (`editor_line.c:520-530`): compare the azimuth
/// delta between `previous_point->split_position` and `from->split_position`
/// against the delta to `to->split_position`. If the `from` side is the
/// larger turn, the *original* line id (`id`) is the one the caller should
/// treat as the newly split-off tail, and the new record (`created_line`)
/// is the one that continues as "the same line" going forward — i.e. the
/// two roles swap relative to the no-swap case.
#[allow(clippy::too_many_arguments)]
pub fn split(
    buf: &mut [u8],
    pool_offset: usize,
    block_size: u32,
    lines: &SectionLayout,
    points: &SectionLayout,
    trksegs: &SectionLayout,
    shapes: &SectionLayout,
    id: u32,
    split_position: Position,
    previous_point: Position,
) -> Result<SplitResult> {
    let line = get(buf, pool_offset, block_size, lines, id)?;
    let from = point::position(buf, pool_offset, block_size, points, line.point_from as u32)?;
    let to = point::position(buf, pool_offset, block_size, points, line.point_to as u32)?;

    let new_point = point::add(buf, pool_offset, block_size, points, split_position, 0, -1)?;

    let mut current = line.first_trkseg;
    let mut new_first = -1i32;
    let mut new_curr = -1i32;
    let mut old_first = -1i32;
    let mut old_curr = -1i32;

    while current != -1 {
        let new_prev = new_curr;
        let old_prev = old_curr;

        let track = trkseg::get(buf, pool_offset, block_size, trksegs, current as u32)?;
        let new_trkseg = trkseg::split(buf, pool_offset, block_size, trksegs, points, shapes, current as u32, from, to)?;

        if track.flags & trkseg::FLAG_OPPOSITE_DIR != 0 {
            old_curr = new_trkseg;
            new_curr = current;
        } else {
            old_curr = current;
            new_curr = new_trkseg;
        }

        if new_first == -1 {
            new_first = new_curr;
        } else {
            trkseg::connect_roads(buf, pool_offset, block_size, trksegs, new_prev as u32, new_curr)?;
        }

        if old_first == -1 {
            old_first = old_curr;
        } else {
            trkseg::connect_roads(buf, pool_offset, block_size, trksegs, old_prev as u32, old_curr)?;
        }

        let global_next = trkseg::next_in_global(buf, pool_offset, block_size, trksegs, current as u32)?;
        trkseg::connect_global(buf, pool_offset, block_size, trksegs, current as u32, new_trkseg)?;
        if new_trkseg != -1 {
            trkseg::connect_global(buf, pool_offset, block_size, trksegs, new_trkseg as u32, global_next)?;
        }

        current = trkseg::next_in_road(buf, pool_offset, block_size, trksegs, current as u32)?;
    }

    let new_line_id = add(buf, pool_offset, block_size, lines, new_point as i32, line.point_to, new_first, line.cfcc, line.flags)?;

    let mut updated = get(buf, pool_offset, block_size, lines, id)?;
    updated.point_to = new_point as i32;
    updated.flags |= FLAG_EXPLICIT_SPLIT;
    updated.last_trkseg = old_curr;
    set(buf, pool_offset, block_size, lines, id, updated)?;

    trkseg::set_line(buf, pool_offset, block_size, trksegs, new_first, new_line_id as i32, -1)?;
    set_trksegs(buf, pool_offset, block_size, lines, new_line_id, new_first, new_curr)?;
    trkseg::set_line(buf, pool_offset, block_size, trksegs, old_first, id as i32, -1)?;

    let azimuth_prev = azimuth(&previous_point, &split_position);
    let delta_from = azimuth_delta(azimuth_prev, azimuth(&from, &split_position));
    let delta_to = azimuth_delta(azimuth_prev, azimuth(&to, &split_position));

    let returned_line = if delta_from > delta_to { id as i32 } else { new_line_id as i32 };

    Ok(SplitResult { new_point: new_point as i32, created_line: new_line_id as i32, returned_line })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geometry::Area;
    use crate::header::Header;
    use crate::layout::{Layout, SectionId};

    fn fresh() -> (Vec<u8>, Layout) {
        let config = Config::default();
        let edges = Area { west: 0, south: 0, east: 1_000_000, north: 1_000_000 };
        let layout = Layout::compute(&config, &edges);
        let mut buf = vec![0u8; layout.pool_offset + config.block_size as usize * config.initial_blocks as usize];
        Header::init(&mut buf, 1, edges, config.block_size, config.initial_blocks as u32, "d");
        for id in SectionId::ALL {
            crate::blockpool::init_blocks(&mut buf, &layout.section(id));
        }
        (buf, layout)
    }

    #[test]
    fn add_and_length_with_no_shapes() {
        let (mut buf, layout) = fresh();
        let points = layout.section(SectionId::Points);
        let trksegs = layout.section(SectionId::Trksegs);
        let shapes = layout.section(SectionId::Shapes);
        let lines = layout.section(SectionId::Lines);

        let p0 = point::add(&mut buf, layout.pool_offset, 2048, &points, Position { longitude: 0, latitude: 0 }, 0, -1).unwrap();
        let p1 = point::add(&mut buf, layout.pool_offset, 2048, &points, Position { longitude: 100, latitude: 0 }, 0, -1).unwrap();
        let t = trkseg::add(&mut buf, layout.pool_offset, 2048, &trksegs, -1, -1, p0 as i32, -1, -1, 0, 0, 0).unwrap();
        let line_id = add(&mut buf, layout.pool_offset, 2048, &lines, p0 as i32, p1 as i32, t as i32, 3, 0).unwrap();

        let len = length(&mut buf, layout.pool_offset, 2048, &lines, &points, &trksegs, &shapes, line_id).unwrap();
        assert!((len - 100.0).abs() < 1e-6);
    }

    #[test]
    fn split_returns_tail_half_when_continuing_toward_to_side() {
        let (mut buf, layout) = fresh();
        let points = layout.section(SectionId::Points);
        let trksegs = layout.section(SectionId::Trksegs);
        let shapes = layout.section(SectionId::Shapes);
        let lines = layout.section(SectionId::Lines);

        let p0 = point::add(&mut buf, layout.pool_offset, 2048, &points, Position { longitude: 0, latitude: 0 }, 0, -1).unwrap();
        let p1 = point::add(&mut buf, layout.pool_offset, 2048, &points, Position { longitude: 200, latitude: 0 }, 0, -1).unwrap();
        let t = trkseg::add(&mut buf, layout.pool_offset, 2048, &trksegs, -1, -1, p0 as i32, -1, -1, 0, 0, 0).unwrap();
        let line_id = add(&mut buf, layout.pool_offset, 2048, &lines, p0 as i32, p1 as i32, t as i32, 3, 0).unwrap();

        // Continuing along from -> split -> to keeps heading straight; no swap.
        let result = split(
            &mut buf,
            layout.pool_offset,
            2048,
            &lines,
            &points,
            &trksegs,
            &shapes,
            line_id,
            Position { longitude: 0, latitude: 0 },
            Position { longitude: 100, latitude: 0 },
        )
        .unwrap();
        assert_eq!(result.returned_line, result.created_line);
        assert_ne!(result.returned_line, line_id as i32);
    }

    #[test]
    fn split_swaps_returned_id_when_original_side_is_the_sharper_turn() {
        let (mut buf, layout) = fresh();
        let points = layout.section(SectionId::Points);
        let trksegs = layout.section(SectionId::Trksegs);
        let shapes = layout.section(SectionId::Shapes);
        let lines = layout.section(SectionId::Lines);

        let p0 = point::add(&mut buf, layout.pool_offset, 2048, &points, Position { longitude: 0, latitude: 0 }, 0, -1).unwrap();
        let p1 = point::add(&mut buf, layout.pool_offset, 2048, &points, Position { longitude: 200, latitude: 0 }, 0, -1).unwrap();
        let t = trkseg::add(&mut buf, layout.pool_offset, 2048, &trksegs, -1, -1, p0 as i32, -1, -1, 0, 0, 0).unwrap();
        let line_id = add(&mut buf, layout.pool_offset, 2048, &lines, p0 as i32, p1 as i32, t as i32, 3, 0).unwrap();

        // Arriving from the `to` side and continuing straight through the
        // split toward `from` makes the `from`-side turn the sharp (180°)
        // one, so the original line id must come back as the split-off tail
        // and `created_line` becomes the one that "continues".
        let result = split(
            &mut buf,
            layout.pool_offset,
            2048,
            &lines,
            &points,
            &trksegs,
            &shapes,
            line_id,
            Position { longitude: 150, latitude: 0 },
            Position { longitude: 100, latitude: 0 },
        )
        .unwrap();
        assert_eq!(result.returned_line, line_id as i32);
        assert_ne!(result.created_line, line_id as i32);
    }

    #[test]
    fn modify_properties_updates_cfcc_and_flags() {
        let (mut buf, layout) = fresh();
        let points = layout.section(SectionId::Points);
        let trksegs = layout.section(SectionId::Trksegs);
        let lines = layout.section(SectionId::Lines);
        let p0 = point::add(&mut buf, layout.pool_offset, 2048, &points, Position { longitude: 0, latitude: 0 }, 0, -1).unwrap();
        let t = trkseg::add(&mut buf, layout.pool_offset, 2048, &trksegs, -1, -1, p0 as i32, -1, -1, 0, 0, 0).unwrap();
        let line_id = add(&mut buf, layout.pool_offset, 2048, &lines, p0 as i32, p0 as i32, t as i32, 1, 0).unwrap();

        modify_properties(&mut buf, layout.pool_offset, 2048, &lines, line_id, 5, FLAG_DIRTY).unwrap();
        let line = get(&mut buf, layout.pool_offset, 2048, &lines, line_id).unwrap();
        assert_eq!(line.cfcc, 5);
        assert_eq!(line.flags, FLAG_DIRTY);
    }
}
