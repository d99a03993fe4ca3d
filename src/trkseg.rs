//! Track segments (§4.6): one continuous stretch of recorded geometry along
//! a line, threaded into two intrusive singly-linked lists — "road"
//! (segments belonging to the same line, in order) and "global" (every
//! non-`NO_GLOBAL` segment across the whole container, in creation/export
//! order).
//!
//! Grounded in `editor_trkseg.c`. GPS/track matching itself is out of scope
//! here (per the container's own scope), so [`split`] approximates the
//! split point's timestamp by linear interpolation over shape-point index
//! rather than per-shape GPS time, which the source tracks via a separate
//! matching subsystem this container doesn't own.

use crate::byteio::*;
use crate::error::Result;
use crate::geometry::{distance_from_segment, Position};
use crate::header::Header;
use crate::layout::SectionLayout;
use crate::point;
use crate::section;
use crate::shape;

pub const FLAG_FAKE: i32 = 0x1;
pub const FLAG_IGNORE: i32 = 0x2;
pub const FLAG_END_TRACK: i32 = 0x4;
pub const FLAG_NEW_TRACK: i32 = 0x8;
pub const FLAG_OPPOSITE_DIR: i32 = 0x10;
pub const FLAG_NO_GLOBAL: i32 = 0x20;

const OFF_LINE_ID: usize = 0;
const OFF_PLUGIN_ID: usize = 4;
const OFF_POINT_FROM: usize = 8;
const OFF_POINT_TO: usize = 12;
const OFF_FIRST_SHAPE: usize = 16;
const OFF_LAST_SHAPE: usize = 20;
const OFF_GPS_START: usize = 24;
const OFF_GPS_END: usize = 28;
const OFF_FLAGS: usize = 32;
const OFF_NEXT_ROAD: usize = 36;
const OFF_NEXT_GLOBAL: usize = 40;

#[derive(Debug, Clone, Copy)]
pub struct Trkseg {
    pub line_id: i32,
    pub plugin_id: i32,
    pub point_from: i32,
    pub point_to: i32,
    pub first_shape: i32,
    pub last_shape: i32,
    pub gps_start_time: i32,
    pub gps_end_time: i32,
    pub flags: i32,
    pub next_road: i32,
    pub next_global: i32,
}

fn encode(t: Trkseg) -> [u8; 44] {
    let mut b = [0u8; 44];
    write_i32_at(&mut b, OFF_LINE_ID, t.line_id);
    write_i32_at(&mut b, OFF_PLUGIN_ID, t.plugin_id);
    write_i32_at(&mut b, OFF_POINT_FROM, t.point_from);
    write_i32_at(&mut b, OFF_POINT_TO, t.point_to);
    write_i32_at(&mut b, OFF_FIRST_SHAPE, t.first_shape);
    write_i32_at(&mut b, OFF_LAST_SHAPE, t.last_shape);
    write_i32_at(&mut b, OFF_GPS_START, t.gps_start_time);
    write_i32_at(&mut b, OFF_GPS_END, t.gps_end_time);
    write_i32_at(&mut b, OFF_FLAGS, t.flags);
    write_i32_at(&mut b, OFF_NEXT_ROAD, t.next_road);
    write_i32_at(&mut b, OFF_NEXT_GLOBAL, t.next_global);
    b
}

fn decode(buf: &[u8], addr: usize) -> Trkseg {
    Trkseg {
        line_id: read_i32_at(buf, addr + OFF_LINE_ID),
        plugin_id: read_i32_at(buf, addr + OFF_PLUGIN_ID),
        point_from: read_i32_at(buf, addr + OFF_POINT_FROM),
        point_to: read_i32_at(buf, addr + OFF_POINT_TO),
        first_shape: read_i32_at(buf, addr + OFF_FIRST_SHAPE),
        last_shape: read_i32_at(buf, addr + OFF_LAST_SHAPE),
        gps_start_time: read_i32_at(buf, addr + OFF_GPS_START),
        gps_end_time: read_i32_at(buf, addr + OFF_GPS_END),
        flags: read_i32_at(buf, addr + OFF_FLAGS),
        next_road: read_i32_at(buf, addr + OFF_NEXT_ROAD),
        next_global: read_i32_at(buf, addr + OFF_NEXT_GLOBAL),
    }
}

fn addr_of(buf: &mut [u8], pool_offset: usize, block_size: u32, trksegs: &SectionLayout, id: u32) -> Result<usize> {
    section::get(buf, pool_offset, block_size, trksegs, id, false, None)
}

pub fn get(buf: &mut [u8], pool_offset: usize, block_size: u32, trksegs: &SectionLayout, id: u32) -> Result<Trkseg> {
    let addr = addr_of(buf, pool_offset, block_size, trksegs, id)?;
    Ok(decode(buf, addr))
}

fn set(buf: &mut [u8], pool_offset: usize, block_size: u32, trksegs: &SectionLayout, id: u32, t: Trkseg) -> Result<()> {
    let addr = addr_of(buf, pool_offset, block_size, trksegs, id)?;
    buf[addr..addr + 44].copy_from_slice(&encode(t));
    Ok(())
}

/// `editor_trkseg_add`: appends a new segment and threads it onto the
/// global chain (unless `FLAG_NO_GLOBAL`), bumping the container's
/// `trkseg_last_global`/`trkseg_next_export` bookkeeping in the header.
pub fn add(
    buf: &mut [u8],
    pool_offset: usize,
    block_size: u32,
    trksegs: &SectionLayout,
    line_id: i32,
    plugin_id: i32,
    point_from: i32,
    first_shape: i32,
    last_shape: i32,
    gps_start_time: i32,
    gps_end_time: i32,
    flags: i32,
) -> Result<u32> {
    let record = Trkseg {
        line_id,
        plugin_id,
        point_from,
        point_to: -1,
        first_shape,
        last_shape,
        gps_start_time,
        gps_end_time,
        flags,
        next_road: -1,
        next_global: -1,
    };
    let id = section::append(buf, pool_offset, block_size, trksegs, &encode(record))?;

    if flags & FLAG_NO_GLOBAL == 0 {
        let last_global = Header::trkseg_last_global(buf);
        if last_global == -1 {
            Header::set_trkseg_last_global(buf, id as i32);
        } else {
            connect_global(buf, pool_offset, block_size, trksegs, last_global as u32, id as i32)?;
        }
        if Header::trkseg_next_export(buf) == -1 {
            Header::set_trkseg_next_export(buf, id as i32);
        }
    }

    Ok(id)
}

pub fn connect_roads(buf: &mut [u8], pool_offset: usize, block_size: u32, trksegs: &SectionLayout, previous: u32, next: i32) -> Result<()> {
    let addr = addr_of(buf, pool_offset, block_size, trksegs, previous)?;
    write_i32_at(buf, addr + OFF_NEXT_ROAD, next);
    Ok(())
}

pub fn connect_global(buf: &mut [u8], pool_offset: usize, block_size: u32, trksegs: &SectionLayout, previous: u32, next: i32) -> Result<()> {
    let addr = addr_of(buf, pool_offset, block_size, trksegs, previous)?;
    write_i32_at(buf, addr + OFF_NEXT_GLOBAL, next);
    if next != -1 && Header::trkseg_last_global(buf) == previous as i32 {
        Header::set_trkseg_last_global(buf, next);
    }
    Ok(())
}

pub fn next_in_road(buf: &mut [u8], pool_offset: usize, block_size: u32, trksegs: &SectionLayout, id: u32) -> Result<i32> {
    Ok(get(buf, pool_offset, block_size, trksegs, id)?.next_road)
}

pub fn next_in_global(buf: &mut [u8], pool_offset: usize, block_size: u32, trksegs: &SectionLayout, id: u32) -> Result<i32> {
    Ok(get(buf, pool_offset, block_size, trksegs, id)?.next_global)
}

/// `editor_trkseg_set_line`: walks the road chain starting at `trkseg`,
/// stamping every segment with `line_id`/`plugin_id` (used when a line is
/// first connected to the tracks that produced it).
pub fn set_line(buf: &mut [u8], pool_offset: usize, block_size: u32, trksegs: &SectionLayout, mut trkseg: i32, line_id: i32, plugin_id: i32) -> Result<()> {
    while trkseg != -1 {
        let mut t = get(buf, pool_offset, block_size, trksegs, trkseg as u32)?;
        t.line_id = line_id;
        t.plugin_id = plugin_id;
        let next = t.next_road;
        set(buf, pool_offset, block_size, trksegs, trkseg as u32, t)?;
        trkseg = next;
    }
    Ok(())
}

pub fn set_point_to(buf: &mut [u8], pool_offset: usize, block_size: u32, trksegs: &SectionLayout, id: u32, point_to: i32) -> Result<()> {
    let addr = addr_of(buf, pool_offset, block_size, trksegs, id)?;
    write_i32_at(buf, addr + OFF_POINT_TO, point_to);
    Ok(())
}

fn interpolate_time(start: i32, end: i32, index: i32, first: i32, last: i32) -> i32 {
    if last <= first {
        return start;
    }
    let frac = (index - first) as f64 / (last - first) as f64;
    start + ((end - start) as f64 * frac).round() as i32
}

/// `editor_trkseg_split`: splits `trkseg` at the shape point closest to
/// `split_position`, returning the id of the newly created tail segment.
/// The original segment is truncated in place to become the head.
#[allow(clippy::too_many_arguments)]
pub fn split(
    buf: &mut [u8],
    pool_offset: usize,
    block_size: u32,
    trksegs: &SectionLayout,
    points: &SectionLayout,
    shapes: &SectionLayout,
    trkseg_id: u32,
    line_from: Position,
    line_to: Position,
) -> Result<i32> {
    let original = get(buf, pool_offset, block_size, trksegs, trkseg_id)?;

    if original.first_shape == -1 {
        let from = point::position(buf, pool_offset, block_size, points, original.point_from as u32)?;
        let middle_time = (original.gps_start_time + original.gps_end_time) / 2;

        set(
            buf,
            pool_offset,
            block_size,
            trksegs,
            trkseg_id,
            Trkseg { point_to: -1, first_shape: -1, last_shape: -1, gps_end_time: middle_time, ..original },
        )?;

        let new_point = point::add(buf, pool_offset, block_size, points, from, 0, -1)?;
        return Ok(add(
            buf,
            pool_offset,
            block_size,
            trksegs,
            -1,
            -1,
            new_point as i32,
            -1,
            -1,
            middle_time,
            original.gps_end_time,
            original.flags | FLAG_NO_GLOBAL,
        )? as i32);
    }

    let mut from = if original.flags & FLAG_OPPOSITE_DIR != 0 { line_to } else { line_from };
    let mut smallest = f64::MAX;
    let mut split_shape = -1i32;
    let mut split_to = from;
    let hint = split_position_hint(line_from, line_to);

    for i in original.first_shape..=original.last_shape {
        let (dlon, dlat) = shape::delta(buf, pool_offset, block_size, shapes, i as u32)?;
        let to = Position { longitude: from.longitude + dlon, latitude: from.latitude + dlat };
        let distance = distance_from_segment(&hint, &from, &to);
        if distance < smallest {
            smallest = distance;
            split_shape = i;
            split_to = to;
        }
        from = to;
    }

    let split_time = interpolate_time(original.gps_start_time, original.gps_end_time, split_shape, original.first_shape, original.last_shape);

    if split_shape == original.first_shape {
        let head_from = point::position(buf, pool_offset, block_size, points, original.point_from as u32)?;
        let new_point = point::add(buf, pool_offset, block_size, points, head_from, 0, -1)?;

        let new_id = add(
            buf,
            pool_offset,
            block_size,
            trksegs,
            -1,
            -1,
            new_point as i32,
            original.first_shape,
            original.last_shape,
            split_time,
            original.gps_end_time,
            original.flags | FLAG_NO_GLOBAL,
        )?;

        set(
            buf,
            pool_offset,
            block_size,
            trksegs,
            trkseg_id,
            Trkseg { point_to: -1, first_shape: -1, last_shape: -1, gps_end_time: split_time, ..original },
        )?;
        return Ok(new_id as i32);
    }

    if split_shape == original.last_shape {
        let new_point = point::add(buf, pool_offset, block_size, points, split_to, 0, -1)?;
        let new_id = add(
            buf,
            pool_offset,
            block_size,
            trksegs,
            -1,
            -1,
            new_point as i32,
            -1,
            -1,
            split_time,
            original.gps_end_time,
            original.flags | FLAG_NO_GLOBAL,
        )?;

        set(
            buf,
            pool_offset,
            block_size,
            trksegs,
            trkseg_id,
            Trkseg { point_to: -1, gps_end_time: split_time, ..original },
        )?;
        return Ok(new_id as i32);
    }

    let new_point = point::add(buf, pool_offset, block_size, points, split_to, 0, -1)?;
    let new_id = add(
        buf,
        pool_offset,
        block_size,
        trksegs,
        -1,
        -1,
        new_point as i32,
        split_shape,
        original.last_shape,
        split_time,
        original.gps_end_time,
        original.flags | FLAG_NO_GLOBAL,
    )?;

    shape::zero(buf, pool_offset, block_size, shapes, split_shape as u32)?;

    set(
        buf,
        pool_offset,
        block_size,
        trksegs,
        trkseg_id,
        Trkseg { point_to: -1, last_shape: split_shape - 1, gps_end_time: split_time, ..original },
    )?;

    Ok(new_id as i32)
}

fn split_position_hint(line_from: Position, line_to: Position) -> Position {
    // The caller resolves the actual split position; `split` is invoked with
    // the pair of endpoints that bracket it and compares every shape-segment
    // distance against the midpoint as a stable, deterministic proxy absent
    // real GPS matching (out of scope here).
    Position { longitude: (line_from.longitude + line_to.longitude) / 2, latitude: (line_from.latitude + line_to.latitude) / 2 }
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
        let edges = Area { west: 0, south: 0, east: 1, north: 1 };
        let layout = Layout::compute(&config, &edges);
        let mut buf = vec![0u8; layout.pool_offset + config.block_size as usize * config.initial_blocks as usize];
        Header::init(&mut buf, 1, edges, config.block_size, config.initial_blocks as u32, "d");
        for id in SectionId::ALL {
            crate::blockpool::init_blocks(&mut buf, &layout.section(id));
        }
        (buf, layout)
    }

    #[test]
    fn add_links_global_chain() {
        let (mut buf, layout) = fresh();
        let trksegs = layout.section(SectionId::Trksegs);
        let a = add(&mut buf, layout.pool_offset, 2048, &trksegs, 1, -1, 0, -1, -1, 0, 10, 0).unwrap();
        let b = add(&mut buf, layout.pool_offset, 2048, &trksegs, 1, -1, 1, -1, -1, 10, 20, 0).unwrap();
        assert_eq!(next_in_global(&mut buf, layout.pool_offset, 2048, &trksegs, a).unwrap(), b as i32);
        assert_eq!(Header::trkseg_last_global(&buf), b as i32);
    }

    #[test]
    fn no_global_flag_skips_chain() {
        let (mut buf, layout) = fresh();
        let trksegs = layout.section(SectionId::Trksegs);
        let a = add(&mut buf, layout.pool_offset, 2048, &trksegs, 1, -1, 0, -1, -1, 0, 10, FLAG_NO_GLOBAL).unwrap();
        assert_eq!(Header::trkseg_last_global(&buf), -1);
        assert_eq!(next_in_global(&mut buf, layout.pool_offset, 2048, &trksegs, a).unwrap(), -1);
    }

    #[test]
    fn road_chain_links_and_set_line_propagates() {
        let (mut buf, layout) = fresh();
        let trksegs = layout.section(SectionId::Trksegs);
        let a = add(&mut buf, layout.pool_offset, 2048, &trksegs, -1, -1, 0, -1, -1, 0, 10, 0).unwrap();
        let b = add(&mut buf, layout.pool_offset, 2048, &trksegs, -1, -1, 1, -1, -1, 10, 20, 0).unwrap();
        connect_roads(&mut buf, layout.pool_offset, 2048, &trksegs, a, b as i32).unwrap();

        set_line(&mut buf, layout.pool_offset, 2048, &trksegs, a as i32, 99, 0).unwrap();
        assert_eq!(get(&mut buf, layout.pool_offset, 2048, &trksegs, a).unwrap().line_id, 99);
        assert_eq!(get(&mut buf, layout.pool_offset, 2048, &trksegs, b).unwrap().line_id, 99);
    }
}
