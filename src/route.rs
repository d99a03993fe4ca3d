//! Route overlay segments (§4.6): per-direction travel flags and speed
//! limits attached to a line, independent of the street/range overlay.
//!
//! Grounded in `editor_route.c`. A route segment is shared between the two
//! directions of a line's single underlying road, so it stores one pair of
//! flags/speed-limits per direction rather than per line.

use crate::byteio::*;
use crate::error::Result;
use crate::layout::SectionLayout;
use crate::section;

pub const CAR: u16 = 0x0001;
pub const STOP_LIGHT: u16 = 0x8000;

/// `editor_route_get_direction`'s return bits: bit 0 set if `from` allows the
/// queried direction mask, bit 1 if `to` does.
pub const DIRECTION_FROM: u8 = 0x1;
pub const DIRECTION_TO: u8 = 0x2;

const OFF_FROM_FLAGS: usize = 0;
const OFF_TO_FLAGS: usize = 2;
const OFF_FROM_SPEED: usize = 4;
const OFF_TO_SPEED: usize = 6;

#[derive(Debug, Clone, Copy, Default)]
pub struct RouteSegment {
    pub from_flags: u16,
    pub to_flags: u16,
    pub from_speed_limit: u16,
    pub to_speed_limit: u16,
}

fn encode(r: RouteSegment) -> [u8; 8] {
    let mut b = [0u8; 8];
    write_u16_at(&mut b, OFF_FROM_FLAGS, r.from_flags);
    write_u16_at(&mut b, OFF_TO_FLAGS, r.to_flags);
    write_u16_at(&mut b, OFF_FROM_SPEED, r.from_speed_limit);
    write_u16_at(&mut b, OFF_TO_SPEED, r.to_speed_limit);
    b
}

fn decode(buf: &[u8], addr: usize) -> RouteSegment {
    RouteSegment {
        from_flags: read_u16_at(buf, addr + OFF_FROM_FLAGS),
        to_flags: read_u16_at(buf, addr + OFF_TO_FLAGS),
        from_speed_limit: read_u16_at(buf, addr + OFF_FROM_SPEED),
        to_speed_limit: read_u16_at(buf, addr + OFF_TO_SPEED),
    }
}

/// `editor_route_segment_add`.
pub fn add(buf: &mut [u8], pool_offset: usize, block_size: u32, routes: &SectionLayout, segment: RouteSegment) -> Result<u32> {
    section::append(buf, pool_offset, block_size, routes, &encode(segment))
}

/// `editor_route_segment_get`: `(0, 0, 0, 0)` for `route_id == -1`, mirroring
/// the source's "no route info" convention.
pub fn get(buf: &mut [u8], pool_offset: usize, block_size: u32, routes: &SectionLayout, route_id: i32) -> Result<RouteSegment> {
    if route_id == -1 {
        return Ok(RouteSegment::default());
    }
    let addr = section::get(buf, pool_offset, block_size, routes, route_id as u32, false, None)?;
    Ok(decode(buf, addr))
}

/// `editor_route_segment_set`.
pub fn set(buf: &mut [u8], pool_offset: usize, block_size: u32, routes: &SectionLayout, route_id: i32, segment: RouteSegment) -> Result<()> {
    let addr = section::get(buf, pool_offset, block_size, routes, route_id as u32, false, None)?;
    buf[addr..addr + 8].copy_from_slice(&encode(segment));
    Ok(())
}

/// `editor_route_get_direction`: which of the two directions allow travel
/// under flag mask `who`.
pub fn direction(buf: &mut [u8], pool_offset: usize, block_size: u32, routes: &SectionLayout, route_id: i32, who: u16) -> Result<u8> {
    if route_id == -1 {
        return Ok(0);
    }
    let segment = get(buf, pool_offset, block_size, routes, route_id)?;
    let mut dir = 0u8;
    if segment.from_flags & who != 0 {
        dir |= DIRECTION_FROM;
    }
    if segment.to_flags & who != 0 {
        dir |= DIRECTION_TO;
    }
    Ok(dir)
}

/// `editor_route_segment_copy`: duplicates an existing route segment (used
/// when a base-map line carrying route info is copied into the editor).
pub fn copy(buf: &mut [u8], pool_offset: usize, block_size: u32, routes: &SectionLayout, source_route_id: i32) -> Result<i32> {
    if source_route_id == -1 {
        return Ok(-1);
    }
    let segment = get(buf, pool_offset, block_size, routes, source_route_id)?;
    Ok(add(buf, pool_offset, block_size, routes, segment)? as i32)
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
    fn add_get_set_round_trip() {
        let (mut buf, layout) = fresh();
        let routes = layout.section(SectionId::Routes);
        let id = add(&mut buf, layout.pool_offset, 2048, &routes, RouteSegment { from_flags: CAR, to_flags: 0, from_speed_limit: 50, to_speed_limit: 0 }).unwrap();
        let segment = get(&mut buf, layout.pool_offset, 2048, &routes, id as i32).unwrap();
        assert_eq!(segment.from_flags, CAR);
        assert_eq!(segment.from_speed_limit, 50);

        set(&mut buf, layout.pool_offset, 2048, &routes, id as i32, RouteSegment { from_flags: CAR, to_flags: CAR, from_speed_limit: 50, to_speed_limit: 60 }).unwrap();
        let updated = get(&mut buf, layout.pool_offset, 2048, &routes, id as i32).unwrap();
        assert_eq!(updated.to_speed_limit, 60);
    }

    #[test]
    fn missing_route_id_yields_zeroed_segment() {
        let (mut buf, layout) = fresh();
        let routes = layout.section(SectionId::Routes);
        let segment = get(&mut buf, layout.pool_offset, 2048, &routes, -1).unwrap();
        assert_eq!(segment.from_flags, 0);
        assert_eq!(direction(&mut buf, layout.pool_offset, 2048, &routes, -1, CAR).unwrap(), 0);
    }

    #[test]
    fn direction_reports_allowed_ways() {
        let (mut buf, layout) = fresh();
        let routes = layout.section(SectionId::Routes);
        let id = add(&mut buf, layout.pool_offset, 2048, &routes, RouteSegment { from_flags: CAR, to_flags: 0, from_speed_limit: 0, to_speed_limit: 0 }).unwrap();
        assert_eq!(direction(&mut buf, layout.pool_offset, 2048, &routes, id as i32, CAR).unwrap(), DIRECTION_FROM);
    }
}
