//! Shape points (§4.6): intermediate vertices along a trkseg's line,
//! delta-encoded as signed 16-bit offsets from the previous point to keep
//! each record small. A trkseg's geometry is `point_from`, then every shape
//! in `[first_shape, last_shape]` applied cumulatively, then `point_to`.

use crate::byteio::*;
use crate::error::Result;
use crate::geometry::Position;
use crate::layout::SectionLayout;
use crate::section;

const OFF_DLON: usize = 0;
const OFF_DLAT: usize = 2;
const OFF_RESERVED: usize = 4;

fn encode(dlon: i16, dlat: i16) -> [u8; 6] {
    let mut b = [0u8; 6];
    write_i16_at(&mut b, OFF_DLON, dlon);
    write_i16_at(&mut b, OFF_DLAT, dlat);
    write_i16_at(&mut b, OFF_RESERVED, 0);
    b
}

/// Appends one delta-encoded shape point. `dlon`/`dlat` must each fit in an
/// `i16`; callers split long segments into multiple shape points before
/// exceeding that range.
pub fn add(buf: &mut [u8], pool_offset: usize, block_size: u32, shapes: &SectionLayout, dlon: i32, dlat: i32) -> Result<u32> {
    debug_assert!((i16::MIN as i32..=i16::MAX as i32).contains(&dlon));
    debug_assert!((i16::MIN as i32..=i16::MAX as i32).contains(&dlat));
    section::append(buf, pool_offset, block_size, shapes, &encode(dlon as i16, dlat as i16))
}

pub fn delta(buf: &mut [u8], pool_offset: usize, block_size: u32, shapes: &SectionLayout, id: u32) -> Result<(i32, i32)> {
    let addr = section::get(buf, pool_offset, block_size, shapes, id, false, None)?;
    Ok((read_i16_at(buf, addr + OFF_DLON) as i32, read_i16_at(buf, addr + OFF_DLAT) as i32))
}

/// `editor_shape_set_point(id, 0, 0, 0)`: zeroes a shape point's delta so a
/// split trkseg's geometry reconstruction no longer perturbs it.
pub fn zero(buf: &mut [u8], pool_offset: usize, block_size: u32, shapes: &SectionLayout, id: u32) -> Result<()> {
    let addr = section::get(buf, pool_offset, block_size, shapes, id, false, None)?;
    buf[addr..addr + 6].copy_from_slice(&encode(0, 0));
    Ok(())
}

/// Reconstructs the absolute positions of shape points `[first, last]`
/// applied cumulatively starting from `from`. An empty range (`first > last`,
/// as the source encodes "no shape points") yields an empty vector.
pub fn positions(buf: &mut [u8], pool_offset: usize, block_size: u32, shapes: &SectionLayout, from: Position, first: i32, last: i32) -> Result<Vec<Position>> {
    if first > last || first < 0 {
        return Ok(Vec::new());
    }
    let mut out = Vec::with_capacity((last - first + 1) as usize);
    let mut cur = from;
    for id in first..=last {
        let (dlon, dlat) = delta(buf, pool_offset, block_size, shapes, id as u32)?;
        cur = Position { longitude: cur.longitude + dlon, latitude: cur.latitude + dlat };
        out.push(cur);
    }
    Ok(out)
}
