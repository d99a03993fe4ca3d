//! Point section (§4.6): editor-owned vertices, plus the del-point index
//! that bridges stable base-map point ids to editor point ids.
//!
//! Grounded in `editor_point.c`. A point is either purely local (created by
//! the user) or a *shared* mirror of a base-map point (`FLAG_SHARED`),
//! recorded so that lines referencing a base-map point can be spliced
//! without duplicating position data that the base map already owns.

use crate::byteio::*;
use crate::error::{EmdbError, Result};
use crate::geometry::Position;
use crate::layout::SectionLayout;
use crate::section;

pub const FLAG_SHARED: i32 = 0x1;

const OFF_LONGITUDE: usize = 0;
const OFF_LATITUDE: usize = 4;
const OFF_FLAGS: usize = 8;
const OFF_BASE_ID: usize = 12;

const OFF_DEL_BASE_ID: usize = 0;
const OFF_DEL_EDITOR_ID: usize = 4;

fn encode(position: Position, flags: i32, base_id: i32) -> [u8; 16] {
    let mut b = [0u8; 16];
    write_i32_at(&mut b, OFF_LONGITUDE, position.longitude);
    write_i32_at(&mut b, OFF_LATITUDE, position.latitude);
    write_i32_at(&mut b, OFF_FLAGS, flags);
    write_i32_at(&mut b, OFF_BASE_ID, base_id);
    b
}

/// `editor_point_add`: appends a new editor point, returning its id.
/// The caller is responsible for retrying once after a `Full` error and a
/// `grow()`.
pub fn add(buf: &mut [u8], pool_offset: usize, block_size: u32, points: &SectionLayout, position: Position, flags: i32, base_id: i32) -> Result<u32> {
    section::append(buf, pool_offset, block_size, points, &encode(position, flags, base_id))
}

/// `editor_point_position`.
pub fn position(buf: &mut [u8], pool_offset: usize, block_size: u32, points: &SectionLayout, id: u32) -> Result<Position> {
    let addr = section::get(buf, pool_offset, block_size, points, id, false, None)?;
    Ok(Position { longitude: read_i32_at(buf, addr + OFF_LONGITUDE), latitude: read_i32_at(buf, addr + OFF_LATITUDE) })
}

pub fn flags(buf: &mut [u8], pool_offset: usize, block_size: u32, points: &SectionLayout, id: u32) -> Result<i32> {
    let addr = section::get(buf, pool_offset, block_size, points, id, false, None)?;
    Ok(read_i32_at(buf, addr + OFF_FLAGS))
}

pub fn base_id(buf: &mut [u8], pool_offset: usize, block_size: u32, points: &SectionLayout, id: u32) -> Result<i32> {
    let addr = section::get(buf, pool_offset, block_size, points, id, false, None)?;
    Ok(read_i32_at(buf, addr + OFF_BASE_ID))
}

/// `editor_point_set_pos`: moves a point, unless it mirrors a base-map
/// point, in which case the move is refused and the base-map position is
/// returned instead.
pub fn set_position(buf: &mut [u8], pool_offset: usize, block_size: u32, points: &SectionLayout, id: u32, position: Position) -> Result<Option<Position>> {
    let addr = section::get(buf, pool_offset, block_size, points, id, false, None)?;
    let flags = read_i32_at(buf, addr + OFF_FLAGS);
    if flags & FLAG_SHARED != 0 {
        return Ok(Some(Position { longitude: read_i32_at(buf, addr + OFF_LONGITUDE), latitude: read_i32_at(buf, addr + OFF_LATITUDE) }));
    }
    write_i32_at(buf, addr + OFF_LONGITUDE, position.longitude);
    write_i32_at(buf, addr + OFF_LATITUDE, position.latitude);
    Ok(None)
}

fn del_point_at(buf: &mut [u8], pool_offset: usize, block_size: u32, del_points: &SectionLayout, id: u32) -> Result<(i32, i32)> {
    let addr = section::get(buf, pool_offset, block_size, del_points, id, false, None)?;
    Ok((read_i32_at(buf, addr + OFF_DEL_BASE_ID), read_i32_at(buf, addr + OFF_DEL_EDITOR_ID)))
}

/// Binary search over the del-point index (sorted by base id). Returns the
/// matching editor id, or the insertion position for a miss.
pub fn lookup_del_point(buf: &mut [u8], pool_offset: usize, block_size: u32, del_points: &SectionLayout, base_id: i32) -> Result<std::result::Result<i32, u32>> {
    let count = section::num_items(buf, del_points);
    if count == 0 {
        return Ok(Err(0));
    }

    let mut begin: i64 = -1;
    let mut end: i64 = count as i64;
    let mut last_seen: Option<(i32, i32)> = None;

    while end - begin > 1 {
        let middle = (begin + end) / 2;
        let entry = del_point_at(buf, pool_offset, block_size, del_points, middle as u32)?;
        last_seen = Some(entry);
        if base_id < entry.0 {
            end = middle;
        } else if base_id > entry.0 {
            begin = middle;
        } else {
            end = middle;
            break;
        }
    }

    match last_seen {
        Some((found_base, editor_id)) if found_base == base_id => Ok(Ok(editor_id)),
        _ => Ok(Err(end as u32)),
    }
}

/// Inserts a new del-point entry at `at` (the index returned by a missed
/// [`lookup_del_point`]), keeping the section sorted by base id.
pub fn insert_del_point(buf: &mut [u8], pool_offset: usize, block_size: u32, del_points: &SectionLayout, at: u32, base_id: i32, editor_id: i32) -> Result<()> {
    let mut entry = [0u8; 8];
    write_i32_at(&mut entry, OFF_DEL_BASE_ID, base_id);
    write_i32_at(&mut entry, OFF_DEL_EDITOR_ID, editor_id);
    section::insert(buf, pool_offset, block_size, del_points, &entry, at)?;
    Ok(())
}

/// Looks a del-point entry up by base id without mutating anything; `Ok(None)`
/// means no bridge has been created for that base-map point yet.
pub fn editor_id_for_base(buf: &mut [u8], pool_offset: usize, block_size: u32, del_points: &SectionLayout, base_id: i32) -> Result<Option<i32>> {
    match lookup_del_point(buf, pool_offset, block_size, del_points, base_id)? {
        Ok(editor_id) => Ok(Some(editor_id)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{item_size, SectionLayout};

    fn points_layout() -> SectionLayout {
        SectionLayout { num_items_offset: 0, blocks_offset: 8, item_size: item_size::POINT, items_per_block: 4, max_items: 16, max_blocks: 4 }
    }

    fn del_points_layout() -> SectionLayout {
        SectionLayout { num_items_offset: 64, blocks_offset: 72, item_size: item_size::DEL_POINT, items_per_block: 4, max_items: 16, max_blocks: 4 }
    }

    fn fresh_buf() -> Vec<u8> {
        let mut buf = vec![0u8; 4096];
        crate::blockpool::init_blocks(&mut buf, &points_layout());
        crate::blockpool::init_blocks(&mut buf, &del_points_layout());
        buf
    }

    #[test]
    fn add_and_read_back() {
        let mut buf = fresh_buf();
        let layout = points_layout();
        let id = add(&mut buf, 4096, 512, &layout, Position { longitude: 10, latitude: 20 }, 0, -1).unwrap();
        assert_eq!(position(&mut buf, 4096, 512, &layout, id).unwrap(), Position { longitude: 10, latitude: 20 });
    }

    #[test]
    fn shared_point_rejects_move() {
        let mut buf = fresh_buf();
        let layout = points_layout();
        let id = add(&mut buf, 4096, 512, &layout, Position { longitude: 10, latitude: 20 }, FLAG_SHARED, 7).unwrap();
        let rejected = set_position(&mut buf, 4096, 512, &layout, id, Position { longitude: 99, latitude: 99 }).unwrap();
        assert_eq!(rejected, Some(Position { longitude: 10, latitude: 20 }));
        assert_eq!(position(&mut buf, 4096, 512, &layout, id).unwrap(), Position { longitude: 10, latitude: 20 });
    }

    #[test]
    fn del_point_binary_search() {
        let mut buf = fresh_buf();
        let layout = del_points_layout();
        for (base, editor) in [(10, 100), (30, 300), (20, 200)] {
            let at = match lookup_del_point(&mut buf, 4096, 512, &layout, base).unwrap() {
                Ok(_) => panic!("unexpected hit"),
                Err(at) => at,
            };
            insert_del_point(&mut buf, 4096, 512, &layout, at, base, editor).unwrap();
        }
        assert_eq!(editor_id_for_base(&mut buf, 4096, 512, &layout, 20).unwrap(), Some(200));
        assert_eq!(editor_id_for_base(&mut buf, 4096, 512, &layout, 99).unwrap(), None);
    }
}
