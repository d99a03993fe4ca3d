//! Per-base-map-line overrides (§4.6): editor-side replacements for a
//! base-map line's route and flags, created lazily the first time a
//! base-map line is touched.
//!
//! Grounded in `editor_override.c`. The index section is keyed by base-map
//! line id and holds either `-1` (no override yet) or an index into the data
//! section; `data(..., create: true)` allocates a fresh `NULL_OVERRIDE`
//! record the first time a line is written to, mirroring
//! `editor_override_data`'s lazy-creation path.

use crate::byteio::*;
use crate::error::Result;
use crate::layout::SectionLayout;
use crate::section;

/// Flags in an [`Override`] record's own `flags` field (distinct from
/// [`crate::line::FLAG_DELETED`] etc, which apply to editor-owned lines):
/// these describe the editor's annotation of a *base-map* line.
pub const FLAG_OVERRIDDEN: i32 = 0x1;
pub const FLAG_DELETED: i32 = 0x2;

const OFF_FIRST_TRKSEG: usize = 0;
const OFF_LAST_TRKSEG: usize = 4;
const OFF_ROUTE: usize = 8;
const OFF_FLAGS: usize = 12;

#[derive(Debug, Clone, Copy)]
pub struct Override {
    pub first_trkseg: i32,
    pub last_trkseg: i32,
    pub route: i32,
    pub flags: i32,
}

impl Default for Override {
    fn default() -> Override {
        Override { first_trkseg: -1, last_trkseg: -1, route: -1, flags: 0 }
    }
}

fn encode(o: Override) -> [u8; 16] {
    let mut b = [0u8; 16];
    write_i32_at(&mut b, OFF_FIRST_TRKSEG, o.first_trkseg);
    write_i32_at(&mut b, OFF_LAST_TRKSEG, o.last_trkseg);
    write_i32_at(&mut b, OFF_ROUTE, o.route);
    write_i32_at(&mut b, OFF_FLAGS, o.flags);
    b
}

fn decode(buf: &[u8], addr: usize) -> Override {
    Override {
        first_trkseg: read_i32_at(buf, addr + OFF_FIRST_TRKSEG),
        last_trkseg: read_i32_at(buf, addr + OFF_LAST_TRKSEG),
        route: read_i32_at(buf, addr + OFF_ROUTE),
        flags: read_i32_at(buf, addr + OFF_FLAGS),
    }
}

fn init_index_slot(slot: &mut [u8]) {
    write_i32_at(slot, 0, -1);
}

/// `editor_override_data`: resolves (and, if `create`, lazily allocates) the
/// override record for base-map `line`. Returns `None` when no override
/// exists and `create` is false.
fn data_addr(buf: &mut [u8], pool_offset: usize, block_size: u32, index: &SectionLayout, data: &SectionLayout, line: u32, create: bool) -> Result<Option<usize>> {
    let index_addr = section::get(buf, pool_offset, block_size, index, line, create, Some(&init_index_slot))?;
    let mut data_index = read_i32_at(buf, index_addr);

    if data_index == -1 {
        if !create {
            return Ok(None);
        }
        let new_index = section::append(buf, pool_offset, block_size, data, &encode(Override::default()))?;
        write_i32_at(buf, index_addr, new_index as i32);
        data_index = new_index as i32;
    }

    Ok(Some(section::get(buf, pool_offset, block_size, data, data_index as u32, false, None)?))
}

pub fn get(buf: &mut [u8], pool_offset: usize, block_size: u32, index: &SectionLayout, data: &SectionLayout, line: u32) -> Result<Option<Override>> {
    Ok(data_addr(buf, pool_offset, block_size, index, data, line, false)?.map(|addr| decode(buf, addr)))
}

/// `editor_override_line_get_route`.
pub fn get_route(buf: &mut [u8], pool_offset: usize, block_size: u32, index: &SectionLayout, data: &SectionLayout, line: u32) -> Result<i32> {
    Ok(get(buf, pool_offset, block_size, index, data, line)?.map(|o| o.route).unwrap_or(-1))
}

/// `editor_override_line_set_route`.
pub fn set_route(buf: &mut [u8], pool_offset: usize, block_size: u32, index: &SectionLayout, data: &SectionLayout, line: u32, route: i32) -> Result<()> {
    if let Some(addr) = data_addr(buf, pool_offset, block_size, index, data, line, true)? {
        write_i32_at(buf, addr + OFF_ROUTE, route);
    }
    Ok(())
}

/// `editor_override_line_get_flags`.
pub fn get_flags(buf: &mut [u8], pool_offset: usize, block_size: u32, index: &SectionLayout, data: &SectionLayout, line: u32) -> Result<i32> {
    Ok(get(buf, pool_offset, block_size, index, data, line)?.map(|o| o.flags).unwrap_or(0))
}

/// `editor_override_line_set_flags`.
pub fn set_flags(buf: &mut [u8], pool_offset: usize, block_size: u32, index: &SectionLayout, data: &SectionLayout, line: u32, flags: i32) -> Result<()> {
    if let Some(addr) = data_addr(buf, pool_offset, block_size, index, data, line, true)? {
        write_i32_at(buf, addr + OFF_FLAGS, flags);
    }
    Ok(())
}

/// `editor_override_line_get_trksegs`.
pub fn get_trksegs(buf: &mut [u8], pool_offset: usize, block_size: u32, index: &SectionLayout, data: &SectionLayout, line: u32) -> Result<(i32, i32)> {
    Ok(get(buf, pool_offset, block_size, index, data, line)?.map(|o| (o.first_trkseg, o.last_trkseg)).unwrap_or((-1, -1)))
}

/// `editor_override_line_set_trksegs`.
pub fn set_trksegs(buf: &mut [u8], pool_offset: usize, block_size: u32, index: &SectionLayout, data: &SectionLayout, line: u32, first: i32, last: i32) -> Result<()> {
    if let Some(addr) = data_addr(buf, pool_offset, block_size, index, data, line, true)? {
        write_i32_at(buf, addr + OFF_FIRST_TRKSEG, first);
        write_i32_at(buf, addr + OFF_LAST_TRKSEG, last);
    }
    Ok(())
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
    fn untouched_line_has_no_override() {
        let (mut buf, layout) = fresh();
        let index = layout.section(SectionId::OverrideIndex);
        let data = layout.section(SectionId::OverrideData);
        assert_eq!(get_route(&mut buf, layout.pool_offset, 2048, &index, &data, 5).unwrap(), -1);
        assert_eq!(get_flags(&mut buf, layout.pool_offset, 2048, &index, &data, 5).unwrap(), 0);
    }

    #[test]
    fn set_route_lazily_creates_and_persists() {
        let (mut buf, layout) = fresh();
        let index = layout.section(SectionId::OverrideIndex);
        let data = layout.section(SectionId::OverrideData);

        set_route(&mut buf, layout.pool_offset, 2048, &index, &data, 3, 77).unwrap();
        assert_eq!(get_route(&mut buf, layout.pool_offset, 2048, &index, &data, 3).unwrap(), 77);
        assert_eq!(get_flags(&mut buf, layout.pool_offset, 2048, &index, &data, 3).unwrap(), 0);

        set_flags(&mut buf, layout.pool_offset, 2048, &index, &data, 3, 9).unwrap();
        assert_eq!(get_route(&mut buf, layout.pool_offset, 2048, &index, &data, 3).unwrap(), 77);
        assert_eq!(get_flags(&mut buf, layout.pool_offset, 2048, &index, &data, 3).unwrap(), 9);
    }

    #[test]
    fn distinct_lines_get_distinct_records() {
        let (mut buf, layout) = fresh();
        let index = layout.section(SectionId::OverrideIndex);
        let data = layout.section(SectionId::OverrideData);

        set_trksegs(&mut buf, layout.pool_offset, 2048, &index, &data, 1, 10, 20).unwrap();
        set_trksegs(&mut buf, layout.pool_offset, 2048, &index, &data, 2, 30, 40).unwrap();

        assert_eq!(get_trksegs(&mut buf, layout.pool_offset, 2048, &index, &data, 1).unwrap(), (10, 20));
        assert_eq!(get_trksegs(&mut buf, layout.pool_offset, 2048, &index, &data, 2).unwrap(), (30, 40));
    }
}
