//! The shared `data_blocks` pool and the allocate-block-k procedure (§4.2).
//!
//! Every record-oriented section draws its storage from one pool of
//! `block_size`-byte blocks. A section's own `blocks[]` array records which
//! pool block backs each of its block-sized chunks; `-1` means unallocated.

use crate::error::{EmdbError, Result};
use crate::header::Header;
use crate::layout::SectionLayout;

/// Byte offset, within the pool, of pool block `index`.
pub fn block_offset(layout_pool_offset: usize, block_size: u32, index: u32) -> usize {
    layout_pool_offset + index as usize * block_size as usize
}

/// Allocates pool block `block_id` for the section described by `section`,
/// if not already allocated. Mirrors `editor_db_allocate_new_block`:
///
/// 1. Already allocated → return it.
/// 2. Section is hard-capped (`block_id >= max_blocks`) → [`EmdbError::SectionFull`].
/// 3. Pool exhausted (`num_used_blocks == num_total_blocks`) → [`EmdbError::Full`].
/// 4. Otherwise claim the next pool block and record it.
pub fn allocate_block(buf: &mut [u8], section: &SectionLayout, block_id: u32) -> Result<u32> {
    use crate::byteio::{read_i32_at, write_i32_at};

    if block_id >= section.max_blocks {
        return Err(EmdbError::SectionFull);
    }

    let slot_offset = section.blocks_offset + block_id as usize * 4;
    let existing = read_i32_at(buf, slot_offset);
    if existing != -1 {
        return Ok(existing as u32);
    }

    if Header::num_used_blocks(buf) == Header::num_total_blocks(buf) {
        return Err(EmdbError::Full);
    }

    let new_block = Header::bump_num_used_blocks(buf);
    write_i32_at(buf, slot_offset, new_block as i32);
    Ok(new_block)
}

/// Initializes a section's `blocks[]` array to all-`-1` (unallocated).
pub fn init_blocks(buf: &mut [u8], section: &SectionLayout) {
    use crate::byteio::write_i32_at;
    for i in 0..section.max_blocks {
        write_i32_at(buf, section.blocks_offset + i as usize * 4, -1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geometry::Area;
    use crate::layout::{Layout, SectionId};

    fn fresh(config: &Config, edges: &Area) -> (Vec<u8>, Layout) {
        let layout = Layout::compute(config, edges);
        let mut buf = vec![0u8; layout.pool_offset + config.block_size as usize * config.initial_blocks as usize];
        Header::init(&mut buf, 1, *edges, config.block_size, config.initial_blocks as u32, "d");
        for id in SectionId::ALL {
            init_blocks(&mut buf, &layout.section(id));
        }
        (buf, layout)
    }

    #[test]
    fn allocates_sequentially_and_is_idempotent() {
        let config = Config::default();
        let edges = Area { west: 0, south: 0, east: 1, north: 1 };
        let (mut buf, layout) = fresh(&config, &edges);
        let section = layout.section(SectionId::Points);

        let b0 = allocate_block(&mut buf, &section, 0).unwrap();
        let b0_again = allocate_block(&mut buf, &section, 0).unwrap();
        assert_eq!(b0, b0_again);

        let b1 = allocate_block(&mut buf, &section, 1).unwrap();
        assert_ne!(b0, b1);
        assert_eq!(Header::num_used_blocks(&buf), 2);
    }

    #[test]
    fn section_full_when_block_id_exceeds_cap() {
        let config = Config::default();
        let edges = Area { west: 0, south: 0, east: 1, north: 1 };
        let (mut buf, layout) = fresh(&config, &edges);
        let section = layout.section(SectionId::Points);
        let bogus = section.max_blocks;
        assert!(matches!(allocate_block(&mut buf, &section, bogus), Err(EmdbError::SectionFull)));
    }

    #[test]
    fn pool_full_when_exhausted() {
        let mut config = Config::default();
        config.initial_blocks = 1;
        config.max_points = 10_000; // plenty of section headroom, pool is the limit
        let edges = Area { west: 0, south: 0, east: 1, north: 1 };
        let (mut buf, layout) = fresh(&config, &edges);
        Header::set_num_total_blocks(&mut buf, 1);
        let points = layout.section(SectionId::Points);
        let lines = layout.section(SectionId::Lines);

        allocate_block(&mut buf, &points, 0).unwrap();
        assert!(matches!(allocate_block(&mut buf, &lines, 0), Err(EmdbError::Full)));
    }
}
