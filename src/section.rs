//! Generic section-store operations (§4.3): `append`/`insert`/`get`/
//! `get_last`/`allocate_range`, shared by every record-oriented section
//! (top-level sections from [`crate::layout`] and each square's own inline
//! line-id mini-section, §4.6).

use crate::blockpool::allocate_block;
use crate::byteio::{read_u32_at, write_u32_at};
use crate::error::{EmdbError, Result};
use crate::layout::SectionLayout;

fn item_block_and_offset(section: &SectionLayout, id: u32) -> (u32, usize) {
    (id / section.items_per_block, (id % section.items_per_block) as usize * section.item_size as usize)
}

fn item_addr(buf: &[u8], pool_offset: usize, block_size: u32, section: &SectionLayout, id: u32) -> usize {
    use crate::byteio::read_i32_at;
    let (block, in_block) = item_block_and_offset(section, id);
    let slot_offset = section.blocks_offset + block as usize * 4;
    let pool_block = read_i32_at(buf, slot_offset);
    debug_assert!(pool_block >= 0, "item {id} addressed through an unallocated block");
    pool_offset + pool_block as usize * block_size as usize + in_block
}

pub fn num_items(buf: &[u8], section: &SectionLayout) -> u32 {
    read_u32_at(buf, section.num_items_offset)
}

fn set_num_items(buf: &mut [u8], section: &SectionLayout, v: u32) {
    write_u32_at(buf, section.num_items_offset, v);
}

/// Appends `data` (exactly `section.item_size` bytes) and returns its id.
pub fn append(buf: &mut [u8], pool_offset: usize, block_size: u32, section: &SectionLayout, data: &[u8]) -> Result<u32> {
    debug_assert_eq!(data.len(), section.item_size as usize);

    let id = num_items(buf, section);
    let (block, in_block) = item_block_and_offset(section, id);

    if in_block == 0 {
        allocate_block(buf, section, block)?;
    }

    let addr = item_addr(buf, pool_offset, block_size, section, id);
    buf[addr..addr + data.len()].copy_from_slice(data);

    set_num_items(buf, section, id + 1);
    Ok(id)
}

/// Appends `data`, then shifts `[pos, num_items-1)` up by one slot so the new
/// item lands at `pos`.
pub fn insert(buf: &mut [u8], pool_offset: usize, block_size: u32, section: &SectionLayout, data: &[u8], pos: u32) -> Result<()> {
    let before = num_items(buf, section);
    assert!(pos <= before, "insert position {pos} out of range (num_items={before})");

    let new_id = append(buf, pool_offset, block_size, section, data)?;
    if pos == new_id {
        return Ok(());
    }

    let mut i = new_id;
    while i > pos {
        let src = item_addr(buf, pool_offset, block_size, section, i - 1);
        let dst = item_addr(buf, pool_offset, block_size, section, i);
        let item_size = section.item_size as usize;
        let mut tmp = vec![0u8; item_size];
        tmp.copy_from_slice(&buf[src..src + item_size]);
        buf[dst..dst + item_size].copy_from_slice(&tmp);
        i -= 1;
    }

    let dst = item_addr(buf, pool_offset, block_size, section, pos);
    buf[dst..dst + data.len()].copy_from_slice(data);
    Ok(())
}

/// Returns the byte offset of item `id`, allocating its backing block when
/// `create` is set. `init` is invoked once per slot of a freshly allocated
/// block (used by the override index to pre-fill `-1`).
pub fn get(
    buf: &mut [u8],
    pool_offset: usize,
    block_size: u32,
    section: &SectionLayout,
    id: u32,
    create: bool,
    init: Option<&dyn Fn(&mut [u8])>,
) -> Result<usize> {
    assert!(id < section.max_items, "item id {id} exceeds max_items {}", section.max_items);

    let (block, _) = item_block_and_offset(section, id);
    let slot_offset = section.blocks_offset + block as usize * 4;
    let allocated = crate::byteio::read_i32_at(buf, slot_offset) != -1;

    if !allocated {
        if !create {
            return Err(EmdbError::NotAllocated(id as i32));
        }
        allocate_block(buf, section, block)?;

        if let Some(init_fn) = init {
            let item_size = section.item_size as usize;
            for slot in 0..section.items_per_block {
                let addr = item_addr(buf, pool_offset, block_size, section, block * section.items_per_block + slot);
                init_fn(&mut buf[addr..addr + item_size]);
            }
        }
    }

    Ok(item_addr(buf, pool_offset, block_size, section, id))
}

/// Convenience for `get(num_items - 1)`; `None` when the section is empty.
pub fn get_last(buf: &mut [u8], pool_offset: usize, block_size: u32, section: &SectionLayout) -> Result<Option<usize>> {
    let n = num_items(buf, section);
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(get(buf, pool_offset, block_size, section, n - 1, false, None)?))
}

/// Reserves `count` contiguous items within a single block, skipping to a
/// fresh block if the current one cannot hold them. Returns the first id.
pub fn allocate_range(buf: &mut [u8], pool_offset: usize, block_size: u32, section: &SectionLayout, count: u32) -> Result<u32> {
    if count > section.items_per_block {
        return Err(EmdbError::SectionFull);
    }

    let mut id = num_items(buf, section);
    let (mut block, mut in_block_items) = (id / section.items_per_block, id % section.items_per_block);

    if in_block_items == 0 {
        allocate_block(buf, section, block)?;
    }

    if in_block_items + count > section.items_per_block {
        block += 1;
        allocate_block(buf, section, block)?;
        id = block * section.items_per_block;
        in_block_items = 0;
    }
    let _ = in_block_items;

    set_num_items(buf, section, id + count);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geometry::Area;
    use crate::header::Header;
    use crate::layout::{Layout, SectionId};

    fn fresh(config: &Config) -> (Vec<u8>, Layout) {
        let edges = Area { west: 0, south: 0, east: 1, north: 1 };
        let layout = Layout::compute(config, &edges);
        let mut buf = vec![0u8; layout.pool_offset + config.block_size as usize * config.initial_blocks as usize];
        Header::init(&mut buf, 1, edges, config.block_size, config.initial_blocks as u32, "d");
        for id in SectionId::ALL {
            crate::blockpool::init_blocks(&mut buf, &layout.section(id));
        }
        (buf, layout)
    }

    #[test]
    fn append_assigns_stable_sequential_ids() {
        let config = Config::default();
        let (mut buf, layout) = fresh(&config);
        let section = layout.section(SectionId::Points);
        let item = [1u8; 16];

        let id0 = append(&mut buf, layout.pool_offset, config.block_size, &section, &item).unwrap();
        let id1 = append(&mut buf, layout.pool_offset, config.block_size, &section, &item).unwrap();
        assert_eq!((id0, id1), (0, 1));
        assert_eq!(num_items(&buf, &section), 2);
    }

    #[test]
    fn get_returns_same_bytes_until_mutated() {
        let config = Config::default();
        let (mut buf, layout) = fresh(&config);
        let section = layout.section(SectionId::Points);
        let item = [7u8; 16];
        let id = append(&mut buf, layout.pool_offset, config.block_size, &section, &item).unwrap();

        let addr = get(&mut buf, layout.pool_offset, config.block_size, &section, id, false, None).unwrap();
        assert_eq!(&buf[addr..addr + 16], &item[..]);
    }

    #[test]
    fn get_without_create_reports_not_allocated() {
        let config = Config::default();
        let (mut buf, layout) = fresh(&config);
        let section = layout.section(SectionId::OverrideIndex);
        let result = get(&mut buf, layout.pool_offset, config.block_size, &section, 3, false, None);
        assert!(matches!(result, Err(EmdbError::NotAllocated(3))));
    }

    #[test]
    fn get_with_create_runs_init_on_every_slot_of_the_block() {
        let config = Config::default();
        let (mut buf, layout) = fresh(&config);
        let section = layout.section(SectionId::OverrideIndex);
        let init = |slot: &mut [u8]| slot.copy_from_slice(&(-1i32).to_ne_bytes());

        let addr = get(&mut buf, layout.pool_offset, config.block_size, &section, 3, true, Some(&init)).unwrap();
        assert_eq!(crate::byteio::read_i32_at(&buf, addr), -1);

        let addr0 = get(&mut buf, layout.pool_offset, config.block_size, &section, 0, false, None).unwrap();
        assert_eq!(crate::byteio::read_i32_at(&buf, addr0), -1);
    }

    #[test]
    fn insert_shifts_later_items_up() {
        let config = Config::default();
        let (mut buf, layout) = fresh(&config);
        let section = layout.section(SectionId::PointsDel);

        let rec = |base_id: i32, editor_id: i32| {
            let mut b = [0u8; 8];
            b[0..4].copy_from_slice(&base_id.to_ne_bytes());
            b[4..8].copy_from_slice(&editor_id.to_ne_bytes());
            b
        };

        append(&mut buf, layout.pool_offset, config.block_size, &section, &rec(1, 10)).unwrap();
        append(&mut buf, layout.pool_offset, config.block_size, &section, &rec(3, 30)).unwrap();
        insert(&mut buf, layout.pool_offset, config.block_size, &section, &rec(2, 20), 1).unwrap();

        let read_at = |buf: &mut [u8], id: u32| -> (i32, i32) {
            let addr = get(buf, layout.pool_offset, config.block_size, &section, id, false, None).unwrap();
            (crate::byteio::read_i32_at(buf, addr), crate::byteio::read_i32_at(buf, addr + 4))
        };

        assert_eq!(read_at(&mut buf, 0), (1, 10));
        assert_eq!(read_at(&mut buf, 1), (2, 20));
        assert_eq!(read_at(&mut buf, 2), (3, 30));
    }

    #[test]
    fn allocate_range_reserves_contiguous_ids() {
        let config = Config::default();
        let (mut buf, layout) = fresh(&config);
        let section = layout.section(SectionId::Ranges);
        let first = allocate_range(&mut buf, layout.pool_offset, config.block_size, &section, 4).unwrap();
        assert_eq!(num_items(&buf, &section), first + 4);
    }
}
