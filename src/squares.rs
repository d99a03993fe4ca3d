//! Spatial square index (§4.6): a uniform grid over the county's `edges`,
//! each cell ("square") owning a small inline section of line ids plus a
//! CFCC bitmap of the road classes crossing it.
//!
//! Grounded in `editor_square.c`. Each square's mini-section reuses the
//! generic section-store primitives ([`crate::section`]) over an
//! [`crate::layout::SectionLayout`] computed on the fly from the square's
//! own record address, rather than persisting `item_size`/`items_per_block`
//! per square the way the source does — those are recomputed deterministically
//! from [`Config`], so there is nothing to keep them in sync with.

use crate::byteio::*;
use crate::config::Config;
use crate::error::Result;
use crate::geometry::{Area, Position};
use crate::layout::{Layout, SectionLayout};
use crate::section;

/// A square more than this many micro-degrees from the query point is not
/// considered "near" it. Mirrors `ED_NEAR_DISTANCE` in the source.
pub const NEAR_DISTANCE: i32 = 1_000;

const OFF_CFCCS: usize = 0;
const OFF_NUM_ITEMS: usize = 4;
const OFF_BLOCKS: usize = 8;
const LINE_ID_SIZE: u32 = 4;

/// Resolves the grid cell containing `pos`, clamped to the grid bounds.
pub fn square_index(layout: &Layout, edges: Area, config: &Config, pos: Position) -> u32 {
    let step = config.square_step.max(1);
    let x = ((pos.longitude - edges.west) / step).clamp(0, layout.grid_columns - 1);
    let y = ((pos.latitude - edges.south) / step).clamp(0, layout.grid_rows - 1);
    (y * layout.grid_columns + x) as u32
}

/// The rectangle covered by grid cell `square_id`.
pub fn square_rect(layout: &Layout, edges: Area, config: &Config, square_id: u32) -> Area {
    let step = config.square_step.max(1);
    let x = square_id as i32 % layout.grid_columns;
    let y = square_id as i32 / layout.grid_columns;
    let west = edges.west + x * step;
    let south = edges.south + y * step;
    Area { west, south, east: west + step, north: south + step }
}

fn mini_section(config: &Config, square_addr: usize) -> SectionLayout {
    let items_per_block = (config.block_size / LINE_ID_SIZE).max(1);
    SectionLayout {
        num_items_offset: square_addr + OFF_NUM_ITEMS,
        blocks_offset: square_addr + OFF_BLOCKS,
        item_size: LINE_ID_SIZE,
        items_per_block,
        max_items: items_per_block * config.max_blocks_per_square,
        max_blocks: config.max_blocks_per_square,
    }
}

fn init_square_record(slot: &mut [u8]) {
    write_u32_at(slot, OFF_CFCCS, 0);
    write_u32_at(slot, OFF_NUM_ITEMS, 0);
    for k in 0..3 {
        write_i32_at(slot, OFF_BLOCKS + k * 4, -1);
    }
}

fn square_addr(buf: &mut [u8], pool_offset: usize, block_size: u32, squares: &SectionLayout, square_id: u32) -> Result<usize> {
    section::get(buf, pool_offset, block_size, squares, square_id, true, Some(&init_square_record))
}

fn last_line_in(buf: &mut [u8], pool_offset: usize, block_size: u32, mini: &SectionLayout) -> Result<Option<i32>> {
    match section::get_last(buf, pool_offset, block_size, mini)? {
        None => Ok(None),
        Some(addr) => Ok(Some(read_i32_at(buf, addr))),
    }
}

fn append_line_if_new(buf: &mut [u8], pool_offset: usize, block_size: u32, mini: &SectionLayout, line_id: i32) -> Result<()> {
    if last_line_in(buf, pool_offset, block_size, mini)? == Some(line_id) {
        return Ok(());
    }
    section::append(buf, pool_offset, block_size, mini, &line_id.to_ne_bytes())?;
    Ok(())
}

/// `editor_square_add_line`: records `line_id` in every square its geometry
/// passes through (`from`, each shape point, `to`), skipping consecutive
/// repeats, and marks `cfcc` in each touched square's bitmap.
pub fn add_line(
    buf: &mut [u8],
    pool_offset: usize,
    block_size: u32,
    squares: &SectionLayout,
    layout: &Layout,
    edges: Area,
    config: &Config,
    line_id: i32,
    from: Position,
    shape_points: &[Position],
    to: Position,
    cfcc: u32,
) -> Result<()> {
    let mut cur = square_index(layout, edges, config, from);
    mark_square(buf, pool_offset, block_size, squares, config, cur, line_id, cfcc)?;

    for &pos in shape_points.iter().chain(std::iter::once(&to)) {
        let square = square_index(layout, edges, config, pos);
        if square != cur {
            mark_square(buf, pool_offset, block_size, squares, config, square, line_id, cfcc)?;
            cur = square;
        }
    }

    Ok(())
}

fn mark_square(buf: &mut [u8], pool_offset: usize, block_size: u32, squares: &SectionLayout, config: &Config, square_id: u32, line_id: i32, cfcc: u32) -> Result<()> {
    let addr = square_addr(buf, pool_offset, block_size, squares, square_id)?;
    let mini = mini_section(config, addr);
    append_line_if_new(buf, pool_offset, block_size, &mini, line_id)?;
    let addr = square_addr(buf, pool_offset, block_size, squares, square_id)?;
    let bits = read_u32_at(buf, addr + OFF_CFCCS);
    if cfcc < 32 {
        write_u32_at(buf, addr + OFF_CFCCS, bits | (1 << cfcc));
    }
    Ok(())
}

/// All line ids recorded in `square_id`.
pub fn lines_in(buf: &mut [u8], pool_offset: usize, block_size: u32, squares: &SectionLayout, config: &Config, square_id: u32) -> Result<Vec<i32>> {
    let addr = square_addr(buf, pool_offset, block_size, squares, square_id)?;
    let mini = mini_section(config, addr);
    let n = section::num_items(buf, &mini);
    let mut out = Vec::with_capacity(n as usize);
    for id in 0..n {
        let item_addr = section::get(buf, pool_offset, block_size, &mini, id, false, None)?;
        out.push(read_i32_at(buf, item_addr));
    }
    Ok(out)
}

/// The CFCC bitmap recorded for `square_id`.
pub fn cfccs_in(buf: &mut [u8], pool_offset: usize, block_size: u32, squares: &SectionLayout, square_id: u32) -> Result<u32> {
    let addr = square_addr(buf, pool_offset, block_size, squares, square_id)?;
    Ok(read_u32_at(buf, addr + OFF_CFCCS))
}

/// `editor_square_find_by_position`: the primary square containing `pos`,
/// plus (when `near` is set) any adjacent square within [`NEAR_DISTANCE`] of
/// one of its four edges.
pub fn find_by_position(layout: &Layout, edges: Area, config: &Config, pos: Position, near: bool) -> Vec<u32> {
    let primary = square_index(layout, edges, config, pos);
    let mut out = vec![primary];
    if !near {
        return out;
    }

    let rect = square_rect(layout, edges, config, primary);
    let x = primary as i32 % layout.grid_columns;
    let y = primary as i32 / layout.grid_columns;

    let mut push = |dx: i32, dy: i32| {
        let nx = x + dx;
        let ny = y + dy;
        if nx >= 0 && nx < layout.grid_columns && ny >= 0 && ny < layout.grid_rows {
            let id = (ny * layout.grid_columns + nx) as u32;
            if !out.contains(&id) {
                out.push(id);
            }
        }
    };

    if pos.longitude - rect.west <= NEAR_DISTANCE {
        push(-1, 0);
    }
    if rect.east - pos.longitude <= NEAR_DISTANCE {
        push(1, 0);
    }
    if pos.latitude - rect.south <= NEAR_DISTANCE {
        push(0, -1);
    }
    if rect.north - pos.latitude <= NEAR_DISTANCE {
        push(0, 1);
    }

    out
}

/// One candidate returned by [`get_closest`]: a line recorded in a nearby
/// square, tagged with the square's distance rank (0 = primary square).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbour {
    pub line_id: i32,
    pub square_id: u32,
}

/// `editor_square_get_closest`: every line in `pos`'s square and its near
/// neighbors whose recorded CFCC bitmap intersects `categories`, capped at
/// `max` results. Built on [`find_by_position`]; does not itself rank by
/// distance to geometry, only by which square recorded the line (callers
/// needing exact distance re-check with [`crate::line::length`] or similar).
pub fn get_closest(
    buf: &mut [u8],
    pool_offset: usize,
    block_size: u32,
    squares: &SectionLayout,
    layout: &Layout,
    edges: Area,
    config: &Config,
    pos: Position,
    categories: u32,
    max: usize,
) -> Result<Vec<Neighbour>> {
    let mut out = Vec::new();
    for square_id in find_by_position(layout, edges, config, pos, true) {
        if categories != 0 && cfccs_in(buf, pool_offset, block_size, squares, square_id)? & categories == 0 {
            continue;
        }
        for line_id in lines_in(buf, pool_offset, block_size, squares, config, square_id)? {
            if out.len() >= max {
                return Ok(out);
            }
            out.push(Neighbour { line_id, square_id });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Area;
    use crate::header::Header;
    use crate::layout::{Layout, SectionId};

    fn fresh(config: &Config, edges: &Area) -> (Vec<u8>, Layout) {
        let layout = Layout::compute(config, edges);
        let mut buf = vec![0u8; layout.pool_offset + config.block_size as usize * config.initial_blocks as usize];
        Header::init(&mut buf, 1, *edges, config.block_size, config.initial_blocks as u32, "d");
        for id in SectionId::ALL {
            crate::blockpool::init_blocks(&mut buf, &layout.section(id));
        }
        (buf, layout)
    }

    fn small_config() -> Config {
        Config { block_size: 256, initial_blocks: 64, square_step: 1000, max_blocks_per_square: 2, ..Config::default() }
    }

    #[test]
    fn add_line_records_endpoints_and_dedups_consecutive_squares() {
        let config = small_config();
        let edges = Area { west: 0, south: 0, east: 10_000, north: 10_000 };
        let (mut buf, layout) = fresh(&config, &edges);
        let squares = layout.section(SectionId::Squares);

        add_line(&mut buf, layout.pool_offset, config.block_size, &squares, &layout, edges, &config, 42, Position { longitude: 100, latitude: 100 }, &[], Position { longitude: 150, latitude: 150 }, 3).unwrap();

        let sq = square_index(&layout, edges, &config, Position { longitude: 100, latitude: 100 });
        let lines = lines_in(&mut buf, layout.pool_offset, config.block_size, &squares, &config, sq).unwrap();
        assert_eq!(lines, vec![42]);
        assert!(cfccs_in(&mut buf, layout.pool_offset, config.block_size, &squares, sq).unwrap() & (1 << 3) != 0);
    }

    #[test]
    fn add_line_spanning_squares_is_recorded_in_both() {
        let config = small_config();
        let edges = Area { west: 0, south: 0, east: 10_000, north: 10_000 };
        let (mut buf, layout) = fresh(&config, &edges);
        let squares = layout.section(SectionId::Squares);

        let from = Position { longitude: 100, latitude: 100 };
        let to = Position { longitude: 1_500, latitude: 100 };
        add_line(&mut buf, layout.pool_offset, config.block_size, &squares, &layout, edges, &config, 7, from, &[], to, 1).unwrap();

        let sq_from = square_index(&layout, edges, &config, from);
        let sq_to = square_index(&layout, edges, &config, to);
        assert_ne!(sq_from, sq_to);
        assert_eq!(lines_in(&mut buf, layout.pool_offset, config.block_size, &squares, &config, sq_from).unwrap(), vec![7]);
        assert_eq!(lines_in(&mut buf, layout.pool_offset, config.block_size, &squares, &config, sq_to).unwrap(), vec![7]);
    }

    #[test]
    fn find_by_position_includes_near_neighbors_at_boundary() {
        let config = small_config();
        let edges = Area { west: 0, south: 0, east: 10_000, north: 10_000 };
        let layout = Layout::compute(&config, &edges);
        let near_edge = Position { longitude: 999, latitude: 500 };
        let found = find_by_position(&layout, edges, &config, near_edge, true);
        assert!(found.len() >= 2);
    }
}
