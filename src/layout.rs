//! Fixed section table: byte layout of every record-oriented section.
//!
//! The source discovers sections by walking a named tree (`buildmap_db`)
//! built once at creation time. Because the set of sections here is closed
//! (§4.1, §9 — "fixed enum matched in one place, not a vtable"), this module
//! replaces that tree with a plain array computed deterministically from
//! [`Config`] and the county's `edges`: the same inputs always produce the
//! same offsets, on both `create` and `open`, so nothing needs to persist the
//! table itself — only the mutable `num_items`/`blocks[]` state it describes.

use crate::config::Config;
use crate::geometry::Area;
use crate::header::HEADER_SIZE;

/// One entry in the closed set of record-oriented sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum SectionId {
    Points = 0,
    PointsDel,
    Markers,
    Shapes,
    Lines,
    Squares,
    Streets,
    Ranges,
    Trksegs,
    Routes,
    OverrideIndex,
    OverrideData,
    StreetsTrees,
    StreetsReferences,
    StreetsData,
    CitiesTrees,
    CitiesReferences,
    CitiesData,
    TypesTrees,
    TypesReferences,
    TypesData,
    ZipsTrees,
    ZipsReferences,
    ZipsData,
    T2sTrees,
    T2sReferences,
    T2sData,
    NotesTrees,
    NotesReferences,
    NotesData,
}

pub const SECTION_COUNT: usize = 30;

impl SectionId {
    pub const ALL: [SectionId; SECTION_COUNT] = [
        SectionId::Points,
        SectionId::PointsDel,
        SectionId::Markers,
        SectionId::Shapes,
        SectionId::Lines,
        SectionId::Squares,
        SectionId::Streets,
        SectionId::Ranges,
        SectionId::Trksegs,
        SectionId::Routes,
        SectionId::OverrideIndex,
        SectionId::OverrideData,
        SectionId::StreetsTrees,
        SectionId::StreetsReferences,
        SectionId::StreetsData,
        SectionId::CitiesTrees,
        SectionId::CitiesReferences,
        SectionId::CitiesData,
        SectionId::TypesTrees,
        SectionId::TypesReferences,
        SectionId::TypesData,
        SectionId::ZipsTrees,
        SectionId::ZipsReferences,
        SectionId::ZipsData,
        SectionId::T2sTrees,
        SectionId::T2sReferences,
        SectionId::T2sData,
        SectionId::NotesTrees,
        SectionId::NotesReferences,
        SectionId::NotesData,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A dictionary volume, named per §3/§4.5. Each volume maps to three
/// [`SectionId`]s (trees/references/data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Volume {
    Streets,
    Cities,
    Types,
    Zips,
    T2s,
    Notes,
}

impl Volume {
    pub const ALL: [Volume; 6] = [
        Volume::Streets,
        Volume::Cities,
        Volume::Types,
        Volume::Zips,
        Volume::T2s,
        Volume::Notes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Volume::Streets => "streets",
            Volume::Cities => "cities",
            Volume::Types => "types",
            Volume::Zips => "zips",
            Volume::T2s => "t2s",
            Volume::Notes => "notes",
        }
    }

    pub fn trees(self) -> SectionId {
        match self {
            Volume::Streets => SectionId::StreetsTrees,
            Volume::Cities => SectionId::CitiesTrees,
            Volume::Types => SectionId::TypesTrees,
            Volume::Zips => SectionId::ZipsTrees,
            Volume::T2s => SectionId::T2sTrees,
            Volume::Notes => SectionId::NotesTrees,
        }
    }

    pub fn references(self) -> SectionId {
        match self {
            Volume::Streets => SectionId::StreetsReferences,
            Volume::Cities => SectionId::CitiesReferences,
            Volume::Types => SectionId::TypesReferences,
            Volume::Zips => SectionId::ZipsReferences,
            Volume::T2s => SectionId::T2sReferences,
            Volume::Notes => SectionId::NotesReferences,
        }
    }

    pub fn data(self) -> SectionId {
        match self {
            Volume::Streets => SectionId::StreetsData,
            Volume::Cities => SectionId::CitiesData,
            Volume::Types => SectionId::TypesData,
            Volume::Zips => SectionId::ZipsData,
            Volume::T2s => SectionId::T2sData,
            Volume::Notes => SectionId::NotesData,
        }
    }
}

/// Byte layout of one section's descriptor (`num_items` + `blocks[]`) within
/// the container's section table.
#[derive(Debug, Clone, Copy)]
pub struct SectionLayout {
    pub num_items_offset: usize,
    pub blocks_offset: usize,
    pub item_size: u32,
    pub items_per_block: u32,
    pub max_items: u32,
    pub max_blocks: u32,
}

/// Sizes, in bytes, of the fixed records each section stores. Kept in one
/// place so the layout and the entity modules agree on `item_size`.
pub mod item_size {
    pub const POINT: u32 = 16; // lon, lat, flags, base_id (i32 x 4)
    pub const DEL_POINT: u32 = 8; // base_id, editor_id
    pub const MARKER: u32 = 20; // lon, lat, time, note_id (i32 x 4) + steering(i16) + type(u8) + flags(u8)
    pub const SHAPE: u32 = 6; // 3 x i16 deltas
    pub const LINE: u32 = 36; // 9 x i32
    pub const SQUARE: u32 = 20; // cfccs(u32) + num_items(u32) + blocks[3](i32)
    pub const STREET: u32 = 20; // 5 x i32 dict ids
    pub const RANGE: u32 = 32; // 8 x i32
    pub const TRKSEG: u32 = 44; // 11 x i32
    pub const ROUTE_SEGMENT: u32 = 8; // 2 x i16 flags + 2 x i16 speed limits
    pub const OVERRIDE_INDEX: u32 = 4; // i32
    pub const OVERRIDE_DATA: u32 = 16; // 4 x i32
    pub const DICT_TREE: u32 = 8; // first(i32), count(u16), position(u16)
    pub const DICT_REFERENCE: u32 = 12; // character(u8), kind(u8), pad(u16), child(i32), next(i32)
    pub const DICT_DATA: u32 = 1; // raw bytes
}

/// A computed `(item_size, max_items)` spec for one section, in the fixed
/// creation order mirrored from `editor_db_create`.
struct Spec {
    id: SectionId,
    item_size: u32,
    max_items: u32,
}

fn specs(config: &Config, edges: &Area) -> Vec<Spec> {
    let square_count = square_grid(config, edges).0 as u32;
    let dict_refs = config.dictionary_index_size * 10;
    let dict_trees = config.dictionary_index_size;
    let dict_data = config.dictionary_data_size;

    let mut v = vec![
        Spec { id: SectionId::Points, item_size: item_size::POINT, max_items: config.max_points },
        Spec { id: SectionId::Markers, item_size: item_size::MARKER, max_items: config.max_streets },
        Spec { id: SectionId::PointsDel, item_size: item_size::DEL_POINT, max_items: config.max_points },
        Spec { id: SectionId::Shapes, item_size: item_size::SHAPE, max_items: config.max_shapes },
        Spec { id: SectionId::Lines, item_size: item_size::LINE, max_items: config.max_lines },
        Spec { id: SectionId::Squares, item_size: item_size::SQUARE, max_items: square_count.max(1) },
        Spec { id: SectionId::Streets, item_size: item_size::STREET, max_items: config.max_streets },
        Spec { id: SectionId::Ranges, item_size: item_size::RANGE, max_items: config.max_lines * 2 },
        Spec { id: SectionId::Trksegs, item_size: item_size::TRKSEG, max_items: config.max_lines * 2 },
        Spec { id: SectionId::Routes, item_size: item_size::ROUTE_SEGMENT, max_items: config.max_lines * 2 },
        Spec { id: SectionId::OverrideIndex, item_size: item_size::OVERRIDE_INDEX, max_items: config.max_lines },
        Spec { id: SectionId::OverrideData, item_size: item_size::OVERRIDE_DATA, max_items: config.max_lines },
    ];

    for vol in Volume::ALL {
        v.push(Spec { id: vol.references(), item_size: item_size::DICT_REFERENCE, max_items: dict_refs });
        v.push(Spec { id: vol.trees(), item_size: item_size::DICT_TREE, max_items: dict_trees });
        v.push(Spec { id: vol.data(), item_size: item_size::DICT_DATA, max_items: dict_data });
    }

    v
}

/// `(columns, rows)` of the spatial grid over `edges`, per §4.6.
pub fn square_grid(config: &Config, edges: &Area) -> (i32, i32) {
    let step = config.square_step.max(1);
    let w = (edges.east - edges.west) / step + 1;
    let h = (edges.north - edges.south) / step + 1;
    (w.max(1), h.max(1))
}

#[derive(Debug, Clone)]
pub struct Layout {
    sections: [SectionLayout; SECTION_COUNT],
    pub pool_offset: usize,
    pub grid_columns: i32,
    pub grid_rows: i32,
}

impl Layout {
    pub fn compute(config: &Config, edges: &Area) -> Layout {
        let (cols, rows) = square_grid(config, edges);
        let mut sections = [SectionLayout {
            num_items_offset: 0,
            blocks_offset: 0,
            item_size: 0,
            items_per_block: 0,
            max_items: 0,
            max_blocks: 0,
        }; SECTION_COUNT];

        let mut offset = HEADER_SIZE;
        for spec in specs(config, edges) {
            let items_per_block = (config.block_size / spec.item_size).max(1);
            let max_blocks = (spec.item_size * spec.max_items) / config.block_size + 1;

            let num_items_offset = offset;
            offset += 4;
            let blocks_offset = offset;
            offset += max_blocks as usize * 4;

            sections[spec.id.index()] = SectionLayout {
                num_items_offset,
                blocks_offset,
                item_size: spec.item_size,
                items_per_block,
                max_items: spec.max_items,
                max_blocks,
            };
        }

        Layout { sections, pool_offset: offset, grid_columns: cols, grid_rows: rows }
    }

    pub fn section(&self, id: SectionId) -> SectionLayout {
        self.sections[id.index()]
    }

    /// Total bytes before the data-block pool starts.
    pub fn metadata_size(&self) -> usize {
        self.pool_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_deterministic() {
        let config = Config::default();
        let edges = Area { west: 0, south: 0, east: 2_000_000, north: 2_000_000 };
        let a = Layout::compute(&config, &edges);
        let b = Layout::compute(&config, &edges);
        assert_eq!(a.pool_offset, b.pool_offset);
        assert_eq!(a.section(SectionId::Points).blocks_offset, b.section(SectionId::Points).blocks_offset);
    }

    #[test]
    fn sections_do_not_overlap() {
        let config = Config::default();
        let edges = Area { west: 0, south: 0, east: 2_000_000, north: 2_000_000 };
        let layout = Layout::compute(&config, &edges);
        let mut ranges: Vec<(usize, usize)> = SectionId::ALL
            .iter()
            .map(|&id| {
                let s = layout.section(id);
                (s.num_items_offset, s.blocks_offset + s.max_blocks as usize * 4)
            })
            .collect();
        ranges.sort();
        for w in ranges.windows(2) {
            assert!(w[0].1 <= w[1].0, "{:?} overlaps {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn square_grid_covers_at_least_one_cell() {
        let config = Config::default();
        let edges = Area { west: 0, south: 0, east: 0, north: 0 };
        let (cols, rows) = square_grid(&config, &edges);
        assert_eq!((cols, rows), (1, 1));
    }
}
