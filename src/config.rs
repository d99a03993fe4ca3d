//! Crate-wide tunables.
//!
//! The source scatters these as `#define`s across `editor_db.c`; here they
//! are gathered so a caller can override individual fields (e.g. a tiny
//! `block_size` to exercise growth in a test) instead of editing constants.

use std::path::PathBuf;

/// `EDITOR_CACHE_SIZE` in the source.
pub const DEFAULT_CACHE_SIZE: usize = 10;

/// `DB_INITIAL_BLOCKS` in the source.
pub const DEFAULT_INITIAL_BLOCKS: i32 = 1000;

/// Blocks of headroom kept free before [`Config::grow_guard`] triggers an
/// eager grow; `GROW_GUARD` in the source.
pub const DEFAULT_GROW_GUARD: i32 = 10;

/// Successful appends between periodic flushes; `FLUSH_SIZE` in the source.
pub const DEFAULT_FLUSH_INTERVAL: u32 = 300;

/// `EDITOR_MAX_POINTS` in the source.
pub const DEFAULT_MAX_POINTS: u32 = 10_000;
/// `EDITOR_MAX_SHAPES` in the source.
pub const DEFAULT_MAX_SHAPES: u32 = 100_000;
/// `EDITOR_MAX_STREETS` in the source (also used as the markers cap).
pub const DEFAULT_MAX_STREETS: u32 = 500;
/// `EDITOR_MAX_LINES` in the source.
pub const DEFAULT_MAX_LINES: u32 = 5_000;

/// `DICTIONARY_INDEX_SIZE` in the source: cap on tree nodes per volume.
pub const DEFAULT_DICTIONARY_INDEX_SIZE: u32 = 0x1_0000;
/// `DICTIONARY_DATA_SIZE` in the source: bytes of interned string data per volume.
pub const DEFAULT_DICTIONARY_DATA_SIZE: u32 = 0x1_0000;

/// Grid step, in micro-degrees, of the spatial square index. Not present in
/// the retrieved source headers; chosen so a typical county spans a few
/// hundred squares (one degree ~= 111km).
pub const DEFAULT_SQUARE_STEP: i32 = 1_000_000;

/// `MAX_BLOCKS_PER_SQUARE` in the source: cap on how many pool blocks a
/// single square's line-id list may occupy.
pub const DEFAULT_MAX_BLOCKS_PER_SQUARE: u32 = 3;

/// `MAX_MARKER_TYPES` in the source.
pub const MAX_MARKER_TYPES: usize = 10;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory; containers live under `<base_dir>/maps/edt<fips>.rdm`.
    pub base_dir: PathBuf,
    /// Floor of 10 is enforced by [`Config::cache_size`] regardless of this value.
    pub cache_size: usize,
    pub initial_blocks: i32,
    pub grow_guard: i32,
    pub flush_interval: u32,
    /// Bytes per block; must be at least twice the largest record size.
    pub block_size: u32,
    /// Section capacity tunables (`EDITOR_MAX_*` in the source). Kept small
    /// in tests to exercise `SectionFull` without huge fixtures.
    pub max_points: u32,
    pub max_shapes: u32,
    pub max_streets: u32,
    pub max_lines: u32,
    /// Per-volume dictionary capacity (`DICTIONARY_*_SIZE` in the source).
    pub dictionary_index_size: u32,
    pub dictionary_data_size: u32,
    /// Spatial index tuning.
    pub square_step: i32,
    pub max_blocks_per_square: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_dir: PathBuf::from("."),
            cache_size: DEFAULT_CACHE_SIZE,
            initial_blocks: DEFAULT_INITIAL_BLOCKS,
            grow_guard: DEFAULT_GROW_GUARD,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            block_size: 2048,
            max_points: DEFAULT_MAX_POINTS,
            max_shapes: DEFAULT_MAX_SHAPES,
            max_streets: DEFAULT_MAX_STREETS,
            max_lines: DEFAULT_MAX_LINES,
            dictionary_index_size: DEFAULT_DICTIONARY_INDEX_SIZE,
            dictionary_data_size: DEFAULT_DICTIONARY_DATA_SIZE,
            square_step: DEFAULT_SQUARE_STEP,
            max_blocks_per_square: DEFAULT_MAX_BLOCKS_PER_SQUARE,
        }
    }
}

impl Config {
    /// Cache size, floored at [`DEFAULT_CACHE_SIZE`] per the county cache spec.
    pub fn cache_size(&self) -> usize {
        self.cache_size.max(DEFAULT_CACHE_SIZE)
    }

    pub fn maps_dir(&self) -> PathBuf {
        self.base_dir.join("maps")
    }

    pub fn container_path(&self, fips: u32) -> PathBuf {
        self.maps_dir().join(format!("edt{:05}.rdm", fips))
    }
}
