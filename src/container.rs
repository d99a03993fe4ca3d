//! One county's memory-mapped container file (§4.1, §4.2): `create`/`open`,
//! the header/version/date checks done on activation, `sync`, `delete`, and
//! in-place `grow`.
//!
//! Grounded in `editor_db_create`/`editor_db_open`/`editor_db_activate`/
//! `editor_db_grow` in `editor_db.c`. `grow` fixes the known source bug
//! (design notes §9): the source writes `num_total_blocks`/`file_size` into
//! the header *before* truncating the file, so a truncate failure leaves an
//! in-memory header describing a size the file doesn't actually have. Here
//! the header is only mutated after `set_len` succeeds.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::{info, instrument, warn};

use crate::blockpool;
use crate::config::Config;
use crate::dictionary::{self, DictCtx};
use crate::error::{EmdbError, Result};
use crate::geometry::Area;
use crate::header::Header;
use crate::layout::{Layout, SectionId, Volume};

/// An open, memory-mapped county container.
pub struct Container {
    fips: u32,
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    layout: Layout,
    since_flush: u32,
}

impl Container {
    /// `editor_db_create`: lays out a brand-new container for `fips` covering
    /// `edges`, sized for `config.initial_blocks`, and seeds every section
    /// (including the six dictionary volumes' root trees).
    #[instrument(skip(config), fields(fips))]
    pub fn create(config: &Config, base_dir: &Path, fips: u32, edges: Area, rm_map_date: &str) -> Result<Container> {
        let layout = Layout::compute(config, &edges);
        let total_blocks = config.initial_blocks.max(1) as u32;
        let file_size = layout.metadata_size() + config.block_size as usize * total_blocks as usize;

        fs::create_dir_all(base_dir)?;
        let path = config_path(base_dir, fips);
        let file = OpenOptions::new().read(true).write(true).create_new(true).open(&path)?;
        file.set_len(file_size as u64)?;

        let mut mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        Header::init(&mut mmap, fips, edges, config.block_size, total_blocks, rm_map_date);
        Header::set_file_size(&mut mmap, file_size as u32);

        for id in SectionId::ALL {
            blockpool::init_blocks(&mut mmap, &layout.section(id));
        }
        for volume in Volume::ALL {
            let ctx = DictCtx::new(&layout, config.block_size, volume);
            dictionary::init_volume(&mut mmap, &ctx)?;
        }

        mmap.flush()?;
        info!(fips, total_blocks, "created container");
        Ok(Container { fips, path, file, mmap, layout, since_flush: 0 })
    }

    /// `editor_db_open`: maps an existing container file and checks its
    /// magic and format version.
    #[instrument(skip(config), fields(fips))]
    pub fn open(config: &Config, base_dir: &Path, fips: u32) -> Result<Container> {
        let path = config_path(base_dir, fips);
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };

        if Header::magic(&mmap) != crate::header::MAGIC {
            return Err(EmdbError::Corruption(format!("{} is not an EMDB container", path.display())));
        }
        if Header::version(&mmap) != crate::header::FORMAT_VERSION {
            return Err(EmdbError::Corruption(format!(
                "{} has format version {}, expected {}",
                path.display(),
                Header::version(&mmap),
                crate::header::FORMAT_VERSION
            )));
        }

        let edges = Header::edges(&mmap);
        let layout = Layout::compute(config, &edges);
        Ok(Container { fips, path, file, mmap, layout, since_flush: 0 })
    }

    pub fn fips(&self) -> u32 {
        self.fips
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn buf(&self) -> &[u8] {
        &self.mmap
    }

    pub fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    pub fn edges(&self) -> Area {
        Header::edges(&self.mmap)
    }

    pub fn rm_map_date(&self) -> String {
        Header::rm_map_date(&self.mmap)
    }

    /// Checks this container's recorded base-map date against the currently
    /// active one, per `editor_db_activate`'s version check.
    pub fn check_version(&self, base_map_date: &str) -> Result<()> {
        let container_date = self.rm_map_date();
        if container_date != base_map_date {
            return Err(EmdbError::VersionMismatch { container: container_date, base_map: base_map_date.to_string() });
        }
        Ok(())
    }

    /// Called after a successful mutating append/insert; triggers `sync`
    /// every `flush_interval` operations (`FLUSH_SIZE` in the source).
    pub fn note_write(&mut self, config: &Config) -> Result<()> {
        self.since_flush += 1;
        if self.since_flush >= config.flush_interval {
            self.sync()?;
        }
        Ok(())
    }

    /// `editor_db_sync`: flushes the mapping to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.mmap.flush()?;
        self.since_flush = 0;
        Ok(())
    }

    /// `editor_db_grow`: extends the pool by `config.initial_blocks`, if the
    /// container is actually within `grow_guard` blocks of full. A no-op
    /// otherwise, so callers can call it unconditionally after a `Full`.
    #[instrument(skip(self, config), fields(fips = self.fips))]
    pub fn grow(&mut self, config: &Config) -> Result<bool> {
        let used = Header::num_used_blocks(&self.mmap);
        let total = Header::num_total_blocks(&self.mmap);
        let guard = config.grow_guard.max(0) as u32;

        if used < total.saturating_sub(guard) {
            return Ok(false);
        }

        let added = config.initial_blocks.max(1) as u32;
        let new_total = total + added;
        let new_file_size = self.layout.metadata_size() + config.block_size as usize * new_total as usize;

        self.mmap.flush()?;
        self.file.set_len(new_file_size as u64)?;

        let mut new_mmap = unsafe { MmapOptions::new().map_mut(&self.file)? };
        Header::set_num_total_blocks(&mut new_mmap, new_total);
        Header::set_file_size(&mut new_mmap, new_file_size as u32);
        self.mmap = new_mmap;

        warn!(fips = self.fips, old_total = total, new_total, "grew container");
        Ok(true)
    }

    /// `editor_db_close`: flushes and drops the mapping.
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }

    /// `editor_db_delete`: removes a non-active container's file from disk.
    pub fn delete(config: &Config, base_dir: &Path, fips: u32) -> Result<()> {
        let path = config_path(base_dir, fips);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EmdbError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn config_path(base_dir: &Path, fips: u32) -> PathBuf {
    base_dir.join("maps").join(format!("edt{:05}.rdm", fips))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    fn small_config() -> Config {
        Config { block_size: 256, initial_blocks: 4, grow_guard: 1, max_points: 8, max_shapes: 8, max_streets: 4, max_lines: 8, dictionary_index_size: 16, dictionary_data_size: 64, ..Config::default() }
    }

    #[test]
    fn create_then_open_round_trips_header() {
        let dir = tempdir().unwrap();
        let config = small_config();
        let edges = Area { west: 0, south: 0, east: 1_000_000, north: 1_000_000 };
        {
            let c = Container::create(&config, dir.path(), 77001, edges, "2020-01-01").unwrap();
            c.close().unwrap();
        }

        let c = Container::open(&config, dir.path(), 77001).unwrap();
        assert_eq!(c.fips(), 77001);
        assert_eq!(c.edges(), edges);
        assert_eq!(c.rm_map_date(), "2020-01-01");
        assert!(c.check_version("2020-01-01").is_ok());
        assert!(c.check_version("2020-02-02").is_err());
    }

    #[test]
    fn grow_extends_pool_and_is_idempotent_when_not_needed() {
        let dir = tempdir().unwrap();
        let config = small_config();
        let edges = Area { west: 0, south: 0, east: 1_000_000, north: 1_000_000 };
        let mut c = Container::create(&config, dir.path(), 77001, edges, "d").unwrap();

        assert!(!c.grow(&config).unwrap());

        // Fast-forward usage past the grow guard without touching any one
        // section's own block cap.
        Header::set_num_used_blocks(c.buf_mut(), 4);
        assert!(c.grow(&config).unwrap());
        assert!(Header::num_total_blocks(c.buf()) > 4);
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempdir().unwrap();
        let config = small_config();
        let edges = Area { west: 0, south: 0, east: 1, north: 1 };
        let c = Container::create(&config, dir.path(), 5, edges, "d").unwrap();
        let path = c.path().to_path_buf();
        c.close().unwrap();
        assert!(path.exists());
        Container::delete(&config, dir.path(), 5).unwrap();
        assert!(!path.exists());
    }
}
