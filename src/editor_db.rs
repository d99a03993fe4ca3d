//! `EditorDb` (§4.4, §9): the single entry point a caller holds. Owns the
//! county cache, the base-map collaborator, and which county is currently
//! active, and replaces the source's process-wide globals (`editor_db.c`'s
//! static `db` pointer and `current_fips`) with ordinary struct fields.
//!
//! Every mutating entity operation here follows the same shape: resolve the
//! active container, run the operation, and on `Full`/`PoolFull` grow the
//! container once and retry the whole closure (§7). Multi-step orchestrations
//! (`line_copy`, `line_split`) run as one such closure; a `Full` partway
//! through means the whole closure re-runs from its first append, which is
//! not transactional across the retry. The container's own on-disk format
//! offers no rollback either (§1 Non-goals: "no transactions or crash-safe
//! journaling"), so this matches the level of atomicity the format already
//! provides rather than adding a guarantee nothing else here has.

use crate::basemap::BaseMapReader;
use crate::cache::CountyCache;
use crate::config::Config;
use crate::container::Container;
use crate::dictionary::{self, DictCtx};
use crate::error::{EmdbError, Result};
use crate::geometry::{Area, Position};
use crate::header::Header;
use crate::layout::{Layout, SectionId, Volume};
use crate::line;
use crate::marker::{self, Marker};
use crate::overrides;
use crate::point;
use crate::route::{self, RouteSegment};
use crate::shape;
use crate::squares;
use crate::street;
use crate::trkseg;

pub struct EditorDb<B: BaseMapReader> {
    config: Config,
    cache: CountyCache,
    base_map: B,
    active_fips: Option<u32>,
    marker_registry: marker::Registry,
}

impl<B: BaseMapReader> EditorDb<B> {
    pub fn new(config: Config, base_map: B) -> EditorDb<B> {
        let cache = CountyCache::new(&config);
        EditorDb { config, cache, base_map, active_fips: None, marker_registry: marker::Registry::new() }
    }

    pub fn base_map(&self) -> &B {
        &self.base_map
    }

    pub fn base_map_mut(&mut self) -> &mut B {
        &mut self.base_map
    }

    pub fn active_fips(&self) -> Option<u32> {
        self.active_fips
    }

    pub fn register_marker_type(&mut self, marker_type: u8, handler: Box<dyn marker::MarkerTypeHandler>) -> Result<()> {
        self.marker_registry.register(marker_type, handler)
    }

    /// `editor_db_create`: lays out a brand-new container for `fips` and
    /// makes it the most-recently-used cache entry.
    pub fn create(&mut self, fips: u32, edges: Area) -> Result<()> {
        let rm_map_date = self.base_map.metadata_get_attribute("Version", "Date").unwrap_or_default();
        let container = Container::create(&self.config, &self.config.base_dir, fips, edges, &rm_map_date)?;
        if let Some(evicted) = self.cache.insert(fips, container) {
            evicted.close()?;
        }
        Ok(())
    }

    /// `editor_db_activate`: makes `fips` the active container, opening it
    /// from disk and activating the base map's own locator for the same fips
    /// if it isn't already cached. A county with no container and no base-map
    /// edges is remembered in the negative cache so repeated activation
    /// attempts don't keep reopening a file that doesn't exist.
    pub fn activate(&mut self, fips: u32) -> Result<()> {
        if self.active_fips == Some(fips) {
            return Ok(());
        }
        if self.cache.is_no_county(fips) {
            return Err(EmdbError::NoCounty(fips));
        }
        if self.cache.get_mut(fips).is_some() {
            return self.finish_activate(fips);
        }

        match Container::open(&self.config, &self.config.base_dir, fips) {
            Ok(container) => {
                if let Some(evicted) = self.cache.insert(fips, container) {
                    evicted.close()?;
                }
                self.finish_activate(fips)
            }
            Err(EmdbError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                self.cache.mark_no_county(fips);
                Err(EmdbError::NotFound(fips))
            }
            Err(e) => Err(e),
        }
    }

    fn finish_activate(&mut self, fips: u32) -> Result<()> {
        if self.base_map.locator_activate(fips).is_err() {
            return Err(EmdbError::NoCounty(fips));
        }
        let base_map_date = self.base_map.metadata_get_attribute("Version", "Date").unwrap_or_default();
        let container = self.cache.get_mut(fips).expect("fips was just looked up or inserted");
        container.check_version(&base_map_date)?;
        self.active_fips = Some(fips);
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.active_container()?.sync()
    }

    /// `editor_db_delete`: evicts and removes `fips`'s container, clearing it
    /// as active first if it was.
    pub fn delete(&mut self, fips: u32) -> Result<()> {
        if self.active_fips == Some(fips) {
            self.active_fips = None;
        }
        if let Some(container) = self.cache.evict(fips) {
            container.close()?;
        }
        Container::delete(&self.config, &self.config.base_dir, fips)
    }

    /// `editor_db_close_all`: flushes and drops every cached container.
    pub fn close_all(&mut self) -> Result<()> {
        for container in self.cache.drain() {
            container.close()?;
        }
        self.active_fips = None;
        Ok(())
    }

    /// `editor_db_locator`: the fips the active container covers `pos`
    /// under, or the base map's own answer if no container is active (or the
    /// active one doesn't cover it). Returns [`EmdbError::Unknown`] rather
    /// than falling back to a hardcoded fips when neither has an answer (§9).
    pub fn locator(&mut self, pos: Position) -> Result<u32> {
        if let Some(fips) = self.active_fips {
            if let Some(container) = self.cache.get_mut(fips) {
                if container.edges().contains(&pos) {
                    return Ok(fips);
                }
            }
        }
        self.base_map.locator_by_position(&pos).into_iter().next().ok_or(EmdbError::Unknown)
    }

    fn active_container(&mut self) -> Result<&mut Container> {
        let fips = self.active_fips.ok_or(EmdbError::NoActiveContainer)?;
        Ok(self.cache.get_mut(fips).expect("active fips not cached"))
    }

    fn active_edges(&mut self) -> Result<Area> {
        Ok(self.active_container()?.edges())
    }

    /// Runs `op` against the active container, growing and retrying once if
    /// it reports `Full`/`PoolFull`. Every mutating entity method below is a
    /// thin wrapper around this.
    fn mutate<T>(&mut self, op: impl Fn(&mut [u8], usize, u32, &Layout) -> Result<T>) -> Result<T> {
        let fips = self.active_fips.ok_or(EmdbError::NoActiveContainer)?;
        let config = self.config.clone();

        {
            let container = self.cache.get_mut(fips).expect("active fips not cached");
            let layout = container.layout().clone();
            let block_size = Header::block_size(container.buf());
            let pool_offset = layout.pool_offset;
            match op(container.buf_mut(), pool_offset, block_size, &layout) {
                Err(EmdbError::Full) | Err(EmdbError::PoolFull) => {}
                Err(e) => return Err(e),
                Ok(v) => {
                    container.note_write(&config)?;
                    return Ok(v);
                }
            }
            container.grow(&config)?;
        }

        let container = self.cache.get_mut(fips).expect("active fips not cached");
        let layout = container.layout().clone();
        let block_size = Header::block_size(container.buf());
        let pool_offset = layout.pool_offset;
        let v = op(container.buf_mut(), pool_offset, block_size, &layout)?;
        container.note_write(&config)?;
        Ok(v)
    }

    fn read<T>(&mut self, op: impl FnOnce(&mut [u8], usize, u32, &Layout) -> Result<T>) -> Result<T> {
        let container = self.active_container()?;
        let layout = container.layout().clone();
        let block_size = Header::block_size(container.buf());
        let pool_offset = layout.pool_offset;
        op(container.buf_mut(), pool_offset, block_size, &layout)
    }

    pub fn point_add(&mut self, position: Position, flags: i32, base_id: i32) -> Result<u32> {
        self.mutate(move |buf, pool, bs, layout| point::add(buf, pool, bs, &layout.section(SectionId::Points), position, flags, base_id))
    }

    pub fn point_position(&mut self, id: u32) -> Result<Position> {
        self.read(move |buf, pool, bs, layout| point::position(buf, pool, bs, &layout.section(SectionId::Points), id))
    }

    /// `editor_point_get_from_db_id`: the editor point mirroring base-map
    /// point `base_point`, creating the point and its del-point bridge entry
    /// the first time it's touched.
    pub fn base_id_to_editor(&mut self, base_point: i32) -> Result<i32> {
        if let Some(id) = self.read(move |buf, pool, bs, layout| point::editor_id_for_base(buf, pool, bs, &layout.section(SectionId::PointsDel), base_point))? {
            return Ok(id);
        }

        let position = self.base_map.point_position(base_point);
        let editor_id = self.mutate(move |buf, pool, bs, layout| point::add(buf, pool, bs, &layout.section(SectionId::Points), position, point::FLAG_SHARED, base_point))?;

        self.mutate(move |buf, pool, bs, layout| {
            let del_points = layout.section(SectionId::PointsDel);
            match point::lookup_del_point(buf, pool, bs, &del_points, base_point)? {
                Ok(existing) => Ok(existing),
                Err(at) => {
                    point::insert_del_point(buf, pool, bs, &del_points, at, base_point, editor_id as i32)?;
                    Ok(editor_id as i32)
                }
            }
        })
    }

    /// `editor_line_add`: builds the trkseg carrying `shape_deltas`, appends
    /// the line record, and registers it in the spatial index.
    pub fn line_add(&mut self, point_from: i32, point_to: i32, shape_deltas: &[(i32, i32)], cfcc: i32, flags: i32) -> Result<u32> {
        let from_pos = self.point_position(point_from as u32)?;
        let to_pos = self.point_position(point_to as u32)?;
        let config = self.config.clone();
        let edges = self.active_edges()?;

        self.mutate(move |buf, pool, bs, layout| {
            let shapes = layout.section(SectionId::Shapes);
            let trksegs = layout.section(SectionId::Trksegs);
            let lines = layout.section(SectionId::Lines);
            let squares_layout = layout.section(SectionId::Squares);

            let mut first_shape = -1i32;
            let mut last_shape = -1i32;
            for &(dlon, dlat) in shape_deltas {
                let id = shape::add(buf, pool, bs, &shapes, dlon, dlat)? as i32;
                if first_shape == -1 {
                    first_shape = id;
                }
                last_shape = id;
            }

            let trkseg_id = trkseg::add(buf, pool, bs, &trksegs, -1, -1, point_from, first_shape, last_shape, 0, 0, 0)?;
            trkseg::set_point_to(buf, pool, bs, &trksegs, trkseg_id, point_to)?;

            let line_id = line::add(buf, pool, bs, &lines, point_from, point_to, trkseg_id as i32, cfcc, flags)?;
            trkseg::set_line(buf, pool, bs, &trksegs, trkseg_id as i32, line_id as i32, -1)?;

            let shape_positions = shape::positions(buf, pool, bs, &shapes, from_pos, first_shape, last_shape)?;
            squares::add_line(buf, pool, bs, &squares_layout, layout, edges, &config, line_id as i32, from_pos, &shape_positions, to_pos, cfcc as u32)?;

            Ok(line_id)
        })
    }

    pub fn line_length(&mut self, id: u32) -> Result<f64> {
        self.read(move |buf, pool, bs, layout| {
            line::length(
                buf,
                pool,
                bs,
                &layout.section(SectionId::Lines),
                &layout.section(SectionId::Points),
                &layout.section(SectionId::Trksegs),
                &layout.section(SectionId::Shapes),
                id,
            )
        })
    }

    /// `editor_line_split`, plus carrying the street range and route overlay
    /// onto the new tail line: the range is cloned and redistributed over
    /// both halves by length (§4.8), the route segment is cloned verbatim.
    pub fn line_split(&mut self, line_id: u32, previous_point: Position, split_position: Position) -> Result<(i32, i32)> {
        self.mutate(move |buf, pool, bs, layout| {
            let lines = layout.section(SectionId::Lines);
            let points = layout.section(SectionId::Points);
            let trksegs = layout.section(SectionId::Trksegs);
            let shapes = layout.section(SectionId::Shapes);
            let ranges = layout.section(SectionId::Ranges);
            let routes = layout.section(SectionId::Routes);

            let (street_id, old_range_id) = line::get_street(buf, pool, bs, &lines, line_id)?;
            let old_route_id = line::get_route(buf, pool, bs, &lines, line_id)?;

            let split = line::split(buf, pool, bs, &lines, &points, &trksegs, &shapes, line_id, split_position, previous_point)?;
            let created_line = split.created_line as u32;

            if old_range_id >= 0 {
                let original = street::range_get(buf, pool, bs, &ranges, old_range_id as u32)?;
                let new_range_id = street::copy_range(buf, pool, bs, &ranges, old_range_id)?;
                line::set_street(buf, pool, bs, &lines, created_line, street_id, new_range_id)?;
                street::distribute_range(
                    buf,
                    pool,
                    bs,
                    &lines,
                    &points,
                    &trksegs,
                    &shapes,
                    &ranges,
                    &[line_id, created_line],
                    original.left_from,
                    original.left_to,
                    original.right_from,
                    original.right_to,
                )?;
            }

            if old_route_id >= 0 {
                let new_route_id = route::copy(buf, pool, bs, &routes, old_route_id)?;
                line::set_route(buf, pool, bs, &lines, created_line, new_route_id)?;
            }

            Ok((split.new_point, split.returned_line))
        })
    }

    /// `editor_line_copy`: pulls a base-map line into the editor so it can be
    /// edited, and marks the base-map line overridden-and-deleted so queries
    /// prefer the editor copy. Builds two trksegs on the new line's road
    /// list: a `FAKE|NO_GLOBAL` one recording the override point, and an
    /// "initial" one the caller's subsequent edits extend — mirroring
    /// `editor_line_copy`'s two-trkseg seam between "what the base map had"
    /// and "what the user has changed since".
    ///
    /// [`BaseMapReader::line_shapes`] is scoped per spatial square rather
    /// than per line, so unlike the source this does not copy the base-map
    /// line's intermediate shape points — only its endpoints, street, range,
    /// and route overlay. A caller that needs the original geometry recovers
    /// it by querying the base map directly before it's marked deleted.
    pub fn line_copy(&mut self, base_line: i32, cfcc: i32) -> Result<u32> {
        let (base_from, base_to) = self.base_map.line_points(base_line);
        let editor_from = self.base_id_to_editor(base_from)?;
        let editor_to = self.base_id_to_editor(base_to)?;

        let route_flags = self.base_map.line_route_get_flags(base_line);
        let speed_limits = self.base_map.line_route_get_speed_limit(base_line);
        let props = self.base_map.street_get_properties(base_line);

        self.mutate(move |buf, pool, bs, layout| {
            let lines = layout.section(SectionId::Lines);
            let trksegs = layout.section(SectionId::Trksegs);
            let routes = layout.section(SectionId::Routes);
            let streets = layout.section(SectionId::Streets);
            let ranges = layout.section(SectionId::Ranges);
            let override_index = layout.section(SectionId::OverrideIndex);
            let override_data = layout.section(SectionId::OverrideData);

            let streets_dict = DictCtx::new(layout, bs, Volume::Streets);
            let cities_dict = DictCtx::new(layout, bs, Volume::Cities);
            let zips_dict = DictCtx::new(layout, bs, Volume::Zips);
            let t2s_dict = DictCtx::new(layout, bs, Volume::T2s);

            let fake = trkseg::add(buf, pool, bs, &trksegs, -1, -1, editor_from, -1, -1, 0, 0, trkseg::FLAG_FAKE | trkseg::FLAG_NO_GLOBAL)?;
            let initial = trkseg::add(buf, pool, bs, &trksegs, -1, -1, editor_from, -1, -1, 0, 0, 0)?;
            trkseg::connect_roads(buf, pool, bs, &trksegs, fake, initial as i32)?;

            let line_id = line::add(buf, pool, bs, &lines, editor_from, editor_to, fake as i32, cfcc, 0)?;
            line::set_trksegs(buf, pool, bs, &lines, line_id, fake as i32, initial as i32)?;
            trkseg::set_line(buf, pool, bs, &trksegs, fake as i32, line_id as i32, -1)?;

            let route_id = route::add(
                buf,
                pool,
                bs,
                &routes,
                RouteSegment {
                    from_flags: route_flags.from_flags as u16,
                    to_flags: route_flags.to_flags as u16,
                    from_speed_limit: speed_limits.from as u16,
                    to_speed_limit: speed_limits.to as u16,
                },
            )?;

            let street_id = street::create(buf, pool, bs, &streets, &streets_dict, &t2s_dict, &props.fename, &props.fetype, &props.fedirp, &props.fedirs, &props.t2s)?;
            let left_city = dictionary::add(buf, &cities_dict, &props.left_city)?;
            let right_city = dictionary::add(buf, &cities_dict, &props.right_city)?;
            let left_zip = dictionary::add(buf, &zips_dict, &props.left_zip)?;
            let right_zip = dictionary::add(buf, &zips_dict, &props.right_zip)?;
            let range_id = street::range_add(
                buf,
                pool,
                bs,
                &ranges,
                street::Range {
                    left_city,
                    left_zip,
                    left_from: props.left_from,
                    left_to: props.left_to,
                    right_city,
                    right_zip,
                    right_from: props.right_from,
                    right_to: props.right_to,
                },
            )?;

            line::set_street(buf, pool, bs, &lines, line_id, street_id as i32, range_id as i32)?;
            line::set_route(buf, pool, bs, &lines, line_id, route_id as i32)?;

            overrides::set_flags(buf, pool, bs, &override_index, &override_data, base_line as u32, overrides::FLAG_OVERRIDDEN | overrides::FLAG_DELETED)?;
            overrides::set_trksegs(buf, pool, bs, &override_index, &override_data, base_line as u32, fake as i32, fake as i32)?;

            Ok(line_id)
        })
    }

    pub fn override_flags(&mut self, base_line: u32) -> Result<i32> {
        self.read(move |buf, pool, bs, layout| overrides::get_flags(buf, pool, bs, &layout.section(SectionId::OverrideIndex), &layout.section(SectionId::OverrideData), base_line))
    }

    pub fn override_route(&mut self, base_line: u32) -> Result<i32> {
        self.read(move |buf, pool, bs, layout| overrides::get_route(buf, pool, bs, &layout.section(SectionId::OverrideIndex), &layout.section(SectionId::OverrideData), base_line))
    }

    pub fn squares_get_closest(&mut self, pos: Position, categories: u32, max: usize) -> Result<Vec<squares::Neighbour>> {
        let config = self.config.clone();
        let edges = self.active_edges()?;
        self.read(move |buf, pool, bs, layout| squares::get_closest(buf, pool, bs, &layout.section(SectionId::Squares), layout, edges, &config, pos, categories, max))
    }

    pub fn street_full_name(&mut self, street_id: u32) -> Result<String> {
        self.read(move |buf, pool, bs, layout| {
            let street = street::get(buf, pool, bs, &layout.section(SectionId::Streets), street_id)?;
            let ctx = DictCtx::new(layout, bs, Volume::Streets);
            street::full_name(buf, &ctx, street)
        })
    }

    pub fn marker_add(&mut self, position: Position, steering: i16, time: i32, marker_type: u8, note: &str) -> Result<u32> {
        self.mutate(move |buf, pool, bs, layout| {
            let markers = layout.section(SectionId::Markers);
            let notes = DictCtx::new(layout, bs, Volume::Notes);
            marker::add(buf, pool, bs, &markers, &notes, position, steering, time, marker_type, note)
        })
    }

    pub fn marker_get(&mut self, id: u32) -> Result<Marker> {
        self.read(move |buf, pool, bs, layout| marker::get(buf, pool, bs, &layout.section(SectionId::Markers), id))
    }

    pub fn marker_note(&mut self, m: Marker) -> Result<Option<String>> {
        self.read(move |buf, _pool, bs, layout| {
            let notes = DictCtx::new(layout, bs, Volume::Notes);
            marker::note(buf, &notes, m)
        })
    }

    pub fn marker_mark_deleted(&mut self, id: u32) -> Result<()> {
        self.mutate(move |buf, pool, bs, layout| marker::mark_deleted(buf, pool, bs, &layout.section(SectionId::Markers), id))
    }

    pub fn marker_set_position(&mut self, id: u32, position: Position) -> Result<()> {
        self.mutate(move |buf, pool, bs, layout| marker::set_position(buf, pool, bs, &layout.section(SectionId::Markers), id, position))
    }

    /// `editor_marker_update`: updates a marker's flags/note and dispatches
    /// to its registered [`marker::MarkerTypeHandler`], if any.
    pub fn marker_update(&mut self, id: u32, flags: i32, note: &str) -> Result<()> {
        self.mutate(move |buf, pool, bs, layout| {
            let markers = layout.section(SectionId::Markers);
            let notes = DictCtx::new(layout, bs, Volume::Notes);
            marker::update(buf, pool, bs, &markers, &notes, id, flags, note)
        })?;

        let m = self.marker_get(id)?;
        let note_text = self.marker_note(m)?;
        self.marker_registry.dispatch_update(&m, note_text.as_deref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basemap::{FakeBaseMap, LineRouteFlags, SpeedLimits, StreetProps};
    use tempfile::tempdir;

    fn small_config(dir: &std::path::Path) -> Config {
        Config {
            base_dir: dir.to_path_buf(),
            block_size: 512,
            initial_blocks: 8,
            grow_guard: 1,
            max_points: 32,
            max_shapes: 32,
            max_streets: 16,
            max_lines: 16,
            dictionary_index_size: 64,
            dictionary_data_size: 256,
            square_step: 100_000,
            ..Config::default()
        }
    }

    fn edges() -> Area {
        Area { west: 0, south: 0, east: 1_000_000, north: 1_000_000 }
    }

    #[test]
    fn activate_unknown_fips_is_not_found() {
        let dir = tempdir().unwrap();
        let config = small_config(dir.path());
        let mut db = EditorDb::new(config, FakeBaseMap::new("2020-01-01"));
        assert!(matches!(db.activate(77001), Err(EmdbError::NotFound(77001))));
        assert!(matches!(db.activate(77001), Err(EmdbError::NoCounty(77001))));
    }

    #[test]
    fn create_then_activate_round_trips_and_checks_version() {
        let dir = tempdir().unwrap();
        let config = small_config(dir.path());
        let base_map = FakeBaseMap::new("2020-01-01").with_county(77001, edges());
        let mut db = EditorDb::new(config, base_map);

        db.create(77001, edges()).unwrap();
        db.active_fips = None;
        db.cache = CountyCache::new(&db.config);
        db.activate(77001).unwrap();
        assert_eq!(db.active_fips(), Some(77001));

        db.base_map_mut().map_date = "2020-02-02".to_string();
        db.active_fips = None;
        db.cache = CountyCache::new(&db.config);
        assert!(matches!(db.activate(77001), Err(EmdbError::VersionMismatch { .. })));
    }

    #[test]
    fn point_add_and_base_id_to_editor_is_idempotent() {
        let dir = tempdir().unwrap();
        let config = small_config(dir.path());
        let base_map = FakeBaseMap::new("d").with_county(1, edges());
        let mut db = EditorDb::new(config, base_map);
        db.create(1, edges()).unwrap();
        db.activate(1).unwrap();

        db.base_map_mut().lines.push((Position { longitude: 10, latitude: 20 }, Position { longitude: 30, latitude: 40 }));

        let first = db.base_id_to_editor(0).unwrap();
        let second = db.base_id_to_editor(0).unwrap();
        assert_eq!(first, second);
        assert_eq!(db.point_position(first as u32).unwrap(), Position { longitude: 10, latitude: 20 });
    }

    #[test]
    fn line_add_then_split_carries_range_and_route() {
        let dir = tempdir().unwrap();
        let config = small_config(dir.path());
        let base_map = FakeBaseMap::new("d").with_county(1, edges());
        let mut db = EditorDb::new(config, base_map);
        db.create(1, edges()).unwrap();
        db.activate(1).unwrap();

        let p0 = db.point_add(Position { longitude: 0, latitude: 0 }, 0, -1).unwrap();
        let p1 = db.point_add(Position { longitude: 200, latitude: 0 }, 0, -1).unwrap();
        let line_id = db.line_add(p0 as i32, p1 as i32, &[], 3, 0).unwrap();

        let (_, new_line) = db
            .line_split(line_id, Position { longitude: 0, latitude: 0 }, Position { longitude: 100, latitude: 0 })
            .unwrap();
        assert_ne!(new_line, line_id as i32);

        let len_a = db.line_length(line_id).unwrap();
        let len_b = db.line_length(new_line as u32).unwrap();
        assert!((len_a + len_b - 200.0).abs() < 1.0);
    }

    #[test]
    fn line_copy_overrides_the_base_map_line() {
        let dir = tempdir().unwrap();
        let config = small_config(dir.path());
        let mut base_map = FakeBaseMap::new("d").with_county(1, edges());
        base_map.lines.push((Position { longitude: 0, latitude: 0 }, Position { longitude: 500, latitude: 0 }));
        base_map.route_flags.push(LineRouteFlags { from_flags: route::CAR as i16, to_flags: 0 });
        base_map.speed_limits.push(SpeedLimits { from: 45, to: 45 });
        base_map.street_props.push(StreetProps { fename: "Main".into(), fetype: "St".into(), ..Default::default() });

        let mut db = EditorDb::new(config, base_map);
        db.create(1, edges()).unwrap();
        db.activate(1).unwrap();

        db.line_copy(0, 4).unwrap();
        assert_eq!(db.override_flags(0).unwrap(), overrides::FLAG_OVERRIDDEN | overrides::FLAG_DELETED);
        assert_eq!(db.street_full_name(0).unwrap(), "Main St");
    }

    #[test]
    fn marker_update_only_dirties_on_real_change() {
        let dir = tempdir().unwrap();
        let config = small_config(dir.path());
        let mut db = EditorDb::new(config, FakeBaseMap::new("d"));
        db.create(1, edges()).unwrap();
        db.activate(1).unwrap();

        let id = db.marker_add(Position { longitude: 1, latitude: 1 }, 0, 0, 0, "hazard").unwrap();
        db.marker_update(id, 0, "hazard").unwrap();
        assert_eq!(db.marker_get(id).unwrap().flags & marker::FLAG_DIRTY, 0);

        db.marker_update(id, 0, "construction").unwrap();
        assert_eq!(db.marker_get(id).unwrap().flags & marker::FLAG_DIRTY, marker::FLAG_DIRTY);
    }
}
