//! `BaseMapReader`: the read-only collaborator the EMDB depends on for
//! county edges, base-map line/point geometry, and street metadata (§6).
//!
//! The EMDB never implements this trait itself — it is a narrow interface
//! onto an external, much larger read-only map reader. Expressing it as a
//! trait keeps the container code testable against [`FakeBaseMap`] without
//! pulling in that larger system.

use crate::geometry::{Area, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineRouteFlags {
    pub from_flags: i16,
    pub to_flags: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpeedLimits {
    pub from: i16,
    pub to: i16,
}

/// A base-map street's descriptive fields, as handed back by
/// `street_get_properties`. String fields are returned already resolved
/// (the base map has its own dictionary, distinct from the editor's).
#[derive(Debug, Clone, Default)]
pub struct StreetProps {
    pub fename: String,
    pub fetype: String,
    pub fedirp: String,
    pub fedirs: String,
    pub t2s: String,
    pub left_city: String,
    pub right_city: String,
    pub left_zip: String,
    pub right_zip: String,
    pub left_from: i32,
    pub left_to: i32,
    pub right_from: i32,
    pub right_to: i32,
}

pub trait BaseMapReader {
    /// Activates the base-map's own internal state for `fips`. `Ok(())` on
    /// success; `Err(())` mirrors the source's `ROADMAP_US_OK` check.
    fn locator_activate(&mut self, fips: u32) -> Result<(), ()>;

    /// Currently active base-map fips, or `None` if nothing is active.
    fn locator_active(&self) -> Option<u32>;

    fn county_get_edges(&self, fips: u32) -> Option<Area>;

    /// All fips whose edges contain `pos`, in the base map's own preference order.
    fn locator_by_position(&self, pos: &Position) -> Vec<u32>;

    fn line_points(&self, line: i32) -> (i32, i32);
    fn line_from(&self, line: i32) -> Position;
    fn line_to(&self, line: i32) -> Position;
    fn line_length(&self, line: i32) -> i32;
    fn line_count(&self) -> i32;
    /// Shape point range `(first, last)` touching `square`, inclusive.
    fn line_shapes(&self, line: i32, square: i32) -> (i32, i32);

    fn point_position(&self, point: i32) -> Position;
    /// Stable id a point keeps across base-map rebuilds.
    fn point_db_id(&self, point: i32) -> i32;

    fn line_route_get_flags(&self, line: i32) -> LineRouteFlags;
    fn line_route_get_speed_limit(&self, line: i32) -> SpeedLimits;

    fn street_get_properties(&self, line: i32) -> StreetProps;

    fn metadata_get_attribute(&self, category: &str, name: &str) -> Option<String>;
}

/// An in-memory [`BaseMapReader`] for unit and scenario tests.
#[derive(Debug, Default)]
pub struct FakeBaseMap {
    pub active_fips: Option<u32>,
    pub edges: std::collections::HashMap<u32, Area>,
    pub map_date: String,
    pub lines: Vec<(Position, Position)>,
    pub route_flags: Vec<LineRouteFlags>,
    pub speed_limits: Vec<SpeedLimits>,
    pub street_props: Vec<StreetProps>,
}

impl FakeBaseMap {
    pub fn new(map_date: impl Into<String>) -> Self {
        FakeBaseMap { map_date: map_date.into(), ..Default::default() }
    }

    pub fn with_county(mut self, fips: u32, edges: Area) -> Self {
        self.edges.insert(fips, edges);
        self
    }
}

impl BaseMapReader for FakeBaseMap {
    fn locator_activate(&mut self, fips: u32) -> Result<(), ()> {
        if self.edges.contains_key(&fips) {
            self.active_fips = Some(fips);
            Ok(())
        } else {
            Err(())
        }
    }

    fn locator_active(&self) -> Option<u32> {
        self.active_fips
    }

    fn county_get_edges(&self, fips: u32) -> Option<Area> {
        self.edges.get(&fips).copied()
    }

    fn locator_by_position(&self, pos: &Position) -> Vec<u32> {
        let mut hits: Vec<u32> = self.edges.iter().filter(|(_, a)| a.contains(pos)).map(|(f, _)| *f).collect();
        hits.sort_unstable();
        hits
    }

    fn line_points(&self, line: i32) -> (i32, i32) {
        let _ = line;
        (0, 1)
    }

    fn line_from(&self, line: i32) -> Position {
        self.lines[line as usize].0
    }

    fn line_to(&self, line: i32) -> Position {
        self.lines[line as usize].1
    }

    fn line_length(&self, line: i32) -> i32 {
        let (a, b) = self.lines[line as usize];
        crate::geometry::distance(&a, &b) as i32
    }

    fn line_count(&self) -> i32 {
        self.lines.len() as i32
    }

    fn line_shapes(&self, _line: i32, _square: i32) -> (i32, i32) {
        (-1, -1)
    }

    fn point_position(&self, point: i32) -> Position {
        if point % 2 == 0 {
            self.lines[(point / 2) as usize].0
        } else {
            self.lines[(point / 2) as usize].1
        }
    }

    fn point_db_id(&self, point: i32) -> i32 {
        point
    }

    fn line_route_get_flags(&self, line: i32) -> LineRouteFlags {
        self.route_flags.get(line as usize).copied().unwrap_or_default()
    }

    fn line_route_get_speed_limit(&self, line: i32) -> SpeedLimits {
        self.speed_limits.get(line as usize).copied().unwrap_or_default()
    }

    fn street_get_properties(&self, line: i32) -> StreetProps {
        self.street_props.get(line as usize).cloned().unwrap_or_default()
    }

    fn metadata_get_attribute(&self, category: &str, name: &str) -> Option<String> {
        match (category, name) {
            ("Version", "Date") => Some(self.map_date.clone()),
            _ => None,
        }
    }
}
