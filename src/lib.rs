//! EMDB — a memory-mapped, block-paged, county-scoped container for a
//! mobile map editor's local edit layer.
//!
//! Each county the user has edited gets its own on-disk container: a
//! header, a shared fixed-size block pool, and a fixed set of
//! record-oriented sections (points, shapes, lines, trksegs, streets,
//! ranges, routes, overrides, markers) plus a handful of string
//! dictionary volumes. Containers are opened lazily, kept warm in a
//! bounded [`cache::CountyCache`], and grown by truncate-and-reopen
//! when a section runs out of room — there is no compaction and no
//! transaction log; [`editor_db::EditorDb`] is the only supported entry
//! point into a container once it exists.
//!
//! The base map itself (the read-only road network the edit layer sits
//! on top of) is not part of this crate; callers provide one through
//! the [`basemap::BaseMapReader`] trait.

mod basemap;
mod blockpool;
mod byteio;
mod cache;
mod config;
mod container;
mod dictionary;
mod editor_db;
mod error;
mod geometry;
mod header;
mod layout;
mod line;
mod marker;
mod overrides;
mod point;
mod route;
mod section;
mod shape;
mod squares;
mod street;
mod trkseg;

pub use basemap::{BaseMapReader, LineRouteFlags, SpeedLimits, StreetProps};
pub use config::Config;
pub use editor_db::EditorDb;
pub use error::{EmdbError, Result};
pub use geometry::{Area, Position};
pub use marker::{Marker, MarkerTypeHandler};
pub use overrides::Override;
pub use route::RouteSegment;
pub use squares::Neighbour;

#[cfg(any(test, feature = "test-support"))]
pub use basemap::FakeBaseMap;
