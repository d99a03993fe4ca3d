//! Markers (§4.6, §4.8): an independent append-only log of user-placed POIs,
//! each optionally carrying a free-text note interned in the `notes`
//! dictionary volume.
//!
//! Grounded in `editor_marker.c`. Unlike every other entity, a marker's
//! behavior on export/update is pluggable: callers register a handler per
//! `marker_type` (bookmarks, speed-cameras, alerts, ...) at process startup,
//! and [`export`]/[`update`] dispatch to whichever handler owns that type.
//! The source caps this at `MAX_MARKER_TYPES` registered types; [`Registry`]
//! enforces the same cap.

use crate::byteio::*;
use crate::config::MAX_MARKER_TYPES;
use crate::dictionary::{self, DictCtx};
use crate::error::{EmdbError, Result};
use crate::geometry::Position;
use crate::layout::SectionLayout;
use crate::section;

pub const FLAG_DELETED: i32 = 0x1;
pub const FLAG_DIRTY: i32 = 0x2;

const OFF_LON: usize = 0;
const OFF_LAT: usize = 4;
const OFF_TIME: usize = 8;
const OFF_NOTE: usize = 12;
const OFF_STEERING: usize = 16;
const OFF_TYPE: usize = 18;
const OFF_FLAGS: usize = 19;

#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub position: Position,
    pub steering: i16,
    pub time: i32,
    pub marker_type: u8,
    pub flags: i32,
    pub note_id: i32,
}

fn encode(m: Marker) -> [u8; 20] {
    let mut b = [0u8; 20];
    write_i32_at(&mut b, OFF_LON, m.position.longitude);
    write_i32_at(&mut b, OFF_LAT, m.position.latitude);
    write_i32_at(&mut b, OFF_TIME, m.time);
    write_i32_at(&mut b, OFF_NOTE, m.note_id);
    write_i16_at(&mut b, OFF_STEERING, m.steering);
    write_u8_at(&mut b, OFF_TYPE, m.marker_type);
    write_u8_at(&mut b, OFF_FLAGS, m.flags as u8);
    b
}

fn decode(buf: &[u8], addr: usize) -> Marker {
    Marker {
        position: Position { longitude: read_i32_at(buf, addr + OFF_LON), latitude: read_i32_at(buf, addr + OFF_LAT) },
        time: read_i32_at(buf, addr + OFF_TIME),
        note_id: read_i32_at(buf, addr + OFF_NOTE),
        steering: read_i16_at(buf, addr + OFF_STEERING),
        marker_type: read_u8_at(buf, addr + OFF_TYPE),
        flags: read_u8_at(buf, addr + OFF_FLAGS) as i32,
    }
}

fn addr_of(buf: &mut [u8], pool_offset: usize, block_size: u32, markers: &SectionLayout, id: u32) -> Result<usize> {
    section::get(buf, pool_offset, block_size, markers, id, false, None)
}

pub fn get(buf: &mut [u8], pool_offset: usize, block_size: u32, markers: &SectionLayout, id: u32) -> Result<Marker> {
    let addr = addr_of(buf, pool_offset, block_size, markers, id)?;
    Ok(decode(buf, addr))
}

fn set(buf: &mut [u8], pool_offset: usize, block_size: u32, markers: &SectionLayout, id: u32, m: Marker) -> Result<()> {
    let addr = addr_of(buf, pool_offset, block_size, markers, id)?;
    buf[addr..addr + 20].copy_from_slice(&encode(m));
    Ok(())
}

/// `editor_marker_add`: interns `note` (if non-empty) into the `notes`
/// volume and appends the marker record.
#[allow(clippy::too_many_arguments)]
pub fn add(
    buf: &mut [u8],
    pool_offset: usize,
    block_size: u32,
    markers: &SectionLayout,
    notes: &DictCtx,
    position: Position,
    steering: i16,
    time: i32,
    marker_type: u8,
    note: &str,
) -> Result<u32> {
    let note_id = if note.is_empty() { -1 } else { dictionary::add(buf, notes, note)? };
    let record = Marker { position, steering, time, marker_type, flags: 0, note_id };
    section::append(buf, pool_offset, block_size, markers, &encode(record))
}

pub fn mark_deleted(buf: &mut [u8], pool_offset: usize, block_size: u32, markers: &SectionLayout, id: u32) -> Result<()> {
    let mut m = get(buf, pool_offset, block_size, markers, id)?;
    m.flags |= FLAG_DELETED;
    set(buf, pool_offset, block_size, markers, id, m)
}

pub fn set_position(buf: &mut [u8], pool_offset: usize, block_size: u32, markers: &SectionLayout, id: u32, position: Position) -> Result<()> {
    let mut m = get(buf, pool_offset, block_size, markers, id)?;
    m.position = position;
    set(buf, pool_offset, block_size, markers, id, m)
}

/// `editor_marker_update`: rewrites `flags`/`note`, setting [`FLAG_DIRTY`]
/// only if either actually changed from what's stored — an unchanged update
/// (the UI saves a marker dialog without editing anything) shouldn't mark it
/// dirty for export.
pub fn update(buf: &mut [u8], pool_offset: usize, block_size: u32, markers: &SectionLayout, notes: &DictCtx, id: u32, flags: i32, note: &str) -> Result<()> {
    let mut m = get(buf, pool_offset, block_size, markers, id)?;
    let existing_note = self::note(buf, notes, m)?.unwrap_or_default();

    let note_id = if note.is_empty() {
        -1
    } else if note == existing_note {
        m.note_id
    } else {
        dictionary::add(buf, notes, note)?
    };

    let requested = flags & !FLAG_DIRTY;
    let stored = m.flags & !FLAG_DIRTY;
    let changed = requested != stored || note_id != m.note_id;

    m.flags = if changed { requested | FLAG_DIRTY } else { m.flags };
    m.note_id = note_id;
    set(buf, pool_offset, block_size, markers, id, m)
}

/// The marker's note text, if any (`note_id == -1` means no note was set).
pub fn note(buf: &mut [u8], notes: &DictCtx, marker: Marker) -> Result<Option<String>> {
    if marker.note_id < 0 {
        return Ok(None);
    }
    dictionary::get(buf, notes, marker.note_id)
}

/// Export/update hooks one marker type registers at startup
/// (`editor_marker_type_register` in the source).
pub trait MarkerTypeHandler {
    /// Called when the marker set is exported (e.g. to GPX); the source
    /// passes this to the export subsystem, out of scope here (§1).
    fn on_export(&self, marker: &Marker, note: Option<&str>);
    /// Called whenever a marker of this type is edited.
    fn on_update(&self, marker: &Marker, note: Option<&str>);
}

/// Bounded table of registered marker-type handlers, indexed by
/// `marker_type` (`0..MAX_MARKER_TYPES`).
#[derive(Default)]
pub struct Registry {
    handlers: Vec<Option<Box<dyn MarkerTypeHandler>>>,
}

impl Registry {
    pub fn new() -> Registry {
        let mut handlers = Vec::with_capacity(MAX_MARKER_TYPES);
        handlers.resize_with(MAX_MARKER_TYPES, || None);
        Registry { handlers }
    }

    /// `editor_marker_type_register`: binds `handler` to `marker_type`.
    /// Fails if `marker_type` is out of range or already taken — the source
    /// treats a double registration as a programmer error.
    pub fn register(&mut self, marker_type: u8, handler: Box<dyn MarkerTypeHandler>) -> Result<()> {
        let slot = self
            .handlers
            .get_mut(marker_type as usize)
            .ok_or_else(|| EmdbError::Corruption(format!("marker type {marker_type} exceeds MAX_MARKER_TYPES")))?;
        if slot.is_some() {
            return Err(EmdbError::Corruption(format!("marker type {marker_type} already registered")));
        }
        *slot = Some(handler);
        Ok(())
    }

    pub fn dispatch_export(&self, marker: &Marker, note: Option<&str>) {
        if let Some(Some(handler)) = self.handlers.get(marker.marker_type as usize) {
            handler.on_export(marker, note);
        }
    }

    pub fn dispatch_update(&self, marker: &Marker, note: Option<&str>) {
        if let Some(Some(handler)) = self.handlers.get(marker.marker_type as usize) {
            handler.on_update(marker, note);
        }
    }
}
