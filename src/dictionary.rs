//! String dictionary volumes (§4.5): a character search tree over interned,
//! case-insensitive ASCII strings, backed by three sections per volume
//! (`trees`, `references`, `data`) drawn from the shared block pool.
//!
//! Mirrors `editor_dictionary.c`: each tree node discriminates on one
//! character position; a `STRING` reference is a leaf, a `TREE` reference
//! descends to a child node at `position + 1`. Unlike the source, which
//! lazily initializes tree 0 on first search, [`init_volume`] is called once
//! per volume at container creation — the rest of the dictionary can then
//! assume tree 0 always exists.

use crate::byteio::*;
use crate::error::{EmdbError, Result};
use crate::layout::{Layout, Volume};
use crate::section;

pub type DictId = i32;

const OFF_TREE_FIRST: usize = 0;
const OFF_TREE_COUNT: usize = 4;
const OFF_TREE_POSITION: usize = 6;

const OFF_REF_CHARACTER: usize = 0;
const OFF_REF_KIND: usize = 1;
const OFF_REF_CHILD: usize = 4;
const OFF_REF_NEXT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    String,
    Tree,
}

impl RefKind {
    fn to_byte(self) -> u8 {
        match self {
            RefKind::String => 0,
            RefKind::Tree => 1,
        }
    }

    fn from_byte(b: u8) -> Result<RefKind> {
        match b {
            0 => Ok(RefKind::String),
            1 => Ok(RefKind::Tree),
            other => Err(EmdbError::Corruption(format!("bad dictionary reference kind {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Tree {
    first: i32,
    count: u16,
    position: u16,
}

#[derive(Debug, Clone, Copy)]
struct Reference {
    character: u8,
    kind: RefKind,
    child: i32,
    next: i32,
}

fn read_tree(buf: &[u8], addr: usize) -> Tree {
    Tree {
        first: read_i32_at(buf, addr + OFF_TREE_FIRST),
        count: read_u16_at(buf, addr + OFF_TREE_COUNT),
        position: read_u16_at(buf, addr + OFF_TREE_POSITION),
    }
}

fn write_tree(buf: &mut [u8], addr: usize, tree: Tree) {
    write_i32_at(buf, addr + OFF_TREE_FIRST, tree.first);
    write_u16_at(buf, addr + OFF_TREE_COUNT, tree.count);
    write_u16_at(buf, addr + OFF_TREE_POSITION, tree.position);
}

fn read_reference(buf: &[u8], addr: usize) -> Result<Reference> {
    Ok(Reference {
        character: read_u8_at(buf, addr + OFF_REF_CHARACTER),
        kind: RefKind::from_byte(read_u8_at(buf, addr + OFF_REF_KIND))?,
        child: read_i32_at(buf, addr + OFF_REF_CHILD),
        next: read_i32_at(buf, addr + OFF_REF_NEXT),
    })
}

fn write_reference(buf: &mut [u8], addr: usize, reference: Reference) {
    write_u8_at(buf, addr + OFF_REF_CHARACTER, reference.character);
    write_u8_at(buf, addr + OFF_REF_KIND, reference.kind.to_byte());
    write_i32_at(buf, addr + OFF_REF_CHILD, reference.child);
    write_i32_at(buf, addr + OFF_REF_NEXT, reference.next);
}

/// Section handles for one dictionary volume, resolved once from [`Layout`].
#[derive(Debug, Clone, Copy)]
pub struct DictCtx {
    pool_offset: usize,
    block_size: u32,
    trees: crate::layout::SectionLayout,
    references: crate::layout::SectionLayout,
    data: crate::layout::SectionLayout,
}

impl DictCtx {
    pub fn new(layout: &Layout, block_size: u32, volume: Volume) -> DictCtx {
        DictCtx {
            pool_offset: layout.pool_offset,
            block_size,
            trees: layout.section(volume.trees()),
            references: layout.section(volume.references()),
            data: layout.section(volume.data()),
        }
    }

    fn tree_addr(&self, buf: &mut [u8], id: i32) -> Result<usize> {
        section::get(buf, self.pool_offset, self.block_size, &self.trees, id as u32, false, None)
    }

    fn reference_addr(&self, buf: &mut [u8], id: i32) -> Result<usize> {
        section::get(buf, self.pool_offset, self.block_size, &self.references, id as u32, false, None)
    }

    fn data_byte_addr(&self, buf: &mut [u8], id: i32) -> Result<usize> {
        section::get(buf, self.pool_offset, self.block_size, &self.data, id as u32, false, None)
    }
}

/// Initializes a freshly created volume: tree 0 (root, `position=0`), the
/// empty string as id 0, and the sentinel reference `('\0', STRING, 0)` on
/// the root — mirrors `editor_dictionary_initialize`.
pub fn init_volume(buf: &mut [u8], ctx: &DictCtx) -> Result<()> {
    let string_id = section::allocate_range(buf, ctx.pool_offset, ctx.block_size, &ctx.data, 1)?;
    debug_assert_eq!(string_id, 0);
    let addr = ctx.data_byte_addr(buf, 0)?;
    buf[addr] = 0;

    let tree_id = section::append(
        buf,
        ctx.pool_offset,
        ctx.block_size,
        &ctx.trees,
        &encode_tree(Tree { first: -1, count: 0, position: 0 }),
    )?;
    debug_assert_eq!(tree_id, 0);

    add_reference(buf, ctx, 0, 0, RefKind::String, 0)?;
    Ok(())
}

fn encode_tree(tree: Tree) -> [u8; 8] {
    let mut b = [0u8; 8];
    write_tree(&mut b, 0, tree);
    b
}

fn encode_reference(reference: Reference) -> [u8; 12] {
    let mut b = [0u8; 12];
    write_reference(&mut b, 0, reference);
    b
}

fn find_reference(buf: &mut [u8], ctx: &DictCtx, first_ref: i32, character: u8) -> Result<Option<(usize, Reference)>> {
    let mut id = first_ref;
    while id != -1 {
        let addr = ctx.reference_addr(buf, id)?;
        let reference = read_reference(buf, addr)?;
        if reference.character == character {
            return Ok(Some((addr, reference)));
        }
        id = reference.next;
    }
    Ok(None)
}

fn add_reference(buf: &mut [u8], ctx: &DictCtx, tree_id: i32, character: u8, kind: RefKind, child: i32) -> Result<()> {
    let tree_addr = ctx.tree_addr(buf, tree_id)?;
    let tree = read_tree(buf, tree_addr);
    let reference_id = section::append(
        buf,
        ctx.pool_offset,
        ctx.block_size,
        &ctx.references,
        &encode_reference(Reference { character: character.to_ascii_lowercase(), kind, child, next: tree.first }),
    )?;
    let tree_addr = ctx.tree_addr(buf, tree_id)?;
    write_tree(buf, tree_addr, Tree { first: reference_id as i32, count: tree.count + 1, position: tree.position });
    Ok(())
}

fn read_cstring(buf: &mut [u8], ctx: &DictCtx, string_id: i32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut id = string_id;
    loop {
        let addr = ctx.data_byte_addr(buf, id)?;
        let b = buf[addr];
        if b == 0 {
            break;
        }
        out.push(b);
        id += 1;
    }
    Ok(out)
}

fn eq_ignore_ascii_case(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
}

/// Returns `(found_string_id, last_visited_tree_id)`. The second value feeds
/// [`add`]'s insertion logic even on a miss.
fn search(buf: &mut [u8], ctx: &DictCtx, s: &[u8]) -> Result<(Option<i32>, i32)> {
    let mut tree_id: i32 = 0;

    for (i, &raw) in s.iter().enumerate() {
        let tree_addr = ctx.tree_addr(buf, tree_id)?;
        let tree = read_tree(buf, tree_addr);
        if tree.position as usize != i {
            return Err(EmdbError::Corruption(format!(
                "dictionary tree {tree_id} position {} does not match expected {i}",
                tree.position
            )));
        }

        let ch = raw.to_ascii_lowercase();
        match find_reference(buf, ctx, tree.first, ch)? {
            None => return Ok((None, tree_id)),
            Some((_, reference)) => match reference.kind {
                RefKind::String => {
                    let stored = read_cstring(buf, ctx, reference.child)?;
                    if eq_ignore_ascii_case(&stored, s) {
                        return Ok((Some(reference.child), tree_id));
                    }
                    return Ok((None, tree_id));
                }
                RefKind::Tree => tree_id = reference.child,
            },
        }
    }

    let tree_addr = ctx.tree_addr(buf, tree_id)?;
    let tree = read_tree(buf, tree_addr);
    match find_reference(buf, ctx, tree.first, 0)? {
        Some((_, reference)) if reference.kind == RefKind::String => Ok((Some(reference.child), tree_id)),
        Some(_) => Err(EmdbError::Corruption("found a subtree after end of string".into())),
        None => Ok((None, tree_id)),
    }
}

/// `editor_dictionary_locate`: the string's id, or `None` if not interned.
pub fn locate(buf: &mut [u8], ctx: &DictCtx, s: &str) -> Result<Option<DictId>> {
    Ok(search(buf, ctx, s.as_bytes())?.0)
}

/// `editor_dictionary_get`: the interned string at `id`, case-preserved.
pub fn get(buf: &mut [u8], ctx: &DictCtx, id: DictId) -> Result<Option<String>> {
    if id < 0 || id as u32 >= section::num_items(buf, &ctx.data) {
        return Ok(None);
    }
    let bytes = read_cstring(buf, ctx, id)?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// `editor_dictionary_add`: interns `s`, returning its existing id on a
/// case-insensitive hit, or splitting the tree to make room for a new one.
pub fn add(buf: &mut [u8], ctx: &DictCtx, s: &str) -> Result<DictId> {
    let s = s.as_bytes();
    let (found, mut tree_id) = search(buf, ctx, s)?;
    if let Some(id) = found {
        return Ok(id);
    }

    let len = s.len();
    let string_id = section::allocate_range(buf, ctx.pool_offset, ctx.block_size, &ctx.data, (len + 1) as u32)?;
    for (i, &byte) in s.iter().enumerate() {
        let addr = ctx.data_byte_addr(buf, string_id as i32 + i as i32)?;
        buf[addr] = byte;
    }
    let nul_addr = ctx.data_byte_addr(buf, string_id as i32 + len as i32)?;
    buf[nul_addr] = 0;

    let char_at = |position: u16, s: &[u8]| -> u8 {
        if (position as usize) < s.len() {
            s[position as usize]
        } else {
            0
        }
    };

    let tree_addr = ctx.tree_addr(buf, tree_id)?;
    let mut tree = read_tree(buf, tree_addr);
    let mut character = char_at(tree.position, s);

    loop {
        let tree_addr = ctx.tree_addr(buf, tree_id)?;
        tree = read_tree(buf, tree_addr);

        match find_reference(buf, ctx, tree.first, character)? {
            None => break,
            Some((ref_addr, reference)) => {
                if reference.kind != RefKind::String {
                    return Err(EmdbError::Corruption("dictionary corrupted (incomplete search)".into()));
                }

                let existing = reference.child;
                let existing_str = read_cstring(buf, ctx, existing)?;
                let new_position = tree.position + 1;

                let new_tree_id = section::append(
                    buf,
                    ctx.pool_offset,
                    ctx.block_size,
                    &ctx.trees,
                    &encode_tree(Tree { first: -1, count: 0, position: new_position }),
                )?;

                let mut ref_buf = [0u8; 12];
                ref_buf.copy_from_slice(&buf[ref_addr..ref_addr + 12]);
                write_reference(&mut buf[ref_addr..ref_addr + 12], 0, Reference {
                    character: reference.character,
                    kind: RefKind::Tree,
                    child: new_tree_id as i32,
                    next: reference.next,
                });

                let existing_char = char_at(new_position, &existing_str);
                add_reference(buf, ctx, new_tree_id as i32, existing_char, RefKind::String, existing)?;

                tree_id = new_tree_id as i32;
                character = char_at(new_position, s);
            }
        }
    }

    add_reference(buf, ctx, tree_id, character, RefKind::String, string_id as i32)?;
    Ok(string_id as i32)
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

    fn fresh_volume(config: &Config) -> (Vec<u8>, DictCtx) {
        let (mut buf, layout) = fresh(config);
        let ctx = DictCtx::new(&layout, config.block_size, Volume::Streets);
        init_volume(&mut buf, &ctx).unwrap();
        (buf, ctx)
    }

    #[test]
    fn case_insensitive_dedup() {
        let config = Config::default();
        let (mut buf, ctx) = fresh_volume(&config);

        let a = add(&mut buf, &ctx, "Main").unwrap();
        let b = add(&mut buf, &ctx, "main").unwrap();
        let c = add(&mut buf, &ctx, "MAIN").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(get(&mut buf, &ctx, a).unwrap().as_deref(), Some("Main"));
    }

    #[test]
    fn shared_prefix_gets_distinct_id() {
        let config = Config::default();
        let (mut buf, ctx) = fresh_volume(&config);

        let main = add(&mut buf, &ctx, "Main").unwrap();
        let mainly = add(&mut buf, &ctx, "Mainly").unwrap();
        assert_ne!(main, mainly);
        assert_eq!(get(&mut buf, &ctx, main).unwrap().as_deref(), Some("Main"));
        assert_eq!(get(&mut buf, &ctx, mainly).unwrap().as_deref(), Some("Mainly"));
        assert_eq!(locate(&mut buf, &ctx, "Main").unwrap(), Some(main));
        assert_eq!(locate(&mut buf, &ctx, "Mainl").unwrap(), None);
    }

    #[test]
    fn locate_missing_returns_none() {
        let config = Config::default();
        let (mut buf, ctx) = fresh_volume(&config);
        add(&mut buf, &ctx, "Elm").unwrap();
        assert_eq!(locate(&mut buf, &ctx, "Oak").unwrap(), None);
    }

    #[test]
    fn empty_string_is_id_zero() {
        let config = Config::default();
        let (mut buf, ctx) = fresh_volume(&config);
        assert_eq!(locate(&mut buf, &ctx, "").unwrap(), Some(0));
        assert_eq!(get(&mut buf, &ctx, 0).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn many_colliding_prefixes_split_repeatedly() {
        let config = Config::default();
        let (mut buf, ctx) = fresh_volume(&config);
        let words = ["a", "ab", "abc", "abcd", "abcde"];
        let ids: Vec<_> = words.iter().map(|w| add(&mut buf, &ctx, w).unwrap()).collect();
        for (w, id) in words.iter().zip(&ids) {
            assert_eq!(get(&mut buf, &ctx, *id).unwrap().as_deref(), Some(*w));
        }
    }
}
