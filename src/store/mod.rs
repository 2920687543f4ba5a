//! Hierarchical object store.
//!
//! A store file is a single random-access container of named entries, where
//! each entry is either a sub-container or a typed scalar/array payload.
//! The whole tree is held in memory: opening a file for reading parses it
//! (memory-mapped when possible), and writable stores serialize the tree
//! back to disk on [`Store::flush`] or drop.
//!
//! Entry order within a container is insertion order, and listing
//! operations return entries in that order.

pub mod format;

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read as _, Write as _};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use memmap2::Mmap;
use tracing::{debug, error};

use crate::util::{Error, Result};
use format::*;

pub use format::PodKind;

/// Mode a store file is opened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Parse an existing file; all mutation fails with `ReadOnly`.
    Read,
    /// Start from an empty tree, replacing any existing file on flush.
    Write,
    /// Parse an existing file if present, else start empty; writable.
    Append,
}

/// A typed scalar or array payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    /// Element type tag.
    pub pod: PodKind,
    /// Element count (1 for scalars; string records for `Str` arrays).
    pub count: u32,
    /// Raw little-endian element bytes.
    pub bytes: Vec<u8>,
}

macro_rules! payload_num_impl {
    ($from:ident, $to:ident, $scalar_from:ident, $scalar_to:ident, $ty:ty, $pod:expr) => {
        /// Build an array payload from a slice of elements.
        pub fn $from(vals: &[$ty]) -> Self {
            let mut bytes = Vec::with_capacity(vals.len() * std::mem::size_of::<$ty>());
            for v in vals {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            Self {
                pod: $pod,
                count: vals.len() as u32,
                bytes,
            }
        }

        /// Decode the payload as an array of elements, checking the tag.
        pub fn $to(&self) -> Result<Vec<$ty>> {
            self.expect_pod($pod)?;
            const W: usize = std::mem::size_of::<$ty>();
            if self.bytes.len() != self.count as usize * W {
                return Err(Error::invalid(format!(
                    "{} payload of {} elements has {} bytes",
                    $pod.name(),
                    self.count,
                    self.bytes.len()
                )));
            }
            Ok(self
                .bytes
                .chunks_exact(W)
                .map(|c| {
                    let mut buf = [0u8; W];
                    buf.copy_from_slice(c);
                    <$ty>::from_le_bytes(buf)
                })
                .collect())
        }

        /// Build a single-element payload.
        pub fn $scalar_from(v: $ty) -> Self {
            Self::$from(&[v])
        }

        /// Decode a single-element payload, checking tag and count.
        pub fn $scalar_to(&self) -> Result<$ty> {
            let vals = self.$to()?;
            match vals.as_slice() {
                [v] => Ok(*v),
                _ => Err(Error::invalid(format!(
                    "expected scalar {} payload, got {} elements",
                    $pod.name(),
                    vals.len()
                ))),
            }
        }
    };
}

impl Payload {
    payload_num_impl!(from_u8s, to_u8s, from_u8, to_u8, u8, PodKind::U8);
    payload_num_impl!(from_i32s, to_i32s, from_i32, to_i32, i32, PodKind::I32);
    payload_num_impl!(from_u32s, to_u32s, from_u32, to_u32, u32, PodKind::U32);
    payload_num_impl!(from_i64s, to_i64s, from_i64, to_i64, i64, PodKind::I64);
    payload_num_impl!(from_u64s, to_u64s, from_u64, to_u64, u64, PodKind::U64);
    payload_num_impl!(from_f32s, to_f32s, from_f32, to_f32, f32, PodKind::F32);
    payload_num_impl!(from_f64s, to_f64s, from_f64, to_f64, f64, PodKind::F64);

    /// Build a payload holding one UTF-8 string.
    pub fn from_str_value(s: &str) -> Self {
        Self {
            pod: PodKind::Str,
            count: 1,
            bytes: s.as_bytes().to_vec(),
        }
    }

    /// Decode a single-string payload.
    pub fn to_str_value(&self) -> Result<String> {
        self.expect_pod(PodKind::Str)?;
        if self.count != 1 {
            return Err(Error::invalid(format!(
                "expected scalar str payload, got {} records",
                self.count
            )));
        }
        Ok(String::from_utf8(self.bytes.clone())?)
    }

    /// Build a payload holding an array of strings as length-prefixed records.
    pub fn from_strs(vals: &[String]) -> Self {
        let mut bytes = Vec::new();
        for s in vals {
            bytes.extend_from_slice(&(s.len() as u32).to_le_bytes());
            bytes.extend_from_slice(s.as_bytes());
        }
        Self {
            pod: PodKind::Str,
            count: vals.len() as u32,
            bytes,
        }
    }

    /// Decode a string-array payload.
    pub fn to_strs(&self) -> Result<Vec<String>> {
        self.expect_pod(PodKind::Str)?;
        let mut out = Vec::with_capacity(self.count as usize);
        let mut pos = 0usize;
        for _ in 0..self.count {
            if pos + 4 > self.bytes.len() {
                return Err(Error::invalid("truncated string record"));
            }
            let mut len_buf = [0u8; 4];
            len_buf.copy_from_slice(&self.bytes[pos..pos + 4]);
            let len = u32::from_le_bytes(len_buf) as usize;
            pos += 4;
            if pos + len > self.bytes.len() {
                return Err(Error::invalid("truncated string record"));
            }
            out.push(String::from_utf8(self.bytes[pos..pos + len].to_vec())?);
            pos += len;
        }
        Ok(out)
    }

    fn expect_pod(&self, pod: PodKind) -> Result<()> {
        if self.pod != pod {
            return Err(Error::invalid(format!(
                "expected {} payload, got {}",
                pod.name(),
                self.pod.name()
            )));
        }
        Ok(())
    }
}

/// One entry in a container: a nested container or a data payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Dir(Node),
    Data(Payload),
}

/// A named-entry container within a store, preserving insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    entries: Vec<(String, Entry)>,
}

impl Node {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, name: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    /// Check whether an entry of either kind exists.
    pub fn has_entry(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Names of all entries, in insertion order.
    pub fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the container has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a sub-container, failing if absent or a data entry.
    pub fn subdir(&self, name: &str) -> Result<&Node> {
        match self.find(name) {
            Some(Entry::Dir(node)) => Ok(node),
            Some(Entry::Data(_)) => Err(Error::invalid(format!(
                "entry '{name}' is data, not a container"
            ))),
            None => Err(Error::entry_not_found(format!("container '{name}'"))),
        }
    }

    /// Get a mutable sub-container, failing if absent or a data entry.
    pub fn subdir_mut(&mut self, name: &str) -> Result<&mut Node> {
        match self.find_mut(name) {
            Some(Entry::Dir(node)) => Ok(node),
            Some(Entry::Data(_)) => Err(Error::invalid(format!(
                "entry '{name}' is data, not a container"
            ))),
            None => Err(Error::entry_not_found(format!("container '{name}'"))),
        }
    }

    /// Get a mutable sub-container, creating it if missing. An existing
    /// data entry under the same name is replaced.
    pub fn subdir_or_create(&mut self, name: &str) -> &mut Node {
        let pos = self.entries.iter().position(|(n, _)| n == name);
        let idx = match pos {
            Some(i) => {
                if !matches!(self.entries[i].1, Entry::Dir(_)) {
                    self.entries[i].1 = Entry::Dir(Node::new());
                }
                i
            }
            None => {
                self.entries.push((name.to_string(), Entry::Dir(Node::new())));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[idx].1 {
            Entry::Dir(node) => node,
            Entry::Data(_) => unreachable!("entry replaced with container above"),
        }
    }

    /// Write a data payload, replacing any existing entry of that name.
    pub fn write_data(&mut self, name: &str, payload: Payload) {
        match self.find_mut(name) {
            Some(entry) => *entry = Entry::Data(payload),
            None => self.entries.push((name.to_string(), Entry::Data(payload))),
        }
    }

    /// Read a data payload, failing if absent or a sub-container.
    pub fn read_data(&self, name: &str) -> Result<&Payload> {
        match self.find(name) {
            Some(Entry::Data(payload)) => Ok(payload),
            Some(Entry::Dir(_)) => Err(Error::invalid(format!(
                "entry '{name}' is a container, not data"
            ))),
            None => Err(Error::entry_not_found(format!("data entry '{name}'"))),
        }
    }

    /// Remove an entry of either kind, failing if absent.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        match self.entries.iter().position(|(n, _)| n == name) {
            Some(i) => {
                self.entries.remove(i);
                Ok(())
            }
            None => Err(Error::entry_not_found(format!("entry '{name}'"))),
        }
    }
}

/// One open store file: a parsed (or under-construction) entry tree bound
/// to a path and open mode.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    mode: OpenMode,
    root: Node,
    dirty: bool,
}

impl Store {
    /// Open a store file in the given mode.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let root = match mode {
            OpenMode::Read => read_tree(&path)?,
            OpenMode::Write => Node::new(),
            OpenMode::Append => {
                if path.exists() {
                    read_tree(&path)?
                } else {
                    Node::new()
                }
            }
        };
        debug!(path = %path.display(), ?mode, "opened store");
        Ok(Self {
            path,
            mode,
            root,
            dirty: false,
        })
    }

    /// The path this store was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The mode this store was opened in.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// The root container.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The mutable root container; fails with `ReadOnly` in Read mode and
    /// marks the store dirty otherwise.
    pub fn root_mut(&mut self) -> Result<&mut Node> {
        if self.mode == OpenMode::Read {
            return Err(Error::ReadOnly);
        }
        self.dirty = true;
        Ok(&mut self.root)
    }

    /// Serialize the tree back to disk. No-op for clean writable stores;
    /// fails with `ReadOnly` in Read mode.
    pub fn flush(&mut self) -> Result<()> {
        if self.mode == OpenMode::Read {
            return Err(Error::ReadOnly);
        }
        if !self.dirty {
            return Ok(());
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        let mut w = BufWriter::new(file);
        w.write_all(STORE_MAGIC)?;
        w.write_u16::<LittleEndian>(STORE_VERSION)?;
        encode_node(&mut w, &self.root)?;
        w.flush()?;
        self.dirty = false;
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.dirty && self.mode != OpenMode::Read {
            if let Err(e) = self.flush() {
                error!(path = %self.path.display(), "failed to flush store on close: {e}");
            }
        }
    }
}

fn encode_node<W: std::io::Write>(w: &mut W, node: &Node) -> Result<()> {
    w.write_u32::<LittleEndian>(node.entries.len() as u32)?;
    for (name, entry) in &node.entries {
        if name.len() > u16::MAX as usize {
            return Err(Error::invalid(format!(
                "entry name too long ({} bytes)",
                name.len()
            )));
        }
        w.write_u16::<LittleEndian>(name.len() as u16)?;
        w.write_all(name.as_bytes())?;
        match entry {
            Entry::Dir(child) => {
                w.write_u8(ENTRY_DIR)?;
                encode_node(w, child)?;
            }
            Entry::Data(payload) => {
                w.write_u8(ENTRY_DATA)?;
                w.write_u8(payload.pod as u8)?;
                w.write_u32::<LittleEndian>(payload.count)?;
                w.write_u32::<LittleEndian>(payload.bytes.len() as u32)?;
                w.write_all(&payload.bytes)?;
            }
        }
    }
    Ok(())
}

fn read_tree(path: &Path) -> Result<Node> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;

    // Prefer the mapped view; fall back to a plain read if mapping fails.
    match unsafe { Mmap::map(&file) } {
        Ok(mmap) => parse_tree(&mmap),
        Err(e) => {
            debug!(path = %path.display(), "mmap failed ({e}), reading buffered");
            let mut buf = Vec::new();
            let mut file = file;
            file.read_to_end(&mut buf)?;
            parse_tree(&buf)
        }
    }
}

fn parse_tree(data: &[u8]) -> Result<Node> {
    if data.len() < HEADER_SIZE {
        return Err(Error::UnexpectedEof(data.len() as u64));
    }
    if &data[0..8] != STORE_MAGIC {
        return Err(Error::InvalidMagic);
    }
    let version = u16::from_le_bytes([data[8], data[9]]);
    if version != STORE_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let mut dec = Decoder {
        buf: data,
        pos: HEADER_SIZE,
    };
    let root = dec.node(0)?;
    if dec.pos != data.len() {
        return Err(Error::invalid(format!(
            "{} trailing bytes after root container",
            data.len() - dec.pos
        )));
    }
    Ok(root)
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(Error::UnexpectedEof(self.buf.len() as u64));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn name(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        Ok(String::from_utf8(self.take(len)?.to_vec())?)
    }

    fn node(&mut self, depth: usize) -> Result<Node> {
        if depth > MAX_DEPTH {
            return Err(Error::invalid("container nesting too deep"));
        }
        let count = self.u32()? as usize;
        let mut node = Node::new();
        for _ in 0..count {
            let name = self.name()?;
            let kind = self.u8()?;
            let entry = match kind {
                ENTRY_DIR => Entry::Dir(self.node(depth + 1)?),
                ENTRY_DATA => {
                    let tag = self.u8()?;
                    let pod = PodKind::from_u8(tag)
                        .ok_or_else(|| Error::invalid(format!("unknown pod tag {tag}")))?;
                    let count = self.u32()?;
                    let len = self.u32()? as usize;
                    let bytes = self.take(len)?.to_vec();
                    Entry::Data(Payload { pod, count, bytes })
                }
                other => {
                    return Err(Error::invalid(format!("unknown entry kind {other}")));
                }
            };
            node.entries.push((name, entry));
        }
        Ok(node)
    }
}
