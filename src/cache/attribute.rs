//! Single-file attribute cache.
//!
//! An attribute cache is one store file partitioned into two namespaces:
//! `objects`, holding one sub-container of attributes per object handle,
//! and `headers`, holding free-standing values. All mutation is immediate
//! against the underlying store and durable at flush/close.
//!
//! Instances are not internally synchronized; the `&mut self` receivers on
//! every mutating method encode the single-writer discipline.

use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::store::{OpenMode, Store};
use crate::util::{Error, Result};
use crate::value::{CompoundValue, Value};

use super::provenance;

const OBJECTS_ROOT: &str = "objects";
const HEADERS_ROOT: &str = "headers";

/// A single cache file of per-object attributes and free-standing headers.
#[derive(Debug)]
pub struct AttributeCache {
    store: Store,
}

impl AttributeCache {
    /// Open a cache file.
    ///
    /// Write and Append modes create the `objects`/`headers` containers if
    /// missing and, on creation, run every registered provenance header
    /// generator. Read mode fails with `NotAnAttributeCacheFile` when the
    /// file lacks either container.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        let mut store = Store::open(path, mode)?;

        match mode {
            OpenMode::Read => {
                let root = store.root();
                if root.subdir(OBJECTS_ROOT).is_err() || root.subdir(HEADERS_ROOT).is_err() {
                    return Err(Error::NotAnAttributeCacheFile(path.to_path_buf()));
                }
            }
            OpenMode::Write | OpenMode::Append => {
                let created = !store.root().has_entry(OBJECTS_ROOT)
                    || !store.root().has_entry(HEADERS_ROOT);
                let root = store.root_mut()?;
                root.subdir_or_create(OBJECTS_ROOT);
                root.subdir_or_create(HEADERS_ROOT);
                if created {
                    debug!(path = %path.display(), "created attribute cache");
                    let headers = root.subdir_mut(HEADERS_ROOT)?;
                    for (name, generate) in provenance::generators() {
                        generate().save(headers, &name)?;
                    }
                }
            }
        }

        Ok(Self { store })
    }

    /// The path this cache was opened from.
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// The mode this cache was opened in.
    pub fn mode(&self) -> OpenMode {
        self.store.mode()
    }

    /// Store a value under an object's attribute, creating the object's
    /// container if missing.
    pub fn write(&mut self, obj: &str, attr: &str, value: &Value) -> Result<()> {
        let objects = self.store.root_mut()?.subdir_mut(OBJECTS_ROOT)?;
        value.save(objects.subdir_or_create(obj), attr)
    }

    /// Store a free-standing header value.
    pub fn write_header(&mut self, hdr: &str, value: &Value) -> Result<()> {
        let headers = self.store.root_mut()?.subdir_mut(HEADERS_ROOT)?;
        value.save(headers, hdr)
    }

    /// Read one attribute of one object.
    pub fn read(&self, obj: &str, attr: &str) -> Result<Value> {
        let container = self.object_container(obj)?;
        if !container.has_entry(attr) {
            return Err(Error::entry_not_found(format!(
                "attribute '{attr}' of object '{obj}'"
            )));
        }
        Value::load(container, attr)
    }

    /// Read all attributes of one object as a name -> value mapping.
    pub fn read_object(&self, obj: &str) -> Result<CompoundValue> {
        let container = self.object_container(obj)?;
        let mut result = CompoundValue::new();
        for attr in container.entry_names() {
            result.insert(attr.clone(), Value::load(container, &attr)?);
        }
        Ok(result)
    }

    /// Read one header value.
    pub fn read_header(&self, hdr: &str) -> Result<Value> {
        let headers = self.store.root().subdir(HEADERS_ROOT)?;
        if !headers.has_entry(hdr) {
            return Err(Error::entry_not_found(format!("header '{hdr}'")));
        }
        Value::load(headers, hdr)
    }

    /// Read all headers as a name -> value mapping.
    pub fn read_headers(&self) -> Result<CompoundValue> {
        let headers = self.store.root().subdir(HEADERS_ROOT)?;
        let mut result = CompoundValue::new();
        for hdr in headers.entry_names() {
            result.insert(hdr.clone(), Value::load(headers, &hdr)?);
        }
        Ok(result)
    }

    /// All object handles, in store order.
    pub fn objects(&self) -> Vec<String> {
        self.store
            .root()
            .subdir(OBJECTS_ROOT)
            .map(|n| n.entry_names())
            .unwrap_or_default()
    }

    /// All header handles, in store order.
    pub fn headers(&self) -> Vec<String> {
        self.store
            .root()
            .subdir(HEADERS_ROOT)
            .map(|n| n.entry_names())
            .unwrap_or_default()
    }

    /// All attribute handles of one object, in store order.
    pub fn attributes(&self, obj: &str) -> Result<Vec<String>> {
        Ok(self.object_container(obj)?.entry_names())
    }

    /// Attribute handles of one object whose full name matches `pattern`.
    pub fn attributes_matching(&self, obj: &str, pattern: &str) -> Result<Vec<String>> {
        let re = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| Error::InvalidPattern(e.to_string()))?;
        Ok(self
            .attributes(obj)?
            .into_iter()
            .filter(|a| re.is_match(a))
            .collect())
    }

    /// Whether the cache holds the given object.
    pub fn contains(&self, obj: &str) -> bool {
        self.object_container(obj).is_ok()
    }

    /// Whether the cache holds the given attribute of the given object.
    pub fn contains_attribute(&self, obj: &str, attr: &str) -> bool {
        self.object_container(obj)
            .map(|c| c.has_entry(attr))
            .unwrap_or(false)
    }

    /// Remove an object and all its attributes. Removing an absent object
    /// is an `EntryNotFound` error.
    pub fn remove(&mut self, obj: &str) -> Result<()> {
        let objects = self.store.root_mut()?.subdir_mut(OBJECTS_ROOT)?;
        objects
            .remove(obj)
            .map_err(|_| Error::entry_not_found(format!("object '{obj}'")))
    }

    /// Remove one attribute of one object.
    pub fn remove_attribute(&mut self, obj: &str, attr: &str) -> Result<()> {
        let objects = self.store.root_mut()?.subdir_mut(OBJECTS_ROOT)?;
        let container = objects
            .subdir_mut(obj)
            .map_err(|_| Error::entry_not_found(format!("object '{obj}'")))?;
        container.remove(attr).map_err(|_| {
            Error::entry_not_found(format!("attribute '{attr}' of object '{obj}'"))
        })
    }

    /// Remove one header.
    pub fn remove_header(&mut self, hdr: &str) -> Result<()> {
        let headers = self.store.root_mut()?.subdir_mut(HEADERS_ROOT)?;
        headers
            .remove(hdr)
            .map_err(|_| Error::entry_not_found(format!("header '{hdr}'")))
    }

    /// Write pending changes to disk without waiting for drop.
    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    fn object_container(&self, obj: &str) -> Result<&crate::store::Node> {
        let objects = self.store.root().subdir(OBJECTS_ROOT)?;
        objects
            .subdir(obj)
            .map_err(|_| Error::entry_not_found(format!("object '{obj}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache_path(dir: &TempDir) -> std::path::PathBuf {
        dir.path().join("test.fcc")
    }

    #[test]
    fn test_write_read() {
        let dir = TempDir::new().unwrap();
        let mut cache = AttributeCache::open(cache_path(&dir), OpenMode::Write).unwrap();

        cache
            .write("pSphere1", "radius", &Value::Double(2.0))
            .unwrap();
        assert_eq!(
            cache.read("pSphere1", "radius").unwrap(),
            Value::Double(2.0)
        );

        let all = cache.read_object("pSphere1").unwrap();
        assert_eq!(all.get("radius"), Some(&Value::Double(2.0)));
    }

    #[test]
    fn test_read_missing() {
        let dir = TempDir::new().unwrap();
        let mut cache = AttributeCache::open(cache_path(&dir), OpenMode::Write).unwrap();
        cache.write("o1", "a", &Value::Int(1)).unwrap();

        assert!(matches!(
            cache.read("o1", "absent"),
            Err(Error::EntryNotFound(_))
        ));
        assert!(matches!(
            cache.read("absent", "a"),
            Err(Error::EntryNotFound(_))
        ));
        assert!(matches!(
            cache.read_header("absent"),
            Err(Error::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_not_a_cache_file() {
        let dir = TempDir::new().unwrap();
        let path = cache_path(&dir);
        {
            let mut store = Store::open(&path, OpenMode::Write).unwrap();
            store.root_mut().unwrap().subdir_or_create("unrelated");
        }
        assert!(matches!(
            AttributeCache::open(&path, OpenMode::Read),
            Err(Error::NotAnAttributeCacheFile(_))
        ));
    }

    #[test]
    fn test_regex_filter() {
        let dir = TempDir::new().unwrap();
        let mut cache = AttributeCache::open(cache_path(&dir), OpenMode::Write).unwrap();
        cache.write("o1", "pos.x", &Value::Float(1.0)).unwrap();
        cache.write("o1", "pos.y", &Value::Float(2.0)).unwrap();
        cache.write("o1", "color", &Value::Float(3.0)).unwrap();

        assert_eq!(
            cache.attributes_matching("o1", r"pos\..*").unwrap(),
            vec!["pos.x", "pos.y"]
        );
        // Full-match semantics: a bare prefix matches nothing.
        assert_eq!(
            cache.attributes_matching("o1", "pos").unwrap(),
            Vec::<String>::new()
        );
        assert!(matches!(
            cache.attributes_matching("o1", "pos[("),
            Err(Error::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_contains() {
        let dir = TempDir::new().unwrap();
        let mut cache = AttributeCache::open(cache_path(&dir), OpenMode::Write).unwrap();
        cache.write("o1", "a", &Value::Int(1)).unwrap();

        assert!(cache.contains("o1"));
        assert!(cache.contains_attribute("o1", "a"));
        assert!(!cache.contains("o2"));
        assert!(!cache.contains_attribute("o1", "b"));
    }
}
