//! Integration tests for single-file attribute caches: round trips across
//! value kinds, reopening in every mode, listing, filtering and removal.

use framecache::prelude::*;
use framecache::util::math::{BBox3f, Mat4, Quat, Vec2, Vec3};

use tempfile::TempDir;

fn all_kinds() -> Vec<(&'static str, Value)> {
    vec![
        ("bool", Value::Bool(true)),
        ("int", Value::Int(-42)),
        ("uint", Value::UInt(7)),
        ("int64", Value::Int64(1 << 40)),
        ("float", Value::Float(0.25)),
        ("double", Value::Double(-1.5)),
        ("string", Value::String("pSphere1".into())),
        ("v2f", Value::V2f(Vec2::new(1.0, 2.0))),
        ("v3f", Value::V3f(Vec3::new(1.0, 2.0, 3.0))),
        ("quatf", Value::Quatf(Quat::from_rotation_z(0.5))),
        ("m44f", Value::M44f(Mat4::from_translation(Vec3::X))),
        ("box3f", Value::Box3f(BBox3f::new(Vec3::ZERO, Vec3::ONE))),
        ("bool_vec", Value::BoolVec(vec![true, false])),
        ("int_vec", Value::IntVec(vec![3, -1, 4])),
        ("float_vec", Value::FloatVec(vec![0.5, 1.5, 2.5])),
        ("string_vec", Value::StringVec(vec!["a".into(), "bc".into()])),
        (
            "v3f_vec",
            Value::V3fVec(vec![Vec3::X, Vec3::Y, Vec3::Z]),
        ),
        ("compound", {
            let mut m = CompoundValue::new();
            m.insert("radius".into(), Value::Double(2.0));
            m.insert("name".into(), Value::String("sphere".into()));
            Value::Compound(m)
        }),
        (
            "list",
            Value::List(vec![Value::Int(1), Value::Float(2.0)]),
        ),
    ]
}

#[test]
fn test_roundtrip_all_kinds_through_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("roundtrip.fcc");

    {
        let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
        for (name, value) in all_kinds() {
            cache.write("obj", name, &value).unwrap();
        }
    }

    // Reopen fresh in read mode; every kind must compare equal.
    let cache = AttributeCache::open(&path, OpenMode::Read).unwrap();
    for (name, value) in all_kinds() {
        assert_eq!(cache.read("obj", name).unwrap(), value, "kind {name}");
    }
}

#[test]
fn test_read_object_collects_all_attributes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("object.fcc");

    let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
    cache.write("o1", "a", &Value::Int(1)).unwrap();
    cache.write("o1", "b", &Value::Double(2.0)).unwrap();
    cache.write("o2", "c", &Value::Int(3)).unwrap();

    let all = cache.read_object("o1").unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.get("a"), Some(&Value::Int(1)));
    assert_eq!(all.get("b"), Some(&Value::Double(2.0)));

    assert!(cache.read_object("o3").is_err());
}

#[test]
fn test_headers_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("headers.fcc");

    {
        let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
        cache
            .write_header("frameRate", &Value::Double(24.0))
            .unwrap();
        cache
            .write_header("scene", &Value::String("shotA".into()))
            .unwrap();
    }

    let cache = AttributeCache::open(&path, OpenMode::Read).unwrap();
    assert_eq!(cache.headers(), vec!["frameRate", "scene"]);
    assert_eq!(
        cache.read_header("frameRate").unwrap(),
        Value::Double(24.0)
    );

    let all = cache.read_headers().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.get("scene"), Some(&Value::String("shotA".into())));
}

#[test]
fn test_listing_preserves_write_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("order.fcc");

    let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
    for obj in ["pSphere1", "pSphere2", "pCube1"] {
        cache.write(obj, "P", &Value::V3f(Vec3::ONE)).unwrap();
    }

    assert_eq!(cache.objects(), vec!["pSphere1", "pSphere2", "pCube1"]);
}

#[test]
fn test_append_preserves_and_extends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("append.fcc");

    {
        let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
        cache.write("Object1", "Attribute1", &Value::Int(1)).unwrap();
    }
    {
        let mut cache = AttributeCache::open(&path, OpenMode::Append).unwrap();
        cache.write("Object1", "Attribute2", &Value::Int(2)).unwrap();
        cache.write("Object2", "Attribute1", &Value::Int(1)).unwrap();
    }

    let cache = AttributeCache::open(&path, OpenMode::Read).unwrap();
    assert_eq!(cache.attributes("Object1").unwrap().len(), 2);
    assert_eq!(cache.objects(), vec!["Object1", "Object2"]);
    assert_eq!(
        cache.read("Object1", "Attribute1").unwrap(),
        Value::Int(1)
    );
}

#[test]
fn test_write_mode_truncates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("truncate.fcc");

    {
        let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
        cache.write("old", "a", &Value::Int(1)).unwrap();
    }
    {
        let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
        cache.write("new", "a", &Value::Int(2)).unwrap();
    }

    let cache = AttributeCache::open(&path, OpenMode::Read).unwrap();
    assert_eq!(cache.objects(), vec!["new"]);
}

#[test]
fn test_overwrite_attribute() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("overwrite.fcc");

    let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
    cache.write("o1", "a", &Value::Int(1)).unwrap();
    cache.write("o1", "a", &Value::Double(2.5)).unwrap();

    assert_eq!(cache.read("o1", "a").unwrap(), Value::Double(2.5));
    assert_eq!(cache.attributes("o1").unwrap(), vec!["a"]);
}

#[test]
fn test_remove_then_read_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("remove.fcc");

    let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
    cache.write("o1", "a", &Value::Int(5)).unwrap();
    cache.remove_attribute("o1", "a").unwrap();

    assert!(matches!(
        cache.read("o1", "a"),
        Err(Error::EntryNotFound(_))
    ));
}

#[test]
fn test_remove_variants() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("removes.fcc");

    let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
    cache.write("o1", "attrib1", &Value::V3f(Vec3::ONE)).unwrap();
    cache.write("o1", "attrib2", &Value::Int(1)).unwrap();
    cache.write("o2", "attrib3", &Value::Int(0)).unwrap();
    cache.write_header("h1", &Value::Int(2)).unwrap();
    cache.write_header("h2", &Value::Int(52)).unwrap();

    cache.remove_attribute("o1", "attrib1").unwrap();
    cache.remove("o2").unwrap();
    cache.remove_header("h1").unwrap();

    assert_eq!(cache.attributes("o1").unwrap(), vec!["attrib2"]);
    assert_eq!(cache.objects(), vec!["o1"]);
    assert_eq!(cache.headers(), vec!["h2"]);

    // Removing absent entries is an error, not a no-op.
    assert!(matches!(
        cache.remove("o2"),
        Err(Error::EntryNotFound(_))
    ));
    assert!(matches!(
        cache.remove_attribute("o1", "attrib1"),
        Err(Error::EntryNotFound(_))
    ));
    assert!(matches!(
        cache.remove_header("h1"),
        Err(Error::EntryNotFound(_))
    ));
}

#[test]
fn test_attributes_regex_filter() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("regex.fcc");

    let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
    cache.write("o1", "pos.x", &Value::Float(1.0)).unwrap();
    cache.write("o1", "pos.y", &Value::Float(2.0)).unwrap();
    cache.write("o1", "color", &Value::Float(3.0)).unwrap();

    assert_eq!(
        cache.attributes_matching("o1", r"pos\..*").unwrap(),
        vec!["pos.x", "pos.y"]
    );
    assert_eq!(
        cache.attributes_matching("o1", "attrib[12]").unwrap(),
        Vec::<String>::new()
    );
    assert!(matches!(
        cache.attributes_matching("o1", "pos[("),
        Err(Error::InvalidPattern(_))
    ));
}

#[test]
fn test_write_in_read_mode_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ro.fcc");
    {
        let mut cache = AttributeCache::open(&path, OpenMode::Write).unwrap();
        cache.write("o1", "a", &Value::Int(1)).unwrap();
    }

    let mut cache = AttributeCache::open(&path, OpenMode::Read).unwrap();
    assert!(matches!(
        cache.write("o1", "b", &Value::Int(2)),
        Err(Error::ReadOnly)
    ));
    assert!(matches!(
        cache.remove("o1"),
        Err(Error::ReadOnly)
    ));
}

#[test]
fn test_open_read_missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        AttributeCache::open(dir.path().join("missing.fcc"), OpenMode::Read),
        Err(Error::FileNotFound(_))
    ));
}
