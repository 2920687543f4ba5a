//! Value serialization against the hierarchical store.
//!
//! Every value is written as a self-describing sub-container holding its
//! kind tag, a format version, and either a typed `data` payload or nested
//! `members`/`items` containers for compounds and lists.

use crate::store::{Node, Payload};
use crate::util::math::{BBox3d, BBox3f, DMat4, DQuat, DVec2, DVec3, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};
use crate::util::{Error, Result};

use super::{CompoundValue, TypeId, Value};

const TYPE_ENTRY: &str = "type";
const VERSION_ENTRY: &str = "version";
const DATA_ENTRY: &str = "data";
const MEMBERS_ENTRY: &str = "members";
const ITEMS_ENTRY: &str = "items";

const IO_VERSION: u8 = 1;

impl Value {
    /// Write this value under `name` in `parent`, replacing any existing
    /// entry of that name.
    pub fn save(&self, parent: &mut Node, name: &str) -> Result<()> {
        if parent.has_entry(name) {
            parent.remove(name)?;
        }
        let dir = parent.subdir_or_create(name);
        dir.write_data(TYPE_ENTRY, Payload::from_u32(self.type_id() as u16 as u32));
        dir.write_data(VERSION_ENTRY, Payload::from_u8(IO_VERSION));

        match self {
            Self::Compound(members) => {
                let members_dir = dir.subdir_or_create(MEMBERS_ENTRY);
                for (key, value) in members {
                    value.save(members_dir, key)?;
                }
            }
            Self::List(items) => {
                let items_dir = dir.subdir_or_create(ITEMS_ENTRY);
                for (i, value) in items.iter().enumerate() {
                    value.save(items_dir, &i.to_string())?;
                }
            }
            other => {
                dir.write_data(DATA_ENTRY, other.data_payload());
            }
        }
        Ok(())
    }

    /// Read the value stored under `name` in `parent`.
    pub fn load(parent: &Node, name: &str) -> Result<Value> {
        let dir = parent.subdir(name)?;
        let tag = dir.read_data(TYPE_ENTRY)?.to_u32()? as u16;
        let type_id = TypeId::from_u16(tag)
            .ok_or_else(|| Error::invalid(format!("unknown value type tag {tag}")))?;
        let version = dir.read_data(VERSION_ENTRY)?.to_u8()?;
        if version != IO_VERSION {
            return Err(Error::invalid(format!(
                "unsupported value format version {version}"
            )));
        }

        match type_id {
            TypeId::Compound => {
                let members_dir = dir.subdir(MEMBERS_ENTRY)?;
                let mut members = CompoundValue::new();
                for key in members_dir.entry_names() {
                    members.insert(key.clone(), Value::load(members_dir, &key)?);
                }
                Ok(Value::Compound(members))
            }
            TypeId::List => {
                let items_dir = dir.subdir(ITEMS_ENTRY)?;
                let mut items = Vec::with_capacity(items_dir.len());
                for key in items_dir.entry_names() {
                    items.push(Value::load(items_dir, &key)?);
                }
                Ok(Value::List(items))
            }
            other => Value::from_data_payload(other, dir.read_data(DATA_ENTRY)?),
        }
    }

    fn data_payload(&self) -> Payload {
        match self {
            Self::Bool(v) => Payload::from_u8(*v as u8),
            Self::Int(v) => Payload::from_i32(*v),
            Self::UInt(v) => Payload::from_u32(*v),
            Self::Int64(v) => Payload::from_i64(*v),
            Self::Float(v) => Payload::from_f32(*v),
            Self::Double(v) => Payload::from_f64(*v),
            Self::String(v) => Payload::from_str_value(v),

            Self::V2f(v) => Payload::from_f32s(&v.to_array()),
            Self::V3f(v) => Payload::from_f32s(&v.to_array()),
            Self::V2d(v) => Payload::from_f64s(&v.to_array()),
            Self::V3d(v) => Payload::from_f64s(&v.to_array()),
            Self::Quatf(v) => Payload::from_f32s(&v.to_array()),
            Self::Quatd(v) => Payload::from_f64s(&v.to_array()),
            Self::Color3f(v) => Payload::from_f32s(&v.to_array()),
            Self::Color4f(v) => Payload::from_f32s(&v.to_array()),
            Self::M33f(v) => Payload::from_f32s(&v.to_cols_array()),
            Self::M44f(v) => Payload::from_f32s(&v.to_cols_array()),
            Self::M44d(v) => Payload::from_f64s(&v.to_cols_array()),
            Self::Box3f(v) => Payload::from_f32s(&box3f_array(v)),
            Self::Box3d(v) => Payload::from_f64s(&box3d_array(v)),

            Self::BoolVec(v) => {
                Payload::from_u8s(&v.iter().map(|b| *b as u8).collect::<Vec<_>>())
            }
            Self::IntVec(v) => Payload::from_i32s(v),
            Self::FloatVec(v) => Payload::from_f32s(v),
            Self::DoubleVec(v) => Payload::from_f64s(v),
            Self::StringVec(v) => Payload::from_strs(v),
            Self::V2fVec(v) => Payload::from_f32s(&flatten(v, |e| e.to_array())),
            Self::V3fVec(v) => Payload::from_f32s(&flatten(v, |e| e.to_array())),
            Self::V3dVec(v) => Payload::from_f64s(&flatten(v, |e| e.to_array())),
            Self::QuatfVec(v) => Payload::from_f32s(&flatten(v, |e| e.to_array())),
            Self::Color3fVec(v) => Payload::from_f32s(&flatten(v, |e| e.to_array())),
            Self::M44fVec(v) => Payload::from_f32s(&flatten(v, |e| e.to_cols_array())),

            Self::Compound(_) | Self::List(_) => {
                unreachable!("compound kinds are saved as containers")
            }
        }
    }

    fn from_data_payload(type_id: TypeId, payload: &Payload) -> Result<Value> {
        Ok(match type_id {
            TypeId::Bool => Value::Bool(payload.to_u8()? != 0),
            TypeId::Int => Value::Int(payload.to_i32()?),
            TypeId::UInt => Value::UInt(payload.to_u32()?),
            TypeId::Int64 => Value::Int64(payload.to_i64()?),
            TypeId::Float => Value::Float(payload.to_f32()?),
            TypeId::Double => Value::Double(payload.to_f64()?),
            TypeId::String => Value::String(payload.to_str_value()?),

            TypeId::V2f => Value::V2f(Vec2::from_array(fixed(&payload.to_f32s()?)?)),
            TypeId::V3f => Value::V3f(Vec3::from_array(fixed(&payload.to_f32s()?)?)),
            TypeId::V2d => Value::V2d(DVec2::from_array(fixed(&payload.to_f64s()?)?)),
            TypeId::V3d => Value::V3d(DVec3::from_array(fixed(&payload.to_f64s()?)?)),
            TypeId::Quatf => Value::Quatf(Quat::from_array(fixed(&payload.to_f32s()?)?)),
            TypeId::Quatd => Value::Quatd(DQuat::from_array(fixed(&payload.to_f64s()?)?)),
            TypeId::Color3f => Value::Color3f(Vec3::from_array(fixed(&payload.to_f32s()?)?)),
            TypeId::Color4f => Value::Color4f(Vec4::from_array(fixed(&payload.to_f32s()?)?)),
            TypeId::M33f => Value::M33f(Mat3::from_cols_array(&fixed(&payload.to_f32s()?)?)),
            TypeId::M44f => Value::M44f(Mat4::from_cols_array(&fixed(&payload.to_f32s()?)?)),
            TypeId::M44d => Value::M44d(DMat4::from_cols_array(&fixed(&payload.to_f64s()?)?)),
            TypeId::Box3f => {
                let a: [f32; 6] = fixed(&payload.to_f32s()?)?;
                Value::Box3f(BBox3f::new(
                    Vec3::new(a[0], a[1], a[2]),
                    Vec3::new(a[3], a[4], a[5]),
                ))
            }
            TypeId::Box3d => {
                let a: [f64; 6] = fixed(&payload.to_f64s()?)?;
                Value::Box3d(BBox3d::new(
                    DVec3::new(a[0], a[1], a[2]),
                    DVec3::new(a[3], a[4], a[5]),
                ))
            }

            TypeId::BoolVec => {
                Value::BoolVec(payload.to_u8s()?.into_iter().map(|b| b != 0).collect())
            }
            TypeId::IntVec => Value::IntVec(payload.to_i32s()?),
            TypeId::FloatVec => Value::FloatVec(payload.to_f32s()?),
            TypeId::DoubleVec => Value::DoubleVec(payload.to_f64s()?),
            TypeId::StringVec => Value::StringVec(payload.to_strs()?),
            TypeId::V2fVec => Value::V2fVec(
                chunked::<f32, 2>(&payload.to_f32s()?)?
                    .into_iter()
                    .map(Vec2::from_array)
                    .collect(),
            ),
            TypeId::V3fVec => Value::V3fVec(
                chunked::<f32, 3>(&payload.to_f32s()?)?
                    .into_iter()
                    .map(Vec3::from_array)
                    .collect(),
            ),
            TypeId::V3dVec => Value::V3dVec(
                chunked::<f64, 3>(&payload.to_f64s()?)?
                    .into_iter()
                    .map(DVec3::from_array)
                    .collect(),
            ),
            TypeId::QuatfVec => Value::QuatfVec(
                chunked::<f32, 4>(&payload.to_f32s()?)?
                    .into_iter()
                    .map(Quat::from_array)
                    .collect(),
            ),
            TypeId::Color3fVec => Value::Color3fVec(
                chunked::<f32, 3>(&payload.to_f32s()?)?
                    .into_iter()
                    .map(Vec3::from_array)
                    .collect(),
            ),
            TypeId::M44fVec => Value::M44fVec(
                chunked::<f32, 16>(&payload.to_f32s()?)?
                    .into_iter()
                    .map(|a| Mat4::from_cols_array(&a))
                    .collect(),
            ),

            TypeId::Compound | TypeId::List => {
                return Err(Error::invalid("compound kind stored as data payload"));
            }
        })
    }
}

fn box3f_array(b: &BBox3f) -> [f32; 6] {
    [b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z]
}

fn box3d_array(b: &BBox3d) -> [f64; 6] {
    [b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z]
}

fn flatten<T, const N: usize, E: Copy>(vals: &[T], f: impl Fn(&T) -> [E; N]) -> Vec<E> {
    let mut out = Vec::with_capacity(vals.len() * N);
    for v in vals {
        out.extend_from_slice(&f(v));
    }
    out
}

fn fixed<T: Copy, const N: usize>(vals: &[T]) -> Result<[T; N]> {
    vals.try_into()
        .map_err(|_| Error::invalid(format!("expected {N} elements, got {}", vals.len())))
}

fn chunked<T: Copy, const N: usize>(vals: &[T]) -> Result<Vec<[T; N]>> {
    if vals.len() % N != 0 {
        return Err(Error::invalid(format!(
            "element count {} is not a multiple of {N}",
            vals.len()
        )));
    }
    Ok(vals
        .chunks_exact(N)
        .map(|c| {
            let mut a = [c[0]; N];
            a.copy_from_slice(c);
            a
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::math::{BBox3f, Mat4, Quat, Vec3};

    fn roundtrip(value: Value) {
        let mut node = Node::new();
        value.save(&mut node, "v").unwrap();
        assert_eq!(Value::load(&node, "v").unwrap(), value);
    }

    #[test]
    fn test_scalar_roundtrips() {
        roundtrip(Value::Bool(true));
        roundtrip(Value::Int(-3));
        roundtrip(Value::UInt(7));
        roundtrip(Value::Int64(1 << 40));
        roundtrip(Value::Float(0.25));
        roundtrip(Value::Double(-1.5));
        roundtrip(Value::String("pSphere1".into()));
        roundtrip(Value::V3f(Vec3::new(1.0, 2.0, 3.0)));
        roundtrip(Value::Quatf(Quat::from_xyzw(0.0, 0.0, 0.0, 1.0)));
        roundtrip(Value::M44f(Mat4::IDENTITY));
        roundtrip(Value::Box3f(BBox3f::new(Vec3::ZERO, Vec3::ONE)));
    }

    #[test]
    fn test_array_roundtrips() {
        roundtrip(Value::BoolVec(vec![true, false, true]));
        roundtrip(Value::IntVec(vec![1, -2, 3]));
        roundtrip(Value::FloatVec(vec![0.5, 1.5]));
        roundtrip(Value::StringVec(vec!["a".into(), "longer".into()]));
        roundtrip(Value::V3fVec(vec![Vec3::X, Vec3::Y, Vec3::Z]));
        roundtrip(Value::M44fVec(vec![Mat4::IDENTITY, Mat4::ZERO]));
    }

    #[test]
    fn test_compound_roundtrip() {
        let mut inner = CompoundValue::new();
        inner.insert("radius".into(), Value::Float(2.0));
        let mut outer = CompoundValue::new();
        outer.insert("shape".into(), Value::Compound(inner));
        outer.insert("names".into(), Value::StringVec(vec!["x".into()]));
        roundtrip(Value::Compound(outer));
    }

    #[test]
    fn test_list_roundtrip() {
        roundtrip(Value::List(vec![
            Value::Int(1),
            Value::String("two".into()),
            Value::List(vec![Value::Float(3.0)]),
        ]));
    }

    #[test]
    fn test_save_replaces_existing() {
        let mut node = Node::new();
        Value::Int(1).save(&mut node, "v").unwrap();
        Value::Double(2.5).save(&mut node, "v").unwrap();
        assert_eq!(Value::load(&node, "v").unwrap(), Value::Double(2.5));
        assert_eq!(node.len(), 1);
    }

    #[test]
    fn test_load_missing() {
        let node = Node::new();
        assert!(Value::load(&node, "absent").is_err());
    }
}
