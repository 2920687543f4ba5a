//! Runtime-typed values stored in attribute caches.
//!
//! A [`Value`] is a tagged union over a closed set of kinds: scalars
//! (numbers, strings, vectors, matrices, quaternions, colors, boxes),
//! arrays of those, compound name->value mappings, and ordered lists.
//! Values are freely clonable and compare structurally.

pub mod io;

use std::collections::BTreeMap;

use crate::util::math::{
    BBox3d, BBox3f, DMat4, DQuat, DVec2, DVec3, Mat3, Mat4, Quat, Vec2, Vec3, Vec4,
};

/// A named mapping of sub-values.
pub type CompoundValue = BTreeMap<String, Value>;

/// Tag naming every value kind, stable across file versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum TypeId {
    Bool = 1,
    Int = 2,
    UInt = 3,
    Int64 = 4,
    Float = 5,
    Double = 6,
    String = 7,

    V2f = 20,
    V3f = 21,
    V2d = 22,
    V3d = 23,
    Quatf = 24,
    Quatd = 25,
    Color3f = 26,
    Color4f = 27,
    M33f = 28,
    M44f = 29,
    M44d = 30,
    Box3f = 31,
    Box3d = 32,

    BoolVec = 50,
    IntVec = 51,
    FloatVec = 52,
    DoubleVec = 53,
    StringVec = 54,
    V2fVec = 55,
    V3fVec = 56,
    V3dVec = 57,
    QuatfVec = 58,
    Color3fVec = 59,
    M44fVec = 60,

    Compound = 100,
    List = 101,
}

impl TypeId {
    /// Name of this kind, for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "BoolData",
            Self::Int => "IntData",
            Self::UInt => "UIntData",
            Self::Int64 => "Int64Data",
            Self::Float => "FloatData",
            Self::Double => "DoubleData",
            Self::String => "StringData",
            Self::V2f => "V2fData",
            Self::V3f => "V3fData",
            Self::V2d => "V2dData",
            Self::V3d => "V3dData",
            Self::Quatf => "QuatfData",
            Self::Quatd => "QuatdData",
            Self::Color3f => "Color3fData",
            Self::Color4f => "Color4fData",
            Self::M33f => "M33fData",
            Self::M44f => "M44fData",
            Self::M44d => "M44dData",
            Self::Box3f => "Box3fData",
            Self::Box3d => "Box3dData",
            Self::BoolVec => "BoolVectorData",
            Self::IntVec => "IntVectorData",
            Self::FloatVec => "FloatVectorData",
            Self::DoubleVec => "DoubleVectorData",
            Self::StringVec => "StringVectorData",
            Self::V2fVec => "V2fVectorData",
            Self::V3fVec => "V3fVectorData",
            Self::V3dVec => "V3dVectorData",
            Self::QuatfVec => "QuatfVectorData",
            Self::Color3fVec => "Color3fVectorData",
            Self::M44fVec => "M44fVectorData",
            Self::Compound => "CompoundData",
            Self::List => "ListData",
        }
    }

    /// Convert from the on-disk tag value.
    pub const fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(Self::Bool),
            2 => Some(Self::Int),
            3 => Some(Self::UInt),
            4 => Some(Self::Int64),
            5 => Some(Self::Float),
            6 => Some(Self::Double),
            7 => Some(Self::String),
            20 => Some(Self::V2f),
            21 => Some(Self::V3f),
            22 => Some(Self::V2d),
            23 => Some(Self::V3d),
            24 => Some(Self::Quatf),
            25 => Some(Self::Quatd),
            26 => Some(Self::Color3f),
            27 => Some(Self::Color4f),
            28 => Some(Self::M33f),
            29 => Some(Self::M44f),
            30 => Some(Self::M44d),
            31 => Some(Self::Box3f),
            32 => Some(Self::Box3d),
            50 => Some(Self::BoolVec),
            51 => Some(Self::IntVec),
            52 => Some(Self::FloatVec),
            53 => Some(Self::DoubleVec),
            54 => Some(Self::StringVec),
            55 => Some(Self::V2fVec),
            56 => Some(Self::V3fVec),
            57 => Some(Self::V3dVec),
            58 => Some(Self::QuatfVec),
            59 => Some(Self::Color3fVec),
            60 => Some(Self::M44fVec),
            100 => Some(Self::Compound),
            101 => Some(Self::List),
            _ => None,
        }
    }

    /// Whether continuous blending between samples of this kind is
    /// mathematically meaningful. Discrete kinds (booleans, integers,
    /// strings, and their vector forms) are not interpolated; compounds
    /// and lists recurse per member.
    pub const fn is_interpolable(self) -> bool {
        !matches!(
            self,
            Self::Bool
                | Self::Int
                | Self::UInt
                | Self::Int64
                | Self::String
                | Self::BoolVec
                | Self::IntVec
                | Self::StringVec
        )
    }
}

/// A runtime-typed, serializable unit of data.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),

    V2f(Vec2),
    V3f(Vec3),
    V2d(DVec2),
    V3d(DVec3),
    Quatf(Quat),
    Quatd(DQuat),
    Color3f(Vec3),
    Color4f(Vec4),
    M33f(Mat3),
    M44f(Mat4),
    M44d(DMat4),
    Box3f(BBox3f),
    Box3d(BBox3d),

    BoolVec(Vec<bool>),
    IntVec(Vec<i32>),
    FloatVec(Vec<f32>),
    DoubleVec(Vec<f64>),
    StringVec(Vec<String>),
    V2fVec(Vec<Vec2>),
    V3fVec(Vec<Vec3>),
    V3dVec(Vec<DVec3>),
    QuatfVec(Vec<Quat>),
    Color3fVec(Vec<Vec3>),
    M44fVec(Vec<Mat4>),

    Compound(CompoundValue),
    List(Vec<Value>),
}

impl Value {
    /// The kind tag of this value.
    pub const fn type_id(&self) -> TypeId {
        match self {
            Self::Bool(_) => TypeId::Bool,
            Self::Int(_) => TypeId::Int,
            Self::UInt(_) => TypeId::UInt,
            Self::Int64(_) => TypeId::Int64,
            Self::Float(_) => TypeId::Float,
            Self::Double(_) => TypeId::Double,
            Self::String(_) => TypeId::String,
            Self::V2f(_) => TypeId::V2f,
            Self::V3f(_) => TypeId::V3f,
            Self::V2d(_) => TypeId::V2d,
            Self::V3d(_) => TypeId::V3d,
            Self::Quatf(_) => TypeId::Quatf,
            Self::Quatd(_) => TypeId::Quatd,
            Self::Color3f(_) => TypeId::Color3f,
            Self::Color4f(_) => TypeId::Color4f,
            Self::M33f(_) => TypeId::M33f,
            Self::M44f(_) => TypeId::M44f,
            Self::M44d(_) => TypeId::M44d,
            Self::Box3f(_) => TypeId::Box3f,
            Self::Box3d(_) => TypeId::Box3d,
            Self::BoolVec(_) => TypeId::BoolVec,
            Self::IntVec(_) => TypeId::IntVec,
            Self::FloatVec(_) => TypeId::FloatVec,
            Self::DoubleVec(_) => TypeId::DoubleVec,
            Self::StringVec(_) => TypeId::StringVec,
            Self::V2fVec(_) => TypeId::V2fVec,
            Self::V3fVec(_) => TypeId::V3fVec,
            Self::V3dVec(_) => TypeId::V3dVec,
            Self::QuatfVec(_) => TypeId::QuatfVec,
            Self::Color3fVec(_) => TypeId::Color3fVec,
            Self::M44fVec(_) => TypeId::M44fVec,
            Self::Compound(_) => TypeId::Compound,
            Self::List(_) => TypeId::List,
        }
    }

    /// Name of this value's kind, for diagnostics.
    pub const fn kind_name(&self) -> &'static str {
        self.type_id().name()
    }
}

impl From<CompoundValue> for Value {
    fn from(m: CompoundValue) -> Self {
        Self::Compound(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tag_roundtrip() {
        let kinds = [
            TypeId::Bool,
            TypeId::Int,
            TypeId::Double,
            TypeId::String,
            TypeId::V3f,
            TypeId::Quatd,
            TypeId::Box3d,
            TypeId::V3fVec,
            TypeId::M44fVec,
            TypeId::Compound,
            TypeId::List,
        ];
        for k in kinds {
            assert_eq!(TypeId::from_u16(k as u16), Some(k));
        }
        assert_eq!(TypeId::from_u16(0), None);
        assert_eq!(TypeId::from_u16(9999), None);
    }

    #[test]
    fn test_interpolable_kinds() {
        assert!(TypeId::Float.is_interpolable());
        assert!(TypeId::V3fVec.is_interpolable());
        assert!(TypeId::Quatf.is_interpolable());
        assert!(TypeId::Compound.is_interpolable());

        assert!(!TypeId::Bool.is_interpolable());
        assert!(!TypeId::Int.is_interpolable());
        assert!(!TypeId::String.is_interpolable());
        assert!(!TypeId::StringVec.is_interpolable());
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Float(1.0).type_id(), TypeId::Float);
        assert_eq!(Value::Float(1.0).kind_name(), "FloatData");
        assert_eq!(
            Value::Compound(CompoundValue::new()).type_id(),
            TypeId::Compound
        );
    }
}
